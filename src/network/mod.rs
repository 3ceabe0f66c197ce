//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread polling a shutdown flag
//! - One thread per connection, all sharing one Dispatcher (and Store)
//! - Requests within a connection are served strictly in order

mod server;
mod connection;

pub use server::{Server, ShutdownHandle};
pub use connection::Connection;
