//! # membin
//!
//! An in-memory cache server speaking the memcached binary protocol:
//! - Length-prefixed framing that never dispatches a partial frame
//! - Static opcode table with per-command validation
//! - Sharded, per-key atomic in-memory store with lazy expiry
//! - One thread per TCP connection, requests served in receipt order
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (one thread per connection)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ raw bytes
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Frame Assembler / Codec                     │
//! │          (header → body → request, response → bytes)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Request
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Command Dispatcher                          │
//! │             (opcode table → handler → Response)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ at most one mutation
//!                       ▼
//!               ┌───────────────┐
//!               │     Store     │
//!               │   (sharded)   │
//!               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod store;
pub mod dispatch;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FramingError, MembinError, Result, StoreError};
pub use config::Config;
pub use dispatch::Dispatcher;
pub use store::{MemoryStore, Store};
pub use client::Client;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of membin, reported by the VERSION command
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
