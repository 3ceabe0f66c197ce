//! TCP Server
//!
//! Accepts connections and hands each one to its own thread.

use std::collections::HashMap;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::sync::WaitGroup;
use parking_lot::Mutex;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{MembinError, Result};
use super::connection::Connection;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Sockets of live connections, so shutdown can close them
type Registry = Arc<Mutex<HashMap<u64, TcpStream>>>;

/// TCP server for membin
pub struct Server {
    config: Config,
    dispatcher: Arc<Dispatcher>,
    listener: Option<TcpListener>,
    shutdown: Arc<AtomicBool>,
    connections: Registry,
    next_connection_id: u64,
}

/// Stops a running [`Server`] from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Server {
    /// Create a new server with the given config and dispatcher
    pub fn new(config: Config, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            listener: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_connection_id: 1,
        }
    }

    /// Bind the listen address and return the bound socket address
    ///
    /// Useful with port 0; `run` binds on its own otherwise.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            MembinError::Network(format!("Failed to bind {}: {}", self.config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        let addr = listener.local_addr()?;
        tracing::info!("Listening on {}", addr);
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| MembinError::Network("Listener not bound".to_string()))?;

        let wait_group = WaitGroup::new();

        while !self.shutdown.load(Ordering::Acquire) {
            match listener.accept() {
                Ok((stream, addr)) => self.spawn_connection(stream, addr, &wait_group),
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    // Usually transient, e.g. out of file descriptors
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        drop(listener);
        self.close_connections();
        wait_group.wait();

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Handle for stopping the server once `run` owns it
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    fn spawn_connection(&mut self, stream: TcpStream, addr: SocketAddr, wait_group: &WaitGroup) {
        if self.connections.lock().len() >= self.config.max_connections {
            tracing::warn!(
                "Refusing connection from {}: {} connections already open",
                addr,
                self.config.max_connections
            );
            return;
        }

        // Accepted sockets may inherit the listener's non-blocking mode
        let registered = stream
            .set_nonblocking(false)
            .and_then(|_| stream.try_clone());
        let registered = match registered {
            Ok(clone) => clone,
            Err(e) => {
                tracing::warn!("Failed to set up connection from {}: {}", addr, e);
                return;
            }
        };

        let id = self.next_connection_id;
        self.next_connection_id += 1;
        self.connections.lock().insert(id, registered);

        let dispatcher = Arc::clone(&self.dispatcher);
        let connections = Arc::clone(&self.connections);
        let config = self.config.clone();
        let wait_group = wait_group.clone();

        let spawned = thread::Builder::new()
            .name(format!("membin-conn-{}", id))
            .spawn(move || {
                serve(stream, dispatcher, &config);
                connections.lock().remove(&id);
                drop(wait_group);
            });

        if let Err(e) = spawned {
            tracing::warn!("Failed to spawn thread for {}: {}", addr, e);
            self.connections.lock().remove(&id);
        }
    }

    /// Shut down every live connection socket so their threads exit
    fn close_connections(&self) {
        let connections = self.connections.lock();
        tracing::info!("Closing {} open connections", connections.len());
        for stream in connections.values() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Run one connection to completion
fn serve(stream: TcpStream, dispatcher: Arc<Dispatcher>, config: &Config) {
    let mut connection = match Connection::new(stream, dispatcher, config.max_body_length()) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!("Failed to initialise connection: {}", e);
            return;
        }
    };

    if let Err(e) = connection.set_timeouts(config.read_timeout_ms, config.write_timeout_ms) {
        tracing::warn!("Failed to set timeouts for {}: {}", connection.peer_addr(), e);
        return;
    }

    if let Err(e) = connection.handle() {
        tracing::warn!("Connection {} closed with error: {}", connection.peer_addr(), e);
    }
}
