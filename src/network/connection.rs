//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{self, BufWriter, Read, Write};
use std::net::TcpStream;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::Dispatcher;
use crate::error::{MembinError, Result};
use crate::protocol::{encode_response, Frame, FrameAssembler, Header, Request, Response, Status};

/// Bytes requested from the socket per read
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Handles a single client connection
///
/// Requests are executed strictly one at a time, in the order they arrive,
/// and responses are written in the same order.
pub struct Connection {
    /// TCP stream reader (frames are buffered by the assembler)
    reader: TcpStream,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Bytes received but not yet dispatched
    frames: FrameAssembler,

    /// Shared command dispatcher
    dispatcher: Arc<Dispatcher>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// `max_body_length` bounds the body a single frame may declare.
    pub fn new(stream: TcpStream, dispatcher: Arc<Dispatcher>, max_body_length: u32) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: read_stream,
            writer: BufWriter::new(write_stream),
            frames: FrameAssembler::new(max_body_length),
            dispatcher,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 leaves a direction without one)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Returns when the client disconnects, the stream desynchronizes, or
    /// an unrecoverable error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.drain_frames() {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(MembinError::Io(ref e)) if is_disconnect(e) => {
                    tracing::debug!(
                        "Client {} disconnected before response could be sent: {}",
                        self.peer_addr,
                        e
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            }

            let read = match self.reader.read(&mut chunk) {
                Ok(0) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if is_disconnect(e) => {
                    tracing::debug!("Connection {} closed by peer: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(ref e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e.into());
                }
            };

            self.frames.extend(&chunk[..read]);
        }
    }

    /// Answer every complete frame currently buffered
    ///
    /// Returns `Ok(false)` when the connection must be closed.
    fn drain_frames(&mut self) -> Result<bool> {
        let mut keep_open = true;

        while keep_open {
            let response = match self.frames.next_frame() {
                Ok(None) => break,
                Ok(Some(Frame::Request(request))) => {
                    tracing::trace!(
                        "Received opcode 0x{:02x} from {} ({} byte key, {} byte value)",
                        request.opcode(),
                        self.peer_addr,
                        request.key.len(),
                        request.value.len()
                    );
                    match self.execute(&request) {
                        Some(response) => response,
                        None => {
                            keep_open = false;
                            break;
                        }
                    }
                }
                Ok(Some(Frame::Rejected { header, error })) => {
                    self.dispatcher.reject(&header, &error)
                }
                Err(error) => {
                    tracing::debug!("Closing desynchronized stream from {}: {}", self.peer_addr, error);
                    keep_open = false;
                    Response::to_header(&Header::default(), Status::InvalidArguments)
                }
            };

            self.send_response(&response)?;
        }

        self.writer.flush()?;
        Ok(keep_open)
    }

    /// Execute a request, or `None` if the connection must close instead
    ///
    /// A failing store or a panicking handler ends this connection only.
    fn execute(&self, request: &Request) -> Option<Response> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatcher.dispatch(request))) {
            Ok(Ok(response)) => Some(response),
            Ok(Err(e)) => {
                tracing::warn!("Store failure serving {}, closing: {}", self.peer_addr, e);
                None
            }
            Err(_) => {
                tracing::error!("Handler panicked serving {}, closing", self.peer_addr);
                None
            }
        }
    }

    /// Send a response to the client
    fn send_response(&mut self, response: &Response) -> Result<()> {
        self.writer.write_all(&encode_response(response))?;
        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}
