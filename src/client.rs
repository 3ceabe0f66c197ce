//! Blocking client
//!
//! Sends one request at a time and waits for its response.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;

use crate::config::Config;
use crate::error::{MembinError, Result};
use crate::protocol::{read_response, write_request, Request, Response};

/// A connection to a membin (or memcached) server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    next_opaque: u32,
    max_body_length: u32,
}

impl Client {
    /// Connect to a server
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            next_opaque: 1,
            max_body_length: Config::default().max_body_length(),
        })
    }

    /// Fail reads that take longer than `timeout`
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Send a request and wait for the matching response
    ///
    /// The request's opaque is replaced by a per-client counter and checked
    /// against the echoed value.
    pub fn execute(&mut self, request: Request) -> Result<Response> {
        if request.key.len() > u16::MAX as usize {
            return Err(MembinError::Protocol(format!(
                "Key of {} bytes cannot be encoded",
                request.key.len()
            )));
        }

        let opaque = self.next_opaque;
        self.next_opaque = self.next_opaque.wrapping_add(1);

        write_request(&mut self.writer, &request.with_opaque(opaque))?;
        let response = read_response(&mut self.reader, self.max_body_length)?;

        if response.opaque != opaque {
            return Err(MembinError::Protocol(format!(
                "Response opaque {} does not match request {}",
                response.opaque, opaque
            )));
        }
        Ok(response)
    }

    pub fn get(&mut self, key: impl Into<Bytes>) -> Result<Response> {
        self.execute(Request::get(key))
    }

    pub fn set(
        &mut self,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        flags: u32,
        expiry: u32,
    ) -> Result<Response> {
        self.execute(Request::set(key, value, flags, expiry))
    }

    pub fn add(
        &mut self,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        flags: u32,
        expiry: u32,
    ) -> Result<Response> {
        self.execute(Request::add(key, value, flags, expiry))
    }

    pub fn replace(
        &mut self,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        flags: u32,
        expiry: u32,
    ) -> Result<Response> {
        self.execute(Request::replace(key, value, flags, expiry))
    }

    pub fn delete(&mut self, key: impl Into<Bytes>) -> Result<Response> {
        self.execute(Request::delete(key))
    }

    pub fn increment(
        &mut self,
        key: impl Into<Bytes>,
        delta: u64,
        initial: u64,
        expiry: u32,
    ) -> Result<Response> {
        self.execute(Request::increment(key, delta, initial, expiry))
    }

    pub fn decrement(
        &mut self,
        key: impl Into<Bytes>,
        delta: u64,
        initial: u64,
        expiry: u32,
    ) -> Result<Response> {
        self.execute(Request::decrement(key, delta, initial, expiry))
    }

    pub fn version(&mut self) -> Result<Response> {
        self.execute(Request::version())
    }
}
