//! Frame assembly
//!
//! Accumulates bytes read from a connection and yields complete frames in
//! receipt order. Nothing is dispatched until the header and the whole body
//! it declares have arrived.

use bytes::{Buf, BytesMut};

use crate::error::FramingError;
use super::codec::{body_length, decode_body, decode_header};
use super::header::{Header, HEADER_SIZE};
use super::request::Request;

/// Initial capacity of the per-connection buffer
const INITIAL_CAPACITY: usize = 4 * 1024;

/// One unit carved out of the byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A well-formed request
    Request(Request),

    /// A frame whose bytes were consumed but cannot be decoded. The stream
    /// is still aligned on the next frame.
    Rejected { header: Header, error: FramingError },
}

/// Per-connection frame buffer
pub struct FrameAssembler {
    buffer: BytesMut,

    /// Largest body a header may declare before the frame is rejected
    max_body_length: u32,

    /// Bytes of a rejected oversized body still to be dropped on arrival
    discard: usize,
}

impl FrameAssembler {
    pub fn new(max_body_length: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            max_body_length,
            discard: 0,
        }
    }

    /// Append bytes received from the peer
    pub fn extend(&mut self, bytes: &[u8]) {
        let skipped = self.discard.min(bytes.len());
        self.discard -= skipped;
        self.buffer.extend_from_slice(&bytes[skipped..]);
    }

    /// Take the next complete frame, if one is buffered
    ///
    /// Returns `Err` only when the stream is desynchronized; the caller
    /// must stop reading from it.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FramingError> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = decode_header(&self.buffer[..HEADER_SIZE])?;
        let body_len = body_length(&header);

        if body_len > self.max_body_length {
            self.buffer.advance(HEADER_SIZE);
            let buffered = self.buffer.len().min(body_len as usize);
            self.buffer.advance(buffered);
            self.discard = body_len as usize - buffered;

            return Ok(Some(Frame::Rejected {
                header,
                error: FramingError::FrameTooLarge {
                    length: body_len,
                    limit: self.max_body_length,
                },
            }));
        }

        if self.buffer.len() < HEADER_SIZE + body_len as usize {
            return Ok(None);
        }

        self.buffer.advance(HEADER_SIZE);
        let body = self.buffer.split_to(body_len as usize).freeze();

        Ok(Some(match decode_body(&header, body) {
            Ok(request) => Frame::Request(request),
            Err(error) => Frame::Rejected { header, error },
        }))
    }

    /// Bytes buffered but not yet part of a returned frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes of an oversized body still expected from the peer
    pub fn pending_discard(&self) -> usize {
        self.discard
    }
}
