//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! ┌─────────────────────────┬──────────┬──────────┬──────────────────┐
//! │      Header (24)        │  Extras  │   Key    │      Value       │
//! └─────────────────────────┴──────────┴──────────┴──────────────────┘
//! ```
//!
//! `value length = body_length - extras_length - key_length`
//!
//! Every function here is pure; buffering partial input is the job of the
//! [`FrameAssembler`](super::FrameAssembler).

use std::io::{Read, Write};

use bytes::{BufMut, Bytes};

use crate::error::{FramingError, MembinError, Result};
use super::header::{Header, Magic, HEADER_SIZE};
use super::request::Request;
use super::response::Response;
use super::status::Status;

// =============================================================================
// Request Decoding (server side)
// =============================================================================

/// Decode a request header from the first [`HEADER_SIZE`] bytes
pub fn decode_header(bytes: &[u8]) -> std::result::Result<Header, FramingError> {
    decode_header_with_magic(bytes, Magic::Request)
}

/// Number of body bytes that follow `header`
pub fn body_length(header: &Header) -> u32 {
    header.body_length
}

/// Split a request body into extras, key and value
///
/// `body` must be exactly the number of bytes the header declares.
pub fn decode_body(header: &Header, body: Bytes) -> std::result::Result<Request, FramingError> {
    let expected = body_length(header) as usize;
    if body.len() != expected {
        return Err(FramingError::LengthMismatch {
            expected,
            got: body.len(),
        });
    }

    let (extras, key, value) = split_body(header, body)?;
    Ok(Request {
        header: *header,
        extras,
        key,
        value,
    })
}

// =============================================================================
// Response Encoding (server side)
// =============================================================================

/// Encode a response to bytes
///
/// Format: header (24) + extras + key + value (or status message)
pub fn encode_response(response: &Response) -> Vec<u8> {
    let extras = response.extras.clone().unwrap_or_default();
    let key = response.key.clone().unwrap_or_default();
    let body = response.body();

    let header = Header {
        magic: Magic::Response as u8,
        opcode: response.opcode,
        key_length: key.len() as u16,
        extras_length: extras.len() as u8,
        data_type: 0,
        status: response.status as u16,
        body_length: (extras.len() + key.len() + body.len()) as u32,
        opaque: response.opaque,
        cas: response.cas,
    };

    encode_frame(&header, &extras, &key, &body)
}

// =============================================================================
// Request Encoding / Response Decoding (client side)
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &Request) -> Vec<u8> {
    encode_frame(&request.header, &request.extras, &request.key, &request.value)
}

/// Decode a response header from the first [`HEADER_SIZE`] bytes
pub fn decode_response_header(bytes: &[u8]) -> std::result::Result<Header, FramingError> {
    decode_header_with_magic(bytes, Magic::Response)
}

/// Decode a complete response frame
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let header = decode_response_header(bytes)?;

    let total_len = HEADER_SIZE + header.body_length as usize;
    if bytes.len() != total_len {
        return Err(FramingError::LengthMismatch {
            expected: total_len,
            got: bytes.len(),
        }
        .into());
    }

    let body = Bytes::copy_from_slice(&bytes[HEADER_SIZE..]);
    response_from_parts(header, body)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    writer.write_all(&encode_request(request))?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
///
/// Blocks until a complete response is received or an error occurs
pub fn read_response<R: Read>(reader: &mut R, max_body_length: u32) -> Result<Response> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_bytes)?;
    let header = decode_response_header(&header_bytes)?;

    if header.body_length > max_body_length {
        return Err(FramingError::FrameTooLarge {
            length: header.body_length,
            limit: max_body_length,
        }
        .into());
    }

    let mut body = vec![0u8; header.body_length as usize];
    reader.read_exact(&mut body)?;

    response_from_parts(header, Bytes::from(body))
}

// =============================================================================
// Internals
// =============================================================================

fn decode_header_with_magic(
    bytes: &[u8],
    magic: Magic,
) -> std::result::Result<Header, FramingError> {
    if bytes.len() < HEADER_SIZE {
        return Err(FramingError::Truncated {
            expected: HEADER_SIZE,
            got: bytes.len(),
        });
    }

    let header = Header::read(&bytes[..HEADER_SIZE]);
    if header.magic != magic as u8 {
        return Err(FramingError::BadMagic(header.magic));
    }
    Ok(header)
}

fn split_body(
    header: &Header,
    mut body: Bytes,
) -> std::result::Result<(Bytes, Bytes, Bytes), FramingError> {
    if header.value_length().is_none() {
        return Err(FramingError::InvalidLengths {
            body: header.body_length,
            extras: header.extras_length,
            key: header.key_length,
        });
    }

    let extras = body.split_to(header.extras_length as usize);
    let key = body.split_to(header.key_length as usize);
    Ok((extras, key, body))
}

fn response_from_parts(header: Header, body: Bytes) -> Result<Response> {
    let status = Status::try_from(header.status).map_err(|code| {
        MembinError::Protocol(format!("Unknown response status: 0x{:04x}", code))
    })?;
    let (extras, key, value) = split_body(&header, body)?;

    let non_empty = |bytes: Bytes| (!bytes.is_empty()).then_some(bytes);
    Ok(Response {
        opcode: header.opcode,
        status,
        opaque: header.opaque,
        cas: header.cas,
        extras: non_empty(extras),
        key: non_empty(key),
        value: non_empty(value),
    })
}

fn encode_frame(header: &Header, extras: &[u8], key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(HEADER_SIZE + extras.len() + key.len() + value.len());
    header.write(&mut message);
    message.put_slice(extras);
    message.put_slice(key);
    message.put_slice(value);
    message
}
