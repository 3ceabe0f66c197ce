//! Response definitions
//!
//! Describes a response before it is encoded onto the wire.

use bytes::Bytes;

use super::header::Header;
use super::request::Request;
use super::status::Status;

/// A response to send to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Opcode of the request being answered
    pub opcode: u8,

    /// Status code
    pub status: Status,

    /// Correlation token copied from the request
    pub opaque: u32,

    /// CAS token copied from the request (or zero)
    pub cas: u64,

    /// Optional extras (flags for GET)
    pub extras: Option<Bytes>,

    /// Optional key; no command in this server echoes it
    pub key: Option<Bytes>,

    /// Optional value; the status message is sent when absent
    pub value: Option<Bytes>,
}

impl Response {
    /// Create a bare response answering `header` with `status`
    pub fn to_header(header: &Header, status: Status) -> Self {
        Self {
            opcode: header.opcode,
            status,
            opaque: header.opaque,
            cas: header.cas,
            extras: None,
            key: None,
            value: None,
        }
    }

    /// Create a bare response answering `request` with `status`
    pub fn to(request: &Request, status: Status) -> Self {
        Self::to_header(&request.header, status)
    }

    /// Create a SUCCESS response with no body
    pub fn ok(request: &Request) -> Self {
        Self::to(request, Status::Success)
    }

    /// Attach extras
    pub fn with_extras(mut self, extras: impl Into<Bytes>) -> Self {
        self.extras = Some(extras.into());
        self
    }

    /// Attach a value
    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Bytes sent after extras and key
    pub fn body(&self) -> Bytes {
        match &self.value {
            Some(value) => value.clone(),
            None => Bytes::from_static(self.status.message().as_bytes()),
        }
    }

    /// Flags carried in the extras of a GET response
    pub fn flags(&self) -> Option<u32> {
        let extras = self.extras.as_ref()?;
        let bytes: [u8; 4] = extras.get(..4)?.try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    /// Counter carried in the value of an INCREMENT/DECREMENT response
    pub fn counter(&self) -> Option<u64> {
        let value = self.value.as_ref()?;
        let bytes: [u8; 8] = value[..].try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }
}
