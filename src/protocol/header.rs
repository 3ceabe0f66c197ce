//! Frame header
//!
//! The fixed 24-byte header that opens every request and response.

use bytes::{Buf, BufMut};

/// Size of a frame header in bytes
pub const HEADER_SIZE: usize = 24;

/// Magic byte tagging the direction of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Magic {
    Request = 0x80,
    Response = 0x81,
}

/// A decoded frame header
///
/// `status` is zero in requests and carries the status code in responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    pub magic: u8,
    pub opcode: u8,
    pub key_length: u16,
    pub extras_length: u8,
    pub data_type: u8,
    pub status: u16,
    pub body_length: u32,
    pub opaque: u32,
    pub cas: u64,
}

impl Header {
    /// Read the header fields from exactly [`HEADER_SIZE`] bytes
    ///
    /// No field is validated here; callers check the magic.
    pub(crate) fn read(mut bytes: &[u8]) -> Self {
        Self {
            magic: bytes.get_u8(),
            opcode: bytes.get_u8(),
            key_length: bytes.get_u16(),
            extras_length: bytes.get_u8(),
            data_type: bytes.get_u8(),
            status: bytes.get_u16(),
            body_length: bytes.get_u32(),
            opaque: bytes.get_u32(),
            cas: bytes.get_u64(),
        }
    }

    /// Append the big-endian encoding of this header
    pub(crate) fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.magic);
        buf.put_u8(self.opcode);
        buf.put_u16(self.key_length);
        buf.put_u8(self.extras_length);
        buf.put_u8(self.data_type);
        buf.put_u16(self.status);
        buf.put_u32(self.body_length);
        buf.put_u32(self.opaque);
        buf.put_u64(self.cas);
    }

    /// Length of the value section, or `None` when the declared body is
    /// shorter than extras plus key
    pub fn value_length(&self) -> Option<usize> {
        (self.body_length as usize)
            .checked_sub(self.extras_length as usize + self.key_length as usize)
    }
}
