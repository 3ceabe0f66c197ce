//! Protocol Module
//!
//! Defines the memcached binary wire protocol.
//!
//! ## Frame Format
//!
//! ```text
//!  offset  field        size
//!  0       magic        1     0x80 request, 0x81 response
//!  1       opcode       1
//!  2       key_len      2
//!  4       extras_len   1
//!  5       data_type    1     reserved, always 0
//!  6       status       2     0 in requests
//!  8       body_len     4     extras_len + key_len + value_len
//!  12      opaque       4     echoed verbatim
//!  16      cas          8
//!  24      extras | key | value
//! ```
//!
//! All integers are big-endian.
//!
//! ### Commands
//! - 0x00: GET       - key
//! - 0x01: SET       - extras (flags, expiry) + key + value
//! - 0x02: ADD       - extras (flags, expiry) + key + value
//! - 0x03: REPLACE   - extras (flags, expiry) + key + value
//! - 0x04: DELETE    - key
//! - 0x05: INCREMENT - extras (delta, initial, expiry) + key
//! - 0x06: DECREMENT - extras (delta, initial, expiry) + key
//! - 0x0b: VERSION   - empty

mod header;
mod opcode;
mod status;
mod extras;
mod request;
mod response;
mod codec;
mod frame;

pub use header::{Header, Magic, HEADER_SIZE};
pub use opcode::Opcode;
pub use status::Status;
pub use extras::{CounterExtras, Extras, ExtrasShape, StoreExtras};
pub use request::Request;
pub use response::Response;
pub use codec::{
    body_length, decode_body, decode_header, decode_response, decode_response_header,
    encode_request, encode_response, read_response, write_request,
};
pub use frame::{Frame, FrameAssembler};
