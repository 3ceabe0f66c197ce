//! Request definitions
//!
//! A decoded request frame, plus constructors clients use to build one.

use bytes::Bytes;

use super::extras::{CounterExtras, StoreExtras};
use super::header::{Header, Magic};
use super::opcode::Opcode;

/// A request frame split into its sections
///
/// Immutable once decoded; the sections share the connection buffer's
/// allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub header: Header,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

impl Request {
    /// Build a request, deriving the header lengths from the sections
    ///
    /// Keys longer than `u16::MAX` bytes cannot be described by the header;
    /// the client rejects them before encoding.
    pub fn new(
        opcode: u8,
        extras: impl Into<Bytes>,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Self {
        let extras = extras.into();
        let key = key.into();
        let value = value.into();

        let header = Header {
            magic: Magic::Request as u8,
            opcode,
            key_length: key.len() as u16,
            extras_length: extras.len() as u8,
            body_length: (extras.len() + key.len() + value.len()) as u32,
            ..Header::default()
        };

        Self {
            header,
            extras,
            key,
            value,
        }
    }

    pub fn get(key: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Get as u8, Bytes::new(), key, Bytes::new())
    }

    pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>, flags: u32, expiry: u32) -> Self {
        Self::storage(Opcode::Set, key, value, flags, expiry)
    }

    pub fn add(key: impl Into<Bytes>, value: impl Into<Bytes>, flags: u32, expiry: u32) -> Self {
        Self::storage(Opcode::Add, key, value, flags, expiry)
    }

    pub fn replace(
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        flags: u32,
        expiry: u32,
    ) -> Self {
        Self::storage(Opcode::Replace, key, value, flags, expiry)
    }

    pub fn delete(key: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Delete as u8, Bytes::new(), key, Bytes::new())
    }

    pub fn increment(key: impl Into<Bytes>, delta: u64, initial: u64, expiry: u32) -> Self {
        Self::counter(Opcode::Increment, key, delta, initial, expiry)
    }

    pub fn decrement(key: impl Into<Bytes>, delta: u64, initial: u64, expiry: u32) -> Self {
        Self::counter(Opcode::Decrement, key, delta, initial, expiry)
    }

    pub fn version() -> Self {
        Self::new(Opcode::Version as u8, Bytes::new(), Bytes::new(), Bytes::new())
    }

    fn storage(
        opcode: Opcode,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        flags: u32,
        expiry: u32,
    ) -> Self {
        let extras = StoreExtras { flags, expiry }.encode();
        Self::new(opcode as u8, extras, key, value)
    }

    fn counter(opcode: Opcode, key: impl Into<Bytes>, delta: u64, initial: u64, expiry: u32) -> Self {
        let extras = CounterExtras {
            delta,
            initial,
            expiry,
        }
        .encode();
        Self::new(opcode as u8, extras, key, Bytes::new())
    }

    /// Set the correlation token echoed by the server
    pub fn with_opaque(mut self, opaque: u32) -> Self {
        self.header.opaque = opaque;
        self
    }

    /// Set the CAS token
    pub fn with_cas(mut self, cas: u64) -> Self {
        self.header.cas = cas;
        self
    }

    pub fn opcode(&self) -> u8 {
        self.header.opcode
    }

    pub fn opaque(&self) -> u32 {
        self.header.opaque
    }
}
