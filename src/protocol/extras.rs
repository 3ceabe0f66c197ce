//! Command extras
//!
//! Fixed-size fields that precede the key in a request body. Their layout
//! depends on the opcode:
//!
//! ```text
//! Store (set/add/replace):     flags (4) | expiry (4)
//! Counter (incr/decr):         delta (8) | initial (8) | expiry (4)
//! ```

use bytes::{Buf, BufMut};

use crate::error::FramingError;

/// Extras layout an opcode requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtrasShape {
    /// No extras allowed
    Empty,
    /// Flags and expiry
    Store,
    /// Delta, initial value and expiry
    Counter,
}

impl ExtrasShape {
    /// Exact number of bytes this shape occupies
    pub fn len(self) -> usize {
        match self {
            ExtrasShape::Empty => 0,
            ExtrasShape::Store => StoreExtras::LEN,
            ExtrasShape::Counter => CounterExtras::LEN,
        }
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Destructure raw extras for `opcode`
    pub fn decode(self, opcode: u8, mut bytes: &[u8]) -> Result<Extras, FramingError> {
        if bytes.len() != self.len() {
            return Err(FramingError::BadExtras {
                opcode,
                expected: self.len(),
                got: bytes.len(),
            });
        }

        Ok(match self {
            ExtrasShape::Empty => Extras::None,
            ExtrasShape::Store => Extras::Store(StoreExtras {
                flags: bytes.get_u32(),
                expiry: bytes.get_u32(),
            }),
            ExtrasShape::Counter => Extras::Counter(CounterExtras {
                delta: bytes.get_u64(),
                initial: bytes.get_u64(),
                expiry: bytes.get_u32(),
            }),
        })
    }
}

/// Decoded extras
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extras {
    None,
    Store(StoreExtras),
    Counter(CounterExtras),
}

/// Extras of set/add/replace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreExtras {
    pub flags: u32,
    pub expiry: u32,
}

impl StoreExtras {
    pub const LEN: usize = 8;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        buf.put_u32(self.flags);
        buf.put_u32(self.expiry);
        buf
    }
}

/// Extras of increment/decrement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterExtras {
    pub delta: u64,
    pub initial: u64,
    pub expiry: u32,
}

impl CounterExtras {
    pub const LEN: usize = 20;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        buf.put_u64(self.delta);
        buf.put_u64(self.initial);
        buf.put_u32(self.expiry);
        buf
    }
}
