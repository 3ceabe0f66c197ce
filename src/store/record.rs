//! Stored records
//!
//! A record is what one key maps to: client flags, an expiry and a payload.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Wire expiries above this many seconds are absolute Unix timestamps
pub const RELATIVE_EXPIRY_LIMIT: u32 = 60 * 60 * 24 * 30;

/// Fixed per-record bookkeeping charged against the memory limit
pub const RECORD_OVERHEAD: usize = 48;

/// Current Unix time in seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// When a record stops being visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Never,
    /// Unix timestamp (seconds) at which the record expires
    At(u64),
}

impl Expiry {
    /// Interpret a wire expiry
    ///
    /// `0` never expires; up to thirty days is relative to `now`; anything
    /// larger is an absolute Unix timestamp.
    pub fn from_wire(seconds: u32, now: u64) -> Self {
        match seconds {
            0 => Expiry::Never,
            s if s <= RELATIVE_EXPIRY_LIMIT => Expiry::At(now + u64::from(s)),
            s => Expiry::At(u64::from(s)),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(deadline) => *deadline <= now,
        }
    }
}

/// Stored bytes of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Raw client bytes
    Bytes(Bytes),

    /// A counter produced by increment/decrement
    Counter(u64),
}

impl Payload {
    /// Bytes returned to a GET; counters read back as ASCII decimal
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Payload::Bytes(bytes) => bytes.clone(),
            Payload::Counter(value) => Bytes::from(value.to_string()),
        }
    }

    /// Numeric view of the payload, if it has one
    ///
    /// Byte payloads count when they are an ASCII decimal that fits a u64.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            Payload::Counter(value) => Some(*value),
            Payload::Bytes(bytes) => {
                if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
                    return None;
                }
                std::str::from_utf8(bytes).ok()?.parse().ok()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Bytes(bytes) => bytes.len(),
            Payload::Counter(value) => value.checked_ilog10().map_or(1, |digits| digits as usize + 1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The value held for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Opaque client tag
    pub flags: u32,
    pub expiry: Expiry,
    pub payload: Payload,
}

impl Record {
    pub fn new(flags: u32, expiry: Expiry, payload: Payload) -> Self {
        Self {
            flags,
            expiry,
            payload,
        }
    }

    /// A record holding raw bytes
    pub fn bytes(flags: u32, expiry: Expiry, value: impl Into<Bytes>) -> Self {
        Self::new(flags, expiry, Payload::Bytes(value.into()))
    }

    /// The same record holding its own copy of the payload bytes
    ///
    /// A payload decoded from a request is a slice of the connection's read
    /// buffer and keeps all of that buffer alive while it is referenced.
    pub fn detached(mut self) -> Self {
        if let Payload::Bytes(bytes) = &mut self.payload {
            let owned = Bytes::copy_from_slice(bytes);
            *bytes = owned;
        }
        self
    }

    pub fn is_live(&self, now: u64) -> bool {
        !self.expiry.is_expired(now)
    }

    /// Bytes charged against the memory limit when stored under a key of
    /// `key_len` bytes
    pub fn footprint(&self, key_len: usize) -> usize {
        key_len + self.payload.len() + RECORD_OVERHEAD
    }
}
