//! Store Module
//!
//! The key-value storage the dispatcher mutates.
//!
//! ## Responsibilities
//! - Hold zero or one [`Record`] per key
//! - Treat expired records as absent (removal may be lazy)
//! - Make every operation atomic per key, so that conditional stores and
//!   counters never race
//!
//! Any backend implementing [`Store`] can sit behind the dispatcher. The
//! bundled [`MemoryStore`] keeps everything in sharded hash maps.

mod record;
mod memory;

use bytes::Bytes;

use crate::error::StoreError;

pub use record::{unix_now, Expiry, Payload, Record, RECORD_OVERHEAD, RELATIVE_EXPIRY_LIMIT};
pub use memory::MemoryStore;

/// Result type of store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Condition under which [`Store::put`] writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Create or overwrite
    Always,
    /// Only when no live record exists
    IfAbsent,
    /// Only when a live record exists
    IfPresent,
}

/// What [`Store::put`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// `IfAbsent` found a live record
    Exists,
    /// `IfPresent` found nothing
    NotFound,
}

/// Counter adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    /// Add, wrapping at 2^64
    Increment(u64),
    /// Subtract, flooring at zero
    Decrement(u64),
}

impl Delta {
    pub fn apply(self, current: u64) -> u64 {
        match self {
            Delta::Increment(delta) => current.wrapping_add(delta),
            Delta::Decrement(delta) => current.saturating_sub(delta),
        }
    }
}

/// What [`Store::compare_and_swap_numeric`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOutcome {
    /// The key was absent and now holds the initial value
    Created(u64),
    /// The counter was adjusted to this value
    Updated(u64),
    /// The existing payload is not a number; nothing changed
    NonNumeric,
}

impl CounterOutcome {
    /// Counter value after the operation
    pub fn value(self) -> Option<u64> {
        match self {
            CounterOutcome::Created(value) | CounterOutcome::Updated(value) => Some(value),
            CounterOutcome::NonNumeric => None,
        }
    }
}

/// Storage contract required by the dispatcher
///
/// Each call is one atomic step with respect to other callers on the same
/// key. A request never issues more than one mutating call.
///
/// Keys and payloads handed to `put` and `compare_and_swap_numeric` may be
/// slices of a connection's read buffer. A backend that keeps them must copy.
pub trait Store: Send + Sync {
    /// Live record for `key`
    fn get(&self, key: &[u8]) -> StoreResult<Option<Record>>;

    /// Store `record` under `key` if `mode` allows it
    fn put(&self, key: Bytes, record: Record, mode: PutMode) -> StoreResult<PutOutcome>;

    /// Remove `key`; true if a live record was removed
    fn delete(&self, key: &[u8]) -> StoreResult<bool>;

    /// Adjust the counter at `key`, creating it with `initial` and `expiry`
    /// when absent
    fn compare_and_swap_numeric(
        &self,
        key: Bytes,
        delta: Delta,
        initial: u64,
        expiry: Expiry,
    ) -> StoreResult<CounterOutcome>;
}
