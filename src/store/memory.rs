//! In-memory store
//!
//! Hash maps split into shards, each behind its own RwLock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::config::Config;
use crate::error::StoreError;
use super::record::{unix_now, Expiry, Payload, Record};
use super::{CounterOutcome, Delta, PutMode, PutOutcome, Store, StoreResult};

type Shard = HashMap<Bytes, Record>;

/// Memory-only store with no eviction
///
/// ## Concurrency:
/// - Keys are spread over shards by CRC32; each shard has its own RwLock
/// - Reads of live records take the read lock only
/// - Every mutation holds its shard's write lock for the whole
///   read-modify-write, so it is atomic per key
/// - `used`: atomic byte counter shared by all shards
///
/// Stored keys and payloads are copied out of the caller's buffers, so the
/// accounted bytes are the bytes actually retained.
pub struct MemoryStore {
    shards: Box<[RwLock<Shard>]>,

    /// Accounted bytes currently held
    used: AtomicUsize,

    /// Maximum accounted bytes (0 = unlimited)
    limit: usize,
}

impl MemoryStore {
    /// Create a store with `shards` lock shards and a memory limit in bytes
    pub fn new(shards: usize, limit: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        Self {
            shards,
            used: AtomicUsize::new(0),
            limit,
        }
    }

    /// Create a store sized by the config
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.store_shards, config.memory_limit)
    }

    /// Number of records held, including expired ones not yet removed
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Accounted bytes currently held
    pub fn memory_used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, key: &[u8]) -> &RwLock<Shard> {
        let index = crc32fast::hash(key) as usize % self.shards.len();
        &self.shards[index]
    }

    /// Drop `key` from a write-locked shard if its record has expired
    fn remove_expired(&self, shard: &mut Shard, key: &[u8], now: u64) {
        let expired = shard.get(key).is_some_and(|record| !record.is_live(now));
        if expired {
            if let Some((key, record)) = shard.remove_entry(key) {
                self.release(record.footprint(key.len()));
            }
        }
    }

    /// Account for a record growing from `old` to `new` bytes
    ///
    /// Fails without side effects when growth would pass the limit.
    fn charge(&self, old: usize, new: usize) -> StoreResult<()> {
        if new <= old {
            self.release(old - new);
            return Ok(());
        }

        let extra = new - old;
        if self.limit == 0 {
            self.used.fetch_add(extra, Ordering::AcqRel);
            return Ok(());
        }

        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(extra).filter(|next| *next <= self.limit)
            })
            .map(|_| ())
            .map_err(|_| StoreError::OutOfMemory {
                requested: extra,
                limit: self.limit,
            })
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Record>> {
        let now = unix_now();
        let shard = self.shard(key);

        {
            let map = shard.read();
            match map.get(key) {
                None => return Ok(None),
                Some(record) if record.is_live(now) => return Ok(Some(record.clone())),
                Some(_) => {}
            }
        }

        // Expired: remove it now that someone has looked
        self.remove_expired(&mut shard.write(), key, now);
        Ok(None)
    }

    fn put(&self, key: Bytes, record: Record, mode: PutMode) -> StoreResult<PutOutcome> {
        let now = unix_now();
        let mut map = self.shard(&key).write();
        self.remove_expired(&mut map, &key, now);

        let old = map.get(&key[..]).map(|existing| existing.footprint(key.len()));
        match (mode, old.is_some()) {
            (PutMode::IfAbsent, true) => return Ok(PutOutcome::Exists),
            (PutMode::IfPresent, false) => return Ok(PutOutcome::NotFound),
            _ => {}
        }

        self.charge(old.unwrap_or(0), record.footprint(key.len()))?;
        map.insert(Bytes::copy_from_slice(&key), record.detached());
        Ok(PutOutcome::Stored)
    }

    fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        let now = unix_now();
        let mut map = self.shard(key).write();

        match map.remove_entry(key) {
            Some((key, record)) => {
                self.release(record.footprint(key.len()));
                Ok(record.is_live(now))
            }
            None => Ok(false),
        }
    }

    fn compare_and_swap_numeric(
        &self,
        key: Bytes,
        delta: Delta,
        initial: u64,
        expiry: Expiry,
    ) -> StoreResult<CounterOutcome> {
        let now = unix_now();
        let mut map = self.shard(&key).write();
        self.remove_expired(&mut map, &key, now);

        if let Some(record) = map.get_mut(&key[..]) {
            let Some(current) = record.payload.as_counter() else {
                return Ok(CounterOutcome::NonNumeric);
            };

            let next = delta.apply(current);
            let updated = Record::new(record.flags, record.expiry, Payload::Counter(next));
            self.charge(record.footprint(key.len()), updated.footprint(key.len()))?;
            *record = updated;
            return Ok(CounterOutcome::Updated(next));
        }

        let record = Record::new(0, expiry, Payload::Counter(initial));
        self.charge(0, record.footprint(key.len()))?;
        map.insert(Bytes::copy_from_slice(&key), record);
        Ok(CounterOutcome::Created(initial))
    }
}
