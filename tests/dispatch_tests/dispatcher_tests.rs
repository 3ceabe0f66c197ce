//! Dispatcher Tests
//!
//! Tests verify:
//! - Each command's status and body against a live store
//! - Validation of extras, key and value before any store access
//! - Unknown opcodes answered without touching the store
//! - Store failures mapped to a status or surfaced as errors

use std::sync::Arc;

use bytes::Bytes;
use membin::dispatch::{CommandTable, MAX_KEY_LENGTH};
use membin::protocol::{Header, Magic, Opcode, Request, Response, Status};
use membin::store::{
    CounterOutcome, Delta, Expiry, MemoryStore, PutMode, PutOutcome, Record, Store, StoreResult,
};
use membin::{Config, Dispatcher, FramingError, MembinError, StoreError};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (Arc<MemoryStore>, Dispatcher) {
    setup_with(Config::default())
}

fn setup_with(config: Config) -> (Arc<MemoryStore>, Dispatcher) {
    let store = Arc::new(MemoryStore::from_config(&config));
    let dispatcher = Dispatcher::new(store.clone(), &config);
    (store, dispatcher)
}

fn run(dispatcher: &Dispatcher, request: Request) -> Response {
    dispatcher.dispatch(&request).unwrap()
}

fn value_of(response: &Response) -> Bytes {
    response.value.clone().unwrap_or_default()
}

/// A store whose every call fails
struct BrokenStore;

impl Store for BrokenStore {
    fn get(&self, _key: &[u8]) -> StoreResult<Option<Record>> {
        Err(StoreError::Backend("disk on fire".to_string()))
    }

    fn put(&self, _key: Bytes, _record: Record, _mode: PutMode) -> StoreResult<PutOutcome> {
        Err(StoreError::Backend("disk on fire".to_string()))
    }

    fn delete(&self, _key: &[u8]) -> StoreResult<bool> {
        Err(StoreError::Backend("disk on fire".to_string()))
    }

    fn compare_and_swap_numeric(
        &self,
        _key: Bytes,
        _delta: Delta,
        _initial: u64,
        _expiry: Expiry,
    ) -> StoreResult<CounterOutcome> {
        Err(StoreError::Backend("disk on fire".to_string()))
    }
}

// =============================================================================
// Store Command Tests
// =============================================================================

#[test]
fn test_set_then_get_returns_value_and_flags() {
    let (_store, dispatcher) = setup();

    let set = run(&dispatcher, Request::set("foo", "bar", 7, 0).with_opaque(11));
    assert_eq!(set.status, Status::Success);
    assert_eq!(set.opaque, 11);
    assert_eq!(set.value, None);

    let get = run(&dispatcher, Request::get("foo").with_opaque(12));
    assert_eq!(get.status, Status::Success);
    assert_eq!(get.opaque, 12);
    assert_eq!(get.flags(), Some(7));
    assert_eq!(value_of(&get), Bytes::from_static(b"bar"));
}

#[test]
fn test_second_set_overwrites() {
    let (_store, dispatcher) = setup();

    run(&dispatcher, Request::set("k", "v1", 0, 0));
    run(&dispatcher, Request::set("k", "v2", 0, 0));

    let get = run(&dispatcher, Request::get("k"));
    assert_eq!(value_of(&get), Bytes::from_static(b"v2"));
}

#[test]
fn test_get_missing_key() {
    let (_store, dispatcher) = setup();

    let get = run(&dispatcher, Request::get("nope"));
    assert_eq!(get.status, Status::KeyNotFound);
    assert_eq!(get.body(), Bytes::from_static(b"Not found"));
}

#[test]
fn test_add_only_when_absent() {
    let (_store, dispatcher) = setup();

    let first = run(&dispatcher, Request::add("k", "one", 0, 0));
    assert_eq!(first.status, Status::Success);

    let second = run(&dispatcher, Request::add("k", "two", 0, 0));
    assert_eq!(second.status, Status::KeyExists);

    let get = run(&dispatcher, Request::get("k"));
    assert_eq!(value_of(&get), Bytes::from_static(b"one"));
}

#[test]
fn test_replace_only_when_present() {
    let (store, dispatcher) = setup();

    let missing = run(&dispatcher, Request::replace("k", "v", 0, 0));
    assert_eq!(missing.status, Status::KeyNotFound);
    assert!(store.is_empty());

    run(&dispatcher, Request::set("k", "old", 0, 0));
    let replaced = run(&dispatcher, Request::replace("k", "new", 3, 0));
    assert_eq!(replaced.status, Status::Success);

    let get = run(&dispatcher, Request::get("k"));
    assert_eq!(value_of(&get), Bytes::from_static(b"new"));
    assert_eq!(get.flags(), Some(3));
}

#[test]
fn test_delete_then_get() {
    let (_store, dispatcher) = setup();
    run(&dispatcher, Request::set("k", "v", 0, 0));

    assert_eq!(run(&dispatcher, Request::delete("k")).status, Status::Success);
    assert_eq!(run(&dispatcher, Request::get("k")).status, Status::KeyNotFound);
    assert_eq!(run(&dispatcher, Request::delete("k")).status, Status::KeyNotFound);
}

#[test]
fn test_set_with_past_absolute_expiry_is_invisible() {
    let (_store, dispatcher) = setup();

    // Above the thirty-day cutoff, so an absolute timestamp in 1970
    let set = run(&dispatcher, Request::set("k", "v", 0, 2_592_001));
    assert_eq!(set.status, Status::Success);

    assert_eq!(run(&dispatcher, Request::get("k")).status, Status::KeyNotFound);
}

#[test]
fn test_set_with_relative_expiry_is_visible() {
    let (_store, dispatcher) = setup();

    run(&dispatcher, Request::set("k", "v", 0, 60));
    assert_eq!(run(&dispatcher, Request::get("k")).status, Status::Success);
}

// =============================================================================
// Counter Command Tests
// =============================================================================

#[test]
fn test_increment_creates_then_adds() {
    let (_store, dispatcher) = setup();

    let created = run(&dispatcher, Request::increment("n", 5, 100, 0));
    assert_eq!(created.status, Status::Success);
    assert_eq!(created.counter(), Some(100));

    let bumped = run(&dispatcher, Request::increment("n", 5, 100, 0));
    assert_eq!(bumped.counter(), Some(105));

    let get = run(&dispatcher, Request::get("n"));
    assert_eq!(value_of(&get), Bytes::from_static(b"105"));
    assert_eq!(get.flags(), Some(0));
}

#[test]
fn test_decrement_floors_at_zero() {
    let (_store, dispatcher) = setup();
    run(&dispatcher, Request::set("n", "2", 0, 0));

    let response = run(&dispatcher, Request::decrement("n", 5, 0, 0));
    assert_eq!(response.status, Status::Success);
    assert_eq!(response.counter(), Some(0));
}

#[test]
fn test_increment_non_numeric() {
    let (_store, dispatcher) = setup();
    run(&dispatcher, Request::set("n", "abc", 0, 0));

    let response = run(&dispatcher, Request::increment("n", 1, 0, 0));
    assert_eq!(response.status, Status::NonNumeric);

    let get = run(&dispatcher, Request::get("n"));
    assert_eq!(value_of(&get), Bytes::from_static(b"abc"));
}

// =============================================================================
// Version Tests
// =============================================================================

#[test]
fn test_version_reports_crate_version() {
    let (_store, dispatcher) = setup();

    let response = run(&dispatcher, Request::version().with_opaque(3));
    assert_eq!(response.status, Status::Success);
    assert_eq!(response.opaque, 3);
    assert_eq!(value_of(&response), Bytes::from_static(membin::VERSION.as_bytes()));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_unknown_opcode_echoes_opaque_and_leaves_store() {
    let (store, dispatcher) = setup();

    let request = Request::new(0x7f, Bytes::new(), "k", "v").with_opaque(0xdead_beef);
    let response = run(&dispatcher, request);

    assert_eq!(response.status, Status::UnknownCommand);
    assert_eq!(response.opcode, 0x7f);
    assert_eq!(response.opaque, 0xdead_beef);
    assert_eq!(response.body(), Bytes::from_static(b"Unknown command"));
    assert!(store.is_empty());
}

#[test]
fn test_set_without_extras_is_invalid() {
    let (store, dispatcher) = setup();

    let request = Request::new(Opcode::Set as u8, Bytes::new(), "k", "v");
    let response = run(&dispatcher, request);

    assert_eq!(response.status, Status::InvalidArguments);
    assert!(store.is_empty());
}

#[test]
fn test_get_with_extras_is_invalid() {
    let (_store, dispatcher) = setup();

    let request = Request::new(Opcode::Get as u8, vec![0u8; 4], "k", Bytes::new());
    assert_eq!(run(&dispatcher, request).status, Status::InvalidArguments);
}

#[test]
fn test_get_with_value_is_invalid() {
    let (_store, dispatcher) = setup();

    let request = Request::new(Opcode::Get as u8, Bytes::new(), "k", "unexpected");
    assert_eq!(run(&dispatcher, request).status, Status::InvalidArguments);
}

#[test]
fn test_missing_key_is_invalid() {
    let (store, dispatcher) = setup();

    assert_eq!(run(&dispatcher, Request::get("")).status, Status::InvalidArguments);
    assert_eq!(run(&dispatcher, Request::set("", "v", 0, 0)).status, Status::InvalidArguments);
    assert!(store.is_empty());
}

#[test]
fn test_key_length_limit() {
    let (_store, dispatcher) = setup();

    let longest = "k".repeat(MAX_KEY_LENGTH);
    let set = run(&dispatcher, Request::set(longest, "v", 0, 0));
    assert_eq!(set.status, Status::Success);

    let too_long = "k".repeat(MAX_KEY_LENGTH + 1);
    let set = run(&dispatcher, Request::set(too_long, "v", 0, 0));
    assert_eq!(set.status, Status::InvalidArguments);
}

#[test]
fn test_version_with_key_is_invalid() {
    let (_store, dispatcher) = setup();

    let request = Request::new(Opcode::Version as u8, Bytes::new(), "k", Bytes::new());
    assert_eq!(run(&dispatcher, request).status, Status::InvalidArguments);
}

#[test]
fn test_value_too_large() {
    let config = Config::builder().max_value_size(16).build();
    let (store, dispatcher) = setup_with(config);

    let fits = run(&dispatcher, Request::set("k", vec![b'x'; 16], 0, 0));
    assert_eq!(fits.status, Status::Success);

    let too_big = run(&dispatcher, Request::set("k2", vec![b'x'; 17], 0, 0));
    assert_eq!(too_big.status, Status::ValueTooLarge);
    assert_eq!(too_big.body(), Bytes::from_static(b"Too large."));
    assert_eq!(store.len(), 1);
}

// =============================================================================
// Store Failure Tests
// =============================================================================

#[test]
fn test_out_of_memory_status() {
    let config = Config::builder().memory_limit(100).build();
    let (store, dispatcher) = setup_with(config);

    let response = run(&dispatcher, Request::set("k", vec![b'x'; 80], 0, 0));
    assert_eq!(response.status, Status::OutOfMemory);
    assert!(store.is_empty());
}

#[test]
fn test_backend_failure_is_an_error() {
    let store: Arc<dyn Store> = Arc::new(BrokenStore);
    let dispatcher = Dispatcher::new(store, &Config::default());

    let result = dispatcher.dispatch(&Request::get("k"));
    assert!(matches!(result, Err(MembinError::Store(StoreError::Backend(_)))));

    // Validation failures never reach the store
    let response = dispatcher.dispatch(&Request::get("")).unwrap();
    assert_eq!(response.status, Status::InvalidArguments);
}

// =============================================================================
// Rejected Frame Tests
// =============================================================================

#[test]
fn test_reject_maps_framing_errors() {
    let (_store, dispatcher) = setup();
    let header = Header {
        magic: Magic::Request as u8,
        opcode: Opcode::Set as u8,
        opaque: 99,
        ..Header::default()
    };

    let invalid = dispatcher.reject(
        &header,
        &FramingError::InvalidLengths {
            body: 2,
            extras: 8,
            key: 3,
        },
    );
    assert_eq!(invalid.status, Status::InvalidArguments);
    assert_eq!(invalid.opaque, 99);
    assert_eq!(invalid.opcode, Opcode::Set as u8);

    let too_large = dispatcher.reject(
        &header,
        &FramingError::FrameTooLarge {
            length: 5_000_000,
            limit: 1_000_000,
        },
    );
    assert_eq!(too_large.status, Status::ValueTooLarge);
}

// =============================================================================
// Command Table Tests
// =============================================================================

#[test]
fn test_builtin_table_covers_every_opcode() {
    let table = CommandTable::builtin();
    assert_eq!(table.len(), Opcode::ALL.len());

    let (_store, dispatcher) = setup();
    assert_eq!(dispatcher.table().len(), table.len());

    for opcode in Opcode::ALL {
        let spec = table.lookup(opcode as u8).unwrap();
        assert_eq!(spec.opcode, opcode);
    }
    assert!(table.lookup(0x7f).is_none());
}

#[test]
fn test_custom_table_limits_commands() {
    let builtin = CommandTable::builtin();
    let mut table = CommandTable::empty();
    table.register(*builtin.lookup(Opcode::Get as u8).unwrap());

    let store = Arc::new(MemoryStore::default());
    let dispatcher = Dispatcher::with_table(store, &Config::default(), table);
    assert_eq!(dispatcher.table().len(), 1);
    assert!(CommandTable::empty().is_empty());

    assert_eq!(run(&dispatcher, Request::get("k")).status, Status::KeyNotFound);
    assert_eq!(
        run(&dispatcher, Request::set("k", "v", 0, 0)).status,
        Status::UnknownCommand
    );
}
