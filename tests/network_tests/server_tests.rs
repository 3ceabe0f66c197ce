//! Server Tests
//!
//! Tests verify:
//! - Request/response round trips over TCP
//! - Pipelined requests answered in order
//! - Partial frames held until complete
//! - Malformed and oversized frames handled without losing the stream
//! - Connection limits and shutdown
//! - Store faults and handler panics closing only their own connection

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use membin::config::ConfigBuilder;
use membin::network::{Server, ShutdownHandle};
use membin::protocol::{encode_request, read_response, Request, Status, HEADER_SIZE};
use membin::store::{CounterOutcome, Delta, Expiry, PutMode, PutOutcome, Record, StoreResult};
use membin::{Client, Config, Dispatcher, MemoryStore, Store, StoreError};

// =============================================================================
// Helper Functions
// =============================================================================

struct TestServer {
    addr: SocketAddr,
    handle: ShutdownHandle,
    thread: Option<JoinHandle<()>>,
    max_body_length: u32,
}

impl TestServer {
    fn start() -> Self {
        Self::start_with(Config::builder())
    }

    fn start_with(builder: ConfigBuilder) -> Self {
        let config = builder.listen_addr("127.0.0.1:0").build();
        let store = Arc::new(MemoryStore::from_config(&config));
        Self::launch(config, store)
    }

    fn start_with_store(store: Arc<dyn Store>) -> Self {
        let config = Config::builder().listen_addr("127.0.0.1:0").build();
        Self::launch(config, store)
    }

    fn launch(config: Config, store: Arc<dyn Store>) -> Self {
        let max_body_length = config.max_body_length();

        let dispatcher = Arc::new(Dispatcher::new(store, &config));
        let mut server = Server::new(config, dispatcher);

        let addr = server.bind().unwrap();
        let handle = server.shutdown_handle();
        let thread = thread::spawn(move || server.run().unwrap());

        Self {
            addr,
            handle,
            thread: Some(thread),
            max_body_length,
        }
    }

    fn client(&self) -> Client {
        let client = Client::connect(self.addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client
    }

    fn raw(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream
    }

    fn stop(&mut self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Memory store that fails `get` on two reserved keys
#[derive(Default)]
struct FaultyStore {
    inner: MemoryStore,
}

impl Store for FaultyStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Record>> {
        match key {
            b"fault" => Err(StoreError::Backend("injected fault".to_string())),
            b"panic" => panic!("injected panic"),
            _ => self.inner.get(key),
        }
    }

    fn put(&self, key: Bytes, record: Record, mode: PutMode) -> StoreResult<PutOutcome> {
        self.inner.put(key, record, mode)
    }

    fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        self.inner.delete(key)
    }

    fn compare_and_swap_numeric(
        &self,
        key: Bytes,
        delta: Delta,
        initial: u64,
        expiry: Expiry,
    ) -> StoreResult<CounterOutcome> {
        self.inner.compare_and_swap_numeric(key, delta, initial, expiry)
    }
}

/// Send `key` as a GET on its own connection and expect it to be closed
/// without an answer, while `bystander` keeps being served
fn assert_failure_is_isolated(key: &'static str) {
    let server = TestServer::start_with_store(Arc::new(FaultyStore::default()));

    let mut bystander = server.client();
    assert_eq!(bystander.set("k", "v", 0, 0).unwrap().status, Status::Success);

    let mut stream = server.raw();
    stream.write_all(&encode_request(&Request::get(key))).unwrap();

    let mut rest = [0u8; 64];
    match stream.read(&mut rest) {
        Ok(0) => {}
        Err(e) if e.kind() == ErrorKind::ConnectionReset => {}
        other => panic!("Expected closed connection, got {:?}", other),
    }

    // The open connection and new ones are unaffected
    let get = bystander.get("k").unwrap();
    assert_eq!(get.value, Some(Bytes::from_static(b"v")));

    let mut fresh = server.client();
    assert_eq!(fresh.get("k").unwrap().status, Status::Success);
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_client_round_trip() {
    let server = TestServer::start();
    let mut client = server.client();

    let set = client.set("greeting", "hello", 5, 0).unwrap();
    assert_eq!(set.status, Status::Success);

    let get = client.get("greeting").unwrap();
    assert_eq!(get.status, Status::Success);
    assert_eq!(get.flags(), Some(5));
    assert_eq!(get.value, Some(Bytes::from_static(b"hello")));

    let version = client.version().unwrap();
    assert_eq!(version.value, Some(Bytes::from_static(membin::VERSION.as_bytes())));
}

#[test]
fn test_unknown_opcode_over_tcp() {
    let server = TestServer::start();
    let mut client = server.client();

    let response = client.execute(Request::new(0x7f, Bytes::new(), "k", "v")).unwrap();
    assert_eq!(response.status, Status::UnknownCommand);

    // Connection stays usable
    assert_eq!(client.get("k").unwrap().status, Status::KeyNotFound);
}

#[test]
fn test_pipelined_requests_answered_in_order() {
    let server = TestServer::start();
    let mut stream = server.raw();

    let mut batch = Vec::new();
    batch.extend(encode_request(&Request::set("p", "1", 0, 0).with_opaque(1)));
    batch.extend(encode_request(&Request::get("p").with_opaque(2)));
    batch.extend(encode_request(&Request::delete("p").with_opaque(3)));
    batch.extend(encode_request(&Request::get("p").with_opaque(4)));
    stream.write_all(&batch).unwrap();

    let answers: Vec<(u32, Status)> = (0..4)
        .map(|_| {
            let response = read_response(&mut stream, server.max_body_length).unwrap();
            (response.opaque, response.status)
        })
        .collect();

    assert_eq!(
        answers,
        vec![
            (1, Status::Success),
            (2, Status::Success),
            (3, Status::Success),
            (4, Status::KeyNotFound),
        ]
    );
}

// =============================================================================
// Framing Tests
// =============================================================================

#[test]
fn test_truncated_frame_waits_for_rest() {
    let server = TestServer::start();
    let mut stream = server.raw();

    // body_len = 8 extras + 3 key + 89 value = 100
    let frame = encode_request(&Request::set("foo", vec![b'x'; 89], 0, 0).with_opaque(21));
    stream.write_all(&frame[..HEADER_SIZE + 10]).unwrap();

    stream.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    let mut pending = [0u8; 1];
    let err = stream.read(&mut pending).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut));

    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(&frame[HEADER_SIZE + 10..]).unwrap();

    let response = read_response(&mut stream, server.max_body_length).unwrap();
    assert_eq!(response.opaque, 21);
    assert_eq!(response.status, Status::Success);
}

#[test]
fn test_inconsistent_lengths_answered_and_stream_continues() {
    let server = TestServer::start();
    let mut stream = server.raw();

    let mut bad = encode_request(&Request::get("abcd").with_opaque(5));
    bad[2..4].copy_from_slice(&10u16.to_be_bytes());
    stream.write_all(&bad).unwrap();
    stream.write_all(&encode_request(&Request::version().with_opaque(6))).unwrap();

    let rejected = read_response(&mut stream, server.max_body_length).unwrap();
    assert_eq!(rejected.opaque, 5);
    assert_eq!(rejected.status, Status::InvalidArguments);

    let version = read_response(&mut stream, server.max_body_length).unwrap();
    assert_eq!(version.opaque, 6);
    assert_eq!(version.status, Status::Success);
}

#[test]
fn test_oversized_frame_skipped() {
    let mut server = TestServer::start_with(Config::builder().max_value_size(16));
    let mut stream = server.raw();

    let value_len = server.max_body_length as usize + 1;
    let oversized = encode_request(&Request::set("big", vec![b'x'; value_len], 0, 0).with_opaque(31));
    stream.write_all(&oversized).unwrap();
    stream.write_all(&encode_request(&Request::get("big").with_opaque(32))).unwrap();

    let rejected = read_response(&mut stream, server.max_body_length).unwrap();
    assert_eq!(rejected.opaque, 31);
    assert_eq!(rejected.status, Status::ValueTooLarge);

    let get = read_response(&mut stream, server.max_body_length).unwrap();
    assert_eq!(get.opaque, 32);
    assert_eq!(get.status, Status::KeyNotFound);

    server.stop();
}

#[test]
fn test_bad_magic_closes_connection() {
    let server = TestServer::start();
    let mut stream = server.raw();

    let mut frame = encode_request(&Request::get("foo").with_opaque(9));
    frame[0] = 0x42;
    stream.write_all(&frame).unwrap();

    let response = read_response(&mut stream, server.max_body_length).unwrap();
    assert_eq!(response.status, Status::InvalidArguments);
    assert_eq!(response.opaque, 0);

    let mut rest = [0u8; 16];
    match stream.read(&mut rest) {
        Ok(0) => {}
        Err(e) if e.kind() == ErrorKind::ConnectionReset => {}
        other => panic!("Expected closed connection, got {:?}", other),
    }
}

// =============================================================================
// Connection Management Tests
// =============================================================================

#[test]
fn test_max_connections_enforced() {
    let server = TestServer::start_with(Config::builder().max_connections(1));

    let mut first = server.client();
    assert_eq!(first.version().unwrap().status, Status::Success);

    let mut second = server.client();
    assert!(second.version().is_err());

    // Capacity frees up once the first client leaves
    drop(first);
    let mut served = false;
    for _ in 0..100 {
        let mut retry = server.client();
        if retry.version().is_ok() {
            served = true;
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert!(served);
}

#[test]
fn test_connections_are_independent() {
    let server = TestServer::start();
    let mut a = server.client();
    let mut b = server.client();

    a.set("shared", "from-a", 0, 0).unwrap();
    let get = b.get("shared").unwrap();
    assert_eq!(get.value, Some(Bytes::from_static(b"from-a")));
}

#[test]
fn test_shutdown_closes_connections() {
    let mut server = TestServer::start();
    let mut client = server.client();
    assert_eq!(client.version().unwrap().status, Status::Success);

    server.stop();
    assert!(server.handle.is_shutdown());

    assert!(client.version().is_err());
    assert!(TcpStream::connect(server.addr).is_err());
}

// =============================================================================
// Fault Isolation Tests
// =============================================================================

#[test]
fn test_store_fault_closes_only_that_connection() {
    assert_failure_is_isolated("fault");
}

#[test]
fn test_handler_panic_closes_only_that_connection() {
    assert_failure_is_isolated("panic");
}
