//! membin Server Binary
//!
//! Starts the TCP server for membin.

use std::sync::Arc;

use clap::Parser;
use membin::network::Server;
use membin::{Config, Dispatcher, MemoryStore};
use tracing_subscriber::{fmt, EnvFilter};

/// membin Server
#[derive(Parser, Debug)]
#[command(name = "membin-server")]
#[command(about = "In-memory cache server speaking the memcached binary protocol")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:11211")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short = 'c', long, default_value = "1024")]
    max_connections: usize,

    /// Memory limit for stored items in MB (0 = unlimited)
    #[arg(short = 'm', long, default_value = "64")]
    memory_mb: usize,

    /// Largest accepted value in KB
    #[arg(short = 'I', long, default_value = "1024")]
    max_value_kb: usize,

    /// Number of lock shards in the store
    #[arg(long, default_value = "16")]
    shards: usize,

    /// Idle read timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,membin=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("membin Server v{}", membin::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .memory_limit_mb(args.memory_mb)
        .max_value_kb(args.max_value_kb)
        .store_shards(args.shards)
        .read_timeout_ms(args.read_timeout_ms)
        .build();

    let store = Arc::new(MemoryStore::from_config(&config));
    tracing::info!(
        "Store initialized: {} shards, {} byte limit",
        store.shard_count(),
        config.memory_limit
    );

    let dispatcher = Arc::new(Dispatcher::new(store, &config));

    // Start server
    let mut server = Server::new(config, dispatcher);
    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
