//! membin CLI Client
//!
//! Command-line interface for interacting with membin or any server
//! speaking the memcached binary protocol.

use clap::{Parser, Subcommand};
use membin::protocol::{Opcode, Response};
use membin::Client;

/// membin CLI
#[derive(Parser, Debug)]
#[command(name = "membin-cli")]
#[command(about = "CLI for the membin cache server")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:11211")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Store a value unconditionally
    Set(StoreArgs),

    /// Store a value only if the key is absent
    Add(StoreArgs),

    /// Store a value only if the key is present
    Replace(StoreArgs),

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Increment a counter
    Incr(CounterArgs),

    /// Decrement a counter (floors at zero)
    Decr(CounterArgs),

    /// Print the server version
    Version,
}

#[derive(clap::Args, Debug)]
struct StoreArgs {
    /// The key to store under
    key: String,

    /// The value to store
    value: String,

    /// Opaque client flags
    #[arg(short, long, default_value = "0")]
    flags: u32,

    /// Expiry: seconds from now (up to 30 days) or a Unix timestamp; 0 = never
    #[arg(short, long, default_value = "0")]
    expiry: u32,
}

#[derive(clap::Args, Debug)]
struct CounterArgs {
    /// The counter key
    key: String,

    /// Amount to add or subtract
    #[arg(default_value = "1")]
    delta: u64,

    /// Value to create the counter with if absent
    #[arg(short, long, default_value = "0")]
    initial: u64,

    /// Expiry applied when the counter is created
    #[arg(short, long, default_value = "0")]
    expiry: u32,
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    let result = match args.command {
        Commands::Get { key } => client.get(key),
        Commands::Set(a) => client.set(a.key, a.value, a.flags, a.expiry),
        Commands::Add(a) => client.add(a.key, a.value, a.flags, a.expiry),
        Commands::Replace(a) => client.replace(a.key, a.value, a.flags, a.expiry),
        Commands::Del { key } => client.delete(key),
        Commands::Incr(a) => client.increment(a.key, a.delta, a.initial, a.expiry),
        Commands::Decr(a) => client.decrement(a.key, a.delta, a.initial, a.expiry),
        Commands::Version => client.version(),
    };

    match result {
        Ok(response) => print_response(&response),
        Err(e) => {
            eprintln!("Request failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_response(response: &Response) {
    if !response.status.is_success() {
        eprintln!("({:?}) {}", response.status, response.status.message());
        std::process::exit(2);
    }

    match Opcode::try_from(response.opcode) {
        Ok(Opcode::Get) => {
            let value = response.value.clone().unwrap_or_default();
            println!("{}", String::from_utf8_lossy(&value));
            if let Some(flags) = response.flags() {
                eprintln!("(flags {})", flags);
            }
        }
        Ok(Opcode::Increment | Opcode::Decrement) => match response.counter() {
            Some(value) => println!("{}", value),
            None => println!("OK"),
        },
        Ok(Opcode::Version) => {
            let value = response.value.clone().unwrap_or_default();
            println!("{}", String::from_utf8_lossy(&value));
        }
        _ => println!("OK"),
    }
}
