//! Configuration for membin
//!
//! Centralized configuration with sensible defaults.

/// Main configuration for a membin server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Largest value accepted by a store command (in bytes)
    pub max_value_size: usize,

    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// Accounted bytes the store may hold (0 = unlimited)
    pub memory_limit: usize,

    /// Number of independently locked shards in the memory store
    pub store_shards: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:11211".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            max_value_size: 1024 * 1024,    // 1 MB
            memory_limit: 64 * 1024 * 1024, // 64 MB
            store_shards: 16,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Largest body a request frame may declare
    ///
    /// A maximal value plus the largest key and extras the header can describe.
    pub fn max_body_length(&self) -> u32 {
        let limit = self
            .max_value_size
            .saturating_add(u16::MAX as usize + u8::MAX as usize);
        u32::try_from(limit).unwrap_or(u32::MAX)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the largest accepted value (in bytes)
    pub fn max_value_size(mut self, size: usize) -> Self {
        self.config.max_value_size = size;
        self
    }

    /// Set the largest accepted value in kilobytes, saturating on overflow
    pub fn max_value_kb(self, kb: usize) -> Self {
        self.max_value_size(kb.saturating_mul(1024))
    }

    /// Set the store memory limit (in bytes)
    pub fn memory_limit(mut self, size: usize) -> Self {
        self.config.memory_limit = size;
        self
    }

    /// Set the store memory limit in megabytes, saturating on overflow
    pub fn memory_limit_mb(self, mb: usize) -> Self {
        self.memory_limit(mb.saturating_mul(1024 * 1024))
    }

    /// Set the number of store shards (at least one)
    pub fn store_shards(mut self, count: usize) -> Self {
        self.config.store_shards = count.max(1);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
