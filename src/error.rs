//! Error types for membin
//!
//! Provides a unified error type for all operations, plus the two focused
//! error enums the protocol and storage layers report.

use thiserror::Error;

use crate::protocol::Status;

/// Result type alias using MembinError
pub type Result<T> = std::result::Result<T, MembinError>;

/// Unified error type for membin operations
#[derive(Debug, Error)]
pub enum MembinError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Framing Errors
    // -------------------------------------------------------------------------
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors produced while carving the byte stream into frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("truncated header: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("bad magic byte 0x{0:02x}")]
    BadMagic(u8),

    #[error("body length mismatch: header declares {expected} bytes, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("body length {body} shorter than extras ({extras}) plus key ({key})")]
    InvalidLengths { body: u32, extras: u8, key: u16 },

    #[error("opcode 0x{opcode:02x} expects {expected} bytes of extras, got {got}")]
    BadExtras { opcode: u8, expected: usize, got: usize },

    #[error("frame body of {length} bytes exceeds limit of {limit}")]
    FrameTooLarge { length: u32, limit: u32 },
}

impl FramingError {
    /// Whether the stream can no longer be trusted to be aligned on a frame
    /// boundary. A fatal error ends the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FramingError::BadMagic(_))
    }

    /// Status code reported to the client for this error
    pub fn status(&self) -> Status {
        match self {
            FramingError::FrameTooLarge { .. } => Status::ValueTooLarge,
            _ => Status::InvalidArguments,
        }
    }
}

/// Errors reported by a [`Store`](crate::store::Store) backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Storing the record would exceed the configured memory limit
    #[error("out of memory: {requested} bytes requested, limit is {limit}")]
    OutOfMemory { requested: usize, limit: usize },

    /// The backend failed in a way unrelated to the request
    #[error("backend failure: {0}")]
    Backend(String),
}
