//! Dispatch Module
//!
//! Routes decoded requests to the store.
//!
//! ## Request Lifecycle
//! ```text
//! Received ──► Validated ──► Executed ──► Responded
//!    │             │
//!    │ unknown     │ bad extras / key / value
//!    ▼             ▼
//! UNKNOWN_COMMAND  INVALID_ARGUMENTS / VALUE_TOO_LARGE
//! ```
//!
//! Every path ends in exactly one response. Only a store backend fault
//! escapes as an error, and the connection decides what to do with it.

mod handlers;
mod table;

use std::sync::Arc;

use crate::config::Config;
use crate::error::{FramingError, Result, StoreError};
use crate::protocol::{Extras, Header, Request, Response, Status};
use crate::store::{unix_now, Store, StoreResult};

pub use table::{CommandSpec, CommandTable, KeyRule, ValueRule};

/// Longest key a command may carry
pub const MAX_KEY_LENGTH: usize = 250;

/// Handler function signature used by command table entries
pub type Handler = fn(&Context<'_>) -> StoreResult<Response>;

/// Everything a handler may look at while executing one request
pub struct Context<'a> {
    pub store: &'a dyn Store,
    pub request: &'a Request,
    /// Extras destructured according to the command's shape
    pub extras: Extras,
    /// Unix time the request is executed at
    pub now: u64,
    pub version: &'a str,
}

/// Routes requests through the command table
pub struct Dispatcher {
    table: CommandTable,
    store: Arc<dyn Store>,
    max_value_size: usize,
    version: String,
}

impl Dispatcher {
    /// Create a dispatcher with the builtin command table
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self::with_table(store, config, CommandTable::builtin())
    }

    pub fn with_table(store: Arc<dyn Store>, config: &Config, table: CommandTable) -> Self {
        Self {
            table,
            store,
            max_value_size: config.max_value_size,
            version: crate::VERSION.to_string(),
        }
    }

    /// Execute one request
    ///
    /// Returns `Err` only when the store backend fails.
    pub fn dispatch(&self, request: &Request) -> Result<Response> {
        let Some(spec) = self.table.lookup(request.opcode()) else {
            tracing::debug!("Unknown opcode 0x{:02x}", request.opcode());
            return Ok(Response::to(request, Status::UnknownCommand));
        };

        let extras = match self.validate(spec, request) {
            Ok(extras) => extras,
            Err(status) => {
                tracing::debug!("Rejected {} request: {:?}", spec.opcode, status);
                return Ok(Response::to(request, status));
            }
        };

        let ctx = Context {
            store: self.store.as_ref(),
            request,
            extras,
            now: unix_now(),
            version: &self.version,
        };

        match (spec.handler)(&ctx) {
            Ok(response) => {
                tracing::trace!("{} -> {:?}", spec.opcode, response.status);
                Ok(response)
            }
            Err(StoreError::OutOfMemory { requested, limit }) => {
                tracing::warn!(
                    "Store full: {} request needs {} more bytes (limit {})",
                    spec.opcode,
                    requested,
                    limit
                );
                Ok(Response::to(request, Status::OutOfMemory))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Response for a frame the assembler could not decode
    pub fn reject(&self, header: &Header, error: &FramingError) -> Response {
        tracing::debug!("Rejected frame for opcode 0x{:02x}: {}", header.opcode, error);
        Response::to_header(header, error.status())
    }

    /// Check a request against its table entry
    fn validate(&self, spec: &CommandSpec, request: &Request) -> std::result::Result<Extras, Status> {
        let extras = spec
            .extras
            .decode(request.opcode(), &request.extras)
            .map_err(|e| e.status())?;

        let key_ok = match spec.key {
            KeyRule::Required => !request.key.is_empty() && request.key.len() <= MAX_KEY_LENGTH,
            KeyRule::Forbidden => request.key.is_empty(),
        };
        if !key_ok {
            return Err(Status::InvalidArguments);
        }

        match spec.value {
            ValueRule::Forbidden if !request.value.is_empty() => Err(Status::InvalidArguments),
            ValueRule::Allowed if request.value.len() > self.max_value_size => {
                Err(Status::ValueTooLarge)
            }
            _ => Ok(extras),
        }
    }

    /// Commands this dispatcher accepts
    pub fn table(&self) -> &CommandTable {
        &self.table
    }
}
