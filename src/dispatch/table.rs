//! Command table
//!
//! Maps each opcode to the request shape it accepts and the handler that
//! executes it. Built once at startup; lookups are a single array index.

use std::fmt;

use crate::protocol::{ExtrasShape, Opcode};
use super::handlers;
use super::Handler;

/// Whether a command takes a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRule {
    Required,
    Forbidden,
}

/// Whether a command takes a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRule {
    Allowed,
    Forbidden,
}

/// One command table entry
#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub opcode: Opcode,
    pub extras: ExtrasShape,
    pub key: KeyRule,
    pub value: ValueRule,
    pub handler: Handler,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("opcode", &self.opcode)
            .field("extras", &self.extras)
            .field("key", &self.key)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

/// Opcode-indexed command table
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: [Option<CommandSpec>; 256],
}

impl CommandTable {
    /// An empty table; every opcode is unknown
    pub fn empty() -> Self {
        Self {
            entries: [None; 256],
        }
    }

    /// The table of every supported command
    pub fn builtin() -> Self {
        use ExtrasShape::{Counter, Empty, Store};
        use KeyRule::{Forbidden as NoKey, Required};
        use ValueRule::{Allowed, Forbidden as NoValue};

        let mut table = Self::empty();
        let mut add = |opcode: Opcode,
                       extras: ExtrasShape,
                       key: KeyRule,
                       value: ValueRule,
                       handler: Handler| {
            table.register(CommandSpec {
                opcode,
                extras,
                key,
                value,
                handler,
            })
        };

        add(Opcode::Get, Empty, Required, NoValue, handlers::get);
        add(Opcode::Set, Store, Required, Allowed, handlers::set);
        add(Opcode::Add, Store, Required, Allowed, handlers::add);
        add(Opcode::Replace, Store, Required, Allowed, handlers::replace);
        add(Opcode::Delete, Empty, Required, NoValue, handlers::delete);
        add(Opcode::Increment, Counter, Required, NoValue, handlers::increment);
        add(Opcode::Decrement, Counter, Required, NoValue, handlers::decrement);
        add(Opcode::Version, Empty, NoKey, NoValue, handlers::version);

        table
    }

    /// Install or replace the entry for `spec.opcode`
    pub fn register(&mut self, spec: CommandSpec) {
        self.entries[spec.opcode as usize] = Some(spec);
    }

    pub fn lookup(&self, opcode: u8) -> Option<&CommandSpec> {
        self.entries[opcode as usize].as_ref()
    }

    /// Number of registered commands
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
