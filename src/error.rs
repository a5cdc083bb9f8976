//! Error types for the replicated concurrency-control engine.
//!
//! Defines a unified error type that can represent errors from every
//! component (instruction parsing, the lock manager, the site manager, the
//! transaction manager).

use std::fmt;
use std::io;

/// Unified error type for engine operations.
#[derive(Debug)]
pub enum RepCrecError {
    /// I/O error (reading the instruction stream, writing output).
    Io(io::Error),
    /// Malformed instruction line.
    Parse(String),
    /// A site id outside `[1, site_count]` was referenced.
    UnknownSite(u32),
    /// A variable id outside `[1, var_count]` was referenced.
    UnknownVariable(u32),
    /// A transaction id was referenced before `begin`/`beginRO`, or after it
    /// already ended.
    UnknownTransaction(u32),
    /// An instruction referenced a transaction in a way its kind forbids,
    /// e.g. a write issued against a read-only transaction.
    Transaction(String),
    /// Internal invariant violation. Should never surface outside tests.
    Internal(String),
}

impl fmt::Display for RepCrecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepCrecError::Io(e) => write!(f, "{}", e),
            RepCrecError::Parse(msg) => write!(f, "parse error: {}", msg),
            RepCrecError::UnknownSite(k) => write!(f, "no such site: {}", k),
            RepCrecError::UnknownVariable(i) => write!(f, "no such variable: x{}", i),
            RepCrecError::UnknownTransaction(j) => write!(f, "no such transaction: T{}", j),
            RepCrecError::Transaction(msg) => write!(f, "{}", msg),
            RepCrecError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for RepCrecError {}

impl From<io::Error> for RepCrecError {
    fn from(e: io::Error) -> Self {
        RepCrecError::Io(e)
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, RepCrecError>;
