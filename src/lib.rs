//! A replicated concurrency-control and recovery engine.
//!
//! Simulates a fixed set of sites holding (possibly replicated) variables,
//! serialized through strict two-phase locking with deadlock detection, and
//! read-only transactions served from multiversion snapshots. See
//! `Engine` for the single entry point a driver submits instructions to.

pub mod config;
pub mod engine;
pub mod error;
pub mod instruction;
pub mod lock_manager;
pub mod output;
pub mod site;
pub mod site_manager;
pub mod transaction;
pub mod transaction_manager;
pub mod variable;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{RepCrecError, Result};
pub use instruction::{parse_line, Instruction};
pub use output::{MemorySink, OutputSink, WriterSink};
