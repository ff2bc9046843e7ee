//! Bank Ledger - transactional transfer engine
//!
//! Moves money between two accounts as one atomic unit: a transfer record,
//! a debit entry, a credit entry and both balance changes commit together
//! or not at all. Concurrent transfers in opposite directions never
//! deadlock because balance rows are always locked in ascending id order.
//!
//! # Modules
//!
//! - [`ledger`] - Records, store seams, transaction coordinator, transfer engine
//! - [`db`] - PostgreSQL pool and schema
//! - [`gateway`] - HTTP API (axum) with OpenAPI docs
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;

// Convenient re-exports at crate root
pub use ledger::{
    Account, Entry, LedgerError, MemoryLedger, PgLedger, Transfer, TransferEngine,
    TransferTxParams, TransferTxResult, TxCoordinator,
};
