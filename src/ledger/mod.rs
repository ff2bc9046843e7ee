//! Ledger core
//!
//! Atomic account-to-account transfers.
//!
//! # Layers
//!
//! - [`store`]: `LedgerQueries` / `LedgerTx` / `TxSource` seams, with a
//!   PostgreSQL ([`postgres`]) and an in-memory ([`memory`]) backend
//! - [`coordinator`]: commit-or-rollback around one unit of work
//! - [`engine`]: the transfer sequence and account queries
//!
//! # Safety Invariants
//!
//! 1. **One transaction per transfer**: transfer row, both entries and both
//!    balance deltas commit together or not at all
//! 2. **Ascending lock order**: balances are updated lower account id first
//! 3. **Atomic increment**: balances change via `balance = balance + delta`,
//!    never via a value read earlier

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;


pub use coordinator::TxCoordinator;
pub use engine::TransferEngine;
pub use error::{LedgerError, TxPhase};
pub use memory::{LedgerOp, MemoryLedger};
pub use models::{
    Account, CreateAccountParams, Entry, ListParams, Transfer, TransferTxParams, TransferTxResult,
};
pub use postgres::PgLedger;
pub use store::{LedgerQueries, LedgerTx, TxSource};
