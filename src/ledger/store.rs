//! Ledger Store seams
//!
//! [`LedgerQueries`] is the capability a unit of work runs against. Every
//! method is a single atomic read or write inside the ambient transaction.
//! [`TxSource`] opens transactions and [`LedgerTx`] finishes them.

use async_trait::async_trait;

use super::error::LedgerError;
use super::models::{Account, CreateAccountParams, Entry, ListParams, Transfer};

/// Transaction-scoped ledger operations
#[async_trait]
pub trait LedgerQueries: Send {
    /// Insert a transfer record
    async fn create_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
    ) -> Result<Transfer, LedgerError>;

    /// Insert one ledger entry (negative = debit, positive = credit)
    async fn create_entry(&mut self, account_id: i64, amount: i64) -> Result<Entry, LedgerError>;

    /// Atomically add `delta` to the balance and return the updated row.
    ///
    /// Takes the row lock on the account for the rest of the transaction.
    async fn add_account_balance(
        &mut self,
        account_id: i64,
        delta: i64,
    ) -> Result<Account, LedgerError>;

    async fn get_account(&mut self, account_id: i64) -> Result<Account, LedgerError>;

    async fn create_account(&mut self, params: CreateAccountParams)
    -> Result<Account, LedgerError>;

    /// Accounts ordered by id
    async fn list_accounts(&mut self, page: ListParams) -> Result<Vec<Account>, LedgerError>;

    async fn get_transfer(&mut self, transfer_id: i64) -> Result<Transfer, LedgerError>;

    /// Transfers where the account is either side, ordered by id
    async fn list_transfers(
        &mut self,
        account_id: i64,
        page: ListParams,
    ) -> Result<Vec<Transfer>, LedgerError>;

    /// Entries of one account, ordered by id
    async fn list_entries(
        &mut self,
        account_id: i64,
        page: ListParams,
    ) -> Result<Vec<Entry>, LedgerError>;
}

/// An open transaction
///
/// Dropping it without calling [`commit`](LedgerTx::commit) discards every
/// write made through [`queries`](LedgerTx::queries).
#[async_trait]
pub trait LedgerTx: Send {
    fn queries(&mut self) -> &mut dyn LedgerQueries;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

/// Transactional data source (connection pool or in-memory ledger)
#[async_trait]
pub trait TxSource: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError>;

    /// Cheap liveness check
    async fn health_check(&self) -> Result<(), LedgerError>;
}
