//! PostgreSQL ledger store
//!
//! Balance changes are a single `UPDATE ... SET balance = balance + $1`
//! so the row lock and the increment happen in one statement.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use super::error::{LedgerError, TxPhase, sqlstate};
use super::models::{Account, CreateAccountParams, Entry, ListParams, Transfer};
use super::store::{LedgerQueries, LedgerTx, TxSource};

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";

/// Ledger backed by an injected connection pool
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TxSource for PgLedger {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::transaction(TxPhase::Begin, e))?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open PostgreSQL transaction. sqlx rolls back on drop.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

/// Foreign-key violations on insert mean the referenced account is gone.
/// `account_for` picks the missing account from the violated constraint.
fn map_insert_err(e: sqlx::Error, account_for: impl FnOnce(Option<&str>) -> i64) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &e
        && db_err.code().as_deref() == Some(sqlstate::FOREIGN_KEY_VIOLATION)
    {
        return LedgerError::AccountNotFound(account_for(db_err.constraint()));
    }
    e.into()
}

/// `transfers_to_account_id_fkey` names the destination, anything else the source
fn transfer_fk_account(
    constraint: Option<&str>,
    from_account_id: i64,
    to_account_id: i64,
) -> i64 {
    match constraint {
        Some(name) if name.contains("to_account_id") => to_account_id,
        _ => from_account_id,
    }
}

#[async_trait]
impl LedgerTx for PgTx {
    fn queries(&mut self) -> &mut dyn LedgerQueries {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        let PgTx { tx } = *self;
        tx.commit()
            .await
            .map_err(|e| LedgerError::transaction(TxPhase::Commit, e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        let PgTx { tx } = *self;
        tx.rollback()
            .await
            .map_err(|e| LedgerError::transaction(TxPhase::Rollback, e))
    }
}

#[async_trait]
impl LedgerQueries for PgTx {
    async fn create_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
    ) -> Result<Transfer, LedgerError> {
        let sql = format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount) \
             VALUES ($1, $2, $3) RETURNING {TRANSFER_COLUMNS}"
        );
        let transfer = sqlx::query_as::<_, Transfer>(&sql)
            .bind(from_account_id)
            .bind(to_account_id)
            .bind(amount)
            .fetch_one(self.conn())
            .await
            .map_err(|e| {
                map_insert_err(e, |c| transfer_fk_account(c, from_account_id, to_account_id))
            })?;
        Ok(transfer)
    }

    async fn create_entry(&mut self, account_id: i64, amount: i64) -> Result<Entry, LedgerError> {
        let sql = format!(
            "INSERT INTO entries (account_id, amount) VALUES ($1, $2) RETURNING {ENTRY_COLUMNS}"
        );
        let entry = sqlx::query_as::<_, Entry>(&sql)
            .bind(account_id)
            .bind(amount)
            .fetch_one(self.conn())
            .await
            .map_err(|e| map_insert_err(e, |_| account_id))?;
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        account_id: i64,
        delta: i64,
    ) -> Result<Account, LedgerError> {
        let sql = format!(
            "UPDATE accounts SET balance = balance + $1 WHERE id = $2 RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(delta)
            .bind(account_id)
            .fetch_optional(self.conn())
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn get_account(&mut self, account_id: i64) -> Result<Account, LedgerError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, Account>(&sql)
            .bind(account_id)
            .fetch_optional(self.conn())
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        let sql = format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3) \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(&params.owner)
            .bind(params.balance)
            .bind(&params.currency)
            .fetch_one(self.conn())
            .await?;
        Ok(account)
    }

    async fn list_accounts(&mut self, page: ListParams) -> Result<Vec<Account>, LedgerError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id LIMIT $1 OFFSET $2");
        let rows = sqlx::query_as::<_, Account>(&sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.conn())
            .await?;
        Ok(rows)
    }

    async fn get_transfer(&mut self, transfer_id: i64) -> Result<Transfer, LedgerError> {
        let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1");
        sqlx::query_as::<_, Transfer>(&sql)
            .bind(transfer_id)
            .fetch_optional(self.conn())
            .await?
            .ok_or(LedgerError::TransferNotFound(transfer_id))
    }

    async fn list_transfers(
        &mut self,
        account_id: i64,
        page: ListParams,
    ) -> Result<Vec<Transfer>, LedgerError> {
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers \
             WHERE from_account_id = $1 OR to_account_id = $1 \
             ORDER BY id LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, Transfer>(&sql)
            .bind(account_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.conn())
            .await?;
        Ok(rows)
    }

    async fn list_entries(
        &mut self,
        account_id: i64,
        page: ListParams,
    ) -> Result<Vec<Entry>, LedgerError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE account_id = $1 \
             ORDER BY id LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, Entry>(&sql)
            .bind(account_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.conn())
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_fk_picks_violated_side() {
        assert_eq!(
            transfer_fk_account(Some("transfers_to_account_id_fkey"), 1, 2),
            2
        );
        assert_eq!(
            transfer_fk_account(Some("transfers_from_account_id_fkey"), 1, 2),
            1
        );
        assert_eq!(transfer_fk_account(None, 1, 2), 1);
    }

    #[test]
    fn test_non_database_insert_error_passes_through() {
        let err = map_insert_err(sqlx::Error::PoolTimedOut, |_| 9);
        assert!(matches!(err, LedgerError::DataAccess(_)));
    }
}
