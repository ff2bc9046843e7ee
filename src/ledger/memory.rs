//! In-memory ledger store
//!
//! Committed rows live behind a mutex. A transaction stages its writes and
//! publishes them on commit. `add_account_balance` takes a per-account async
//! lock that is held until the transaction ends, which gives the same
//! blocking behaviour as PostgreSQL row locks: two transactions locking the
//! same accounts in opposite order really do wait on each other.
//!
//! Id sequences are not rolled back, like PostgreSQL sequences.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OwnedMutexGuard;

use super::error::{LedgerError, TxPhase};
use super::models::{Account, CreateAccountParams, Entry, ListParams, Transfer};
use super::store::{LedgerQueries, LedgerTx, TxSource};

/// Operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    Begin,
    CreateTransfer,
    CreateEntry,
    AddAccountBalance,
    Commit,
    Rollback,
}

#[derive(Default)]
struct Committed {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

struct Inner {
    committed: Mutex<Committed>,
    row_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    next_account_id: AtomicI64,
    next_entry_id: AtomicI64,
    next_transfer_id: AtomicI64,
    /// op -> remaining calls before the injected failure fires
    faults: Mutex<HashMap<LedgerOp, usize>>,
    /// account ids in the order `add_account_balance` was called
    balance_calls: Mutex<Vec<i64>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding one of these locks only happens in a failing test
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Inner {
    fn row_lock(&self, account_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        lock(&self.row_locks)
            .entry(account_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn check_fault(&self, op: LedgerOp) -> Result<(), LedgerError> {
        let mut faults = lock(&self.faults);
        let Some(remaining) = faults.get_mut(&op) else {
            return Ok(());
        };
        *remaining -= 1;
        if *remaining > 0 {
            return Ok(());
        }
        faults.remove(&op);
        tracing::debug!(?op, "injected ledger failure");
        Err(LedgerError::DataAccess(sqlx::Error::Protocol(format!(
            "injected {op:?} failure"
        ))))
    }
}

/// Shared handle to an in-memory ledger. Clones see the same data.
#[derive(Clone)]
pub struct MemoryLedger {
    inner: Arc<Inner>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                committed: Mutex::new(Committed::default()),
                row_locks: Mutex::new(HashMap::new()),
                next_account_id: AtomicI64::new(1),
                next_entry_id: AtomicI64::new(1),
                next_transfer_id: AtomicI64::new(1),
                faults: Mutex::new(HashMap::new()),
                balance_calls: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Make the `nth` (1-based) upcoming call of `op` fail once
    pub fn fail_on(&self, op: LedgerOp, nth: usize) {
        lock(&self.inner.faults).insert(op, nth.max(1));
    }

    /// Committed row, bypassing any transaction
    pub fn account(&self, account_id: i64) -> Option<Account> {
        lock(&self.inner.committed)
            .accounts
            .get(&account_id)
            .cloned()
    }

    pub fn entries(&self) -> Vec<Entry> {
        lock(&self.inner.committed)
            .entries
            .values()
            .cloned()
            .collect()
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        lock(&self.inner.committed)
            .transfers
            .values()
            .cloned()
            .collect()
    }

    pub fn balance_calls(&self) -> Vec<i64> {
        lock(&self.inner.balance_calls).clone()
    }

    pub fn clear_balance_calls(&self) {
        lock(&self.inner.balance_calls).clear();
    }
}

#[async_trait]
impl TxSource for MemoryLedger {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        self.inner
            .check_fault(LedgerOp::Begin)
            .map_err(|e| LedgerError::transaction(TxPhase::Begin, e))?;
        Ok(Box::new(MemoryTx {
            inner: self.inner.clone(),
            accounts: BTreeMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
            row_guards: HashMap::new(),
        }))
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}

/// Open in-memory transaction
pub struct MemoryTx {
    inner: Arc<Inner>,
    /// Rows created or locked by this transaction
    accounts: BTreeMap<i64, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
    row_guards: HashMap<i64, OwnedMutexGuard<()>>,
}

impl MemoryTx {
    /// Row as seen by this transaction: own writes first, then committed data
    fn visible_account(&self, account_id: i64) -> Option<Account> {
        self.accounts
            .get(&account_id)
            .cloned()
            .or_else(|| lock(&self.inner.committed).accounts.get(&account_id).cloned())
    }

    fn require_account(&self, account_id: i64) -> Result<Account, LedgerError> {
        self.visible_account(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))
    }
}

fn paginate<T>(rows: impl Iterator<Item = T>, page: ListParams) -> Vec<T> {
    rows.skip(page.offset.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl LedgerTx for MemoryTx {
    fn queries(&mut self) -> &mut dyn LedgerQueries {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.inner
            .check_fault(LedgerOp::Commit)
            .map_err(|e| LedgerError::transaction(TxPhase::Commit, e))?;

        let MemoryTx {
            inner,
            accounts,
            entries,
            transfers,
            row_guards,
        } = *self;
        {
            let mut committed = lock(&inner.committed);
            committed.accounts.extend(accounts);
            committed
                .entries
                .extend(entries.into_iter().map(|e| (e.id, e)));
            committed
                .transfers
                .extend(transfers.into_iter().map(|t| (t.id, t)));
        }
        // Row locks are released only after the new balances are visible
        drop(row_guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        self.inner
            .check_fault(LedgerOp::Rollback)
            .map_err(|e| LedgerError::transaction(TxPhase::Rollback, e))
    }
}

#[async_trait]
impl LedgerQueries for MemoryTx {
    async fn create_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
    ) -> Result<Transfer, LedgerError> {
        self.inner.check_fault(LedgerOp::CreateTransfer)?;
        self.require_account(from_account_id)?;
        self.require_account(to_account_id)?;

        let transfer = Transfer {
            id: self.inner.next_transfer_id.fetch_add(1, Ordering::SeqCst),
            from_account_id,
            to_account_id,
            amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, account_id: i64, amount: i64) -> Result<Entry, LedgerError> {
        self.inner.check_fault(LedgerOp::CreateEntry)?;
        self.require_account(account_id)?;

        let entry = Entry {
            id: self.inner.next_entry_id.fetch_add(1, Ordering::SeqCst),
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        account_id: i64,
        delta: i64,
    ) -> Result<Account, LedgerError> {
        lock(&self.inner.balance_calls).push(account_id);
        self.inner.check_fault(LedgerOp::AddAccountBalance)?;

        if !self.row_guards.contains_key(&account_id) {
            let row_lock = self.inner.row_lock(account_id);
            let guard = row_lock.lock_owned().await;
            self.row_guards.insert(account_id, guard);
            // Stand-in for a database round trip: other transactions get to
            // run while this one holds the lock
            tokio::task::yield_now().await;
        }

        // Holding the row lock: the committed balance cannot move under us
        let mut account = self.require_account(account_id)?;
        account.balance = account.balance.checked_add(delta).ok_or_else(|| {
            LedgerError::DataAccess(sqlx::Error::Protocol(format!(
                "balance out of range for account {account_id}"
            )))
        })?;
        self.accounts.insert(account_id, account.clone());
        Ok(account)
    }

    async fn get_account(&mut self, account_id: i64) -> Result<Account, LedgerError> {
        self.require_account(account_id)
    }

    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        let account = Account {
            id: self.inner.next_account_id.fetch_add(1, Ordering::SeqCst),
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn list_accounts(&mut self, page: ListParams) -> Result<Vec<Account>, LedgerError> {
        let mut merged = lock(&self.inner.committed).accounts.clone();
        merged.extend(self.accounts.iter().map(|(id, a)| (*id, a.clone())));
        Ok(paginate(merged.into_values(), page))
    }

    async fn get_transfer(&mut self, transfer_id: i64) -> Result<Transfer, LedgerError> {
        self.transfers
            .iter()
            .find(|t| t.id == transfer_id)
            .cloned()
            .or_else(|| {
                lock(&self.inner.committed)
                    .transfers
                    .get(&transfer_id)
                    .cloned()
            })
            .ok_or(LedgerError::TransferNotFound(transfer_id))
    }

    async fn list_transfers(
        &mut self,
        account_id: i64,
        page: ListParams,
    ) -> Result<Vec<Transfer>, LedgerError> {
        let mut merged = lock(&self.inner.committed).transfers.clone();
        merged.extend(self.transfers.iter().map(|t| (t.id, t.clone())));
        let rows = merged
            .into_values()
            .filter(|t| t.from_account_id == account_id || t.to_account_id == account_id);
        Ok(paginate(rows, page))
    }

    async fn list_entries(
        &mut self,
        account_id: i64,
        page: ListParams,
    ) -> Result<Vec<Entry>, LedgerError> {
        let mut merged = lock(&self.inner.committed).entries.clone();
        merged.extend(self.entries.iter().map(|e| (e.id, e.clone())));
        let rows = merged
            .into_values()
            .filter(|e| e.account_id == account_id);
        Ok(paginate(rows, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn params(owner: &str, balance: i64) -> CreateAccountParams {
        CreateAccountParams {
            owner: owner.to_string(),
            balance,
            currency: "USD".to_string(),
        }
    }

    async fn seed(ledger: &MemoryLedger, balance: i64) -> Account {
        let mut tx = ledger.begin().await.unwrap();
        let account = tx
            .queries()
            .create_account(params("seed", balance))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        account
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let ledger = MemoryLedger::new();
        let account = seed(&ledger, 100).await;

        let mut tx = ledger.begin().await.unwrap();
        let updated = tx
            .queries()
            .add_account_balance(account.id, 50)
            .await
            .unwrap();
        assert_eq!(updated.balance, 150);
        assert_eq!(ledger.account(account.id).unwrap().balance, 100);

        tx.commit().await.unwrap();
        assert_eq!(ledger.account(account.id).unwrap().balance, 150);
    }

    #[tokio::test]
    async fn test_dropped_tx_discards_writes_and_releases_lock() {
        let ledger = MemoryLedger::new();
        let account = seed(&ledger, 100).await;

        {
            let mut tx = ledger.begin().await.unwrap();
            tx.queries().create_entry(account.id, -10).await.unwrap();
            tx.queries()
                .add_account_balance(account.id, -10)
                .await
                .unwrap();
        }

        assert!(ledger.entries().is_empty());
        assert_eq!(ledger.account(account.id).unwrap().balance, 100);

        // Lock must be free again
        let mut tx = ledger.begin().await.unwrap();
        let fut = tx.queries().add_account_balance(account.id, 1);
        let updated = tokio::time::timeout(Duration::from_secs(1), fut)
            .await
            .expect("row lock still held")
            .unwrap();
        assert_eq!(updated.balance, 101);
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_writer() {
        let ledger = MemoryLedger::new();
        let account = seed(&ledger, 0).await;

        let mut first = ledger.begin().await.unwrap();
        first
            .queries()
            .add_account_balance(account.id, 5)
            .await
            .unwrap();

        let other = ledger.clone();
        let id = account.id;
        let second = tokio::spawn(async move {
            let mut tx = other.begin().await.unwrap();
            let acc = tx.queries().add_account_balance(id, 7).await.unwrap();
            tx.commit().await.unwrap();
            acc.balance
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!second.is_finished(), "second writer must wait for the lock");

        first.commit().await.unwrap();
        assert_eq!(second.await.unwrap(), 12);
        assert_eq!(ledger.account(account.id).unwrap().balance, 12);
    }

    #[tokio::test]
    async fn test_reversed_lock_order_deadlocks() {
        let ledger = MemoryLedger::new();
        let a = seed(&ledger, 100).await.id;
        let b = seed(&ledger, 100).await.id;

        let lock_both = |first: i64, second: i64| {
            let ledger = ledger.clone();
            async move {
                let mut tx = ledger.begin().await?;
                tx.queries().add_account_balance(first, -1).await?;
                tx.queries().add_account_balance(second, 1).await?;
                tx.commit().await
            }
        };

        let both = futures::future::join(lock_both(a, b), lock_both(b, a));
        let res = tokio::time::timeout(Duration::from_millis(200), both).await;
        assert!(res.is_err(), "opposite lock order must wait on each other");

        // Timed-out transactions were dropped, so their locks are free again
        assert_eq!(ledger.account(a).unwrap().balance, 100);
        let (x, y) = futures::future::join(lock_both(a, b), lock_both(a, b)).await;
        x.unwrap();
        y.unwrap();
        assert_eq!(ledger.account(a).unwrap().balance, 98);
        assert_eq!(ledger.account(b).unwrap().balance, 102);
    }

    #[tokio::test]
    async fn test_missing_account() {
        let ledger = MemoryLedger::new();
        let mut tx = ledger.begin().await.unwrap();
        let err = tx.queries().add_account_balance(42, 1).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(42)));
        let err = tx.queries().create_entry(42, 1).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(42)));
    }

    #[tokio::test]
    async fn test_fail_on_nth_call() {
        let ledger = MemoryLedger::new();
        let account = seed(&ledger, 0).await;
        ledger.fail_on(LedgerOp::CreateEntry, 2);

        let mut tx = ledger.begin().await.unwrap();
        assert!(tx.queries().create_entry(account.id, 1).await.is_ok());
        assert!(matches!(
            tx.queries().create_entry(account.id, 1).await,
            Err(LedgerError::DataAccess(_))
        ));
        // Fires once only
        assert!(tx.queries().create_entry(account.id, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_accounts_pagination() {
        let ledger = MemoryLedger::new();
        for i in 0..7 {
            seed(&ledger, i).await;
        }
        let mut tx = ledger.begin().await.unwrap();
        let page = tx
            .queries()
            .list_accounts(ListParams::page(2, 5).unwrap())
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, 6);
        assert_eq!(page[1].id, 7);
    }
}
