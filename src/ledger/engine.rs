//! Transfer Engine
//!
//! One transfer = one transaction:
//!
//! ```text
//! create_transfer → create_entry(from, -amt) → create_entry(to, +amt)
//!     → add_account_balance(lower id) → add_account_balance(higher id)
//! ```
//!
//! Balances are always touched lower account id first, whichever side is
//! the source. Every transaction therefore takes its row locks in the same
//! global order and two transfers can never wait on each other in a cycle.

use std::sync::Arc;

use tracing::{info, warn};

use super::coordinator::TxCoordinator;
use super::error::LedgerError;
use super::models::{
    Account, CreateAccountParams, Entry, ListParams, Transfer, TransferTxParams,
    TransferTxResult, is_supported_currency,
};
use super::store::{LedgerQueries, TxSource};
use crate::config::LedgerConfig;

pub struct TransferEngine {
    coordinator: TxCoordinator,
    config: LedgerConfig,
}

impl TransferEngine {
    pub fn new(source: Arc<dyn TxSource>) -> Self {
        Self::with_config(source, LedgerConfig::default())
    }

    pub fn with_config(source: Arc<dyn TxSource>, config: LedgerConfig) -> Self {
        Self {
            coordinator: TxCoordinator::new(source),
            config,
        }
    }

    pub fn coordinator(&self) -> &TxCoordinator {
        &self.coordinator
    }

    /// Move `amount` from one account to another
    ///
    /// Callers are expected to have checked that both accounts exist. On
    /// error nothing was written.
    pub async fn transfer(&self, params: TransferTxParams) -> Result<TransferTxResult, LedgerError> {
        let TransferTxParams {
            from_account_id: from,
            to_account_id: to,
            amount,
        } = params;

        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if from == to {
            return Err(LedgerError::SameAccount);
        }

        let allow_overdraft = self.config.allow_overdraft;
        let result = self
            .coordinator
            .execute(move |q| {
                Box::pin(async move {
                    let transfer = q.create_transfer(from, to, amount).await?;
                    let from_entry = q.create_entry(from, -amount).await?;
                    let to_entry = q.create_entry(to, amount).await?;

                    let (from_account, to_account) = if from < to {
                        add_money(q, from, -amount, to, amount).await?
                    } else {
                        let (to_account, from_account) =
                            add_money(q, to, amount, from, -amount).await?;
                        (from_account, to_account)
                    };

                    if !allow_overdraft && from_account.balance < 0 {
                        return Err(LedgerError::InsufficientFunds {
                            account_id: from,
                            balance: from_account.balance,
                        });
                    }

                    Ok(TransferTxResult {
                        transfer,
                        from_account,
                        to_account,
                        from_entry,
                        to_entry,
                    })
                })
            })
            .await;

        match &result {
            Ok(res) => info!(
                transfer_id = res.transfer.id,
                from, to, amount, "Transfer committed"
            ),
            Err(e) => warn!(from, to, amount, error = %e, "Transfer failed"),
        }
        result
    }

    pub async fn create_account(&self, params: CreateAccountParams) -> Result<Account, LedgerError> {
        if !is_supported_currency(&params.currency) {
            return Err(LedgerError::UnsupportedCurrency(params.currency));
        }
        let account = self
            .coordinator
            .execute(move |q| Box::pin(async move { q.create_account(params).await }))
            .await?;
        info!(account_id = account.id, owner = %account.owner, "Account created");
        Ok(account)
    }

    pub async fn get_account(&self, account_id: i64) -> Result<Account, LedgerError> {
        self.coordinator
            .execute(move |q| Box::pin(async move { q.get_account(account_id).await }))
            .await
    }

    pub async fn list_accounts(&self, page: ListParams) -> Result<Vec<Account>, LedgerError> {
        page.check()?;
        self.coordinator
            .execute(move |q| Box::pin(async move { q.list_accounts(page).await }))
            .await
    }

    pub async fn get_transfer(&self, transfer_id: i64) -> Result<Transfer, LedgerError> {
        self.coordinator
            .execute(move |q| Box::pin(async move { q.get_transfer(transfer_id).await }))
            .await
    }

    /// Transfers of an existing account
    pub async fn list_transfers(
        &self,
        account_id: i64,
        page: ListParams,
    ) -> Result<Vec<Transfer>, LedgerError> {
        page.check()?;
        self.coordinator
            .execute(move |q| {
                Box::pin(async move {
                    q.get_account(account_id).await?;
                    q.list_transfers(account_id, page).await
                })
            })
            .await
    }

    /// Entries of an existing account
    pub async fn list_entries(
        &self,
        account_id: i64,
        page: ListParams,
    ) -> Result<Vec<Entry>, LedgerError> {
        page.check()?;
        self.coordinator
            .execute(move |q| {
                Box::pin(async move {
                    q.get_account(account_id).await?;
                    q.list_entries(account_id, page).await
                })
            })
            .await
    }

    pub async fn health_check(&self) -> Result<(), LedgerError> {
        self.coordinator.source().health_check().await
    }
}

/// Apply two balance deltas in the given order
async fn add_money(
    q: &mut dyn LedgerQueries,
    account_id1: i64,
    amount1: i64,
    account_id2: i64,
    amount2: i64,
) -> Result<(Account, Account), LedgerError> {
    let account1 = q.add_account_balance(account_id1, amount1).await?;
    let account2 = q.add_account_balance(account_id2, amount2).await?;
    Ok((account1, account2))
}
