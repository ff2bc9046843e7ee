//! Ledger records and operation parameters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::error::LedgerError;

/// Currencies an account may be opened in
pub const SUPPORTED_CURRENCIES: [&str; 3] = ["USD", "EUR", "CAD"];

pub fn is_supported_currency(currency: &str) -> bool {
    SUPPORTED_CURRENCIES.contains(&currency)
}

/// Account row
///
/// `balance` is in minor currency units and is only ever changed through
/// an atomic increment inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Account {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = "alice")]
    pub owner: String,
    #[schema(example = 1000)]
    pub balance: i64,
    #[schema(example = "USD")]
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// One leg of a transfer: negative for a debit, positive for a credit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    #[schema(example = -100)]
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Money movement record. `amount` is the positive magnitude moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    #[schema(example = 100)]
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

/// Limit/offset pagination for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    pub limit: i64,
    pub offset: i64,
}

impl ListParams {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// Build from a 1-based page id and a page size
    pub fn page(page_id: i64, page_size: i64) -> Result<Self, LedgerError> {
        let offset = page_id
            .checked_sub(1)
            .and_then(|p| p.checked_mul(page_size))
            .ok_or_else(|| {
                LedgerError::InvalidPage(format!(
                    "page {page_id} of size {page_size} out of range"
                ))
            })?;
        let page = Self {
            limit: page_size,
            offset,
        };
        page.check()?;
        Ok(page)
    }

    pub fn check(&self) -> Result<(), LedgerError> {
        if self.limit < 1 {
            return Err(LedgerError::InvalidPage(format!("limit {} < 1", self.limit)));
        }
        if self.offset < 0 {
            return Err(LedgerError::InvalidPage(format!("offset {} < 0", self.offset)));
        }
        Ok(())
    }
}

/// Input of [`TransferEngine::transfer`](super::engine::TransferEngine::transfer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Everything a committed transfer produced
///
/// The account snapshots carry the balances right after this transfer's
/// delta. Other transfers may have committed since.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_currencies() {
        assert!(is_supported_currency("USD"));
        assert!(is_supported_currency("CAD"));
        assert!(!is_supported_currency("usd"));
        assert!(!is_supported_currency("BTC"));
    }

    #[test]
    fn test_list_params_page() {
        assert_eq!(ListParams::page(1, 5).unwrap(), ListParams::new(5, 0));
        assert_eq!(ListParams::page(3, 10).unwrap(), ListParams::new(10, 20));
    }

    #[test]
    fn test_list_params_page_overflow() {
        assert!(matches!(
            ListParams::page(i64::MAX, 100),
            Err(LedgerError::InvalidPage(_))
        ));
        assert!(matches!(
            ListParams::page(i64::MIN, 5),
            Err(LedgerError::InvalidPage(_))
        ));
        assert!(matches!(
            ListParams::page(1, 0),
            Err(LedgerError::InvalidPage(_))
        ));
    }
}
