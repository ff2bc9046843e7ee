//! Ledger Error Types

use std::fmt;

use thiserror::Error;

/// SQLSTATE codes the store classifies specially
pub mod sqlstate {
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
}

/// Transaction lifecycle step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPhase {
    Begin,
    Commit,
    Rollback,
}

impl fmt::Display for TxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxPhase::Begin => "begin",
            TxPhase::Commit => "commit",
            TxPhase::Rollback => "rollback",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    // === Validation Errors ===
    #[error("Source and destination account cannot be the same")]
    SameAccount,

    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(i64),

    #[error("Account {account_id} currency mismatch: {actual} vs {expected}")]
    CurrencyMismatch {
        account_id: i64,
        expected: String,
        actual: String,
    },

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    // === Lookup Errors ===
    #[error("Account {0} not found")]
    AccountNotFound(i64),

    #[error("Transfer {0} not found")]
    TransferNotFound(i64),

    // === Business Errors ===
    #[error("Insufficient funds on account {account_id}: balance would be {balance}")]
    InsufficientFunds { account_id: i64, balance: i64 },

    // === Store / Transaction Errors ===
    #[error("Database error: {0}")]
    DataAccess(#[source] sqlx::Error),

    #[error("Transaction {phase} failed: {source}")]
    Transaction {
        phase: TxPhase,
        #[source]
        source: Box<LedgerError>,
    },

    #[error("tx err: {source}, rb err: {rollback}")]
    RollbackFailed {
        source: Box<LedgerError>,
        rollback: Box<LedgerError>,
    },

    #[error("Transaction conflict, retry the transfer: {0}")]
    Conflict(#[source] sqlx::Error),

    #[error("Transfer timed out")]
    Timeout,
}

impl LedgerError {
    /// Wrap a begin/commit/rollback failure. Conflicts stay conflicts so
    /// callers can still tell them apart.
    pub fn transaction(phase: TxPhase, err: impl Into<LedgerError>) -> Self {
        match err.into() {
            conflict @ LedgerError::Conflict(_) => conflict,
            other => LedgerError::Transaction {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// Whether the whole transfer may be retried from scratch
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict(_))
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::SameAccount => "SAME_ACCOUNT",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            LedgerError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            LedgerError::InvalidPage(_) => "INVALID_PAGE",
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::DataAccess(_) => "DATABASE_ERROR",
            LedgerError::Transaction { .. } => "TRANSACTION_ERROR",
            LedgerError::RollbackFailed { .. } => "ROLLBACK_FAILED",
            LedgerError::Conflict(_) => "CONFLICT",
            LedgerError::Timeout => "TIMEOUT",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::SameAccount
            | LedgerError::InvalidAmount(_)
            | LedgerError::CurrencyMismatch { .. }
            | LedgerError::UnsupportedCurrency(_)
            | LedgerError::InvalidPage(_) => 400,
            LedgerError::AccountNotFound(_) | LedgerError::TransferNotFound(_) => 404,
            LedgerError::Conflict(_) => 409,
            LedgerError::InsufficientFunds { .. } => 422,
            LedgerError::DataAccess(_)
            | LedgerError::Transaction { .. }
            | LedgerError::RollbackFailed { .. } => 500,
            LedgerError::Timeout => 504,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        let code = match &e {
            sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
            _ => None,
        };
        match code.as_deref() {
            Some(sqlstate::SERIALIZATION_FAILURE) | Some(sqlstate::DEADLOCK_DETECTED) => {
                LedgerError::Conflict(e)
            }
            _ => LedgerError::DataAccess(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::SameAccount.code(), "SAME_ACCOUNT");
        assert_eq!(LedgerError::AccountNotFound(7).code(), "ACCOUNT_NOT_FOUND");
        assert_eq!(
            LedgerError::InsufficientFunds {
                account_id: 1,
                balance: -5
            }
            .code(),
            "INSUFFICIENT_FUNDS"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(LedgerError::InvalidAmount(0).http_status(), 400);
        assert_eq!(LedgerError::AccountNotFound(1).http_status(), 404);
        assert_eq!(
            LedgerError::Conflict(sqlx::Error::PoolTimedOut).http_status(),
            409
        );
        assert_eq!(
            LedgerError::DataAccess(sqlx::Error::PoolClosed).http_status(),
            500
        );
        assert_eq!(LedgerError::Timeout.http_status(), 504);
    }

    #[test]
    fn test_non_database_sqlx_error_is_data_access() {
        let err: LedgerError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, LedgerError::DataAccess(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transaction_keeps_conflict() {
        let err = LedgerError::transaction(
            TxPhase::Commit,
            LedgerError::Conflict(sqlx::Error::PoolTimedOut),
        );
        assert!(err.is_retryable());

        let err = LedgerError::transaction(TxPhase::Begin, sqlx::Error::PoolTimedOut);
        assert!(matches!(
            err,
            LedgerError::Transaction {
                phase: TxPhase::Begin,
                ..
            }
        ));
        assert_eq!(err.code(), "TRANSACTION_ERROR");
    }

    #[test]
    fn test_rollback_failed_keeps_both_errors() {
        let err = LedgerError::RollbackFailed {
            source: Box::new(LedgerError::AccountNotFound(9)),
            rollback: Box::new(LedgerError::DataAccess(sqlx::Error::PoolClosed)),
        };
        let msg = err.to_string();
        assert!(msg.contains("Account 9 not found"));
        assert!(msg.contains("rb err"));
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("Account 9 not found".to_string())
        );
    }
}
