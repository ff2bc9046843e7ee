//! Transaction Coordinator
//!
//! Runs one unit of work inside one transaction: commit on success,
//! rollback on failure. Retrying is the caller's business.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use super::error::LedgerError;
use super::store::{LedgerQueries, TxSource};

pub struct TxCoordinator {
    source: Arc<dyn TxSource>,
}

impl TxCoordinator {
    pub fn new(source: Arc<dyn TxSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn TxSource> {
        &self.source
    }

    /// Execute `work` within a transaction
    ///
    /// On failure the original error is returned once rollback succeeded.
    /// If rollback fails too, both errors come back in
    /// [`LedgerError::RollbackFailed`].
    pub async fn execute<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        T: Send,
        F: for<'q> FnOnce(&'q mut dyn LedgerQueries) -> BoxFuture<'q, Result<T, LedgerError>>
            + Send,
    {
        let mut tx = self.source.begin().await?;
        let outcome = work(tx.queries()).await;

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                debug!(backend = self.source.name(), "transaction committed");
                Ok(value)
            }
            Err(err) => match tx.rollback().await {
                Ok(()) => {
                    warn!(backend = self.source.name(), error = %err, "transaction rolled back");
                    Err(err)
                }
                Err(rb_err) => {
                    error!(
                        backend = self.source.name(),
                        error = %err,
                        rollback_error = %rb_err,
                        "transaction rollback failed"
                    );
                    Err(LedgerError::RollbackFailed {
                        source: Box::new(err),
                        rollback: Box::new(rb_err),
                    })
                }
            },
        }
    }
}
