use std::sync::Arc;
use std::time::Duration;

use crate::ledger::TransferEngine;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TransferEngine>,
    /// Per-transfer deadline, `None` waits for the store
    pub transfer_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(engine: Arc<TransferEngine>) -> Self {
        Self {
            engine,
            transfer_timeout: None,
        }
    }

    /// 0 disables the deadline
    pub fn with_transfer_timeout_ms(mut self, ms: u64) -> Self {
        self.transfer_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        self
    }
}
