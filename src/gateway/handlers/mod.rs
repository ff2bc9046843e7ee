//! HTTP handlers

pub mod account;
pub mod health;
pub mod transfer;

pub use account::{
    create_account, get_account, list_account_entries, list_account_transfers, list_accounts,
};
pub use health::{HealthResponse, health_check};
pub use transfer::{create_transfer, get_transfer};
