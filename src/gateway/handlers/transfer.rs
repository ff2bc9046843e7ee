//! Transfer handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, TransferRequest, ok};
use crate::ledger::models::is_supported_currency;
use crate::ledger::{LedgerError, Transfer, TransferTxParams, TransferTxResult};

/// Check the account exists and is held in `currency`
async fn valid_account(state: &AppState, account_id: i64, currency: &str) -> Result<(), ApiError> {
    let account = state.engine.get_account(account_id).await?;
    if account.currency != currency {
        return Err(LedgerError::CurrencyMismatch {
            account_id,
            expected: currency.to_string(),
            actual: account.currency,
        }
        .into());
    }
    Ok(())
}

/// Move funds between two accounts
///
/// POST /api/v1/transfers
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer committed", body = TransferTxResult, content_type = "application/json"),
        (status = 400, description = "Invalid parameters or currency mismatch"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Conflict, safe to retry"),
        (status = 422, description = "Insufficient funds"),
        (status = 504, description = "Transfer timed out")
    ),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<TransferTxResult> {
    req.validate()?;
    if req.from_account_id == req.to_account_id {
        return ApiError::from(LedgerError::SameAccount).into_err();
    }
    if !is_supported_currency(&req.currency) {
        return ApiError::from(LedgerError::UnsupportedCurrency(req.currency)).into_err();
    }

    valid_account(&state, req.from_account_id, &req.currency).await?;
    valid_account(&state, req.to_account_id, &req.currency).await?;

    let params = TransferTxParams {
        from_account_id: req.from_account_id,
        to_account_id: req.to_account_id,
        amount: req.amount,
    };
    tracing::info!(
        from = params.from_account_id,
        to = params.to_account_id,
        amount = params.amount,
        "Transfer request"
    );

    // Expiry drops the transfer future, which rolls its transaction back
    let result = match state.transfer_timeout {
        Some(limit) => tokio::time::timeout(limit, state.engine.transfer(params))
            .await
            .unwrap_or(Err(LedgerError::Timeout)),
        None => state.engine.transfer(params).await,
    };
    ok(result?)
}

/// Get one transfer
///
/// GET /api/v1/transfers/{id}
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    params(("id" = i64, Path, description = "Transfer ID")),
    responses(
        (status = 200, description = "Transfer record", content_type = "application/json"),
        (status = 404, description = "Transfer not found")
    ),
    tag = "Transfer"
)]
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Transfer> {
    if id < 1 {
        return ApiError::bad_request("Transfer id must be >= 1").into_err();
    }
    ok(state.engine.get_transfer(id).await?)
}
