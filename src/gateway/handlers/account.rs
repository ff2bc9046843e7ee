//! Account handlers (open account, account info, history)

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, CreateAccountRequest, PageQuery, ok};
use crate::ledger::models::is_supported_currency;
use crate::ledger::{Account, CreateAccountParams, Entry, LedgerError, ListParams, Transfer};

/// Open a new account with a zero balance
///
/// POST /api/v1/accounts
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 200, description = "Account created", content_type = "application/json"),
        (status = 400, description = "Invalid owner or currency"),
        (status = 500, description = "Store failure")
    ),
    tag = "Account"
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<Account> {
    req.validate()?;
    if !is_supported_currency(&req.currency) {
        return ApiError::from(LedgerError::UnsupportedCurrency(req.currency)).into_err();
    }

    let account = state
        .engine
        .create_account(CreateAccountParams {
            owner: req.owner,
            balance: 0,
            currency: req.currency,
        })
        .await?;
    ok(account)
}

/// Get one account
///
/// GET /api/v1/accounts/{id}
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}",
    params(("id" = i64, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account details", content_type = "application/json"),
        (status = 400, description = "Invalid account id"),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Account> {
    if id < 1 {
        return ApiError::bad_request("Account id must be >= 1").into_err();
    }
    ok(state.engine.get_account(id).await?)
}

/// List accounts ordered by id
///
/// GET /api/v1/accounts?page_id=1&page_size=10
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    params(PageQuery),
    responses(
        (status = 200, description = "Account page", content_type = "application/json"),
        (status = 400, description = "Invalid page")
    ),
    tag = "Account"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<Account>> {
    page.validate()?;
    ok(state.engine.list_accounts(ListParams::try_from(page)?).await?)
}

/// Ledger entries of one account
///
/// GET /api/v1/accounts/{id}/entries?page_id=1&page_size=10
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}/entries",
    params(("id" = i64, Path, description = "Account ID"), PageQuery),
    responses(
        (status = 200, description = "Entry page", content_type = "application/json"),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn list_account_entries(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<Entry>> {
    page.validate()?;
    ok(state.engine.list_entries(id, ListParams::try_from(page)?).await?)
}

/// Transfers touching one account
///
/// GET /api/v1/accounts/{id}/transfers?page_id=1&page_size=10
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}/transfers",
    params(("id" = i64, Path, description = "Account ID"), PageQuery),
    responses(
        (status = 200, description = "Transfer page", content_type = "application/json"),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn list_account_transfers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<Transfer>> {
    page.validate()?;
    ok(state.engine.list_transfers(id, ListParams::try_from(page)?).await?)
}
