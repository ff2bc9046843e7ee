//! Request bodies and query strings

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ledger::{LedgerError, ListParams};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "alice")]
    pub owner: String,
    #[schema(example = "USD")]
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TransferRequest {
    #[validate(range(min = 1))]
    #[schema(example = 1)]
    pub from_account_id: i64,
    #[validate(range(min = 1))]
    #[schema(example = 2)]
    pub to_account_id: i64,
    /// Minor currency units
    #[validate(range(min = 1))]
    #[schema(example = 100)]
    pub amount: i64,
    #[schema(example = "USD")]
    pub currency: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number
    #[validate(range(min = 1))]
    pub page_id: i64,
    #[validate(range(min = 5, max = 100))]
    pub page_size: i64,
}

impl TryFrom<PageQuery> for ListParams {
    type Error = LedgerError;

    fn try_from(q: PageQuery) -> Result<Self, Self::Error> {
        ListParams::page(q.page_id, q.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_bounds() {
        let ok = PageQuery {
            page_id: 1,
            page_size: 5,
        };
        assert!(ok.validate().is_ok());

        let bad = PageQuery {
            page_id: 0,
            page_size: 5,
        };
        assert!(bad.validate().is_err());

        let bad = PageQuery {
            page_id: 1,
            page_size: 101,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_transfer_request_rejects_non_positive() {
        let req: TransferRequest = serde_json::from_str(
            r#"{"from_account_id":1,"to_account_id":2,"amount":0,"currency":"USD"}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }
}
