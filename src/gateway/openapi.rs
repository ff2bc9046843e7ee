//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::gateway::handlers::{self, HealthResponse};
use crate::gateway::types::{CreateAccountRequest, TransferRequest};
use crate::ledger::{Account, Entry, Transfer, TransferTxResult};

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bank Ledger API",
        version = "1.0.0",
        description = "Atomic account-to-account transfers over a double-entry ledger.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        handlers::health::health_check,
        handlers::account::create_account,
        handlers::account::get_account,
        handlers::account::list_accounts,
        handlers::account::list_account_entries,
        handlers::account::list_account_transfers,
        handlers::transfer::create_transfer,
        handlers::transfer::get_transfer,
    ),
    components(
        schemas(
            HealthResponse,
            CreateAccountRequest,
            TransferRequest,
            Account,
            Entry,
            Transfer,
            TransferTxResult,
        )
    ),
    tags(
        (name = "Account", description = "Open accounts and read their history"),
        (name = "Transfer", description = "Atomic fund transfers"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Bank Ledger API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_endpoints_registered() {
        let paths = ApiDoc::openapi().paths;
        for path in [
            "/api/v1/health",
            "/api/v1/accounts",
            "/api/v1/accounts/{id}",
            "/api/v1/accounts/{id}/entries",
            "/api/v1/accounts/{id}/transfers",
            "/api/v1/transfers",
            "/api/v1/transfers/{id}",
        ] {
            assert!(paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_schemas_registered() {
        let components = ApiDoc::openapi().components.expect("should have components");
        assert!(components.schemas.contains_key("TransferTxResult"));
        assert!(components.schemas.contains_key("Account"));
    }
}
