//! Gateway types module
//!
//! ## Input Types
//! - [`CreateAccountRequest`], [`TransferRequest`]: JSON bodies
//! - [`PageQuery`]: pagination query string
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ApiError`]: Error response

pub mod request;
pub mod response;

pub use request::{CreateAccountRequest, PageQuery, TransferRequest};
pub use response::{ApiError, ApiResponse, ApiResult, error_codes, ok};
