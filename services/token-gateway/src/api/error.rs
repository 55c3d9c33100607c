//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every rejection path of the
//! gateway returns the same `{ "error", "code" }` shape.
//!
//! # Key invariants and assumptions
//! - Each error category maps to exactly one status code:
//!   `unauthenticated` 401, `forbidden` 403, `misconfigured` and `internal` 500.
//! - `misconfigured` is operator-fixable (missing secrets or policy) and says
//!   which setting is missing; `internal` never leaks details.
//!
//! # Security considerations
//! - Internal errors are logged server-side; callers get a generic message.
//! - Messages never echo tokens or secrets.
use crate::api::types::ErrorResponse;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Structured API error returned by handlers.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use token_gateway::api::error::api_forbidden;
///
/// let err = api_forbidden("Access denied.");
/// assert_eq!(err.status, StatusCode::FORBIDDEN);
/// assert_eq!(err.body.code, "forbidden");
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
        },
    }
}

/// 401: the caller's identity could not be established.
pub fn api_unauthenticated(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthenticated", message)
}

/// 403: authenticated, but the policy does not allow a token.
pub fn api_forbidden(message: &str) -> ApiError {
    api_error(StatusCode::FORBIDDEN, "forbidden", message)
}

/// 500: a required server setting is missing.
pub fn api_misconfigured(message: &str) -> ApiError {
    tracing::error!(%message, "gateway misconfigured");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "misconfigured", message)
}

/// 500: unexpected failure; `err` is logged, the caller sees a generic message.
pub fn api_internal(context: &str, err: &dyn std::error::Error) -> ApiError {
    tracing::error!(error = %err, context, "internal gateway error");
    api_internal_message()
}

pub fn api_internal_message() -> ApiError {
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        INTERNAL_ERROR_MESSAGE,
    )
}
