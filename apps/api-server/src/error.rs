//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Ombor                                  │
//! │                                                                         │
//! │  Handler  Result<ApiResponse<T>, ApiError>                             │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Bad JSON / query? ──── JsonRejection / QueryRejection ──┐             │
//! │  Rule violation?   ──── DbError::Domain(CoreError) ──────┤             │
//! │  SQLite failure?   ──── DbError::QueryFailed("...") ─────┤             │
//! │                                                          ▼             │
//! │                                                     ApiError           │
//! │                                                          │             │
//! │  ◄────────────── 400 / 404 / 500 + JSON envelope ────────┘             │
//! │                                                                         │
//! │  { "success": false, "code": "NOT_FOUND",                               │
//! │    "message": "Product not found: 4f1c…" }                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Server-side failures carry the underlying error text in `error`.
//! [`redact_details`] strips it again when the server runs in production,
//! so production responses get the generic message alone.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use ombor_core::{CoreError, ValidationError};
use ombor_db::DbError;

use crate::state::AppState;

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Malformed JSON body or query string (400)
    BadRequest,

    /// Not enough stock for a sale line (400)
    InsufficientStock,

    /// Category still has products (400)
    CategoryInUse,

    /// Database operation failed (500)
    DatabaseError,

    /// Database unreachable (503)
    Unavailable,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError
            | ErrorCode::BadRequest
            | ErrorCode::InsufficientStock
            | ErrorCode::CategoryInUse => StatusCode::BAD_REQUEST,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// API error returned from handlers.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Underlying error text for server-side failures
    pub detail: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    code: ErrorCode,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    fn render(&self, with_detail: bool) -> Response {
        let body = ErrorBody {
            success: false,
            code: self.code,
            message: &self.message,
            error: self.detail.as_deref().filter(|_| with_detail),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    /// Renders with the detail; the error rides along in the response
    /// extensions so [`redact_details`] can re-render it.
    fn into_response(self) -> Response {
        let mut response = self.render(true);
        response.extensions_mut().insert(self);
        response
    }
}

/// Response middleware: drops `error` detail text in production.
pub async fn redact_details(State(state): State<AppState>, response: Response) -> Response {
    if !state.config.is_production() {
        return response;
    }
    match response.extensions().get::<ApiError>() {
        Some(err) if err.detail.is_some() => err.render(false),
        _ => response,
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => core.into(),
            DbError::NotFound { entity, id } => {
                ApiError::not_found(format!("{} not found: {}", entity, id))
            }
            DbError::UniqueViolation { field, value } => {
                ApiError::validation(format!("{} '{}' already exists", field, value))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::PoolExhausted => {
                tracing::error!("Database pool exhausted");
                ApiError::new(ErrorCode::DatabaseError, "Database is busy, try again")
            }
            other => {
                // Log the actual error but return a generic message
                tracing::error!(error = %other, "Database operation failed");
                ApiError::new(ErrorCode::DatabaseError, "Server error").with_detail(other.to_string())
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::ProductNotFound(_)
            | CoreError::CategoryNotFound(_)
            | CoreError::DebtorNotFound(_)
            | CoreError::RecordNotFound { .. } => ApiError::not_found(message),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, message)
            }
            CoreError::CategoryInUse { .. } => ApiError::new(ErrorCode::CategoryInUse, message),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(ErrorCode::BadRequest, rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::new(ErrorCode::BadRequest, rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_status() {
        let not_found: ApiError = CoreError::DebtorNotFound("d1".into()).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.message, "Debtor not found: d1");

        let stock: ApiError = CoreError::InsufficientStock {
            product: "Cola".into(),
            available: 1,
            requested: 2,
        }
        .into();
        assert_eq!(stock.status(), StatusCode::BAD_REQUEST);
        assert_eq!(stock.code, ErrorCode::InsufficientStock);

        let in_use: ApiError = CoreError::CategoryInUse {
            name: "Drinks".into(),
            products: 3,
        }
        .into();
        assert_eq!(in_use.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_db_errors_hide_internals_behind_generic_message() {
        let err: ApiError = DbError::QueryFailed("no such column: foo".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Server error");
        assert_eq!(err.detail.as_deref(), Some("Query failed: no such column: foo"));

        let wrapped: ApiError = DbError::Domain(CoreError::ProductNotFound("p".into())).into();
        assert_eq!(wrapped.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_response_carries_error_for_redaction() {
        let response = ApiError::new(ErrorCode::DatabaseError, "Server error")
            .with_detail("disk I/O error")
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let carried = response.extensions().get::<ApiError>().unwrap();
        assert_eq!(carried.detail.as_deref(), Some("disk I/O error"));
        assert_eq!(carried.render(false).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
