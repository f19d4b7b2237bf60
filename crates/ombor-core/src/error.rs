//! # Error Types
//!
//! Domain-specific error types for ombor-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  ombor-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  ombor-db errors (separate crate)                                      │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  api-server errors (in app)                                            │
//! │  └── ApiError         - HTTP status + JSON envelope                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant falls into one of three buckets seen by a client:
//! not found (404), rejected input or business rule (400), or an internal
//! failure (500). [`CoreError::is_not_found`] draws the first line.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id does not exist (or was deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Debtor not found: {0}")]
    DebtorNotFound(String),

    /// A sale or transaction id does not exist.
    ///
    /// Also returned for the second delete of the same record, which is
    /// what makes deletion safe to retry.
    #[error("{kind} not found: {id}")]
    RecordNotFound { kind: &'static str, id: String },

    /// Not enough stock to complete a sale line.
    ///
    /// ## User Workflow
    /// ```text
    /// POST /api/sales  { items: [{ product: P, quantity: 5 }] }
    ///      │
    ///      ▼
    /// Conditional update: quantity >= 5 ?   (P has 3)
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Cola", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole request rolled back, 400 returned
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Category still has products pointing at it.
    #[error("Category {name} still has {products} product(s)")]
    CategoryInUse { name: String, products: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// True for the variants a client should see as "404 Not Found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::ProductNotFound(_)
                | CoreError::CategoryNotFound(_)
                | CoreError::DebtorNotFound(_)
                | CoreError::RecordNotFound { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before any row is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (barcode, phone, category name).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
