//! # ombor-core: Pure Business Logic for Ombor
//!
//! This crate holds the rules of the Ombor inventory / point-of-sale backend
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Ombor Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web frontend (any)                           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/api-server (axum)                       │   │
//! │  │    /api/categories  /api/products  /api/sales  /api/debtors     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ ombor-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ │   │
//! │  │   │  types  │ │  money  │ │ ledger  │ │ report  │ │validation│ │   │
//! │  │   │ Product │ │  Money  │ │ stock Δ │ │ buckets │ │  rules   │ │   │
//! │  │   │  Sale   │ │         │ │ debt Δ  │ │  stats  │ │          │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    ombor-db (Database Layer)                    │   │
//! │  │      SQLite queries, migrations, repositories, protocol         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities and request DTOs (Product, Sale, Debtor, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`ledger`] - Stock movement and debt rules shared by sales and transactions
//! - [`report`] - Time buckets, date ranges and statistics shapes
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use ombor_core::ledger::{PricedLine, RecordTotals, StockMovement};
//! use ombor_core::money::Money;
//!
//! // Selling 3 units removes 3 from stock
//! assert_eq!(StockMovement::Sale.delta(3), -3);
//!
//! let totals = RecordTotals::compute(&[PricedLine {
//!     quantity: 3,
//!     price: Money::from_minor(1000),
//!     cost: Money::from_minor(600),
//! }]).unwrap();
//! assert_eq!(totals.profit.minor(), 1200);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use ombor_core::Money` instead of
// `use ombor_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Products with fewer units than this are reported as low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Maximum number of line items in a single sale or transaction.
pub const MAX_RECORD_LINES: usize = 500;

/// Maximum quantity on a single line item.
///
/// ## Business Reason
/// Catches a mistyped quantity (an extra zero or three) before it moves stock.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// Largest price, cost or balance amount accepted from a request, in minor
/// units.
///
/// ## Business Reason
/// Keeps `price × MAX_LINE_QUANTITY` inside `i64`, so a single line total
/// can never overflow.
pub const MAX_MONEY: i64 = 1_000_000_000_000;

/// Unit of measure assigned when a product is created without one ("piece").
pub const DEFAULT_UNIT: &str = "dona";

/// Reorder level assigned when a product is created without one.
pub const DEFAULT_MIN_STOCK: i64 = 10;

/// Default page size for the paginated sale list.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Number of rows returned by debtor search.
pub const DEBTOR_SEARCH_LIMIT: i64 = 20;
