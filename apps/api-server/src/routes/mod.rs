//! # HTTP Routes
//!
//! ## Route Table
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────────────┐
//! │ /                    │ GET service info                                 │
//! │ /health              │ GET database ping                                │
//! │ /api/categories      │ CRUD, POST /reconcile                            │
//! │ /api/products        │ CRUD, /low-stock, /stats, /barcode/{code}        │
//! │ /api/transactions    │ CRUD, /today, /stats, /report/sales              │
//! │ /api/sales           │ CRUD, /today, /stats, /debtor/{debtorId}         │
//! │ /api/debtors         │ CRUD, /active, /search, /stats/totals,           │
//! │                      │ PATCH /{id}/debt                                 │
//! └──────────────────────┴──────────────────────────────────────────────────┘
//! ```
//!
//! Anything else gets a JSON 404 from [`not_found`].

use axum::Router;
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::Deserialize;

use ombor_core::report::DateRange;
use ombor_core::ValidationError;

use crate::error::ApiError;
use crate::state::AppState;

pub mod categories;
pub mod debtors;
pub mod health;
pub mod products;
pub mod sales;
pub mod transactions;

/// Every route, without state or middleware.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/categories", categories::router())
        .nest("/api/products", products::router())
        .nest("/api/transactions", transactions::router())
        .nest("/api/sales", sales::router())
        .nest("/api/debtors", debtors::router())
        .fallback(not_found)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

// =============================================================================
// Shared Query Parameters
// =============================================================================

/// `startDate` / `endDate`, as `YYYY-MM-DD` or RFC 3339.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl RangeQuery {
    pub fn range(&self) -> Result<DateRange, ApiError> {
        Ok(DateRange::parse(
            self.start_date.as_deref(),
            self.end_date.as_deref(),
        )?)
    }
}

/// Parses an optional enum-valued query parameter. Blank means "no filter".
pub fn parse_choice<T: DeserializeOwned>(
    field: &str,
    raw: Option<&str>,
) -> Result<Option<T>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    let deserializer: serde::de::value::StrDeserializer<'_, serde::de::value::Error> =
        raw.into_deserializer();
    T::deserialize(deserializer).map(Some).map_err(|_| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("unknown value '{}'", raw),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ombor_core::{PaymentMethod, StockStatus};

    #[test]
    fn test_parse_choice() {
        let method: Option<PaymentMethod> = parse_choice("paymentMethod", Some("credit")).unwrap();
        assert_eq!(method, Some(PaymentMethod::Credit));

        let status: Option<StockStatus> = parse_choice("status", Some("low-stock")).unwrap();
        assert_eq!(status, Some(StockStatus::LowStock));

        let blank: Option<PaymentMethod> = parse_choice("paymentMethod", Some("  ")).unwrap();
        assert!(blank.is_none());

        let err = parse_choice::<PaymentMethod>("paymentMethod", Some("bitcoin")).unwrap_err();
        assert_eq!(
            err.message,
            "paymentMethod has invalid format: unknown value 'bitcoin'"
        );
    }
}
