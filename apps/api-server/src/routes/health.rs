//! Service info and health check.
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | / | GET | Name, version and route prefixes |
//! | /health | GET | Database ping; 503 when it fails |

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::error::{ApiError, ErrorCode};
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(info))
        .route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    name: &'static str,
    version: &'static str,
    endpoints: [&'static str; 5],
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    status: &'static str,
    database: &'static str,
}

async fn info() -> ApiResponse<ServiceInfo> {
    ApiResponse::ok(ServiceInfo {
        name: "Ombor API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: [
            "/api/categories",
            "/api/products",
            "/api/transactions",
            "/api/sales",
            "/api/debtors",
        ],
    })
}

async fn health(State(state): State<AppState>) -> ApiResult<HealthStatus> {
    if !state.db.health_check().await {
        return Err(ApiError::new(ErrorCode::Unavailable, "Database unavailable"));
    }
    Ok(ApiResponse::ok(HealthStatus {
        status: "ok",
        database: "connected",
    }))
}
