//! # Ombor API Server
//!
//! JSON-over-HTTP surface for the Ombor inventory backend.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Request Lifecycle                                │
//! │                                                                         │
//! │  HTTP ─► TraceLayer ─► CorsLayer ─► body limit ─► routes::router()     │
//! │                                                       │                 │
//! │                                  ApiJson / ApiQuery ◄─┤ extract         │
//! │                                                       ▼                 │
//! │                                     state.db.<repository>().<op>()     │
//! │                                                       │                 │
//! │        { success, message?, count?, data? } ◄─────────┤ ApiResponse    │
//! │        { success: false, code, message }    ◄─────────┘ ApiError       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`build_router`] is shared by the binary and the integration tests.

use axum::extract::DefaultBodyLimit;
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod extract;
pub mod response;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ErrorCode};
pub use state::AppState;

/// Every route with middleware and state attached.
pub fn build_router(state: AppState) -> Router {
    let origins = if state.config.cors_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(state.config.cors_origins.clone())
    };
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::router()
        .layer(middleware::map_response_with_state(
            state.clone(),
            error::redact_details,
        ))
        .layer(DefaultBodyLimit::max(state.config.body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
