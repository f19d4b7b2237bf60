//! Debtor API handlers.

use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::Router;
use serde::Deserialize;
use tracing::info;

use ombor_core::report::DebtorStats;
use ombor_core::{DebtChange, Debtor, DebtorFilter, DebtorPatch, DebtorStatus, NewDebtor};

use crate::extract::{ApiJson, ApiQuery};
use crate::response::{ApiResponse, ApiResult};
use crate::routes::parse_choice;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/active", get(active))
        .route("/search", get(search))
        .route("/stats/totals", get(stats))
        .route("/{id}", get(get_by_id).put(update).delete(delete))
        .route("/{id}/debt", patch(adjust_debt))
}

#[derive(Debug, Default, Deserialize)]
pub struct DebtorQuery {
    status: Option<String>,
    search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    query: Option<String>,
}

/// GET /api/debtors?status=active|paid&search=
async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DebtorQuery>,
) -> ApiResult<Vec<Debtor>> {
    let filter = DebtorFilter {
        status: parse_choice::<DebtorStatus>("status", query.status.as_deref())?,
        search: query.search,
    };
    Ok(ApiResponse::list(state.db.debtors().list(&filter).await?))
}

/// GET /api/debtors/active
async fn active(State(state): State<AppState>) -> ApiResult<Vec<Debtor>> {
    Ok(ApiResponse::list(state.db.debtors().active().await?))
}

/// GET /api/debtors/search?query=
async fn search(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<Vec<Debtor>> {
    let text = query.query.unwrap_or_default();
    Ok(ApiResponse::list(state.db.debtors().search(&text).await?))
}

/// GET /api/debtors/stats/totals
async fn stats(State(state): State<AppState>) -> ApiResult<DebtorStats> {
    Ok(ApiResponse::ok(state.db.debtors().stats().await?))
}

/// GET /api/debtors/{id} - includes the ledger
async fn get_by_id(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Debtor> {
    Ok(ApiResponse::ok(state.db.debtors().get(&id).await?))
}

/// POST /api/debtors
async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewDebtor>,
) -> ApiResult<Debtor> {
    let debtor = state.db.debtors().create(&input).await?;
    info!(id = %debtor.id, name = %debtor.name, "Debtor created");
    Ok(ApiResponse::created(debtor).with_message("Debtor created successfully"))
}

/// PUT /api/debtors/{id}
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<DebtorPatch>,
) -> ApiResult<Debtor> {
    let debtor = state.db.debtors().update(&id, &patch).await?;
    Ok(ApiResponse::ok(debtor).with_message("Debtor updated successfully"))
}

/// DELETE /api/debtors/{id}
async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.db.debtors().delete(&id).await?;
    Ok(ApiResponse::message("Debtor deleted successfully"))
}

/// PATCH /api/debtors/{id}/debt
async fn adjust_debt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(change): ApiJson<DebtChange>,
) -> ApiResult<Debtor> {
    let debtor = state.db.debtors().adjust_debt(&id, &change).await?;
    info!(id = %debtor.id, balance = %debtor.debt_amount, "Debt adjusted");
    Ok(ApiResponse::ok(debtor).with_message("Debt updated successfully"))
}
