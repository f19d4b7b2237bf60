//! Category API handlers.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use ombor_core::{Category, CategoryPatch, NewCategory};
use ombor_db::CountCorrection;

use crate::extract::ApiJson;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/reconcile", post(reconcile))
        .route("/{id}", get(get_by_id).put(update).delete(delete))
}

/// GET /api/categories
async fn list(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    Ok(ApiResponse::list(state.db.categories().list().await?))
}

/// GET /api/categories/{id}
async fn get_by_id(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Category> {
    Ok(ApiResponse::ok(state.db.categories().get(&id).await?))
}

/// POST /api/categories
async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewCategory>,
) -> ApiResult<Category> {
    let category = state.db.categories().create(&input).await?;
    info!(id = %category.id, name = %category.name, "Category created");
    Ok(ApiResponse::created(category).with_message("Category created successfully"))
}

/// PUT /api/categories/{id}
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<CategoryPatch>,
) -> ApiResult<Category> {
    let category = state.db.categories().update(&id, &patch).await?;
    Ok(ApiResponse::ok(category).with_message("Category updated successfully"))
}

/// DELETE /api/categories/{id}
async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.db.categories().delete(&id).await?;
    Ok(ApiResponse::message("Category deleted successfully"))
}

/// POST /api/categories/reconcile - recompute product counters
async fn reconcile(State(state): State<AppState>) -> ApiResult<Vec<CountCorrection>> {
    let corrections = state.db.categories().reconcile_product_counts().await?;
    Ok(ApiResponse::list(corrections).with_message("Category counters reconciled"))
}
