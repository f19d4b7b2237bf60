//! Product API handlers.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use ombor_core::report::ProductStats;
use ombor_core::{NewProduct, Product, ProductFilter, ProductPatch, StockStatus};

use crate::extract::{ApiJson, ApiQuery};
use crate::response::{ApiResponse, ApiResult};
use crate::routes::parse_choice;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/low-stock", get(low_stock))
        .route("/stats", get(stats))
        .route("/barcode/{code}", get(by_barcode))
        .route("/{id}", get(get_by_id).put(update).delete(delete))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    category: Option<String>,
    search: Option<String>,
    /// `all`, `active` or `low-stock`
    status: Option<String>,
}

/// GET /api/products?category=&search=&status=
async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Vec<Product>> {
    let filter = ProductFilter {
        category_id: query.category.filter(|c| !c.trim().is_empty()),
        search: query.search,
        status: parse_choice::<StockStatus>("status", query.status.as_deref())?.unwrap_or_default(),
    };
    Ok(ApiResponse::list(state.db.products().list(&filter).await?))
}

/// GET /api/products/low-stock
async fn low_stock(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    Ok(ApiResponse::list(state.db.products().low_stock().await?))
}

/// GET /api/products/stats
async fn stats(State(state): State<AppState>) -> ApiResult<ProductStats> {
    Ok(ApiResponse::ok(state.db.products().stats().await?))
}

/// GET /api/products/barcode/{code}
async fn by_barcode(State(state): State<AppState>, Path(code): Path<String>) -> ApiResult<Product> {
    Ok(ApiResponse::ok(state.db.products().get_by_barcode(&code).await?))
}

/// GET /api/products/{id}
async fn get_by_id(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Product> {
    Ok(ApiResponse::ok(state.db.products().get(&id).await?))
}

/// POST /api/products
async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewProduct>,
) -> ApiResult<Product> {
    let product = state.db.products().create(&input).await?;
    Ok(ApiResponse::created(product).with_message("Product created successfully"))
}

/// PUT /api/products/{id} - stock quantity is not editable here
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> ApiResult<Product> {
    let product = state.db.products().update(&id, &patch).await?;
    Ok(ApiResponse::ok(product).with_message("Product updated successfully"))
}

/// DELETE /api/products/{id}
async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.db.products().delete(&id).await?;
    Ok(ApiResponse::message("Product deleted successfully"))
}
