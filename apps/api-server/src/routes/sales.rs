//! Sale API handlers.
//!
//! A credit sale charges the chosen debtor in the same database
//! transaction that takes the stock; deleting it gives both back.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::info;

use ombor_core::report::{DateRange, DebtorSales, SaleStats, TodaySales};
use ombor_core::{NewSale, PageRequest, PaymentMethod, Sale, SaleFilter, SalePatch};

use crate::extract::{ApiJson, ApiQuery};
use crate::response::{ApiResponse, ApiResult};
use crate::routes::{parse_choice, RangeQuery};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/today", get(today))
        .route("/stats", get(stats))
        .route("/debtor/{debtor_id}", get(by_debtor))
        .route("/{id}", get(get_by_id).put(update).delete(delete))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    payment_method: Option<String>,
    debtor_id: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

/// GET /api/sales?startDate=&endDate=&paymentMethod=&debtorId=&page=&limit=
async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SaleQuery>,
) -> ApiResult<Vec<Sale>> {
    let filter = SaleFilter {
        range: DateRange::parse(query.start_date.as_deref(), query.end_date.as_deref())?,
        payment_method: parse_choice::<PaymentMethod>(
            "paymentMethod",
            query.payment_method.as_deref(),
        )?,
        debtor_id: query.debtor_id,
    };
    let page = PageRequest::new(query.page, query.limit);
    Ok(ApiResponse::page(state.db.sales().list(&filter, page).await?))
}

/// GET /api/sales/today
async fn today(State(state): State<AppState>) -> ApiResult<TodaySales> {
    Ok(ApiResponse::ok(state.db.sales().today().await?))
}

/// GET /api/sales/stats?startDate=&endDate=
async fn stats(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<SaleStats> {
    let range = query.range()?;
    Ok(ApiResponse::ok(state.db.sales().stats(&range).await?))
}

/// GET /api/sales/debtor/{debtorId}
async fn by_debtor(
    State(state): State<AppState>,
    Path(debtor_id): Path<String>,
) -> ApiResult<DebtorSales> {
    Ok(ApiResponse::ok(state.db.sales().by_debtor(&debtor_id).await?))
}

/// GET /api/sales/{id}
async fn get_by_id(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Sale> {
    Ok(ApiResponse::ok(state.db.sales().get(&id).await?))
}

/// POST /api/sales
async fn create(State(state): State<AppState>, ApiJson(input): ApiJson<NewSale>) -> ApiResult<Sale> {
    let sale = state.db.sales().create(&input).await?;
    info!(
        sale_number = %sale.sale_number,
        total = %sale.total_amount,
        method = sale.payment_method.as_str(),
        "Sale recorded"
    );
    Ok(ApiResponse::created(sale).with_message("Sale created successfully"))
}

/// PUT /api/sales/{id} - notes only
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<SalePatch>,
) -> ApiResult<Sale> {
    let sale = state.db.sales().update(&id, &patch).await?;
    Ok(ApiResponse::ok(sale).with_message("Sale updated successfully"))
}

/// DELETE /api/sales/{id} - restores stock and reverses any credit charge
async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let sale = state.db.sales().delete(&id).await?;
    info!(sale_number = %sale.sale_number, "Sale deleted");
    Ok(ApiResponse::message("Sale deleted successfully"))
}
