//! Transaction API handlers.
//!
//! Creating or deleting a transaction moves stock through the
//! inventory protocol in `ombor_db::protocol`; edits only touch the
//! customer fields and notes.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use ombor_core::report::{DateRange, SalesReportRow, TimeBucket, TransactionStats};
use ombor_core::{NewTransaction, Transaction, TransactionFilter, TransactionPatch, TransactionType};

use crate::extract::{ApiJson, ApiQuery};
use crate::response::{ApiResponse, ApiResult};
use crate::routes::{parse_choice, RangeQuery};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/today", get(today))
        .route("/stats", get(stats))
        .route("/report/sales", get(sales_report))
        .route("/{id}", get(get_by_id).put(update).delete(delete))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    group_by: Option<String>,
}

/// GET /api/transactions?startDate=&endDate=&type=
async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TransactionQuery>,
) -> ApiResult<Vec<Transaction>> {
    let filter = TransactionFilter {
        range: DateRange::parse(query.start_date.as_deref(), query.end_date.as_deref())?,
        kind: parse_choice::<TransactionType>("type", query.kind.as_deref())?,
    };
    Ok(ApiResponse::list(state.db.transactions().list(&filter).await?))
}

/// GET /api/transactions/today
async fn today(State(state): State<AppState>) -> ApiResult<Vec<Transaction>> {
    Ok(ApiResponse::list(state.db.transactions().today().await?))
}

/// GET /api/transactions/stats?startDate=&endDate=
async fn stats(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<TransactionStats> {
    let range = query.range()?;
    Ok(ApiResponse::ok(state.db.transactions().stats(&range).await?))
}

/// GET /api/transactions/report/sales?groupBy=day|month|year
async fn sales_report(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult<Vec<SalesReportRow>> {
    let bucket = TimeBucket::from_str(query.group_by.as_deref().unwrap_or_default())?;
    let range = DateRange::parse(query.start_date.as_deref(), query.end_date.as_deref())?;
    let rows = state.db.transactions().sales_report(bucket, &range).await?;
    Ok(ApiResponse::ok(rows))
}

/// GET /api/transactions/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    Ok(ApiResponse::ok(state.db.transactions().get(&id).await?))
}

/// POST /api/transactions
async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewTransaction>,
) -> ApiResult<Transaction> {
    let transaction = state.db.transactions().create(&input).await?;
    Ok(ApiResponse::created(transaction).with_message("Transaction created successfully"))
}

/// PUT /api/transactions/{id}
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TransactionPatch>,
) -> ApiResult<Transaction> {
    let transaction = state.db.transactions().update(&id, &patch).await?;
    Ok(ApiResponse::ok(transaction).with_message("Transaction updated successfully"))
}

/// DELETE /api/transactions/{id} - reverses the stock movement
async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.db.transactions().delete(&id).await?;
    Ok(ApiResponse::message("Transaction deleted successfully"))
}
