//! # Response Envelope
//!
//! Every successful response uses the same JSON shape:
//!
//! ```json
//! { "success": true, "message": "...", "count": 3, "data": [...] }
//! ```
//!
//! Paginated lists add `total`, `pages` and `currentPage`. Absent fields are
//! omitted, not sent as `null`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use ombor_core::Page;

use crate::error::ApiError;

/// Handler result type.
pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pages: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn empty() -> Self {
        ApiResponse {
            status: StatusCode::OK,
            success: true,
            message: None,
            count: None,
            total: None,
            pages: None,
            current_page: None,
            data: None,
        }
    }

    /// 200 with `data`.
    pub fn ok(data: T) -> Self {
        ApiResponse {
            data: Some(data),
            ..ApiResponse::empty()
        }
    }

    /// 201 with `data`.
    pub fn created(data: T) -> Self {
        ApiResponse {
            status: StatusCode::CREATED,
            ..ApiResponse::ok(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T> ApiResponse<Vec<T>> {
    /// 200 with `data` and `count`.
    pub fn list(items: Vec<T>) -> Self {
        ApiResponse {
            count: Some(items.len()),
            ..ApiResponse::ok(items)
        }
    }

    /// 200 with one page of items plus `total`, `pages` and `currentPage`.
    pub fn page(page: Page<T>) -> Self {
        let pages = page.pages();
        ApiResponse {
            count: Some(page.items.len()),
            total: Some(page.total),
            pages: Some(pages),
            current_page: Some(page.page),
            ..ApiResponse::ok(page.items)
        }
    }
}

impl ApiResponse<()> {
    /// 200 with only a `message`.
    pub fn message(message: impl Into<String>) -> Self {
        ApiResponse::empty().with_message(message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_envelope() {
        let body = serde_json::to_value(ApiResponse::list(vec![1, 2, 3])).unwrap();
        assert_eq!(body, json!({ "success": true, "count": 3, "data": [1, 2, 3] }));
    }

    #[test]
    fn test_page_envelope() {
        let page = Page {
            items: vec!["a"],
            total: 51,
            page: 2,
            limit: 50,
        };
        let body = serde_json::to_value(ApiResponse::page(page)).unwrap();
        assert_eq!(body["total"], 51);
        assert_eq!(body["pages"], 2);
        assert_eq!(body["currentPage"], 2);
        assert_eq!(body["count"], 1);
    }

    #[test]
    fn test_message_only_envelope() {
        let response = ApiResponse::message("Sale deleted successfully");
        assert_eq!(response.status, StatusCode::OK);
        let body = serde_json::to_value(response).unwrap();
        assert_eq!(
            body,
            json!({ "success": true, "message": "Sale deleted successfully" })
        );
    }

    #[test]
    fn test_created_status() {
        assert_eq!(ApiResponse::created(1).status, StatusCode::CREATED);
    }
}
