//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, ItemIssue};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// One or more order items failed; carries the full issue list.
    Rejected(Vec<ItemIssue>),
    /// Checkout pipeline error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(msg) => plain(StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => plain(StatusCode::BAD_REQUEST, msg),
            ApiError::Rejected(issues) => rejected_response(issues),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                plain(StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        }
    }
}

fn plain(status: StatusCode, message: String) -> Response {
    let body = serde_json::json!({ "error": message });
    (status, axum::Json(body)).into_response()
}

/// A rejected order answers with one entry per failing item: a structured
/// object plus a human-readable message.
fn rejected_response(issues: Vec<ItemIssue>) -> Response {
    let details: Vec<serde_json::Value> = issues
        .iter()
        .map(|issue| {
            let mut value = serde_json::to_value(issue).unwrap_or_default();
            if let Some(map) = value.as_object_mut() {
                map.insert(
                    "message".to_string(),
                    serde_json::Value::String(issue.to_string()),
                );
            }
            value
        })
        .collect();
    let body = serde_json::json!({
        "error": "order rejected",
        "details": details,
    });
    (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
}

fn checkout_error_to_response(err: CheckoutError) -> Response {
    match err {
        CheckoutError::Validation(e) => plain(StatusCode::BAD_REQUEST, e.to_string()),
        CheckoutError::UserNotFound(user) => {
            plain(StatusCode::NOT_FOUND, format!("user not found: {user}"))
        }
        CheckoutError::Rejected(issues) => rejected_response(issues),
        CheckoutError::Gateway(e) => plain(StatusCode::BAD_GATEWAY, e.to_string()),
        CheckoutError::Store(e) => store_error_to_response(e),
    }
}

fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::UserNotFound(user) => {
            plain(StatusCode::NOT_FOUND, format!("user not found: {user}"))
        }
        StoreError::UnknownCell(cell) => plain(
            StatusCode::NOT_FOUND,
            format!("stock for {cell} does not exist"),
        ),
        other => {
            tracing::error!(error = %other, "store error");
            plain(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Checkout(CheckoutError::Store(err))
    }
}
