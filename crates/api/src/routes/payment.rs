//! Gateway payment callback endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use checkout::codes;
use serde::Serialize;
use store::Store;

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct CallbackResponse {
    pub result_code: String,
    pub message: String,
}

/// POST /payment/callback — the gateway's asynchronous payment
/// notification.
///
/// Always answers `200` with a result code mirroring the gateway's own
/// convention; only a store failure surfaces as a 500.
#[tracing::instrument(skip(state, payload))]
pub async fn callback<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<CallbackResponse>, ApiError> {
    let Ok(Json(value)) = payload else {
        return Ok(malformed());
    };
    let Some(params) = string_params(&value) else {
        return Ok(malformed());
    };

    let outcome = state.reconciler.reconcile(params).await?;
    Ok(Json(CallbackResponse {
        result_code: outcome.code.to_string(),
        message: outcome.message.to_string(),
    }))
}

fn malformed() -> Json<CallbackResponse> {
    metrics::counter!("payment_callbacks_total", "code" => codes::MALFORMED).increment(1);
    Json(CallbackResponse {
        result_code: codes::MALFORMED.to_string(),
        message: "Invalid request".to_string(),
    })
}

/// The gateway posts a flat JSON object of strings; numbers are tolerated
/// and stringified, anything else is malformed.
fn string_params(value: &serde_json::Value) -> Option<BTreeMap<String, String>> {
    let object = value.as_object()?;
    let mut params = BTreeMap::new();
    for (key, value) in object {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        params.insert(key.clone(), value);
    }
    Some(params)
}
