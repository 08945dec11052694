//! `POST /api/function-handler` — out-of-band tool dispatch.
//!
//! Exercises the tool dispatcher without a live call; the caller supplies
//! the phone number the session would have bound.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::Value;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FunctionCallRequest {
    pub function_name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub context: FunctionContext,
}

#[derive(Debug, Default, Deserialize)]
pub struct FunctionContext {
    #[serde(default)]
    pub customer_phone: Option<String>,
}

pub async fn invoke(
    State(state): State<AppState>,
    Json(req): Json<FunctionCallRequest>,
) -> Response {
    let Some(phone) = req.context.customer_phone.as_deref() else {
        return super::api_error(StatusCode::BAD_REQUEST, "context.customer_phone is required");
    };

    let args_json = if req.arguments.is_null() {
        "{}".to_owned()
    } else {
        req.arguments.to_string()
    };

    let outcome = state
        .dispatcher
        .dispatch(&req.function_name, &args_json, phone)
        .await;

    Json(serde_json::json!({
        "function_name": req.function_name,
        "success": outcome.success,
        "result": outcome.result,
    }))
    .into_response()
}
