//! `GET /` — service health summary.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "voicebridge",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.config.realtime.model,
        "database": state.config.store.base_url,
    }))
}
