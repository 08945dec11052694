//! Conversation export endpoints.
//!
//! Both accept a conversation id or the carrier call id. Records come from
//! the in-memory store in the order they were written, so repeated exports
//! of a finished call are identical.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use vb_conversation::ConversationRecord;

use crate::state::AppState;

fn lookup(state: &AppState, id: &str) -> Option<ConversationRecord> {
    state
        .conversations
        .get(id)
        .or_else(|| state.conversations.find_by_call(id))
}

/// `GET /api/conversations/:id/transcript` — turns only, in order.
pub async fn transcript(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match lookup(&state, &id) {
        Some(record) => Json(serde_json::json!({
            "conversation_id": record.conversation_id,
            "call_sid": record.call_sid,
            "turns": record.turns,
        }))
        .into_response(),
        None => super::api_error(StatusCode::NOT_FOUND, "unknown conversation"),
    }
}

/// `GET /api/conversations/:id/export` — the full record: turns, tool
/// invocations, timestamps.
pub async fn export(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match lookup(&state, &id) {
        Some(record) => Json(record).into_response(),
        None => super::api_error(StatusCode::NOT_FOUND, "unknown conversation"),
    }
}
