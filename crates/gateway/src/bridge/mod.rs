//! Carrier media WebSocket endpoint.
//!
//! Each accepted socket gets one bridge task that owns the whole call
//! lifecycle; see [`session`] for the state machine.

pub mod logsink;
pub mod session;

use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;

use crate::state::AppState;

/// `GET /media-stream` — upgrade to the carrier media WebSocket.
pub async fn media_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::run(socket, state))
}
