pub mod bookings;
pub mod calls;
pub mod conversations;
pub mod functions;
pub mod health;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health probe
        .route("/", get(health::health))
        // Carrier webhooks
        .route("/webhook/incoming-call", post(calls::incoming_call))
        .route("/webhook/call-status", post(calls::call_status))
        // Out-of-band tool dispatch (used by tests and diagnostics)
        .route("/api/function-handler", post(functions::invoke))
        // Bookings
        .route("/api/bookings/:date", get(bookings::for_date))
        // Conversation export
        .route(
            "/api/conversations/:id/transcript",
            get(conversations::transcript),
        )
        .route("/api/conversations/:id/export", get(conversations::export))
        // Carrier media WebSocket
        .route("/media-stream", get(crate::bridge::media_stream))
}
