//! `GET /api/bookings/:date` — booking list for one day.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use vb_domain::slots;

use crate::state::AppState;

pub async fn for_date(State(state): State<AppState>, Path(date): Path<String>) -> Response {
    if slots::validate_date(&date).is_err() {
        return super::api_error(
            StatusCode::BAD_REQUEST,
            format!("date must be YYYY-MM-DD, got {date}"),
        );
    }

    match state.store.bookings_for_date(&date).await {
        Ok(bookings) => Json(serde_json::json!({
            "date": date,
            "count": bookings.len(),
            "bookings": bookings,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(date, error = %e, "failed to list bookings");
            super::api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
