//! Call-control front door.
//!
//! - `POST /webhook/incoming-call` — answers a carrier call webhook with
//!   markup that connects the call to the media WebSocket, after writing the
//!   initial `call_sessions` row.
//! - `POST /webhook/call-status` — carrier call-status callbacks.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::Form;
use chrono::Utc;
use serde::Deserialize;

use vb_store::{CallSessionRow, CallSessionUpdate};

use crate::state::AppState;
use crate::twiml;

#[derive(Debug, Deserialize)]
pub struct IncomingCallForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "CallSid")]
    pub call_sid: String,
}

/// Respond with XML markup. The carrier treats non-XML replies as errors.
fn xml_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        body,
    )
        .into_response()
}

pub async fn incoming_call(
    State(state): State<AppState>,
    Form(form): Form<IncomingCallForm>,
) -> Response {
    tracing::info!(
        call_sid = %form.call_sid,
        from = %form.from,
        to = %form.to,
        "incoming call webhook"
    );

    let row = CallSessionRow {
        call_id: form.call_sid.clone(),
        phone_number: form.from.clone(),
        status: "initiated".into(),
        created_at: Utc::now(),
    };
    if let Err(e) = state.store.create_call_session(&row).await {
        tracing::error!(call_sid = %form.call_sid, error = %e, "failed to create call session");
        return xml_response(twiml::error_markup());
    }

    let markup = twiml::connect_markup(
        &state.config.spa.name,
        &state.config.server.external_hostname,
        &twiml::StreamParameters {
            customer_phone: &form.from,
            call_sid: &form.call_sid,
            carrier_number: &form.to,
        },
    );
    xml_response(markup)
}

#[derive(Debug, Deserialize)]
pub struct CallStatusForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus")]
    pub call_status: String,
    #[serde(rename = "Duration", default)]
    pub duration: Option<String>,
}

pub async fn call_status(
    State(state): State<AppState>,
    Form(form): Form<CallStatusForm>,
) -> Response {
    tracing::info!(
        call_sid = %form.call_sid,
        status = %form.call_status,
        duration = form.duration.as_deref().unwrap_or("-"),
        "call status webhook"
    );

    let update = CallSessionUpdate {
        status: Some(form.call_status.clone()),
        duration_seconds: form.duration.as_deref().and_then(|d| d.parse().ok()),
    };
    match state.store.update_call_session(&form.call_sid, &update).await {
        Ok(()) => Json(serde_json::json!({ "updated": true })).into_response(),
        Err(e) => {
            tracing::error!(call_sid = %form.call_sid, error = %e, "call session update failed");
            super::api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
