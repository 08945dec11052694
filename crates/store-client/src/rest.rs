//! REST implementation of [`StoreProvider`].
//!
//! `RestStoreClient` wraps a `reqwest::Client` and translates every trait
//! method into the corresponding PostgREST call, with automatic retry +
//! exponential back-off on transient (5xx / timeout) failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use vb_domain::config::StoreConfig;
use vb_domain::retry::RetryPolicy;
use vb_domain::{Error, Result};

use crate::provider::StoreProvider;
use crate::types::{
    AvailabilityReply, BookingReply, BookingRequest, CallSessionRow, CallSessionUpdate,
    CancellationReply, ConversationCloseRow, ConversationRow, LatestAppointmentReply,
    ToolInvocationRow, TurnRow,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST-based client for the booking store.
///
/// Created once at startup and shared across all sessions; the underlying
/// `reqwest::Client` maintains a connection pool.
#[derive(Debug, Clone)]
pub struct RestStoreClient {
    http: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl RestStoreClient {
    /// Build a new client from the shared [`StoreConfig`].
    pub fn new(cfg: &StoreConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key: cfg.api_key.clone(),
            retry: RetryPolicy::store(cfg.max_retries),
        })
    }

    // ── request helpers ──────────────────────────────────────────────

    /// Decorate a `RequestBuilder` with the store auth headers.
    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Build the full URL for a path like `/rest/v1/rpc/book_spa_slot`.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a request with retry + back-off on transient errors.
    ///
    /// * Retries on 5xx status codes and on timeouts/connect errors.
    /// * Does **not** retry on 4xx (client errors are permanent).
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..self.retry.max_attempts {
            let delay = self.retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let rb = self.decorate(build_request());
            match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_server_error() {
                        // 5xx — transient, retry.
                        let body = resp.text().await.unwrap_or_default();
                        tracing::warn!(
                            endpoint,
                            status = status.as_u16(),
                            attempt,
                            "store returned server error"
                        );
                        last_err =
                            Some(Error::Store(format!("{endpoint} returned {status}: {body}")));
                        continue;
                    }

                    if status.is_client_error() {
                        // 4xx — permanent, do NOT retry.
                        let body = resp.text().await.unwrap_or_default();
                        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                            return Err(Error::Auth(format!(
                                "{endpoint} auth failed ({status}): {body}"
                            )));
                        }
                        return Err(Error::Store(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    tracing::warn!(endpoint, attempt, error = %e, "store request failed");
                    last_err = Some(from_reqwest(e));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Store(format!("{endpoint}: all retries exhausted"))))
    }

    /// POST a stored-procedure call and parse its JSON reply.
    async fn rpc<T: DeserializeOwned>(&self, name: &str, args: Value) -> Result<T> {
        let url = self.url(&format!("/rest/v1/rpc/{name}"));
        let endpoint = format!("POST /rest/v1/rpc/{name}");
        let resp = self
            .execute_with_retry(&endpoint, || self.http.post(&url).json(&args))
            .await?;

        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Store(format!("failed to parse {name} reply: {e}: {body}")))
    }

    /// Insert one row into a table, discarding the representation.
    async fn insert_row(&self, table: &str, row: &impl serde::Serialize) -> Result<()> {
        let url = self.url(&format!("/rest/v1/{table}"));
        let endpoint = format!("POST /rest/v1/{table}");
        self.execute_with_retry(&endpoint, || {
            self.http
                .post(&url)
                .header("Prefer", "return=minimal")
                .json(row)
        })
        .await?;
        Ok(())
    }

    /// PATCH rows of a table matching an equality filter.
    async fn patch_rows(
        &self,
        table: &str,
        filter_column: &str,
        filter_value: &str,
        body: &impl serde::Serialize,
    ) -> Result<()> {
        let url = self.url(&format!("/rest/v1/{table}"));
        let endpoint = format!("PATCH /rest/v1/{table}");
        self.execute_with_retry(&endpoint, || {
            self.http
                .patch(&url)
                .query(&[(filter_column, format!("eq.{filter_value}"))])
                .header("Prefer", "return=minimal")
                .json(body)
        })
        .await?;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl StoreProvider for RestStoreClient {
    async fn check_slot_availability(
        &self,
        date: &str,
        start_time: &str,
    ) -> Result<AvailabilityReply> {
        self.rpc(
            "check_slot_availability",
            serde_json::json!({ "p_date": date, "p_start_time": start_time }),
        )
        .await
    }

    async fn book_slot(&self, req: &BookingRequest) -> Result<BookingReply> {
        self.rpc(
            "book_spa_slot",
            serde_json::json!({
                "p_customer_name": req.customer_name,
                "p_customer_phone": req.customer_phone,
                "p_booking_date": req.booking_date,
                "p_slot_start_time": req.slot_start_time,
                "p_slot_end_time": req.slot_end_time,
            }),
        )
        .await
    }

    async fn latest_appointment(&self, phone: &str) -> Result<LatestAppointmentReply> {
        self.rpc(
            "get_latest_appointment",
            serde_json::json!({ "p_phone_number": phone }),
        )
        .await
    }

    async fn cancel_appointment(
        &self,
        phone: &str,
        reference: Option<&str>,
    ) -> Result<CancellationReply> {
        self.rpc(
            "delete_appointment",
            serde_json::json!({
                "p_phone_number": phone,
                "p_booking_reference": reference,
            }),
        )
        .await
    }

    async fn bookings_for_date(&self, date: &str) -> Result<Vec<Value>> {
        let url = self.url("/rest/v1/spa_bookings");
        let date_filter = format!("eq.{date}");
        let resp = self
            .execute_with_retry("GET /rest/v1/spa_bookings", || {
                self.http.get(&url).query(&[
                    ("select", "*"),
                    ("booking_date", date_filter.as_str()),
                    ("order", "slot_start_time"),
                ])
            })
            .await?;

        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Store(format!("failed to parse bookings list: {e}: {body}")))
    }

    async fn create_call_session(&self, row: &CallSessionRow) -> Result<()> {
        self.insert_row("call_sessions", row).await
    }

    async fn update_call_session(
        &self,
        call_id: &str,
        update: &CallSessionUpdate,
    ) -> Result<()> {
        self.patch_rows("call_sessions", "call_id", call_id, update).await
    }

    async fn insert_conversation(&self, row: &ConversationRow) -> Result<()> {
        self.insert_row("conversations", row).await
    }

    async fn close_conversation(&self, id: &str, row: &ConversationCloseRow) -> Result<()> {
        self.patch_rows("conversations", "id", id, row).await
    }

    async fn insert_turn(&self, row: &TurnRow) -> Result<()> {
        self.insert_row("conversation_turns", row).await
    }

    async fn insert_tool_invocation(&self, row: &ToolInvocationRow) -> Result<()> {
        self.insert_row("tool_invocations", row).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain `Error`.
fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> RestStoreClient {
        RestStoreClient::new(&StoreConfig {
            base_url: "https://store.example.com".into(),
            api_key: "anon".into(),
            timeout_ms: 5_000,
            max_retries: 2,
        })
        .unwrap()
    }

    #[test]
    fn rpc_url_shape() {
        let client = test_client();
        assert_eq!(
            client.url("/rest/v1/rpc/book_spa_slot"),
            "https://store.example.com/rest/v1/rpc/book_spa_slot"
        );
    }

    #[test]
    fn base_url_slash_trimmed_on_construction() {
        let client = RestStoreClient::new(&StoreConfig {
            base_url: "https://store.example.com///".into(),
            api_key: "anon".into(),
            timeout_ms: 5_000,
            max_retries: 0,
        })
        .unwrap();
        assert_eq!(
            client.url("/rest/v1/call_sessions"),
            "https://store.example.com/rest/v1/call_sessions"
        );
    }
}
