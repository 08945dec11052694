//! Tool dispatcher — maps AI tool-call names to booking-store calls.
//!
//! The dispatcher is transport-agnostic: it takes `(tool_name, raw
//! arguments, caller_phone)` and returns a result map plus the invocation
//! records to log. The bridge owns the `function_call_output` +
//! `response.create` framing.
//!
//! The caller's phone is always bound from the session — never trusted from
//! tool arguments — because the store's uniqueness is defined on the exact
//! carrier-provided value.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use vb_domain::config::{SpaConfig, ToolsConfig};
use vb_domain::slots;
use vb_store::{BookingRequest, StoreProvider};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The result of servicing one AI tool call.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// The map returned to the AI as the `function_call_output`.
    pub result: Value,
    /// False when the store call failed, timed out, or the tool is unknown.
    pub success: bool,
    /// One entry per store procedure exercised, in call order. Cancelling
    /// without a reference resolves the latest appointment first, so that
    /// path yields two entries.
    pub invocations: Vec<InvocationOutcome>,
}

impl DispatchOutcome {
    /// JSON-encode the result for the `function_call_output` payload.
    pub fn output_json(&self) -> String {
        self.result.to_string()
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            result: json!({ "error": message.into() }),
            success: false,
            invocations: Vec::new(),
        }
    }
}

/// Record of one store procedure call made while servicing a tool call.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub tool_name: String,
    pub arguments: Value,
    pub result: Value,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl InvocationOutcome {
    pub fn execution_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ToolDispatcher {
    store: Arc<dyn StoreProvider>,
    spa: SpaConfig,
    deadline: Duration,
}

impl ToolDispatcher {
    pub fn new(store: Arc<dyn StoreProvider>, spa: SpaConfig, tools: &ToolsConfig) -> Self {
        Self {
            store,
            spa,
            deadline: tools.dispatch_timeout,
        }
    }

    /// Service one tool call. `args_json` is the raw JSON string the AI
    /// produced. Never returns an `Err`: every failure mode becomes an
    /// `{error: ...}` result the AI can speak about.
    pub async fn dispatch(
        &self,
        name: &str,
        args_json: &str,
        caller_phone: &str,
    ) -> DispatchOutcome {
        let args: Value = match serde_json::from_str(args_json) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "unparseable tool arguments");
                return DispatchOutcome::failure(format!("invalid arguments: {e}"));
            }
        };

        match tokio::time::timeout(self.deadline, self.run(name, &args, caller_phone)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    tool = name,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "tool dispatch deadline exceeded"
                );
                DispatchOutcome {
                    result: json!({ "error": "timeout" }),
                    success: false,
                    invocations: vec![InvocationOutcome {
                        tool_name: name.to_owned(),
                        arguments: args,
                        result: json!({ "error": "timeout" }),
                        success: false,
                        started_at: Utc::now(),
                        finished_at: Utc::now(),
                    }],
                }
            }
        }
    }

    async fn run(&self, name: &str, args: &Value, phone: &str) -> DispatchOutcome {
        match name {
            "check_slot_availability" => self.check_availability(args).await,
            "book_spa_slot" => self.book(args, phone).await,
            "get_latest_appointment" => self.latest_appointment(phone).await,
            "delete_appointment" => self.cancel(args, phone).await,
            other => {
                tracing::warn!(tool = other, "AI requested an unregistered tool");
                DispatchOutcome {
                    result: json!({ "error": "unknown function" }),
                    success: false,
                    invocations: vec![InvocationOutcome {
                        tool_name: other.to_owned(),
                        arguments: args.clone(),
                        result: json!({ "error": "unknown function" }),
                        success: false,
                        started_at: Utc::now(),
                        finished_at: Utc::now(),
                    }],
                }
            }
        }
    }

    // ── check_slot_availability ──────────────────────────────────────

    async fn check_availability(&self, args: &Value) -> DispatchOutcome {
        let (date, start_time) = match (str_arg(args, "date"), str_arg(args, "start_time")) {
            (Some(d), Some(t)) => (d, t),
            _ => return DispatchOutcome::failure("date and start_time are required"),
        };
        let start_time = match slots::normalize_time(start_time) {
            Ok(t) => t,
            Err(e) => return DispatchOutcome::failure(e.to_string()),
        };

        let started = Utc::now();
        let reply = self.store.check_slot_availability(date, &start_time).await;
        let arguments = json!({ "date": date, "start_time": start_time });

        match reply {
            Ok(reply) if reply.is_success() => {
                let spots = reply.spots_remaining.unwrap_or(0);
                let result = json!({
                    "available": true,
                    "spots_remaining": spots,
                    "message": format!("Slot disponibile, {spots} posti rimanenti"),
                });
                self.single(
                    "check_slot_availability",
                    arguments,
                    result,
                    true,
                    started,
                )
            }
            Ok(reply) => {
                let result = json!({
                    "available": false,
                    "message": reply.message.unwrap_or_else(|| "Slot non disponibile".into()),
                });
                self.single(
                    "check_slot_availability",
                    arguments,
                    result,
                    true,
                    started,
                )
            }
            Err(e) => self.store_failure("check_slot_availability", arguments, e, started),
        }
    }

    // ── book_spa_slot ────────────────────────────────────────────────

    async fn book(&self, args: &Value, phone: &str) -> DispatchOutcome {
        let (name, date, start_time) = match (
            str_arg(args, "name"),
            str_arg(args, "date"),
            str_arg(args, "start_time"),
        ) {
            (Some(n), Some(d), Some(t)) => (n, d, t),
            _ => return DispatchOutcome::failure("name, date and start_time are required"),
        };

        let start_time = match slots::normalize_time(start_time) {
            Ok(t) => t,
            Err(e) => return DispatchOutcome::failure(e.to_string()),
        };
        let end_time = match slots::slot_end_time(&start_time, self.spa.session_duration_hours) {
            Ok(t) => t,
            Err(e) => return DispatchOutcome::failure(e.to_string()),
        };

        let request = BookingRequest {
            customer_name: name.to_owned(),
            customer_phone: phone.to_owned(),
            booking_date: date.to_owned(),
            slot_start_time: start_time.clone(),
            slot_end_time: end_time.clone(),
        };

        let started = Utc::now();
        let reply = self.store.book_slot(&request).await;
        let arguments = json!({
            "name": name,
            "date": date,
            "start_time": start_time,
            "end_time": end_time,
        });

        match reply {
            Ok(reply) if reply.is_success() => {
                let reference = reply.booking_reference.unwrap_or_default();
                let result = json!({
                    "success": true,
                    "booking_reference": reference,
                    "message": format!(
                        "Prenotazione confermata per {date} dalle {start_time} alle {end_time}. Codice: {reference}"
                    ),
                });
                self.single("book_spa_slot", arguments, result, true, started)
            }
            Ok(reply) => {
                let result = json!({
                    "success": false,
                    "message": reply
                        .message
                        .unwrap_or_else(|| "Prenotazione non riuscita".into()),
                });
                self.single("book_spa_slot", arguments, result, true, started)
            }
            Err(e) => self.store_failure("book_spa_slot", arguments, e, started),
        }
    }

    // ── get_latest_appointment ───────────────────────────────────────

    async fn latest_appointment(&self, phone: &str) -> DispatchOutcome {
        let started = Utc::now();
        match self.store.latest_appointment(phone).await {
            Ok(reply) => {
                let result = latest_result(&reply);
                self.single(
                    "get_latest_appointment",
                    json!({}),
                    result,
                    true,
                    started,
                )
            }
            Err(e) => self.store_failure("get_latest_appointment", json!({}), e, started),
        }
    }

    // ── delete_appointment ───────────────────────────────────────────

    async fn cancel(&self, args: &Value, phone: &str) -> DispatchOutcome {
        let mut invocations = Vec::new();

        // Resolve the reference through the latest appointment when the AI
        // did not supply one.
        let reference = match str_arg(args, "booking_reference") {
            Some(r) => r.to_owned(),
            None => {
                let started = Utc::now();
                match self.store.latest_appointment(phone).await {
                    Ok(reply) => {
                        let result = latest_result(&reply);
                        let reference = reply.booking.map(|b| b.reference);
                        invocations.push(InvocationOutcome {
                            tool_name: "get_latest_appointment".into(),
                            arguments: json!({}),
                            result,
                            success: true,
                            started_at: started,
                            finished_at: Utc::now(),
                        });

                        match reference {
                            Some(r) => r,
                            None => {
                                return DispatchOutcome {
                                    result: json!({
                                        "success": false,
                                        "message": "Nessuna prenotazione trovata",
                                    }),
                                    success: true,
                                    invocations,
                                };
                            }
                        }
                    }
                    Err(e) => {
                        return self.store_failure(
                            "get_latest_appointment",
                            json!({}),
                            e,
                            started,
                        )
                    }
                }
            }
        };

        let started = Utc::now();
        let reply = self.store.cancel_appointment(phone, Some(&reference)).await;
        let arguments = json!({ "booking_reference": reference });

        let mut outcome = match reply {
            Ok(reply) if reply.is_success() => {
                let result = json!({
                    "success": true,
                    "message": reply.message.unwrap_or_else(|| {
                        format!("Prenotazione {reference} cancellata")
                    }),
                });
                self.single("delete_appointment", arguments, result, true, started)
            }
            Ok(reply) => {
                let result = json!({
                    "success": false,
                    "message": reply
                        .message
                        .unwrap_or_else(|| "Cancellazione non riuscita".into()),
                });
                self.single("delete_appointment", arguments, result, true, started)
            }
            Err(e) => self.store_failure("delete_appointment", arguments, e, started),
        };

        // Keep the resolution lookup ahead of the cancellation itself.
        invocations.append(&mut outcome.invocations);
        outcome.invocations = invocations;
        outcome
    }

    // ── helpers ──────────────────────────────────────────────────────

    fn single(
        &self,
        tool_name: &str,
        arguments: Value,
        result: Value,
        success: bool,
        started_at: DateTime<Utc>,
    ) -> DispatchOutcome {
        DispatchOutcome {
            result: result.clone(),
            success,
            invocations: vec![InvocationOutcome {
                tool_name: tool_name.to_owned(),
                arguments,
                result,
                success,
                started_at,
                finished_at: Utc::now(),
            }],
        }
    }

    fn store_failure(
        &self,
        tool_name: &str,
        arguments: Value,
        error: vb_domain::Error,
        started_at: DateTime<Utc>,
    ) -> DispatchOutcome {
        tracing::error!(tool = tool_name, error = %error, "booking store call failed");
        self.single(
            tool_name,
            arguments,
            json!({ "error": error.to_string() }),
            false,
            started_at,
        )
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn latest_result(reply: &vb_store::LatestAppointmentReply) -> Value {
    match &reply.booking {
        Some(booking) if reply.is_success() => {
            let date = booking.date_formatted.clone().unwrap_or_default();
            let time = booking.time_slot.clone().unwrap_or_default();
            json!({
                "found": true,
                "booking_reference": booking.reference,
                "customer_name": booking.customer_name,
                "date": date,
                "time": time,
                "message": format!("Trovata prenotazione per {date} alle {time}"),
            })
        }
        _ => json!({
            "found": false,
            "message": reply
                .message
                .clone()
                .unwrap_or_else(|| "Nessuna prenotazione trovata".into()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use vb_domain::{Error, Result};
    use vb_store::{
        AppointmentInfo, AvailabilityReply, BookingReply, CallSessionRow, CallSessionUpdate,
        CancellationReply, ConversationCloseRow, ConversationRow, LatestAppointmentReply,
        ToolInvocationRow, TurnRow,
    };

    /// Scripted store: canned replies plus a log of procedure calls.
    #[derive(Default)]
    struct MockStore {
        calls: Mutex<Vec<String>>,
        spots_remaining: Option<i64>,
        latest_reference: Option<String>,
        fail_with: Option<String>,
        delay: Option<Duration>,
    }

    impl MockStore {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().push(call.into());
        }

        async fn maybe_delay(&self) {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
        }

        fn maybe_fail(&self) -> Result<()> {
            match &self.fail_with {
                Some(msg) => Err(Error::Store(msg.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl StoreProvider for MockStore {
        async fn check_slot_availability(
            &self,
            date: &str,
            start_time: &str,
        ) -> Result<AvailabilityReply> {
            self.record(format!("check:{date}:{start_time}"));
            self.maybe_delay().await;
            self.maybe_fail()?;
            Ok(match self.spots_remaining {
                Some(spots) => AvailabilityReply {
                    status: "success".into(),
                    available: Some(true),
                    spots_remaining: Some(spots),
                    total_capacity: Some(14),
                    message: None,
                },
                None => AvailabilityReply {
                    status: "full".into(),
                    available: None,
                    spots_remaining: None,
                    total_capacity: None,
                    message: Some("Slot non disponibile".into()),
                },
            })
        }

        async fn book_slot(&self, req: &BookingRequest) -> Result<BookingReply> {
            self.record(format!(
                "book:{}:{}:{}:{}:{}",
                req.customer_name,
                req.customer_phone,
                req.booking_date,
                req.slot_start_time,
                req.slot_end_time
            ));
            self.maybe_fail()?;
            Ok(BookingReply {
                status: "success".into(),
                booking_id: Some(7),
                booking_reference: Some("SPA-000042".into()),
                message: None,
            })
        }

        async fn latest_appointment(&self, phone: &str) -> Result<LatestAppointmentReply> {
            self.record(format!("latest:{phone}"));
            self.maybe_fail()?;
            Ok(match &self.latest_reference {
                Some(reference) => LatestAppointmentReply {
                    status: "success".into(),
                    booking: Some(AppointmentInfo {
                        reference: reference.clone(),
                        customer_name: Some("Maria Rossi".into()),
                        date_formatted: Some("20 gennaio 2025".into()),
                        time_slot: Some("10:00 - 12:00".into()),
                        is_future: Some(true),
                    }),
                    message: None,
                },
                None => LatestAppointmentReply {
                    status: "not_found".into(),
                    booking: None,
                    message: Some("Nessuna prenotazione trovata".into()),
                },
            })
        }

        async fn cancel_appointment(
            &self,
            phone: &str,
            reference: Option<&str>,
        ) -> Result<CancellationReply> {
            self.record(format!("cancel:{phone}:{}", reference.unwrap_or("-")));
            self.maybe_fail()?;
            Ok(CancellationReply {
                status: "success".into(),
                message: Some("Prenotazione cancellata".into()),
                cancelled_booking: None,
            })
        }

        async fn bookings_for_date(&self, _date: &str) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }

        async fn create_call_session(&self, _row: &CallSessionRow) -> Result<()> {
            Ok(())
        }

        async fn update_call_session(
            &self,
            _call_id: &str,
            _update: &CallSessionUpdate,
        ) -> Result<()> {
            Ok(())
        }

        async fn insert_conversation(&self, _row: &ConversationRow) -> Result<()> {
            Ok(())
        }

        async fn close_conversation(
            &self,
            _id: &str,
            _row: &ConversationCloseRow,
        ) -> Result<()> {
            Ok(())
        }

        async fn insert_turn(&self, _row: &TurnRow) -> Result<()> {
            Ok(())
        }

        async fn insert_tool_invocation(&self, _row: &ToolInvocationRow) -> Result<()> {
            Ok(())
        }
    }

    const PHONE: &str = "+391110002222";

    fn dispatcher(store: MockStore) -> (ToolDispatcher, Arc<MockStore>) {
        let store = Arc::new(store);
        let spa = SpaConfig {
            name: "Santa Caterina Beauty Farm".into(),
            session_duration_hours: 2,
            max_capacity_per_slot: 14,
        };
        let tools = ToolsConfig { dispatch_timeout: Duration::from_secs(15) };
        (ToolDispatcher::new(store.clone(), spa, &tools), store)
    }

    #[tokio::test]
    async fn availability_success_includes_spots() {
        let (d, store) = dispatcher(MockStore {
            spots_remaining: Some(5),
            ..Default::default()
        });
        let outcome = d
            .dispatch(
                "check_slot_availability",
                r#"{"date":"2025-01-20","start_time":"10:00"}"#,
                PHONE,
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result["available"], true);
        assert_eq!(outcome.result["spots_remaining"], 5);
        // Time normalized for the store.
        assert_eq!(store.calls.lock().as_slice(), ["check:2025-01-20:10:00:00"]);
    }

    #[tokio::test]
    async fn availability_full_slot() {
        let (d, _) = dispatcher(MockStore::default());
        let outcome = d
            .dispatch(
                "check_slot_availability",
                r#"{"date":"2025-01-20","start_time":"10:00"}"#,
                PHONE,
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result["available"], false);
        assert_eq!(outcome.result["message"], "Slot non disponibile");
    }

    #[tokio::test]
    async fn booking_computes_end_time_and_binds_phone() {
        let (d, store) = dispatcher(MockStore::default());
        let outcome = d
            .dispatch(
                "book_spa_slot",
                r#"{"name":"Maria Rossi","date":"2025-01-20","start_time":"10:00"}"#,
                PHONE,
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result["success"], true);
        assert_eq!(outcome.result["booking_reference"], "SPA-000042");
        assert_eq!(
            store.calls.lock().as_slice(),
            ["book:Maria Rossi:+391110002222:2025-01-20:10:00:00:12:00:00"]
        );
    }

    #[tokio::test]
    async fn booking_ignores_phone_in_arguments() {
        let (d, store) = dispatcher(MockStore::default());
        d.dispatch(
            "book_spa_slot",
            r#"{"name":"M","date":"2025-01-20","start_time":"10:00","phone":"+39999"}"#,
            PHONE,
        )
        .await;
        assert!(store.calls.lock()[0].contains(PHONE));
    }

    #[tokio::test]
    async fn missing_required_argument() {
        let (d, store) = dispatcher(MockStore::default());
        let outcome = d
            .dispatch("book_spa_slot", r#"{"date":"2025-01-20"}"#, PHONE)
            .await;

        assert!(!outcome.success);
        assert!(outcome.result["error"].as_str().unwrap().contains("required"));
        assert!(store.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn latest_appointment_found() {
        let (d, _) = dispatcher(MockStore {
            latest_reference: Some("SPA-000042".into()),
            ..Default::default()
        });
        let outcome = d.dispatch("get_latest_appointment", "{}", PHONE).await;

        assert!(outcome.success);
        assert_eq!(outcome.result["found"], true);
        assert_eq!(outcome.result["booking_reference"], "SPA-000042");
        assert_eq!(outcome.result["date"], "20 gennaio 2025");
    }

    #[tokio::test]
    async fn cancel_without_reference_resolves_latest_first() {
        let (d, store) = dispatcher(MockStore {
            latest_reference: Some("SPA-000042".into()),
            ..Default::default()
        });
        let outcome = d.dispatch("delete_appointment", "{}", PHONE).await;

        assert!(outcome.success);
        assert_eq!(outcome.result["success"], true);
        assert_eq!(
            store.calls.lock().as_slice(),
            [
                format!("latest:{PHONE}"),
                format!("cancel:{PHONE}:SPA-000042"),
            ]
        );
        // Both store calls are recorded, lookup first.
        assert_eq!(outcome.invocations.len(), 2);
        assert_eq!(outcome.invocations[0].tool_name, "get_latest_appointment");
        assert_eq!(outcome.invocations[1].tool_name, "delete_appointment");
    }

    #[tokio::test]
    async fn cancel_without_any_booking() {
        let (d, store) = dispatcher(MockStore::default());
        let outcome = d.dispatch("delete_appointment", "{}", PHONE).await;

        assert!(outcome.success);
        assert_eq!(outcome.result["success"], false);
        assert_eq!(store.calls.lock().as_slice(), [format!("latest:{PHONE}")]);
    }

    #[tokio::test]
    async fn unknown_tool_never_touches_the_store() {
        let (d, store) = dispatcher(MockStore::default());
        let outcome = d.dispatch("pay_invoice", "{}", PHONE).await;

        assert!(!outcome.success);
        assert_eq!(outcome.result["error"], "unknown function");
        assert!(store.calls.lock().is_empty());
        assert_eq!(outcome.invocations.len(), 1);
    }

    #[tokio::test]
    async fn store_error_becomes_error_result() {
        let (d, _) = dispatcher(MockStore {
            fail_with: Some("connection refused".into()),
            ..Default::default()
        });
        let outcome = d
            .dispatch(
                "check_slot_availability",
                r#"{"date":"2025-01-20","start_time":"10:00"}"#,
                PHONE,
            )
            .await;

        assert!(!outcome.success);
        assert!(outcome.result["error"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn deadline_exceeded_yields_timeout() {
        let store = MockStore {
            spots_remaining: Some(3),
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let store = Arc::new(store);
        let spa = SpaConfig {
            name: "Spa".into(),
            session_duration_hours: 2,
            max_capacity_per_slot: 14,
        };
        let tools = ToolsConfig { dispatch_timeout: Duration::from_millis(50) };
        let d = ToolDispatcher::new(store.clone(), spa, &tools);

        let outcome = d
            .dispatch(
                "check_slot_availability",
                r#"{"date":"2025-01-20","start_time":"10:00"}"#,
                PHONE,
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.result["error"], "timeout");

        // A later call still works.
        let outcome = d.dispatch("get_latest_appointment", "{}", PHONE).await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn malformed_arguments_json() {
        let (d, store) = dispatcher(MockStore::default());
        let outcome = d.dispatch("book_spa_slot", "not json", PHONE).await;

        assert!(!outcome.success);
        assert!(outcome.result["error"].as_str().unwrap().contains("invalid arguments"));
        assert!(store.calls.lock().is_empty());
    }
}
