//! Request/response types for the booking store.
//!
//! The stored procedures all reply with a `status` discriminator plus
//! procedure-specific fields; everything beyond `status` is optional so a
//! partial reply never fails deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stored-procedure replies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityReply {
    pub status: String,
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default)]
    pub spots_remaining: Option<i64>,
    #[serde(default)]
    pub total_capacity: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AvailabilityReply {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingReply {
    pub status: String,
    #[serde(default)]
    pub booking_id: Option<i64>,
    #[serde(default)]
    pub booking_reference: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl BookingReply {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestAppointmentReply {
    pub status: String,
    #[serde(default)]
    pub booking: Option<AppointmentInfo>,
    #[serde(default)]
    pub message: Option<String>,
}

impl LatestAppointmentReply {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentInfo {
    pub reference: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub date_formatted: Option<String>,
    #[serde(default)]
    pub time_slot: Option<String>,
    #[serde(default)]
    pub is_future: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancellationReply {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub cancelled_booking: Option<Value>,
}

impl CancellationReply {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Requests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Arguments for `book_spa_slot`. Times are `HH:MM:SS`.
#[derive(Debug, Clone, Serialize)]
pub struct BookingRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub booking_date: String,
    pub slot_start_time: String,
    pub slot_end_time: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Call-session and conversation-log rows
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct CallSessionRow {
    pub call_id: String,
    pub phone_number: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CallSessionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationRow {
    pub id: String,
    pub call_id: String,
    pub stream_id: String,
    pub phone_number: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationCloseRow {
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub turn_count: usize,
    pub tool_invocation_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnRow {
    pub conversation_id: String,
    pub turn_number: u32,
    pub role: String,
    pub transcript: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocationRow {
    pub conversation_id: String,
    pub tool_name: String,
    pub call_id: String,
    pub arguments: Value,
    pub result: Value,
    pub success: bool,
    pub execution_ms: u64,
    pub recorded_at: DateTime<Utc>,
}
