//! The seam between the gateway and the booking store.

use async_trait::async_trait;
use serde_json::Value;

use vb_domain::Result;

use crate::types::{
    AvailabilityReply, BookingReply, BookingRequest, CallSessionRow, CallSessionUpdate,
    CancellationReply, ConversationCloseRow, ConversationRow, LatestAppointmentReply,
    ToolInvocationRow, TurnRow,
};

/// Everything the bridge and HTTP surface need from the booking store.
///
/// Capacity enforcement and reference uniqueness live inside the store's
/// procedures; implementations must not re-check them locally.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    // ── Booking procedures ───────────────────────────────────────────

    /// `check_slot_availability(p_date, p_start_time)`. `start_time` is
    /// `HH:MM:SS`.
    async fn check_slot_availability(
        &self,
        date: &str,
        start_time: &str,
    ) -> Result<AvailabilityReply>;

    /// `book_spa_slot(...)`.
    async fn book_slot(&self, req: &BookingRequest) -> Result<BookingReply>;

    /// `get_latest_appointment(p_phone_number)`.
    async fn latest_appointment(&self, phone: &str) -> Result<LatestAppointmentReply>;

    /// `delete_appointment(p_phone_number, p_booking_reference)`.
    async fn cancel_appointment(
        &self,
        phone: &str,
        reference: Option<&str>,
    ) -> Result<CancellationReply>;

    /// All bookings for a date, ordered by slot start time.
    async fn bookings_for_date(&self, date: &str) -> Result<Vec<Value>>;

    // ── Call sessions ────────────────────────────────────────────────

    async fn create_call_session(&self, row: &CallSessionRow) -> Result<()>;

    async fn update_call_session(&self, call_id: &str, update: &CallSessionUpdate)
        -> Result<()>;

    // ── Conversation log (best-effort sink) ──────────────────────────

    async fn insert_conversation(&self, row: &ConversationRow) -> Result<()>;

    async fn close_conversation(&self, id: &str, row: &ConversationCloseRow) -> Result<()>;

    async fn insert_turn(&self, row: &TurnRow) -> Result<()>;

    async fn insert_tool_invocation(&self, row: &ToolInvocationRow) -> Result<()>;
}
