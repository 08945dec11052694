//! In-memory conversation store.
//!
//! One record per accepted session, keyed by conversation id. All mutation
//! goes through `&self` methods holding the write lock, which serializes
//! writes from a session's sub-tasks.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use crate::record::{ConversationRecord, Role, ToolInvocationRecord, TurnRecord};

#[derive(Default)]
pub struct ConversationStore {
    records: RwLock<HashMap<String, ConversationRecord>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a record for a freshly accepted session. Returns the new
    /// conversation id.
    pub fn open(
        &self,
        call_sid: &str,
        stream_sid: &str,
        customer_phone: &str,
        model: &str,
    ) -> ConversationRecord {
        let record = ConversationRecord {
            conversation_id: uuid::Uuid::new_v4().to_string(),
            call_sid: call_sid.to_owned(),
            stream_sid: stream_sid.to_owned(),
            customer_phone: customer_phone.to_owned(),
            model: model.to_owned(),
            started_at: Utc::now(),
            ended_at: None,
            duration_seconds: None,
            turns: Vec::new(),
            tool_invocations: Vec::new(),
        };

        self.records
            .write()
            .insert(record.conversation_id.clone(), record.clone());

        tracing::info!(
            conversation_id = %record.conversation_id,
            call_sid,
            "conversation record opened"
        );
        record
    }

    /// Append a turn; the store assigns the next turn number. Returns the
    /// appended record, or `None` for an unknown conversation.
    pub fn append_turn(
        &self,
        conversation_id: &str,
        role: Role,
        transcript: &str,
        source_event_id: Option<String>,
    ) -> Option<TurnRecord> {
        let mut records = self.records.write();
        let record = records.get_mut(conversation_id)?;

        let turn = TurnRecord {
            turn_number: record.turns.len() as u32 + 1,
            role,
            transcript: transcript.to_owned(),
            recorded_at: Utc::now(),
            source_event_id,
        };
        record.turns.push(turn.clone());
        Some(turn)
    }

    /// Append a tool invocation. Returns `false` for an unknown conversation.
    pub fn append_tool_invocation(
        &self,
        conversation_id: &str,
        invocation: ToolInvocationRecord,
    ) -> bool {
        let mut records = self.records.write();
        match records.get_mut(conversation_id) {
            Some(record) => {
                record.tool_invocations.push(invocation);
                true
            }
            None => false,
        }
    }

    /// Close the record: set `ended_at` and the duration. Idempotent — the
    /// first call wins and later calls return `None`.
    pub fn finalize(&self, conversation_id: &str) -> Option<ConversationRecord> {
        let mut records = self.records.write();
        let record = records.get_mut(conversation_id)?;

        if record.ended_at.is_some() {
            return None;
        }

        let ended = Utc::now();
        record.ended_at = Some(ended);
        record.duration_seconds =
            Some((ended - record.started_at).num_milliseconds() as f64 / 1000.0);

        tracing::info!(
            conversation_id,
            turns = record.turns.len(),
            tool_invocations = record.tool_invocations.len(),
            duration_seconds = record.duration_seconds,
            "conversation record finalized"
        );
        Some(record.clone())
    }

    /// Look up by conversation id.
    pub fn get(&self, conversation_id: &str) -> Option<ConversationRecord> {
        self.records.read().get(conversation_id).cloned()
    }

    /// Look up by the carrier's call id (export endpoints accept either).
    pub fn find_by_call(&self, call_sid: &str) -> Option<ConversationRecord> {
        self.records
            .read()
            .values()
            .find(|r| r.call_sid == call_sid)
            .cloned()
    }
}
