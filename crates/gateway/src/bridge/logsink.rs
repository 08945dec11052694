//! Single ingress point for a session's conversation writes.
//!
//! Every turn and tool invocation goes through [`SessionLog`]: the in-memory
//! store is updated synchronously (authoritative, serves the export
//! endpoints), and the external log store is mirrored on a detached task.
//! A failed remote write is logged and never affects the call.

use std::sync::Arc;

use chrono::Utc;

use vb_conversation::{ConversationStore, Role, ToolInvocationRecord};
use vb_store::{
    CallSessionUpdate, ConversationCloseRow, ConversationRow, StoreProvider, ToolInvocationRow,
    TurnRow,
};

use crate::tools::InvocationOutcome;

#[derive(Clone)]
pub struct SessionLog {
    conversations: Arc<ConversationStore>,
    store: Arc<dyn StoreProvider>,
    conversation_id: String,
    call_sid: String,
}

impl SessionLog {
    /// Open the conversation record for a freshly started stream and mirror
    /// it to the log store.
    pub fn open(
        conversations: Arc<ConversationStore>,
        store: Arc<dyn StoreProvider>,
        call_sid: &str,
        stream_sid: &str,
        customer_phone: &str,
        model: &str,
    ) -> Self {
        let record = conversations.open(call_sid, stream_sid, customer_phone, model);

        let log = Self {
            conversations,
            store,
            conversation_id: record.conversation_id.clone(),
            call_sid: call_sid.to_owned(),
        };

        let row = ConversationRow {
            id: record.conversation_id,
            call_id: record.call_sid,
            stream_id: record.stream_sid,
            phone_number: record.customer_phone,
            model: record.model,
            started_at: record.started_at,
        };
        let store = log.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.insert_conversation(&row).await {
                tracing::warn!(error = %e, "conversation log write failed");
            }
        });

        log
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Record one turn. The store assigns the turn number.
    pub fn turn(&self, role: Role, transcript: &str, source_event_id: Option<String>) {
        let Some(turn) =
            self.conversations
                .append_turn(&self.conversation_id, role, transcript, source_event_id)
        else {
            return;
        };

        tracing::info!(
            conversation_id = %self.conversation_id,
            turn = turn.turn_number,
            role = role.as_str(),
            transcript,
            "turn recorded"
        );

        let row = TurnRow {
            conversation_id: self.conversation_id.clone(),
            turn_number: turn.turn_number,
            role: role.as_str().to_owned(),
            transcript: turn.transcript,
            recorded_at: turn.recorded_at,
        };
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.insert_turn(&row).await {
                tracing::warn!(error = %e, "turn log write failed");
            }
        });
    }

    /// Record the store calls made while servicing one AI tool call.
    pub fn tool_invocations(&self, ai_call_id: &str, outcomes: &[InvocationOutcome]) {
        for outcome in outcomes {
            let record = ToolInvocationRecord {
                tool_name: outcome.tool_name.clone(),
                call_id: ai_call_id.to_owned(),
                arguments: outcome.arguments.clone(),
                result: outcome.result.clone(),
                success: outcome.success,
                started_at: outcome.started_at,
                finished_at: outcome.finished_at,
                execution_ms: outcome.execution_ms(),
            };
            self.conversations
                .append_tool_invocation(&self.conversation_id, record);

            tracing::info!(
                conversation_id = %self.conversation_id,
                tool = %outcome.tool_name,
                success = outcome.success,
                execution_ms = outcome.execution_ms(),
                "tool invocation recorded"
            );

            let row = ToolInvocationRow {
                conversation_id: self.conversation_id.clone(),
                tool_name: outcome.tool_name.clone(),
                call_id: ai_call_id.to_owned(),
                arguments: outcome.arguments.clone(),
                result: outcome.result.clone(),
                success: outcome.success,
                execution_ms: outcome.execution_ms(),
                recorded_at: Utc::now(),
            };
            let store = self.store.clone();
            tokio::spawn(async move {
                if let Err(e) = store.insert_tool_invocation(&row).await {
                    tracing::warn!(error = %e, "tool invocation log write failed");
                }
            });
        }
    }

    /// Close the conversation record and the `call_sessions` row. Safe to
    /// call from any exit path; only the first call does anything.
    pub async fn finalize(&self, session_status: &str) {
        let Some(record) = self.conversations.finalize(&self.conversation_id) else {
            return;
        };

        let close = ConversationCloseRow {
            ended_at: record.ended_at.unwrap_or_else(Utc::now),
            duration_seconds: record.duration_seconds.unwrap_or(0.0),
            turn_count: record.turns.len(),
            tool_invocation_count: record.tool_invocations.len(),
        };
        if let Err(e) = self
            .store
            .close_conversation(&self.conversation_id, &close)
            .await
        {
            tracing::warn!(error = %e, "conversation close write failed");
        }

        let update = CallSessionUpdate {
            status: Some(session_status.to_owned()),
            duration_seconds: record.duration_seconds,
        };
        if let Err(e) = self.store.update_call_session(&self.call_sid, &update).await {
            tracing::warn!(error = %e, "call session update failed");
        }
    }
}
