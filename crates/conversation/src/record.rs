use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One contiguous utterance, as delineated by the AI's transcription events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Strictly increasing within a conversation, starting at 1.
    pub turn_number: u32,
    pub role: Role,
    pub transcript: String,
    pub recorded_at: DateTime<Utc>,
    /// The AI event that delivered the transcript, when it carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_event_id: Option<String>,
}

/// One AI-initiated function call plus the result returned to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub tool_name: String,
    /// Opaque call id assigned by the AI.
    pub call_id: String,
    pub arguments: Value,
    pub result: Value,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub execution_ms: u64,
}

/// The complete record of one accepted call session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: String,
    pub call_sid: String,
    pub stream_sid: String,
    pub customer_phone: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub turns: Vec<TurnRecord>,
    pub tool_invocations: Vec<ToolInvocationRecord>,
}
