//! Realtime AI protocol.
//!
//! Frames are JSON objects tagged by `type`. [`ClientEvent`] covers what the
//! bridge sends; [`RealtimeEvent`] covers what it consumes. Event kinds the
//! bridge does not act on collapse into [`RealtimeEvent::Unhandled`] so an
//! unknown frame never kills the relay.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    pub modalities: Vec<Modality>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: AudioFormat,
    pub output_audio_format: AudioFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<TranscriptionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,
    pub tool_choice: ToolChoice,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum AudioFormat {
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionConfig {
    pub model: String,
}

impl TranscriptionConfig {
    pub fn whisper() -> Self {
        Self { model: "whisper-1".into() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetection {
    ServerVad {
        threshold: f32,
        prefix_padding_ms: u32,
        silence_duration_ms: u32,
    },
}

impl TurnDetection {
    /// Server VAD with the thresholds the bridge always uses.
    pub fn server_vad_default() -> Self {
        Self::ServerVad {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
}

/// A function tool advertised to the AI session.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub kind: ToolKind,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Function,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client → AI events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.create")]
    ResponseCreate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    FunctionCallOutput {
        call_id: String,
        /// JSON-encoded tool result.
        output: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AI → client events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum RealtimeEvent {
    #[serde(rename = "session.updated")]
    SessionUpdated,

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    /// Final transcript of a caller utterance (a user turn).
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        transcript: String,
        #[serde(default)]
        event_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Partial assistant transcript; accumulated until the `done` event.
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta { delta: String },

    /// Final assistant transcript (an assistant turn).
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone { transcript: String },

    /// One chunk of synthesized audio to forward to the carrier.
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },

    /// The AI wants a tool executed.
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        name: String,
        call_id: String,
        /// JSON-encoded argument object.
        arguments: String,
    },

    #[serde(rename = "error")]
    Error { error: Value },

    /// Any event kind the bridge does not act on.
    #[serde(other)]
    Unhandled,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spa_session() -> SessionConfig {
        SessionConfig {
            modalities: vec![Modality::Text, Modality::Audio],
            instructions: "You are a receptionist.".into(),
            voice: "alloy".into(),
            input_audio_format: AudioFormat::G711Ulaw,
            output_audio_format: AudioFormat::G711Ulaw,
            input_audio_transcription: Some(TranscriptionConfig::whisper()),
            turn_detection: Some(TurnDetection::server_vad_default()),
            temperature: 0.8,
            tools: vec![],
            tool_choice: ToolChoice::Auto,
        }
    }

    #[test]
    fn session_update_wire_shape() {
        let json =
            serde_json::to_value(ClientEvent::SessionUpdate { session: spa_session() }).unwrap();
        assert_eq!(json["type"], "session.update");
        assert_eq!(json["session"]["modalities"], serde_json::json!(["text", "audio"]));
        assert_eq!(json["session"]["input_audio_format"], "g711_ulaw");
        assert_eq!(json["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(json["session"]["turn_detection"]["silence_duration_ms"], 500);
        assert_eq!(json["session"]["input_audio_transcription"]["model"], "whisper-1");
        assert_eq!(json["session"]["tool_choice"], "auto");
        // Empty tools list is omitted entirely.
        assert!(json["session"].get("tools").is_none());
    }

    #[test]
    fn audio_append_wire_shape() {
        let json = serde_json::to_value(ClientEvent::InputAudioBufferAppend {
            audio: "AAAA".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "input_audio_buffer.append", "audio": "AAAA"})
        );
    }

    #[test]
    fn tool_result_wire_shape() {
        let json = serde_json::to_value(ClientEvent::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: "fc1".into(),
                output: r#"{"available":true}"#.into(),
            },
        })
        .unwrap();
        assert_eq!(json["type"], "conversation.item.create");
        assert_eq!(json["item"]["type"], "function_call_output");
        assert_eq!(json["item"]["call_id"], "fc1");

        let create = serde_json::to_value(ClientEvent::ResponseCreate).unwrap();
        assert_eq!(create, serde_json::json!({"type": "response.create"}));
    }

    #[test]
    fn parses_transcription_completed() {
        let raw = r#"{
            "type": "conversation.item.input_audio_transcription.completed",
            "event_id": "ev1",
            "item_id": "item1",
            "transcript": "vorrei prenotare domani alle dieci"
        }"#;
        let event: RealtimeEvent = serde_json::from_str(raw).unwrap();
        match event {
            RealtimeEvent::TranscriptionCompleted { transcript, event_id, .. } => {
                assert_eq!(transcript, "vorrei prenotare domani alle dieci");
                assert_eq!(event_id.as_deref(), Some("ev1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_function_call_arguments_done() {
        let raw = r#"{
            "type": "response.function_call_arguments.done",
            "name": "check_slot_availability",
            "call_id": "fc1",
            "arguments": "{\"date\":\"2025-01-20\",\"start_time\":\"10:00\"}"
        }"#;
        let event: RealtimeEvent = serde_json::from_str(raw).unwrap();
        match event {
            RealtimeEvent::FunctionCallArgumentsDone { name, call_id, arguments } => {
                assert_eq!(name, "check_slot_availability");
                assert_eq!(call_id, "fc1");
                let args: Value = serde_json::from_str(&arguments).unwrap();
                assert_eq!(args["start_time"], "10:00");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_kind_collapses_to_unhandled() {
        let event: RealtimeEvent =
            serde_json::from_str(r#"{"type":"response.done","response":{}}"#).unwrap();
        assert!(matches!(event, RealtimeEvent::Unhandled));
    }

    #[test]
    fn unit_variants_tolerate_extra_fields() {
        let event: RealtimeEvent = serde_json::from_str(
            r#"{"type":"input_audio_buffer.speech_started","audio_start_ms":120}"#,
        )
        .unwrap();
        assert!(matches!(event, RealtimeEvent::SpeechStarted));
    }
}
