//! Carrier media-stream protocol.
//!
//! The carrier delivers JSON text frames tagged by `event`:
//! `connected`, `start`, `media`, `mark`, `stop`. We send back `media`
//! frames tagged with the stream identifier assigned at `start`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound frames
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A frame received from the carrier.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierEvent {
    /// First frame after the WebSocket opens. Informational.
    Connected {
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },

    /// Stream metadata: identifiers and the custom parameters passed from
    /// the call-control markup.
    Start { start: StreamStart },

    /// One chunk of caller audio (base64 µ-law @ 8 kHz).
    Media { media: MediaChunk },

    /// Acknowledgment of a mark we sent. Ignored.
    Mark {
        #[serde(default)]
        mark: Option<serde_json::Value>,
    },

    /// The carrier is done with the stream.
    Stop {
        #[serde(default)]
        stop: Option<serde_json::Value>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamStart {
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
    #[serde(rename = "callSid")]
    pub call_sid: String,
    #[serde(rename = "customParameters", default)]
    pub custom_parameters: HashMap<String, String>,
}

impl StreamStart {
    /// The caller's phone number, passed through from the front door.
    pub fn customer_phone(&self) -> Option<&str> {
        self.custom_parameters.get("customerPhone").map(String::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaChunk {
    pub payload: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub track: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outbound frames
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A frame sent to the carrier.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierFrame {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: MediaPayload,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaPayload {
    pub payload: String,
}

impl CarrierFrame {
    /// Build an outbound media frame for the given stream.
    pub fn media(stream_sid: impl Into<String>, payload_b64: impl Into<String>) -> Self {
        Self::Media {
            stream_sid: stream_sid.into(),
            media: MediaPayload { payload: payload_b64.into() },
        }
    }
}
