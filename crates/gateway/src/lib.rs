//! The VoiceBridge gateway: HTTP surface, carrier media WebSocket endpoint,
//! and the per-call session bridge.

pub mod api;
pub mod bridge;
pub mod instructions;
pub mod state;
pub mod tools;
pub mod twiml;
