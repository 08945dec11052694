//! Realtime AI WebSocket client — bounded-retry connect, session
//! configuration, audio append, tool results, and the inbound event stream.

mod client;

pub use client::{connect, RealtimeConnection, RealtimeEvents, RealtimeSender};
