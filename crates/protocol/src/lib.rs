//! Wire types for the two streaming peers of a call: the carrier
//! media-stream socket and the realtime AI socket.
//!
//! Audio payloads are opaque base64 strings in both directions; nothing
//! here decodes µ-law.

pub mod carrier;
pub mod realtime;
