//! Booking tools exposed to the AI session: their schemas and the
//! transport-agnostic dispatcher that services them.

pub mod definitions;
pub mod dispatch;

pub use dispatch::{DispatchOutcome, InvocationOutcome, ToolDispatcher};
