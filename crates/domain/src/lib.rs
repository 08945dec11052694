//! Shared domain types for the VoiceBridge workspace: the common error
//! enum, environment-derived configuration, the unified retry policy, and
//! the spa time-slot table.

pub mod config;
pub mod error;
pub mod retry;
pub mod slots;

pub use error::{Error, Result};
