//! Spa time-slot table and time arithmetic.
//!
//! The booking store expects `HH:MM:SS` times; the AI tools speak `HH:MM`.
//! Helpers here normalize between the two and derive a slot's end time from
//! the configured session duration.

use chrono::{NaiveTime, Timelike};

use crate::error::{Error, Result};

/// A bookable slot as presented to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: &'static str,
    pub end: &'static str,
    pub display: &'static str,
}

/// The fixed daily slot grid (10:00–20:00, two-hour sessions).
pub const TIME_SLOTS: &[TimeSlot] = &[
    TimeSlot { start: "10:00:00", end: "12:00:00", display: "10:00 AM - 12:00 PM" },
    TimeSlot { start: "12:00:00", end: "14:00:00", display: "12:00 PM - 2:00 PM" },
    TimeSlot { start: "14:00:00", end: "16:00:00", display: "2:00 PM - 4:00 PM" },
    TimeSlot { start: "16:00:00", end: "18:00:00", display: "4:00 PM - 6:00 PM" },
    TimeSlot { start: "18:00:00", end: "20:00:00", display: "6:00 PM - 8:00 PM" },
];

/// One line per slot, for embedding in the assistant instructions.
pub fn slot_listing() -> String {
    TIME_SLOTS
        .iter()
        .map(|s| format!("  - {}", s.display))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalize `HH:MM` to the store's `HH:MM:SS`. `HH:MM:SS` passes through.
pub fn normalize_time(raw: &str) -> Result<String> {
    let parsed = NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| Error::Protocol(format!("unparseable time: {raw}")))?;
    Ok(parsed.format("%H:%M:%S").to_string())
}

/// Compute a slot's end time from its (normalized) start time and the
/// session duration in hours. Wraps at midnight, which the slot grid never
/// reaches in practice.
pub fn slot_end_time(start: &str, duration_hours: u32) -> Result<String> {
    let start = NaiveTime::parse_from_str(start, "%H:%M:%S")
        .map_err(|_| Error::Protocol(format!("unparseable time: {start}")))?;
    let end = start
        .with_hour((start.hour() + duration_hours) % 24)
        .ok_or_else(|| Error::Protocol(format!("invalid slot end for {start}")))?;
    Ok(end.format("%H:%M:%S").to_string())
}

/// Validate a `YYYY-MM-DD` date string.
pub fn validate_date(raw: &str) -> Result<()> {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| Error::Protocol(format!("unparseable date: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_short_form() {
        assert_eq!(normalize_time("10:00").unwrap(), "10:00:00");
        assert_eq!(normalize_time("18:30").unwrap(), "18:30:00");
    }

    #[test]
    fn long_form_passes_through() {
        assert_eq!(normalize_time("14:00:00").unwrap(), "14:00:00");
    }

    #[test]
    fn garbage_time_rejected() {
        assert!(normalize_time("quarter past ten").is_err());
        assert!(normalize_time("25:00").is_err());
    }

    #[test]
    fn end_time_adds_session_duration() {
        assert_eq!(slot_end_time("10:00:00", 2).unwrap(), "12:00:00");
        assert_eq!(slot_end_time("18:00:00", 2).unwrap(), "20:00:00");
    }

    #[test]
    fn date_validation() {
        assert!(validate_date("2025-01-20").is_ok());
        assert!(validate_date("20/01/2025").is_err());
        assert!(validate_date("2025-13-01").is_err());
    }

    #[test]
    fn listing_has_one_line_per_slot() {
        assert_eq!(slot_listing().lines().count(), TIME_SLOTS.len());
    }
}
