//! Tool schemas advertised in `session.update`.

use vb_protocol::realtime::{ToolKind, ToolSchema};

/// Build the set of tool definitions exposed to the AI.
pub fn tool_schemas() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            kind: ToolKind::Function,
            name: "check_slot_availability".into(),
            description: "Check if a specific spa time slot has available space".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "date": {
                        "type": "string",
                        "description": "Date in YYYY-MM-DD format"
                    },
                    "start_time": {
                        "type": "string",
                        "description": "Start time in HH:MM format (e.g., 10:00, 14:00)"
                    }
                },
                "required": ["date", "start_time"]
            }),
        },
        ToolSchema {
            kind: ToolKind::Function,
            name: "book_spa_slot".into(),
            description: "Book a spa session for the caller".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Customer's full name"
                    },
                    "date": {
                        "type": "string",
                        "description": "Booking date in YYYY-MM-DD format"
                    },
                    "start_time": {
                        "type": "string",
                        "description": "Session start time in HH:MM format"
                    }
                },
                "required": ["name", "date", "start_time"]
            }),
        },
        ToolSchema {
            kind: ToolKind::Function,
            name: "get_latest_appointment".into(),
            description: "Retrieve the caller's most recent appointment".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolSchema {
            kind: ToolKind::Function,
            name: "delete_appointment".into(),
            description: "Cancel the caller's appointment. Uses the most recent booking when no reference is given".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "booking_reference": {
                        "type": "string",
                        "description": "Booking reference code (e.g., SPA-000123)"
                    }
                }
            }),
        },
    ]
}
