//! Assistant instruction template.
//!
//! The template ships as a bundled asset and is rendered once per session
//! with the caller's phone number and the spa's business parameters.

use vb_domain::config::SpaConfig;
use vb_domain::slots;

const TEMPLATE: &str = include_str!("instructions.txt");

/// Render the session instructions for one caller.
pub fn render(spa: &SpaConfig, customer_phone: &str) -> String {
    TEMPLATE
        .replace("{{spa_name}}", &spa.name)
        .replace("{{customer_phone}}", customer_phone)
        .replace(
            "{{session_duration_hours}}",
            &spa.session_duration_hours.to_string(),
        )
        .replace("{{max_capacity}}", &spa.max_capacity_per_slot.to_string())
        .replace("{{time_slots}}", &slots::slot_listing())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spa() -> SpaConfig {
        SpaConfig {
            name: "Santa Caterina Beauty Farm".into(),
            session_duration_hours: 2,
            max_capacity_per_slot: 14,
        }
    }

    #[test]
    fn substitutes_caller_and_spa_details() {
        let text = render(&spa(), "+391110002222");
        assert!(text.contains("receptionist for Santa Caterina Beauty Farm"));
        assert!(text.contains("+391110002222"));
        assert!(text.contains("Each session lasts 2 hours"));
        assert!(text.contains("Maximum capacity: 14 people"));
        assert!(text.contains("10:00 AM - 12:00 PM"));
    }

    #[test]
    fn no_placeholders_left_behind() {
        let text = render(&spa(), "+391110002222");
        assert!(!text.contains("{{"));
        assert!(!text.contains("}}"));
    }
}
