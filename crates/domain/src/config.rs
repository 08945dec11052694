//! Environment-derived configuration.
//!
//! Everything is read once at startup via [`Config::from_env`]; missing
//! required keys abort the process before the server binds. Sections mirror
//! the services they configure: realtime AI, booking store, spa business
//! rules, HTTP server.

use std::time::Duration;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub realtime: RealtimeConfig,
    pub store: StoreConfig,
    pub spa: SpaConfig,
    pub tools: ToolsConfig,
    pub log_level: String,
}

/// Realtime AI provider settings.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub api_key: String,
    pub model: String,
    pub voice: String,
}

/// Booking store (PostgREST-style) settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

/// Spa business rules that shape instructions and tool dispatch.
#[derive(Debug, Clone)]
pub struct SpaConfig {
    pub name: String,
    pub session_duration_hours: u32,
    pub max_capacity_per_slot: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public hostname used to compose the media-stream WebSocket URL
    /// handed back to the carrier (no scheme, e.g. `bridge.example.com`).
    pub external_hostname: String,
}

/// Tool dispatch limits.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub dispatch_timeout: Duration,
}

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup function.
    ///
    /// `from_env` delegates here; tests supply a map-backed lookup instead
    /// of mutating process-global environment state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is not set")))
        };
        let or_default = |key: &str, default: &str| -> String {
            lookup(key).filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_owned())
        };
        let parse_u32 = |key: &str, default: u32| -> Result<u32> {
            match lookup(key) {
                Some(raw) if !raw.is_empty() => raw
                    .parse()
                    .map_err(|_| Error::Config(format!("{key}: not an integer: {raw}"))),
                _ => Ok(default),
            }
        };

        let port = parse_u32("PORT", 8080)? as u16;
        let external_hostname =
            or_default("EXTERNAL_HOSTNAME", &format!("localhost:{port}"));

        Ok(Self {
            server: ServerConfig {
                host: or_default("HOST", "0.0.0.0"),
                port,
                external_hostname,
            },
            realtime: RealtimeConfig {
                api_key: required("OPENAI_API_KEY")?,
                model: or_default("OPENAI_MODEL", "gpt-4o-mini-realtime-preview-2024-12-17"),
                voice: or_default("VOICE", "alloy"),
            },
            store: StoreConfig {
                base_url: required("BOOKING_STORE_URL")?
                    .trim_end_matches('/')
                    .to_owned(),
                api_key: required("BOOKING_STORE_KEY")?,
                timeout_ms: parse_u32("BOOKING_STORE_TIMEOUT_MS", 10_000)? as u64,
                max_retries: parse_u32("BOOKING_STORE_MAX_RETRIES", 2)?,
            },
            spa: SpaConfig {
                name: or_default("SPA_NAME", "Santa Caterina Beauty Farm"),
                session_duration_hours: parse_u32("SESSION_DURATION_HOURS", 2)?,
                max_capacity_per_slot: parse_u32("MAX_CAPACITY_PER_SLOT", 14)?,
            },
            tools: ToolsConfig {
                dispatch_timeout: Duration::from_secs(
                    parse_u32("TOOL_TIMEOUT_SECS", 15)? as u64,
                ),
            },
            log_level: or_default("LOG_LEVEL", "info"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("OPENAI_API_KEY", "sk-test"),
            ("BOOKING_STORE_URL", "https://store.example.com/"),
            ("BOOKING_STORE_KEY", "anon-key"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_applied() {
        let cfg = load(&base_env()).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.external_hostname, "localhost:8080");
        assert_eq!(cfg.realtime.model, "gpt-4o-mini-realtime-preview-2024-12-17");
        assert_eq!(cfg.realtime.voice, "alloy");
        assert_eq!(cfg.spa.session_duration_hours, 2);
        assert_eq!(cfg.spa.max_capacity_per_slot, 14);
        assert_eq!(cfg.tools.dispatch_timeout, Duration::from_secs(15));
    }

    #[test]
    fn store_url_trailing_slash_trimmed() {
        let cfg = load(&base_env()).unwrap();
        assert_eq!(cfg.store.base_url, "https://store.example.com");
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let mut env = base_env();
        env.remove("OPENAI_API_KEY");
        let err = load(&env).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("BOOKING_STORE_KEY", "");
        assert!(load(&env).is_err());
    }

    #[test]
    fn bad_integer_rejected() {
        let mut env = base_env();
        env.insert("SESSION_DURATION_HOURS", "two");
        let err = load(&env).unwrap_err();
        assert!(err.to_string().contains("SESSION_DURATION_HOURS"));
    }

    #[test]
    fn external_hostname_override() {
        let mut env = base_env();
        env.insert("EXTERNAL_HOSTNAME", "bridge.example.com");
        let cfg = load(&env).unwrap();
        assert_eq!(cfg.server.external_hostname, "bridge.example.com");
    }
}
