//! Configuration for the Telegram adapter.
//!
//! Loaded as the `telegram` section of the Tally configuration file.
//!
//! # Example Configuration
//!
//! ```yaml
//! telegram:
//!   token: ${TALLY_TELEGRAM__TOKEN}
//!   api_base: https://api.telegram.org
//!   poll_timeout_secs: 60
//!   request_timeout_secs: 75
//!   allowed_updates: [message, edited_message, callback_query, inline_query]
//!   channel_capacity: 100
//!   debug: false
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram adapter configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather.
    pub token: String,

    /// Bot API base URL, without a trailing slash.
    pub api_base: String,

    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u64,

    /// HTTP timeout for every request; must exceed `poll_timeout_secs`.
    pub request_timeout_secs: u64,

    /// Update kinds to receive.
    pub allowed_updates: Vec<String>,

    /// Capacity of the channel between the poller and the listener.
    pub channel_capacity: usize,

    /// Log every received update at debug level.
    pub debug: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            poll_timeout_secs: 60,
            request_timeout_secs: 75,
            allowed_updates: ["message", "edited_message", "callback_query", "inline_query"]
                .map(String::from)
                .to_vec(),
            channel_capacity: 100,
            debug: false,
        }
    }
}

impl TelegramConfig {
    /// Creates a configuration with defaults and the given token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    /// Full URL of a Bot API method.
    pub fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.token,
            method
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// The token must never end up in logs.
impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .field("api_base", &self.api_base)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("allowed_updates", &self.allowed_updates)
            .field("channel_capacity", &self.channel_capacity)
            .field("debug", &self.debug)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial_config() {
        let yaml = r#"
token: "123:abc"
poll_timeout_secs: 30
allowed_updates: [message, callback_query]
"#;

        let config: TelegramConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.token, "123:abc");
        assert_eq!(config.poll_timeout_secs, 30);
        assert_eq!(config.request_timeout_secs, 75);
        assert_eq!(config.allowed_updates, ["message", "callback_query"]);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_method_url_and_redaction() {
        let mut config = TelegramConfig::with_token("123:abc");
        config.api_base = "http://localhost:8081/".into();
        assert_eq!(
            config.method_url("getUpdates"),
            "http://localhost:8081/bot123:abc/getUpdates"
        );
        assert!(!format!("{config:?}").contains("123:abc"));
    }
}
