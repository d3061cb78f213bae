//! Configuration schema.
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "compact"
//! filters = { tally_telegram = "debug" }
//!
//! [dispatch]
//! pool_size = 4
//!
//! [telegram]
//! token = "123:abc"
//!
//! [bot]
//! name = "tally_bot"
//! default_language = "en"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tally_framework::DEFAULT_POOL_SIZE;
use tally_telegram::TelegramConfig;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub logging: LoggingConfig,
    pub dispatch: DispatchConfig,
    pub telegram: TelegramConfig,
    pub bot: BotConfig,
}

// =============================================================================
// Dispatch
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on handlers running at once for one event.
    pub pool_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

// =============================================================================
// Bot
// =============================================================================

/// Settings handlers read at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Username of the bot, without `@`; used to match `/command@name`.
    pub name: String,
    /// Language assumed for users whose client reports none.
    pub default_language: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            default_language: "en".to_string(),
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Appends to `file_path`.
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub file_path: Option<PathBuf>,
    pub span_events: SpanEventConfig,
    pub thread_ids: bool,
    /// Include source file and line.
    pub file_location: bool,
    /// Per-target levels, e.g. `tally_telegram = "debug"`.
    pub filters: HashMap<String, LogLevel>,
}
