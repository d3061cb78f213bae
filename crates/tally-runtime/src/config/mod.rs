//! Runtime configuration: schema, layered loading and validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, DispatchConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig,
    TallyConfig,
};
pub use validation::{validate_config, validate_telegram};
