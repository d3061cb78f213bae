//! Configuration validation.
//!
//! Log levels and formats are enums, so a misspelt value already fails at
//! extraction. What remains here are range and consistency checks.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, TallyConfig};
use tally_telegram::TelegramConfig;

/// Validates everything except the Telegram token.
///
/// The token is only required when the Telegram transport is started; see
/// [`validate_telegram`].
pub fn validate_config(config: &TallyConfig) -> ConfigResult<()> {
    if config.dispatch.pool_size == 0 {
        return Err(ConfigError::validation(
            "dispatch.pool_size must be greater than 0",
        ));
    }
    validate_logging(&config.logging)?;
    validate_telegram_settings(&config.telegram)?;
    Ok(())
}

/// Validates the Telegram section for actually connecting.
pub fn validate_telegram(config: &TelegramConfig) -> ConfigResult<()> {
    if config.token.trim().is_empty() {
        return Err(ConfigError::missing_field("telegram.token"));
    }
    validate_telegram_settings(config)
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    if let Some(target) = logging.filters.keys().find(|t| t.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "logging.filters contains an empty target: {target:?}"
        )));
    }
    Ok(())
}

fn validate_telegram_settings(telegram: &TelegramConfig) -> ConfigResult<()> {
    if !["http://", "https://"]
        .iter()
        .any(|scheme| telegram.api_base.starts_with(scheme))
    {
        return Err(ConfigError::validation(format!(
            "telegram.api_base must be an http(s) URL: {}",
            telegram.api_base
        )));
    }
    if telegram.poll_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "telegram.poll_timeout_secs must be greater than 0",
        ));
    }
    if telegram.request_timeout_secs <= telegram.poll_timeout_secs {
        return Err(ConfigError::validation(
            "telegram.request_timeout_secs must exceed poll_timeout_secs",
        ));
    }
    if telegram.channel_capacity == 0 {
        return Err(ConfigError::validation(
            "telegram.channel_capacity must be greater than 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&TallyConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_pool_size() {
        let mut config = TallyConfig::default();
        config.dispatch.pool_size = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_timeouts() {
        let mut config = TallyConfig::default();
        config.telegram.poll_timeout_secs = 0;
        assert!(validate_config(&config).is_err());

        config.telegram.poll_timeout_secs = 60;
        config.telegram.request_timeout_secs = 60;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = TallyConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { ref field }) if field == "logging.file_path"
        ));
    }

    #[test]
    fn test_token_required_for_telegram() {
        let config = TallyConfig::default();
        assert!(matches!(
            validate_telegram(&config.telegram),
            Err(ConfigError::MissingField { ref field }) if field == "telegram.token"
        ));
        assert!(validate_telegram(&TelegramConfig::with_token("1:x")).is_ok());
    }
}
