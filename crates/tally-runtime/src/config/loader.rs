//! Layered configuration loading with figment.
//!
//! # Sources (lowest to highest priority)
//!
//! 1. Built-in defaults ([`TallyConfig::default`])
//! 2. Configuration merged programmatically with [`ConfigLoader::merge`]
//! 3. Profile file (`tally.{profile}.toml` / `tally.{profile}.yaml`)
//! 4. Main file (`tally.toml` / `tally.yaml` / `tally.yml`)
//! 5. Environment variables (`TALLY_*`, `__` separates sections)
//!
//! ```text
//! TALLY_TELEGRAM__TOKEN=123:abc   → telegram.token
//! TALLY_DISPATCH__POOL_SIZE=8     → dispatch.pool_size
//! TALLY_LOGGING__LEVEL=debug      → logging.level
//! ```
//!
//! # Feature Flags
//!
//! - `toml-config`: search for and accept TOML files
//! - `yaml-config`: search for and accept YAML files
//!
//! The profile comes from `TALLY_PROFILE` unless set explicitly.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::TallyConfig;

const ENV_PREFIX: &str = "TALLY_";
const APP_DIR: &str = "tally";

/// Configuration profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `dev` and `prod` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `TALLY_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("TALLY_PROFILE")
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder over the configuration sources.
///
/// ```rust,ignore
/// let config = ConfigLoader::new()
///     .file("deploy/tally.toml")
///     .profile("production")
///     .load()?;
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search for `tally.*` files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `$XDG_CONFIG_HOME/tally` (or the platform equivalent).
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join(APP_DIR)),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Layers a configuration value above the defaults.
    pub fn merge(mut self, config: TallyConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Merges all sources and extracts the configuration.
    pub fn load(self) -> ConfigResult<TallyConfig> {
        let profile = self.profile.clone();
        let config: TallyConfig = self.build_figment()?.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            pool_size = config.dispatch.pool_size,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let overrides = std::mem::take(&mut self.figment);
        let mut figment = Figment::from(Serialized::defaults(TallyConfig::default())).merge(overrides);

        figment = match self.config_file.take() {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                merge_file(figment, &path)?
            }
            Some(path) => return Err(ConfigError::FileNotFound(path)),
            None => self.search_files(figment),
        };

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment)
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join(APP_DIR)))
            .collect()
    }

    /// Merges the profile file and main file of the first directory that has
    /// a main file, for every enabled format.
    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_mut, unused_variables)
    )]
    fn search_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        for dir in &search_paths {
            if let Some(f) = self.merge_from_dir(&figment, dir, &["toml"], |f, p| {
                f.merge(Toml::file(p))
            }) {
                figment = f;
                found = true;
                break;
            }
        }

        #[cfg(feature = "yaml-config")]
        for dir in &search_paths {
            if let Some(f) = self.merge_from_dir(&figment, dir, &["yaml", "yml"], |f, p| {
                f.merge(Yaml::file(p))
            }) {
                figment = f;
                found = true;
                break;
            }
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }

    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn merge_from_dir(
        &self,
        figment: &Figment,
        dir: &Path,
        extensions: &[&str],
        merge: impl Fn(Figment, &Path) -> Figment,
    ) -> Option<Figment> {
        for ext in extensions {
            let main = dir.join(format!("{APP_DIR}.{ext}"));
            if !main.exists() {
                continue;
            }

            let mut merged = figment.clone();
            let profile_file = dir.join(format!("{APP_DIR}.{}.{ext}", self.profile));
            if profile_file.exists() {
                debug!(path = %profile_file.display(), "Loading profile configuration");
                merged = merge(merged, &profile_file);
            }
            info!(path = %main.display(), "Loading configuration file");
            return Some(merge(merged, &main));
        }
        None
    }
}

/// Merges one file, choosing the format from its extension.
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Loads from the current directory, the user config directory and the
/// environment.
pub fn load_config() -> ConfigResult<TallyConfig> {
    ConfigLoader::new()
        .with_current_dir()
        .with_user_config_dir()
        .load()
}

/// Loads one file plus the environment.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<TallyConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::new()
            .search_path("/nonexistent")
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.dispatch.pool_size, 4);
        assert_eq!(config.bot.default_language, "en");
        assert!(config.telegram.token.is_empty());
    }

    #[test]
    fn test_programmatic_merge() {
        let mut overrides = TallyConfig::default();
        overrides.dispatch.pool_size = 2;
        overrides.bot.name = "tally_bot".into();

        let config = ConfigLoader::new()
            .search_path("/nonexistent")
            .without_env()
            .merge(overrides)
            .load()
            .unwrap();
        assert_eq!(config.dispatch.pool_size, 2);
        assert_eq!(config.bot.name, "tally_bot");
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new().file("/nonexistent/tally.toml").load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_environment_overrides() {
        // SAFETY: these variables are only read by this test
        unsafe {
            std::env::set_var("TALLY_LOGGING__LEVEL", "loud");
        }
        let result = ConfigLoader::new().search_path("/nonexistent").load();
        assert!(matches!(result, Err(ConfigError::ParseError(_))));

        unsafe {
            std::env::remove_var("TALLY_LOGGING__LEVEL");
            std::env::set_var("TALLY_DISPATCH__POOL_SIZE", "7");
            std::env::set_var("TALLY_TELEGRAM__TOKEN", "123:abc");
        }
        let config = ConfigLoader::new().search_path("/nonexistent").load().unwrap();
        unsafe {
            std::env::remove_var("TALLY_DISPATCH__POOL_SIZE");
            std::env::remove_var("TALLY_TELEGRAM__TOKEN");
        }

        assert_eq!(config.dispatch.pool_size, 7);
        assert_eq!(config.telegram.token, "123:abc");
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("Dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}
