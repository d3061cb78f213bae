//! Runtime assembly.
//!
//! [`TallyRuntime`] loads the configuration, sets up logging, wires the
//! collaborators into a [`Listener`] and runs it against the Telegram
//! transport until Ctrl+C or SIGTERM.
//!
//! ```rust,ignore
//! use tally_runtime::TallyRuntime;
//!
//! let runtime = TallyRuntime::builder()
//!     .config_file("tally.toml")
//!     .handler(start_screen)
//!     .handler(menu_button)
//!     .build()?;
//! runtime.run().await?;
//! ```
//!
//! Stores default to the in-memory ones from `tally-framework`; errors are
//! reported through [`TracingReporter`] unless another reporter is set.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tally_core::{
    BoxedOutbound, EventStream, Handler, SharedButtonStore, SharedReporter, SharedSessionStore,
    SharedUserService, TracingReporter,
};
use tally_framework::{
    Enricher, FanOutDispatcher, HandlerRegistry, HandlerRegistryBuilder, MemoryButtonStore,
    MemorySessionStore, MemoryUserService,
};
use tally_telegram::{TelegramApi, poller};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ConfigLoader, TallyConfig, validate_config, validate_telegram};
use crate::error::{RuntimeError, RuntimeResult};
use crate::listener::{Listener, StopReason};
use crate::logging;

/// A configured gateway, ready to run.
pub struct TallyRuntime {
    config: TallyConfig,
    registry: HandlerRegistry,
    users: SharedUserService,
    sessions: SharedSessionStore,
    buttons: SharedButtonStore,
    reporter: SharedReporter,
}

impl TallyRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &TallyConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn users(&self) -> &SharedUserService {
        &self.users
    }

    /// Builds a listener that delivers through `outbound`.
    pub fn listener(&self, outbound: BoxedOutbound) -> Listener {
        let enricher = Enricher::new(
            Arc::clone(&self.users),
            Arc::clone(&self.sessions),
            Arc::clone(&self.buttons),
        );
        let dispatcher = FanOutDispatcher::new(self.registry.clone(), self.config.dispatch.pool_size);
        Listener::new(enricher, dispatcher, outbound, Arc::clone(&self.reporter))
    }

    /// Runs against the Telegram Bot API until a shutdown signal arrives.
    pub async fn run(&self) -> RuntimeResult<()> {
        validate_telegram(&self.config.telegram)?;
        let api = TelegramApi::new(self.config.telegram.clone())?;

        let me = api.get_me().await?;
        let username = me.username.unwrap_or_default();
        info!(bot = %username, "Connected to Telegram");
        if !self.config.bot.name.is_empty() && !self.config.bot.name.eq_ignore_ascii_case(&username)
        {
            warn!(
                configured = %self.config.bot.name,
                actual = %username,
                "bot.name does not match the bot account; group commands will not match"
            );
        }

        let shutdown = CancellationToken::new();
        let (stream, poller) = poller::spawn(api.clone(), shutdown.child_token());

        let signals = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                wait_for_shutdown().await;
                shutdown.cancel();
            })
        };

        info!("Tally is running. Press Ctrl+C to stop.");
        let result = self
            .run_with_transport(stream, Arc::new(api), shutdown.clone())
            .await;

        shutdown.cancel();
        signals.abort();
        if let Err(e) = poller.await {
            error!(error = %e, "Poller task failed");
            if result.is_ok() {
                return Err(RuntimeError::PollerJoin(e.to_string()));
            }
        }

        result?;
        info!("Tally stopped");
        Ok(())
    }

    /// Runs the listener on any transport until it stops.
    pub async fn run_with_transport<S>(
        &self,
        stream: S,
        outbound: BoxedOutbound,
        cancel: CancellationToken,
    ) -> RuntimeResult<StopReason>
    where
        S: EventStream,
    {
        self.listener(outbound).run(stream, cancel).await
    }
}

impl fmt::Debug for TallyRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TallyRuntime")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler");

        tokio::select! {
            _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down");
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Collects configuration sources, handlers and collaborators.
pub struct RuntimeBuilder {
    loader: ConfigLoader,
    config: Option<TallyConfig>,
    handlers: HandlerRegistryBuilder,
    users: Option<SharedUserService>,
    sessions: Option<SharedSessionStore>,
    buttons: Option<SharedButtonStore>,
    reporter: Option<SharedReporter>,
    init_logging: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new().with_current_dir(),
            config: None,
            handlers: HandlerRegistry::builder(),
            users: None,
            sessions: None,
            buttons: None,
            reporter: None,
            init_logging: true,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Uses `config` as is instead of loading one.
    pub fn config(mut self, config: TallyConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Leaves the global subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Appends a handler; registration order breaks merge ties.
    pub fn handler<H>(mut self, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.handlers = self.handlers.register(handler);
        self
    }

    pub fn user_service(mut self, users: SharedUserService) -> Self {
        self.users = Some(users);
        self
    }

    pub fn session_store(mut self, sessions: SharedSessionStore) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn button_store(mut self, buttons: SharedButtonStore) -> Self {
        self.buttons = Some(buttons);
        self
    }

    pub fn reporter(mut self, reporter: SharedReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Loads and validates the configuration and freezes the registry.
    pub fn build(self) -> RuntimeResult<TallyRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let registry = self.handlers.build();
        if registry.is_empty() {
            warn!("No handlers registered; every event will be ignored");
        }
        info!(
            handlers = ?registry.names(),
            pool_size = config.dispatch.pool_size,
            "Runtime built"
        );

        let users = self.users.unwrap_or_else(|| {
            Arc::new(MemoryUserService::with_default_language(
                config.bot.default_language.clone(),
            ))
        });

        Ok(TallyRuntime {
            config,
            registry,
            users,
            sessions: self
                .sessions
                .unwrap_or_else(|| Arc::new(MemorySessionStore::new())),
            buttons: self
                .buttons
                .unwrap_or_else(|| Arc::new(MemoryButtonStore::new())),
            reporter: self.reporter.unwrap_or_else(|| Arc::new(TracingReporter)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use tally_core::ResponseEnvelope;
    use tally_framework::on_text;

    #[test]
    fn test_build_with_defaults() {
        let runtime = TallyRuntime::builder()
            .search_path("/nonexistent")
            .without_env()
            .without_logging()
            .handler(on_text().handle(|_| async { Ok(ResponseEnvelope::new()) }))
            .build()
            .unwrap();

        assert_eq!(runtime.registry().names(), ["text"]);
        assert_eq!(runtime.config().dispatch.pool_size, 4);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = TallyConfig::default();
        config.dispatch.pool_size = 0;

        let result = TallyRuntime::builder()
            .config(config)
            .without_logging()
            .build();
        assert!(matches!(
            result,
            Err(RuntimeError::Config(ConfigError::ValidationError { .. }))
        ));
    }

    #[tokio::test]
    async fn test_default_users_get_configured_language() {
        let mut config = TallyConfig::default();
        config.bot.default_language = "uk".into();
        let runtime = TallyRuntime::builder()
            .config(config)
            .without_logging()
            .build()
            .unwrap();

        let user = runtime
            .users()
            .upsert(&tally_core::Identity::new(5, "Ann"))
            .await
            .unwrap();
        assert_eq!(user.language.as_deref(), Some("uk"));
    }

    #[tokio::test]
    async fn test_run_requires_token() {
        let runtime = TallyRuntime::builder()
            .config(TallyConfig::default())
            .without_logging()
            .build()
            .unwrap();

        assert!(matches!(
            runtime.run().await,
            Err(RuntimeError::Config(ConfigError::MissingField { .. }))
        ));
    }
}
