//! # Tally Runtime
//!
//! Puts the gateway together and keeps it running.
//!
//! - [`Listener`]: the receive → enrich → dispatch → deliver loop
//! - [`TallyRuntime`]: configuration, logging, collaborators and signal
//!   handling around a listener on the Telegram transport
//! - [`config`]: figment-based layered configuration
//! - [`logging`]: `tracing-subscriber` setup
//!
//! ```ignore
//! use tally_runtime::TallyRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     TallyRuntime::builder()
//!         .handler(start_screen())
//!         .build()?
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! To drive the loop from another transport, hand any
//! [`EventStream`](tally_core::EventStream) and
//! [`Outbound`](tally_core::Outbound) to [`TallyRuntime::run_with_transport`].

pub mod config;
pub mod error;
pub mod listener;
pub mod logging;
pub mod runtime;

pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, DispatchConfig, LoggingConfig, TallyConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use listener::{CycleStats, Listener, StopReason};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{RuntimeBuilder, TallyRuntime, wait_for_shutdown};

// Re-export tracing for handler crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
