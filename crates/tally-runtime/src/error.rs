//! Runtime error types.

use tally_core::{GatewayError, TransportError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The transport could not be set up.
    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),

    /// The listener loop ended with a fatal gateway error.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The update poller task panicked or was aborted.
    #[error("Poller task failed: {0}")]
    PollerJoin(String),
}

impl RuntimeError {
    /// Returns `true` if the event stream closed underneath the listener.
    pub fn is_stream_closed(&self) -> bool {
        matches!(self, Self::Gateway(GatewayError::TransportStreamClosed))
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
