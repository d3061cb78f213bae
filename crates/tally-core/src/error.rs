//! Unified error types for the Tally core.
//!
//! Every failure path of a dispatch cycle maps onto one variant of
//! [`GatewayError`]. Collaborator contracts (storage, transport, handlers) have
//! their own narrower error types that are wrapped as the source.

use std::fmt;

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised by a messaging-platform transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection to the platform failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The endpoint that failed.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// The platform rejected the request.
    #[error("API error ({code}): {description}")]
    Api {
        /// Platform error code (HTTP status for HTTP based APIs).
        code: i64,
        /// Human-readable description returned by the platform.
        description: String,
    },

    /// Request could not be sent.
    #[error("failed to send request: {0}")]
    SendFailed(String),

    /// Payload (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The transport cannot carry this kind of outgoing item.
    #[error("operation not supported by this transport: {0}")]
    Unsupported(&'static str),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Returns `true` if retrying the same request cannot succeed.
    ///
    /// Authentication and routing errors (401, 403, 404) are permanent.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Api { code, .. } if matches!(code, 401 | 403 | 404))
            || matches!(self, Self::Unsupported(_))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by user, session and button stores.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No record with the given key.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Kind of record (`"user"`, `"button"`, ...).
        entity: &'static str,
        /// Lookup key.
        id: String,
    },

    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

// =============================================================================
// Handler Errors
// =============================================================================

/// Errors a [`Handler`](crate::Handler) may return from `handle`.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A collaborator store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The handler refused to process the event.
    #[error("{0}")]
    Rejected(String),

    /// The handler task panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// Any other failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    /// Creates a rejection error.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

// =============================================================================
// Gateway Errors
// =============================================================================

/// Enrichment lookup that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// User upsert.
    User,
    /// Button reference lookup.
    Button,
    /// Session state lookup.
    Session,
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Button => "button",
            Self::Session => "session state",
        })
    }
}

/// Every failure a dispatch cycle can produce.
///
/// | Variant | Effect |
/// |---|---|
/// | `IdentityUndeterminable` | cycle aborted before dispatch |
/// | `EnrichmentLookupFailed` | field left empty, cycle continues |
/// | `HandlerExecutionFailed` | partial envelope still delivered |
/// | `DeliveryFailed` | remaining sends still attempted |
/// | `RedirectLoopDetected` | redirect dropped |
/// | `TransportStreamClosed` | listener stops with an error |
/// | `Cancelled` | listener stops cleanly (never reported, see below) |
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The update carries no sender.
    #[error("cannot determine the acting user of update {update_id} ({kind})")]
    IdentityUndeterminable {
        /// Transport update id.
        update_id: i64,
        /// Kind of the update.
        kind: &'static str,
    },

    /// A collaborator lookup during enrichment failed.
    #[error("{lookup} lookup failed: {source}")]
    EnrichmentLookupFailed {
        /// Which lookup failed.
        lookup: Lookup,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// A handler returned an error or panicked.
    #[error("handler '{handler}' failed: {source}")]
    HandlerExecutionFailed {
        /// Handler name.
        handler: String,
        /// Underlying handler error.
        #[source]
        source: HandlerError,
    },

    /// An outgoing item could not be delivered.
    #[error("failed to deliver {item}: {source}")]
    DeliveryFailed {
        /// Kind of outgoing item.
        item: &'static str,
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },

    /// A redirect was requested while already following one.
    #[error("recursive redirect requested while handling update {update_id}")]
    RedirectLoopDetected {
        /// Update id of the redirected event.
        update_id: i64,
    },

    /// The inbound event stream ended.
    #[error("transport event stream closed")]
    TransportStreamClosed,

    /// The listener was asked to stop.
    ///
    /// Kept so the taxonomy names every way a listener can end. The listener
    /// itself never reports or returns it: a cancelled run ends with
    /// `Ok(StopReason::Cancelled)`.
    #[error("listener cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Returns `true` for the kinds that terminate the listener loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TransportStreamClosed | Self::Cancelled)
    }

    /// Short machine-friendly name of the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IdentityUndeterminable { .. } => "identity_undeterminable",
            Self::EnrichmentLookupFailed { .. } => "enrichment_lookup_failed",
            Self::HandlerExecutionFailed { .. } => "handler_execution_failed",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::RedirectLoopDetected { .. } => "redirect_loop_detected",
            Self::TransportStreamClosed => "transport_stream_closed",
            Self::Cancelled => "cancelled",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for handler invocations.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(GatewayError::TransportStreamClosed.is_fatal());
        assert!(GatewayError::Cancelled.is_fatal());
        assert!(!GatewayError::RedirectLoopDetected { update_id: 1 }.is_fatal());
    }

    #[test]
    fn test_permanent_transport_errors() {
        let unauthorized = TransportError::Api {
            code: 401,
            description: "Unauthorized".into(),
        };
        let flood = TransportError::Api {
            code: 429,
            description: "Too Many Requests".into(),
        };
        assert!(unauthorized.is_permanent());
        assert!(!flood.is_permanent());
        assert!(!TransportError::Io("reset".into()).is_permanent());
    }

    #[test]
    fn test_lookup_message() {
        let err = GatewayError::EnrichmentLookupFailed {
            lookup: Lookup::Session,
            source: StoreError::backend("connection refused"),
        };
        assert_eq!(
            err.to_string(),
            "session state lookup failed: storage backend error: connection refused"
        );
    }
}
