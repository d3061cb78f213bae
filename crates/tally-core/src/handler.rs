//! The handler capability contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::enriched::EnrichedEvent;
use crate::error::HandlerResult;
use crate::response::ResponseEnvelope;

/// A unit of business logic that may react to an event.
///
/// The dispatcher calls [`is_reactive`](Handler::is_reactive) for every
/// registered handler, then runs [`handle`](Handler::handle) concurrently for
/// those that answered `true`. All handlers of a cycle share the same
/// read-only event.
///
/// # Example
///
/// ```rust,ignore
/// struct Ping;
///
/// #[async_trait]
/// impl Handler for Ping {
///     fn name(&self) -> &str {
///         "ping"
///     }
///
///     fn is_reactive(&self, event: &EnrichedEvent) -> bool {
///         event.text() == Some("/ping")
///     }
///
///     async fn handle(&self, event: Arc<EnrichedEvent>) -> HandlerResult<ResponseEnvelope> {
///         let chat_id = event.chat_id().unwrap_or_default();
///         Ok(ResponseEnvelope::new().action(OutboundAction::message(chat_id, "pong")))
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Decides whether this handler wants the event.
    ///
    /// Must be pure and cheap: no I/O, no blocking.
    fn is_reactive(&self, event: &EnrichedEvent) -> bool;

    /// Produces a response. Called only if `is_reactive` returned `true` for
    /// this event in the current cycle.
    async fn handle(&self, event: Arc<EnrichedEvent>) -> HandlerResult<ResponseEnvelope>;
}

/// A shared handler trait object.
pub type BoxedHandler = Arc<dyn Handler>;
