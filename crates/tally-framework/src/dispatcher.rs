//! Fan-out dispatcher.
//!
//! The [`FanOutDispatcher`] runs every interested handler of a registry
//! against one event and merges their responses.
//!
//! # Dispatch
//!
//! 1. `is_reactive` is evaluated for every handler, in registration order
//! 2. Each reactive handler is spawned as its own task; at most `pool_size`
//!    of them run `handle` at the same time, the rest wait for a permit
//! 3. The call returns once every task has finished
//! 4. Successful envelopes are merged in completion order
//!
//! ```text
//!                  ┌──────────┐
//!             ┌───▶│ handler  │──┐
//! ┌───────┐   │    └──────────┘  │    ┌────────────────┐
//! │ event │───┼───▶│ handler  │──┼───▶│ merge (seq, ix)│──▶ DispatchOutcome
//! └───────┘   │    └──────────┘  │    └────────────────┘
//!             └───▶│ handler  │──┘
//!                  └──────────┘
//!             at most pool_size in flight
//! ```
//!
//! A failing or panicking handler never cancels its siblings. Its error is
//! kept in [`DispatchOutcome::errors`] next to the envelope merged from the
//! handlers that succeeded.

use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::join_all;
use tally_core::{
    BoxedHandler, EnrichedEvent, GatewayError, HandlerError, HandlerResult, ResponseEnvelope,
};
use tokio::sync::Semaphore;
use tower::Service;
use tracing::{Instrument, Level, debug, span, trace};

use crate::registry::HandlerRegistry;

/// Default number of handlers allowed to run at once.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Result of one dispatch call.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Envelope merged from every handler that succeeded.
    pub envelope: ResponseEnvelope,
    /// Failures, in completion order.
    pub errors: Vec<GatewayError>,
    /// Number of handlers whose `handle` was invoked.
    pub invoked: usize,
}

impl DispatchOutcome {
    /// The last failure observed, if any handler failed.
    pub fn last_error(&self) -> Option<&GatewayError> {
        self.errors.last()
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs reactive handlers concurrently under a fixed concurrency limit.
#[derive(Clone)]
pub struct FanOutDispatcher {
    registry: HandlerRegistry,
    pool_size: usize,
}

impl FanOutDispatcher {
    /// Creates a dispatcher over `registry`.
    ///
    /// A `pool_size` of zero is treated as one.
    pub fn new(registry: HandlerRegistry, pool_size: usize) -> Self {
        Self {
            registry,
            pool_size: pool_size.max(1),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns `true` if any handler is interested in `event`.
    pub fn has_reactive(&self, event: &EnrichedEvent) -> bool {
        self.registry.iter().any(|h| h.is_reactive(event))
    }

    /// Dispatches one event to every reactive handler.
    pub async fn dispatch(&self, event: Arc<EnrichedEvent>) -> DispatchOutcome {
        let reactive: Vec<(usize, BoxedHandler)> = self
            .registry
            .iter()
            .enumerate()
            .filter(|(_, handler)| handler.is_reactive(&event))
            .map(|(index, handler)| (index, Arc::clone(handler)))
            .collect();

        if reactive.is_empty() {
            trace!(update_id = event.update_id(), "No reactive handlers");
            return DispatchOutcome::default();
        }

        debug!(
            update_id = event.update_id(),
            reactive = reactive.len(),
            pool_size = self.pool_size,
            "Dispatching to reactive handlers"
        );

        let permits = Arc::new(Semaphore::new(self.pool_size));
        let sequence = Arc::new(AtomicUsize::new(0));

        let tasks = reactive.iter().map(|(_, handler)| {
            let handler = Arc::clone(handler);
            let event = Arc::clone(&event);
            let permits = Arc::clone(&permits);
            let sequence = Arc::clone(&sequence);
            let span = span!(Level::DEBUG, "handler", name = handler.name());

            tokio::spawn(
                async move {
                    let result = match permits.acquire_owned().await {
                        Ok(_permit) => run_guarded(handler, event).await,
                        Err(_) => Err(HandlerError::rejected("handler pool closed")),
                    };
                    (sequence.fetch_add(1, Ordering::SeqCst), result)
                }
                .instrument(span),
            )
        });

        // Index-aligned with `reactive`
        let joined = join_all(tasks).await;

        let mut completed = Vec::with_capacity(joined.len());
        let mut failed = Vec::new();
        for ((index, handler), joined) in reactive.iter().zip(joined) {
            let (seq, result) = match joined {
                Ok(done) => done,
                Err(join_err) => (usize::MAX, Err(HandlerError::Panicked(join_err.to_string()))),
            };
            match result {
                Ok(envelope) => completed.push((seq, *index, envelope)),
                Err(source) => {
                    debug!(handler = handler.name(), error = %source, "Handler failed");
                    failed.push((
                        seq,
                        *index,
                        GatewayError::HandlerExecutionFailed {
                            handler: handler.name().to_string(),
                            source,
                        },
                    ));
                }
            }
        }

        completed.sort_by_key(|(seq, index, _)| (*seq, *index));
        failed.sort_by_key(|(seq, index, _)| (*seq, *index));

        let mut envelope = ResponseEnvelope::new();
        for (_, _, partial) in completed {
            envelope.merge(partial);
        }

        DispatchOutcome {
            envelope,
            errors: failed.into_iter().map(|(_, _, err)| err).collect(),
            invoked: reactive.len(),
        }
    }
}

/// Runs a handler, turning a panic into an error.
async fn run_guarded(
    handler: BoxedHandler,
    event: Arc<EnrichedEvent>,
) -> HandlerResult<ResponseEnvelope> {
    match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(HandlerError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl fmt::Debug for FanOutDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOutDispatcher")
            .field("handlers", &self.registry.len())
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

// ============================================================================
// Tower Service Implementation
// ============================================================================

/// Lets middleware (timeouts, rate limits, ...) wrap the whole fan-out.
impl Service<Arc<EnrichedEvent>> for FanOutDispatcher {
    type Response = DispatchOutcome;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: Arc<EnrichedEvent>) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { Ok(dispatcher.dispatch(event).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use tally_core::{
        CallbackAnswer, Chat, Handler, Identity, Message, OutboundAction, RawEvent, User,
    };
    use tokio::time::Instant;
    use tower::ServiceExt;

    use crate::handler::HandlerBuilder;

    fn start_event() -> Arc<EnrichedEvent> {
        let from = Identity::new(1, "Ann");
        Arc::new(EnrichedEvent::new(
            RawEvent::message(1, Message::text(1, Chat::private(1), from.clone(), "/start")),
            User::from_identity(&from),
        ))
    }

    /// Replies with `text` after `delay`.
    struct Delayed {
        name: &'static str,
        delay: Duration,
        text: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl Delayed {
        fn new(name: &'static str, delay_ms: u64, calls: &Arc<AtomicUsize>) -> Self {
            Self {
                name,
                delay: Duration::from_millis(delay_ms),
                text: name,
                calls: Arc::clone(calls),
            }
        }
    }

    #[async_trait]
    impl Handler for Delayed {
        fn name(&self) -> &str {
            self.name
        }

        fn is_reactive(&self, _event: &EnrichedEvent) -> bool {
            true
        }

        async fn handle(&self, _event: Arc<EnrichedEvent>) -> HandlerResult<ResponseEnvelope> {
            tokio::time::sleep(self.delay).await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ResponseEnvelope::new().action(OutboundAction::message(1, self.text)))
        }
    }

    fn texts(envelope: &ResponseEnvelope) -> Vec<&str> {
        envelope
            .actions
            .iter()
            .filter_map(|a| match a {
                OutboundAction::SendMessage { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_zero_reactive_handlers() {
        let registry = HandlerRegistry::builder()
            .register(
                HandlerBuilder::new("never")
                    .check(|_| false)
                    .handle(|_| async { Ok(ResponseEnvelope::new().send(true)) }),
            )
            .build();
        let dispatcher = FanOutDispatcher::new(registry, 4);

        let outcome = dispatcher.dispatch(start_event()).await;
        assert!(outcome.is_ok());
        assert_eq!(outcome.invoked, 0);
        assert!(!outcome.envelope.should_send);
        assert!(outcome.envelope.is_empty());
        assert!(!dispatcher.has_reactive(&start_event()));
    }

    #[tokio::test]
    async fn test_single_handler_output_is_passed_through() {
        let registry = HandlerRegistry::builder()
            .register(HandlerBuilder::new("start").handle(|_| async {
                Ok(ResponseEnvelope::new()
                    .action(OutboundAction::message(1, "hello"))
                    .action(OutboundAction::message(1, "menu"))
                    .callback(CallbackAnswer::new("cb")))
            }))
            .build();
        let dispatcher = FanOutDispatcher::new(registry, 4);

        let outcome = dispatcher.dispatch(start_event()).await;
        assert!(outcome.is_ok());
        assert_eq!(outcome.invoked, 1);
        assert!(outcome.envelope.should_send);
        assert_eq!(texts(&outcome.envelope), ["hello", "menu"]);
        assert_eq!(outcome.envelope.callback, Some(CallbackAnswer::new("cb")));
    }

    #[tokio::test]
    async fn test_every_reactive_handler_completes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::builder()
            .register(Delayed::new("a", 30, &calls))
            .register(Delayed::new("b", 0, &calls))
            .register(Delayed::new("c", 10, &calls))
            .register(
                HandlerBuilder::new("idle")
                    .check(|_| false)
                    .handle(|_| async { Ok(ResponseEnvelope::new()) }),
            )
            .build();
        let dispatcher = FanOutDispatcher::new(registry, 2);

        let outcome = dispatcher.dispatch(start_event()).await;
        assert_eq!(outcome.invoked, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.envelope.actions.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_permit_serializes_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::builder()
            .register(Delayed::new("a", 100, &calls))
            .register(Delayed::new("b", 100, &calls))
            .register(Delayed::new("c", 100, &calls))
            .build();
        let dispatcher = FanOutDispatcher::new(registry, 1);

        let started = Instant::now();
        let outcome = dispatcher.dispatch(start_event()).await;
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(outcome.invoked, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enough_permits_run_concurrently() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::builder()
            .register(Delayed::new("a", 100, &calls))
            .register(Delayed::new("b", 100, &calls))
            .register(Delayed::new("c", 100, &calls))
            .build();
        let dispatcher = FanOutDispatcher::new(registry, 3);

        let started = Instant::now();
        dispatcher.dispatch(start_event()).await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(200));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_actions_follow_completion_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::builder()
            .register(Delayed::new("slow", 50, &calls))
            .register(Delayed::new("fast", 10, &calls))
            .build();
        let dispatcher = FanOutDispatcher::new(registry, 2);

        let outcome = dispatcher.dispatch(start_event()).await;
        assert_eq!(texts(&outcome.envelope), ["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successful_output() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::builder()
            .register(Delayed::new("ok", 0, &calls))
            .register(
                HandlerBuilder::new("broken")
                    .handle(|_| async { Err(anyhow::anyhow!("database is down").into()) }),
            )
            .build();
        let dispatcher = FanOutDispatcher::new(registry, 4);

        let outcome = dispatcher.dispatch(start_event()).await;
        assert_eq!(outcome.invoked, 2);
        assert_eq!(texts(&outcome.envelope), ["ok"]);
        assert!(outcome.envelope.should_send);
        assert!(matches!(
            outcome.last_error(),
            Some(GatewayError::HandlerExecutionFailed { handler, .. }) if handler == "broken"
        ));
    }

    #[tokio::test]
    async fn test_all_fail_and_panics_are_contained() {
        let registry = HandlerRegistry::builder()
            .register(
                HandlerBuilder::new("rejects")
                    .handle(|_| async { Err(HandlerError::rejected("not today")) }),
            )
            .register(HandlerBuilder::new("panics").handle(|_| async {
                if true {
                    panic!("boom");
                }
                Ok(ResponseEnvelope::new())
            }))
            .build();
        let dispatcher = FanOutDispatcher::new(registry, 4);

        let outcome = dispatcher.dispatch(start_event()).await;
        assert_eq!(outcome.invoked, 2);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.envelope.actions.is_empty());
        assert!(!outcome.envelope.should_send);
        assert!(outcome.errors.iter().any(|e| matches!(
            e,
            GatewayError::HandlerExecutionFailed {
                source: HandlerError::Panicked(msg),
                ..
            } if msg == "boom"
        )));
    }

    #[tokio::test]
    async fn test_service_oneshot() {
        let registry = HandlerRegistry::builder()
            .register(HandlerBuilder::new("echo").handle(|event| async move {
                let text = event.text().unwrap_or_default().to_string();
                Ok(ResponseEnvelope::new().action(OutboundAction::message(1, text)))
            }))
            .build();
        let dispatcher = FanOutDispatcher::new(registry, 1);

        let outcome = dispatcher.oneshot(start_event()).await.unwrap();
        assert_eq!(texts(&outcome.envelope), ["/start"]);
    }

    #[tokio::test]
    async fn test_actions_without_send_flag_are_sent() {
        let registry = HandlerRegistry::builder()
            .register(HandlerBuilder::new("draft").handle(|_| async {
                Ok(ResponseEnvelope {
                    actions: vec![OutboundAction::message(1, "x")],
                    ..ResponseEnvelope::new()
                })
            }))
            .register(HandlerBuilder::new("empty").handle(|_| async { Ok(ResponseEnvelope::new()) }))
            .build();
        let dispatcher = FanOutDispatcher::new(registry, 4);

        let outcome = dispatcher.dispatch(start_event()).await;
        assert_eq!(texts(&outcome.envelope), ["x"]);
        assert!(outcome.envelope.should_send);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_completion_wins_single_values() {
        let acknowledge = |id: &'static str, delay_ms: u64| {
            HandlerBuilder::new(id).handle(move |_| async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(ResponseEnvelope::new().callback(CallbackAnswer::new(id)))
            })
        };
        let registry = HandlerRegistry::builder()
            .register(acknowledge("slow", 20))
            .register(acknowledge("fast", 5))
            .build();
        let dispatcher = FanOutDispatcher::new(registry, 4);

        let outcome = dispatcher.dispatch(start_event()).await;
        assert_eq!(outcome.envelope.callback, Some(CallbackAnswer::new("slow")));

        let registry = HandlerRegistry::builder()
            .register(acknowledge("fast", 5))
            .register(acknowledge("slow", 20))
            .build();
        let outcome = FanOutDispatcher::new(registry, 4)
            .dispatch(start_event())
            .await;
        assert_eq!(outcome.envelope.callback, Some(CallbackAnswer::new("slow")));
    }
}
