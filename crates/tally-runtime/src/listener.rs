//! The listener loop.
//!
//! The listener owns the inbound event stream and processes events strictly
//! one at a time, in arrival order:
//!
//! ```text
//!            ┌──────────────────────────────────────────────────┐
//!            ▼                                                  │
//!  Idle ─▶ Receiving ─▶ Enriching ─▶ Dispatching ─▶ Delivering ─┤
//!            │              │             ▲                     │ redirect
//!            │              │ no sender   └── Redirecting ◀─────┘ (one hop)
//!            │              └──────────────▶ Idle
//!            ├── stream closed ─▶ Err(TransportStreamClosed)
//!            └── cancelled     ─▶ Ok(StopReason::Cancelled)
//! ```
//!
//! Every non-fatal failure goes to the [`ErrorReporter`](tally_core::ErrorReporter)
//! and the loop moves on. Only the end of the stream and cancellation stop it.

use std::fmt;
use std::sync::Arc;

use tally_core::{
    BoxedOutbound, EnrichedEvent, EventStream, GatewayError, Outgoing, RawEvent,
    ResponseEnvelope, SharedReporter,
};
use tally_framework::{Enricher, FanOutDispatcher};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, debug, info, span, trace, warn};

use crate::error::RuntimeResult;

/// Why a listener stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation token fired.
    Cancelled,
}

/// What one event cost, for callers driving [`Listener::process`] directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Dispatch passes run: 0 if enrichment failed, 2 if a redirect was followed.
    pub dispatches: usize,
    /// Items the transport accepted.
    pub delivered: usize,
    /// Failures handed to the reporter.
    pub reported: usize,
}

/// Drives enrichment, dispatch and delivery for an event stream.
pub struct Listener {
    enricher: Enricher,
    dispatcher: FanOutDispatcher,
    outbound: BoxedOutbound,
    reporter: SharedReporter,
}

impl Listener {
    pub fn new(
        enricher: Enricher,
        dispatcher: FanOutDispatcher,
        outbound: BoxedOutbound,
        reporter: SharedReporter,
    ) -> Self {
        Self {
            enricher,
            dispatcher,
            outbound,
            reporter,
        }
    }

    pub fn dispatcher(&self) -> &FanOutDispatcher {
        &self.dispatcher
    }

    /// Processes events until the stream closes or `cancel` fires.
    ///
    /// An event already being processed is finished before cancellation is
    /// observed.
    pub async fn run<S>(&self, mut stream: S, cancel: CancellationToken) -> RuntimeResult<StopReason>
    where
        S: EventStream,
    {
        info!(
            handlers = self.dispatcher.registry().len(),
            pool_size = self.dispatcher.pool_size(),
            "Listener started"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Listener cancelled");
                    return Ok(StopReason::Cancelled);
                }
                next = stream.next_event() => next,
            };

            let Some(raw) = next else {
                warn!("Event stream closed, listener stopping");
                return Err(GatewayError::TransportStreamClosed.into());
            };

            self.process(raw).await;
        }
    }

    /// Runs one event through enrichment, dispatch, delivery and at most one
    /// redirect.
    pub async fn process(&self, raw: RawEvent) -> CycleStats {
        let mut stats = CycleStats::default();

        let enrichment = match self.enricher.enrich(raw).await {
            Ok(enrichment) => enrichment,
            Err(err) => {
                self.report(&mut stats, &err);
                return stats;
            }
        };
        for err in &enrichment.errors {
            self.report(&mut stats, err);
        }

        let mut event = Arc::new(enrichment.event);
        loop {
            let span = span!(
                Level::DEBUG,
                "cycle",
                update_id = event.update_id(),
                user_id = event.user().id,
                from_redirect = event.is_from_redirect()
            );
            let redirect = self
                .cycle(Arc::clone(&event), &mut stats)
                .instrument(span)
                .await;

            let Some(next) = redirect else {
                break;
            };
            if event.is_from_redirect() || next.is_from_redirect() {
                self.report(
                    &mut stats,
                    &GatewayError::RedirectLoopDetected {
                        update_id: next.update_id(),
                    },
                );
                break;
            }

            debug!(update_id = next.update_id(), "Following redirect");
            event = Arc::new(next.into_redirected());
        }

        stats
    }

    /// Dispatches and delivers; returns the requested redirect, if any.
    async fn cycle(
        &self,
        event: Arc<EnrichedEvent>,
        stats: &mut CycleStats,
    ) -> Option<EnrichedEvent> {
        stats.dispatches += 1;
        let outcome = self.dispatcher.dispatch(event).await;
        for err in &outcome.errors {
            self.report(stats, err);
        }

        let envelope = outcome.envelope;
        if envelope.should_send {
            self.deliver(&envelope, stats).await;
        } else if !envelope.is_empty() {
            trace!("Envelope not marked for sending, dropped");
        }

        envelope.redirect.map(|event| *event)
    }

    /// Sends the inline answer, then every action, then the callback answer.
    async fn deliver(&self, envelope: &ResponseEnvelope, stats: &mut CycleStats) {
        let items = envelope
            .inline
            .iter()
            .map(Outgoing::Inline)
            .chain(envelope.actions.iter().map(Outgoing::Action))
            .chain(envelope.callback.iter().map(Outgoing::Callback));

        for item in items {
            match self.outbound.send(item).await {
                Ok(receipt) => {
                    stats.delivered += 1;
                    trace!(item = item.kind_name(), message_id = receipt.message_id, "Sent");
                }
                Err(source) => self.report(
                    stats,
                    &GatewayError::DeliveryFailed {
                        item: item.kind_name(),
                        source,
                    },
                ),
            }
        }
    }

    fn report(&self, stats: &mut CycleStats, err: &GatewayError) {
        stats.reported += 1;
        self.reporter.report(err);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
