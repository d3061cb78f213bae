//! Transport contracts.
//!
//! The gateway sees a messaging platform as two halves: an [`EventStream`]
//! it pulls raw events from, and an [`Outbound`] sink it pushes replies into.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportResult;
use crate::event::RawEvent;
use crate::response::{CallbackAnswer, InlineAnswer, OutboundAction};

/// Inbound half of a transport.
#[async_trait]
pub trait EventStream: Send {
    /// Waits for the next event. `None` means the stream is closed for good.
    async fn next_event(&mut self) -> Option<RawEvent>;
}

#[async_trait]
impl EventStream for mpsc::Receiver<RawEvent> {
    async fn next_event(&mut self) -> Option<RawEvent> {
        self.recv().await
    }
}

/// One item handed to [`Outbound::send`].
#[derive(Debug, Clone, Copy)]
pub enum Outgoing<'a> {
    /// Answer to an inline query.
    Inline(&'a InlineAnswer),
    /// Message-level action.
    Action(&'a OutboundAction),
    /// Button-press acknowledgment.
    Callback(&'a CallbackAnswer),
}

impl Outgoing<'_> {
    /// Short name used in logs and delivery errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Inline(_) => "inline answer",
            Self::Action(action) => action.kind_name(),
            Self::Callback(_) => "callback answer",
        }
    }
}

/// What the platform returned for a delivered item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Id of the created or edited message, when the platform reports one.
    pub message_id: Option<i64>,
}

/// Outbound half of a transport.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Delivers one item.
    async fn send(&self, item: Outgoing<'_>) -> TransportResult<DeliveryReceipt>;
}

/// A shared outbound trait object.
pub type BoxedOutbound = Arc<dyn Outbound>;
