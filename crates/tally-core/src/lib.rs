//! # Tally Core
//!
//! Types and contracts shared by every part of the Tally chat-bot gateway.
//!
//! Nothing in this crate talks to a network or a database. It defines what
//! flows through a dispatch cycle and the traits through which the gateway
//! reaches its collaborators.
//!
//! ## One Dispatch Cycle
//!
//! ```text
//! ┌───────────┐  RawEvent  ┌────────────┐ EnrichedEvent ┌────────────┐
//! │EventStream│───────────▶│ Enrichment │──────────────▶│ Dispatcher │
//! └───────────┘            └────────────┘               └─────┬──────┘
//!       ▲                        ▲                            │ ResponseEnvelope
//!       │                  UserService                        ▼
//!       │                  SessionStore                 ┌────────────┐
//!       │                  ButtonStore                  │  Listener  │──▶ Outbound
//!       │                                               └─────┬──────┘
//!       └──────────────────── redirect (one hop) ─────────────┘
//! ```
//!
//! ## Contents
//!
//! - **Events**: [`RawEvent`], [`EnrichedEvent`] and the records enrichment
//!   resolves ([`User`], [`SessionState`], [`ButtonRef`])
//! - **Responses**: [`ResponseEnvelope`] and [`OutboundAction`]
//! - **Contracts**: [`Handler`], [`EventStream`], [`Outbound`],
//!   [`UserService`], [`SessionStore`], [`ButtonStore`], [`ErrorReporter`]
//! - **Errors**: [`GatewayError`] and the collaborator error types

pub mod enriched;
pub mod error;
pub mod event;
pub mod handler;
pub mod model;
pub mod report;
pub mod response;
pub mod store;
pub mod transport;

pub use enriched::EnrichedEvent;
pub use error::{
    GatewayError, GatewayResult, HandlerError, HandlerResult, Lookup, StoreError, StoreResult,
    TransportError, TransportResult,
};
pub use event::{
    Attachment, CallbackQuery, Chat, ChatKind, Entity, Identity, InlineQuery, Message, RawEvent,
    RawEventKind,
};
pub use handler::{BoxedHandler, Handler};
pub use model::{Action, ButtonRef, SessionState, User};
pub use report::{ErrorReporter, SharedReporter, TracingReporter};
pub use response::{
    CallbackAnswer, InlineAnswer, InlineButton, InlineKeyboard, InlineResult, OutboundAction,
    ResponseEnvelope,
};
pub use store::{
    ButtonStore, SessionStore, SharedButtonStore, SharedSessionStore, SharedUserService,
    UserService,
};
pub use transport::{BoxedOutbound, DeliveryReceipt, EventStream, Outbound, Outgoing};

// Re-export async_trait for implementors of the contracts
pub use async_trait::async_trait;
