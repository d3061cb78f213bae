//! # Tally
//!
//! A chat-bot event gateway. Tally receives events from a messaging platform,
//! resolves who sent them and where they are in a conversation, runs every
//! interested handler concurrently, and delivers the merged replies.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  RawEvent  ┌──────────┐  EnrichedEvent  ┌────────────────────┐
//! │ Telegram │───────────▶│ Enricher │────────────────▶│ FanOutDispatcher   │
//! │  poller  │            └──────────┘                 │  handler A ─┐      │
//! └──────────┘                                         │  handler B ─┼ merge│
//!      ▲                                               │  handler C ─┘      │
//!      │            ┌──────────┐   ResponseEnvelope    └─────────┬──────────┘
//!      └────────────│ Listener │◀────────────────────────────────┘
//!    TelegramApi ◀──│          │── redirect (one hop) ─▶ dispatch again
//!                   └──────────┘
//! ```
//!
//! - **Enricher**: user upsert, button lookup, session lookup
//! - **FanOutDispatcher**: at most `pool_size` handlers at once; envelopes
//!   merged in completion order
//! - **Listener**: one event at a time, delivery in a fixed order, redirects
//!   followed once
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tally::prelude::*;
//!
//! const START: Action = Action::new("start");
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let start = on_command("start", "my_bot").handle(|event| async move {
//!         let mut envelope = ResponseEnvelope::new();
//!         envelope.push_opt(create_screen(&event, "Hello!", InlineKeyboard::default()));
//!         Ok(envelope)
//!     });
//!
//!     TallyRuntime::builder().handler(start).build()?.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: `tally.toml` configuration files
//! - `yaml-config`: `tally.yaml` configuration files
//! - `json-log`: JSON log output

pub use tally_core as core;
pub use tally_framework as framework;
pub use tally_runtime as runtime;
pub use tally_telegram as telegram;

/// Everything a bot binary usually needs.
pub mod prelude {
    pub use tally_runtime::{TallyConfig, TallyRuntime};

    pub use tally_core::{
        Action, ButtonRef, ButtonStore, CallbackAnswer, EnrichedEvent, GatewayError, Handler,
        HandlerError, HandlerResult, InlineAnswer, InlineButton, InlineKeyboard, InlineResult,
        OutboundAction, ResponseEnvelope, SessionState, SessionStore, User, UserService,
        async_trait,
    };

    pub use tally_framework::screen::{
        create_callback, create_screen, escape_markdown, inline_article, optimize_keyboard,
        short_name, split_keyboard, user_link,
    };
    pub use tally_framework::{
        HandlerBuilder, MemoryButtonStore, MemorySessionStore, MemoryUserService, on_action,
        on_command, on_inline_query, on_text,
    };

    pub use tally_runtime::prelude::*;
}
