//! Closure-based handlers.
//!
//! Implementing [`Handler`] by hand is fine for handlers with state; for the
//! rest, [`HandlerBuilder`] assembles one from check closures and an async
//! body.
//!
//! ```rust,ignore
//! use tally_framework::on_command;
//!
//! let ping = on_command("ping", "tally_bot").handle(|event| async move {
//!     let chat_id = event.chat_id().unwrap_or_default();
//!     Ok(ResponseEnvelope::new().action(OutboundAction::message(chat_id, "pong")))
//! });
//! ```
//!
//! Checks are AND-combined. A builder without checks reacts to every event.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tally_core::{Action, EnrichedEvent, Handler, HandlerResult, ResponseEnvelope};

/// A type-erased check function.
pub type CheckFn = Arc<dyn Fn(&EnrichedEvent) -> bool + Send + Sync>;

type HandleFn =
    Arc<dyn Fn(Arc<EnrichedEvent>) -> BoxFuture<'static, HandlerResult<ResponseEnvelope>> + Send + Sync>;

/// Assembles a [`FnHandler`].
#[derive(Clone)]
pub struct HandlerBuilder {
    name: String,
    checks: Vec<CheckFn>,
}

impl HandlerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checks: Vec::new(),
        }
    }

    /// Adds a check.
    pub fn check<F>(mut self, f: F) -> Self
    where
        F: Fn(&EnrichedEvent) -> bool + Send + Sync + 'static,
    {
        self.checks.push(Arc::new(f));
        self
    }

    /// Finishes the handler with its body.
    pub fn handle<F, Fut>(self, f: F) -> FnHandler
    where
        F: Fn(Arc<EnrichedEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<ResponseEnvelope>> + Send + 'static,
    {
        FnHandler {
            name: self.name,
            checks: self.checks,
            handle: Arc::new(move |event| f(event).boxed()),
        }
    }
}

/// A handler made of closures.
#[derive(Clone)]
pub struct FnHandler {
    name: String,
    checks: Vec<CheckFn>,
    handle: HandleFn,
}

#[async_trait]
impl Handler for FnHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_reactive(&self, event: &EnrichedEvent) -> bool {
        self.checks.iter().all(|check| check(event))
    }

    async fn handle(&self, event: Arc<EnrichedEvent>) -> HandlerResult<ResponseEnvelope> {
        (self.handle)(event).await
    }
}

impl fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler")
            .field("name", &self.name)
            .field("checks", &self.checks.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder Shortcuts
// ============================================================================

/// Reacts to `/command` in private chats and `/command@bot_name` anywhere.
pub fn on_command(command: &'static str, bot_name: impl Into<String>) -> HandlerBuilder {
    let bot_name = bot_name.into();
    HandlerBuilder::new(format!("command:{command}"))
        .check(move |event| event.is_command_named(command, &bot_name))
}

/// Reacts when the pressed button or the pending session carries `action`.
pub fn on_action(action: Action) -> HandlerBuilder {
    HandlerBuilder::new(format!("action:{action}")).check(move |event| event.has_action(&action))
}

/// Reacts to inline queries.
pub fn on_inline_query() -> HandlerBuilder {
    HandlerBuilder::new("inline_query").check(|event| event.raw().as_inline_query().is_some())
}

/// Reacts to non-command text messages.
pub fn on_text() -> HandlerBuilder {
    HandlerBuilder::new("text").check(|event| event.has_text() && !event.is_command())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{
        ButtonRef, CallbackQuery, Chat, HandlerError, Identity, Message, OutboundAction, RawEvent,
        User,
    };

    fn text_event(chat: Chat, text: &str) -> EnrichedEvent {
        let from = Identity::new(3, "Cy");
        EnrichedEvent::new(
            RawEvent::message(1, Message::text(1, chat, from.clone(), text)),
            User::from_identity(&from),
        )
    }

    #[test]
    fn test_checks_are_and_combined() {
        let handler = HandlerBuilder::new("private-text")
            .check(|e| e.has_text())
            .check(|e| e.is_private())
            .handle(|_| async { Ok(ResponseEnvelope::new()) });

        assert!(handler.is_reactive(&text_event(Chat::private(3), "hi")));
        assert!(!handler.is_reactive(&text_event(Chat::group(-3), "hi")));
        assert!(!handler.is_reactive(&text_event(Chat::private(3), "")));
    }

    #[test]
    fn test_no_checks_matches_all() {
        let handler = HandlerBuilder::new("all").handle(|_| async { Ok(ResponseEnvelope::new()) });
        assert!(handler.is_reactive(&text_event(Chat::group(-1), "")));
        assert_eq!(handler.name(), "all");
    }

    #[test]
    fn test_shortcuts() {
        let start = on_command("start", "tally_bot").handle(|_| async { Ok(ResponseEnvelope::new()) });
        assert!(start.is_reactive(&text_event(Chat::private(3), "/start")));
        assert!(!start.is_reactive(&text_event(Chat::private(3), "start")));

        let text = on_text().handle(|_| async { Ok(ResponseEnvelope::new()) });
        assert!(text.is_reactive(&text_event(Chat::private(3), "hello")));
        assert!(!text.is_reactive(&text_event(Chat::private(3), "/start")));

        let from = Identity::new(3, "Cy");
        let pressed = EnrichedEvent::new(
            RawEvent::callback(
                2,
                CallbackQuery {
                    id: "cb".into(),
                    from: from.clone(),
                    message: Some(Message::text(9, Chat::private(3), from.clone(), "menu")),
                    inline_message_id: None,
                    data: Some("b1".into()),
                },
            ),
            User::from_identity(&from),
        )
        .with_button(Some(ButtonRef::new("view_start")));
        let view = on_action(Action::new("view_start")).handle(|_| async { Ok(ResponseEnvelope::new()) });
        assert!(view.is_reactive(&pressed));
        assert!(!view.is_reactive(&text_event(Chat::private(3), "/start")));
    }

    #[tokio::test]
    async fn test_handle_runs_body() {
        let handler = on_text().handle(|event| async move {
            let chat_id = event
                .chat_id()
                .ok_or_else(|| HandlerError::rejected("no chat"))?;
            Ok(ResponseEnvelope::new().action(OutboundAction::message(chat_id, "echo")))
        });

        let envelope = handler
            .handle(Arc::new(text_event(Chat::private(3), "hi")))
            .await
            .unwrap();
        assert!(envelope.should_send);
        assert_eq!(envelope.actions, vec![OutboundAction::message(3, "echo")]);
    }
}
