//! Events after enrichment.

use crate::event::{CallbackQuery, ChatKind, Message, RawEvent, RawEventKind};
use crate::model::{Action, ButtonRef, SessionState, User};

/// A [`RawEvent`] plus the user, session state and button it refers to.
///
/// Built once per cycle by the enrichment stage and shared as
/// `Arc<EnrichedEvent>` with every handler of that cycle. There are no
/// mutating accessors; a handler that wants a different event (for a
/// redirect) clones and rebuilds one with the `with_*` methods.
#[derive(Debug, Clone)]
pub struct EnrichedEvent {
    raw: RawEvent,
    user: User,
    session: Option<SessionState>,
    button: Option<ButtonRef>,
    from_redirect: bool,
}

impl EnrichedEvent {
    /// Creates an event with no session state and no button.
    pub fn new(raw: RawEvent, user: User) -> Self {
        Self {
            raw,
            user,
            session: None,
            button: None,
            from_redirect: false,
        }
    }

    /// Replaces the user record, e.g. after a handler updated the profile.
    pub fn with_user(mut self, user: User) -> Self {
        self.user = user;
        self
    }

    /// Replaces the session state.
    pub fn with_session(mut self, session: Option<SessionState>) -> Self {
        self.session = session;
        self
    }

    /// Replaces the button reference.
    pub fn with_button(mut self, button: Option<ButtonRef>) -> Self {
        self.button = button;
        self
    }

    /// Marks the event as produced by a redirect.
    pub fn into_redirected(mut self) -> Self {
        self.from_redirect = true;
        self
    }

    // ─── Accessors ────────────────────────────────────────────────────────────

    pub fn raw(&self) -> &RawEvent {
        &self.raw
    }

    pub fn update_id(&self) -> i64 {
        self.raw.update_id
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    pub fn button(&self) -> Option<&ButtonRef> {
        self.button.as_ref()
    }

    /// Returns `true` if this event is being re-dispatched by a redirect.
    pub fn is_from_redirect(&self) -> bool {
        self.from_redirect
    }

    pub fn message(&self) -> Option<&Message> {
        self.raw.as_message()
    }

    pub fn callback(&self) -> Option<&CallbackQuery> {
        self.raw.as_callback()
    }

    // ─── Predicates ───────────────────────────────────────────────────────────

    /// Text of a message event.
    pub fn text(&self) -> Option<&str> {
        self.message().map(|m| m.text.as_str())
    }

    /// A message with non-empty text.
    pub fn has_text(&self) -> bool {
        self.text().is_some_and(|t| !t.is_empty())
    }

    /// A message whose text starts with `/`.
    pub fn is_command(&self) -> bool {
        self.text().is_some_and(|t| t.starts_with('/'))
    }

    /// Checks for the command `name` (without the slash).
    ///
    /// In private chats the bare `/name` matches; in groups the command must
    /// be addressed as `/name@bot_name`.
    pub fn is_command_named(&self, name: &str, bot_name: &str) -> bool {
        let Some(text) = self.text() else {
            return false;
        };
        let Some(command) = text.split_whitespace().next() else {
            return false;
        };
        let Some(command) = command.strip_prefix('/') else {
            return false;
        };
        match command.split_once('@') {
            Some((cmd, bot)) => cmd == name && bot.eq_ignore_ascii_case(bot_name),
            None => command == name && self.is_private(),
        }
    }

    /// A press of a button on a regular (non-inline) bot message whose
    /// reference was resolved.
    pub fn is_button(&self) -> bool {
        self.button.is_some() && self.callback().is_some_and(|c| c.inline_message_id.is_none())
    }

    /// A press of a button on an inline-mode message.
    pub fn is_inline(&self) -> bool {
        self.callback().is_some_and(|c| c.inline_message_id.is_some())
    }

    /// The resolved button or the pending session state carries `action`.
    pub fn has_action(&self, action: &Action) -> bool {
        self.button.as_ref().is_some_and(|b| &b.action == action)
            || self.session.as_ref().is_some_and(|s| &s.action == action)
    }

    /// The event happened in a private chat.
    pub fn is_private(&self) -> bool {
        match &self.raw.kind {
            RawEventKind::Message(m) => m.chat.kind == ChatKind::Private,
            RawEventKind::Callback(c) => c
                .message
                .as_ref()
                .is_some_and(|m| m.chat.kind == ChatKind::Private),
            _ => false,
        }
    }

    /// Chat a reply should go to.
    ///
    /// Callbacks without a message (inline mode) fall back to the user's
    /// private chat. Inline queries have no chat.
    pub fn chat_id(&self) -> Option<i64> {
        match &self.raw.kind {
            RawEventKind::Message(m) => Some(m.chat.id),
            RawEventKind::Callback(c) => Some(c.message.as_ref().map_or(c.from.id, |m| m.chat.id)),
            _ => None,
        }
    }

    /// Id of the callback query, for acknowledging a button press.
    pub fn callback_id(&self) -> Option<&str> {
        self.callback().map(|c| c.id.as_str())
    }

    /// Id of the message carrying the pressed button.
    pub fn callback_message_id(&self) -> Option<i64> {
        self.callback().and_then(|c| c.message.as_ref()).map(|m| m.id)
    }

    /// Id of the inline message carrying the pressed button.
    pub fn inline_message_id(&self) -> Option<&str> {
        self.callback().and_then(|c| c.inline_message_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Chat, Identity};

    const VIEW_START: Action = Action::new("start");

    fn message_event(chat: Chat, text: &str) -> EnrichedEvent {
        let from = Identity::new(10, "Ann");
        let raw = RawEvent::message(1, Message::text(1, chat, from.clone(), text));
        EnrichedEvent::new(raw, User::from_identity(&from))
    }

    fn callback_event(inline: bool) -> EnrichedEvent {
        let from = Identity::new(10, "Ann");
        let callback = CallbackQuery {
            id: "cb-1".into(),
            from: from.clone(),
            message: (!inline).then(|| Message::text(55, Chat::private(10), from.clone(), "menu")),
            inline_message_id: inline.then(|| "inl-1".to_string()),
            data: Some("btn".into()),
        };
        EnrichedEvent::new(RawEvent::callback(2, callback), User::from_identity(&from))
            .with_button(Some(ButtonRef::new(VIEW_START)))
    }

    #[test]
    fn test_command_matching() {
        let private = message_event(Chat::private(10), "/start");
        assert!(private.is_command());
        assert!(private.is_command_named("start", "tally_bot"));

        let group_bare = message_event(Chat::group(-1), "/start");
        assert!(!group_bare.is_command_named("start", "tally_bot"));

        let group_addressed = message_event(Chat::group(-1), "/start@Tally_Bot");
        assert!(group_addressed.is_command_named("start", "tally_bot"));

        let other = message_event(Chat::private(10), "/starting");
        assert!(!other.is_command_named("start", "tally_bot"));
    }

    #[test]
    fn test_button_and_inline_are_exclusive() {
        let button = callback_event(false);
        assert!(button.is_button());
        assert!(!button.is_inline());
        assert!(button.has_action(&VIEW_START));
        assert_eq!(button.chat_id(), Some(10));
        assert_eq!(button.callback_message_id(), Some(55));

        let inline = callback_event(true);
        assert!(!inline.is_button());
        assert!(inline.is_inline());
        assert_eq!(inline.inline_message_id(), Some("inl-1"));
        assert_eq!(inline.chat_id(), Some(10));
    }

    #[test]
    fn test_session_action() {
        let event = message_event(Chat::private(10), "1990-01-01")
            .with_session(Some(SessionState::new(10, "set_birth_date")));
        assert!(event.has_action(&Action::new("set_birth_date")));
        assert!(!event.has_action(&VIEW_START));
        assert!(event.has_text());
        assert!(!event.is_from_redirect());
        assert!(event.into_redirected().is_from_redirect());
    }
}
