//! Handler output.
//!
//! A handler answers an event with a [`ResponseEnvelope`]. The dispatcher
//! merges the envelopes of all handlers of a cycle into one, and the listener
//! delivers the merged envelope in a fixed order:
//!
//! ```text
//! ResponseEnvelope
//! ├── inline      answer to an inline query        (delivered first)
//! ├── actions     messages, edits and attachments  (in order)
//! ├── callback    acknowledgment of a button press (delivered last)
//! ├── should_send nothing above is delivered unless set
//! └── redirect    event to re-dispatch right after delivery
//! ```

use serde::{Deserialize, Serialize};

use crate::enriched::EnrichedEvent;

// ============================================================================
// Keyboards
// ============================================================================

/// A button of an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    /// Label.
    pub text: String,
    /// Callback data sent back when pressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    /// URL opened when pressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineButton {
    /// A button that sends `data` back as a callback.
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    /// A button that opens `url`.
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

/// Rows of inline buttons attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    /// Appends a row.
    pub fn row(mut self, row: Vec<InlineButton>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    /// Total number of buttons.
    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

// ============================================================================
// Outbound Actions
// ============================================================================

/// One message-level operation to perform on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundAction {
    /// Send a new text message.
    SendMessage {
        chat_id: i64,
        text: String,
        #[serde(default)]
        keyboard: Option<InlineKeyboard>,
        #[serde(default)]
        reply_to: Option<i64>,
    },
    /// Replace the text of a message the bot sent into a chat.
    EditMessage {
        chat_id: i64,
        message_id: i64,
        text: String,
        #[serde(default)]
        keyboard: Option<InlineKeyboard>,
    },
    /// Replace the text of an inline-mode message.
    EditInlineMessage {
        inline_message_id: String,
        text: String,
        #[serde(default)]
        keyboard: Option<InlineKeyboard>,
    },
    /// Send a file by its platform id.
    SendDocument {
        chat_id: i64,
        file_id: String,
        #[serde(default)]
        caption: Option<String>,
    },
    /// Send a photo by its platform id.
    SendPhoto {
        chat_id: i64,
        file_id: String,
        #[serde(default)]
        caption: Option<String>,
    },
    /// Send a video by its platform id.
    SendVideo {
        chat_id: i64,
        file_id: String,
        #[serde(default)]
        caption: Option<String>,
    },
}

impl OutboundAction {
    /// A plain text message.
    pub fn message(chat_id: i64, text: impl Into<String>) -> Self {
        Self::SendMessage {
            chat_id,
            text: text.into(),
            keyboard: None,
            reply_to: None,
        }
    }

    /// Attaches a keyboard to a text action; no-op for attachments.
    pub fn with_keyboard(mut self, markup: InlineKeyboard) -> Self {
        match &mut self {
            Self::SendMessage { keyboard, .. }
            | Self::EditMessage { keyboard, .. }
            | Self::EditInlineMessage { keyboard, .. } => *keyboard = Some(markup),
            Self::SendDocument { .. } | Self::SendPhoto { .. } | Self::SendVideo { .. } => {}
        }
        self
    }

    /// Short name used in logs and delivery errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "message",
            Self::EditMessage { .. } => "message edit",
            Self::EditInlineMessage { .. } => "inline message edit",
            Self::SendDocument { .. } => "document",
            Self::SendPhoto { .. } => "photo",
            Self::SendVideo { .. } => "video",
        }
    }
}

// ============================================================================
// Inline Answers & Callback Acknowledgments
// ============================================================================

/// One entry of an inline-query answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineResult {
    /// Result id, unique within the answer.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Text of the message sent when the result is chosen.
    pub text: String,
    #[serde(default)]
    pub keyboard: Option<InlineKeyboard>,
}

/// Answer to an inline query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineAnswer {
    pub query_id: String,
    pub results: Vec<InlineResult>,
    /// Seconds the platform may cache the answer.
    pub cache_time: u32,
    /// Cache per user rather than globally.
    pub is_personal: bool,
    #[serde(default)]
    pub next_offset: Option<String>,
}

impl InlineAnswer {
    /// A personal, uncached answer.
    pub fn new(query_id: impl Into<String>, results: Vec<InlineResult>) -> Self {
        Self {
            query_id: query_id.into(),
            results,
            cache_time: 0,
            is_personal: true,
            next_offset: None,
        }
    }
}

/// Acknowledgment of a button press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAnswer {
    pub callback_id: String,
    /// Notification text shown to the user.
    #[serde(default)]
    pub text: Option<String>,
    /// Show the text as a modal alert instead of a toast.
    #[serde(default)]
    pub show_alert: bool,
    pub cache_time: u32,
}

impl CallbackAnswer {
    /// A silent acknowledgment cached for one second.
    pub fn new(callback_id: impl Into<String>) -> Self {
        Self {
            callback_id: callback_id.into(),
            text: None,
            show_alert: false,
            cache_time: 1,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Everything a handler wants done in response to one event.
///
/// Builders that attach deliverable content also set `should_send`; an
/// envelope built with [`ResponseEnvelope::new`] alone delivers nothing.
#[derive(Debug, Clone, Default)]
pub struct ResponseEnvelope {
    pub actions: Vec<OutboundAction>,
    pub inline: Option<InlineAnswer>,
    pub callback: Option<CallbackAnswer>,
    pub should_send: bool,
    pub redirect: Option<Box<EnrichedEvent>>,
}

impl ResponseEnvelope {
    /// An empty envelope that delivers nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action.
    pub fn action(mut self, action: OutboundAction) -> Self {
        self.push(action);
        self
    }

    /// Appends an action in place.
    pub fn push(&mut self, action: OutboundAction) {
        self.actions.push(action);
        self.should_send = true;
    }

    /// Appends an action if there is one.
    pub fn push_opt(&mut self, action: Option<OutboundAction>) {
        if let Some(action) = action {
            self.push(action);
        }
    }

    /// Sets the inline-query answer.
    pub fn inline(mut self, answer: InlineAnswer) -> Self {
        self.inline = Some(answer);
        self.should_send = true;
        self
    }

    /// Sets the callback acknowledgment.
    pub fn callback(mut self, answer: CallbackAnswer) -> Self {
        self.callback = Some(answer);
        self.should_send = true;
        self
    }

    /// Requests an immediate re-dispatch of `event` after delivery.
    pub fn redirect(mut self, event: EnrichedEvent) -> Self {
        self.redirect = Some(Box::new(event));
        self
    }

    /// Sets `should_send` explicitly.
    pub fn send(mut self, should_send: bool) -> Self {
        self.should_send = should_send;
        self
    }

    /// Returns `true` if there is nothing to deliver and nothing to follow.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
            && self.inline.is_none()
            && self.callback.is_none()
            && self.redirect.is_none()
    }

    /// Folds an envelope that completed after this one into it.
    ///
    /// Actions are appended and every single-valued field set by `later`
    /// replaces ours. `should_send` becomes true once any merged envelope
    /// asked to send or carried at least one action.
    pub fn merge(&mut self, later: ResponseEnvelope) {
        self.should_send |= later.should_send || !later.actions.is_empty();
        self.actions.extend(later.actions);
        if later.inline.is_some() {
            self.inline = later.inline;
        }
        if later.callback.is_some() {
            self.callback = later.callback;
        }
        if later.redirect.is_some() {
            self.redirect = later.redirect;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_envelope_does_not_send() {
        let envelope = ResponseEnvelope::new();
        assert!(!envelope.should_send);
        assert!(envelope.is_empty());
    }

    #[test]
    fn test_push_opt_skips_none() {
        let mut envelope = ResponseEnvelope::new();
        envelope.push_opt(None);
        assert!(!envelope.should_send);
        envelope.push_opt(Some(OutboundAction::message(1, "hi")));
        assert!(envelope.should_send);
        assert_eq!(envelope.actions.len(), 1);
    }

    #[test]
    fn test_merge_appends_and_overrides() {
        let mut merged = ResponseEnvelope::new()
            .action(OutboundAction::message(1, "a"))
            .callback(CallbackAnswer::new("cb").with_text("first"));
        let later = ResponseEnvelope::new()
            .action(OutboundAction::message(1, "b"))
            .callback(CallbackAnswer::new("cb").with_text("second"));
        merged.merge(later);

        let texts: Vec<_> = merged
            .actions
            .iter()
            .map(|a| match a {
                OutboundAction::SendMessage { text, .. } => text.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(texts, ["a", "b"]);
        assert_eq!(
            merged.callback.and_then(|c| c.text).as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_merge_keeps_earlier_single_values() {
        let mut merged = ResponseEnvelope::new().inline(InlineAnswer::new("q", Vec::new()));
        merged.merge(ResponseEnvelope::new().send(false));
        assert!(merged.inline.is_some());
        assert!(merged.should_send);
    }

    #[test]
    fn test_merged_actions_are_sent() {
        let mut merged = ResponseEnvelope::new();
        merged.merge(ResponseEnvelope {
            actions: vec![OutboundAction::message(1, "x")],
            ..ResponseEnvelope::new()
        });
        assert!(merged.should_send);

        let mut quiet = ResponseEnvelope::new();
        quiet.merge(ResponseEnvelope {
            callback: Some(CallbackAnswer::new("cb")),
            ..ResponseEnvelope::new()
        });
        assert!(!quiet.should_send);
    }

    #[test]
    fn test_keyboard_len() {
        let keyboard = InlineKeyboard::default()
            .row(vec![InlineButton::callback("a", "1"), InlineButton::callback("b", "2")])
            .row(vec![InlineButton::url("docs", "https://example.org")]);
        assert_eq!(keyboard.len(), 3);
        assert!(!keyboard.is_empty());
        assert!(InlineKeyboard::default().is_empty());
    }
}
