//! Inbound events as delivered by a transport.
//!
//! # Hierarchy
//!
//! ```text
//! RawEvent { update_id }
//! └── RawEventKind
//!     ├── Message(Message)             plain or edited message
//!     ├── Callback(CallbackQuery)      press of an inline keyboard button
//!     ├── InlineQuery(InlineQuery)     `@bot query` typed in any chat
//!     └── Unsupported(kind)            anything the gateway does not route
//! ```
//!
//! Exactly one kind is populated per event. Adapters translate their
//! platform payloads into this shape; nothing downstream depends on the
//! platform.

use serde::{Deserialize, Serialize};

// ============================================================================
// Shared Types
// ============================================================================

/// The sender of an event, as given by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Platform user id.
    pub id: i64,
    /// Public handle, without the leading `@`.
    #[serde(default)]
    pub username: Option<String>,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Last name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// IETF language tag of the user's client.
    #[serde(default)]
    pub language_code: Option<String>,
}

impl Identity {
    /// Creates an identity with just an id and a first name.
    pub fn new(id: i64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            ..Default::default()
        }
    }

    /// First and last name joined by a space.
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// Kind of chat an event happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// One-to-one chat with the bot.
    Private,
    /// Basic group.
    Group,
    /// Supergroup.
    Supergroup,
    /// Broadcast channel.
    Channel,
}

/// A chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Chat id; outgoing messages are addressed to it.
    pub id: i64,
    /// Chat kind.
    pub kind: ChatKind,
}

impl Chat {
    /// Creates a private chat.
    pub fn private(id: i64) -> Self {
        Self {
            id,
            kind: ChatKind::Private,
        }
    }

    /// Creates a group chat.
    pub fn group(id: i64) -> Self {
        Self {
            id,
            kind: ChatKind::Group,
        }
    }
}

/// A formatting or mention entity inside message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity type (`bot_command`, `mention`, `text_link`, ...).
    pub kind: String,
    /// Offset in UTF-16 code units.
    pub offset: i64,
    /// Length in UTF-16 code units.
    pub length: i64,
    /// Target URL for `text_link`.
    #[serde(default)]
    pub url: Option<String>,
    /// Mentioned user for `text_mention`.
    #[serde(default)]
    pub user: Option<Identity>,
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Attachment {
    /// General file.
    Document {
        file_id: String,
        #[serde(default)]
        file_size: Option<u64>,
        #[serde(default)]
        mime_type: Option<String>,
    },
    /// Video file.
    Video {
        file_id: String,
        #[serde(default)]
        file_size: Option<u64>,
        #[serde(default)]
        mime_type: Option<String>,
    },
    /// Photo; adapters keep the largest available size.
    Photo {
        file_id: String,
        width: u32,
        height: u32,
        #[serde(default)]
        caption: Option<String>,
    },
}

// ============================================================================
// Event Kinds
// ============================================================================

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id, unique inside the chat.
    pub id: i64,
    /// Chat the message belongs to.
    pub chat: Chat,
    /// Sender; empty for channel posts.
    #[serde(default)]
    pub from: Option<Identity>,
    /// Unix timestamp.
    #[serde(default)]
    pub date: i64,
    /// Text (or caption); empty for pure attachments.
    #[serde(default)]
    pub text: String,
    /// Entities in `text`.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Attached file, if any.
    #[serde(default)]
    pub attachment: Option<Attachment>,
    /// Set when this is an edit of an earlier message.
    #[serde(default)]
    pub edited: bool,
}

impl Message {
    /// Creates a text message.
    pub fn text(id: i64, chat: Chat, from: Identity, text: impl Into<String>) -> Self {
        Self {
            id,
            chat,
            from: Some(from),
            date: 0,
            text: text.into(),
            entities: Vec::new(),
            attachment: None,
            edited: false,
        }
    }
}

/// A press of an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Query id; the acknowledgment refers to it.
    pub id: String,
    /// User who pressed the button.
    pub from: Identity,
    /// Message carrying the keyboard, when sent by the bot into a chat.
    #[serde(default)]
    pub message: Option<Message>,
    /// Id of the inline message carrying the keyboard, for inline-mode messages.
    #[serde(default)]
    pub inline_message_id: Option<String>,
    /// Opaque data attached to the button; the gateway stores button ids here.
    #[serde(default)]
    pub data: Option<String>,
}

/// An inline query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineQuery {
    /// Query id; the inline answer refers to it.
    pub id: String,
    /// User who typed the query.
    pub from: Identity,
    /// Query text.
    #[serde(default)]
    pub query: String,
    /// Pagination offset.
    #[serde(default)]
    pub offset: String,
}

/// The populated kind of a [`RawEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum RawEventKind {
    /// Plain or edited message.
    Message(Message),
    /// Callback action.
    Callback(CallbackQuery),
    /// Inline query.
    InlineQuery(InlineQuery),
    /// A notification kind the gateway does not route, by its platform name.
    Unsupported(String),
}

/// An unprocessed inbound notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Monotonic id assigned by the transport.
    pub update_id: i64,
    /// The populated kind.
    #[serde(flatten)]
    pub kind: RawEventKind,
}

impl RawEvent {
    /// Creates a message event.
    pub fn message(update_id: i64, message: Message) -> Self {
        Self {
            update_id,
            kind: RawEventKind::Message(message),
        }
    }

    /// Creates a callback event.
    pub fn callback(update_id: i64, callback: CallbackQuery) -> Self {
        Self {
            update_id,
            kind: RawEventKind::Callback(callback),
        }
    }

    /// Creates an inline-query event.
    pub fn inline_query(update_id: i64, query: InlineQuery) -> Self {
        Self {
            update_id,
            kind: RawEventKind::InlineQuery(query),
        }
    }

    /// Short name of the populated kind.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            RawEventKind::Message(m) if m.edited => "edited_message",
            RawEventKind::Message(_) => "message",
            RawEventKind::Callback(_) => "callback_query",
            RawEventKind::InlineQuery(_) => "inline_query",
            RawEventKind::Unsupported(_) => "unsupported",
        }
    }

    /// The acting user, checked in callback → message → inline-query order.
    pub fn sender(&self) -> Option<&Identity> {
        match &self.kind {
            RawEventKind::Callback(c) => Some(&c.from),
            RawEventKind::Message(m) => m.from.as_ref(),
            RawEventKind::InlineQuery(q) => Some(&q.from),
            RawEventKind::Unsupported(_) => None,
        }
    }

    /// The message, if this is a message event.
    pub fn as_message(&self) -> Option<&Message> {
        match &self.kind {
            RawEventKind::Message(m) => Some(m),
            _ => None,
        }
    }

    /// The callback, if this is a callback event.
    pub fn as_callback(&self) -> Option<&CallbackQuery> {
        match &self.kind {
            RawEventKind::Callback(c) => Some(c),
            _ => None,
        }
    }

    /// The inline query, if this is an inline-query event.
    pub fn as_inline_query(&self) -> Option<&InlineQuery> {
        match &self.kind {
            RawEventKind::InlineQuery(q) => Some(q),
            _ => None,
        }
    }

    /// Id of the previously issued button this event refers to.
    pub fn button_id(&self) -> Option<&str> {
        self.as_callback()
            .and_then(|c| c.data.as_deref())
            .filter(|d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity {
            id: 7,
            username: Some("alice".into()),
            first_name: "Alice".into(),
            last_name: Some("Liddell".into()),
            language_code: Some("en".into()),
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(alice().display_name(), "Alice Liddell");
        assert_eq!(Identity::new(1, "Bob").display_name(), "Bob");
    }

    #[test]
    fn test_sender_prefers_callback_user() {
        let mut inner = Message::text(1, Chat::private(99), Identity::new(99, "Bot"), "menu");
        inner.from = Some(Identity::new(99, "Bot"));
        let event = RawEvent::callback(
            3,
            CallbackQuery {
                id: "cb".into(),
                from: alice(),
                message: Some(inner),
                inline_message_id: None,
                data: Some("btn-1".into()),
            },
        );
        assert_eq!(event.sender().map(|i| i.id), Some(7));
        assert_eq!(event.button_id(), Some("btn-1"));
    }

    #[test]
    fn test_channel_post_has_no_sender() {
        let mut message = Message::text(1, Chat::group(-5), alice(), "post");
        message.from = None;
        let event = RawEvent::message(1, message);
        assert!(event.sender().is_none());

        let unsupported = RawEvent {
            update_id: 2,
            kind: RawEventKind::Unsupported("poll".into()),
        };
        assert!(unsupported.sender().is_none());
        assert_eq!(unsupported.kind_name(), "unsupported");
    }

    #[test]
    fn test_empty_callback_data_is_not_a_button() {
        let event = RawEvent::callback(
            1,
            CallbackQuery {
                id: "cb".into(),
                from: alice(),
                message: None,
                inline_message_id: Some("inl".into()),
                data: Some(String::new()),
            },
        );
        assert_eq!(event.button_id(), None);
    }
}
