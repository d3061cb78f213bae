//! Bot API payloads and their translation into gateway events.
//!
//! Only the fields the gateway uses are modelled; everything else in a
//! Telegram update is ignored by serde.
//!
//! # Translation
//!
//! ```text
//! Update
//! ├── callback_query  → RawEventKind::Callback     (embedded message translated too)
//! ├── message         → RawEventKind::Message
//! ├── edited_message  → RawEventKind::Message      (edited = true)
//! ├── inline_query    → RawEventKind::InlineQuery
//! └── anything else   → RawEventKind::Unsupported  (named after the update field)
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};
use tally_core::{
    Attachment, CallbackQuery, Chat, ChatKind, Entity, Identity, InlineQuery, Message, RawEvent,
    RawEventKind,
};

// ============================================================================
// API Envelope
// ============================================================================

/// The envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

// ============================================================================
// Update Payloads
// ============================================================================

/// A Telegram user or bot.
#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

impl From<TgUser> for Identity {
    fn from(user: TgUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            language_code: user.language_code,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: i64,
    pub length: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user: Option<TgUser>,
}

impl From<TgEntity> for Entity {
    fn from(entity: TgEntity) -> Self {
        Self {
            kind: entity.kind,
            offset: entity.offset,
            length: entity.length,
            url: entity.url,
            user: entity.user.map(Identity::from),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgFile {
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgPhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    pub chat: TgChat,
    #[serde(default)]
    pub from: Option<TgUser>,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub entities: Vec<TgEntity>,
    #[serde(default)]
    pub caption_entities: Vec<TgEntity>,
    #[serde(default)]
    pub document: Option<TgFile>,
    #[serde(default)]
    pub video: Option<TgFile>,
    #[serde(default)]
    pub photo: Vec<TgPhotoSize>,
}

impl TgMessage {
    /// Translates the message; `edited` marks an `edited_message` update.
    pub fn into_message(self, edited: bool) -> Message {
        let TgMessage {
            message_id,
            chat,
            from,
            date,
            text,
            caption,
            entities,
            caption_entities,
            document,
            video,
            photo,
        } = self;

        let attachment = if let Some(doc) = document {
            Some(Attachment::Document {
                file_id: doc.file_id,
                file_size: doc.file_size,
                mime_type: doc.mime_type,
            })
        } else if let Some(video) = video {
            Some(Attachment::Video {
                file_id: video.file_id,
                file_size: video.file_size,
                mime_type: video.mime_type,
            })
        } else {
            photo
                .into_iter()
                .max_by_key(|size| u64::from(size.width) * u64::from(size.height))
                .map(|size| Attachment::Photo {
                    file_id: size.file_id,
                    width: size.width,
                    height: size.height,
                    caption: caption.clone(),
                })
        };

        let entities = if entities.is_empty() {
            caption_entities
        } else {
            entities
        };

        Message {
            id: message_id,
            chat: Chat {
                id: chat.id,
                kind: chat.kind,
            },
            from: from.map(Identity::from),
            date,
            text: text.or(caption).unwrap_or_default(),
            entities: entities.into_iter().map(Entity::from).collect(),
            attachment,
            edited,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgCallbackQuery {
    pub id: String,
    pub from: TgUser,
    #[serde(default)]
    pub message: Option<TgMessage>,
    #[serde(default)]
    pub inline_message_id: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgInlineQuery {
    pub id: String,
    pub from: TgUser,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub offset: String,
}

/// One item of a `getUpdates` result.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TgMessage>,
    #[serde(default)]
    pub edited_message: Option<TgMessage>,
    #[serde(default)]
    pub callback_query: Option<TgCallbackQuery>,
    #[serde(default)]
    pub inline_query: Option<TgInlineQuery>,
    /// Update kinds not modelled above.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Update {
    /// Translates the update into a gateway event.
    pub fn into_raw_event(self) -> RawEvent {
        let kind = if let Some(callback) = self.callback_query {
            RawEventKind::Callback(CallbackQuery {
                id: callback.id,
                from: callback.from.into(),
                message: callback.message.map(|m| m.into_message(false)),
                inline_message_id: callback.inline_message_id.filter(|id| !id.is_empty()),
                data: callback.data,
            })
        } else if let Some(message) = self.message {
            RawEventKind::Message(message.into_message(false))
        } else if let Some(message) = self.edited_message {
            RawEventKind::Message(message.into_message(true))
        } else if let Some(query) = self.inline_query {
            RawEventKind::InlineQuery(InlineQuery {
                id: query.id,
                from: query.from.into(),
                query: query.query,
                offset: query.offset,
            })
        } else {
            let name = self
                .other
                .keys()
                .next()
                .cloned()
                .unwrap_or_else(|| "empty".to_string());
            RawEventKind::Unsupported(name)
        };

        RawEvent {
            update_id: self.update_id,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> RawEvent {
        serde_json::from_value::<Update>(value)
            .unwrap()
            .into_raw_event()
    }

    #[test]
    fn test_get_me_response() {
        let response: ApiResponse<TgUser> = serde_json::from_value(json!({
            "ok": true,
            "result": {"id": 7, "is_bot": true, "first_name": "Tally", "username": "tally_bot"}
        }))
        .unwrap();
        let me = response.result.unwrap();
        assert!(me.is_bot);
        assert_eq!(me.username.as_deref(), Some("tally_bot"));

        let failed: ApiResponse<TgUser> = serde_json::from_value(json!({
            "ok": false,
            "error_code": 401,
            "description": "Unauthorized"
        }))
        .unwrap();
        assert!(failed.result.is_none());
        assert_eq!(failed.error_code, Some(401));
    }

    #[test]
    fn test_command_message() {
        let event = parse(json!({
            "update_id": 100,
            "message": {
                "message_id": 5,
                "date": 1700000000,
                "chat": {"id": 42, "type": "private", "first_name": "Ann"},
                "from": {"id": 42, "is_bot": false, "first_name": "Ann", "last_name": "Lee", "language_code": "en"},
                "text": "/start",
                "entities": [{"type": "bot_command", "offset": 0, "length": 6}]
            }
        }));

        assert_eq!(event.update_id, 100);
        let message = event.as_message().unwrap();
        assert_eq!(message.text, "/start");
        assert_eq!(message.chat.kind, ChatKind::Private);
        assert_eq!(message.entities[0].kind, "bot_command");
        assert!(!message.edited);
        assert_eq!(event.sender().unwrap().display_name(), "Ann Lee");
    }

    #[test]
    fn test_edited_message_with_largest_photo() {
        let event = parse(json!({
            "update_id": 101,
            "edited_message": {
                "message_id": 6,
                "chat": {"id": -10, "type": "supergroup"},
                "from": {"id": 7, "first_name": "Bo"},
                "caption": "receipt",
                "photo": [
                    {"file_id": "small", "width": 90, "height": 90},
                    {"file_id": "large", "width": 1280, "height": 960},
                    {"file_id": "medium", "width": 320, "height": 240}
                ]
            }
        }));

        let message = event.as_message().unwrap();
        assert!(message.edited);
        assert_eq!(event.kind_name(), "edited_message");
        assert_eq!(message.text, "receipt");
        assert!(matches!(
            &message.attachment,
            Some(Attachment::Photo { file_id, width: 1280, .. }) if file_id == "large"
        ));
    }

    #[test]
    fn test_inline_callback() {
        let event = parse(json!({
            "update_id": 102,
            "callback_query": {
                "id": "cbq",
                "from": {"id": 9, "first_name": "Cy", "username": "cy"},
                "inline_message_id": "AAQ",
                "chat_instance": "1",
                "data": "btn-1"
            }
        }));

        let callback = event.as_callback().unwrap();
        assert_eq!(callback.inline_message_id.as_deref(), Some("AAQ"));
        assert!(callback.message.is_none());
        assert_eq!(event.button_id(), Some("btn-1"));
        assert_eq!(event.sender().and_then(|s| s.username.as_deref()), Some("cy"));
    }

    #[test]
    fn test_unknown_update_kind() {
        let event = parse(json!({
            "update_id": 103,
            "poll": {"id": "p", "question": "?"}
        }));

        assert_eq!(event.kind, RawEventKind::Unsupported("poll".into()));
        assert!(event.sender().is_none());
    }

    #[test]
    fn test_api_error_envelope() {
        let response: ApiResponse<Vec<Update>> = serde_json::from_value(json!({
            "ok": false,
            "error_code": 401,
            "description": "Unauthorized"
        }))
        .unwrap();

        assert!(!response.ok);
        assert!(response.result.is_none());
        assert_eq!(response.error_code, Some(401));
    }
}
