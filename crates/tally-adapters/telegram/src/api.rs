//! Bot API client.
//!
//! [`TelegramApi`] is the outbound half of the Telegram transport: it maps
//! every [`Outgoing`] item onto one Bot API method call. It also serves
//! `getUpdates` for the [poller](crate::poller).
//!
//! | Outgoing | Method |
//! |---|---|
//! | `SendMessage` | `sendMessage` |
//! | `EditMessage` / `EditInlineMessage` | `editMessageText` |
//! | `SendDocument` | `sendDocument` |
//! | `SendPhoto` | `sendPhoto` |
//! | `SendVideo` | `sendVideo` |
//! | inline answer | `answerInlineQuery` |
//! | callback answer | `answerCallbackQuery` |
//!
//! All text goes out with the legacy `Markdown` parse mode.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tally_core::{
    CallbackAnswer, DeliveryReceipt, InlineAnswer, InlineKeyboard, Outbound, OutboundAction,
    Outgoing, TransportError, TransportResult,
};
use tracing::{debug, trace};

use crate::config::TelegramConfig;
use crate::model::{ApiResponse, TgUser, Update};

const PARSE_MODE: &str = "Markdown";

/// Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramApi {
    client: Client,
    config: TelegramConfig,
}

impl TelegramApi {
    /// Creates a client for the given configuration.
    pub fn new(config: TelegramConfig) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::ConnectionFailed {
                url: config.api_base.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    /// Calls a Bot API method with a JSON body.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> TransportResult<T> {
        trace!(method, "Calling Bot API");

        let response = self
            .client
            .post(self.config.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                // The method URL embeds the token
                url: format!("{}/bot***/{method}", self.config.api_base),
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Serialization(e.without_url().to_string()))?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                error_code,
                description,
                ..
            } => Err(TransportError::Api {
                code: error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                description: description.unwrap_or_else(|| format!("{method} returned no result")),
            }),
        }
    }

    /// Long-polls for updates starting at `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> TransportResult<Vec<Update>> {
        let mut body = json!({
            "timeout": self.config.poll_timeout_secs,
            "allowed_updates": self.config.allowed_updates,
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", &body).await
    }

    /// Returns the bot's own account.
    pub async fn get_me(&self) -> TransportResult<TgUser> {
        self.call("getMe", &json!({})).await
    }
}

impl fmt::Debug for TelegramApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramApi")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Outbound for TelegramApi {
    async fn send(&self, item: Outgoing<'_>) -> TransportResult<DeliveryReceipt> {
        let (method, body) = payload(item);
        let result: Value = self.call(method, &body).await?;
        let receipt = DeliveryReceipt {
            message_id: result.get("message_id").and_then(Value::as_i64),
        };
        debug!(method, message_id = receipt.message_id, "Delivered");
        Ok(receipt)
    }
}

// ============================================================================
// Payload Building
// ============================================================================

/// Maps an outgoing item onto a Bot API method and its JSON body.
pub fn payload(item: Outgoing<'_>) -> (&'static str, Value) {
    match item {
        Outgoing::Inline(answer) => ("answerInlineQuery", inline_payload(answer)),
        Outgoing::Callback(answer) => ("answerCallbackQuery", callback_payload(answer)),
        Outgoing::Action(action) => action_payload(action),
    }
}

fn reply_markup(keyboard: &InlineKeyboard) -> Value {
    json!({ "inline_keyboard": keyboard.rows })
}

fn text_body(text: &str, keyboard: Option<&InlineKeyboard>) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("text".into(), json!(text));
    body.insert("parse_mode".into(), json!(PARSE_MODE));
    if let Some(keyboard) = keyboard {
        body.insert("reply_markup".into(), reply_markup(keyboard));
    }
    body
}

fn file_body(chat_id: i64, field: &str, file_id: &str, caption: Option<&str>) -> Value {
    let mut body = Map::new();
    body.insert("chat_id".into(), json!(chat_id));
    body.insert(field.into(), json!(file_id));
    if let Some(caption) = caption {
        body.insert("caption".into(), json!(caption));
        body.insert("parse_mode".into(), json!(PARSE_MODE));
    }
    Value::Object(body)
}

fn action_payload(action: &OutboundAction) -> (&'static str, Value) {
    match action {
        OutboundAction::SendMessage {
            chat_id,
            text,
            keyboard,
            reply_to,
        } => {
            let mut body = text_body(text, keyboard.as_ref());
            body.insert("chat_id".into(), json!(chat_id));
            if let Some(reply_to) = reply_to {
                body.insert("reply_to_message_id".into(), json!(reply_to));
            }
            ("sendMessage", Value::Object(body))
        }
        OutboundAction::EditMessage {
            chat_id,
            message_id,
            text,
            keyboard,
        } => {
            let mut body = text_body(text, keyboard.as_ref());
            body.insert("chat_id".into(), json!(chat_id));
            body.insert("message_id".into(), json!(message_id));
            ("editMessageText", Value::Object(body))
        }
        OutboundAction::EditInlineMessage {
            inline_message_id,
            text,
            keyboard,
        } => {
            let mut body = text_body(text, keyboard.as_ref());
            body.insert("inline_message_id".into(), json!(inline_message_id));
            ("editMessageText", Value::Object(body))
        }
        OutboundAction::SendDocument {
            chat_id,
            file_id,
            caption,
        } => (
            "sendDocument",
            file_body(*chat_id, "document", file_id, caption.as_deref()),
        ),
        OutboundAction::SendPhoto {
            chat_id,
            file_id,
            caption,
        } => (
            "sendPhoto",
            file_body(*chat_id, "photo", file_id, caption.as_deref()),
        ),
        OutboundAction::SendVideo {
            chat_id,
            file_id,
            caption,
        } => (
            "sendVideo",
            file_body(*chat_id, "video", file_id, caption.as_deref()),
        ),
    }
}

fn inline_payload(answer: &InlineAnswer) -> Value {
    let results: Vec<Value> = answer
        .results
        .iter()
        .map(|result| {
            let mut article = json!({
                "type": "article",
                "id": result.id,
                "title": result.title,
                "input_message_content": {
                    "message_text": result.text,
                    "parse_mode": PARSE_MODE,
                },
            });
            if let Some(description) = &result.description {
                article["description"] = json!(description);
            }
            if let Some(keyboard) = &result.keyboard {
                article["reply_markup"] = reply_markup(keyboard);
            }
            article
        })
        .collect();

    let mut body = json!({
        "inline_query_id": answer.query_id,
        "results": results,
        "cache_time": answer.cache_time,
        "is_personal": answer.is_personal,
    });
    if let Some(offset) = &answer.next_offset {
        body["next_offset"] = json!(offset);
    }
    body
}

fn callback_payload(answer: &CallbackAnswer) -> Value {
    let mut body = json!({
        "callback_query_id": answer.callback_id,
        "show_alert": answer.show_alert,
        "cache_time": answer.cache_time,
    });
    if let Some(text) = &answer.text {
        body["text"] = json!(text);
    }
    body
}
