//! Helpers for building screens.
//!
//! A "screen" is a message with an inline keyboard. When a user navigates by
//! pressing buttons, the bot edits the screen in place instead of sending a
//! new message each time; [`create_screen`] picks the right action for the
//! event at hand.

use tally_core::{
    CallbackAnswer, EnrichedEvent, InlineButton, InlineKeyboard, InlineResult, OutboundAction,
    User,
};
use uuid::Uuid;

/// Longest name [`short_name`] returns, in characters.
const SHORT_NAME_LEN: usize = 10;

/// Builds the action that shows `text` and `keyboard` to the user.
///
/// - button press on an inline message: edit that inline message
/// - button press on a chat message: edit that message
/// - anything else: send a new message to the event's chat
///
/// Returns `None` for events without a chat (inline queries).
pub fn create_screen(
    event: &EnrichedEvent,
    text: impl Into<String>,
    keyboard: InlineKeyboard,
) -> Option<OutboundAction> {
    let text = text.into();
    if let Some(inline_message_id) = event.inline_message_id() {
        return Some(OutboundAction::EditInlineMessage {
            inline_message_id: inline_message_id.to_string(),
            text,
            keyboard: Some(keyboard),
        });
    }

    let chat_id = event.chat_id()?;
    if event.is_button()
        && let Some(message_id) = event.callback_message_id()
    {
        return Some(OutboundAction::EditMessage {
            chat_id,
            message_id,
            text,
            keyboard: Some(keyboard),
        });
    }

    Some(OutboundAction::SendMessage {
        chat_id,
        text,
        keyboard: Some(keyboard),
        reply_to: None,
    })
}

/// Acknowledges the button press of `event`, if it is one.
pub fn create_callback(
    event: &EnrichedEvent,
    text: impl Into<String>,
    show_alert: bool,
) -> Option<CallbackAnswer> {
    let callback = event.callback()?;
    let mut answer = CallbackAnswer::new(callback.id.clone()).with_text(text);
    answer.show_alert = show_alert;
    Some(answer)
}

/// An inline-query result with a fresh id.
pub fn inline_article(
    title: impl Into<String>,
    description: impl Into<String>,
    text: impl Into<String>,
    keyboard: InlineKeyboard,
) -> InlineResult {
    InlineResult {
        id: Uuid::new_v4().simple().to_string(),
        title: title.into(),
        description: Some(description.into()),
        text: text.into(),
        keyboard: (!keyboard.is_empty()).then_some(keyboard),
    }
}

/// Lays `buttons` out in rows of `per_row`; the last row may be shorter.
pub fn split_keyboard(buttons: Vec<InlineButton>, per_row: usize) -> InlineKeyboard {
    let per_row = per_row.max(1);
    let mut rows = Vec::with_capacity(buttons.len().div_ceil(per_row));
    let mut row = Vec::with_capacity(per_row);
    for button in buttons {
        row.push(button);
        if row.len() == per_row {
            rows.push(std::mem::replace(&mut row, Vec::with_capacity(per_row)));
        }
    }
    if !row.is_empty() {
        rows.push(row);
    }
    InlineKeyboard::new(rows)
}

/// Lays `buttons` out with a row width that grows with their number.
///
/// | Buttons | Per row |
/// |---|---|
/// | up to 8 | 2 |
/// | 9 to 24 | 3 |
/// | more | 4 |
pub fn optimize_keyboard(buttons: Vec<InlineButton>) -> InlineKeyboard {
    let per_row = match buttons.len() {
        0..=8 => 2,
        9..=24 => 3,
        _ => 4,
    };
    split_keyboard(buttons, per_row)
}

/// Display name cut to fit narrow table columns.
///
/// Long two-part names become "First L."; anything still too long is cut.
pub fn short_name(user: &User) -> String {
    let name = user.display_name.as_str();
    let mut short = name.to_string();
    if name.chars().count() > SHORT_NAME_LEN
        && let Some((first, rest)) = name.split_once(' ')
        && let Some(initial) = rest.chars().next()
    {
        short = format!("{first} {initial}.");
    }
    short.chars().take(SHORT_NAME_LEN).collect()
}

/// Escapes text for the legacy `Markdown` parse mode.
///
/// `_`, `*`, `` ` `` and `[` would otherwise open an entity and make the
/// platform reject the whole message.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Markdown mention of `user`.
pub fn user_link(user: &User) -> String {
    // A `]` would close the link text early
    let name = user.display_name.replace(']', "");
    format!("[{}](tg://user?id={})", escape_markdown(&name), user.id)
}
