//! Handlers of the start bot.
//!
//! ```text
//! first contact ─▶ InitProfile ─▶ (user sends a date) ─▶ SetBirthDate ─┐
//!                                                                       │ redirect
//! /start ─────────────────────────────────────────────▶ StartScreen ◀──┤
//!                                   "Profile" button ─▶ ProfileScreen   │
//!                                      "Back" button ─▶ back_to_menu ───┘
//! ```

use std::sync::Arc;

use serde_json::json;
use tally::prelude::*;
use time::Date;
use time::macros::format_description;

pub const VIEW_START: Action = Action::new("start");
pub const VIEW_PROFILE: Action = Action::new("view_profile");
pub const SET_BIRTH_DATE: Action = Action::new("set_birth_date");
pub const BACK_TO_MENU: Action = Action::new("back_to_menu");

const BIRTH_DATE: &str = "birth_date";

fn birth_date(user: &User) -> Option<&str> {
    user.profile_field(BIRTH_DATE).and_then(|v| v.as_str())
}

/// Saves one button per action and returns them as a single keyboard row.
async fn buttons(
    store: &dyn ButtonStore,
    labels: &[(&str, Action)],
) -> HandlerResult<InlineKeyboard> {
    let saved = store
        .save_all(
            labels
                .iter()
                .map(|(_, action)| ButtonRef::new(action.clone()))
                .collect(),
        )
        .await?;
    let row = labels
        .iter()
        .zip(saved)
        .map(|((label, _), button)| InlineButton::callback(*label, button.id))
        .collect();
    Ok(InlineKeyboard::default().row(row))
}

// ============================================================================
// Start Screen
// ============================================================================

/// The main menu, shown on `/start` or when a button leads back to it.
///
/// Only users with a completed profile see it.
pub struct StartScreen {
    pub bot_name: String,
    pub sessions: Arc<dyn SessionStore>,
    pub buttons: Arc<dyn ButtonStore>,
}

#[async_trait]
impl Handler for StartScreen {
    fn name(&self) -> &str {
        "start_screen"
    }

    fn is_reactive(&self, event: &EnrichedEvent) -> bool {
        birth_date(event.user()).is_some()
            && (event.has_action(&VIEW_START) || event.is_command_named("start", &self.bot_name))
    }

    async fn handle(&self, event: Arc<EnrichedEvent>) -> HandlerResult<ResponseEnvelope> {
        self.sessions.clean(event.user().id).await?;

        let keyboard = buttons(self.buttons.as_ref(), &[("👤 Profile", VIEW_PROFILE)]).await?;
        let text = format!("*Main menu*\n\nHi, {}!", user_link(event.user()));

        let mut envelope = ResponseEnvelope::new();
        envelope.push_opt(create_screen(&event, text, keyboard));
        if let Some(ack) = create_callback(&event, "", false) {
            envelope = envelope.callback(ack);
        }
        Ok(envelope)
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Asks a user without a profile for their birth date.
pub struct InitProfile {
    pub sessions: Arc<dyn SessionStore>,
}

#[async_trait]
impl Handler for InitProfile {
    fn name(&self) -> &str {
        "init_profile"
    }

    fn is_reactive(&self, event: &EnrichedEvent) -> bool {
        event.is_private()
            && birth_date(event.user()).is_none()
            && !event.has_action(&SET_BIRTH_DATE)
    }

    async fn handle(&self, event: Arc<EnrichedEvent>) -> HandlerResult<ResponseEnvelope> {
        self.sessions
            .save(SessionState::new(event.user().id, SET_BIRTH_DATE))
            .await?;

        let mut envelope = ResponseEnvelope::new();
        envelope.push_opt(create_screen(
            &event,
            "Welcome! Send me your birth date as `DD.MM.YYYY` to get started.",
            InlineKeyboard::default(),
        ));
        Ok(envelope)
    }
}

/// Consumes the reply to [`InitProfile`] and leads to the start screen.
pub fn set_birth_date(users: Arc<dyn UserService>) -> impl Handler {
    on_action(SET_BIRTH_DATE)
        .check(|event| event.has_text() && !event.is_command())
        .handle(move |event| {
            let users = Arc::clone(&users);
            async move {
                let text = event.text().unwrap_or_default().trim();
                let Ok(date) = Date::parse(text, format_description!("[day].[month].[year]"))
                else {
                    let chat_id = event.chat_id().unwrap_or(event.user().id);
                    return Ok(ResponseEnvelope::new().action(OutboundAction::message(
                        chat_id,
                        "That does not look like a date. Please use `DD.MM.YYYY`.",
                    )));
                };

                let mut user = event.user().clone();
                match user.profile.as_object_mut() {
                    Some(profile) => {
                        profile.insert(BIRTH_DATE.into(), json!(date.to_string()));
                    }
                    None => user.profile = json!({ BIRTH_DATE: date.to_string() }),
                }
                let user = users.save(user).await?;
                tracing::info!(user_id = user.id, %date, "Profile completed");

                let next = (*event)
                    .clone()
                    .with_user(user)
                    .with_session(None)
                    .with_button(Some(ButtonRef::new(VIEW_START)));
                Ok(ResponseEnvelope::new().redirect(next))
            }
        })
}

/// Shows the stored profile.
pub fn profile_screen(buttons_store: Arc<dyn ButtonStore>) -> impl Handler {
    on_action(VIEW_PROFILE).handle(move |event| {
        let buttons_store = Arc::clone(&buttons_store);
        async move {
            let keyboard = buttons(buttons_store.as_ref(), &[("⬅️ Back", BACK_TO_MENU)]).await?;
            let text = format!(
                "*{}*\nBirth date: {}",
                escape_markdown(&short_name(event.user())),
                birth_date(event.user()).unwrap_or("not set"),
            );

            let mut envelope = ResponseEnvelope::new();
            envelope.push_opt(create_screen(&event, text, keyboard));
            if let Some(ack) = create_callback(&event, "", false) {
                envelope = envelope.callback(ack);
            }
            Ok(envelope)
        }
    })
}

/// The "Back" button. The start screen acknowledges the press.
pub fn back_to_menu() -> impl Handler {
    on_action(BACK_TO_MENU).handle(|event| async move {
        let next = (*event).clone().with_button(Some(ButtonRef::new(VIEW_START)));
        Ok(ResponseEnvelope::new().redirect(next))
    })
}
