//! Records resolved during enrichment.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::Identity;

/// Tag naming a step of a multi-step interaction.
///
/// Buttons and session states both carry an action; handlers react to the
/// action rather than to raw text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Cow<'static, str>);

impl Action {
    /// Creates an action from a static name.
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Returns the action name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<&'static str> for Action {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user record as kept by the user service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Platform user id.
    pub id: i64,
    /// Public handle.
    #[serde(default)]
    pub username: Option<String>,
    /// Full display name.
    pub display_name: String,
    /// Preferred language; falls back to the client language.
    #[serde(default)]
    pub language: Option<String>,
    /// Service-specific profile fields.
    #[serde(default)]
    pub profile: Value,
}

impl User {
    /// Builds a record straight from the platform identity.
    ///
    /// Used both by user services on first contact and by enrichment when the
    /// user service is unavailable.
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            username: identity.username.clone(),
            display_name: identity.display_name(),
            language: identity.language_code.clone(),
            profile: Value::Null,
        }
    }

    /// Returns a profile field, if set.
    pub fn profile_field(&self, key: &str) -> Option<&Value> {
        self.profile.get(key).filter(|v| !v.is_null())
    }
}

/// A pending multi-step interaction of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Record id; empty until saved.
    #[serde(default)]
    pub id: String,
    /// Owning user.
    pub user_id: i64,
    /// What the next message from the user means.
    pub action: Action,
    /// Step-specific data.
    #[serde(default)]
    pub payload: Value,
}

impl SessionState {
    /// Creates an unsaved session state.
    pub fn new(user_id: i64, action: impl Into<Action>) -> Self {
        Self {
            id: String::new(),
            user_id,
            action: action.into(),
            payload: Value::Null,
        }
    }

    /// Attaches step data.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Reference data behind a previously issued inline button.
///
/// Only the id travels through the platform as callback data; everything
/// else stays in the button store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonRef {
    /// Button id; empty until saved.
    #[serde(default)]
    pub id: String,
    /// Action the button triggers.
    pub action: Action,
    /// Button-specific data.
    #[serde(default)]
    pub payload: Value,
}

impl ButtonRef {
    /// Creates an unsaved button.
    pub fn new(action: impl Into<Action>) -> Self {
        Self {
            id: String::new(),
            action: action.into(),
            payload: Value::Null,
        }
    }

    /// Attaches button data.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}
