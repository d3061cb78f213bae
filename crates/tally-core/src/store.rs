//! Persistence contracts consumed during enrichment and by handlers.
//!
//! The gateway persists nothing itself. Implementations own their
//! concurrency; every method may be called from several tasks at once.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::event::Identity;
use crate::model::{ButtonRef, SessionState, User};

/// User records.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Creates or refreshes the record for `identity` and returns it.
    async fn upsert(&self, identity: &Identity) -> StoreResult<User>;

    /// Looks a user up by id.
    async fn find(&self, user_id: i64) -> StoreResult<Option<User>>;

    /// Stores an updated record.
    async fn save(&self, user: User) -> StoreResult<User>;
}

/// Pending multi-step interactions, at most one per user.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores `state`, replacing any state the user already had.
    async fn save(&self, state: SessionState) -> StoreResult<SessionState>;

    async fn find_by_user(&self, user_id: i64) -> StoreResult<Option<SessionState>>;

    /// Deletes one state by id.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Deletes every state of a user.
    async fn clean(&self, user_id: i64) -> StoreResult<()>;
}

/// Short-lived references behind inline buttons.
#[async_trait]
pub trait ButtonStore: Send + Sync {
    /// Stores a button and returns it with its assigned id.
    async fn save(&self, button: ButtonRef) -> StoreResult<ButtonRef>;

    /// Stores several buttons, preserving order.
    async fn save_all(&self, buttons: Vec<ButtonRef>) -> StoreResult<Vec<ButtonRef>> {
        let mut saved = Vec::with_capacity(buttons.len());
        for button in buttons {
            saved.push(self.save(button).await?);
        }
        Ok(saved)
    }

    /// Fails with [`StoreError::NotFound`](crate::StoreError::NotFound) for
    /// unknown or expired ids.
    async fn find_by_id(&self, id: &str) -> StoreResult<ButtonRef>;
}

pub type SharedUserService = Arc<dyn UserService>;
pub type SharedSessionStore = Arc<dyn SessionStore>;
pub type SharedButtonStore = Arc<dyn ButtonStore>;
