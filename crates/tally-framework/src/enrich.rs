//! Enrichment stage.
//!
//! Turns a [`RawEvent`] into an [`EnrichedEvent`] by resolving, in order:
//!
//! | Step | Source | On failure |
//! |---|---|---|
//! | acting identity | the raw event | cycle abandoned (`IdentityUndeterminable`) |
//! | user record | [`UserService::upsert`] | user built from the identity, reported |
//! | button reference | [`ButtonStore::find_by_id`] | `None`, reported |
//! | session state | [`SessionStore::find_by_user`] | `None`, reported |
//!
//! [`UserService::upsert`]: tally_core::UserService::upsert
//! [`ButtonStore::find_by_id`]: tally_core::ButtonStore::find_by_id
//! [`SessionStore::find_by_user`]: tally_core::SessionStore::find_by_user

use std::fmt;

use tally_core::{
    EnrichedEvent, GatewayError, GatewayResult, Lookup, RawEvent, SharedButtonStore,
    SharedSessionStore, SharedUserService, User,
};
use tracing::{debug, trace};

/// An enriched event plus the lookups that failed along the way.
#[derive(Debug)]
pub struct Enrichment {
    pub event: EnrichedEvent,
    /// Non-fatal lookup failures, in lookup order.
    pub errors: Vec<GatewayError>,
}

/// Resolves users, buttons and session states for raw events.
#[derive(Clone)]
pub struct Enricher {
    users: SharedUserService,
    sessions: SharedSessionStore,
    buttons: SharedButtonStore,
}

impl Enricher {
    pub fn new(
        users: SharedUserService,
        sessions: SharedSessionStore,
        buttons: SharedButtonStore,
    ) -> Self {
        Self {
            users,
            sessions,
            buttons,
        }
    }

    /// Enriches one event.
    ///
    /// Fails only when the event has no sender; every other failure leaves the
    /// corresponding field at its fallback and is returned in
    /// [`Enrichment::errors`].
    pub async fn enrich(&self, raw: RawEvent) -> GatewayResult<Enrichment> {
        let Some(identity) = raw.sender().cloned() else {
            return Err(GatewayError::IdentityUndeterminable {
                update_id: raw.update_id,
                kind: raw.kind_name(),
            });
        };

        let mut errors = Vec::new();

        let user = match self.users.upsert(&identity).await {
            Ok(user) => user,
            Err(source) => {
                errors.push(GatewayError::EnrichmentLookupFailed {
                    lookup: Lookup::User,
                    source,
                });
                User::from_identity(&identity)
            }
        };

        let button = match raw.button_id() {
            Some(id) => match self.buttons.find_by_id(id).await {
                Ok(button) => Some(button),
                Err(source) => {
                    errors.push(GatewayError::EnrichmentLookupFailed {
                        lookup: Lookup::Button,
                        source,
                    });
                    None
                }
            },
            None => None,
        };

        let session = match self.sessions.find_by_user(user.id).await {
            Ok(session) => session,
            Err(source) => {
                errors.push(GatewayError::EnrichmentLookupFailed {
                    lookup: Lookup::Session,
                    source,
                });
                None
            }
        };

        trace!(
            update_id = raw.update_id,
            user_id = user.id,
            button = button.as_ref().map(|b| b.action.as_str()),
            session = session.as_ref().map(|s| s.action.as_str()),
            "Event enriched"
        );
        if !errors.is_empty() {
            debug!(
                update_id = raw.update_id,
                failed = errors.len(),
                "Enrichment lookups failed"
            );
        }

        let event = EnrichedEvent::new(raw, user)
            .with_button(button)
            .with_session(session);
        Ok(Enrichment { event, errors })
    }
}

impl fmt::Debug for Enricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enricher").finish_non_exhaustive()
    }
}
