//! In-memory collaborators.
//!
//! Process-local implementations of the store contracts, used by demos and
//! tests. Nothing survives a restart.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tally_core::{
    ButtonRef, ButtonStore, Identity, SessionState, SessionStore, StoreError, StoreResult, User,
    UserService,
};
use tokio::time::Instant;
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// Users
// ============================================================================

/// Users keyed by platform id.
#[derive(Debug, Default)]
pub struct MemoryUserService {
    users: RwLock<HashMap<i64, User>>,
    default_language: Option<String>,
}

impl MemoryUserService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `language` to users whose client reports none.
    pub fn with_default_language(language: impl Into<String>) -> Self {
        Self {
            users: RwLock::default(),
            default_language: Some(language.into()).filter(|l| !l.is_empty()),
        }
    }
}

#[async_trait]
impl UserService for MemoryUserService {
    async fn upsert(&self, identity: &Identity) -> StoreResult<User> {
        let mut users = self.users.write();
        let user = users
            .entry(identity.id)
            .and_modify(|user| {
                user.username = identity.username.clone();
                user.display_name = identity.display_name();
                if user.language.is_none() {
                    user.language = identity.language_code.clone();
                }
            })
            .or_insert_with(|| User::from_identity(identity));
        if user.language.is_none() {
            user.language = self.default_language.clone();
        }
        Ok(user.clone())
    }

    async fn find(&self, user_id: i64) -> StoreResult<Option<User>> {
        Ok(self.users.read().get(&user_id).cloned())
    }

    async fn save(&self, user: User) -> StoreResult<User> {
        self.users.write().insert(user.id, user.clone());
        Ok(user)
    }
}

// ============================================================================
// Session States
// ============================================================================

/// Session states keyed by id, at most one per user.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    states: RwLock<HashMap<String, SessionState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, mut state: SessionState) -> StoreResult<SessionState> {
        if state.id.is_empty() {
            state.id = new_id();
        }
        let mut states = self.states.write();
        states.retain(|id, s| s.user_id != state.user_id || *id == state.id);
        states.insert(state.id.clone(), state.clone());
        Ok(state)
    }

    async fn find_by_user(&self, user_id: i64) -> StoreResult<Option<SessionState>> {
        Ok(self
            .states
            .read()
            .values()
            .find(|s| s.user_id == user_id)
            .cloned())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.states
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("session state", id))
    }

    async fn clean(&self, user_id: i64) -> StoreResult<()> {
        self.states.write().retain(|_, s| s.user_id != user_id);
        Ok(())
    }
}

// ============================================================================
// Buttons
// ============================================================================

/// How long a button stays resolvable by default.
pub const DEFAULT_BUTTON_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Most buttons kept by default; the oldest are evicted first.
pub const DEFAULT_BUTTON_CAPACITY: usize = 100_000;

#[derive(Debug, Default)]
struct ButtonTable {
    by_id: HashMap<String, StoredButton>,
    // Insertion order; an id saved twice appears twice and only the entry
    // with the matching `seq` owns the map slot.
    order: VecDeque<(u64, String)>,
    next_seq: u64,
}

#[derive(Debug)]
struct StoredButton {
    seq: u64,
    saved_at: Instant,
    button: ButtonRef,
}

impl ButtonTable {
    fn insert(&mut self, button: ButtonRef, now: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.push_back((seq, button.id.clone()));
        self.by_id.insert(
            button.id.clone(),
            StoredButton {
                seq,
                saved_at: now,
                button,
            },
        );
    }

    /// Drops expired buttons, then the oldest ones above `capacity`.
    fn prune(&mut self, now: Instant, ttl: Duration, capacity: usize) {
        while let Some((seq, id)) = self.order.pop_front() {
            let Some(stored) = self.by_id.get(&id).filter(|stored| stored.seq == seq) else {
                continue;
            };
            let expired = now.saturating_duration_since(stored.saved_at) >= ttl;
            if !expired && self.by_id.len() <= capacity {
                self.order.push_front((seq, id));
                break;
            }
            self.by_id.remove(&id);
        }
    }
}

/// Button references keyed by id.
///
/// Buttons are short-lived: each one expires after a TTL, and once the store
/// holds more than its capacity the oldest are evicted. Both limits are
/// applied on every save.
#[derive(Debug)]
pub struct MemoryButtonStore {
    table: RwLock<ButtonTable>,
    ttl: Duration,
    capacity: usize,
}

impl Default for MemoryButtonStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryButtonStore {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_BUTTON_TTL, DEFAULT_BUTTON_CAPACITY)
    }

    /// A store whose buttons expire after `ttl`, keeping at most `capacity`.
    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            table: RwLock::new(ButtonTable::default()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().by_id.is_empty()
    }
}

#[async_trait]
impl ButtonStore for MemoryButtonStore {
    async fn save(&self, button: ButtonRef) -> StoreResult<ButtonRef> {
        let mut saved = self.save_all(vec![button]).await?;
        saved
            .pop()
            .ok_or_else(|| StoreError::backend("button was not stored"))
    }

    async fn save_all(&self, buttons: Vec<ButtonRef>) -> StoreResult<Vec<ButtonRef>> {
        let now = Instant::now();
        let mut table = self.table.write();
        let saved: Vec<ButtonRef> = buttons
            .into_iter()
            .map(|mut button| {
                if button.id.is_empty() {
                    button.id = new_id();
                }
                table.insert(button.clone(), now);
                button
            })
            .collect();
        table.prune(now, self.ttl, self.capacity);
        Ok(saved)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<ButtonRef> {
        let now = Instant::now();
        self.table
            .read()
            .by_id
            .get(id)
            .filter(|stored| now.saturating_duration_since(stored.saved_at) < self.ttl)
            .map(|stored| stored.button.clone())
            .ok_or_else(|| StoreError::not_found("button", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::block_on;

    #[test]
    fn test_upsert_refreshes_names() {
        let service = MemoryUserService::new();
        let mut identity = Identity::new(1, "Ann");
        identity.language_code = Some("en".into());

        let created = block_on(service.upsert(&identity)).unwrap();
        assert_eq!(created.display_name, "Ann");

        let mut stored = created.clone();
        stored.profile = json!({"birth_date": "1990-01-01"});
        block_on(service.save(stored)).unwrap();

        identity.last_name = Some("Lee".into());
        let refreshed = block_on(service.upsert(&identity)).unwrap();
        assert_eq!(refreshed.display_name, "Ann Lee");
        assert!(refreshed.profile_field("birth_date").is_some());
    }

    #[test]
    fn test_default_language_fills_gaps() {
        let service = MemoryUserService::with_default_language("de");

        let silent = block_on(service.upsert(&Identity::new(1, "Ann"))).unwrap();
        assert_eq!(silent.language.as_deref(), Some("de"));

        let mut reporting = Identity::new(2, "Bob");
        reporting.language_code = Some("fr".into());
        let reported = block_on(service.upsert(&reporting)).unwrap();
        assert_eq!(reported.language.as_deref(), Some("fr"));

        let plain = MemoryUserService::new();
        assert!(block_on(plain.upsert(&Identity::new(3, "Cy"))).unwrap().language.is_none());
    }

    #[test]
    fn test_one_session_per_user() {
        let store = MemorySessionStore::new();
        let first = block_on(store.save(SessionState::new(1, "a"))).unwrap();
        block_on(store.save(SessionState::new(2, "other"))).unwrap();
        let second = block_on(store.save(SessionState::new(1, "b"))).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.len(), 2);
        let found = block_on(store.find_by_user(1)).unwrap().unwrap();
        assert_eq!(found.action.as_str(), "b");

        block_on(store.delete(&second.id)).unwrap();
        assert!(block_on(store.find_by_user(1)).unwrap().is_none());
        assert!(block_on(store.delete(&second.id)).is_err());

        block_on(store.clean(2)).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_buttons_get_ids() {
        let store = MemoryButtonStore::new();
        let saved = block_on(store.save_all(vec![
            ButtonRef::new("yes"),
            ButtonRef::new("no").with_payload(json!(0)),
        ]))
        .unwrap();

        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|b| !b.id.is_empty()));
        let no = block_on(store.find_by_id(&saved[1].id)).unwrap();
        assert_eq!(no.action.as_str(), "no");
        assert!(matches!(
            block_on(store.find_by_id("missing")),
            Err(StoreError::NotFound { entity: "button", .. })
        ));
    }

    #[test]
    fn test_buttons_evicted_over_capacity() {
        let store = MemoryButtonStore::with_limits(DEFAULT_BUTTON_TTL, 3);
        let saved: Vec<ButtonRef> = (0..10)
            .map(|i| block_on(store.save(ButtonRef::new("menu").with_payload(json!(i)))).unwrap())
            .collect();

        assert_eq!(store.len(), 3);
        assert!(block_on(store.find_by_id(&saved[0].id)).is_err());
        assert!(block_on(store.find_by_id(&saved[6].id)).is_err());
        let newest = block_on(store.find_by_id(&saved[9].id)).unwrap();
        assert_eq!(newest.payload, json!(9));
    }

    #[test]
    fn test_resaving_keeps_newest_entry() {
        let store = MemoryButtonStore::with_limits(DEFAULT_BUTTON_TTL, 2);
        let kept = block_on(store.save(ButtonRef::new("keep"))).unwrap();
        block_on(store.save(ButtonRef::new("other"))).unwrap();
        block_on(store.save(kept.clone())).unwrap();
        block_on(store.save(ButtonRef::new("third"))).unwrap();

        assert_eq!(store.len(), 2);
        assert!(block_on(store.find_by_id(&kept.id)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_buttons_expire() {
        let store = MemoryButtonStore::with_limits(Duration::from_secs(60), 1_000);
        let old = store.save(ButtonRef::new("old")).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.find_by_id(&old.id).await.is_err());

        let fresh = store.save(ButtonRef::new("fresh")).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.find_by_id(&fresh.id).await.is_ok());
    }
}
