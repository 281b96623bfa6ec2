//! In-process map backend: the dev/test/fallback `SessionBackend` (§4.1).
//!
//! A single mutex guards both the record map and the per-user secondary
//! index so the two never drift apart; it is never held across an await
//! point other than acquiring it (§5).

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use headlessd_common::ids::Id;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    backend::{SessionBackend, StoreCounts},
    error::Result,
    model::{NewSession, Session, SessionPatch},
};

#[derive(Default)]
struct State {
    sessions: HashMap<Id, Session>,
    by_user: HashMap<String, HashSet<Id>>,
}

impl State {
    fn unlink(&mut self, session: &Session) {
        if let Some(set) = self.by_user.get_mut(&session.user_id) {
            set.remove(&session.id);
            if set.is_empty() {
                self.by_user.remove(&session.user_id);
            }
        }
    }

    /// Lazily evicts an expired record; returns `None` for both "absent"
    /// and "expired" so callers can't tell the difference (§4.1 expiry
    /// semantics).
    fn get_live(&mut self, id: Id) -> Option<Session> {
        let session = self.sessions.get(&id)?;
        if session.is_expired(Utc::now()) {
            let session = self.sessions.remove(&id).expect("just matched");
            self.unlink(&session);
            return None;
        }
        Some(session.clone())
    }
}

pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }
}

#[async_trait]
impl SessionBackend for InMemoryBackend {
    async fn create(&self, data: NewSession, _cancel: &CancellationToken) -> Result<Id> {
        let session = Session::new(data)?;
        let id = session.id;
        let mut state = self.state.lock().await;
        state
            .by_user
            .entry(session.user_id.clone())
            .or_default()
            .insert(id);
        state.sessions.insert(id, session);
        Ok(id)
    }

    async fn put(&self, session: Session, _cancel: &CancellationToken) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(previous) = state.sessions.get(&session.id) {
            if previous.user_id != session.user_id {
                let previous = previous.clone();
                state.unlink(&previous);
            }
        }
        state
            .by_user
            .entry(session.user_id.clone())
            .or_default()
            .insert(session.id);
        state.sessions.insert(session.id, session);
        Ok(())
    }

    async fn get(&self, id: Id, _cancel: &CancellationToken) -> Result<Option<Session>> {
        Ok(self.state.lock().await.get_live(id))
    }

    async fn update(
        &self,
        id: Id,
        patch: SessionPatch,
        _cancel: &CancellationToken,
    ) -> Result<Option<Session>> {
        let mut state = self.state.lock().await;
        if state.get_live(id).is_none() {
            return Ok(None);
        }
        let session = state.sessions.get_mut(&id).expect("checked live above");
        session.apply_patch(patch)?;
        Ok(Some(session.clone()))
    }

    async fn delete(&self, id: Id, _cancel: &CancellationToken) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.remove(&id) else {
            return Ok(false);
        };
        state.unlink(&session);
        Ok(true)
    }

    async fn touch(&self, id: Id, _cancel: &CancellationToken) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.get_live(id).is_none() {
            return Ok(false);
        }
        let now = Utc::now();
        state
            .sessions
            .get_mut(&id)
            .expect("checked live above")
            .touch(now);
        Ok(true)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Session>> {
        let mut state = self.state.lock().await;
        let ids: Vec<Id> = state
            .by_user
            .get(user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        Ok(ids.into_iter().filter_map(|id| state.get_live(id)).collect())
    }

    async fn exists(&self, id: Id, _cancel: &CancellationToken) -> Result<bool> {
        Ok(self.state.lock().await.get_live(id).is_some())
    }

    async fn clear(&self, _cancel: &CancellationToken) -> Result<()> {
        let mut state = self.state.lock().await;
        state.sessions.clear();
        state.by_user.clear();
        Ok(())
    }

    async fn list_all(&self, _cancel: &CancellationToken) -> Result<Vec<Session>> {
        let mut state = self.state.lock().await;
        let ids: Vec<Id> = state.sessions.keys().copied().collect();
        Ok(ids.into_iter().filter_map(|id| state.get_live(id)).collect())
    }

    async fn counts(&self, _cancel: &CancellationToken) -> Result<StoreCounts> {
        let state = self.state.lock().await;
        let now = Utc::now();
        let (mut active, mut expired) = (0u64, 0u64);
        for session in state.sessions.values() {
            if session.is_expired(now) {
                expired += 1;
            } else {
                active += 1;
            }
        }
        Ok(StoreCounts {
            total: state.sessions.len() as u64,
            active,
            expired,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_session(user_id: &str, ttl_ms: i64) -> NewSession {
        NewSession {
            user_id: user_id.to_string(),
            username: "alice".into(),
            roles: vec!["user".into()],
            expires_at: Utc::now() + Duration::milliseconds(ttl_ms),
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();
        let id = backend.create(new_session("u1", 60_000), &cancel).await.unwrap();
        let session = backend.get(id, &cancel).await.unwrap().unwrap();
        assert_eq!(session.user_id, "u1");
    }

    #[tokio::test]
    async fn expired_session_reads_as_absent_and_unlinked() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();
        let id = backend.create(new_session("u1", 10), &cancel).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(backend.get(id, &cancel).await.unwrap().is_none());
        assert!(backend.list_by_user("u1", &cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn double_delete_is_idempotent() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();
        let id = backend.create(new_session("u1", 60_000), &cancel).await.unwrap();
        assert!(backend.delete(id, &cancel).await.unwrap());
        assert!(!backend.delete(id, &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn touch_does_not_extend_expiry() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();
        let id = backend.create(new_session("u1", 60_000), &cancel).await.unwrap();
        let before = backend.get(id, &cancel).await.unwrap().unwrap().expires_at;
        backend.touch(id, &cancel).await.unwrap();
        let after = backend.get(id, &cancel).await.unwrap().unwrap().expires_at;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn put_preserves_id_and_is_visible_under_it() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();
        let mut session = Session::new(new_session("u1", 60_000)).unwrap();
        let id = session.id;
        session.username = "replicated-alice".into();
        backend.put(session, &cancel).await.unwrap();

        let fetched = backend.get(id, &cancel).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.username, "replicated-alice");
        assert_eq!(backend.list_by_user("u1", &cancel).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn put_moves_by_user_index_when_owner_changes() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();
        let mut session = Session::new(new_session("u1", 60_000)).unwrap();
        let id = session.id;
        backend.put(session.clone(), &cancel).await.unwrap();

        session.user_id = "u2".to_string();
        backend.put(session, &cancel).await.unwrap();

        assert!(backend.list_by_user("u1", &cancel).await.unwrap().is_empty());
        let by_new_owner = backend.list_by_user("u2", &cancel).await.unwrap();
        assert_eq!(by_new_owner.len(), 1);
        assert_eq!(by_new_owner[0].id, id);
    }
}
