//! Context Store (CS, §3/§4): context records and ownership bookkeeping.
//! Kept in-process — unlike the Session Store, the spec gives Contexts no
//! pluggable-backend requirement, and a context's lifetime is already
//! bounded by its owning session's (§3 Lifecycle: "destroyed ... on
//! owning session termination"), so there is no durability gap to paper
//! over with an external store.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use headlessd_common::ids::Id;
use headlessd_metrics::{context as context_metrics, counter, gauge};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{
    error::{Error, Result},
    model::{Context, ContextStatus},
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewContext {
    pub name: String,
    #[serde(default = "default_context_type")]
    pub r#type: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_context_type() -> String {
    "browser".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextPatch {
    pub name: Option<String>,
    pub config: Option<serde_json::Map<String, serde_json::Value>>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Default)]
struct State {
    contexts: HashMap<Id, Context>,
    by_session: HashMap<Id, HashSet<Id>>,
}

pub struct ContextStore {
    state: Mutex<State>,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub async fn create(&self, session_id: Id, user_id: &str, spec: NewContext) -> Result<Context> {
        if spec.name.trim().is_empty() {
            return Err(Error::invalid("context name must not be empty"));
        }
        let now = Utc::now();
        let context = Context {
            id: Id::new(),
            session_id,
            user_id: user_id.to_string(),
            name: spec.name,
            r#type: spec.r#type,
            config: spec.config,
            metadata: spec.metadata,
            status: ContextStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.lock().await;
        state
            .by_session
            .entry(session_id)
            .or_default()
            .insert(context.id);
        state.contexts.insert(context.id, context.clone());
        counter!(context_metrics::CREATED_TOTAL).increment(1);
        gauge!(context_metrics::ACTIVE).set(state.contexts.len() as f64);
        Ok(context)
    }

    pub async fn get(&self, id: Id) -> Option<Context> {
        self.state.lock().await.contexts.get(&id).cloned()
    }

    pub async fn list_by_session(&self, session_id: Id) -> Vec<Context> {
        let state = self.state.lock().await;
        state
            .by_session
            .get(&session_id)
            .into_iter()
            .flat_map(|set| set.iter())
            .filter_map(|id| state.contexts.get(id).cloned())
            .collect()
    }

    /// `update`/`delete` are restricted to the owner or an admin at the
    /// core layer, which holds the `AuthContext`; this store only
    /// enforces the structural invariant that a closed context can't be
    /// mutated back to active implicitly.
    pub async fn update(&self, id: Id, patch: ContextPatch) -> Result<Option<Context>> {
        let mut state = self.state.lock().await;
        let Some(context) = state.contexts.get_mut(&id) else {
            return Ok(None);
        };
        if context.status == ContextStatus::Closed {
            return Err(Error::invalid("context is closed"));
        }
        if let Some(name) = patch.name {
            context.name = name;
        }
        if let Some(config) = patch.config {
            context.config = config;
        }
        if let Some(metadata) = patch.metadata {
            context.metadata = metadata;
        }
        context.updated_at = Utc::now();
        Ok(Some(context.clone()))
    }

    pub async fn close(&self, id: Id) -> Option<Context> {
        let mut state = self.state.lock().await;
        let context = state.contexts.get_mut(&id)?;
        context.status = ContextStatus::Closed;
        context.updated_at = Utc::now();
        Some(context.clone())
    }

    pub async fn delete(&self, id: Id) -> bool {
        let mut state = self.state.lock().await;
        let Some(context) = state.contexts.remove(&id) else {
            return false;
        };
        if let Some(set) = state.by_session.get_mut(&context.session_id) {
            set.remove(&id);
        }
        counter!(context_metrics::DELETED_TOTAL).increment(1);
        gauge!(context_metrics::ACTIVE).set(state.contexts.len() as f64);
        true
    }

    /// Cascading delete invoked when the owning session is terminated.
    pub async fn delete_by_session(&self, session_id: Id) -> Vec<Id> {
        let mut state = self.state.lock().await;
        let ids: Vec<Id> = state
            .by_session
            .remove(&session_id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for id in &ids {
            state.contexts.remove(id);
        }
        if !ids.is_empty() {
            counter!(context_metrics::DELETED_TOTAL).increment(ids.len() as u64);
            gauge!(context_metrics::ACTIVE).set(state.contexts.len() as f64);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_context_rejects_update() {
        let store = ContextStore::new();
        let session_id = Id::new();
        let context = store
            .create(
                session_id,
                "u1",
                NewContext {
                    name: "c1".into(),
                    r#type: "browser".into(),
                    config: serde_json::Map::new(),
                    metadata: serde_json::Map::new(),
                },
            )
            .await
            .unwrap();
        store.close(context.id).await;
        let result = store
            .update(
                context.id,
                ContextPatch {
                    name: Some("renamed".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn session_termination_cascades_to_contexts() {
        let store = ContextStore::new();
        let session_id = Id::new();
        let context = store
            .create(
                session_id,
                "u1",
                NewContext {
                    name: "c1".into(),
                    r#type: "browser".into(),
                    config: serde_json::Map::new(),
                    metadata: serde_json::Map::new(),
                },
            )
            .await
            .unwrap();
        let removed = store.delete_by_session(session_id).await;
        assert_eq!(removed, vec![context.id]);
        assert!(store.get(context.id).await.is_none());
    }
}
