//! `Session` and `Context` domain records (§3).

use chrono::{DateTime, Utc};
use headlessd_common::ids::Id;
use headlessd_protocol::session::{ContextRecord, ContextStatus as WireContextStatus, SessionRecord};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identity + authorization snapshot with TTL.
///
/// Invariant: `created_at <= last_accessed_at <= expires_at`. Constructors
/// and `touch` preserve it; nothing else is allowed to mutate the
/// timestamps directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Id,
    pub user_id: String,
    pub username: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Fields accepted on `create`; `id`/`created_at`/`last_accessed_at` are
/// assigned by the store, never taken from the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSession {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Whitelisted patch fields for `update`. Never merge an arbitrary JSON
/// blob into the stored record — that is how prototype-pollution-class
/// bugs happen in dynamically typed ports of this system (§9).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionPatch {
    pub roles: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Session {
    pub fn new(data: NewSession) -> Result<Self> {
        if data.user_id.trim().is_empty() {
            return Err(Error::invalid("userId must not be empty"));
        }
        let now = Utc::now();
        if data.expires_at <= now {
            return Err(Error::invalid("expiresAt must be in the future"));
        }
        Ok(Self {
            id: Id::new(),
            user_id: data.user_id,
            username: data.username,
            roles: data.roles,
            created_at: now,
            expires_at: data.expires_at,
            last_accessed_at: now,
            metadata: data.metadata,
        })
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Renews `last_accessed_at`. Never extends `expires_at` — that is an
    /// explicit refresh path (§3 Lifecycle), not an implicit side effect
    /// of reading the session.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = now.max(self.created_at);
    }

    pub fn apply_patch(&mut self, patch: SessionPatch) -> Result<()> {
        if let Some(expires_at) = patch.expires_at {
            if expires_at <= self.created_at {
                return Err(Error::invalid("expiresAt must be after createdAt"));
            }
            self.expires_at = expires_at;
        }
        if let Some(roles) = patch.roles {
            self.roles = roles;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        Ok(())
    }

    #[must_use]
    pub fn to_wire(&self) -> SessionRecord {
        SessionRecord {
            id: self.id.to_string(),
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            roles: self.roles.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            last_accessed_at: self.last_accessed_at,
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    Active,
    Closed,
}

/// Isolated workspace owned by exactly one session (§3). `user_id` is
/// copied from the owning session at create time and never diverges from
/// it — the invariant is enforced by `ContextStore::create` taking the
/// session, not a bare `user_id` string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub id: Id,
    pub session_id: Id,
    pub user_id: String,
    pub name: String,
    pub r#type: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub status: ContextStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Context {
    #[must_use]
    pub fn to_wire(&self) -> ContextRecord {
        ContextRecord {
            id: self.id.to_string(),
            session_id: self.session_id.to_string(),
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            r#type: self.r#type.clone(),
            config: self.config.clone(),
            metadata: self.metadata.clone(),
            status: match self.status {
                ContextStatus::Active => WireContextStatus::Active,
                ContextStatus::Closed => WireContextStatus::Closed,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
