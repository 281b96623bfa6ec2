//! External KV `SessionBackend`, keyed as described in §4.1:
//!
//! - `session:{id}`       → serialized record, `EX` = remaining lifetime.
//! - `user_sessions:{id}` → set of session ids, `EX` slightly past the
//!   longest-lived member so the index never outlives every session it
//!   points at but also never expires mid-write.
//!
//! Writes that touch both keys go through a single pipeline so the set
//! and the record can't observably diverge (§4.1 "performed as a single
//! multi-operation").

use chrono::Utc;
use headlessd_common::ids::Id;
use redis::{AsyncCommands, aio::ConnectionManager};
use tokio_util::sync::CancellationToken;

use crate::{
    backend::{SessionBackend, StoreCounts},
    error::{Error, Result},
    model::{NewSession, Session, SessionPatch},
};

/// Extra headroom given to the `user_sessions` index TTL over its longest
/// member, so a session touched right before its sibling's TTL fires
/// doesn't momentarily vanish from its own user's index.
const USER_INDEX_TTL_SLACK_SECS: i64 = 30;

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::backend("cancelled")),
        result = fut => result,
    }
}

pub struct RedisBackend {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisBackend {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url).map_err(Error::from)?;
        let conn = client.get_connection_manager().await.map_err(Error::from)?;
        Ok(Self {
            conn,
            prefix: prefix.into(),
        })
    }

    /// Used by the factory's startup probe: a cheap round-trip that
    /// doesn't touch any real keys.
    pub async fn probe(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn session_key(&self, id: Id) -> String {
        format!("{}session:{id}", self.prefix)
    }

    fn user_key(&self, user_id: &str) -> String {
        format!("{}user_sessions:{user_id}", self.prefix)
    }

    fn ttl_secs(session: &Session) -> i64 {
        (session.expires_at - Utc::now()).num_seconds().max(1)
    }

    async fn write(&self, session: &Session) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(session).map_err(|e| Error::backend(e))?;
        let ttl = Self::ttl_secs(session);
        let _: () = redis::pipe()
            .atomic()
            .set_ex(self.session_key(session.id), payload, ttl as u64)
            .sadd(self.user_key(&session.user_id), session.id.to_string())
            .expire(
                self.user_key(&session.user_id),
                ttl + USER_INDEX_TTL_SLACK_SECS,
            )
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn read(&self, id: Id) -> Result<Option<Session>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.session_key(id)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let session: Session = serde_json::from_str(&raw).map_err(|e| Error::backend(e))?;
        if session.is_expired(Utc::now()) {
            // Redis TTL is authoritative; this only guards the race
            // between expiry and a read that lands in the same instant.
            self.forget(&session).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn forget(&self, session: &Session) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .del(self.session_key(session.id))
            .srem(self.user_key(&session.user_id), session.id.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionBackend for RedisBackend {
    async fn create(&self, data: NewSession, cancel: &CancellationToken) -> Result<Id> {
        let session = Session::new(data)?;
        let id = session.id;
        cancellable(cancel, async { self.write(&session).await }).await?;
        Ok(id)
    }

    async fn put(&self, session: Session, cancel: &CancellationToken) -> Result<()> {
        cancellable(cancel, async { self.write(&session).await }).await
    }

    async fn get(&self, id: Id, cancel: &CancellationToken) -> Result<Option<Session>> {
        cancellable(cancel, self.read(id)).await
    }

    async fn update(
        &self,
        id: Id,
        patch: SessionPatch,
        cancel: &CancellationToken,
    ) -> Result<Option<Session>> {
        cancellable(cancel, async {
            let Some(mut session) = self.read(id).await? else {
                return Ok(None);
            };
            session.apply_patch(patch)?;
            self.write(&session).await?;
            Ok(Some(session))
        })
        .await
    }

    async fn delete(&self, id: Id, cancel: &CancellationToken) -> Result<bool> {
        cancellable(cancel, async {
            let mut conn = self.conn.clone();
            // Need the owning user_id to clean the index; a dangling
            // record (index already gone) still counts as a delete.
            let raw: Option<String> = conn.get(self.session_key(id)).await?;
            let Some(raw) = raw else {
                return Ok(false);
            };
            let session: Session = serde_json::from_str(&raw).map_err(|e| Error::backend(e))?;
            self.forget(&session).await?;
            Ok(true)
        })
        .await
    }

    async fn touch(&self, id: Id, cancel: &CancellationToken) -> Result<bool> {
        cancellable(cancel, async {
            let Some(mut session) = self.read(id).await? else {
                return Ok(false);
            };
            session.touch(Utc::now());
            self.write(&session).await?;
            Ok(true)
        })
        .await
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Session>> {
        cancellable(cancel, async {
            let mut conn = self.conn.clone();
            let ids: Vec<String> = conn.smembers(self.user_key(user_id)).await?;
            let mut sessions = Vec::with_capacity(ids.len());
            for raw_id in ids {
                let Ok(id) = raw_id.parse::<Id>() else {
                    continue;
                };
                if let Some(session) = self.read(id).await? {
                    sessions.push(session);
                }
            }
            Ok(sessions)
        })
        .await
    }

    async fn exists(&self, id: Id, cancel: &CancellationToken) -> Result<bool> {
        cancellable(cancel, async { Ok(self.read(id).await?.is_some()) }).await
    }

    async fn clear(&self, cancel: &CancellationToken) -> Result<()> {
        cancellable(cancel, async {
            let mut conn = self.conn.clone();
            let pattern = format!("{}*", self.prefix);
            let keys: Vec<String> = conn.keys(pattern).await?;
            if !keys.is_empty() {
                let _: () = conn.del(keys).await?;
            }
            Ok(())
        })
        .await
    }

    async fn list_all(&self, cancel: &CancellationToken) -> Result<Vec<Session>> {
        cancellable(cancel, async {
            let mut conn = self.conn.clone();
            let pattern = format!("{}session:*", self.prefix);
            let keys: Vec<String> = conn.keys(pattern).await?;
            let mut sessions = Vec::with_capacity(keys.len());
            for key in keys {
                let raw: Option<String> = conn.get(&key).await?;
                if let Some(raw) = raw {
                    if let Ok(session) = serde_json::from_str::<Session>(&raw) {
                        if !session.is_expired(Utc::now()) {
                            sessions.push(session);
                        }
                    }
                }
            }
            Ok(sessions)
        })
        .await
    }

    async fn counts(&self, cancel: &CancellationToken) -> Result<StoreCounts> {
        cancellable(cancel, async {
            let mut conn = self.conn.clone();
            let pattern = format!("{}session:*", self.prefix);
            let keys: Vec<String> = conn.keys(pattern).await?;
            // Every key that still exists survived its TTL check, so a
            // KV-backed store has no separately tracked "expired" bucket
            // the way the in-memory one does.
            Ok(StoreCounts {
                total: keys.len() as u64,
                active: keys.len() as u64,
                expired: 0,
            })
        })
        .await
    }
}
