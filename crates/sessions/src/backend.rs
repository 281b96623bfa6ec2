//! `SessionBackend`: the pluggable storage contract behind the Session
//! Store (§4.1). Every operation takes a cancellation token; on cancel the
//! backend must abort the in-flight request rather than complete it after
//! the caller has stopped waiting (§5).

use async_trait::async_trait;
use headlessd_common::ids::Id;
use tokio_util::sync::CancellationToken;

use crate::{
    error::Result,
    model::{NewSession, Session, SessionPatch},
};

#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn create(&self, data: NewSession, cancel: &CancellationToken) -> Result<Id>;
    /// Upserts a full record by its own `id`, overwriting whatever is
    /// already stored under that id. Unlike `create`, this never mints a
    /// new `Id` — it is how replication, migration, and backup restore
    /// copy a record between backends without losing the identity the
    /// primary (or the original store) assigned it (§4.2).
    async fn put(&self, session: Session, cancel: &CancellationToken) -> Result<()>;
    async fn get(&self, id: Id, cancel: &CancellationToken) -> Result<Option<Session>>;
    async fn update(
        &self,
        id: Id,
        patch: SessionPatch,
        cancel: &CancellationToken,
    ) -> Result<Option<Session>>;
    async fn delete(&self, id: Id, cancel: &CancellationToken) -> Result<bool>;
    async fn touch(&self, id: Id, cancel: &CancellationToken) -> Result<bool>;
    async fn list_by_user(&self, user_id: &str, cancel: &CancellationToken)
    -> Result<Vec<Session>>;
    async fn exists(&self, id: Id, cancel: &CancellationToken) -> Result<bool>;
    /// Admin-only: drop every record. Used by tests and by the migration
    /// path when cutting a backend over.
    async fn clear(&self, cancel: &CancellationToken) -> Result<()>;

    /// Total, active (non-expired), and expired-but-not-yet-reaped record
    /// counts, for the monitor's store totals (§4.2).
    async fn counts(&self, cancel: &CancellationToken) -> Result<StoreCounts>;

    /// Every live record, for migration batch-copy and replica reconcile
    /// (§4.2). Not in the original operation table but required by both.
    async fn list_all(&self, cancel: &CancellationToken) -> Result<Vec<Session>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreCounts {
    pub total: u64,
    pub active: u64,
    pub expired: u64,
}
