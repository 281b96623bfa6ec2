//! Online migration between backends (§4.2): validate → pre-hook →
//! batch-copy → post-hook → stats. The source stays authoritative for the
//! whole run; nothing here flips which backend is "active" — that is the
//! factory's `switch_store_type`, invoked by the caller once it likes the
//! stats.

use std::time::Instant;

use async_trait::async_trait;
use headlessd_metrics::{counter, histogram, migration as migration_metrics};
use tokio_util::sync::CancellationToken;

use crate::{backend::SessionBackend, error::Result};

#[derive(Debug, Clone, Default)]
pub struct MigrationStats {
    pub total: u64,
    pub migrated: u64,
    pub failed: u64,
    pub skipped: u64,
    pub conflicts: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct MigrationConfig {
    pub batch_size: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

#[async_trait]
pub trait MigrationHooks: Send + Sync {
    async fn pre(&self) -> Result<()> {
        Ok(())
    }

    async fn post(&self, _stats: &MigrationStats) -> Result<()> {
        Ok(())
    }
}

pub struct NoopMigrationHooks;

impl MigrationHooks for NoopMigrationHooks {}

pub struct Migrator {
    config: MigrationConfig,
}

impl Migrator {
    #[must_use]
    pub fn new(config: MigrationConfig) -> Self {
        Self { config }
    }

    /// Copies every live record from `source` to `target`. A record that
    /// already exists on the target with the same or newer
    /// `last_accessed_at` is a conflict and is skipped, not overwritten.
    pub async fn migrate(
        &self,
        source: &dyn SessionBackend,
        target: &dyn SessionBackend,
        hooks: &dyn MigrationHooks,
    ) -> Result<MigrationStats> {
        let cancel = CancellationToken::new();
        hooks.pre().await?;

        let sessions = source.list_all(&cancel).await?;
        let mut stats = MigrationStats {
            total: sessions.len() as u64,
            ..Default::default()
        };

        let mut batch_start = Instant::now();
        for (index, session) in sessions.iter().enumerate() {
            match target.get(session.id, &cancel).await {
                Ok(Some(existing)) if existing.last_accessed_at >= session.last_accessed_at => {
                    stats.conflicts += 1;
                    stats.skipped += 1;
                    counter!(migration_metrics::SKIPPED_TOTAL).increment(1);
                },
                Ok(_) => {
                    // `put` preserves `session.id`, so the conflict check
                    // above (`target.get(session.id, ...)`) keeps working
                    // on a re-run instead of finding nothing and
                    // re-migrating every record under a fresh id.
                    match target.put(session.clone(), &cancel).await {
                        Ok(()) => {
                            stats.migrated += 1;
                            counter!(migration_metrics::MIGRATED_TOTAL).increment(1);
                        },
                        Err(err) => {
                            stats.failed += 1;
                            stats.errors.push(format!("{}: {err}", session.id));
                            counter!(migration_metrics::FAILED_TOTAL).increment(1);
                        },
                    }
                },
                Err(err) => {
                    stats.failed += 1;
                    stats.errors.push(format!("{}: {err}", session.id));
                    counter!(migration_metrics::FAILED_TOTAL).increment(1);
                },
            }

            let processed = index + 1;
            if self.config.batch_size > 0 && processed % self.config.batch_size == 0 {
                histogram!(migration_metrics::BATCH_DURATION_SECONDS)
                    .record(batch_start.elapsed().as_secs_f64());
                batch_start = Instant::now();
            }
            if self.config.batch_size > 0 && processed % (10 * self.config.batch_size) == 0 {
                tracing::info!(
                    processed,
                    total = stats.total,
                    migrated = stats.migrated,
                    failed = stats.failed,
                    "migration progress"
                );
            }
        }

        hooks.post(&stats).await?;
        Ok(stats)
    }
}
