//! Async replication to a replica set (§4.2).
//!
//! Every primary mutation is turned into a [`ReplicationOp`] and fanned out
//! to one bounded channel per replica. Each replica has its own serial
//! worker task, so ordering within a replica matches the primary's
//! mutation order even though replicas converge at different speeds (§5).
//! A replica that fails `max_retries` times in a row is marked inactive
//! and excluded from the fan-out until a probe succeeds again.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex as StdMutex,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Instant,
};

use chrono::Utc;
use headlessd_common::ids::Id;
use headlessd_metrics::{counter, gauge, histogram, labels, replication as replication_metrics};
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{backend::SessionBackend, model::Session};

const REPLICATION_CHANNEL_CAPACITY: usize = 1024;

/// How many recent per-op lags a replica keeps for its percentile estimate.
/// Bounded so a long-lived replica's memory footprint never grows.
const MAX_LAG_SAMPLES: usize = 500;

/// A probe "window" for the 3-consecutive-breach rule (OQ-2): every this
/// many applied ops, the replica's current p95 is checked against budget.
const LAG_WINDOW_OPS: u32 = 10;

/// Snapshot of a replica's replication-lag distribution (OQ-2, §4.2).
/// Replaces the single hand-computed `trending` enum with rolling
/// percentiles plus an explicit SLO verdict.
#[derive(Debug, Clone, Copy)]
pub struct ReplicaLagSnapshot {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub slo_met: bool,
    pub consecutive_breaches: u32,
}

#[derive(Debug, Clone)]
pub enum ReplicationOp {
    Create(Session),
    Update(Session),
    Delete(Id),
    Touch(Id),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    LastWriteWins,
    OldestWins,
    Manual,
}

#[derive(Debug, Clone, Copy)]
pub struct ReplicationConfig {
    pub conflict_resolution: ConflictResolution,
    pub sync_deletions: bool,
    pub sync_expired: bool,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// p95 replication-lag budget (milliseconds) a replica must stay under
    /// to be considered SLO-compliant (OQ-2).
    pub slo_p95_budget_ms: f64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            conflict_resolution: ConflictResolution::LastWriteWins,
            sync_deletions: true,
            sync_expired: false,
            max_retries: 5,
            retry_base_delay_ms: 100,
            slo_p95_budget_ms: 500.0,
        }
    }
}

/// Rolling lag histogram for one replica (OQ-2). Percentiles are computed
/// on demand from a bounded sample window rather than maintained
/// incrementally — `MAX_LAG_SAMPLES` keeps the sort cheap.
#[derive(Default)]
struct LagHistogram {
    samples: VecDeque<f64>,
    ops_since_window: u32,
    consecutive_breaches: u32,
}

impl LagHistogram {
    fn record(&mut self, lag_ms: f64, slo_p95_budget_ms: f64) {
        self.samples.push_back(lag_ms);
        if self.samples.len() > MAX_LAG_SAMPLES {
            self.samples.pop_front();
        }
        self.ops_since_window += 1;
        if self.ops_since_window >= LAG_WINDOW_OPS {
            self.ops_since_window = 0;
            let p95 = Self::percentile(&self.samples, 0.95);
            if p95 > slo_p95_budget_ms {
                self.consecutive_breaches += 1;
            } else {
                self.consecutive_breaches = 0;
            }
        }
    }

    fn percentile(samples: &VecDeque<f64>, p: f64) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let rank = ((sorted.len() - 1) as f64 * p).round() as usize;
        sorted[rank.min(sorted.len() - 1)]
    }

    fn snapshot(&self, slo_p95_budget_ms: f64) -> ReplicaLagSnapshot {
        let p95 = Self::percentile(&self.samples, 0.95);
        ReplicaLagSnapshot {
            p50_ms: Self::percentile(&self.samples, 0.50),
            p95_ms: p95,
            p99_ms: Self::percentile(&self.samples, 0.99),
            slo_met: p95 <= slo_p95_budget_ms,
            consecutive_breaches: self.consecutive_breaches,
        }
    }
}

/// A divergence `Manual` conflict resolution recorded instead of silently
/// overwriting either side.
#[derive(Debug, Clone)]
pub struct RecordedConflict {
    pub session_id: Id,
    pub primary_last_accessed: chrono::DateTime<Utc>,
    pub replica_last_accessed: chrono::DateTime<Utc>,
}

struct ReplicaHandle {
    name: String,
    backend: Arc<dyn SessionBackend>,
    tx: mpsc::Sender<(ReplicationOp, Instant)>,
    active: Arc<AtomicBool>,
    consecutive_failures: Arc<AtomicU32>,
    lag: Arc<StdMutex<LagHistogram>>,
}

pub struct Replicator {
    replicas: Vec<ReplicaHandle>,
    config: ReplicationConfig,
}

impl Replicator {
    #[must_use]
    pub fn new(config: ReplicationConfig) -> Self {
        Self {
            replicas: Vec::new(),
            config,
        }
    }

    /// Registers a replica and spawns its serial worker. Returns the
    /// worker's `JoinHandle` so the caller can await clean shutdown.
    pub fn add_replica(
        &mut self,
        name: impl Into<String>,
        backend: Arc<dyn SessionBackend>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let (tx, rx) = mpsc::channel(REPLICATION_CHANNEL_CAPACITY);
        let active = Arc::new(AtomicBool::new(true));
        let consecutive_failures = Arc::new(AtomicU32::new(0));
        let lag = Arc::new(StdMutex::new(LagHistogram::default()));
        let name = name.into();

        let handle = ReplicaHandle {
            name: name.clone(),
            backend: Arc::clone(&backend),
            tx,
            active: Arc::clone(&active),
            consecutive_failures: Arc::clone(&consecutive_failures),
            lag: Arc::clone(&lag),
        };
        self.replicas.push(handle);

        let config = self.config;
        tokio::spawn(Self::worker_loop(
            name,
            backend,
            rx,
            active,
            consecutive_failures,
            lag,
            config,
            cancel,
        ))
    }

    /// Fans `op` out to every currently-active replica. Never blocks the
    /// primary: a replica whose channel is full or inactive just misses
    /// this event (it will be reconciled at the next bulk sync).
    pub fn replicate(&self, op: ReplicationOp) {
        if matches!(op, ReplicationOp::Delete(_)) && !self.config.sync_deletions {
            return;
        }
        let enqueued_at = Instant::now();
        for replica in &self.replicas {
            if !replica.active.load(Ordering::Relaxed) {
                continue;
            }
            if replica.tx.try_send((op.clone(), enqueued_at)).is_err() {
                tracing::warn!(replica = %replica.name, "replication channel full or closed, dropping op");
            }
        }
    }

    #[must_use]
    pub fn active_replica_count(&self) -> usize {
        self.replicas
            .iter()
            .filter(|r| r.active.load(Ordering::Relaxed))
            .count()
    }

    /// Current replication-lag snapshot for a named replica (OQ-2).
    #[must_use]
    pub fn replica_health(&self, name: &str) -> Option<ReplicaLagSnapshot> {
        let replica = self.replicas.iter().find(|r| r.name == name)?;
        let histogram = replica.lag.lock().unwrap_or_else(|e| e.into_inner());
        Some(histogram.snapshot(self.config.slo_p95_budget_ms))
    }

    async fn worker_loop(
        name: String,
        backend: Arc<dyn SessionBackend>,
        mut rx: mpsc::Receiver<(ReplicationOp, Instant)>,
        active: Arc<AtomicBool>,
        consecutive_failures: Arc<AtomicU32>,
        lag: Arc<StdMutex<LagHistogram>>,
        config: ReplicationConfig,
        cancel: CancellationToken,
    ) {
        loop {
            let (op, enqueued_at) = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                op = rx.recv() => match op {
                    Some(op) => op,
                    None => return,
                },
            };

            if let ReplicationOp::Create(ref s) | ReplicationOp::Update(ref s) = op {
                if !config.sync_expired && s.is_expired(Utc::now()) {
                    continue;
                }
            }

            counter!(replication_metrics::OPS_TOTAL, labels::REPLICA => name.clone()).increment(1);

            match Self::apply_with_retry(&backend, &op, &config).await {
                Ok(()) => {
                    let lag_ms = enqueued_at.elapsed().as_secs_f64() * 1000.0;
                    lag.lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .record(lag_ms, config.slo_p95_budget_ms);
                    histogram!(replication_metrics::LAG_SECONDS, labels::REPLICA => name.clone())
                        .record(lag_ms / 1000.0);
                    consecutive_failures.store(0, Ordering::Relaxed);
                    if !active.load(Ordering::Relaxed) {
                        active.store(true, Ordering::Relaxed);
                        tracing::info!(replica = %name, "replica recovered, reactivated");
                        gauge!(replication_metrics::REPLICAS_INACTIVE).decrement(1.0);
                    }
                },
                Err(err) => {
                    counter!(replication_metrics::OPS_FAILED_TOTAL, labels::REPLICA => name.clone()).increment(1);
                    let failures = consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(replica = %name, error = %err, failures, "replication op failed");
                    if failures >= config.max_retries && active.swap(false, Ordering::Relaxed) {
                        tracing::error!(replica = %name, "replica marked inactive");
                        gauge!(replication_metrics::REPLICAS_INACTIVE).increment(1.0);
                    }
                },
            }
        }
    }

    async fn apply_with_retry(
        backend: &Arc<dyn SessionBackend>,
        op: &ReplicationOp,
        config: &ReplicationConfig,
    ) -> crate::error::Result<()> {
        let cancel = CancellationToken::new();
        let mut attempt = 0u32;
        loop {
            let result = Self::apply_once(backend, op, &cancel).await;
            if result.is_ok() || attempt >= config.max_retries {
                return result;
            }
            attempt += 1;
            let jitter_ms = rand::rng().random_range(0..config.retry_base_delay_ms.max(1));
            let backoff_ms = config.retry_base_delay_ms * 2u64.saturating_pow(attempt) + jitter_ms;
            tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
        }
    }

    async fn apply_once(
        backend: &Arc<dyn SessionBackend>,
        op: &ReplicationOp,
        cancel: &CancellationToken,
    ) -> crate::error::Result<()> {
        match op {
            ReplicationOp::Create(session) | ReplicationOp::Update(session) => {
                // `put` upserts by the primary's own id, so a replica that
                // never saw the `Create` still lands the record under the
                // same id the primary uses for every later `Update`,
                // `Touch`, and `Delete` (§4.2).
                backend.put(session.clone(), cancel).await
            },
            ReplicationOp::Delete(id) => {
                backend.delete(*id, cancel).await?;
                Ok(())
            },
            ReplicationOp::Touch(id) => {
                backend.touch(*id, cancel).await?;
                Ok(())
            },
        }
    }

    /// Bulk reconcile against a snapshot of the primary's sessions,
    /// applying the configured conflict resolution to any record that
    /// exists on both sides with a divergent `last_accessed_at`.
    pub async fn reconcile(
        &self,
        replica_name: &str,
        primary_sessions: &[Session],
    ) -> crate::error::Result<Vec<RecordedConflict>> {
        let Some(replica) = self.replicas.iter().find(|r| r.name == replica_name) else {
            return Ok(Vec::new());
        };
        let cancel = CancellationToken::new();
        let mut conflicts = Vec::new();

        for primary in primary_sessions {
            if !self.config.sync_expired && primary.is_expired(Utc::now()) {
                continue;
            }
            let existing = replica.backend.get(primary.id, &cancel).await?;
            match existing {
                None => {
                    replica.backend.put(primary.clone(), &cancel).await?;
                },
                Some(replica_session)
                    if replica_session.last_accessed_at != primary.last_accessed_at =>
                {
                    match self.config.conflict_resolution {
                        ConflictResolution::LastWriteWins => {
                            if primary.last_accessed_at >= replica_session.last_accessed_at {
                                Self::apply_once(
                                    &replica.backend,
                                    &ReplicationOp::Update(primary.clone()),
                                    &cancel,
                                )
                                .await?;
                            }
                        },
                        ConflictResolution::OldestWins => {
                            if primary.created_at <= replica_session.created_at {
                                Self::apply_once(
                                    &replica.backend,
                                    &ReplicationOp::Update(primary.clone()),
                                    &cancel,
                                )
                                .await?;
                            }
                        },
                        ConflictResolution::Manual => {
                            counter!(replication_metrics::CONFLICTS_TOTAL).increment(1);
                            conflicts.push(RecordedConflict {
                                session_id: primary.id,
                                primary_last_accessed: primary.last_accessed_at,
                                replica_last_accessed: replica_session.last_accessed_at,
                            });
                        },
                    }
                },
                Some(_) => {},
            }
        }
        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::InMemoryBackend, model::NewSession};

    fn new_session(user_id: &str) -> Session {
        Session::new(NewSession {
            user_id: user_id.to_string(),
            username: "alice".into(),
            roles: vec!["user".into()],
            expires_at: Utc::now() + chrono::Duration::minutes(5),
            metadata: serde_json::Map::new(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn apply_once_preserves_the_primary_id() {
        let replica: Arc<dyn SessionBackend> = Arc::new(InMemoryBackend::new());
        let cancel = CancellationToken::new();
        let session = new_session("u1");
        let id = session.id;

        Replicator::apply_once(&replica, &ReplicationOp::Create(session), &cancel)
            .await
            .unwrap();

        assert_eq!(replica.get(id, &cancel).await.unwrap().unwrap().id, id);
    }

    #[tokio::test]
    async fn apply_once_update_after_create_finds_the_same_record() {
        let replica: Arc<dyn SessionBackend> = Arc::new(InMemoryBackend::new());
        let cancel = CancellationToken::new();
        let mut session = new_session("u1");
        let id = session.id;

        Replicator::apply_once(&replica, &ReplicationOp::Create(session.clone()), &cancel)
            .await
            .unwrap();
        session.username = "renamed".into();
        Replicator::apply_once(&replica, &ReplicationOp::Update(session), &cancel)
            .await
            .unwrap();

        let stored = replica.get(id, &cancel).await.unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.username, "renamed");
    }

    #[tokio::test]
    async fn reconcile_copies_missing_record_under_the_primary_id() {
        let mut replicator = Replicator::new(ReplicationConfig::default());
        let backend: Arc<dyn SessionBackend> = Arc::new(InMemoryBackend::new());
        let cancel = CancellationToken::new();
        let _join = replicator.add_replica("r1", Arc::clone(&backend), cancel.clone());

        let primary_session = new_session("u1");
        let id = primary_session.id;
        let conflicts = replicator
            .reconcile("r1", std::slice::from_ref(&primary_session))
            .await
            .unwrap();

        assert!(conflicts.is_empty());
        assert_eq!(
            backend.get(id, &cancel).await.unwrap().unwrap().id,
            id,
            "reconcile must land the record under the primary's id so a later reconcile finds it"
        );
    }

    #[test]
    fn lag_histogram_reports_percentiles_and_slo() {
        let mut histogram = LagHistogram::default();
        for ms in [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0] {
            histogram.record(ms, 500.0);
        }
        let snapshot = histogram.snapshot(500.0);
        assert!(snapshot.slo_met);
        assert!(snapshot.p99_ms >= snapshot.p95_ms);
        assert!(snapshot.p95_ms >= snapshot.p50_ms);
    }

    #[test]
    fn three_consecutive_breach_windows_accumulate() {
        let mut histogram = LagHistogram::default();
        for _ in 0..3 {
            for _ in 0..LAG_WINDOW_OPS {
                histogram.record(1_000.0, 500.0);
            }
        }
        let snapshot = histogram.snapshot(500.0);
        assert!(!snapshot.slo_met);
        assert_eq!(snapshot.consecutive_breaches, 3);
    }

    #[test]
    fn recovering_below_budget_resets_breach_streak() {
        let mut histogram = LagHistogram::default();
        for _ in 0..LAG_WINDOW_OPS {
            histogram.record(1_000.0, 500.0);
        }
        assert_eq!(histogram.snapshot(500.0).consecutive_breaches, 1);
        for _ in 0..LAG_WINDOW_OPS {
            histogram.record(10.0, 500.0);
        }
        assert_eq!(histogram.snapshot(500.0).consecutive_breaches, 0);
    }
}
