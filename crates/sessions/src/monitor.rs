//! Store Monitor (§4.2): periodic synthetic probes, rolling metrics, and
//! status aggregation. Background loops never propagate errors (§7) — a
//! failed probe updates metrics and, if thresholds trip, publishes an
//! event; it never panics or returns control to a caller.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use chrono::Duration as ChronoDuration;
use headlessd_common::event::{Event, EventBus};
use headlessd_metrics::{counter, gauge, store as store_metrics};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::{
    backend::SessionBackend,
    model::NewSession,
};

#[derive(Debug, Clone, Copy)]
pub struct MonitorThresholds {
    pub max_latency_ms: u64,
    pub max_error_rate: f64,
    pub max_fallback_time_ms: u64,
    pub min_availability: f64,
}

impl Default for MonitorThresholds {
    fn default() -> Self {
        Self {
            max_latency_ms: 250,
            max_error_rate: 0.1,
            max_fallback_time_ms: 5_000,
            min_availability: 0.95,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RollingMetrics {
    pub op_count: u64,
    pub error_count: u64,
    pub cache_miss_count: u64,
    pub avg_latency_ms: f64,
}

impl RollingMetrics {
    fn record(&mut self, latency_ms: f64, error: bool, cache_miss: bool) {
        self.op_count += 1;
        if error {
            self.error_count += 1;
        }
        if cache_miss {
            self.cache_miss_count += 1;
        }
        // Incremental mean, not a fixed window: cheap, and the monitor
        // loop only cares about the trend since process start.
        self.avg_latency_ms += (latency_ms - self.avg_latency_ms) / self.op_count as f64;
    }

    fn error_rate(&self) -> f64 {
        if self.op_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.op_count as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

struct MonitorState {
    primary_metrics: RollingMetrics,
    primary_up: bool,
    fallback_since: Option<Instant>,
    status: StoreStatus,
}

/// Probes the active backend (and, when replication is configured,
/// the replica set) on a fixed interval and aggregates a health status.
pub struct StoreMonitor {
    primary: Arc<dyn SessionBackend>,
    thresholds: MonitorThresholds,
    interval: Duration,
    state: RwLock<MonitorState>,
    bus: EventBus,
    ticks: AtomicU64,
}

impl StoreMonitor {
    #[must_use]
    pub fn new(primary: Arc<dyn SessionBackend>, thresholds: MonitorThresholds, bus: EventBus) -> Self {
        Self {
            primary,
            thresholds,
            interval: Duration::from_secs(30),
            state: RwLock::new(MonitorState {
                primary_metrics: RollingMetrics::default(),
                primary_up: true,
                fallback_since: None,
                status: StoreStatus::Healthy,
            }),
            bus,
            ticks: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub async fn status(&self) -> StoreStatus {
        self.state.read().await.status
    }

    #[must_use]
    pub async fn metrics(&self) -> RollingMetrics {
        self.state.read().await.primary_metrics
    }

    /// One create→get→delete synthetic probe against the primary. Never
    /// returns an error to the caller — outcome is folded into the
    /// rolling metrics and the aggregated status.
    pub async fn probe_once(&self) {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let outcome = async {
            let id = self
                .primary
                .create(
                    NewSession {
                        user_id: "__monitor_probe__".into(),
                        username: "monitor".into(),
                        roles: Vec::new(),
                        expires_at: chrono::Utc::now() + ChronoDuration::seconds(5),
                        metadata: serde_json::Map::new(),
                    },
                    &cancel,
                )
                .await?;
            let found = self.primary.get(id, &cancel).await?;
            self.primary.delete(id, &cancel).await?;
            Ok::<bool, crate::error::Error>(found.is_some())
        }
        .await;

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        let (error, cache_miss) = match outcome {
            Ok(found) => (false, !found),
            Err(err) => {
                tracing::warn!(error = %err, "store probe failed");
                (true, true)
            },
        };

        if cache_miss {
            counter!(store_metrics::CACHE_MISSES_TOTAL).increment(1);
        }

        let mut state = self.state.write().await;
        state.primary_metrics.record(latency_ms, error, cache_miss);
        state.primary_up = !error;
        if error && state.fallback_since.is_none() {
            state.fallback_since = Some(Instant::now());
        } else if !error {
            state.fallback_since = None;
        }
        let new_status = self.aggregate(&state);
        let changed = new_status != state.status;
        state.status = new_status;
        drop(state);

        gauge!(store_metrics::HEALTH_STATUS).set(match new_status {
            StoreStatus::Healthy => 0.0,
            StoreStatus::Degraded => 1.0,
            StoreStatus::Unhealthy => 2.0,
        });

        if changed {
            match new_status {
                StoreStatus::Healthy => self.bus.publish(Event::StoreHealthy).await,
                StoreStatus::Degraded | StoreStatus::Unhealthy => {
                    self.bus
                        .publish(Event::StoreDegraded {
                            reason: format!("{new_status:?}"),
                        })
                        .await;
                },
            }
        }
    }

    fn aggregate(&self, state: &MonitorState) -> StoreStatus {
        let metrics = state.primary_metrics;
        let enough_samples = metrics.op_count >= 10;
        let latency_critical = metrics.avg_latency_ms > self.thresholds.max_latency_ms as f64;
        let error_rate_critical =
            enough_samples && metrics.error_rate() > self.thresholds.max_error_rate;
        let fallback_critical = state
            .fallback_since
            .map(|since| since.elapsed().as_millis() as u64 > self.thresholds.max_fallback_time_ms)
            .unwrap_or(false);

        if !state.primary_up && fallback_critical {
            return StoreStatus::Unhealthy;
        }
        if error_rate_critical || latency_critical {
            return if state.primary_up {
                StoreStatus::Degraded
            } else {
                StoreStatus::Unhealthy
            };
        }
        if !state.primary_up {
            return StoreStatus::Degraded;
        }
        StoreStatus::Healthy
    }

    /// Runs `probe_once` on a fixed interval until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    self.ticks.fetch_add(1, Ordering::Relaxed);
                    self.probe_once().await;
                }
            }
        }
    }
}
