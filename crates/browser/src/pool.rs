//! Browser Pool (BP, §4.6): owns every `BrowserInstance`, arbitrates
//! acquisition through the AQ, and runs the periodic maintenance loop.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use headlessd_common::{
    event::{Event, EventBus},
    ids::Id,
};
use headlessd_metrics::{counter, gauge, histogram, pool as pool_metrics};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    error::Error,
    health::{self, HealthCheckConfig, HealthReport},
    instance::{BrowserInstance, BrowserState},
    lifecycle,
    queue::{AcquisitionQueue, QueueStats},
    config::BrowserConfig,
};

const RESTART_GRACE: Duration = Duration::from_secs(10);
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolMetrics {
    pub total_browsers: usize,
    pub active: usize,
    pub idle: usize,
    pub queued: usize,
    pub oldest_queue_time: Duration,
    pub avg_page_count: f64,
    pub total_errors: u64,
    pub browsers_created: u64,
    pub browsers_destroyed: u64,
}

#[derive(Default)]
struct Counters {
    created: u64,
    destroyed: u64,
}

struct PoolState {
    browsers: HashMap<Id, BrowserInstance>,
    shutting_down: bool,
}

/// Owns the full set of live browser slots. Acquisition and release are
/// serialized through `state`'s mutex; the mutex is never held across an
/// engine RPC except the short health probes run inline during
/// maintenance (§5 "Shared mutable state & protection").
pub struct BrowserPool {
    config: BrowserConfig,
    health_config: HealthCheckConfig,
    state: Mutex<PoolState>,
    queue: AcquisitionQueue,
    counters: std::sync::Mutex<Counters>,
    bus: EventBus,
    maintenance_cancel: CancellationToken,
}

impl BrowserPool {
    #[must_use]
    pub fn new(config: BrowserConfig, health_config: HealthCheckConfig, bus: EventBus) -> Arc<Self> {
        let pool = Arc::new(Self {
            config,
            health_config,
            state: Mutex::new(PoolState {
                browsers: HashMap::new(),
                shutting_down: false,
            }),
            queue: AcquisitionQueue::new(),
            counters: std::sync::Mutex::new(Counters::default()),
            bus,
            maintenance_cancel: CancellationToken::new(),
        });
        tokio::spawn(Arc::clone(&pool).maintenance_loop());
        pool
    }

    /// Launches `min_browsers` up front so the pool is warm before the
    /// first request arrives (§6 process lifecycle: "build BP (launches
    /// minBrowsers)").
    pub async fn warm_up(&self) {
        for _ in 0..self.config.min_browsers {
            if let Err(err) = self.launch_one().await {
                warn!(error = %err, "failed to warm up browser pool");
            }
        }
    }

    async fn launch_one(&self) -> Result<Id, Error> {
        let id = Id::new();
        let instance = lifecycle::launch(id, &self.config).await?;
        {
            let mut state = self.state.lock().await;
            state.browsers.insert(id, instance);
        }
        self.counters.lock().unwrap_or_else(|e| e.into_inner()).created += 1;
        counter!(pool_metrics::BROWSERS_CREATED_TOTAL).increment(1);
        self.bus.publish(Event::BrowserCreated { browser_id: id.to_string() }).await;
        Ok(id)
    }

    /// `acquireBrowser` (§4.6): idle reuse, else launch under `maxBrowsers`,
    /// else queue with `acquisitionTimeout`.
    pub async fn acquire(&self, session_id: Id) -> Result<Id, Error> {
        counter!(pool_metrics::ACQUISITIONS_TOTAL).increment(1);
        {
            let mut state = self.state.lock().await;
            if state.shutting_down {
                return Err(Error::Unavailable);
            }
            if let Some(id) = Self::find_idle(&state.browsers) {
                let instance = state.browsers.get_mut(&id).expect("id came from this map");
                instance.state = BrowserState::Active;
                instance.session_id = Some(session_id);
                instance.use_count += 1;
                instance.touch();
                histogram!(pool_metrics::ACQUISITION_WAIT_SECONDS).record(0.0);
                return Ok(id);
            }
            if state.browsers.len() < self.config.max_browsers {
                drop(state);
                let result = self.launch_and_lease(session_id).await;
                histogram!(pool_metrics::ACQUISITION_WAIT_SECONDS).record(0.0);
                return result;
            }
        }

        let wait_start = Instant::now();
        let rx = self.queue.enqueue(session_id, 0, self.config.acquisition_timeout);
        self.bus
            .publish(Event::PoolSaturated {
                queued: self.queue.stats().count,
                oldest_wait_ms: 0,
            })
            .await;
        match tokio::time::timeout(self.config.acquisition_timeout, rx).await {
            Ok(Ok(Ok(id))) => {
                histogram!(pool_metrics::ACQUISITION_WAIT_SECONDS).record(wait_start.elapsed().as_secs_f64());
                Ok(id)
            },
            Ok(Ok(Err(err))) => {
                if matches!(err, Error::Timeout(_)) {
                    counter!(pool_metrics::ACQUISITION_TIMEOUTS_TOTAL).increment(1);
                }
                Err(err)
            },
            Ok(Err(_)) | Err(_) => {
                counter!(pool_metrics::ACQUISITION_TIMEOUTS_TOTAL).increment(1);
                Err(Error::Timeout(format!(
                    "acquisition timed out after {:?}",
                    self.config.acquisition_timeout
                )))
            },
        }
    }

    async fn launch_and_lease(&self, session_id: Id) -> Result<Id, Error> {
        let id = self.launch_one().await?;
        let mut state = self.state.lock().await;
        if let Some(instance) = state.browsers.get_mut(&id) {
            instance.state = BrowserState::Active;
            instance.session_id = Some(session_id);
            instance.use_count += 1;
            instance.touch();
        }
        Ok(id)
    }

    fn find_idle(browsers: &HashMap<Id, BrowserInstance>) -> Option<Id> {
        browsers
            .values()
            .find(|b| b.state == BrowserState::Idle)
            .map(|b| b.id)
    }

    /// Looks up the browser already leased to `session_id`, if any (OQ-1:
    /// the lease key is the session, not the context, so two contexts of
    /// the same session share one `BrowserInstance`). `PageManager` calls
    /// this before `acquire` so a second context never pays for a second
    /// browser.
    #[must_use]
    pub async fn find_active_for_session(&self, session_id: Id) -> Option<Id> {
        let state = self.state.lock().await;
        state
            .browsers
            .values()
            .find(|b| b.state == BrowserState::Active && b.session_id == Some(session_id))
            .map(|b| b.id)
    }

    /// `releaseBrowser` (§4.6): identity check, transition to idle, and —
    /// under the same lock acquisition — hand the slot straight to the
    /// head of the AQ if one is waiting, so no concurrent `acquire` can
    /// observe the instance idle and lease it out from under the waiter
    /// (§5 "hand-off to AQ is done under the lock", §8 invariant 1).
    pub async fn release(&self, id: Id, session_id: Id) -> Result<(), Error> {
        let handoff = {
            let mut state = self.state.lock().await;
            let Some(instance) = state.browsers.get_mut(&id) else {
                return Err(Error::NotFound(id.to_string()));
            };
            if instance.session_id != Some(session_id) {
                return Err(Error::InvalidAction("release by non-owning session".into()));
            }
            instance.state = BrowserState::Idle;
            instance.session_id = None;
            instance.touch();

            match self.queue.pop_waiter() {
                Some((next_session_id, waker)) => {
                    instance.state = BrowserState::Active;
                    instance.session_id = Some(next_session_id);
                    instance.use_count += 1;
                    instance.touch();
                    Some(waker)
                },
                None => None,
            }
        };

        self.bus
            .publish(Event::BrowserReleased {
                browser_id: id.to_string(),
                session_id: session_id.to_string(),
            })
            .await;

        // Resolved after the lock is dropped: the waiter's future may run
        // arbitrary code on wake, which must never happen while `state` is
        // held.
        if let Some(waker) = handoff {
            let _ = waker.send(Ok(id));
        }
        Ok(())
    }

    /// Opens a new page on `id` for `session_id`'s context, enforcing the
    /// per-browser page cap (§4.7 `PageManager` delegates here).
    pub async fn open_page(
        &self,
        id: Id,
        context_id: Id,
        session_id: Id,
    ) -> Result<chromiumoxide::Page, Error> {
        let mut state = self.state.lock().await;
        let Some(instance) = state.browsers.get_mut(&id) else {
            return Err(Error::NotFound(id.to_string()));
        };
        if instance.session_id != Some(session_id) {
            return Err(Error::InvalidAction("page requested by non-leasing session".into()));
        }
        if let Some(page) = instance.pages.get(&context_id) {
            return Ok(page.clone());
        }
        if instance.pages.len() >= self.config.max_pages_per_browser {
            return Err(Error::PoolExhausted);
        }
        let page = instance
            .browser
            .new_page("about:blank")
            .await
            .map_err(Error::from)?;
        instance.pages.insert(context_id, page.clone());
        instance.touch();
        Ok(page)
    }

    /// Closes the page pinned to `context_id`, if any, on `id`.
    pub async fn close_page(&self, id: Id, context_id: Id) {
        let mut state = self.state.lock().await;
        if let Some(instance) = state.browsers.get_mut(&id) {
            if let Some(page) = instance.pages.remove(&context_id) {
                let _ = page.close().await;
            }
        }
    }

    pub async fn record_error(&self, id: Id) {
        let mut state = self.state.lock().await;
        if let Some(instance) = state.browsers.get_mut(&id) {
            instance.error_count += 1;
        }
        counter!(pool_metrics::BROWSER_ERRORS_TOTAL).increment(1);
    }

    #[must_use]
    pub async fn get_browser_state(&self, id: Id) -> Option<BrowserState> {
        self.state.lock().await.browsers.get(&id).map(|b| b.state)
    }

    #[must_use]
    pub async fn metrics(&self) -> PoolMetrics {
        let state = self.state.lock().await;
        let total_browsers = state.browsers.len();
        let active = state
            .browsers
            .values()
            .filter(|b| b.state == BrowserState::Active)
            .count();
        let idle = state
            .browsers
            .values()
            .filter(|b| b.state == BrowserState::Idle)
            .count();
        let total_errors = state.browsers.values().map(|b| b.error_count).sum();
        let avg_page_count = if total_browsers == 0 {
            0.0
        } else {
            state.browsers.values().map(|b| b.page_count()).sum::<usize>() as f64
                / total_browsers as f64
        };
        let QueueStats { count: queued, oldest_wait } = self.queue.stats();
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let pages_open: usize = state.browsers.values().map(BrowserInstance::page_count).sum();
        gauge!(pool_metrics::BROWSERS_ACTIVE).set(active as f64);
        gauge!(pool_metrics::BROWSERS_IDLE).set(idle as f64);
        gauge!(pool_metrics::QUEUE_DEPTH).set(queued as f64);
        gauge!(pool_metrics::QUEUE_OLDEST_WAIT_SECONDS).set(oldest_wait.as_secs_f64());
        gauge!(pool_metrics::PAGES_OPEN).set(pages_open as f64);
        PoolMetrics {
            total_browsers,
            active,
            idle,
            queued,
            oldest_queue_time: oldest_wait,
            avg_page_count,
            total_errors,
            browsers_created: counters.created,
            browsers_destroyed: counters.destroyed,
        }
    }

    /// `healthCheck` (§4.6): runs HC against every instance, returning
    /// `{id -> healthy?}`.
    pub async fn health_check(&self) -> HashMap<Id, bool> {
        let state = self.state.lock().await;
        let mut reports = HashMap::with_capacity(state.browsers.len());
        for (id, instance) in &state.browsers {
            let report = health::check(instance, &self.health_config).await;
            reports.insert(*id, report.is_healthy);
        }
        reports
    }

    async fn maintenance_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            tokio::select! {
                biased;
                () = self.maintenance_cancel.cancelled() => return,
                _ = ticker.tick() => self.run_maintenance_cycle().await,
            }
        }
    }

    /// One maintenance pass (§4.6): evict idle-too-long down to
    /// `min_browsers`, restart/remove unhealthy instances, then top back
    /// up to `min_browsers`.
    async fn run_maintenance_cycle(&self) {
        if self.state.lock().await.shutting_down {
            return;
        }

        self.evict_idle_down_to_minimum().await;
        self.recycle_unhealthy().await;

        let below_minimum = {
            let state = self.state.lock().await;
            state.browsers.len() < self.config.min_browsers
        };
        if below_minimum {
            if let Err(err) = self.launch_one().await {
                warn!(error = %err, "failed to top up pool to min_browsers");
            }
        }
    }

    async fn evict_idle_down_to_minimum(&self) {
        let to_remove: Vec<Id> = {
            let state = self.state.lock().await;
            if state.browsers.len() <= self.config.min_browsers {
                Vec::new()
            } else {
                let mut idle: Vec<&BrowserInstance> = state
                    .browsers
                    .values()
                    .filter(|b| b.is_idle_too_long(self.config.idle_timeout))
                    .collect();
                idle.sort_by_key(|b| b.last_activity);
                let budget = state.browsers.len() - self.config.min_browsers;
                idle.into_iter().take(budget).map(|b| b.id).collect()
            }
        };
        for id in to_remove {
            self.remove(id, "idle_timeout").await;
        }
    }

    async fn recycle_unhealthy(&self) {
        let candidates: Vec<Id> = {
            let state = self.state.lock().await;
            state
                .browsers
                .values()
                .filter(|b| {
                    b.needs_restart(self.config.max_lifetime, self.config.max_uses, self.config.max_errors)
                })
                .map(|b| b.id)
                .collect()
        };
        for id in candidates {
            self.handle_unhealthy(id).await;
        }
    }

    /// `handleUnhealthyBrowser` (§4.6): try a single restart; on failure
    /// remove the slot entirely and emit `browser:removed`.
    async fn handle_unhealthy(&self, id: Id) {
        let instance = {
            let mut state = self.state.lock().await;
            let Some(instance) = state.browsers.remove(&id) else {
                return;
            };
            instance
        };
        // Restart happens outside the lock since it performs I/O (close +
        // relaunch); the slot is simply absent from the map meanwhile.
        match lifecycle::restart(instance, &self.config, RESTART_GRACE).await {
            Ok(mut restarted) => {
                restarted.state = BrowserState::Idle;
                let mut state = self.state.lock().await;
                state.browsers.insert(id, restarted);
                drop(state);
                counter!(pool_metrics::BROWSERS_RESTARTED_TOTAL).increment(1);
                self.bus.publish(Event::BrowserRestarted { browser_id: id.to_string() }).await;
                info!(browser_id = %id, "recycled unhealthy browser instance");
            },
            Err(err) => {
                warn!(browser_id = %id, error = %err, "restart failed, removing slot");
                self.counters.lock().unwrap_or_else(|e| e.into_inner()).destroyed += 1;
                counter!(pool_metrics::BROWSERS_DESTROYED_TOTAL).increment(1);
                self.bus
                    .publish(Event::BrowserRemoved {
                        browser_id: id.to_string(),
                        reason: "restart_failed".to_string(),
                    })
                    .await;
            },
        }
    }

    async fn remove(&self, id: Id, reason: &str) {
        let instance = {
            let mut state = self.state.lock().await;
            state.browsers.remove(&id)
        };
        let Some(instance) = instance else { return };
        lifecycle::close(instance, RESTART_GRACE).await;
        self.counters.lock().unwrap_or_else(|e| e.into_inner()).destroyed += 1;
        counter!(pool_metrics::BROWSERS_DESTROYED_TOTAL).increment(1);
        self.bus
            .publish(Event::BrowserRemoved {
                browser_id: id.to_string(),
                reason: reason.to_string(),
            })
            .await;
        info!(browser_id = %id, reason, "removed browser instance");
    }

    /// `shutdown` (§4.6): stop maintenance, clear AQ, close every instance.
    /// Subsequent `acquire` calls fail `Unavailable` and no new browser is
    /// launched (§8 invariant 6).
    pub async fn shutdown(&self) {
        self.maintenance_cancel.cancel();
        let instances: Vec<BrowserInstance> = {
            let mut state = self.state.lock().await;
            state.shutting_down = true;
            state.browsers.drain().map(|(_, v)| v).collect()
        };
        self.queue.clear();
        for instance in instances {
            lifecycle::close(instance, RESTART_GRACE).await;
        }
        info!("browser pool shut down");
    }
}
