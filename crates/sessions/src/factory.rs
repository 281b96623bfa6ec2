//! Store factory (§4.2): named store instances, `auto` backend selection,
//! online cutover, and backup/restore.

use std::{collections::HashMap, sync::Arc, time::Duration};

use headlessd_common::event::EventBus;
use headlessd_metrics::{counter, store as store_metrics};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::{
    backend::SessionBackend,
    error::{Error, Result},
    kv::RedisBackend,
    memory::InMemoryBackend,
    model::Session,
    monitor::{MonitorThresholds, StoreMonitor, StoreStatus},
};

#[derive(Debug, Clone)]
pub enum StoreType {
    Redis,
    Memory,
    Auto,
}

#[derive(Debug, Clone)]
pub struct StoreFactoryConfig {
    pub store_type: StoreType,
    pub url: Option<String>,
    pub prefix: String,
    pub startup_probe_timeout: Duration,
    pub thresholds: MonitorThresholds,
}

impl Default for StoreFactoryConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::Memory,
            url: None,
            prefix: "headlessd:".to_string(),
            startup_probe_timeout: Duration::from_secs(2),
            thresholds: MonitorThresholds::default(),
        }
    }
}

struct NamedStore {
    backend: Arc<dyn SessionBackend>,
    monitor: Arc<StoreMonitor>,
    fallback_reason: Option<String>,
    monitor_cancel: CancellationToken,
}

/// Builds and tracks named `SessionBackend` instances. "Named" lets a
/// process run more than one logical store (e.g. one per tenant tier)
/// without every call site threading a backend handle through by hand.
pub struct StoreFactory {
    stores: RwLock<HashMap<String, NamedStore>>,
    bus: EventBus,
}

impl StoreFactory {
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Builds and registers a named store. `auto` probes the external KV
    /// within `startup_probe_timeout`; on failure it falls back to the
    /// in-memory backend and records why.
    pub async fn create(&self, name: impl Into<String>, config: StoreFactoryConfig) -> Result<()> {
        let name = name.into();
        let (backend, fallback_reason) = self.build_backend(&config).await;
        let monitor = Arc::new(StoreMonitor::new(
            Arc::clone(&backend),
            config.thresholds,
            self.bus.clone(),
        ));
        let monitor_cancel = CancellationToken::new();
        tokio::spawn(Arc::clone(&monitor).run(monitor_cancel.clone()));

        self.stores.write().await.insert(
            name,
            NamedStore {
                backend,
                monitor,
                fallback_reason,
                monitor_cancel,
            },
        );
        Ok(())
    }

    async fn build_backend(
        &self,
        config: &StoreFactoryConfig,
    ) -> (Arc<dyn SessionBackend>, Option<String>) {
        match config.store_type {
            StoreType::Memory => (Arc::new(InMemoryBackend::new()), None),
            StoreType::Redis => match self.connect_redis(config).await {
                Ok(backend) => (backend, None),
                Err(err) => {
                    tracing::error!(error = %err, "redis backend requested but unreachable");
                    counter!(store_metrics::FALLBACK_ACTIVATIONS_TOTAL).increment(1);
                    (
                        Arc::new(InMemoryBackend::new()),
                        Some(format!("redis unreachable: {err}")),
                    )
                },
            },
            StoreType::Auto => {
                let probe = tokio::time::timeout(
                    config.startup_probe_timeout,
                    self.connect_redis(config),
                )
                .await;
                match probe {
                    Ok(Ok(backend)) => (backend, None),
                    Ok(Err(err)) => {
                        counter!(store_metrics::FALLBACK_ACTIVATIONS_TOTAL).increment(1);
                        (
                            Arc::new(InMemoryBackend::new()),
                            Some(format!("redis probe failed: {err}")),
                        )
                    },
                    Err(_) => {
                        counter!(store_metrics::FALLBACK_ACTIVATIONS_TOTAL).increment(1);
                        (
                            Arc::new(InMemoryBackend::new()),
                            Some("redis probe timed out at startup".to_string()),
                        )
                    },
                }
            },
        }
    }

    async fn connect_redis(&self, config: &StoreFactoryConfig) -> Result<Arc<dyn SessionBackend>> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| Error::invalid("redis store requires a url"))?;
        let backend = RedisBackend::connect(url, config.prefix.clone()).await?;
        backend.probe().await?;
        Ok(Arc::new(backend))
    }

    #[must_use]
    pub async fn active_backend(&self, name: &str) -> Option<Arc<dyn SessionBackend>> {
        self.stores
            .read()
            .await
            .get(name)
            .map(|s| Arc::clone(&s.backend))
    }

    #[must_use]
    pub async fn fallback_reason(&self, name: &str) -> Option<String> {
        self.stores.read().await.get(name)?.fallback_reason.clone()
    }

    /// Swaps the active backend for `name` to a freshly built one of
    /// `new_type`, carrying no data over — callers run a `Migrator` first
    /// and call this only once they're ready to cut over.
    pub async fn switch_store_type(&self, name: &str, config: StoreFactoryConfig) -> Result<()> {
        let (backend, fallback_reason) = self.build_backend(&config).await;
        let mut stores = self.stores.write().await;
        let Some(existing) = stores.get_mut(name) else {
            return Err(Error::invalid(format!("no store named {name}")));
        };
        existing.monitor_cancel.cancel();
        let monitor = Arc::new(StoreMonitor::new(
            Arc::clone(&backend),
            config.thresholds,
            self.bus.clone(),
        ));
        let monitor_cancel = CancellationToken::new();
        tokio::spawn(Arc::clone(&monitor).run(monitor_cancel.clone()));
        *existing = NamedStore {
            backend,
            monitor,
            fallback_reason,
            monitor_cancel,
        };
        Ok(())
    }

    pub async fn create_backup(&self, name: &str) -> Result<Vec<u8>> {
        let backend = self
            .active_backend(name)
            .await
            .ok_or_else(|| Error::invalid(format!("no store named {name}")))?;
        let cancel = CancellationToken::new();
        let sessions = backend.list_all(&cancel).await?;
        serde_json::to_vec(&sessions).map_err(Error::backend)
    }

    pub async fn restore_backup(&self, name: &str, blob: &[u8]) -> Result<u64> {
        let backend = self
            .active_backend(name)
            .await
            .ok_or_else(|| Error::invalid(format!("no store named {name}")))?;
        let sessions: Vec<Session> = serde_json::from_slice(blob).map_err(Error::backend)?;
        let cancel = CancellationToken::new();
        let mut restored = 0u64;
        for session in sessions {
            // `put` restores each record under its original id, so
            // clients that captured a session id before the backup still
            // resolve it afterward.
            backend.put(session, &cancel).await?;
            restored += 1;
        }
        Ok(restored)
    }

    #[must_use]
    pub async fn health_status(&self, name: &str) -> Option<StoreStatus> {
        let stores = self.stores.read().await;
        let store = stores.get(name)?;
        Some(store.monitor.status().await)
    }
}
