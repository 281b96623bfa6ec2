//! `CoreApi` (§6): the single typed call surface every frontend sits on
//! top of. Wires the Session Store (+ Monitor), Context Store, and Browser
//! Pool (+ Page Manager, Action Executor) together, enforcing permissions
//! and ownership at this boundary rather than in any of the components
//! underneath it.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use headlessd_browser::{config::BrowserConfig, health::HealthCheckConfig, pool::BrowserPool};
use headlessd_common::{event::EventBus, ids::Id};
use headlessd_config::HeadlessdConfig;
use headlessd_metrics::{counter, histogram, labels, session as session_metrics, store as store_metrics};
use headlessd_protocol::{
    action::{ActionRequest, ActionResult},
    permission::Permission,
    session::{ContextRecord, SessionRecord},
};
use headlessd_service_traits::{
    audit::AuditPort,
    auth::{AuthContext, AuthPort},
    rate_limit::RateLimitPort,
    telemetry::TelemetryPort,
};
use headlessd_sessions::{
    ContextPatch, ContextStore, NewContext, NewSession, SessionPatch, StoreFactory,
    StoreFactoryConfig, StoreStatus, StoreType,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    executor,
};

/// This process only ever runs one named store; the name exists in
/// `StoreFactory`'s API to let a single process host more than one
/// logical store, a capability `CoreApi` doesn't need yet.
const STORE_NAME: &str = "default";

/// Ambient ports a `CoreApi` is built with. Each one defaults to its
/// `Noop` implementation in [`CoreApi::new`] when the caller doesn't wire
/// a real one in — see the trait docs in `headlessd-service-traits`.
pub struct Ports {
    pub auth: Arc<dyn AuthPort>,
    pub audit: Arc<dyn AuditPort>,
    pub telemetry: Arc<dyn TelemetryPort>,
    pub rate_limit: Arc<dyn RateLimitPort>,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            auth: Arc::new(headlessd_service_traits::auth::NoopAuthPort),
            audit: Arc::new(headlessd_service_traits::audit::NoopAuditPort),
            telemetry: Arc::new(headlessd_service_traits::telemetry::NoopTelemetryPort),
            rate_limit: Arc::new(headlessd_service_traits::rate_limit::NoopRateLimitPort),
        }
    }
}

pub struct CoreApi {
    config: HeadlessdConfig,
    bus: EventBus,
    store_factory: Arc<StoreFactory>,
    context_store: Arc<ContextStore>,
    pool: Arc<BrowserPool>,
    ports: Ports,
}

impl CoreApi {
    /// Process lifecycle init order (§6): config is already loaded by the
    /// caller; this builds the Session Store (+ Monitor), the Context
    /// Store, then the Browser Pool and warms it to `min_browsers` before
    /// returning. Binding frontends onto the returned `CoreApi` is the
    /// caller's job.
    pub async fn new(config: HeadlessdConfig, ports: Ports) -> Result<Arc<Self>> {
        let bus = EventBus::new();

        let store_factory = Arc::new(StoreFactory::new(bus.clone()));
        store_factory
            .create(STORE_NAME, store_factory_config(&config))
            .await?;

        let context_store = Arc::new(ContextStore::new());

        let pool = BrowserPool::new(browser_config(&config), HealthCheckConfig::default(), bus.clone());
        pool.warm_up().await;

        Ok(Arc::new(Self {
            config,
            bus,
            store_factory,
            context_store,
            pool,
            ports,
        }))
    }

    /// Reverse of init: the Browser Pool must finish shutting down before
    /// any store teardown runs, since an in-flight action might still be
    /// touching a session for ownership checks (§6 process lifecycle).
    /// `StoreFactory` has no teardown of its own — its monitor loop is
    /// cancelled internally when the process exits — so this is the only
    /// step shutdown needs today.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    // ── Session operations ──────────────────────────────────────────

    pub async fn create_session(&self, data: NewSession, principal: &AuthContext) -> Result<SessionRecord> {
        require(Permission::SessionCreate, principal)?;
        if !principal.is_admin() && data.user_id != principal.user_id {
            return Err(Error::permission_denied("cannot create a session for another user"));
        }
        let session = headlessd_sessions::Session::new(data)?;
        let backend = self.backend().await?;
        let cancel = CancellationToken::new();
        // `Session::new` already assigned the id; the backend's `create`
        // takes the unvalidated `NewSession` shape, so replay the
        // already-validated fields through it rather than re-deriving id
        // assignment twice.
        let op_start = Instant::now();
        let id = backend
            .create(
                NewSession {
                    user_id: session.user_id.clone(),
                    username: session.username.clone(),
                    roles: session.roles.clone(),
                    expires_at: session.expires_at,
                    metadata: session.metadata.clone(),
                },
                &cancel,
            )
            .await
            .inspect_err(|_| {
                counter!(store_metrics::OPERATION_ERRORS_TOTAL, labels::OPERATION => "create").increment(1);
            })?;
        histogram!(store_metrics::OPERATION_DURATION_SECONDS, labels::OPERATION => "create")
            .record(op_start.elapsed().as_secs_f64());
        let stored = backend
            .get(id, &cancel)
            .await?
            .ok_or_else(|| Error::not_found("session vanished immediately after creation"))?;
        counter!(session_metrics::CREATED_TOTAL).increment(1);
        self.bus
            .publish(headlessd_common::event::Event::SessionCreated {
                session_id: stored.id.to_string(),
                user_id: stored.user_id.clone(),
            })
            .await;
        Ok(stored.to_wire())
    }

    pub async fn get_session(&self, id: Id, principal: &AuthContext) -> Result<SessionRecord> {
        require(Permission::SessionRead, principal)?;
        let session = self.load_session(id).await?;
        check_owner(principal, &session.user_id)?;
        Ok(session.to_wire())
    }

    pub async fn touch_session(&self, id: Id, principal: &AuthContext) -> Result<()> {
        require(Permission::SessionRefresh, principal)?;
        let session = self.load_session(id).await?;
        check_owner(principal, &session.user_id)?;
        let backend = self.backend().await?;
        let cancel = CancellationToken::new();
        let op_start = Instant::now();
        backend.touch(id, &cancel).await.inspect_err(|_| {
            counter!(store_metrics::OPERATION_ERRORS_TOTAL, labels::OPERATION => "touch").increment(1);
        })?;
        histogram!(store_metrics::OPERATION_DURATION_SECONDS, labels::OPERATION => "touch")
            .record(op_start.elapsed().as_secs_f64());
        counter!(session_metrics::TOUCHED_TOTAL).increment(1);
        self.bus
            .publish(headlessd_common::event::Event::SessionTouched { session_id: id.to_string() })
            .await;
        Ok(())
    }

    pub async fn update_session(
        &self,
        id: Id,
        patch: SessionPatch,
        principal: &AuthContext,
    ) -> Result<SessionRecord> {
        require(Permission::SessionUpdate, principal)?;
        let session = self.load_session(id).await?;
        check_owner(principal, &session.user_id)?;
        let backend = self.backend().await?;
        let cancel = CancellationToken::new();
        let op_start = Instant::now();
        let updated = backend
            .update(id, patch, &cancel)
            .await
            .inspect_err(|_| {
                counter!(store_metrics::OPERATION_ERRORS_TOTAL, labels::OPERATION => "update").increment(1);
            })?
            .ok_or_else(|| Error::not_found("session"))?;
        histogram!(store_metrics::OPERATION_DURATION_SECONDS, labels::OPERATION => "update")
            .record(op_start.elapsed().as_secs_f64());
        Ok(updated.to_wire())
    }

    /// Deletes the session and cascades to every context it owns (§3
    /// Lifecycle: contexts are "destroyed ... on owning session
    /// termination"), releasing each context's page before the context
    /// record itself is dropped.
    pub async fn delete_session(&self, id: Id, principal: &AuthContext) -> Result<()> {
        require(Permission::SessionDelete, principal)?;
        let session = self.load_session(id).await?;
        check_owner(principal, &session.user_id)?;

        for context_id in self.context_store.delete_by_session(id).await {
            if let Some(browser_id) = self.pool.find_active_for_session(id).await {
                headlessd_browser::page::close_context_page(&self.pool, browser_id, context_id).await;
            }
        }

        let backend = self.backend().await?;
        let cancel = CancellationToken::new();
        let op_start = Instant::now();
        backend.delete(id, &cancel).await.inspect_err(|_| {
            counter!(store_metrics::OPERATION_ERRORS_TOTAL, labels::OPERATION => "delete").increment(1);
        })?;
        histogram!(store_metrics::OPERATION_DURATION_SECONDS, labels::OPERATION => "delete")
            .record(op_start.elapsed().as_secs_f64());
        counter!(session_metrics::DELETED_TOTAL).increment(1);
        self.bus
            .publish(headlessd_common::event::Event::SessionDeleted { session_id: id.to_string() })
            .await;
        Ok(())
    }

    async fn load_session(&self, id: Id) -> Result<headlessd_sessions::Session> {
        let backend = self.backend().await?;
        let cancel = CancellationToken::new();
        let op_start = Instant::now();
        let session = backend
            .get(id, &cancel)
            .await
            .inspect_err(|_| {
                counter!(store_metrics::OPERATION_ERRORS_TOTAL, labels::OPERATION => "get").increment(1);
            })?
            .ok_or_else(|| Error::not_found("session"))?;
        histogram!(store_metrics::OPERATION_DURATION_SECONDS, labels::OPERATION => "get")
            .record(op_start.elapsed().as_secs_f64());
        if session.is_expired(Utc::now()) {
            counter!(session_metrics::EXPIRED_TOTAL).increment(1);
            return Err(Error::not_found("session"));
        }
        Ok(session)
    }

    async fn backend(&self) -> Result<Arc<dyn headlessd_sessions::SessionBackend>> {
        self.store_factory
            .active_backend(STORE_NAME)
            .await
            .ok_or_else(|| Error::Internal("session store not initialized".into()))
    }

    // ── Context operations ──────────────────────────────────────────

    pub async fn create_context(
        &self,
        session_id: Id,
        spec: NewContext,
        principal: &AuthContext,
    ) -> Result<ContextRecord> {
        require(Permission::ContextCreate, principal)?;
        let session = self.load_session(session_id).await?;
        check_owner(principal, &session.user_id)?;
        let context = self.context_store.create(session_id, &session.user_id, spec).await?;
        self.bus
            .publish(headlessd_common::event::Event::ContextCreated {
                context_id: context.id.to_string(),
                session_id: session_id.to_string(),
            })
            .await;
        Ok(context.to_wire())
    }

    pub async fn get_context(&self, id: Id, principal: &AuthContext) -> Result<ContextRecord> {
        require(Permission::ContextRead, principal)?;
        let context = self.load_context(id).await?;
        check_owner(principal, &context.user_id)?;
        Ok(context.to_wire())
    }

    pub async fn update_context(
        &self,
        id: Id,
        patch: ContextPatch,
        principal: &AuthContext,
    ) -> Result<ContextRecord> {
        require(Permission::ContextUpdate, principal)?;
        let context = self.load_context(id).await?;
        check_owner(principal, &context.user_id)?;
        let updated = self
            .context_store
            .update(id, patch)
            .await?
            .ok_or_else(|| Error::not_found("context"))?;
        Ok(updated.to_wire())
    }

    pub async fn delete_context(&self, id: Id, principal: &AuthContext) -> Result<()> {
        require(Permission::ContextDelete, principal)?;
        let context = self.load_context(id).await?;
        check_owner(principal, &context.user_id)?;
        if let Some(browser_id) = self.pool.find_active_for_session(context.session_id).await {
            headlessd_browser::page::close_context_page(&self.pool, browser_id, id).await;
        }
        self.context_store.delete(id).await;
        self.bus
            .publish(headlessd_common::event::Event::ContextClosed { context_id: id.to_string() })
            .await;
        Ok(())
    }

    pub async fn list_contexts(&self, session_id: Id, principal: &AuthContext) -> Result<Vec<ContextRecord>> {
        require(Permission::ContextList, principal)?;
        let session = self.load_session(session_id).await?;
        check_owner(principal, &session.user_id)?;
        Ok(self
            .context_store
            .list_by_session(session_id)
            .await
            .iter()
            .map(headlessd_sessions::Context::to_wire)
            .collect())
    }

    async fn load_context(&self, id: Id) -> Result<headlessd_sessions::Context> {
        self.context_store.get(id).await.ok_or_else(|| Error::not_found("context"))
    }

    // ── Execution ────────────────────────────────────────────────────

    /// `execute` (§6): runs one action against `contextId` on behalf of
    /// `principal`, who must hold `ContextExecute` and own the context (or
    /// be an admin). `deadline`, if given, bounds the action on top of
    /// whatever per-action `timeout` the request itself carries — the
    /// tighter of the two wins.
    pub async fn execute(
        &self,
        context_id: Id,
        action: ActionRequest,
        principal: &AuthContext,
        deadline: Option<Duration>,
    ) -> Result<ActionResult> {
        require(Permission::ContextExecute, principal)?;
        let context = self.load_context(context_id).await?;
        check_owner(principal, &context.user_id)?;
        if context.status == headlessd_sessions::ContextStatus::Closed {
            return Err(Error::invalid("context is closed"));
        }

        let result = executor::execute(
            &self.pool,
            self.ports.audit.as_ref(),
            &self.config.executor.default_timeouts,
            &context.user_id,
            context.session_id,
            context_id,
            action,
            deadline,
        )
        .await;
        Ok(result)
    }

    // ── Observability ───────────────────────────────────────────────

    #[must_use]
    pub async fn pool_metrics(&self) -> headlessd_browser::pool::PoolMetrics {
        self.pool.metrics().await
    }

    #[must_use]
    pub async fn store_health(&self) -> Option<StoreStatus> {
        self.store_factory.health_status(STORE_NAME).await
    }

    #[must_use]
    pub fn rate_limit(&self) -> &dyn RateLimitPort {
        self.ports.rate_limit.as_ref()
    }

    #[must_use]
    pub fn auth(&self) -> &dyn AuthPort {
        self.ports.auth.as_ref()
    }

    #[must_use]
    pub fn telemetry(&self) -> &dyn TelemetryPort {
        self.ports.telemetry.as_ref()
    }

    /// Streaming subscription over the lifecycle event bus (§6 `streamEvents`,
    /// marked optional). Each call gets its own bounded channel; see
    /// `headlessd_common::event::EventBus` for backpressure behavior.
    pub async fn stream_events(&self) -> headlessd_common::event::Subscription {
        self.bus.subscribe().await
    }
}

fn require(permission: Permission, principal: &AuthContext) -> Result<()> {
    if permission.granted_by(&principal.scopes) {
        Ok(())
    } else {
        Err(Error::permission_denied(format!("missing scope `{permission}`")))
    }
}

fn check_owner(principal: &AuthContext, owner_user_id: &str) -> Result<()> {
    if principal.is_admin() || principal.user_id == owner_user_id {
        Ok(())
    } else {
        Err(Error::permission_denied("not the owner of this resource"))
    }
}

fn store_factory_config(config: &HeadlessdConfig) -> StoreFactoryConfig {
    StoreFactoryConfig {
        store_type: match config.store.r#type {
            headlessd_config::StoreBackendType::Redis => StoreType::Redis,
            headlessd_config::StoreBackendType::Memory => StoreType::Memory,
            headlessd_config::StoreBackendType::Auto => StoreType::Auto,
        },
        url: config.store.url.clone(),
        prefix: config.store.prefix.clone(),
        startup_probe_timeout: Duration::from_millis(config.store.startup_probe_timeout_ms),
        thresholds: headlessd_sessions::MonitorThresholds {
            max_latency_ms: config.store.monitoring.max_latency_ms,
            max_error_rate: config.store.monitoring.max_error_rate,
            max_fallback_time_ms: config.store.monitoring.max_fallback_time_ms,
            min_availability: config.store.monitoring.min_availability,
        },
    }
}

fn browser_config(config: &HeadlessdConfig) -> BrowserConfig {
    let pool = &config.pool;
    BrowserConfig {
        enabled: true,
        chrome_path: pool.chrome_path.clone(),
        headless: pool.headless,
        min_browsers: pool.min_browsers,
        max_browsers: pool.max_browsers,
        max_pages_per_browser: pool.max_pages_per_browser,
        idle_timeout: pool.idle_timeout(),
        acquisition_timeout: pool.acquisition_timeout(),
        health_check_interval: pool.health_check_interval(),
        max_lifetime: pool.max_lifetime(),
        max_uses: pool.max_uses,
        max_errors: pool.max_errors,
        navigation_timeout: pool.navigation_timeout(),
        user_agent: pool.user_agent.clone(),
        chrome_args: pool.launch_args.clone(),
        allowed_domains: pool.allowed_domains.clone(),
        ..BrowserConfig::default()
    }
}
