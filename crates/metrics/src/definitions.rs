//! Metric name and label definitions.
//!
//! This module centralizes every metric name and common label key emitted by
//! the core, grouped by the owning component (§2's component table) rather
//! than scattering string literals through the codebase.

/// Browser pool metrics (BP, §4.6)
pub mod pool {
    /// Currently active (leased) browser instances
    pub const BROWSERS_ACTIVE: &str = "headlessd_pool_browsers_active";
    /// Currently idle browser instances
    pub const BROWSERS_IDLE: &str = "headlessd_pool_browsers_idle";
    /// Total browser instances launched
    pub const BROWSERS_CREATED_TOTAL: &str = "headlessd_pool_browsers_created_total";
    /// Total browser instances destroyed (idle-timeout, restart, shutdown)
    pub const BROWSERS_DESTROYED_TOTAL: &str = "headlessd_pool_browsers_destroyed_total";
    /// Total browser restarts (needsRestart or failed health check)
    pub const BROWSERS_RESTARTED_TOTAL: &str = "headlessd_pool_browsers_restarted_total";
    /// Total browser acquisitions
    pub const ACQUISITIONS_TOTAL: &str = "headlessd_pool_acquisitions_total";
    /// Acquisition wait duration in seconds (0 when a browser was immediately idle)
    pub const ACQUISITION_WAIT_SECONDS: &str = "headlessd_pool_acquisition_wait_seconds";
    /// Total acquisitions that timed out in the queue (AQ, §4.5)
    pub const ACQUISITION_TIMEOUTS_TOTAL: &str = "headlessd_pool_acquisition_timeouts_total";
    /// Current queue depth
    pub const QUEUE_DEPTH: &str = "headlessd_pool_queue_depth";
    /// Age of the oldest queued waiter in seconds
    pub const QUEUE_OLDEST_WAIT_SECONDS: &str = "headlessd_pool_queue_oldest_wait_seconds";
    /// Total browser errors recorded (errorCount increments)
    pub const BROWSER_ERRORS_TOTAL: &str = "headlessd_pool_browser_errors_total";
    /// Total pages currently open across all browsers
    pub const PAGES_OPEN: &str = "headlessd_pool_pages_open";
}

/// Health checker metrics (HC, §4.4)
pub mod health {
    /// Total health probes run
    pub const PROBES_TOTAL: &str = "headlessd_health_probes_total";
    /// Total health probes that failed (any of connection/memory/page-count/responsive)
    pub const PROBE_FAILURES_TOTAL: &str = "headlessd_health_probe_failures_total";
    /// Probe duration in seconds
    pub const PROBE_DURATION_SECONDS: &str = "headlessd_health_probe_duration_seconds";
    /// Total auto-recovery restarts triggered by a failed probe
    pub const AUTO_RECOVERY_TOTAL: &str = "headlessd_health_auto_recovery_total";
    /// Last observed browser memory usage in megabytes
    pub const MEMORY_MB: &str = "headlessd_health_memory_mb";
}

/// Action execution metrics (AE, §4.9)
pub mod action {
    /// Total actions executed, labelled by `action_type`
    pub const EXECUTIONS_TOTAL: &str = "headlessd_action_executions_total";
    /// Action execution duration in seconds, labelled by `action_type`
    pub const EXECUTION_DURATION_SECONDS: &str = "headlessd_action_execution_duration_seconds";
    /// Total action execution errors, labelled by `action_type` and `error_code`
    pub const EXECUTION_ERRORS_TOTAL: &str = "headlessd_action_execution_errors_total";
    /// Total validation rejections before a page was ever acquired
    pub const VALIDATION_REJECTIONS_TOTAL: &str = "headlessd_action_validation_rejections_total";
    /// Total results replaced with a truncation marker (§4.9 step 8)
    pub const RESULTS_TRUNCATED_TOTAL: &str = "headlessd_action_results_truncated_total";
}

/// Security Validator metrics (SV, §4.8)
pub mod security {
    /// Total JS/CSS snippets rejected, labelled by `rule` and `severity`
    pub const REJECTIONS_TOTAL: &str = "headlessd_security_rejections_total";
    /// Total snippets validated (accepted or rejected)
    pub const VALIDATIONS_TOTAL: &str = "headlessd_security_validations_total";
}

/// Session Store metrics (SS, §4.1)
pub mod session {
    /// Total sessions created
    pub const CREATED_TOTAL: &str = "headlessd_session_created_total";
    /// Total sessions deleted (explicit, TTL expiry, or admin termination)
    pub const DELETED_TOTAL: &str = "headlessd_session_deleted_total";
    /// Total sessions lazily expired on `get`
    pub const EXPIRED_TOTAL: &str = "headlessd_session_expired_total";
    /// Total `touch` operations
    pub const TOUCHED_TOTAL: &str = "headlessd_session_touched_total";
    /// Sessions currently tracked by the active backend (includes not-yet-expired)
    pub const ACTIVE: &str = "headlessd_session_active";
}

/// Context Store metrics (CS, §3/§4)
pub mod context {
    /// Total contexts created
    pub const CREATED_TOTAL: &str = "headlessd_context_created_total";
    /// Total contexts deleted (explicit delete or cascading session termination)
    pub const DELETED_TOTAL: &str = "headlessd_context_deleted_total";
    /// Contexts currently open
    pub const ACTIVE: &str = "headlessd_context_active";
}

/// Session Store backend/monitor metrics (SM, §4.2)
pub mod store {
    /// Backend operation duration in seconds, labelled by `operation`
    pub const OPERATION_DURATION_SECONDS: &str = "headlessd_store_operation_duration_seconds";
    /// Total backend operation errors, labelled by `operation`
    pub const OPERATION_ERRORS_TOTAL: &str = "headlessd_store_operation_errors_total";
    /// Total cache-miss probes (monitor's synthetic create→get→delete)
    pub const CACHE_MISSES_TOTAL: &str = "headlessd_store_cache_misses_total";
    /// Aggregate health status: 0=healthy, 1=degraded, 2=unhealthy
    pub const HEALTH_STATUS: &str = "headlessd_store_health_status";
    /// Total fallback activations (primary unavailable, memory backend took over)
    pub const FALLBACK_ACTIVATIONS_TOTAL: &str = "headlessd_store_fallback_activations_total";
}

/// Replication metrics (SM, §4.2, OQ-2)
pub mod replication {
    /// Total replication ops enqueued, labelled by `replica`
    pub const OPS_TOTAL: &str = "headlessd_replication_ops_total";
    /// Total replication ops that failed after exhausting retries, labelled by `replica`
    pub const OPS_FAILED_TOTAL: &str = "headlessd_replication_ops_failed_total";
    /// Replication lag in seconds (enqueue to successful apply), labelled by `replica`
    pub const LAG_SECONDS: &str = "headlessd_replication_lag_seconds";
    /// Replicas currently marked inactive after consecutive failures
    pub const REPLICAS_INACTIVE: &str = "headlessd_replication_replicas_inactive";
    /// Total bulk-reconcile conflicts recorded under `manual` resolution
    pub const CONFLICTS_TOTAL: &str = "headlessd_replication_conflicts_total";
}

/// Migration metrics (SM, §4.2)
pub mod migration {
    /// Total records migrated
    pub const MIGRATED_TOTAL: &str = "headlessd_migration_migrated_total";
    /// Total records that failed to migrate
    pub const FAILED_TOTAL: &str = "headlessd_migration_failed_total";
    /// Total records skipped (e.g. expired and `!syncExpired`)
    pub const SKIPPED_TOTAL: &str = "headlessd_migration_skipped_total";
    /// Migration batch duration in seconds
    pub const BATCH_DURATION_SECONDS: &str = "headlessd_migration_batch_duration_seconds";
}

/// Config loading metrics
pub mod config {
    /// Config load duration in seconds
    pub const LOAD_DURATION_SECONDS: &str = "headlessd_config_load_duration_seconds";
    /// Config parse errors, labelled by `format`
    pub const PARSE_ERRORS_TOTAL: &str = "headlessd_config_parse_errors_total";
    /// Config validation errors, labelled by rule
    pub const VALIDATION_ERRORS_TOTAL: &str = "headlessd_config_validation_errors_total";
    /// Environment substitution failures
    pub const ENV_SUBSTITUTION_FAILURES_TOTAL: &str =
        "headlessd_config_env_substitution_failures_total";
}

/// System/process metrics
pub mod system {
    /// Process uptime in seconds
    pub const UPTIME_SECONDS: &str = "headlessd_uptime_seconds";
    /// Build information (labels: version, commit)
    pub const BUILD_INFO: &str = "headlessd_build_info";
}

/// Common label keys used across metrics
pub mod labels {
    pub const ACTION_TYPE: &str = "action_type";
    pub const ERROR_CODE: &str = "error_code";
    pub const FORMAT: &str = "format";
    pub const OPERATION: &str = "operation";
    pub const REPLICA: &str = "replica";
    pub const RULE: &str = "rule";
    pub const SEVERITY: &str = "severity";
    pub const BACKEND: &str = "backend";
}

/// Standard histogram buckets for different metric types
pub mod buckets {
    use once_cell::sync::Lazy;

    /// Action execution duration buckets (in seconds).
    /// Covers 1ms to 60s — navigate/screenshot defaults top out at 30s.
    pub static ACTION_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });

    /// Browser pool acquisition wait buckets (in seconds).
    /// Covers immediate (0) to the default 30s acquisition timeout.
    pub static ACQUISITION_WAIT: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.0, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0,
        ]
    });

    /// Session/KV store operation duration buckets (in seconds).
    /// Covers sub-millisecond in-memory ops to a slow external KV call.
    pub static STORE_OPERATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]
    });

    /// Replication lag buckets (in seconds).
    /// Covers sub-second fan-out to a multi-minute backlog under retry/backoff.
    pub static REPLICATION_LAG: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
        ]
    });

    /// Health probe duration buckets (in seconds).
    pub static HEALTH_PROBE: Lazy<Vec<f64>> =
        Lazy::new(|| vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0]);

    /// Acquisition queue depth buckets.
    pub static QUEUE_SIZE: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0,
        ]
    });
}
