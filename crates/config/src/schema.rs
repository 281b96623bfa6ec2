//! Typed configuration schema (§6 "Configuration (recognized options)").
//!
//! Every section is `#[serde(default)]` so a partial file merges onto
//! hard-coded defaults instead of requiring a caller to restate every
//! field. Nothing here talks to a pool, a store, or a browser — the
//! `headlessd-core` composition root is responsible for turning these
//! plain structs into the live `BrowserConfig`/`StoreFactoryConfig`/
//! `ReplicationConfig` the lower crates expect.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration document: one section per functional area plus
/// the ambient concerns every deployment carries regardless of which
/// functional sections are populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlessdConfig {
    pub pool: PoolConfig,
    pub store: StoreConfig,
    pub executor: ExecutorConfig,
    pub ambient: AmbientConfig,
}

/// Browser Pool tunables (§4.6 defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub min_browsers: usize,
    pub max_browsers: usize,
    pub max_pages_per_browser: usize,
    pub idle_timeout_secs: u64,
    pub acquisition_timeout_secs: u64,
    pub health_check_interval_secs: u64,
    pub max_lifetime_secs: u64,
    pub max_uses: u64,
    pub max_errors: u64,
    pub navigation_timeout_secs: u64,
    pub headless: bool,
    pub launch_args: Vec<String>,
    pub chrome_path: Option<String>,
    pub user_agent: Option<String>,
    pub allowed_domains: Vec<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_browsers: 1,
            max_browsers: 5,
            max_pages_per_browser: 10,
            idle_timeout_secs: 300,
            acquisition_timeout_secs: 30,
            health_check_interval_secs: 30,
            max_lifetime_secs: 3600,
            max_uses: 1000,
            max_errors: 10,
            navigation_timeout_secs: 30,
            headless: true,
            launch_args: Vec::new(),
            chrome_path: None,
            user_agent: None,
            allowed_domains: Vec::new(),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    #[must_use]
    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition_timeout_secs)
    }

    #[must_use]
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    #[must_use]
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendType {
    Redis,
    Memory,
    Auto,
}

impl Default for StoreBackendType {
    fn default() -> Self {
        Self::Memory
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub interval_secs: u64,
    pub max_latency_ms: u64,
    pub max_error_rate: f64,
    pub max_fallback_time_ms: u64,
    pub min_availability: f64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            max_latency_ms: 250,
            max_error_rate: 0.1,
            max_fallback_time_ms: 5_000,
            min_availability: 0.95,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolutionMode {
    LastWriteWins,
    OldestWins,
    Manual,
}

impl Default for ConflictResolutionMode {
    fn default() -> Self {
        Self::LastWriteWins
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationSettings {
    pub enabled: bool,
    pub replica_urls: Vec<String>,
    pub sync_interval_secs: u64,
    pub batch_size: usize,
    pub conflict_resolution: ConflictResolutionMode,
    pub sync_deletions: bool,
    pub sync_expired: bool,
    pub slo_p95_budget_ms: f64,
    pub max_retries: u32,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            replica_urls: Vec::new(),
            sync_interval_secs: 60,
            batch_size: 100,
            conflict_resolution: ConflictResolutionMode::LastWriteWins,
            sync_deletions: true,
            sync_expired: false,
            slo_p95_budget_ms: 500.0,
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    pub enabled: bool,
    pub batch_size: usize,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            batch_size: 100,
        }
    }
}

/// Session Store configuration (§4.1, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub r#type: StoreBackendType,
    pub url: Option<String>,
    pub prefix: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub startup_probe_timeout_ms: u64,
    pub monitoring: MonitoringConfig,
    pub replication: ReplicationSettings,
    pub migration: MigrationSettings,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            r#type: StoreBackendType::Memory,
            url: None,
            prefix: "headlessd:".to_string(),
            max_retries: 3,
            retry_delay_ms: 100,
            startup_probe_timeout_ms: 2_000,
            monitoring: MonitoringConfig::default(),
            replication: ReplicationSettings::default(),
            migration: MigrationSettings::default(),
        }
    }
}

/// Per-variant default timeouts (§4.9 step 3 "Typical defaults").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultTimeouts {
    pub navigate_ms: u64,
    pub evaluate_ms: u64,
    pub screenshot_ms: u64,
    pub wait_ms: u64,
}

impl Default for DefaultTimeouts {
    fn default() -> Self {
        Self {
            navigate_ms: 30_000,
            evaluate_ms: 10_000,
            screenshot_ms: 30_000,
            wait_ms: 30_000,
        }
    }
}

/// Action Executor / Security Validator tunables (§4.8, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub default_timeouts: DefaultTimeouts,
    pub max_result_bytes: usize,
    pub max_arg_count: usize,
    pub max_arg_bytes: usize,
    pub max_nesting_depth: usize,
    pub deny_patterns_js: Vec<String>,
    pub deny_patterns_css: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeouts: DefaultTimeouts::default(),
            max_result_bytes: 100 * 1024,
            max_arg_count: 10,
            max_arg_bytes: 10_000,
            max_nesting_depth: 20,
            deny_patterns_js: Vec::new(),
            deny_patterns_css: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub prometheus_addr: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prometheus_addr: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub per_session_per_minute: u32,
    pub per_addr_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_session_per_minute: 600,
            per_addr_per_minute: 1200,
        }
    }
}

/// Ambient concerns (§1, §6): loaded and validated in the same pass as the
/// functional sections, never silently defaulted past a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub rate_limit: RateLimitConfig,
}
