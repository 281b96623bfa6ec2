//! Configuration validation engine.
//!
//! Structural checks over a parsed [`HeadlessdConfig`](crate::schema::HeadlessdConfig):
//! range sanity on pool/executor/store numbers, enum consistency (e.g. a
//! `store.type = "redis"` needs a `url`), and soft warnings for settings that
//! parse fine but are almost certainly a misconfiguration.

use headlessd_metrics::{config as config_metrics, counter, labels};

use crate::schema::{ConflictResolutionMode, HeadlessdConfig, StoreBackendType};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "range", "consistency", "security", "unreachable"
    pub category: &'static str,
    /// Dotted path, e.g. "pool.min_browsers"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(category: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(category: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration document.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Validate a parsed configuration, returning every diagnostic found (an
/// empty `diagnostics` vec means the config is clean).
#[must_use]
pub fn validate(config: &HeadlessdConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    validate_pool(config, &mut diagnostics);
    validate_store(config, &mut diagnostics);
    validate_executor(config, &mut diagnostics);
    validate_ambient(config, &mut diagnostics);

    for diagnostic in diagnostics.iter().filter(|d| d.severity == Severity::Error) {
        counter!(config_metrics::VALIDATION_ERRORS_TOTAL, labels::RULE => diagnostic.path.clone()).increment(1);
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn validate_pool(config: &HeadlessdConfig, out: &mut Vec<Diagnostic>) {
    let pool = &config.pool;

    if pool.min_browsers == 0 {
        out.push(Diagnostic::error(
            "range",
            "pool.min_browsers",
            "min_browsers must be at least 1",
        ));
    }
    if pool.max_browsers < pool.min_browsers {
        out.push(Diagnostic::error(
            "range",
            "pool.max_browsers",
            format!(
                "max_browsers ({}) must be >= min_browsers ({})",
                pool.max_browsers, pool.min_browsers
            ),
        ));
    }
    if pool.max_pages_per_browser == 0 {
        out.push(Diagnostic::error(
            "range",
            "pool.max_pages_per_browser",
            "max_pages_per_browser must be at least 1",
        ));
    }
    if pool.acquisition_timeout_secs == 0 {
        out.push(Diagnostic::error(
            "range",
            "pool.acquisition_timeout_secs",
            "acquisition_timeout_secs must be positive",
        ));
    }
    if pool.idle_timeout_secs > 0 && pool.idle_timeout_secs < pool.health_check_interval_secs {
        out.push(Diagnostic::warning(
            "consistency",
            "pool.idle_timeout_secs",
            "idle_timeout_secs is shorter than health_check_interval_secs; idle browsers may \
             never be observed before being reaped",
        ));
    }
    if pool.max_lifetime_secs > 0 && pool.max_lifetime_secs < pool.idle_timeout_secs {
        out.push(Diagnostic::warning(
            "consistency",
            "pool.max_lifetime_secs",
            "max_lifetime_secs is shorter than idle_timeout_secs",
        ));
    }
    if let Some(path) = &pool.chrome_path {
        if path.trim().is_empty() {
            out.push(Diagnostic::warning(
                "consistency",
                "pool.chrome_path",
                "chrome_path is set but empty; leave it unset to auto-detect",
            ));
        }
    }
}

fn validate_store(config: &HeadlessdConfig, out: &mut Vec<Diagnostic>) {
    let store = &config.store;

    match store.r#type {
        StoreBackendType::Redis => {
            if store.url.as_deref().unwrap_or_default().trim().is_empty() {
                out.push(Diagnostic::error(
                    "consistency",
                    "store.url",
                    "store.type = \"redis\" requires store.url",
                ));
            }
        }
        StoreBackendType::Auto | StoreBackendType::Memory => {}
    }

    if store.max_retries == 0 {
        out.push(Diagnostic::warning(
            "range",
            "store.max_retries",
            "max_retries = 0 means a single transient failure kills the store connection",
        ));
    }

    let monitoring = &store.monitoring;
    if monitoring.interval_secs == 0 {
        out.push(Diagnostic::error(
            "range",
            "store.monitoring.interval_secs",
            "interval_secs must be positive",
        ));
    }
    if !(0.0..=1.0).contains(&monitoring.max_error_rate) {
        out.push(Diagnostic::error(
            "range",
            "store.monitoring.max_error_rate",
            "max_error_rate must be between 0.0 and 1.0",
        ));
    }
    if !(0.0..=1.0).contains(&monitoring.min_availability) {
        out.push(Diagnostic::error(
            "range",
            "store.monitoring.min_availability",
            "min_availability must be between 0.0 and 1.0",
        ));
    }

    let replication = &store.replication;
    if replication.enabled && replication.replica_urls.is_empty() {
        out.push(Diagnostic::error(
            "consistency",
            "store.replication.replica_urls",
            "replication.enabled = true requires at least one replica_urls entry",
        ));
    }
    if replication.slo_p95_budget_ms <= 0.0 {
        out.push(Diagnostic::error(
            "range",
            "store.replication.slo_p95_budget_ms",
            "slo_p95_budget_ms must be positive",
        ));
    }
    if matches!(replication.conflict_resolution, ConflictResolutionMode::Manual)
        && !replication.enabled
    {
        out.push(Diagnostic::warning(
            "unreachable",
            "store.replication.conflict_resolution",
            "conflict_resolution is set but replication is disabled",
        ));
    }

    if store.migration.enabled && matches!(store.r#type, StoreBackendType::Memory) {
        out.push(Diagnostic::warning(
            "unreachable",
            "store.migration.enabled",
            "migration is meaningless when store.type = \"memory\" has no prior backend to \
             migrate from",
        ));
    }
}

fn validate_executor(config: &HeadlessdConfig, out: &mut Vec<Diagnostic>) {
    let executor = &config.executor;
    let timeouts = &executor.default_timeouts;

    for (name, value) in [
        ("navigate_ms", timeouts.navigate_ms),
        ("evaluate_ms", timeouts.evaluate_ms),
        ("screenshot_ms", timeouts.screenshot_ms),
        ("wait_ms", timeouts.wait_ms),
    ] {
        if value == 0 {
            out.push(Diagnostic::error(
                "range",
                format!("executor.default_timeouts.{name}"),
                "timeout must be positive",
            ));
        }
    }

    if executor.max_result_bytes == 0 {
        out.push(Diagnostic::error(
            "range",
            "executor.max_result_bytes",
            "max_result_bytes must be positive",
        ));
    }
    if executor.max_arg_count == 0 {
        out.push(Diagnostic::error(
            "range",
            "executor.max_arg_count",
            "max_arg_count must be positive",
        ));
    }
    if executor.max_nesting_depth == 0 {
        out.push(Diagnostic::error(
            "range",
            "executor.max_nesting_depth",
            "max_nesting_depth must be positive",
        ));
    }
    for (idx, pattern) in executor.deny_patterns_js.iter().enumerate() {
        if let Err(err) = regex::Regex::new(pattern) {
            out.push(Diagnostic::error(
                "consistency",
                format!("executor.deny_patterns_js[{idx}]"),
                format!("invalid regex: {err}"),
            ));
        }
    }
    for (idx, pattern) in executor.deny_patterns_css.iter().enumerate() {
        if let Err(err) = regex::Regex::new(pattern) {
            out.push(Diagnostic::error(
                "consistency",
                format!("executor.deny_patterns_css[{idx}]"),
                format!("invalid regex: {err}"),
            ));
        }
    }
}

fn validate_ambient(config: &HeadlessdConfig, out: &mut Vec<Diagnostic>) {
    let ambient = &config.ambient;

    let known_levels = ["trace", "debug", "info", "warn", "error"];
    if !known_levels.contains(&ambient.logging.level.as_str()) {
        out.push(Diagnostic::warning(
            "consistency",
            "ambient.logging.level",
            format!(
                "unrecognized level \"{}\"; expected one of {known_levels:?}",
                ambient.logging.level
            ),
        ));
    }

    if ambient.metrics.enabled && ambient.metrics.prometheus_addr.is_none() {
        out.push(Diagnostic::warning(
            "consistency",
            "ambient.metrics.prometheus_addr",
            "metrics.enabled = true but no prometheus_addr is set; metrics will only be \
             available via the in-process snapshot",
        ));
    }

    if ambient.rate_limit.per_session_per_minute == 0 {
        out.push(Diagnostic::error(
            "range",
            "ambient.rate_limit.per_session_per_minute",
            "per_session_per_minute must be positive",
        ));
    }
    if ambient.rate_limit.per_addr_per_minute < ambient.rate_limit.per_session_per_minute {
        out.push(Diagnostic::warning(
            "consistency",
            "ambient.rate_limit.per_addr_per_minute",
            "per_addr_per_minute is lower than per_session_per_minute; a single session could \
             never hit its own limit before the address-wide one",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PoolConfig, StoreConfig};

    #[test]
    fn default_config_is_clean() {
        let config = HeadlessdConfig::default();
        let result = validate(&config);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn max_browsers_below_min_is_an_error() {
        let mut config = HeadlessdConfig::default();
        config.pool = PoolConfig {
            min_browsers: 5,
            max_browsers: 2,
            ..PoolConfig::default()
        };
        let result = validate(&config);
        assert!(result.has_errors());
        assert!(result.diagnostics.iter().any(|d| d.path == "pool.max_browsers"));
    }

    #[test]
    fn redis_store_without_url_is_an_error() {
        let mut config = HeadlessdConfig::default();
        config.store = StoreConfig {
            r#type: StoreBackendType::Redis,
            url: None,
            ..StoreConfig::default()
        };
        let result = validate(&config);
        assert!(result.has_errors());
        assert!(result.diagnostics.iter().any(|d| d.path == "store.url"));
    }

    #[test]
    fn replication_enabled_without_replicas_is_an_error() {
        let mut config = HeadlessdConfig::default();
        config.store.replication.enabled = true;
        let result = validate(&config);
        assert!(result.has_errors());
    }

    #[test]
    fn invalid_deny_pattern_regex_is_an_error() {
        let mut config = HeadlessdConfig::default();
        config.executor.deny_patterns_js.push("(unclosed".to_string());
        let result = validate(&config);
        assert!(result.has_errors());
    }

    #[test]
    fn unrecognized_log_level_is_a_warning_not_an_error() {
        let mut config = HeadlessdConfig::default();
        config.ambient.logging.level = "verbose".to_string();
        let result = validate(&config);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
    }
}
