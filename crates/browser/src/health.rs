//! Health Checker (HC, §4.4): per-instance liveness, memory, responsiveness,
//! and page-count probes, with an optional auto-recovery restart.

use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::performance::GetMetricsParams;
use headlessd_metrics::{counter, gauge, health as health_metrics, histogram};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{error::Error, instance::BrowserInstance, config::BrowserConfig};

#[derive(Debug, Clone, Copy)]
pub struct HealthCheckConfig {
    pub response_timeout: Duration,
    pub max_memory_mb: f64,
    pub max_page_count: usize,
    pub enable_auto_recovery: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
            max_memory_mb: 1024.0,
            max_page_count: 10,
            enable_auto_recovery: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub memory_mb: f64,
    pub page_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub is_healthy: bool,
    pub connection_healthy: bool,
    pub memory_healthy: bool,
    pub page_count_healthy: bool,
    pub responsive: bool,
    pub reason: Option<String>,
    pub metrics: HealthMetrics,
}

impl HealthReport {
    fn unhealthy(reason: impl Into<String>) -> Self {
        Self {
            is_healthy: false,
            connection_healthy: false,
            memory_healthy: true,
            page_count_healthy: true,
            responsive: false,
            reason: Some(reason.into()),
            metrics: HealthMetrics::default(),
        }
    }
}

/// Runs the §4.4 procedure against `instance`. Never panics — every probe
/// failure folds into a `false` component of the report, never propagates.
pub async fn check(instance: &BrowserInstance, config: &HealthCheckConfig) -> HealthReport {
    let start = Instant::now();
    let report = check_inner(instance, config).await;
    histogram!(health_metrics::PROBE_DURATION_SECONDS).record(start.elapsed().as_secs_f64());
    counter!(health_metrics::PROBES_TOTAL).increment(1);
    if !report.is_healthy {
        counter!(health_metrics::PROBE_FAILURES_TOTAL).increment(1);
    }
    gauge!(health_metrics::MEMORY_MB).set(report.metrics.memory_mb);
    report
}

async fn check_inner(instance: &BrowserInstance, config: &HealthCheckConfig) -> HealthReport {
    // Steps 1-2: chromiumoxide does not expose the child PID, so
    // "connected" and "process alive" collapse into one CDP round-trip —
    // a probe page that fails to evaluate means either the WebSocket is
    // down or the process is gone, and the caller (maintenance loop)
    // treats both the same way: restart the slot.
    let probe_page = match instance.pages.values().next() {
        Some(page) => page.clone(),
        None => match instance.browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => return HealthReport::unhealthy(format!("disconnected: {err}")),
        },
    };

    // Step 3: responsiveness — evaluate a constant expression under a
    // deadline, racing the timer rather than trusting the engine's own
    // timeout handling.
    let responsive = tokio::time::timeout(config.response_timeout, probe_page.evaluate("1+1"))
        .await
        .ok()
        .and_then(|r| r.ok())
        .is_some();

    if !responsive {
        return HealthReport::unhealthy("unresponsive");
    }

    // Step 4: memory — JS heap usage on the probe page, bytes to MB.
    let memory_mb = page_heap_mb(&probe_page).await.unwrap_or(0.0);
    let memory_healthy = memory_mb <= config.max_memory_mb;

    // Step 5: page count.
    let page_count = instance.page_count();
    let page_count_healthy = page_count <= config.max_page_count;

    let is_healthy = memory_healthy && page_count_healthy;
    HealthReport {
        is_healthy,
        connection_healthy: true,
        memory_healthy,
        page_count_healthy,
        responsive: true,
        reason: if is_healthy {
            None
        } else if !memory_healthy {
            Some("memory_exceeded".to_string())
        } else {
            Some("page_count_exceeded".to_string())
        },
        metrics: HealthMetrics {
            memory_mb,
            page_count,
        },
    }
}

async fn page_heap_mb(page: &chromiumoxide::Page) -> Option<f64> {
    let metrics = page.execute(GetMetricsParams::default()).await.ok()?;
    let used_bytes = metrics
        .result
        .metrics
        .iter()
        .find(|m| m.name == "JSHeapUsedSize")
        .map(|m| m.value)?;
    Some(used_bytes / (1024.0 * 1024.0))
}

/// `checkAndRecover`: when `enable_auto_recovery` and any check failed,
/// restart the slot in place. Returns the (possibly replaced) instance and
/// the health report that triggered the decision.
pub async fn check_and_recover(
    instance: BrowserInstance,
    health_config: &HealthCheckConfig,
    browser_config: &BrowserConfig,
    restart_grace: Duration,
) -> (Result<BrowserInstance, Error>, HealthReport) {
    let report = check(&instance, health_config).await;
    if report.is_healthy || !health_config.enable_auto_recovery {
        return (Ok(instance), report);
    }
    warn!(
        browser_id = %instance.id,
        reason = ?report.reason,
        "health check failed, restarting browser instance"
    );
    counter!(health_metrics::AUTO_RECOVERY_TOTAL).increment(1);
    let restarted = crate::lifecycle::restart(instance, browser_config, restart_grace).await;
    (restarted, report)
}
