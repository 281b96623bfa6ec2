//! Metrics snapshot for internal API consumption.
//!
//! This module provides a way to get metrics data as structured JSON,
//! separate from the Prometheus text format, for `getPoolMetrics()`/
//! `getStoreHealth()` (§6) callers that want a typed view rather than
//! scraping `/metrics`.

use {
    serde::{Deserialize, Serialize},
    std::collections::HashMap,
};

/// Type of metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

/// A single metric value with its labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// The metric name
    pub name: String,
    /// The metric type
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Labels attached to this metric
    pub labels: HashMap<String, String>,
    /// The current value (for counters and gauges)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Histogram data (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram: Option<HistogramSnapshot>,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Histogram bucket and summary data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    /// Total count of observations
    pub count: u64,
    /// Sum of all observed values
    pub sum: f64,
    /// Bucket boundaries and their cumulative counts
    pub buckets: Vec<HistogramBucket>,
    /// Calculated percentiles
    pub percentiles: PercentilesSnapshot,
}

/// A single histogram bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Upper bound of this bucket (exclusive, except +Inf)
    pub le: f64,
    /// Cumulative count of observations <= le
    pub count: u64,
}

/// Pre-calculated percentiles for histograms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentilesSnapshot {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// A complete snapshot of all metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Timestamp when the snapshot was taken (Unix millis)
    pub timestamp: u64,
    /// All metric values
    pub metrics: Vec<MetricSnapshot>,
    /// Metrics grouped by category
    pub categories: MetricCategories,
}

/// Metrics organized by category, one per §2 component that emits them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricCategories {
    pub pool: CategoryMetrics,
    pub action: CategoryMetrics,
    pub session: CategoryMetrics,
    pub context: CategoryMetrics,
    pub store: CategoryMetrics,
    pub replication: ReplicationCategoryMetrics,
    pub system: SystemMetrics,
}

/// Generic category metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryMetrics {
    /// Total requests/operations
    pub total: u64,
    /// Error count
    pub errors: u64,
    /// Currently active/in-flight
    pub active: u64,
    /// Average duration in seconds
    pub avg_duration_seconds: Option<f64>,
    /// P99 duration in seconds
    pub p99_duration_seconds: Option<f64>,
}

/// Replication-specific metrics, broken down per replica (§4.2)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicationCategoryMetrics {
    pub ops_total: u64,
    pub ops_failed_total: u64,
    pub replicas_inactive: u64,
    pub conflicts_total: u64,
    pub by_replica: HashMap<String, ReplicaMetrics>,
}

/// Per-replica metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicaMetrics {
    pub ops: u64,
    pub ops_failed: u64,
    pub avg_lag_seconds: Option<f64>,
}

/// System-level metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Uptime in seconds
    pub uptime_seconds: f64,
    /// Build version
    pub version: Option<String>,
}

impl MetricsSnapshot {
    /// Create a new empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            metrics: Vec::new(),
            categories: MetricCategories::default(),
        }
    }

    /// Parse Prometheus text format into a structured snapshot.
    ///
    /// This is a best-effort parser that extracts metric values from
    /// Prometheus exposition format.
    #[must_use]
    pub fn from_prometheus_text(text: &str) -> Self {
        let mut snapshot = Self::new();

        for line in text.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(metric) = parse_prometheus_line(line) {
                update_categories(&mut snapshot.categories, &metric);
                snapshot.metrics.push(metric);
            }
        }

        snapshot
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a single Prometheus metric line
fn parse_prometheus_line(line: &str) -> Option<MetricSnapshot> {
    // Format: metric_name{label1="value1",label2="value2"} value
    // or: metric_name value

    let (name_and_labels, value_str) = line.rsplit_once(' ')?;
    let value: f64 = value_str.parse().ok()?;

    let (name, labels) = if let Some(brace_start) = name_and_labels.find('{') {
        let name = &name_and_labels[..brace_start];
        let labels_str = name_and_labels
            .get(brace_start + 1..name_and_labels.len() - 1)
            .unwrap_or("");
        let labels = parse_labels(labels_str);
        (name, labels)
    } else {
        (name_and_labels, HashMap::new())
    };

    let metric_type = if name.ends_with("_total") || name.ends_with("_count") {
        MetricType::Counter
    } else if name.ends_with("_bucket") || name.ends_with("_sum") {
        return None;
    } else {
        MetricType::Gauge
    };

    Some(MetricSnapshot {
        name: name.to_string(),
        metric_type,
        labels,
        value: Some(value),
        histogram: None,
        description: None,
    })
}

/// Parse Prometheus label format: key1="value1",key2="value2"
fn parse_labels(labels_str: &str) -> HashMap<String, String> {
    let mut labels = HashMap::new();

    if labels_str.is_empty() {
        return labels;
    }

    // Simple parser - doesn't handle escaped quotes in values
    for part in labels_str.split(',') {
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim_matches('"');
            labels.insert(key.to_string(), value.to_string());
        }
    }

    labels
}

/// Update category aggregates based on a metric
fn update_categories(categories: &mut MetricCategories, metric: &MetricSnapshot) {
    let name = &metric.name;
    let value = metric.value.unwrap_or(0.0) as u64;

    if name.starts_with("headlessd_pool_acquisitions_total") {
        categories.pool.total += value;
    } else if name.starts_with("headlessd_pool_browsers_active") {
        categories.pool.active = value;
    } else if name.starts_with("headlessd_pool_acquisition_timeouts_total")
        || name.starts_with("headlessd_pool_browser_errors_total")
    {
        categories.pool.errors += value;
    } else if name.starts_with("headlessd_action_executions_total") {
        categories.action.total += value;
    } else if name.starts_with("headlessd_action_execution_errors_total") {
        categories.action.errors += value;
    } else if name.starts_with("headlessd_session_created_total") {
        categories.session.total += value;
    } else if name.starts_with("headlessd_session_active") {
        categories.session.active = value;
    } else if name.starts_with("headlessd_context_created_total") {
        categories.context.total += value;
    } else if name.starts_with("headlessd_context_active") {
        categories.context.active = value;
    } else if name.starts_with("headlessd_store_operation_errors_total") {
        categories.store.errors += value;
    } else if name.starts_with("headlessd_replication_ops_total") {
        categories.replication.ops_total += value;
        if let Some(replica) = metric.labels.get("replica") {
            categories
                .replication
                .by_replica
                .entry(replica.clone())
                .or_default()
                .ops += value;
        }
    } else if name.starts_with("headlessd_replication_ops_failed_total") {
        categories.replication.ops_failed_total += value;
        if let Some(replica) = metric.labels.get("replica") {
            categories
                .replication
                .by_replica
                .entry(replica.clone())
                .or_default()
                .ops_failed += value;
        }
    } else if name.starts_with("headlessd_replication_replicas_inactive") {
        categories.replication.replicas_inactive = value;
    } else if name.starts_with("headlessd_replication_conflicts_total") {
        categories.replication.conflicts_total += value;
    } else if name.starts_with("headlessd_uptime_seconds") {
        categories.system.uptime_seconds = metric.value.unwrap_or(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prometheus_line_simple() {
        let metric = parse_prometheus_line("headlessd_pool_acquisitions_total 42").unwrap();
        assert_eq!(metric.name, "headlessd_pool_acquisitions_total");
        assert_eq!(metric.value, Some(42.0));
        assert!(metric.labels.is_empty());
    }

    #[test]
    fn test_parse_prometheus_line_with_labels() {
        let metric = parse_prometheus_line(
            r#"headlessd_action_executions_total{action_type="navigate"} 100"#,
        )
        .unwrap();
        assert_eq!(metric.name, "headlessd_action_executions_total");
        assert_eq!(metric.value, Some(100.0));
        assert_eq!(metric.labels.get("action_type"), Some(&"navigate".to_string()));
    }

    #[test]
    fn test_snapshot_from_prometheus_text() {
        let text = r#"
# HELP headlessd_pool_acquisitions_total Total browser acquisitions
# TYPE headlessd_pool_acquisitions_total counter
headlessd_pool_acquisitions_total 100
headlessd_action_executions_total{action_type="navigate"} 50
headlessd_replication_ops_total{replica="replica-1"} 25
"#;

        let snapshot = MetricsSnapshot::from_prometheus_text(text);
        assert_eq!(snapshot.metrics.len(), 3);
        assert_eq!(snapshot.categories.pool.total, 100);
        assert_eq!(snapshot.categories.action.total, 50);
        assert_eq!(snapshot.categories.replication.ops_total, 25);
        assert_eq!(
            snapshot.categories.replication.by_replica.get("replica-1").unwrap().ops,
            25
        );
    }
}
