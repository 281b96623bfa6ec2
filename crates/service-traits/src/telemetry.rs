//! Narrow telemetry export port. The core records counters/gauges/histograms
//! through this trait rather than depending on `headlessd-metrics` directly,
//! so the pool/store code stays testable without a Prometheus registry.

pub trait TelemetryPort: Send + Sync {
    fn increment_counter(&self, name: &'static str, value: u64);
    fn record_gauge(&self, name: &'static str, value: f64);
    fn record_histogram(&self, name: &'static str, value_ms: f64);
}

/// Discards every sample; used in tests and before telemetry export starts.
pub struct NoopTelemetryPort;

impl TelemetryPort for NoopTelemetryPort {
    fn increment_counter(&self, _name: &'static str, _value: u64) {}
    fn record_gauge(&self, _name: &'static str, _value: f64) {}
    fn record_histogram(&self, _name: &'static str, _value_ms: f64) {}
}
