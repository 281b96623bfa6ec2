//! Metrics collection and export for headlessd.
//!
//! This crate provides a unified metrics interface using the `metrics` crate facade.
//! When the `prometheus` feature is enabled, metrics are exported in Prometheus format.
//! When the `tracing` feature is enabled, span context is propagated to metrics labels.
//!
//! # Usage
//!
//! ```rust,ignore
//! use headlessd_metrics::{counter, gauge, histogram};
//!
//! counter!(headlessd_metrics::action::EXECUTIONS_TOTAL, "action_type" => "navigate").increment(1);
//! gauge!(headlessd_metrics::pool::BROWSERS_ACTIVE).set(3.0);
//! histogram!(headlessd_metrics::action::EXECUTION_DURATION_SECONDS).record(0.123);
//! ```
//!
//! # Features
//!
//! - `prometheus`: Enable Prometheus metrics export via a `/metrics` endpoint
//! - `tracing`: Enable tracing span context propagation to metrics labels

mod definitions;
mod recorder;
mod snapshot;
pub mod tracing_integration;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
    snapshot::{MetricSnapshot, MetricType, MetricsSnapshot},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
