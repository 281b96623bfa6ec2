//! Ambient ports the core consumes but does not implement: auth resolution,
//! audit sinks, telemetry export, and rate limiting (§1, §5, §6).
//!
//! Each trait ships a `Noop` implementation so the core can run standalone
//! — in tests, or before a frontend wires in a real auth/telemetry stack —
//! without every call site special-casing "nothing is configured yet".

pub mod audit;
pub mod auth;
pub mod rate_limit;
pub mod telemetry;

pub use {
    audit::{AuditEvent, AuditPort, NoopAuditPort},
    auth::{AuthContext, AuthPort, Credential, NoopAuthPort},
    rate_limit::{NoopRateLimitPort, RateLimitDecision, RateLimitKey, RateLimitPort},
    telemetry::{NoopTelemetryPort, TelemetryPort},
};

/// Error type returned by ambient ports. Distinct from the core's own
/// `ErrorKind` taxonomy because these ports are implemented outside the
/// core — callers translate a `ServiceError` into `ErrorKind::{Unauthenticated,
/// PermissionDenied, Unavailable, Internal}` as appropriate at the call site.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{message}")]
    Message { message: String },
    #[error("not configured: {0}")]
    NotConfigured(&'static str),
}

impl ServiceError {
    #[must_use]
    pub fn message(message: impl std::fmt::Display) -> Self {
        Self::Message {
            message: message.to_string(),
        }
    }
}

impl From<ServiceError> for headlessd_protocol::ErrorShape {
    fn from(err: ServiceError) -> Self {
        let kind = match err {
            ServiceError::NotConfigured(_) => headlessd_protocol::ErrorKind::Unavailable,
            ServiceError::Message { .. } => headlessd_protocol::ErrorKind::Unauthenticated,
        };
        Self::new(kind, "service_error", err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
