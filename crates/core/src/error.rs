//! This crate's error type and the classification into the shared §7
//! taxonomy. Every other crate already owns its own `thiserror` enum; this
//! one adds only the failure modes that exist at the `CoreApi` boundary
//! itself (permission/ownership/not-found on sessions and contexts) and
//! folds every wrapped crate error into one `ErrorShape` via [`classify`].

use headlessd_protocol::{ErrorKind, ErrorShape};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Action(#[from] headlessd_action::Error),

    #[error(transparent)]
    Browser(#[from] headlessd_browser::Error),

    #[error(transparent)]
    Sessions(#[from] headlessd_sessions::Error),

    #[error(transparent)]
    Service(#[from] headlessd_service_traits::ServiceError),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Folds every failure mode this crate (and the crates it wraps) produces
/// into the shared `ErrorShape` (§7 "Implementation mapping": "`headlessd-core`
/// classifies every crate error into `ErrorKind`/`ErrorShape` via a
/// `From`/`classify()` mapping at the `CoreApi` boundary").
#[must_use]
pub fn classify(err: &Error) -> ErrorShape {
    match err {
        Error::Action(inner) => headlessd_action::classify(inner),
        Error::Browser(inner) => classify_browser(inner),
        Error::Sessions(inner) => classify_sessions(inner),
        Error::Service(inner) => ErrorShape::from(service_clone(inner)),
        Error::PermissionDenied(message) => {
            ErrorShape::new(ErrorKind::PermissionDenied, "permission_denied", message)
        },
        Error::NotFound(message) => ErrorShape::new(ErrorKind::NotFound, "not_found", message),
        Error::Conflict(message) => ErrorShape::new(ErrorKind::Conflict, "conflict", message),
        Error::Invalid(message) => ErrorShape::new(ErrorKind::Invalid, "invalid_request", message),
        Error::Internal(message) => ErrorShape::new(ErrorKind::Internal, "internal_error", message),
    }
}

/// `ServiceError` carries no `Clone` impl (its `NotConfigured` variant is
/// effectively a static tag); rebuild an equivalent value rather than add
/// a dependency-wide `Clone` bound just for this conversion.
fn service_clone(err: &headlessd_service_traits::ServiceError) -> headlessd_service_traits::ServiceError {
    match err {
        headlessd_service_traits::ServiceError::NotConfigured(what) => {
            headlessd_service_traits::ServiceError::NotConfigured(what)
        },
        headlessd_service_traits::ServiceError::Message { message } => {
            headlessd_service_traits::ServiceError::message(message.clone())
        },
    }
}

/// Browser errors reaching the core directly (page acquisition failures
/// that never made it into an `ActionResult`) get the same connection-vs-
/// internal split `headlessd-action::classify` applies to its own wrapped
/// browser errors.
fn classify_browser(err: &headlessd_browser::Error) -> ErrorShape {
    if err.is_connection_error() || matches!(err, headlessd_browser::Error::PoolExhausted) {
        ErrorShape::new(ErrorKind::Unavailable, "browser_unavailable", err.to_string())
    } else if matches!(err, headlessd_browser::Error::Timeout(_)) {
        ErrorShape::new(ErrorKind::Timeout, "browser_timeout", err.to_string())
    } else {
        ErrorShape::new(ErrorKind::Internal, "browser_error", err.to_string())
    }
}

/// §7 propagation policy: "Timeout/Unavailable at the KV layer while the
/// monitor still reports the primary up gets one immediate retry then
/// surfaces as `Backend`" — the retry itself lives at the call site
/// (`api.rs`); this only covers the final classification once a backend
/// error has already been decided as terminal.
fn classify_sessions(err: &headlessd_sessions::Error) -> ErrorShape {
    match err {
        headlessd_sessions::Error::Invalid(message) => {
            ErrorShape::new(ErrorKind::Invalid, "invalid_session_request", message)
        },
        headlessd_sessions::Error::NotFound => {
            ErrorShape::new(ErrorKind::NotFound, "session_not_found", "session not found")
        },
        headlessd_sessions::Error::Backend(message) => {
            ErrorShape::new(ErrorKind::Unavailable, "store_unavailable", message)
        },
        headlessd_sessions::Error::Message(message) => {
            ErrorShape::new(ErrorKind::Internal, "internal_error", message)
        },
    }
}

pub type Result<T> = std::result::Result<T, Error>;
