//! This crate's error type and its mapping onto the shared §7 taxonomy.

use headlessd_protocol::{ErrorKind, ErrorShape};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Invalid(String),

    #[error("security rule `{rule}` rejected the action: {message}")]
    Security { rule: String, message: String },

    #[error(transparent)]
    Browser(#[from] headlessd_browser::Error),

    #[error("action timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    #[must_use]
    pub fn security(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Security {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// Folds every failure mode this crate produces into the shared `ErrorShape`
/// (§4.9 step 6): connection-ish browser errors become `Unavailable`, other
/// browser errors `Internal`, everything else maps one-to-one.
#[must_use]
pub fn classify(err: &Error) -> ErrorShape {
    match err {
        Error::Invalid(message) => ErrorShape::new(ErrorKind::Invalid, "invalid_action", message),
        Error::Security { rule, message } => ErrorShape::security(rule, message),
        Error::Timeout(d) => ErrorShape::new(
            ErrorKind::Timeout,
            "action_timeout",
            format!("action timed out after {d:?}"),
        ),
        Error::Internal(message) => ErrorShape::new(ErrorKind::Internal, "internal_error", message),
        Error::Browser(browser_err) => {
            if browser_err.is_connection_error() || matches!(browser_err, headlessd_browser::Error::PoolExhausted) {
                ErrorShape::new(ErrorKind::Unavailable, "browser_unavailable", browser_err.to_string())
            } else {
                ErrorShape::new(ErrorKind::Internal, "browser_error", browser_err.to_string())
            }
        },
    }
}

pub type Result<T> = std::result::Result<T, Error>;
