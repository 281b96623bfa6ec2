//! Error taxonomy (§7) shared by every component, serialized the same way
//! at every boundary: `{code, message}` plus an optional detail blob.

use serde::{Deserialize, Serialize};

/// Abstract error kinds, not type names — every component classifies its
/// failures into one of these before they cross a component boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Input failed validation (400-class at the boundary).
    Invalid,
    /// No/invalid credentials (401-class).
    Unauthenticated,
    /// Authenticated but not authorized (403-class).
    PermissionDenied,
    /// Session/context/page absent (404-class).
    NotFound,
    /// Duplicate create, illegal state transition (409-class).
    Conflict,
    /// Action or acquisition exceeded its deadline (408-class).
    Timeout,
    /// Pool shutting down, backend down (503-class).
    Unavailable,
    /// Uncategorized engine error (500-class).
    Internal,
    /// Security-validator rejection — always carries the offending rule
    /// name, never the offending payload.
    Security,
}

impl ErrorKind {
    /// Conventional HTTP-class status a REST frontend would map this to.
    /// The core never speaks HTTP itself; this is a convenience for
    /// frontends that want a default without re-deriving the table.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::Invalid => 400,
            Self::Unauthenticated => 401,
            Self::PermissionDenied => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Timeout => 408,
            Self::Unavailable => 503,
            Self::Internal => 500,
            Self::Security => 422,
        }
    }
}

/// Error shape at every boundary (action results, RPC errors, HTTP bodies).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorShape {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorShape {
    #[must_use]
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// A security rejection: the rule name travels, the payload never does.
    #[must_use]
    pub fn security(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Security, rule.into(), message.into())
    }
}

impl std::fmt::Display for ErrorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorShape {}
