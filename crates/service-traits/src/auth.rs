//! Auth resolution port. Token minting/validation and permission resolution
//! live outside the core (§1); the core only ever consumes the
//! [`AuthContext`] an `AuthPort` resolves from a raw [`Credential`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ServiceResult;

/// Authorization at the boundary: `Bearer <token>` or `x-api-key: <key>`.
#[derive(Debug, Clone)]
pub enum Credential {
    Bearer(String),
    ApiKey(String),
}

/// Principal + roles + scopes the core reasons about. Everything upstream
/// of this (token format, signature, expiry) is the frontend's problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: String,
    pub roles: Vec<String>,
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl AuthContext {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == "admin") || self.scopes.iter().any(|s| s == "*")
    }
}

#[async_trait]
pub trait AuthPort: Send + Sync {
    async fn resolve(&self, credential: Credential) -> ServiceResult<AuthContext>;
}

/// Default used when no auth frontend is wired in: every credential fails
/// closed rather than being silently accepted.
pub struct NoopAuthPort;

#[async_trait]
impl AuthPort for NoopAuthPort {
    async fn resolve(&self, _credential: Credential) -> ServiceResult<AuthContext> {
        Err(crate::ServiceError::NotConfigured("auth port"))
    }
}
