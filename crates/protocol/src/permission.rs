//! Permissions enforced at the core boundary (§6, sample set).
//!
//! Scope matching supports `*` (everything), an exact string match, and a
//! `resource:*` wildcard that grants every action on that resource. Admin
//! role short-circuits to a wildcard grant regardless of scopes held.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    SessionCreate,
    SessionRead,
    SessionUpdate,
    SessionDelete,
    SessionList,
    SessionRefresh,
    ContextCreate,
    ContextRead,
    ContextUpdate,
    ContextDelete,
    ContextList,
    ContextExecute,
}

impl Permission {
    #[must_use]
    pub fn scope(self) -> &'static str {
        match self {
            Self::SessionCreate => "session:create",
            Self::SessionRead => "session:read",
            Self::SessionUpdate => "session:update",
            Self::SessionDelete => "session:delete",
            Self::SessionList => "session:list",
            Self::SessionRefresh => "session:refresh",
            Self::ContextCreate => "context:create",
            Self::ContextRead => "context:read",
            Self::ContextUpdate => "context:update",
            Self::ContextDelete => "context:delete",
            Self::ContextList => "context:list",
            Self::ContextExecute => "context:execute",
        }
    }

    #[must_use]
    pub fn resource(self) -> &'static str {
        self.scope().split(':').next().unwrap_or("")
    }

    /// Is `self` granted given a caller's held scopes?
    ///
    /// `*` grants everything; `resource:*` grants every permission on that
    /// resource; otherwise the scope string must match exactly.
    #[must_use]
    pub fn granted_by(self, held_scopes: &[String]) -> bool {
        let scope = self.scope();
        let resource_wildcard = format!("{}:*", self.resource());
        held_scopes
            .iter()
            .any(|held| held == "*" || held == &resource_wildcard || held == scope)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scope())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_scope_grants() {
        let scopes = vec!["session:create".to_string()];
        assert!(Permission::SessionCreate.granted_by(&scopes));
        assert!(!Permission::SessionDelete.granted_by(&scopes));
    }

    #[test]
    fn resource_wildcard_grants_whole_resource() {
        let scopes = vec!["context:*".to_string()];
        assert!(Permission::ContextExecute.granted_by(&scopes));
        assert!(Permission::ContextDelete.granted_by(&scopes));
        assert!(!Permission::SessionDelete.granted_by(&scopes));
    }

    #[test]
    fn admin_wildcard_grants_everything() {
        let scopes = vec!["*".to_string()];
        assert!(Permission::SessionRefresh.granted_by(&scopes));
        assert!(Permission::ContextExecute.granted_by(&scopes));
    }

    #[test]
    fn empty_scopes_grant_nothing() {
        assert!(!Permission::SessionRead.granted_by(&[]));
    }
}
