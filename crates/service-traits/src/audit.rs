//! Audit sink. Every executed action emits one event (§4.9 step 7); every
//! event carries a stable error code on failure so dashboards can count
//! without grepping messages (§7).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub user_id: String,
    pub session_id: String,
    pub context_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    pub action_type: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub duration_ms: u64,
}

#[async_trait]
pub trait AuditPort: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Drops events on the floor; used when no audit sink is configured.
/// Background/audit failures must never propagate (§7), so this is a
/// legitimate default, not just a test stub.
pub struct NoopAuditPort;

#[async_trait]
impl AuditPort for NoopAuditPort {
    async fn record(&self, event: AuditEvent) {
        tracing::debug!(
            user_id = %event.user_id,
            context_id = %event.context_id,
            action_type = %event.action_type,
            success = event.success,
            duration_ms = event.duration_ms,
            "audit event (no sink configured)"
        );
    }
}
