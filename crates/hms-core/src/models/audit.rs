//! Audit log models.

use serde::{Deserialize, Serialize};

/// One recorded action against a resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub audit_id: String,
    /// Acting user
    pub user_id: String,
    /// Verb, e.g. "create", "payment", "call-next"
    pub action: String,
    /// Resource kind, e.g. "billing", "queue"
    pub resource: String,
    pub resource_id: Option<String>,
    /// Request method, path and similar context
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub timestamp: String,
}

impl AuditEntry {
    pub fn new(user_id: String, action: &str, resource: &str) -> Self {
        Self {
            audit_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            action: action.to_string(),
            resource: resource.to_string(),
            resource_id: None,
            details: None,
            ip_address: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
