use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::audit::{AuditEntry, AuditStatus},
};

/// The auditor's view of one audit trail entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLogResponse {
    pub id: ApiId,
    pub timestamp: DateTime<Utc>,
    pub user_email: String,
    pub action: String,
    pub status: AuditStatus,
    pub details: Option<String>,
}

impl From<AuditEntry> for AuditLogResponse {
    fn from(entry: AuditEntry) -> Self {
        Self {
            id: entry.id.into(),
            timestamp: entry.entry.timestamp,
            user_email: entry.entry.user_email,
            action: entry.entry.action,
            status: entry.entry.status,
            details: entry.entry.details,
        }
    }
}
