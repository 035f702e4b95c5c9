use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{Coll, Id};

/// Outcome of the audited action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failed,
}

/// One append-only audit trail entry. Every security-relevant operation
/// (login, registration, vote cast, admin mutation) writes one.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntryCore {
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Id>,
    pub user_email: String,
    pub action: String,
    pub status: AuditStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditEntryCore {
    pub fn success(
        user_id: impl Into<Option<Id>>,
        user_email: impl Into<String>,
        action: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::new(user_id, user_email, action, AuditStatus::Success, details)
    }

    pub fn failure(
        user_id: impl Into<Option<Id>>,
        user_email: impl Into<String>,
        action: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::new(user_id, user_email, action, AuditStatus::Failed, details)
    }

    fn new(
        user_id: impl Into<Option<Id>>,
        user_email: impl Into<String>,
        action: impl Into<String>,
        status: AuditStatus,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: user_id.into(),
            user_email: user_email.into(),
            action: action.into(),
            status,
            details: Some(details.into()),
        }
    }
}

/// An audit entry without an ID.
pub type NewAuditEntry = AuditEntryCore;

/// An audit entry from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: AuditEntryCore,
}

impl Deref for AuditEntry {
    type Target = AuditEntryCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

/// Append an audit entry outside of any transaction.
///
/// This never fails the calling operation: an audit sink that cannot be
/// written to is an operational problem, not a reason to turn a correctly
/// rejected request into a 500. The error is logged instead. Success-path
/// audits of transactional operations do NOT go through here; they are
/// inserted within the same transaction as the primary effect.
pub async fn record(logs: &Coll<NewAuditEntry>, entry: NewAuditEntry) {
    if let Err(err) = logs.insert_one(&entry, None).await {
        error!(
            "Failed to write audit entry for action '{}': {err}",
            entry.action
        );
    }
}
