//! Suppression records and their append-only audit trail.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an address must not receive mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    HardBounce,
    SoftBounce,
    SpamComplaint,
    Unsubscribed,
    Blocked,
    Manual,
}

impl fmt::Display for SuppressionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HardBounce => "hard_bounce",
            Self::SoftBounce => "soft_bounce",
            Self::SpamComplaint => "spam_complaint",
            Self::Unsubscribed => "unsubscribed",
            Self::Blocked => "blocked",
            Self::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

/// Keyed by normalized address. Presence is authoritative: dispatch treats a
/// record as an unconditional skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionRecord {
    pub address: String,
    /// Merged reason text; repeated suppressions append rather than error.
    pub reason: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What an audit entry records having happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionAction {
    Suppressed,
    Unsuppressed,
}

/// Immutable audit log entry. Entries driven by provider events use the
/// deterministic id `{address}:{event_id}` so replays are detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionAuditEntry {
    pub address: String,
    pub action: SuppressionAction,
    #[serde(default)]
    pub reason: Option<String>,
    /// User id or `"system"`.
    pub actor: String,
    #[serde(default)]
    pub event_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}
