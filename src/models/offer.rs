//! Report/offer record as persisted in the `reports` collection.
//!
//! The core only reads and writes the status-related fields during sweeps;
//! everything else on these documents belongs to the CRUD surface outside
//! this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::OfferStatus;
use crate::utils::serde::deserialize_optional_flexible_timestamp;

/// Customer's recorded answer to an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CustomerResponse {
    #[default]
    None,
    Accepted,
    Rejected,
}

/// One entry in an offer's append-only status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OfferStatus,
    pub timestamp: DateTime<Utc>,
    /// User id, or `"system"` for scheduled jobs.
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRecord {
    pub status: OfferStatus,
    #[serde(default)]
    pub customer_response: CustomerResponse,
    /// When the offer went out; legacy documents carry a date string here.
    #[serde(default, deserialize_with = "deserialize_optional_flexible_timestamp")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_flexible_timestamp")]
    pub valid_until: Option<DateTime<Utc>>,
    /// Monotonically non-decreasing, capped before escalation takes over.
    #[serde(default)]
    pub follow_up_attempts: u32,
    #[serde(default, deserialize_with = "deserialize_optional_flexible_timestamp")]
    pub last_follow_up_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub branch_id: Option<String>,
    /// Owning inspector's user id.
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub status_history: Vec<StatusHistoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserializes_legacy_document() {
        let offer: OfferRecord = serde_json::from_value(json!({
            "status": "pending",
            "sent_at": "2025-01-10",
            "valid_until": {"seconds": 1750000000, "nanoseconds": 0},
            "branch_id": "br-1",
            "created_by": "user-7",
        }))
        .unwrap();
        assert_eq!(offer.status, OfferStatus::OfferSent);
        assert_eq!(offer.follow_up_attempts, 0);
        assert_eq!(offer.customer_response, CustomerResponse::None);
        assert_eq!(offer.sent_at.unwrap().to_rfc3339(), "2025-01-10T00:00:00+00:00");
        assert!(offer.valid_until.is_some());
    }
}
