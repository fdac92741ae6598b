//! # System Constants
//!
//! Collection names, dispatch limits, and scheduling constants shared across
//! the core. Tunable values live in [`crate::config::CoreConfig`]; the values
//! here are structural and not meant to vary per environment.

/// Document collection holding report/offer records.
pub const OFFERS_COLLECTION: &str = "reports";

/// Document collection holding queued/sent/failed mail records.
pub const MAIL_QUEUE_COLLECTION: &str = "mail_queue";

/// Document collection holding suppression records, keyed by address.
pub const SUPPRESSIONS_COLLECTION: &str = "email_suppressions";

/// Append-only audit trail for suppression changes.
pub const SUPPRESSION_AUDIT_COLLECTION: &str = "suppression_audit_log";

/// Append-only audit trail for outbound dispatch.
pub const MAIL_AUDIT_COLLECTION: &str = "mail_audit_log";

/// Append-only log of ingested provider delivery events.
pub const DELIVERY_EVENTS_COLLECTION: &str = "delivery_events";

/// In-app notification records.
pub const NOTIFICATIONS_COLLECTION: &str = "notifications";

/// User/inspector records (read-only from the core's perspective).
pub const USERS_COLLECTION: &str = "users";

/// Actor recorded on audit and history entries written by scheduled jobs.
pub const SYSTEM_ACTOR: &str = "system";

/// Maximum recipients for a single queue call.
pub const MAX_RECIPIENTS_PER_CALL: usize = 100;

/// Maximum recipients per item in a bulk queue call.
pub const MAX_RECIPIENTS_PER_BULK_ITEM: usize = 50;

/// Maximum automatic delivery attempts before a mail record is abandoned.
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Exponential backoff base delay between retries, in minutes.
pub const RETRY_BASE_DELAY_MINUTES: i64 = 5;

/// Exponential backoff multiplier per attempt.
pub const RETRY_BACKOFF_FACTOR: u32 = 3;

/// Failed records older than this are no longer retried, in hours.
pub const RETRY_LOOKBACK_HOURS: i64 = 24;

/// Maximum failed records considered per retry sweep.
pub const RETRY_BATCH_LIMIT: usize = 50;

/// Follow-up attempts cap; escalation supersedes follow-up beyond this.
pub const MAX_FOLLOW_UP_ATTEMPTS: u32 = 3;

/// Bound on a single provider send call, in seconds. Timeouts are treated
/// as retryable failures, never as a crash.
pub const PROVIDER_SEND_TIMEOUT_SECS: u64 = 30;

/// Email templates the dispatch pipeline accepts.
pub const ALLOWED_TEMPLATES: &[&str] = &[
    "offer_sent",
    "offer_follow_up",
    "offer_escalation",
    "offer_expired",
    "report_shared",
    "inspection_scheduled",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_allow_list_is_nonempty_and_unique() {
        assert!(!ALLOWED_TEMPLATES.is_empty());
        let mut seen = std::collections::HashSet::new();
        for t in ALLOWED_TEMPLATES {
            assert!(seen.insert(t), "duplicate template name: {t}");
        }
    }
}
