//! Transition table and conditional-write application.
//!
//! The table below is the single source of truth for status movement; every
//! component goes through [`apply`] or [`apply_persisted`] instead of
//! mutating `status` directly.

use serde_json::{json, Value};

use super::states::OfferStatus;
use crate::error::{CoreError, Result};
use crate::models::offer::StatusHistoryEntry;
use crate::store::{DocumentStore, Precondition, StoreError};

/// Allowed targets for each status. Directed; no implicit symmetry.
fn allowed_targets(current: OfferStatus) -> &'static [OfferStatus] {
    use OfferStatus::*;
    match current {
        Draft => &[Completed, Archived],
        Completed => &[Sent, Shared, Archived],
        Sent => &[Shared, Archived],
        Shared => &[Sent, Archived],
        OfferSent => &[
            AwaitingResponse,
            OfferAccepted,
            OfferRejected,
            OfferExpired,
            Archived,
        ],
        AwaitingResponse => &[OfferAccepted, OfferRejected, OfferExpired, Archived],
        // Sinks.
        Archived | OfferAccepted | OfferRejected | OfferExpired => &[],
    }
}

/// Whether `current -> next` is an edge in the transition table.
pub fn can_transition(current: OfferStatus, next: OfferStatus) -> bool {
    allowed_targets(current).contains(&next)
}

/// Validate a transition, returning the new status or an
/// [`CoreError::InvalidTransition`] naming both ends. Pure; callers must not
/// apply any partial state update on failure.
pub fn apply(current: OfferStatus, next: OfferStatus) -> Result<OfferStatus> {
    if can_transition(current, next) {
        Ok(next)
    } else {
        Err(CoreError::InvalidTransition {
            from: current.to_string(),
            to: next.to_string(),
        })
    }
}

/// Outcome of a persisted transition attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Transition validated and written.
    Applied(OfferStatus),
    /// Another writer moved the document first; the caller should treat the
    /// document as already handled, not as a failure.
    Superseded,
}

/// Apply a transition to a stored document as one logical update: the status
/// change, the history append, and any extra fields land in a single write
/// guarded by a precondition on the current status. An overlapping sweep
/// that already moved the document surfaces as
/// [`TransitionOutcome::Superseded`].
pub async fn apply_persisted(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    current: OfferStatus,
    next: OfferStatus,
    history_entry: StatusHistoryEntry,
    extra_patch: Option<Value>,
) -> Result<TransitionOutcome> {
    apply(current, next)?;

    let doc = store
        .get(collection, id)
        .await?
        .ok_or_else(|| CoreError::not_found(collection, id))?;

    // Precondition on the raw stored spelling: legacy documents carry
    // `pending` where the normalized status is `offer_sent`, and the guard
    // must match what is actually persisted.
    let raw_status = doc
        .data
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if raw_status.parse::<OfferStatus>().ok() != Some(current) {
        return Ok(TransitionOutcome::Superseded);
    }

    let mut history = doc
        .data
        .get("status_history")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    history.push(serde_json::to_value(&history_entry)?);

    let mut patch = json!({
        "status": next.to_string(),
        "status_history": history,
    });
    if let Some(Value::Object(extra)) = extra_patch {
        let obj = patch.as_object_mut().unwrap();
        for (key, value) in extra {
            obj.insert(key, value);
        }
    }

    let result = store
        .update(
            collection,
            id,
            patch,
            Some(Precondition::FieldEquals(
                "status".to_string(),
                json!(raw_status),
            )),
        )
        .await;

    match result {
        Ok(()) => Ok(TransitionOutcome::Applied(next)),
        Err(StoreError::PreconditionFailed { .. }) => Ok(TransitionOutcome::Superseded),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SYSTEM_ACTOR;
    use crate::store::MemoryStore;
    use chrono::Utc;

    const ALL_STATUSES: [OfferStatus; 10] = [
        OfferStatus::Draft,
        OfferStatus::Completed,
        OfferStatus::Sent,
        OfferStatus::Shared,
        OfferStatus::Archived,
        OfferStatus::OfferSent,
        OfferStatus::AwaitingResponse,
        OfferStatus::OfferAccepted,
        OfferStatus::OfferRejected,
        OfferStatus::OfferExpired,
    ];

    #[test]
    fn test_valid_edges() {
        assert!(can_transition(OfferStatus::Draft, OfferStatus::Completed));
        assert!(can_transition(OfferStatus::Completed, OfferStatus::Sent));
        assert!(can_transition(OfferStatus::Sent, OfferStatus::Shared));
        assert!(can_transition(OfferStatus::Shared, OfferStatus::Sent));
        assert!(can_transition(
            OfferStatus::OfferSent,
            OfferStatus::AwaitingResponse
        ));
        assert!(can_transition(
            OfferStatus::AwaitingResponse,
            OfferStatus::OfferExpired
        ));
        assert!(can_transition(OfferStatus::OfferSent, OfferStatus::Archived));
    }

    #[test]
    fn test_terminal_states_are_sinks() {
        for terminal in ALL_STATUSES.iter().filter(|s| s.is_terminal()) {
            for target in ALL_STATUSES {
                assert!(
                    !can_transition(*terminal, target),
                    "unexpected edge {terminal} -> {target}"
                );
            }
        }
    }

    #[test]
    fn test_every_non_edge_is_rejected_with_both_names() {
        for from in ALL_STATUSES {
            for to in ALL_STATUSES {
                if can_transition(from, to) {
                    assert_eq!(apply(from, to).unwrap(), to);
                } else {
                    let err = apply(from, to).unwrap_err();
                    match err {
                        CoreError::InvalidTransition { from: f, to: t } => {
                            assert_eq!(f, from.to_string());
                            assert_eq!(t, to.to_string());
                        }
                        other => panic!("unexpected error: {other}"),
                    }
                }
            }
        }
    }

    #[test]
    fn test_no_awaiting_response_self_edge() {
        // Repeat follow-ups bump counters without a transition.
        assert!(!can_transition(
            OfferStatus::AwaitingResponse,
            OfferStatus::AwaitingResponse
        ));
    }

    fn history_entry() -> StatusHistoryEntry {
        StatusHistoryEntry {
            status: OfferStatus::AwaitingResponse,
            timestamp: Utc::now(),
            actor: SYSTEM_ACTOR.to_string(),
            reason: Some("follow-up".to_string()),
        }
    }

    #[tokio::test]
    async fn test_apply_persisted_writes_status_and_history() {
        let store = MemoryStore::new();
        store
            .create("reports", "r1", serde_json::json!({"status": "offer_sent"}))
            .await
            .unwrap();

        let outcome = apply_persisted(
            &store,
            "reports",
            "r1",
            OfferStatus::OfferSent,
            OfferStatus::AwaitingResponse,
            history_entry(),
            Some(serde_json::json!({"follow_up_attempts": 1})),
        )
        .await
        .unwrap();

        assert_eq!(outcome, TransitionOutcome::Applied(OfferStatus::AwaitingResponse));
        let doc = store.get("reports", "r1").await.unwrap().unwrap();
        assert_eq!(doc.data["status"], "awaiting_response");
        assert_eq!(doc.data["follow_up_attempts"], 1);
        assert_eq!(doc.data["status_history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_persisted_invalid_edge_leaves_document_untouched() {
        let store = MemoryStore::new();
        store
            .create("reports", "r1", serde_json::json!({"status": "archived"}))
            .await
            .unwrap();

        let result = apply_persisted(
            &store,
            "reports",
            "r1",
            OfferStatus::Archived,
            OfferStatus::Sent,
            history_entry(),
            None,
        )
        .await;
        assert!(matches!(
            result,
            Err(CoreError::InvalidTransition { .. })
        ));

        let doc = store.get("reports", "r1").await.unwrap().unwrap();
        assert_eq!(doc.data["status"], "archived");
        assert!(doc.data.get("status_history").is_none());
    }

    #[tokio::test]
    async fn test_apply_persisted_detects_concurrent_move() {
        let store = MemoryStore::new();
        // Stored status already moved past what the caller read.
        store
            .create(
                "reports",
                "r1",
                serde_json::json!({"status": "offer_accepted"}),
            )
            .await
            .unwrap();

        let outcome = apply_persisted(
            &store,
            "reports",
            "r1",
            OfferStatus::OfferSent,
            OfferStatus::AwaitingResponse,
            history_entry(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(outcome, TransitionOutcome::Superseded);
    }

    #[tokio::test]
    async fn test_apply_persisted_handles_legacy_pending_spelling() {
        let store = MemoryStore::new();
        store
            .create("reports", "r1", serde_json::json!({"status": "pending"}))
            .await
            .unwrap();

        let outcome = apply_persisted(
            &store,
            "reports",
            "r1",
            OfferStatus::OfferSent,
            OfferStatus::AwaitingResponse,
            history_entry(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(outcome, TransitionOutcome::Applied(OfferStatus::AwaitingResponse));

        let doc = store.get("reports", "r1").await.unwrap().unwrap();
        // Normalized spelling after the first state-machine write.
        assert_eq!(doc.data["status"], "awaiting_response");
    }
}
