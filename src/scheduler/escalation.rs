//! # Offer Escalation Scheduler
//!
//! Daily sweep over actionable offers. Three independent checks per offer:
//! follow-up after 7 days (capped attempts), branch-admin escalation after
//! 14 days, and expiry once the validity period lapses. A failure on one
//! offer is caught and logged, never aborting the sweep; overlapping runs
//! are resolved by the state machine's conditional writes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::auth::Identity;
use crate::config::CoreConfig;
use crate::constants::{OFFERS_COLLECTION, SYSTEM_ACTOR, USERS_COLLECTION};
use crate::dispatch::{EmailDispatchPipeline, QueuePayload};
use crate::error::{CoreError, Result};
use crate::models::user::BRANCH_ADMIN_ROLE;
use crate::models::{NotificationKind, NotificationRecord, OfferRecord, StatusHistoryEntry, UserRecord};
use crate::notifications::NotificationSink;
use crate::state_machine::{self, OfferStatus, TransitionOutcome};
use crate::store::{Document, DocumentStore, Filter, FilterOp, Precondition, StoreError};

/// Aggregate counts for one sweep run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscalationSweepOutcome {
    pub scanned: usize,
    pub follow_up_count: usize,
    pub escalation_count: usize,
    pub expired_count: usize,
    /// Offers where at least one check failed; logged with the offer id.
    pub failed: usize,
}

#[derive(Default)]
struct OfferFlags {
    followed_up: bool,
    escalated: bool,
    expired: bool,
    errored: bool,
}

pub struct EscalationScheduler {
    store: Arc<dyn DocumentStore>,
    pipeline: Arc<EmailDispatchPipeline>,
    notifications: Arc<dyn NotificationSink>,
    config: Arc<CoreConfig>,
}

impl EscalationScheduler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        pipeline: Arc<EmailDispatchPipeline>,
        notifications: Arc<dyn NotificationSink>,
        config: Arc<CoreConfig>,
    ) -> Self {
        Self {
            store,
            pipeline,
            notifications,
            config,
        }
    }

    /// Daily cron entry point.
    pub async fn run_sweep(&self) -> Result<EscalationSweepOutcome> {
        self.run_sweep_at(Utc::now()).await
    }

    /// Sweep with an explicit clock.
    pub async fn run_sweep_at(&self, now: DateTime<Utc>) -> Result<EscalationSweepOutcome> {
        // Query on raw stored spellings so legacy `pending` documents are
        // picked up alongside the normalized statuses.
        let actionable: Vec<Value> = self
            .config
            .scheduling
            .actionable_statuses
            .iter()
            .flat_map(|s| s.wire_aliases())
            .map(|s| json!(s))
            .collect();

        let offers = self
            .store
            .query(
                OFFERS_COLLECTION,
                &[Filter::new("status", FilterOp::In, Value::Array(actionable))],
                None,
                None,
            )
            .await?;

        let mut outcome = EscalationSweepOutcome {
            scanned: offers.len(),
            ..Default::default()
        };

        for doc in &offers {
            let flags = self.process_offer(doc, now).await;
            outcome.follow_up_count += usize::from(flags.followed_up);
            outcome.escalation_count += usize::from(flags.escalated);
            outcome.expired_count += usize::from(flags.expired);
            outcome.failed += usize::from(flags.errored);
        }

        info!(
            scanned = outcome.scanned,
            follow_up_count = outcome.follow_up_count,
            escalation_count = outcome.escalation_count,
            expired_count = outcome.expired_count,
            failed = outcome.failed,
            "escalation sweep complete"
        );
        Ok(outcome)
    }

    /// The three checks run independently; each catches its own failures so
    /// one broken check never starves the others or sibling offers.
    async fn process_offer(&self, doc: &Document, now: DateTime<Utc>) -> OfferFlags {
        let mut flags = OfferFlags::default();

        let offer: OfferRecord = match doc.to_model() {
            Ok(offer) => offer,
            Err(e) => {
                error!(offer_id = %doc.id, error = %e, "unreadable offer record, skipping");
                flags.errored = true;
                return flags;
            }
        };
        let mut current = offer.status;
        let days_since_sent = offer.sent_at.map(|sent_at| (now - sent_at).num_days());

        let scheduling = &self.config.scheduling;
        if let Some(days) = days_since_sent {
            if days >= scheduling.follow_up_after_days
                && offer.follow_up_attempts < scheduling.max_follow_up_attempts
            {
                match self.follow_up(doc, &offer, current, now, days).await {
                    Ok(Some(new_status)) => {
                        current = new_status;
                        flags.followed_up = true;
                    }
                    Ok(None) => {} // superseded by a concurrent run
                    Err(e) => {
                        error!(offer_id = %doc.id, error = %e, "follow-up failed");
                        flags.errored = true;
                    }
                }
            }

            if days >= scheduling.escalation_after_days {
                match self.escalate(doc, &offer, days).await {
                    Ok(escalated) => flags.escalated = escalated,
                    Err(e) => {
                        error!(offer_id = %doc.id, error = %e, "escalation failed");
                        flags.errored = true;
                    }
                }
            }
        }

        if offer.valid_until.is_some_and(|valid_until| valid_until < now) {
            match self.expire(doc, current, now).await {
                Ok(expired) => flags.expired = expired,
                Err(e) => {
                    error!(offer_id = %doc.id, error = %e, "expiry transition failed");
                    flags.errored = true;
                }
            }
        }

        flags
    }

    /// Transition to `awaiting_response` (or bump counters when already
    /// there), then notify the owning inspector. The status change, counter
    /// bump, and history append land in one conditional write.
    async fn follow_up(
        &self,
        doc: &Document,
        offer: &OfferRecord,
        current: OfferStatus,
        now: DateTime<Utc>,
        days: i64,
    ) -> Result<Option<OfferStatus>> {
        let attempts = offer.follow_up_attempts + 1;
        let entry = StatusHistoryEntry {
            status: OfferStatus::AwaitingResponse,
            timestamp: now,
            actor: SYSTEM_ACTOR.to_string(),
            reason: Some(format!("follow-up attempt {attempts} after {days} days")),
        };
        let counters = json!({
            "follow_up_attempts": attempts,
            "last_follow_up_at": now,
        });

        let new_status = if current == OfferStatus::AwaitingResponse {
            // Already transitioned by an earlier sweep; bump counters only,
            // still guarded against concurrent movement.
            match self.bump_without_transition(doc, entry, counters).await? {
                true => OfferStatus::AwaitingResponse,
                false => return Ok(None),
            }
        } else {
            match state_machine::apply_persisted(
                self.store.as_ref(),
                OFFERS_COLLECTION,
                &doc.id,
                current,
                OfferStatus::AwaitingResponse,
                entry,
                Some(counters),
            )
            .await?
            {
                TransitionOutcome::Applied(status) => status,
                TransitionOutcome::Superseded => return Ok(None),
            }
        };

        self.notify_inspector(doc, offer, attempts, days).await?;
        Ok(Some(new_status))
    }

    async fn bump_without_transition(
        &self,
        doc: &Document,
        entry: StatusHistoryEntry,
        counters: Value,
    ) -> Result<bool> {
        let mut history = doc
            .data
            .get("status_history")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        history.push(serde_json::to_value(&entry)?);

        let mut patch = counters;
        patch
            .as_object_mut()
            .expect("counters patch is an object")
            .insert("status_history".to_string(), Value::Array(history));

        let result = self
            .store
            .update(
                OFFERS_COLLECTION,
                &doc.id,
                patch,
                Some(Precondition::FieldEquals(
                    "status".to_string(),
                    json!(OfferStatus::AwaitingResponse.to_string()),
                )),
            )
            .await;
        match result {
            Ok(()) => Ok(true),
            Err(StoreError::PreconditionFailed { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn notify_inspector(
        &self,
        doc: &Document,
        offer: &OfferRecord,
        attempts: u32,
        days: i64,
    ) -> Result<()> {
        let Some(inspector_id) = offer.created_by.as_deref() else {
            warn!(offer_id = %doc.id, "offer has no owning inspector, skipping notification");
            return Ok(());
        };
        let inspector = self.load_user(inspector_id).await?;

        self.pipeline
            .queue(
                Some(&Identity::system()),
                QueuePayload {
                    to: vec![inspector.email.clone()],
                    subject: format!("Offer awaiting response for {days} days"),
                    template_name: "offer_follow_up".to_string(),
                    template_data: [
                        ("offer_id".to_string(), json!(doc.id)),
                        ("days_since_sent".to_string(), json!(days)),
                        ("attempt".to_string(), json!(attempts)),
                    ]
                    .into(),
                    reply_to: None,
                },
            )
            .await?;

        self.notifications
            .create(NotificationRecord {
                user_id: inspector_id.to_string(),
                kind: NotificationKind::OfferFollowUp,
                title: "Offer follow-up sent".to_string(),
                message: format!(
                    "Offer {} has been awaiting a customer response for {days} days (follow-up {attempts})",
                    doc.id
                ),
                link: Some(format!("/reports/{}", doc.id)),
                read: false,
                created_at: Utc::now(),
            })
            .await
    }

    /// Notify the branch admin. A branch without an admin is logged and
    /// skipped, never an error that blocks other offers.
    async fn escalate(&self, doc: &Document, offer: &OfferRecord, days: i64) -> Result<bool> {
        let Some(branch_id) = offer.branch_id.as_deref() else {
            warn!(offer_id = %doc.id, "offer has no branch, skipping escalation");
            return Ok(false);
        };

        let mut admins = self
            .store
            .query(
                USERS_COLLECTION,
                &[
                    Filter::eq("branch_id", json!(branch_id)),
                    Filter::eq("role", json!(BRANCH_ADMIN_ROLE)),
                ],
                None,
                Some(1),
            )
            .await?;
        let Some(admin_doc) = admins.pop() else {
            error!(
                offer_id = %doc.id,
                branch_id = %branch_id,
                "no branch admin found, escalation skipped"
            );
            return Ok(false);
        };
        let admin: UserRecord = admin_doc.to_model()?;

        self.pipeline
            .queue(
                Some(&Identity::system()),
                QueuePayload {
                    to: vec![admin.email.clone()],
                    subject: format!("Escalation: offer unanswered for {days} days"),
                    template_name: "offer_escalation".to_string(),
                    template_data: [
                        ("offer_id".to_string(), json!(doc.id)),
                        ("days_since_sent".to_string(), json!(days)),
                        ("branch_id".to_string(), json!(branch_id)),
                    ]
                    .into(),
                    reply_to: None,
                },
            )
            .await?;

        self.notifications
            .create(NotificationRecord {
                user_id: admin_doc.id.clone(),
                kind: NotificationKind::OfferEscalation,
                title: "Offer requires attention".to_string(),
                message: format!("Offer {} has gone unanswered for {days} days", doc.id),
                link: Some(format!("/reports/{}", doc.id)),
                read: false,
                created_at: Utc::now(),
            })
            .await?;
        Ok(true)
    }

    async fn expire(
        &self,
        doc: &Document,
        current: OfferStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let entry = StatusHistoryEntry {
            status: OfferStatus::OfferExpired,
            timestamp: now,
            actor: SYSTEM_ACTOR.to_string(),
            reason: Some("validity period expired".to_string()),
        };
        match state_machine::apply_persisted(
            self.store.as_ref(),
            OFFERS_COLLECTION,
            &doc.id,
            current,
            OfferStatus::OfferExpired,
            entry,
            None,
        )
        .await?
        {
            TransitionOutcome::Applied(_) => Ok(true),
            TransitionOutcome::Superseded => Ok(false),
        }
    }

    async fn load_user(&self, user_id: &str) -> Result<UserRecord> {
        let doc = self
            .store
            .get(USERS_COLLECTION, user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(USERS_COLLECTION, user_id))?;
        Ok(doc.to_model()?)
    }
}
