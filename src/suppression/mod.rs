//! # Suppression Registry
//!
//! Tracks recipient addresses that must not receive mail: bounces,
//! complaints, unsubscribes, and manual blocks. Presence of a record is
//! authoritative; the dispatch pipeline treats it as an unconditional skip.
//!
//! Every suppress/unsuppress appends an immutable audit entry. Entries
//! driven by provider events key on `(address, event_id)` so a replayed
//! webhook cannot double-suppress or double-log.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::constants::{SUPPRESSIONS_COLLECTION, SUPPRESSION_AUDIT_COLLECTION};
use crate::error::{CoreError, Result};
use crate::models::{
    SuppressionAction, SuppressionAuditEntry, SuppressionReason, SuppressionRecord,
};
use crate::store::{DocumentStore, OrderBy, StoreError};

/// Trim and lowercase an address; the canonical form used as a document key
/// and compared everywhere in the core.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Outcome of a suppress call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressOutcome {
    /// New suppression record created.
    Created,
    /// Existing record updated (reason text merged).
    Merged,
    /// Same provider event seen before; nothing written.
    DuplicateEvent,
}

pub struct SuppressionRegistry {
    store: Arc<dyn DocumentStore>,
}

impl SuppressionRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Exact-match lookup on the normalized address.
    pub async fn is_suppressed(&self, address: &str) -> Result<bool> {
        let address = normalize_address(address);
        Ok(self
            .store
            .get(SUPPRESSIONS_COLLECTION, &address)
            .await?
            .is_some())
    }

    /// Idempotent upsert. Repeated suppression for the same address merges
    /// the reason text rather than erroring; a replayed provider event
    /// (same `event_id`) writes nothing at all.
    pub async fn suppress(
        &self,
        address: &str,
        reason: SuppressionReason,
        provider: Option<&str>,
        message_id: Option<&str>,
        event_id: Option<&str>,
        actor: &str,
    ) -> Result<SuppressOutcome> {
        let address = normalize_address(address);
        let now = Utc::now();

        // Replay detection: the audit entry for a provider event has a
        // deterministic id, so an existing one means we already processed
        // this exact event.
        let audit_id = match event_id {
            Some(event_id) => {
                let id = format!("{address}:{event_id}");
                if self
                    .store
                    .get(SUPPRESSION_AUDIT_COLLECTION, &id)
                    .await?
                    .is_some()
                {
                    info!(
                        address = %address,
                        event_id = %event_id,
                        "duplicate suppression event, skipping"
                    );
                    return Ok(SuppressOutcome::DuplicateEvent);
                }
                id
            }
            None => Uuid::new_v4().to_string(),
        };

        let existing = self.store.get(SUPPRESSIONS_COLLECTION, &address).await?;
        let outcome = match existing {
            Some(doc) => {
                let record: SuppressionRecord = doc.to_model()?;
                let merged = merge_reason(&record.reason, reason);
                let mut patch = json!({"reason": merged, "updated_at": now});
                let fields = patch.as_object_mut().unwrap();
                if let Some(provider) = provider {
                    fields.insert("provider".to_string(), json!(provider));
                }
                if let Some(message_id) = message_id {
                    fields.insert("message_id".to_string(), json!(message_id));
                }
                self.store
                    .update(SUPPRESSIONS_COLLECTION, &address, patch, None)
                    .await?;
                SuppressOutcome::Merged
            }
            None => {
                let record = SuppressionRecord {
                    address: address.clone(),
                    reason: reason.to_string(),
                    provider: provider.map(str::to_string),
                    message_id: message_id.map(str::to_string),
                    created_at: now,
                    updated_at: now,
                };
                self.store
                    .create(
                        SUPPRESSIONS_COLLECTION,
                        &address,
                        serde_json::to_value(&record)?,
                    )
                    .await?;
                SuppressOutcome::Created
            }
        };

        self.append_audit(
            &audit_id,
            SuppressionAuditEntry {
                address: address.clone(),
                action: SuppressionAction::Suppressed,
                reason: Some(reason.to_string()),
                actor: actor.to_string(),
                event_id: event_id.map(str::to_string),
                timestamp: now,
            },
        )
        .await?;

        info!(
            address = %address,
            reason = %reason,
            actor = %actor,
            outcome = ?outcome,
            "address suppressed"
        );
        Ok(outcome)
    }

    /// Hard delete, manual admin correction only. Always audit-logged with
    /// the acting identity.
    pub async fn unsuppress(&self, address: &str, actor: &str) -> Result<()> {
        let address = normalize_address(address);
        match self.store.delete(SUPPRESSIONS_COLLECTION, &address).await {
            Ok(()) => {}
            Err(StoreError::NotFound { .. }) => {
                return Err(CoreError::not_found(SUPPRESSIONS_COLLECTION, address));
            }
            Err(e) => return Err(e.into()),
        }

        self.append_audit(
            &Uuid::new_v4().to_string(),
            SuppressionAuditEntry {
                address: address.clone(),
                action: SuppressionAction::Unsuppressed,
                reason: None,
                actor: actor.to_string(),
                event_id: None,
                timestamp: Utc::now(),
            },
        )
        .await?;

        warn!(address = %address, actor = %actor, "suppression removed by admin");
        Ok(())
    }

    /// Paginated listing, most recently updated first.
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<SuppressionRecord>> {
        let docs = self
            .store
            .query(
                SUPPRESSIONS_COLLECTION,
                &[],
                Some(OrderBy::desc("updated_at")),
                Some(offset + limit),
            )
            .await?;
        docs.into_iter()
            .skip(offset)
            .map(|doc| doc.to_model::<SuppressionRecord>().map_err(CoreError::from))
            .collect()
    }

    async fn append_audit(&self, id: &str, entry: SuppressionAuditEntry) -> Result<()> {
        match self
            .store
            .create(SUPPRESSION_AUDIT_COLLECTION, id, serde_json::to_value(&entry)?)
            .await
        {
            Ok(()) => Ok(()),
            // Deterministic ids can collide when two ingestors race the same
            // event; the first append wins and the trail stays append-only.
            Err(StoreError::AlreadyExists { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Merge a new reason into existing reason text, deduplicated, comma-joined.
fn merge_reason(existing: &str, new: SuppressionReason) -> String {
    let new = new.to_string();
    let mut parts: Vec<&str> = existing
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if !parts.contains(&new.as_str()) {
        parts.push(&new);
    }
    parts.join(", ")
}
