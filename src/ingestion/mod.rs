//! # Delivery Event Ingestion
//!
//! Receives provider webhook callbacks, updates delivery status on mail
//! records, and feeds the suppression registry. Event classification is the
//! single match below; replays of the same provider event id write nothing
//! (the suppression audit trail keys on `(address, event_id)` and the event
//! log keys on the event id itself).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use tracing::{info, warn};

use crate::constants::{DELIVERY_EVENTS_COLLECTION, MAIL_QUEUE_COLLECTION, SYSTEM_ACTOR};
use crate::error::Result;
use crate::models::SuppressionReason;
use crate::store::{DocumentStore, Filter, StoreError};
use crate::suppression::SuppressionRegistry;
use crate::utils::serde::deserialize_optional_flexible_timestamp;

type HmacSha256 = Hmac<Sha256>;

/// One provider callback event, as posted to the webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvent {
    /// Provider-unique event id; the idempotency key for replays.
    pub event_id: String,
    /// Event kind string as the provider spells it.
    #[serde(alias = "type")]
    pub kind: String,
    pub email: String,
    /// Provider message id linking back to a mail record.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Bounce subtype (`hard`/`soft`) when `kind` is a bounce.
    #[serde(default)]
    pub bounce_type: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_flexible_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// What an event means for our records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// Delivery confirmed.
    Delivered,
    /// Recipient must be suppressed.
    Suppressing(SuppressionReason),
    /// Open/click style signal; recorded, nothing suppressed.
    Informational,
    /// Kind we do not recognize; logged and counted, never an error.
    Unknown,
}

/// Classify a provider event kind.
pub fn classify(event: &ProviderEvent) -> EventClass {
    match event.kind.as_str() {
        "delivered" | "delivery" => EventClass::Delivered,
        "bounce" | "bounced" => {
            let soft = event
                .bounce_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case("soft"));
            if soft {
                EventClass::Suppressing(SuppressionReason::SoftBounce)
            } else {
                EventClass::Suppressing(SuppressionReason::HardBounce)
            }
        }
        "dropped" | "blocked" => EventClass::Suppressing(SuppressionReason::Blocked),
        "spam_complaint" | "complaint" | "spam" => {
            EventClass::Suppressing(SuppressionReason::SpamComplaint)
        }
        "unsubscribe" | "unsubscribed" => EventClass::Suppressing(SuppressionReason::Unsubscribed),
        "open" | "opened" | "click" | "clicked" => EventClass::Informational,
        _ => EventClass::Unknown,
    }
}

/// Outcome of ingesting one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Suppressed,
    DeliveryUpdated,
    /// Success/informational event with no matching mail record; a warning,
    /// not an error.
    NoMatchingRecord,
    DuplicateEvent,
    UnknownKind,
}

pub struct DeliveryEventIngestion {
    store: Arc<dyn DocumentStore>,
    registry: Arc<SuppressionRegistry>,
    provider_name: String,
}

impl DeliveryEventIngestion {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<SuppressionRegistry>,
        provider_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            provider_name: provider_name.into(),
        }
    }

    /// Process one provider callback event. Signature verification happens
    /// at the webhook boundary before this is called.
    pub async fn ingest(&self, event: &ProviderEvent) -> Result<IngestOutcome> {
        match classify(event) {
            EventClass::Suppressing(reason) => self.handle_suppressing(event, reason).await,
            EventClass::Delivered => self.handle_status_update(event, "delivered").await,
            EventClass::Informational => self.handle_status_update(event, &event.kind).await,
            EventClass::Unknown => {
                warn!(
                    event_id = %event.event_id,
                    kind = %event.kind,
                    "unrecognized delivery event kind, ignoring"
                );
                Ok(IngestOutcome::UnknownKind)
            }
        }
    }

    async fn handle_suppressing(
        &self,
        event: &ProviderEvent,
        reason: SuppressionReason,
    ) -> Result<IngestOutcome> {
        let outcome = self
            .registry
            .suppress(
                &event.email,
                reason,
                Some(&self.provider_name),
                event.message_id.as_deref(),
                Some(&event.event_id),
                SYSTEM_ACTOR,
            )
            .await?;

        if outcome == crate::suppression::SuppressOutcome::DuplicateEvent {
            return Ok(IngestOutcome::DuplicateEvent);
        }

        self.append_event_log(event).await?;

        // Surface the failure on the originating mail record so operators
        // see why the address went dark.
        if let Some(doc) = self.find_mail_record(event).await? {
            let detail = event
                .reason
                .clone()
                .unwrap_or_else(|| format!("{reason} reported by provider"));
            self.store
                .update(
                    MAIL_QUEUE_COLLECTION,
                    &doc.id,
                    json!({
                        "delivery_status": event.kind,
                        "delivery_updated_at": event.timestamp.unwrap_or_else(Utc::now),
                        "last_error": detail,
                    }),
                    None,
                )
                .await?;
        }

        info!(
            event_id = %event.event_id,
            address = %event.email,
            reason = %reason,
            "suppression event ingested"
        );
        Ok(IngestOutcome::Suppressed)
    }

    async fn handle_status_update(
        &self,
        event: &ProviderEvent,
        status: &str,
    ) -> Result<IngestOutcome> {
        self.append_event_log(event).await?;

        let Some(doc) = self.find_mail_record(event).await? else {
            warn!(
                event_id = %event.event_id,
                message_id = ?event.message_id,
                kind = %event.kind,
                "delivery event for unknown mail record"
            );
            return Ok(IngestOutcome::NoMatchingRecord);
        };

        self.store
            .update(
                MAIL_QUEUE_COLLECTION,
                &doc.id,
                json!({
                    "delivery_status": status,
                    "delivery_updated_at": event.timestamp.unwrap_or_else(Utc::now),
                }),
                None,
            )
            .await?;
        Ok(IngestOutcome::DeliveryUpdated)
    }

    async fn find_mail_record(
        &self,
        event: &ProviderEvent,
    ) -> Result<Option<crate::store::Document>> {
        let Some(message_id) = &event.message_id else {
            return Ok(None);
        };
        let mut docs = self
            .store
            .query(
                MAIL_QUEUE_COLLECTION,
                &[Filter::eq("provider_message_id", json!(message_id))],
                None,
                Some(1),
            )
            .await?;
        Ok(docs.pop())
    }

    /// Append to the delivery event log, keyed by event id so replays land
    /// on the existing entry.
    async fn append_event_log(&self, event: &ProviderEvent) -> Result<()> {
        let entry = json!({
            "event_id": event.event_id,
            "kind": event.kind,
            "email": crate::suppression::normalize_address(&event.email),
            "message_id": event.message_id,
            "provider": self.provider_name,
            "timestamp": event.timestamp.unwrap_or_else(Utc::now),
            "ingested_at": Utc::now(),
        });
        match self
            .store
            .create(DELIVERY_EVENTS_COLLECTION, &event.event_id, entry)
            .await
        {
            Ok(()) | Err(StoreError::AlreadyExists { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Verify a webhook signature: hex-encoded HMAC-SHA256 of the raw body.
/// Comparison is constant-time via the Mac verification.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Produce the signature a provider would attach; used by tests and local
/// tooling.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
