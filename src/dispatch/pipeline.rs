//! # Email Dispatch Pipeline
//!
//! Validates outbound mail requests, filters suppressed recipients,
//! persists a queued mail record, and hands off to the provider. The mode
//! gate (restricted/disabled) runs before suppression filtering; "nothing
//! sent" outcomes are structured results, never errors, so callers can
//! distinguish them from invalid input.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::Identity;
use crate::config::{CoreConfig, EmailMode};
use crate::constants::{
    MAIL_AUDIT_COLLECTION, MAIL_QUEUE_COLLECTION, MAX_RECIPIENTS_PER_BULK_ITEM,
    MAX_RECIPIENTS_PER_CALL, PROVIDER_SEND_TIMEOUT_SECS,
};
use crate::error::{CoreError, Result};
use crate::models::{MailRecord, MailStatus, TemplateRef};
use crate::store::DocumentStore;
use crate::suppression::{normalize_address, SuppressionRegistry};

use super::provider::{MailProvider, OutboundMessage};

/// Caller-facing queue request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuePayload {
    pub to: Vec<String>,
    pub subject: String,
    pub template_name: String,
    #[serde(default)]
    pub template_data: HashMap<String, Value>,
    #[serde(default)]
    pub reply_to: Option<String>,
}

/// Why a call enqueued nothing despite being well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueSkipReason {
    AllRecipientsSuppressed,
    DevelopmentModeRestriction,
    EmailDisabled,
}

/// Structured dispatch outcome; counts are recipients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueResult {
    pub enqueued: usize,
    pub suppressed: usize,
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<QueueSkipReason>,
    #[serde(default)]
    pub message_ids: Vec<String>,
    /// Set when the provider rejected the handoff; the record stays persisted
    /// as `failed` and the retry scheduler owns it from there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_error: Option<String>,
}

/// One item's failure inside a bulk call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemError {
    pub index: usize,
    pub error: String,
}

/// Aggregated outcome of a bulk call. Item failures accumulate here; they
/// never abort sibling items and never turn into an `Err`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkQueueResult {
    pub enqueued: usize,
    pub suppressed: usize,
    pub skipped: usize,
    #[serde(default)]
    pub message_ids: Vec<String>,
    #[serde(default)]
    pub errors: Vec<BulkItemError>,
}

pub struct EmailDispatchPipeline {
    store: Arc<dyn DocumentStore>,
    registry: Arc<SuppressionRegistry>,
    provider: Arc<dyn MailProvider>,
    config: Arc<CoreConfig>,
}

impl EmailDispatchPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<SuppressionRegistry>,
        provider: Arc<dyn MailProvider>,
        config: Arc<CoreConfig>,
    ) -> Self {
        Self {
            store,
            registry,
            provider,
            config,
        }
    }

    /// Queue one message. Validation happens before any side effect;
    /// suppression and mode restrictions are success results with zero
    /// enqueued, not errors.
    pub async fn queue(
        &self,
        caller: Option<&Identity>,
        payload: QueuePayload,
    ) -> Result<QueueResult> {
        let caller = caller.ok_or(CoreError::Unauthenticated)?;
        self.validate(&payload, MAX_RECIPIENTS_PER_CALL)?;

        let recipients = normalize_recipients(&payload.to);

        // Mode gate, before suppression filtering.
        match self.config.email.mode {
            EmailMode::Disabled => {
                info!(
                    template = %payload.template_name,
                    recipients = recipients.len(),
                    "email delivery disabled, skipping dispatch"
                );
                return Ok(QueueResult {
                    skipped: recipients.len(),
                    reason: Some(QueueSkipReason::EmailDisabled),
                    ..Default::default()
                });
            }
            EmailMode::Restricted => {
                if recipients.iter().any(|r| !self.config.domain_allowed(r)) {
                    warn!(
                        template = %payload.template_name,
                        recipients = ?recipients,
                        "recipients outside allowed domains in restricted mode"
                    );
                    return Ok(QueueResult {
                        skipped: recipients.len(),
                        reason: Some(QueueSkipReason::DevelopmentModeRestriction),
                        ..Default::default()
                    });
                }
            }
            EmailMode::Live => {}
        }

        let mut allowed = Vec::new();
        let mut suppressed = 0usize;
        for recipient in &recipients {
            if self.registry.is_suppressed(recipient).await? {
                suppressed += 1;
            } else {
                allowed.push(recipient.clone());
            }
        }

        if allowed.is_empty() {
            info!(
                template = %payload.template_name,
                suppressed,
                "all recipients suppressed, nothing enqueued"
            );
            return Ok(QueueResult {
                suppressed,
                reason: Some(QueueSkipReason::AllRecipientsSuppressed),
                ..Default::default()
            });
        }

        let message_id = Uuid::new_v4().to_string();
        let record = self.build_record(&allowed, &payload, &message_id);
        self.store
            .create(
                MAIL_QUEUE_COLLECTION,
                &message_id,
                serde_json::to_value(&record)?,
            )
            .await?;

        self.append_dispatch_audit(caller, &allowed, &payload.template_name, &message_id)
            .await?;

        let provider_error = self.hand_off(&message_id, &record).await;

        info!(
            message_id = %message_id,
            sender = %caller.uid,
            template = %payload.template_name,
            enqueued = allowed.len(),
            suppressed,
            "mail queued"
        );
        Ok(QueueResult {
            enqueued: allowed.len(),
            suppressed,
            skipped: 0,
            reason: None,
            message_ids: vec![message_id],
            provider_error,
        })
    }

    /// Queue many messages; each item is processed independently with the
    /// tighter per-item recipient cap.
    pub async fn queue_bulk(
        &self,
        caller: Option<&Identity>,
        items: Vec<QueuePayload>,
    ) -> Result<BulkQueueResult> {
        let caller = caller.ok_or(CoreError::Unauthenticated)?;

        let mut result = BulkQueueResult::default();
        for (index, item) in items.into_iter().enumerate() {
            if let Err(e) = self.validate(&item, MAX_RECIPIENTS_PER_BULK_ITEM) {
                result.errors.push(BulkItemError {
                    index,
                    error: e.to_string(),
                });
                continue;
            }
            match self.queue(Some(caller), item).await {
                Ok(item_result) => {
                    result.enqueued += item_result.enqueued;
                    result.suppressed += item_result.suppressed;
                    result.skipped += item_result.skipped;
                    result.message_ids.extend(item_result.message_ids);
                }
                Err(e) => {
                    error!(index, error = %e, "bulk queue item failed");
                    result.errors.push(BulkItemError {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(result)
    }

    fn validate(&self, payload: &QueuePayload, max_recipients: usize) -> Result<()> {
        if payload.to.is_empty() {
            return Err(CoreError::validation("to", "at least one recipient required"));
        }
        if payload.to.len() > max_recipients {
            return Err(CoreError::validation(
                "to",
                format!("recipient count {} exceeds limit {max_recipients}", payload.to.len()),
            ));
        }
        for address in &payload.to {
            if !is_valid_address(address.trim()) {
                return Err(CoreError::validation(
                    "to",
                    format!("invalid recipient address: {address}"),
                ));
            }
        }
        if payload.subject.trim().is_empty() {
            return Err(CoreError::validation("subject", "must not be empty"));
        }
        if payload.template_name.trim().is_empty() {
            return Err(CoreError::validation("template_name", "must not be empty"));
        }
        if !self
            .config
            .email
            .allowed_templates
            .iter()
            .any(|t| t == &payload.template_name)
        {
            return Err(CoreError::validation(
                "template_name",
                format!("unknown template: {}", payload.template_name),
            ));
        }
        Ok(())
    }

    fn build_record(
        &self,
        recipients: &[String],
        payload: &QueuePayload,
        message_id: &str,
    ) -> MailRecord {
        // Brand fields win conflicts; callers cannot override brand identity.
        let mut data = payload.template_data.clone();
        for (key, value) in &self.config.email.brand_fields {
            data.insert(key.clone(), json!(value));
        }

        MailRecord {
            to: recipients.to_vec(),
            from: self.config.email.from_address.clone(),
            reply_to: payload
                .reply_to
                .clone()
                .or_else(|| self.config.email.reply_to.clone()),
            subject: payload.subject.clone(),
            template: TemplateRef {
                name: payload.template_name.clone(),
                data,
            },
            status: MailStatus::Queued,
            message_id: message_id.to_string(),
            provider_message_id: None,
            retry_count: 0,
            created_at: Utc::now(),
            sent_at: None,
            failed_at: None,
            last_error: None,
            delivery_status: None,
            delivery_updated_at: None,
        }
    }

    /// Hand the queued record to the provider and persist the outcome.
    /// Returns the provider error message, if any; the queue call itself
    /// still succeeds.
    async fn hand_off(&self, message_id: &str, record: &MailRecord) -> Option<String> {
        let message = OutboundMessage {
            to: record.to.clone(),
            from: record.from.clone(),
            reply_to: record.reply_to.clone(),
            subject: record.subject.clone(),
            template: record.template.clone(),
        };

        let send = tokio::time::timeout(
            Duration::from_secs(PROVIDER_SEND_TIMEOUT_SECS),
            self.provider.send(&message),
        )
        .await
        .unwrap_or_else(|_| {
            Err(CoreError::provider(
                format!("send timed out after {PROVIDER_SEND_TIMEOUT_SECS}s"),
                true,
            ))
        });

        let patch = match &send {
            Ok(response) => json!({
                "status": "sent",
                "provider_message_id": response.provider_message_id,
                "sent_at": Utc::now(),
            }),
            Err(e) => json!({
                "status": "failed",
                "failed_at": Utc::now(),
                "last_error": e.to_string(),
            }),
        };

        if let Err(store_err) = self
            .store
            .update(MAIL_QUEUE_COLLECTION, message_id, patch, None)
            .await
        {
            error!(message_id, error = %store_err, "failed to persist send outcome");
        }

        match send {
            Ok(_) => None,
            Err(e) => {
                warn!(message_id, error = %e, "provider rejected message, left for retry");
                Some(e.to_string())
            }
        }
    }

    async fn append_dispatch_audit(
        &self,
        caller: &Identity,
        recipients: &[String],
        template: &str,
        message_id: &str,
    ) -> Result<()> {
        let entry = json!({
            "sender": caller.uid,
            "recipients": recipients,
            "template": template,
            "message_id": message_id,
            "timestamp": Utc::now(),
        });
        self.store
            .create(MAIL_AUDIT_COLLECTION, &Uuid::new_v4().to_string(), entry)
            .await?;
        Ok(())
    }
}

/// Trim, lowercase, and deduplicate recipients, preserving first-seen order.
fn normalize_recipients(raw: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .map(|r| normalize_address(r))
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

/// Basic `local@domain.tld` shape check. Not an RFC validator; the provider
/// has the final word.
fn is_valid_address(address: &str) -> bool {
    let Some((local, domain)) = address.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((name, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !name.is_empty() && tld.len() >= 2
}
