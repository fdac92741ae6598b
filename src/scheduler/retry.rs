//! # Retry Scheduler
//!
//! Periodic sweep over failed mail records: exponential backoff (base 5
//! minutes, factor 3), capped attempts, bounded batch. Invoked every 5
//! minutes by the external cron trigger. Records that exhaust the attempt
//! cap are surfaced at warn level and counted, never silently dropped.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::CoreConfig;
use crate::constants::{MAIL_QUEUE_COLLECTION, PROVIDER_SEND_TIMEOUT_SECS};
use crate::dispatch::{MailProvider, OutboundMessage};
use crate::error::{CoreError, Result};
use crate::models::MailRecord;
use crate::store::{DocumentStore, Filter, FilterOp};

/// Aggregate counts for one sweep run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySweepOutcome {
    pub scanned: usize,
    pub retried: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records that hit the attempt cap during this sweep.
    pub abandoned: usize,
    /// Candidates whose backoff window has not elapsed yet.
    pub skipped_backoff: usize,
}

pub struct RetryScheduler {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn MailProvider>,
    config: Arc<CoreConfig>,
}

impl RetryScheduler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn MailProvider>,
        config: Arc<CoreConfig>,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Cron entry point.
    pub async fn run_sweep(&self) -> Result<RetrySweepOutcome> {
        self.run_sweep_at(Utc::now()).await
    }

    /// Sweep with an explicit clock; per-record failures never abort the
    /// run, only fatal store errors do.
    pub async fn run_sweep_at(&self, now: DateTime<Utc>) -> Result<RetrySweepOutcome> {
        let retry = &self.config.retry;
        let cutoff = now - Duration::hours(retry.lookback_hours);

        let candidates = self
            .store
            .query(
                MAIL_QUEUE_COLLECTION,
                &[
                    Filter::eq("status", json!("failed")),
                    Filter::new("failed_at", FilterOp::Ge, json!(cutoff)),
                    Filter::new("retry_count", FilterOp::Lt, json!(retry.max_attempts)),
                ],
                None,
                Some(retry.batch_limit),
            )
            .await?;

        let mut outcome = RetrySweepOutcome {
            scanned: candidates.len(),
            ..Default::default()
        };

        for doc in candidates {
            let record: MailRecord = match doc.to_model() {
                Ok(record) => record,
                Err(e) => {
                    error!(message_id = %doc.id, error = %e, "unreadable mail record, skipping");
                    outcome.failed += 1;
                    continue;
                }
            };

            let Some(failed_at) = record.failed_at else {
                warn!(message_id = %doc.id, "failed record without failed_at, skipping");
                outcome.failed += 1;
                continue;
            };

            if next_retry_time(failed_at, record.retry_count, retry.base_delay_minutes, retry.backoff_factor) > now {
                outcome.skipped_backoff += 1;
                continue;
            }

            outcome.retried += 1;
            match self.resend(&record).await {
                Ok(provider_message_id) => {
                    let patch = json!({
                        "status": "sent",
                        "provider_message_id": provider_message_id,
                        "sent_at": now,
                        "retry_count": record.retry_count + 1,
                    });
                    if let Err(e) = self
                        .store
                        .update(MAIL_QUEUE_COLLECTION, &doc.id, patch, None)
                        .await
                    {
                        error!(message_id = %doc.id, error = %e, "retry succeeded but update failed");
                        outcome.failed += 1;
                        continue;
                    }
                    info!(
                        message_id = %doc.id,
                        attempt = record.retry_count + 1,
                        "retry delivered"
                    );
                    outcome.succeeded += 1;
                }
                Err(e) => {
                    let attempts = record.retry_count + 1;
                    let patch = json!({
                        "retry_count": attempts,
                        "last_error": e.to_string(),
                    });
                    if let Err(store_err) = self
                        .store
                        .update(MAIL_QUEUE_COLLECTION, &doc.id, patch, None)
                        .await
                    {
                        error!(message_id = %doc.id, error = %store_err, "failed to record retry failure");
                    }
                    if attempts >= retry.max_attempts {
                        warn!(
                            message_id = %doc.id,
                            attempts,
                            error = %e,
                            "mail record abandoned after exhausting retries"
                        );
                        outcome.abandoned += 1;
                    } else {
                        outcome.failed += 1;
                    }
                }
            }
        }

        info!(
            scanned = outcome.scanned,
            retried = outcome.retried,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            abandoned = outcome.abandoned,
            skipped_backoff = outcome.skipped_backoff,
            "retry sweep complete"
        );
        Ok(outcome)
    }

    async fn resend(&self, record: &MailRecord) -> Result<String> {
        let message = OutboundMessage {
            to: record.to.clone(),
            from: record.from.clone(),
            reply_to: record.reply_to.clone(),
            subject: record.subject.clone(),
            template: record.template.clone(),
        };
        let response = tokio::time::timeout(
            StdDuration::from_secs(PROVIDER_SEND_TIMEOUT_SECS),
            self.provider.send(&message),
        )
        .await
        .unwrap_or_else(|_| {
            Err(CoreError::provider(
                format!("send timed out after {PROVIDER_SEND_TIMEOUT_SECS}s"),
                true,
            ))
        })?;
        Ok(response.provider_message_id)
    }
}

/// `failed_at + base * factor^retry_count`.
pub fn next_retry_time(
    failed_at: DateTime<Utc>,
    retry_count: u32,
    base_delay_minutes: i64,
    backoff_factor: u32,
) -> DateTime<Utc> {
    let factor = i64::from(backoff_factor.pow(retry_count.min(10)));
    failed_at + Duration::minutes(base_delay_minutes * factor)
}
