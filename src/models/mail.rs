//! Mail records owned by the dispatch pipeline.
//!
//! Mutated only by the pipeline, the retry scheduler, and delivery event
//! ingestion; never by UI code. A record terminates in `sent` or permanently
//! `failed` after retry exhaustion, and is never deleted by the core.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::serde::deserialize_optional_flexible_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailStatus {
    Queued,
    Processing,
    Sent,
    Failed,
}

impl fmt::Display for MailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Sent => "sent",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Template name plus the merged data handed to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRef {
    pub name: String,
    #[serde(default)]
    pub data: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailRecord {
    /// Normalized lowercase recipient addresses, order preserved.
    pub to: Vec<String>,
    pub from: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    pub subject: String,
    pub template: TemplateRef,
    pub status: MailStatus,
    /// Globally-unique id assigned at queue time.
    pub message_id: String,
    /// Provider-assigned id, set once the provider accepts the message.
    #[serde(default)]
    pub provider_message_id: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_optional_flexible_timestamp")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_flexible_timestamp")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Latest delivery event from the provider (delivered/opened/clicked...).
    #[serde(default)]
    pub delivery_status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_flexible_timestamp")]
    pub delivery_updated_at: Option<DateTime<Utc>>,
}
