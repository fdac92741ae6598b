//! # Roofline Core Configuration System
//!
//! Explicit, validated configuration resolved once per process lifecycle.
//! Components receive the relevant section at construction time; nothing in
//! the core reads global state ad hoc.
//!
//! Sources are layered: built-in defaults, an optional YAML file
//! (`ROOFLINE_CONFIG` or `config/roofline-core.yaml`), then
//! `ROOFLINE_`-prefixed environment variable overrides.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use roofline_core::config::CoreConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CoreConfig::load()?;
//! let mode = config.email.mode;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{CoreError, Result};
use crate::state_machine::OfferStatus;

/// Outbound email delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmailMode {
    /// Send to anyone.
    Live,
    /// Send only to allow-listed domains (development/staging).
    #[default]
    Restricted,
    /// Never hand anything to the provider; queue calls short-circuit.
    Disabled,
}

/// Email dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub mode: EmailMode,
    /// Domains deliverable in [`EmailMode::Restricted`].
    pub allowed_domains: Vec<String>,
    pub from_address: String,
    pub reply_to: Option<String>,
    /// Provider identifier recorded on mail and suppression records.
    pub provider: String,
    /// Fixed brand fields merged into every template's data. Brand fields
    /// overwrite caller-supplied keys of the same name.
    pub brand_fields: HashMap<String, String>,
    /// Template names the pipeline accepts.
    pub allowed_templates: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            mode: EmailMode::Restricted,
            allowed_domains: vec!["roofline.app".to_string()],
            from_address: "noreply@roofline.app".to_string(),
            reply_to: None,
            provider: "postmark".to_string(),
            brand_fields: HashMap::from([
                ("company_name".to_string(), "Roofline".to_string()),
                ("support_email".to_string(), "support@roofline.app".to_string()),
            ]),
            allowed_templates: constants::ALLOWED_TEMPLATES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

/// Webhook endpoint configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Shared secret for HMAC signature verification. `None` accepts every
    /// payload unconditionally (degraded-security mode, logged at startup).
    pub signing_secret: Option<String>,
}

/// Identity/claims thresholds. The core never manages identity itself; it
/// only compares the caller's permission level against these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Minimum permission level for admin operations (suppression
    /// management, scheduler triggers).
    pub admin_permission_level: u8,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_permission_level: 3,
        }
    }
}

/// Offer escalation sweep tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Days after `sent_at` before the first follow-up fires.
    pub follow_up_after_days: i64,
    /// Days after `sent_at` before branch-admin escalation fires.
    pub escalation_after_days: i64,
    /// Follow-up attempts cap.
    pub max_follow_up_attempts: u32,
    /// Statuses still actionable by the sweep. The original system checked
    /// `pending` in some paths and `awaiting_response` in others; the set is
    /// explicit configuration here.
    pub actionable_statuses: Vec<OfferStatus>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            follow_up_after_days: 7,
            escalation_after_days: 14,
            max_follow_up_attempts: constants::MAX_FOLLOW_UP_ATTEMPTS,
            actionable_statuses: vec![OfferStatus::OfferSent, OfferStatus::AwaitingResponse],
        }
    }
}

/// Mail retry sweep tuning. Defaults mirror the reference cadence:
/// 5-minute base delay, factor 3, capped at 3 attempts within 24 hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_minutes: i64,
    pub backoff_factor: u32,
    pub lookback_hours: i64,
    pub batch_limit: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::MAX_RETRY_ATTEMPTS,
            base_delay_minutes: constants::RETRY_BASE_DELAY_MINUTES,
            backoff_factor: constants::RETRY_BACKOFF_FACTOR,
            lookback_hours: constants::RETRY_LOOKBACK_HOURS,
            batch_limit: constants::RETRY_BATCH_LIMIT,
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub email: EmailConfig,
    pub webhook: WebhookConfig,
    pub auth: AuthConfig,
    pub scheduling: SchedulingConfig,
    pub retry: RetryConfig,
}

impl CoreConfig {
    /// Load configuration from the layered sources.
    pub fn load() -> Result<Self> {
        let path = std::env::var("ROOFLINE_CONFIG")
            .unwrap_or_else(|_| "config/roofline-core.yaml".to_string());
        Self::load_from(&path)
    }

    /// Load from an explicit YAML path plus environment overrides. A missing
    /// file is not an error; environment overrides and defaults still apply.
    pub fn load_from(path: &str) -> Result<Self> {
        let mut builder = config::Config::builder();
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("ROOFLINE")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("email.allowed_domains"),
        );

        let settings = builder
            .build()
            .map_err(|e| CoreError::Configuration(format!("failed to load {path}: {e}")))?;
        let config: CoreConfig = settings
            .try_deserialize()
            .map_err(|e| CoreError::Configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would silently disable core behavior.
    pub fn validate(&self) -> Result<()> {
        if self.email.mode == EmailMode::Restricted && self.email.allowed_domains.is_empty() {
            return Err(CoreError::Configuration(
                "restricted email mode requires at least one allowed domain".to_string(),
            ));
        }
        if self.email.from_address.is_empty() {
            return Err(CoreError::Configuration(
                "email.from_address must not be empty".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 || self.retry.batch_limit == 0 {
            return Err(CoreError::Configuration(
                "retry.max_attempts and retry.batch_limit must be positive".to_string(),
            ));
        }
        if self.scheduling.follow_up_after_days > self.scheduling.escalation_after_days {
            return Err(CoreError::Configuration(
                "scheduling.follow_up_after_days must not exceed escalation_after_days".to_string(),
            ));
        }
        if self.scheduling.actionable_statuses.is_empty() {
            return Err(CoreError::Configuration(
                "scheduling.actionable_statuses must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a normalized recipient domain is deliverable under the
    /// current mode. Only meaningful in restricted mode.
    pub fn domain_allowed(&self, address: &str) -> bool {
        match address.rsplit_once('@') {
            Some((_, domain)) => self
                .email
                .allowed_domains
                .iter()
                .any(|d| d.eq_ignore_ascii_case(domain)),
            None => false,
        }
    }
}
