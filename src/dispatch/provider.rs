//! Mail provider seam. The core never speaks a provider's HTTP dialect;
//! concrete clients implement [`MailProvider`] outside this crate.

use async_trait::async_trait;

use crate::error::{CoreError, Result};
use crate::models::TemplateRef;

/// One outbound message, fully resolved (normalized recipients, merged
/// template data).
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub to: Vec<String>,
    pub from: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub template: TemplateRef,
}

/// Provider acknowledgement for an accepted message.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub provider_message_id: String,
}

/// Provider-specific sender. Implementations must not block indefinitely;
/// the pipeline additionally bounds each call with a timeout and treats the
/// timeout as a retryable [`CoreError::Provider`].
#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<ProviderResponse>;

    /// Identifier recorded on mail and suppression records.
    fn name(&self) -> &str;
}

/// Provider stub that accepts everything without sending. Used when the
/// core runs with no provider wired up.
pub struct NullProvider;

#[async_trait]
impl MailProvider for NullProvider {
    async fn send(&self, _message: &OutboundMessage) -> Result<ProviderResponse> {
        Err(CoreError::provider("no mail provider configured", false))
    }

    fn name(&self) -> &str {
        "null"
    }
}
