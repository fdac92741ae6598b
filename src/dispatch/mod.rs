// Email dispatch pipeline: validate, filter, persist, hand off.

pub mod pipeline;
pub mod provider;

pub use pipeline::{
    BulkItemError, BulkQueueResult, EmailDispatchPipeline, QueuePayload, QueueResult,
    QueueSkipReason,
};
pub use provider::{MailProvider, NullProvider, OutboundMessage, ProviderResponse};
