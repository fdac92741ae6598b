//! # Core Error Types
//!
//! Structured error taxonomy for the offer lifecycle and mail delivery core,
//! using thiserror for typed variants instead of `Box<dyn Error>` patterns.
//!
//! Propagation policy: per-document failures inside a sweep or batch are
//! caught and logged by the component that owns the loop; only fatal errors
//! (store unreachable, configuration invalid) bubble out of a sweep run.

use thiserror::Error;

use crate::store::StoreError;

/// Crate-wide error type covering every subsystem surface.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Attempted status edge is not in the transition table. Never retried.
    #[error("invalid status transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    /// Malformed dispatch payload, rejected before any write.
    #[error("validation failed for {field}: {message}")]
    Validation { field: String, message: String },

    /// Caller identity missing where one is required.
    #[error("authentication required")]
    Unauthenticated,

    /// Caller identity present but below the required permission level.
    #[error("permission denied: requires level {required}, caller has {actual}")]
    PermissionDenied { required: u8, actual: u8 },

    /// Mail provider send or webhook verification failure.
    #[error("provider error: {message}")]
    Provider { message: String, retryable: bool },

    /// Referenced document missing; logged and the unit of work skipped,
    /// never fatal to the surrounding batch.
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("document store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>, retryable: bool) -> Self {
        Self::Provider {
            message: message.into(),
            retryable,
        }
    }

    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Whether a retry scheduler should reconsider the failed operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { retryable, .. } => *retryable,
            Self::Store(StoreError::PreconditionFailed { .. }) => false,
            Self::Store(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
