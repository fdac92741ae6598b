//! # Document Store Adapter
//!
//! Generic document-collection operations behind a trait so the core never
//! depends on a concrete database. Collections are keyed by string ids with
//! arbitrary JSON payloads; single-document updates are atomic and support
//! an optional precondition, which is the optimistic-concurrency primitive
//! the status state machine relies on.
//!
//! The provided [`MemoryStore`] backs tests and local development; production
//! adapters live outside this crate.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// A stored document: string id plus JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Deserialize the payload into a typed model.
    pub fn to_model<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// Comparison operator for query filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

/// A single `field op value` query filter.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }
}

/// Sort direction for query ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

/// Query ordering on a single field.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field: String,
    pub direction: OrderDirection,
}

impl OrderBy {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Descending,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Ascending,
        }
    }
}

/// Condition evaluated atomically with an update.
#[derive(Debug, Clone)]
pub enum Precondition {
    /// The named top-level field must currently equal the given value.
    FieldEquals(String, Value),
    /// The document must exist.
    Exists,
}

/// One operation in a best-effort batch commit.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Create {
        collection: String,
        id: String,
        data: Value,
    },
    Update {
        collection: String,
        id: String,
        patch: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Document store failure modes. "Missing document" on reads is `Ok(None)`,
/// not an error; `NotFound` covers writes addressed at absent documents.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    #[error("precondition failed for {collection}/{id}: {detail}")]
    PreconditionFailed {
        collection: String,
        id: String,
        detail: String,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Generic get/query/update/delete/batch operations against a document
/// collection. Implementations guarantee per-document atomicity for
/// `update` including its precondition check; no cross-document transaction
/// guarantee is assumed anywhere in the core.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<OrderBy>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError>;

    /// Shallow-merge `patch` into the document's top-level fields. The
    /// precondition, when present, is evaluated atomically with the write.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
        precondition: Option<Precondition>,
    ) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Best-effort batch; per-op failures are returned positionally and do
    /// not roll back successful ops.
    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<Vec<Result<(), StoreError>>, StoreError>;
}
