//! In-memory [`DocumentStore`] used by tests and local development.
//!
//! Collections are dashmap entries; all mutations to one collection go
//! through its shard lock, which makes the update precondition check atomic
//! with the write.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{
    Document, DocumentStore, Filter, FilterOp, OrderBy, OrderDirection, Precondition, StoreError,
    WriteOp,
};

#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection; test helper.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

/// Compare two JSON values for filter/ordering purposes. Numbers compare
/// numerically, strings lexicographically (RFC3339 timestamps order
/// correctly this way); mismatched or unordered types compare equal.
fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn matches_filter(data: &Value, filter: &Filter) -> bool {
    let field_value = data.get(&filter.field).unwrap_or(&Value::Null);
    match filter.op {
        FilterOp::Eq => field_value == &filter.value,
        FilterOp::In => filter
            .value
            .as_array()
            .map(|candidates| candidates.contains(field_value))
            .unwrap_or(false),
        op => {
            if field_value.is_null() {
                return false;
            }
            let ord = compare_values(field_value, &filter.value);
            match op {
                FilterOp::Lt => ord == std::cmp::Ordering::Less,
                FilterOp::Le => ord != std::cmp::Ordering::Greater,
                FilterOp::Gt => ord == std::cmp::Ordering::Greater,
                FilterOp::Ge => ord != std::cmp::Ordering::Less,
                FilterOp::Eq | FilterOp::In => unreachable!(),
            }
        }
    }
}

fn check_precondition(
    existing: Option<&Value>,
    precondition: &Precondition,
    collection: &str,
    id: &str,
) -> Result<(), StoreError> {
    match precondition {
        Precondition::Exists => {
            if existing.is_none() {
                return Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            }
        }
        Precondition::FieldEquals(field, expected) => {
            let actual = existing
                .and_then(|data| data.get(field))
                .unwrap_or(&Value::Null);
            if actual != expected {
                return Err(StoreError::PreconditionFailed {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    detail: format!("{field}: expected {expected}, found {actual}"),
                });
            }
        }
    }
    Ok(())
}

fn merge_patch(target: &mut Value, patch: Value) {
    match (target.as_object_mut(), patch) {
        (Some(obj), Value::Object(patch_obj)) => {
            for (key, value) in patch_obj {
                obj.insert(key, value);
            }
        }
        (_, patch) => *target = patch,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|c| c.get(id).cloned())
            .map(|data| Document::new(id, data)))
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<OrderBy>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut results: Vec<Document> = match self.collections.get(collection) {
            Some(docs) => docs
                .iter()
                .filter(|(_, data)| filters.iter().all(|f| matches_filter(data, f)))
                .map(|(id, data)| Document::new(id.clone(), data.clone()))
                .collect(),
            None => Vec::new(),
        };

        if let Some(order) = order_by {
            results.sort_by(|a, b| {
                let (av, bv) = (
                    a.data.get(&order.field).unwrap_or(&Value::Null),
                    b.data.get(&order.field).unwrap_or(&Value::Null),
                );
                let ord = compare_values(av, bv);
                match order.direction {
                    OrderDirection::Ascending => ord,
                    OrderDirection::Descending => ord.reverse(),
                }
            });
        } else {
            // Deterministic output for unordered queries.
            results.sort_by(|a, b| a.id.cmp(&b.id));
        }

        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError> {
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        docs.insert(id.to_string(), data);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
        precondition: Option<Precondition>,
    ) -> Result<(), StoreError> {
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        let existing = docs.get(id);
        if let Some(precondition) = &precondition {
            check_precondition(existing, precondition, collection, id)?;
        }
        match docs.get_mut(id) {
            Some(data) => {
                merge_patch(data, patch);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        match docs.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }

    async fn batch_write(
        &self,
        ops: Vec<WriteOp>,
    ) -> Result<Vec<Result<(), StoreError>>, StoreError> {
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            let result = match op {
                WriteOp::Create {
                    collection,
                    id,
                    data,
                } => self.create(&collection, &id, data).await,
                WriteOp::Update {
                    collection,
                    id,
                    patch,
                } => self.update(&collection, &id, patch, None).await,
                WriteOp::Delete { collection, id } => self.delete(&collection, &id).await,
            };
            results.push(result);
        }
        Ok(results)
    }
}
