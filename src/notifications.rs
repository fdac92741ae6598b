//! In-app notification sink consumed by the escalation scheduler.
//! Write-only from the core's perspective; read/ack semantics live in the
//! application layer.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::constants::NOTIFICATIONS_COLLECTION;
use crate::error::Result;
use crate::models::NotificationRecord;
use crate::store::DocumentStore;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create(&self, notification: NotificationRecord) -> Result<()>;
}

/// Sink writing notification records straight to the document store.
pub struct StoreNotificationSink {
    store: Arc<dyn DocumentStore>,
}

impl StoreNotificationSink {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationSink for StoreNotificationSink {
    async fn create(&self, notification: NotificationRecord) -> Result<()> {
        self.store
            .create(
                NOTIFICATIONS_COLLECTION,
                &Uuid::new_v4().to_string(),
                serde_json::to_value(&notification)?,
            )
            .await?;
        Ok(())
    }
}
