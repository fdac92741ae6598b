//! Shared wiring for the integration suites: an in-memory store, a
//! scripted provider, and the full component graph in live email mode.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use roofline_core::auth::Identity;
use roofline_core::config::{CoreConfig, EmailMode};
use roofline_core::constants::{MAIL_QUEUE_COLLECTION, OFFERS_COLLECTION, USERS_COLLECTION};
use roofline_core::dispatch::EmailDispatchPipeline;
use roofline_core::ingestion::DeliveryEventIngestion;
use roofline_core::notifications::StoreNotificationSink;
use roofline_core::scheduler::{EscalationScheduler, RetryScheduler};
use roofline_core::store::{DocumentStore, MemoryStore};
use roofline_core::suppression::SuppressionRegistry;
use roofline_core::test_utils::MockMailProvider;

pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MockMailProvider>,
    pub config: Arc<CoreConfig>,
    pub registry: Arc<SuppressionRegistry>,
    pub pipeline: Arc<EmailDispatchPipeline>,
    pub ingestion: Arc<DeliveryEventIngestion>,
    pub retry: Arc<RetryScheduler>,
    pub escalation: Arc<EscalationScheduler>,
}

impl TestHarness {
    /// Live-mode harness; most suites want delivery unrestricted.
    pub fn new() -> Self {
        let mut config = CoreConfig::default();
        config.email.mode = EmailMode::Live;
        Self::with_config(config)
    }

    pub fn with_config(config: CoreConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockMailProvider::new());
        let config = Arc::new(config);

        let store_dyn: Arc<dyn DocumentStore> = store.clone();
        let registry = Arc::new(SuppressionRegistry::new(store_dyn.clone()));
        let pipeline = Arc::new(EmailDispatchPipeline::new(
            store_dyn.clone(),
            registry.clone(),
            provider.clone(),
            config.clone(),
        ));
        let ingestion = Arc::new(DeliveryEventIngestion::new(
            store_dyn.clone(),
            registry.clone(),
            "mock",
        ));
        let retry = Arc::new(RetryScheduler::new(
            store_dyn.clone(),
            provider.clone(),
            config.clone(),
        ));
        let notifications = Arc::new(StoreNotificationSink::new(store_dyn.clone()));
        let escalation = Arc::new(EscalationScheduler::new(
            store_dyn,
            pipeline.clone(),
            notifications,
            config.clone(),
        ));

        Self {
            store,
            provider,
            config,
            registry,
            pipeline,
            ingestion,
            retry,
            escalation,
        }
    }

    /// An authenticated non-admin caller for pipeline calls.
    pub fn caller(&self) -> Identity {
        Identity::new("inspector-1", 1)
    }

    pub async fn seed_doc(&self, collection: &str, id: &str, data: Value) {
        self.store.create(collection, id, data).await.unwrap();
    }

    pub async fn seed_offer(&self, id: &str, data: Value) {
        self.seed_doc(OFFERS_COLLECTION, id, data).await;
    }

    pub async fn seed_user(&self, id: &str, email: &str, role: Option<&str>, branch_id: Option<&str>) {
        self.seed_doc(
            USERS_COLLECTION,
            id,
            json!({
                "email": email,
                "role": role,
                "branch_id": branch_id,
            }),
        )
        .await;
    }

    /// A failed mail record as the pipeline would have left it.
    pub async fn seed_failed_mail(
        &self,
        id: &str,
        retry_count: u32,
        failed_at: DateTime<Utc>,
    ) {
        self.seed_doc(
            MAIL_QUEUE_COLLECTION,
            id,
            json!({
                "to": ["customer@example.com"],
                "from": "noreply@roofline.app",
                "reply_to": null,
                "subject": "Your roof inspection offer",
                "template": {"name": "offer_sent", "data": {}},
                "status": "failed",
                "message_id": id,
                "provider_message_id": null,
                "retry_count": retry_count,
                "created_at": failed_at,
                "sent_at": null,
                "failed_at": failed_at,
                "last_error": "provider unavailable",
            }),
        )
        .await;
    }

    pub async fn fetch(&self, collection: &str, id: &str) -> Value {
        self.store
            .get(collection, id)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("document {collection}/{id} missing"))
            .data
    }
}
