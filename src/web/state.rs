//! Shared application state for the web layer: configuration plus the core
//! components, all behind `Arc` so handler clones stay cheap.

use std::sync::Arc;

use crate::auth::IdentityResolver;
use crate::config::CoreConfig;
use crate::dispatch::{EmailDispatchPipeline, MailProvider};
use crate::ingestion::DeliveryEventIngestion;
use crate::notifications::StoreNotificationSink;
use crate::scheduler::{EscalationScheduler, RetryScheduler};
use crate::store::DocumentStore;
use crate::suppression::SuppressionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CoreConfig>,
    pub registry: Arc<SuppressionRegistry>,
    pub pipeline: Arc<EmailDispatchPipeline>,
    pub ingestion: Arc<DeliveryEventIngestion>,
    pub retry_scheduler: Arc<RetryScheduler>,
    pub escalation_scheduler: Arc<EscalationScheduler>,
    pub identity_resolver: Arc<dyn IdentityResolver>,
}

impl AppState {
    /// Wire the full component graph from its external collaborators.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn MailProvider>,
        identity_resolver: Arc<dyn IdentityResolver>,
        config: Arc<CoreConfig>,
    ) -> Self {
        let registry = Arc::new(SuppressionRegistry::new(store.clone()));
        let pipeline = Arc::new(EmailDispatchPipeline::new(
            store.clone(),
            registry.clone(),
            provider.clone(),
            config.clone(),
        ));
        let ingestion = Arc::new(DeliveryEventIngestion::new(
            store.clone(),
            registry.clone(),
            provider.name().to_string(),
        ));
        let retry_scheduler = Arc::new(RetryScheduler::new(
            store.clone(),
            provider,
            config.clone(),
        ));
        let notifications = Arc::new(StoreNotificationSink::new(store.clone()));
        let escalation_scheduler = Arc::new(EscalationScheduler::new(
            store,
            pipeline.clone(),
            notifications,
            config.clone(),
        ));

        Self {
            config,
            registry,
            pipeline,
            ingestion,
            retry_scheduler,
            escalation_scheduler,
            identity_resolver,
        }
    }
}
