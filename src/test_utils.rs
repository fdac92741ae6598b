//! # Test Utilities
//!
//! Scripted collaborator doubles shared by unit and integration tests:
//! a mail provider with programmable outcomes and a static identity
//! resolver. No live services anywhere in the test suite.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{Identity, IdentityResolver};
use crate::dispatch::{MailProvider, OutboundMessage, ProviderResponse};
use crate::error::{CoreError, Result};

/// Mail provider double. Succeeds by default with generated provider ids;
/// failures can be scripted per call.
#[derive(Default)]
pub struct MockMailProvider {
    /// Front-of-queue outcome consumed per send; empty queue means success.
    scripted: Mutex<VecDeque<std::result::Result<String, String>>>,
    sent: Mutex<Vec<OutboundMessage>>,
    counter: AtomicUsize,
}

impl MockMailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next `n` sends to fail with the given message.
    pub fn fail_next(&self, n: usize, message: &str) {
        let mut scripted = self.scripted.lock();
        for _ in 0..n {
            scripted.push_back(Err(message.to_string()));
        }
    }

    /// Script the next send to succeed with a specific provider id.
    pub fn succeed_next_with(&self, provider_message_id: &str) {
        self.scripted
            .lock()
            .push_back(Ok(provider_message_id.to_string()));
    }

    /// Messages actually handed to the provider, in order.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl MailProvider for MockMailProvider {
    async fn send(&self, message: &OutboundMessage) -> Result<ProviderResponse> {
        let outcome = self.scripted.lock().pop_front();
        match outcome {
            Some(Err(message_text)) => Err(CoreError::provider(message_text, true)),
            Some(Ok(id)) => {
                self.sent.lock().push(message.clone());
                Ok(ProviderResponse {
                    provider_message_id: id,
                })
            }
            None => {
                self.sent.lock().push(message.clone());
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                Ok(ProviderResponse {
                    provider_message_id: format!("mock-{n}"),
                })
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Identity resolver backed by a fixed token table.
#[derive(Default)]
pub struct StaticIdentityResolver {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, identity: Identity) -> Self {
        self.tokens.insert(token.to_string(), identity);
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, bearer_token: &str) -> Result<Identity> {
        self.tokens
            .get(bearer_token)
            .cloned()
            .ok_or(CoreError::Unauthenticated)
    }
}
