//! Test doubles for the conversation runtime
//!
//! These stand in for the LLM-backed classifier and the checkpoint store so
//! flows can be driven deterministically.

use super::traits::CheckpointStore;
use crate::classifier::{IntentClassifier, FALLBACK_GREETING, FALLBACK_ROUTE};
use crate::state_machine::{ConversationState, Route};
use async_trait::async_trait;
use chrono::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// Scripted classifier
// ============================================================================

/// Classifier that gives the same configured answer to every call.
///
/// Defaults match the documented fallbacks, so an unconfigured instance
/// behaves like a classifier whose model is unavailable.
pub struct ScriptedClassifier {
    route: Route,
    greeting: String,
    products: Vec<String>,
    order_intent: bool,
    quantity: u32,
    delay: std::time::Duration,
    calls: AtomicUsize,
}

impl Default for ScriptedClassifier {
    fn default() -> Self {
        Self {
            route: FALLBACK_ROUTE,
            greeting: FALLBACK_GREETING.to_string(),
            products: Vec::new(),
            order_intent: false,
            quantity: 0,
            delay: std::time::Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.route = route;
        self
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    pub fn with_products(mut self, products: &[&str]) -> Self {
        self.products = products.iter().map(|p| (*p).to_string()).collect();
        self
    }

    pub fn with_order_intent(mut self, wants_to_order: bool) -> Self {
        self.order_intent = wants_to_order;
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of classifier calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer<T: Send>(&self, value: T) -> T {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        value
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify_route(&self, _query: &str) -> Route {
        self.answer(self.route).await
    }

    async fn greeting_reply(&self, _query: &str) -> String {
        self.answer(self.greeting.clone()).await
    }

    async fn extract_products(&self, _query: &str) -> Vec<String> {
        self.answer(self.products.clone()).await
    }

    async fn detect_order_intent(&self, _reply: &str) -> bool {
        self.answer(self.order_intent).await
    }

    async fn extract_quantity(&self, _reply: &str) -> u32 {
        self.answer(self.quantity).await
    }
}

// ============================================================================
// Failing checkpoint store
// ============================================================================

/// Checkpoint store whose every operation fails
pub struct FailingCheckpointStore;

#[async_trait]
impl CheckpointStore for FailingCheckpointStore {
    async fn save(&self, _thread_id: &str, _state: &ConversationState) -> Result<(), String> {
        Err("checkpoint store unavailable".to_string())
    }

    async fn take(
        &self,
        _thread_id: &str,
        _max_age: Duration,
    ) -> Result<Option<ConversationState>, String> {
        Err("checkpoint store unavailable".to_string())
    }

    async fn remove(&self, _thread_id: &str) -> Result<(), String> {
        Err("checkpoint store unavailable".to_string())
    }

    async fn purge_expired(&self, _max_age: Duration) -> Result<usize, String> {
        Err("checkpoint store unavailable".to_string())
    }
}
