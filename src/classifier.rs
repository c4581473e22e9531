//! Intent classifier backed by an LLM
//!
//! Every operation maps text to a typed result and has a documented
//! fallback. Classifier failures never reach the caller: an unavailable
//! model or an unparseable reply both resolve to the fallback value.

mod parse;
mod prompts;

pub use parse::{positive_integer, QuantityInputError};

use crate::llm::{LlmError, LlmRequest, LlmService};
use crate::state_machine::Route;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;

/// Route used when the query cannot be classified
pub const FALLBACK_ROUTE: Route = Route::Greeting;
/// Reply used when no greeting can be generated
pub const FALLBACK_GREETING: &str = "Hello! I can help you order products. What would you like?";
/// Quantity used when none can be extracted
pub const FALLBACK_QUANTITY: u32 = 0;

/// Classification operations consumed by the order state machine
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Order or greeting. Fallback: [`FALLBACK_ROUTE`].
    async fn classify_route(&self, query: &str) -> Route;

    /// Friendly reply to a non-order message. Fallback: [`FALLBACK_GREETING`].
    async fn greeting_reply(&self, query: &str) -> String;

    /// Product mentions in extraction order. Fallback: empty list.
    async fn extract_products(&self, query: &str) -> Vec<String>;

    /// Whether the reply says "go ahead", in any language. Fallback: `false`.
    async fn detect_order_intent(&self, reply: &str) -> bool;

    /// Quantity mentioned in the reply. Fallback: [`FALLBACK_QUANTITY`].
    async fn extract_quantity(&self, reply: &str) -> u32;
}

#[async_trait]
impl<T: IntentClassifier + ?Sized> IntentClassifier for Arc<T> {
    async fn classify_route(&self, query: &str) -> Route {
        (**self).classify_route(query).await
    }

    async fn greeting_reply(&self, query: &str) -> String {
        (**self).greeting_reply(query).await
    }

    async fn extract_products(&self, query: &str) -> Vec<String> {
        (**self).extract_products(query).await
    }

    async fn detect_order_intent(&self, reply: &str) -> bool {
        (**self).detect_order_intent(reply).await
    }

    async fn extract_quantity(&self, reply: &str) -> u32 {
        (**self).extract_quantity(reply).await
    }
}

/// Why a classifier call produced no usable answer
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(#[from] LlmError),
    #[error("malformed classifier output: {0:?}")]
    Malformed(String),
}

/// Timeout and retry budget for each classifier call
#[derive(Debug, Clone)]
pub struct CallPolicy {
    /// Attempts including the first; at least one is always made
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(8),
        }
    }
}

impl CallPolicy {
    /// Exponential backoff before retry number `attempt` (1-based): 1s, 2s, 4s, ...
    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(factor).min(self.backoff_cap)
    }

    /// Delay before retrying after `err`; a server-requested delay wins but
    /// is held to the backoff cap
    fn delay_after(&self, attempt: u32, err: &LlmError) -> Duration {
        err.retry_after
            .map_or_else(|| self.retry_delay(attempt), |d| d.min(self.backoff_cap))
    }
}

/// [`IntentClassifier`] that prompts an LLM
pub struct LlmIntentClassifier {
    llm: Arc<dyn LlmService>,
    policy: CallPolicy,
}

impl LlmIntentClassifier {
    pub fn new(llm: Arc<dyn LlmService>, policy: CallPolicy) -> Self {
        Self { llm, policy }
    }

    /// Run one prompt under the call policy, returning the reply text
    async fn generate(
        &self,
        operation: &'static str,
        prompt: String,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let request = LlmRequest::prompt(prompt).with_max_tokens(max_tokens);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let start = Instant::now();
            let result = match timeout(self.policy.attempt_timeout, self.llm.complete(&request)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::timeout(format!(
                    "{operation} timed out after {}ms",
                    self.policy.attempt_timeout.as_millis()
                ))),
            };

            match result {
                Ok(response) => {
                    tracing::debug!(
                        operation,
                        attempt,
                        duration_ms = %start.elapsed().as_millis(),
                        "Classifier call succeeded"
                    );
                    return Ok(response.text());
                }
                Err(e) if e.kind.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.delay_after(attempt, &e);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "Classifier call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Prompt, parse, and substitute `fallback` on any failure
    async fn classify<T, F>(
        &self,
        operation: &'static str,
        prompt: String,
        max_tokens: u32,
        parse: F,
        fallback: T,
    ) -> T
    where
        T: std::fmt::Debug + Send,
        F: FnOnce(&str) -> Option<T> + Send,
    {
        let outcome = match self.generate(operation, prompt, max_tokens).await {
            Ok(text) => parse(&text).ok_or(ClassifierError::Malformed(text)),
            Err(e) => Err(ClassifierError::Unavailable(e)),
        };

        outcome.unwrap_or_else(|e| {
            tracing::warn!(operation, error = %e, fallback = ?fallback, "Using classifier fallback");
            fallback
        })
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify_route(&self, query: &str) -> Route {
        self.classify(
            "classify_route",
            prompts::route(query),
            8,
            |reply| Some(parse::route(reply)),
            FALLBACK_ROUTE,
        )
        .await
    }

    async fn greeting_reply(&self, query: &str) -> String {
        self.classify(
            "greeting_reply",
            prompts::greeting(query),
            256,
            |reply| {
                let reply = reply.trim();
                (!reply.is_empty()).then(|| reply.to_string())
            },
            FALLBACK_GREETING.to_string(),
        )
        .await
    }

    async fn extract_products(&self, query: &str) -> Vec<String> {
        self.classify(
            "extract_products",
            prompts::extract_products(query),
            256,
            parse::product_list,
            Vec::new(),
        )
        .await
    }

    async fn detect_order_intent(&self, reply: &str) -> bool {
        self.classify(
            "detect_order_intent",
            prompts::order_intent(reply),
            8,
            |answer| Some(parse::order_intent(answer)),
            false,
        )
        .await
    }

    async fn extract_quantity(&self, reply: &str) -> u32 {
        self.classify(
            "extract_quantity",
            prompts::quantity(reply),
            8,
            parse::quantity,
            FALLBACK_QUANTITY,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockLlmService;

    fn fast_policy(max_attempts: u32) -> CallPolicy {
        CallPolicy {
            max_attempts,
            attempt_timeout: Duration::from_millis(200),
            backoff_base: Duration::ZERO,
            backoff_cap: Duration::ZERO,
        }
    }

    fn classifier(mock: &Arc<MockLlmService>, max_attempts: u32) -> LlmIntentClassifier {
        LlmIntentClassifier::new(mock.clone(), fast_policy(max_attempts))
    }

    #[tokio::test]
    async fn test_classify_route_parses_reply() {
        let mock = Arc::new(MockLlmService::new());
        mock.queue_text("order");
        mock.queue_text("greeting");
        let c = classifier(&mock, 1);

        assert_eq!(c.classify_route("I want apples").await, Route::Order);
        assert_eq!(c.classify_route("hello").await, Route::Greeting);
        assert!(mock.recorded_prompts()[0].contains("I want apples"));
    }

    #[tokio::test]
    async fn test_unavailable_classifier_uses_fallbacks() {
        let mock = Arc::new(MockLlmService::new());
        let c = classifier(&mock, 1);

        assert_eq!(c.classify_route("I want apples").await, FALLBACK_ROUTE);
        assert_eq!(c.greeting_reply("hi").await, FALLBACK_GREETING);
        assert!(c.extract_products("apples").await.is_empty());
        assert!(!c.detect_order_intent("yes").await);
        assert_eq!(c.extract_quantity("3").await, FALLBACK_QUANTITY);
    }

    #[tokio::test]
    async fn test_malformed_output_uses_fallback() {
        let mock = Arc::new(MockLlmService::new());
        mock.queue_text("Sorry, I can't help with that.");
        mock.queue_text("some");
        mock.queue_text("   ");
        let c = classifier(&mock, 3);

        assert!(c.extract_products("apples").await.is_empty());
        assert_eq!(c.extract_quantity("some").await, FALLBACK_QUANTITY);
        assert_eq!(c.greeting_reply("hey").await, FALLBACK_GREETING);
        // Malformed output is not retried
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_extract_products_tolerates_prose() {
        let mock = Arc::new(MockLlmService::new());
        mock.queue_text("Here you go: [\"apple\", \"banana\"] - hope that helps");
        let c = classifier(&mock, 1);
        assert_eq!(
            c.extract_products("apples and bananas").await,
            vec!["apple".to_string(), "banana".to_string()]
        );
    }

    #[tokio::test]
    async fn test_retryable_error_is_retried() {
        let mock = Arc::new(MockLlmService::new());
        mock.queue_error(LlmError::server_error("overloaded"));
        mock.queue_error(LlmError::rate_limit("slow down"));
        mock.queue_text("YES");
        let c = classifier(&mock, 3);

        assert!(c.detect_order_intent("sure").await);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_falls_back() {
        let mock = Arc::new(MockLlmService::new());
        for _ in 0..3 {
            mock.queue_error(LlmError::network("connection reset"));
        }
        mock.queue_text("YES");
        let c = classifier(&mock, 3);

        assert!(!c.detect_order_intent("yes").await);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let mock = Arc::new(MockLlmService::new());
        mock.queue_error(LlmError::auth("bad key"));
        mock.queue_text("order");
        let c = classifier(&mock, 5);

        assert_eq!(c.classify_route("apples").await, FALLBACK_ROUTE);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_slow_classifier_times_out_to_fallback() {
        let mock = Arc::new(MockLlmService::new().with_delay(Duration::from_millis(500)));
        mock.queue_text("7");
        mock.queue_text("7");
        let c = LlmIntentClassifier::new(
            mock.clone(),
            CallPolicy {
                attempt_timeout: Duration::from_millis(20),
                ..fast_policy(2)
            },
        );

        assert_eq!(c.extract_quantity("seven").await, FALLBACK_QUANTITY);
        assert_eq!(mock.call_count(), 2);
    }

    #[test]
    fn test_retry_delay_is_exponential_and_capped() {
        let policy = CallPolicy::default();
        assert_eq!(policy.retry_delay(1), Duration::from_secs(1));
        assert_eq!(policy.retry_delay(2), Duration::from_secs(2));
        assert_eq!(policy.retry_delay(3), Duration::from_secs(4));
        assert_eq!(policy.retry_delay(10), Duration::from_secs(8));
    }

    #[test]
    fn test_server_requested_delay_is_capped() {
        let policy = CallPolicy::default();
        let asked = LlmError::rate_limit("quota").with_retry_after(Duration::from_secs(3));
        assert_eq!(policy.delay_after(1, &asked), Duration::from_secs(3));

        let greedy = LlmError::rate_limit("quota").with_retry_after(Duration::from_secs(60));
        assert_eq!(policy.delay_after(1, &greedy), Duration::from_secs(8));

        let plain = LlmError::server_error("overloaded");
        assert_eq!(policy.delay_after(2, &plain), Duration::from_secs(2));
    }
}
