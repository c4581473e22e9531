//! Mock LLM service for tests

use super::{LlmError, LlmRequest, LlmResponse, LlmService};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Mock LLM service that returns queued responses
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    delay: Option<Duration>,
    /// Prompts of every request made, in order
    pub prompts: Mutex<Vec<String>>,
}

impl MockLlmService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful text response
    pub fn queue_text(&self, text: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(LlmResponse::from_text(text)));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        "mock"
    }
}
