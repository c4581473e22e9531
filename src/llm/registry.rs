//! Provider selection from configuration

use super::{GeminiService, LlmError, LlmRequest, LlmResponse, LlmService, LoggingService};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for the LLM provider
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    /// Gateway URL; when set the gateway handles authentication
    pub gateway: Option<String>,
    pub model: String,
    pub temperature: f32,
    /// Attempts per classifier call, including the first
    pub max_retries: u32,
    /// Deadline for a single attempt
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            gateway: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_retries: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Build the LLM service described by `config`.
///
/// Without an API key or gateway this returns an [`OfflineService`], so the
/// classifier runs entirely on its fallback values.
pub fn connect(config: &LlmConfig) -> Arc<dyn LlmService> {
    let api_key = match (&config.gateway, &config.api_key) {
        (Some(_), _) => "implicit".to_string(),
        (None, Some(key)) if !key.is_empty() => key.clone(),
        _ => {
            tracing::warn!("No LLM API key configured. Set GOOGLE_API_KEY or LLM_GATEWAY.");
            return Arc::new(OfflineService);
        }
    };

    match GeminiService::new(
        api_key,
        &config.model,
        config.temperature,
        config.timeout,
        config.gateway.as_deref(),
    ) {
        Ok(service) => Arc::new(LoggingService::new(Arc::new(service))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create LLM client, running offline");
            Arc::new(OfflineService)
        }
    }
}

/// Stand-in provider used when no credentials are available
pub struct OfflineService;

#[async_trait]
impl LlmService for OfflineService {
    async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        Err(LlmError::auth("No LLM API key configured"))
    }

    fn model_id(&self) -> &str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;

    #[test]
    fn test_connect_without_key_is_offline() {
        let service = connect(&LlmConfig::default());
        assert_eq!(service.model_id(), "offline");
    }

    #[test]
    fn test_connect_with_empty_key_is_offline() {
        let config = LlmConfig {
            api_key: Some(String::new()),
            ..LlmConfig::default()
        };
        assert_eq!(connect(&config).model_id(), "offline");
    }

    #[test]
    fn test_connect_with_key_uses_configured_model() {
        let config = LlmConfig {
            api_key: Some("secret".to_string()),
            model: "gemini-1.5-flash".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(connect(&config).model_id(), "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn test_offline_service_fails_without_retry() {
        let err = OfflineService
            .complete(&LlmRequest::prompt("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Auth);
        assert!(!err.kind.is_retryable());
    }
}
