//! Google Gemini provider implementation

use super::types::{ContentBlock, LlmRequest, LlmResponse, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DIRECT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: String,
    endpoint: String,
    model_id: String,
    temperature: f32,
}

impl GeminiService {
    pub fn new(
        api_key: String,
        model: &str,
        temperature: f32,
        timeout: Duration,
        gateway: Option<&str>,
    ) -> Result<Self, LlmError> {
        let endpoint = match gateway {
            Some(gw) => format!(
                "{}/gemini/v1beta/models/{model}:generateContent",
                gw.trim_end_matches('/')
            ),
            None => format!("{DIRECT_BASE_URL}/{model}:generateContent"),
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint,
            model_id: model.to_string(),
            temperature,
        })
    }

    fn translate_request(&self, request: &LlmRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: Some(self.temperature),
            },
        }
    }

    fn normalize_response(resp: GeminiResponse) -> Result<LlmResponse, LlmError> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::unknown("No candidates in response"))?;

        let content = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|part| !part.text.is_empty())
            .map(|part| ContentBlock::Text { text: part.text })
            .collect();

        let usage = resp.usage_metadata.unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage: Usage {
                input_tokens: u64::from(usage.prompt_token_count),
                output_tokens: u64::from(usage.candidates_token_count),
            },
        })
    }

    fn classify_error(
        status: reqwest::StatusCode,
        retry_after: Option<&str>,
        body: &str,
    ) -> LlmError {
        let message = serde_json::from_str::<GeminiErrorResponse>(body)
            .map_or_else(|_| body.to_string(), |e| e.error.message);
        match status.as_u16() {
            400 => LlmError::invalid_request(format!("Invalid request: {message}")),
            401 | 403 => LlmError::auth(format!("Authentication failed: {message}")),
            429 => {
                let err = LlmError::rate_limit(format!("Rate limit exceeded: {message}"));
                match retry_after.and_then(parse_retry_after) {
                    Some(delay) => err.with_retry_after(delay),
                    None => err,
                }
            }
            500..=599 => LlmError::server_error(format!("Server error: {message}")),
            _ => LlmError::unknown(format!("HTTP {status}: {message}")),
        }
    }
}

#[async_trait]
impl LlmService for GeminiService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let gemini_request = self.translate_request(request);

        let url = if self.api_key == "implicit" {
            // Gateway mode - the gateway authenticates
            self.endpoint.clone()
        } else {
            format!("{}?key={}", self.endpoint, self.api_key)
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::timeout(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, retry_after.as_deref(), &body));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(gemini_response)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// `Retry-After` in delta-seconds; HTTP-date values are ignored
fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    (secs.is_finite() && (0.0..=86_400.0).contains(&secs)).then(|| Duration::from_secs_f64(secs))
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
