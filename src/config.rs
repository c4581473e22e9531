//! Service configuration from environment variables

use crate::llm::{LlmConfig, DEFAULT_MODEL};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?} is not valid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Everything the binary needs to start
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    /// SQLite file for checkpoints; in-memory store when unset
    pub db_path: Option<PathBuf>,
    /// Whether suspended conversations are kept server-side
    pub checkpoints: bool,
    pub checkpoint_ttl: Duration,
    pub llm: LlmConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build settings from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = LlmConfig::default();

        let port = match get("ORDER_FLOW_PORT").or_else(|| get("PORT")) {
            Some(raw) => parse("ORDER_FLOW_PORT", &raw, "expected a port number")?,
            None => 8000,
        };

        let checkpoints = match get("ORDER_FLOW_CHECKPOINTS") {
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "on" | "true" | "1" => true,
                "off" | "false" | "0" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "ORDER_FLOW_CHECKPOINTS",
                        value: raw,
                        reason: "expected on or off",
                    })
                }
            },
            None => true,
        };

        let checkpoint_ttl = match get("ORDER_FLOW_CHECKPOINT_TTL_SECS") {
            Some(raw) => Duration::from_secs(parse(
                "ORDER_FLOW_CHECKPOINT_TTL_SECS",
                &raw,
                "expected whole seconds",
            )?),
            None => Duration::from_secs(30 * 60),
        };

        let temperature = match get("LLM_TEMPERATURE") {
            Some(raw) => {
                let t: f32 = parse("LLM_TEMPERATURE", &raw, "expected a number")?;
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::Invalid {
                        var: "LLM_TEMPERATURE",
                        value: raw,
                        reason: "must be between 0 and 2",
                    });
                }
                t
            }
            None => defaults.temperature,
        };

        let llm = LlmConfig {
            api_key: get("GOOGLE_API_KEY").or_else(|| get("GEMINI_API_KEY")),
            gateway: get("LLM_GATEWAY"),
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            max_retries: match get("LLM_MAX_RETRIES") {
                Some(raw) => parse("LLM_MAX_RETRIES", &raw, "expected a whole number")?,
                None => defaults.max_retries,
            },
            timeout: match get("LLM_TIMEOUT_SECS") {
                Some(raw) => Duration::from_secs(parse(
                    "LLM_TIMEOUT_SECS",
                    &raw,
                    "expected whole seconds",
                )?),
                None => defaults.timeout,
            },
        };

        Ok(Self {
            port,
            db_path: get("ORDER_FLOW_DB_PATH").map(PathBuf::from),
            checkpoints,
            checkpoint_ttl,
            llm,
        })
    }
}

fn parse<T: std::str::FromStr>(
    var: &'static str,
    raw: &str,
    reason: &'static str,
) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason,
    })
}
