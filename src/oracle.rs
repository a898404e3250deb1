//! Decision oracle: the external policy that maps transcript text to the
//! next command.
//!
//! Oracle call failures are never raised. Any reply prefixed with
//! [`ERROR_PREFIX`] is a terminal failure signal; network errors, timeouts
//! and malformed responses are all folded into that same channel so the
//! orchestrator needs no separate error type for oracle failures.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

/// Reserved prefix marking an oracle reply as a failure signal rather
/// than a command.
pub const ERROR_PREFIX: &str = "error:";

/// Default OpenRouter API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Policy function mapping an accumulated transcript prompt to the next
/// command or a terminal signal.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Ask for the next command given the prompt text.
    ///
    /// Implementations must map their own failures into
    /// `"error:"`-prefixed strings instead of panicking or returning a
    /// separate error type.
    async fn ask(&self, prompt: &str) -> String;
}

/// Configuration for the OpenRouter-backed oracle.
///
/// Passed explicitly at construction; there is no process-wide API key or
/// default-model singleton.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// OpenRouter API key.
    pub api_key: String,

    /// Model identifier, e.g. `"openai/gpt-3.5-turbo"`.
    pub model: String,

    /// API base URL.
    pub base_url: String,

    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl OracleConfig {
    /// Create a configuration with the default endpoint and timeout.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Override the API base URL (useful for compatible gateways and for
    /// tests).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Oracle backed by an OpenRouter-compatible chat-completions endpoint.
pub struct OpenRouterOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenRouterOracle {
    /// Build an oracle from the given configuration.
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        if config.api_key.is_empty() {
            return Err(OracleError::InvalidConfig {
                message: "API key is required".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl DecisionOracle for OpenRouterOracle {
    async fn ask(&self, prompt: &str) -> String {
        info!("Sending prompt to model {}", self.config.model);
        debug!("Prompt length: {} bytes", prompt.len());

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = match self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Oracle API call failed: {e}");
                return format!("{ERROR_PREFIX} API call failed ({e})");
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            warn!("Oracle API returned {status}");
            return format!("{ERROR_PREFIX} API call failed (HTTP {status})");
        }

        let parsed: ChatResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to decode oracle response: {e}");
                return format!("{ERROR_PREFIX} LLM response empty or malformed");
            }
        };

        match parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
        {
            Some(content) if !content.trim().is_empty() => {
                let command = content.trim().to_string();
                info!("Oracle suggested: '{command}'");
                command
            }
            _ => {
                warn!("Oracle response was empty or malformed");
                format!("{ERROR_PREFIX} LLM response empty or malformed")
            }
        }
    }
}

/// Check whether an oracle reply is a failure signal.
pub fn is_error_reply(reply: &str) -> bool {
    reply.starts_with(ERROR_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_rejected() {
        let err = OpenRouterOracle::new(OracleConfig::new("", "openai/gpt-3.5-turbo"));
        assert!(err.is_err());
    }

    #[test]
    fn test_error_reply_detection() {
        assert!(is_error_reply("error: timeout"));
        assert!(!is_error_reply("next"));
        // The prefix is literal, not trimmed or case-folded
        assert!(!is_error_reply(" error: timeout"));
    }

    #[test]
    fn test_response_decoding_shapes() {
        let full: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"next"}}]}"#).unwrap();
        assert_eq!(full.choices[0].message.content.as_deref(), Some("next"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(empty.choices.is_empty());

        let null_content: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(null_content.choices[0].message.content.is_none());
    }
}
