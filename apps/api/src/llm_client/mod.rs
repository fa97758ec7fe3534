//! LLM client: the single point of entry for all language-model calls.
//!
//! ARCHITECTURAL RULE: agents never talk to a backend directly. Every chain
//! goes through `LlmGateway`, which owns retries, timeouts, output validation
//! and fallbacks. `LlmBackend` is the narrow collaborator contract underneath.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod gateway;
pub mod prompts;
#[cfg(test)]
pub mod testing;

pub use gateway::{ChainOutcome, ChainOutput, LlmGateway};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all chains.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("LLM output failed validation: {0}")]
    Validation(String),

    #[error("Unknown chain template: {0}")]
    UnknownTemplate(String),

    #[error("Backend failure: {0}")]
    Backend(String),
}

impl LlmError {
    /// Client-side API errors and unknown templates will not improve on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::UnknownTemplate(_) => false,
            _ => true,
        }
    }
}

/// The templated chains the orchestrator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainTemplate {
    JobQuestions,
    NextAction,
    FollowUp,
    TurnFeedback,
    FinalSummary,
}

impl ChainTemplate {
    pub fn id(&self) -> &'static str {
        match self {
            ChainTemplate::JobQuestions => "job_questions",
            ChainTemplate::NextAction => "next_action",
            ChainTemplate::FollowUp => "follow_up",
            ChainTemplate::TurnFeedback => "turn_feedback",
            ChainTemplate::FinalSummary => "final_summary",
        }
    }
}

/// External language-model backend. May be slow, may fail, may return
/// malformed content; callers must never assume success.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn invoke(&self, template_id: &str, vars: &Value) -> Result<Value, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Anthropic Messages API backend. Makes exactly one HTTP call per invoke;
/// retry policy lives in the gateway.
#[derive(Clone)]
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
}

impl AnthropicBackend {
    pub fn new(api_key: String, timeout: std::time::Duration) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::Backend("Anthropic API key is empty".to_string()));
        }
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
        })
    }

    async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = response.json().await?;
        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );
        Ok(llm_response)
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn invoke(&self, template_id: &str, vars: &Value) -> Result<Value, LlmError> {
        let template = prompts::lookup(template_id)
            .ok_or_else(|| LlmError::UnknownTemplate(template_id.to_string()))?;
        let prompt = prompts::render(template.user, vars);

        let response = self.call(&prompt, template.system).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        let text = strip_json_fences(text);
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        serde_json::from_str(text).map_err(LlmError::Parse)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
