//! LLM provider contract
//!
//! Conversation turns, tool declarations and the `Provider` trait the agent
//! loop talks to, plus the Gemini implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use thiserror::Error;

pub mod gemini;

pub use gemini::GeminiProvider;

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("no API key configured")]
    NoApiKey,

    #[error("response appears to be malformed: {0}")]
    InvalidResponse(String),

    #[error("rate limit or quota exceeded (429): {0}")]
    RateLimited(String),
}

impl ProviderError {
    /// Transient failures worth another round: transport errors, server-side
    /// errors and malformed payloads. Rate limits are handled separately.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Request(_) | ProviderError::Json(_) => true,
            ProviderError::InvalidResponse(_) => true,
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::NoApiKey | ProviderError::RateLimited(_) => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Outcome of one tool invocation, flattened to a single string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub payload: String,
}

impl ToolResult {
    pub fn new(tool_name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            payload: payload.into(),
        }
    }
}

/// What the model said in one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTurn {
    Text(String),
    Calls(Vec<FunctionCall>),
}

/// One entry of the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Turn {
    User(String),
    Model(ModelTurn),
    ToolResults(Vec<ToolResult>),
}

/// Token accounting reported by the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub response_tokens: u32,
}

/// Provider response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: Option<String>,
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
    pub usage: Option<Usage>,
}

impl GenerateResponse {
    pub fn has_function_calls(&self) -> bool {
        !self.function_calls.is_empty()
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            text: Some(content.into()),
            function_calls: Vec::new(),
            usage: Some(Usage::default()),
        }
    }

    pub fn calls(function_calls: Vec<FunctionCall>) -> Self {
        Self {
            text: None,
            function_calls,
            usage: Some(Usage::default()),
        }
    }

    pub fn with_usage(mut self, prompt_tokens: u32, response_tokens: u32) -> Self {
        self.usage = Some(Usage {
            prompt_tokens,
            response_tokens,
        });
        self
    }
}

/// Tool declaration exposed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Request parameters
#[derive(Debug, Clone, Default)]
pub struct GenerateParams {
    pub model: String,
    pub turns: Vec<Turn>,
    pub tools: Vec<Tool>,
    pub system_instruction: String,
}

/// LLM collaborator
#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, params: GenerateParams) -> Result<GenerateResponse>;
    fn is_configured(&self) -> bool;
}
