//! Sandpit agent core
//!
//! The tool-call loop, its conversation state and the sandboxed toolkit.

use sandpit_provider::ProviderError;
use thiserror::Error;

pub mod context;
pub mod conversation;
pub mod loop_agent;
pub mod tools;

pub use conversation::{Conversation, IterationBudget};
pub use loop_agent::{AgentLoop, AgentOutcome, AgentRun};
pub use tools::{Sandbox, ToolError, ToolRegistry};

/// Errors from a single model round
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("model response is missing usage metadata")]
    MissingUsage,
}

impl AgentError {
    /// Whether the round may be retried against the budget
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Provider(e) => e.is_retryable(),
            AgentError::MissingUsage => true,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AgentError::Provider(e) if e.is_rate_limited())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
