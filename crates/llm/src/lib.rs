//! Language model integration
//!
//! Features:
//! - Claude (Anthropic Messages API) backend with retry and backoff
//! - Adapter from `LlmBackend` to the core `LanguageModel` trait
//! - Scripted model for tests and offline runs
//! - Factory selecting a provider from settings

pub mod adapter;
pub mod backend;
pub mod claude;
pub mod factory;
pub mod scripted;

pub use adapter::LanguageModelAdapter;
pub use backend::{with_retry, FinishReason, GenerationParams, GenerationResult, LlmBackend, LlmConfig};
pub use claude::ClaudeBackend;
pub use factory::LlmFactory;
pub use scripted::{ScriptedLanguageModel, ScriptedReply};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Network(_) | LlmError::Timeout)
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for interview_agent_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout => interview_agent_core::Error::Timeout("LLM request".to_string()),
            other => interview_agent_core::Error::Llm(other.to_string()),
        }
    }
}
