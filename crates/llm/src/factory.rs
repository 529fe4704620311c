//! LLM Factory
//!
//! Creates the configured language model behind the core `LanguageModel`
//! trait so callers never depend on a concrete provider.
//!
//! ## Example
//! ```ignore
//! let llm = LlmFactory::create(&settings.llm)?;
//! let reply = llm.generate(GenerateRequest::prompt("Hello", None)).await?;
//! ```

use std::sync::Arc;

use interview_agent_config::{LlmProvider, LlmSettings};
use interview_agent_core::LanguageModel;

use crate::{
    adapter::LanguageModelAdapter, backend::LlmConfig, claude::ClaudeBackend,
    scripted::ScriptedLanguageModel, LlmError,
};

/// Factory for language models
pub struct LlmFactory;

impl LlmFactory {
    /// Create a language model from settings
    pub fn create(settings: &LlmSettings) -> Result<Arc<dyn LanguageModel>, LlmError> {
        match settings.provider {
            LlmProvider::Claude => {
                let backend = ClaudeBackend::new(LlmConfig::from(settings))?;
                tracing::info!(model = %settings.model, "Using Claude language model");
                Ok(Arc::new(LanguageModelAdapter::new(backend)))
            }
            LlmProvider::Mock => {
                tracing::warn!("Using scripted language model; analysis will be neutral");
                Ok(Arc::new(ScriptedLanguageModel::default()))
            }
        }
    }
}
