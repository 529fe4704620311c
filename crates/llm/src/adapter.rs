//! Language Model adapter
//!
//! Bridges the LlmBackend trait to the core LanguageModel trait,
//! allowing LLM backends to be used where LanguageModel is expected.

use std::sync::Arc;

use async_trait::async_trait;

use interview_agent_core::{
    FinishReason as CoreFinishReason, GenerateRequest, GenerateResponse, LanguageModel, Result,
    TokenUsage,
};

use crate::backend::{FinishReason as BackendFinishReason, GenerationParams, LlmBackend};

/// Adapter that wraps an LlmBackend to implement the core LanguageModel trait.
///
/// # Example
///
/// ```ignore
/// let backend = ClaudeBackend::new(config)?;
/// let language_model: Arc<dyn LanguageModel> = Arc::new(LanguageModelAdapter::new(backend));
/// ```
pub struct LanguageModelAdapter {
    backend: Arc<dyn LlmBackend>,
    model_name: String,
}

impl LanguageModelAdapter {
    /// Create a new adapter wrapping an LlmBackend
    pub fn new<B: LlmBackend + 'static>(backend: B) -> Self {
        let model_name = backend.model_name().to_string();
        Self {
            backend: Arc::new(backend),
            model_name,
        }
    }

    /// Create from an Arc'd backend
    pub fn from_arc(backend: Arc<dyn LlmBackend>) -> Self {
        let model_name = backend.model_name().to_string();
        Self {
            backend,
            model_name,
        }
    }

    fn params(request: &GenerateRequest) -> GenerationParams {
        GenerationParams {
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            model: request.model.clone(),
        }
    }

    fn convert_finish_reason(reason: BackendFinishReason) -> CoreFinishReason {
        match reason {
            BackendFinishReason::Stop => CoreFinishReason::Stop,
            BackendFinishReason::Length => CoreFinishReason::Length,
            BackendFinishReason::Error => CoreFinishReason::Error,
        }
    }
}

#[async_trait]
impl LanguageModel for LanguageModelAdapter {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let params = Self::params(&request);
        let result = self.backend.generate(&request.messages, &params).await?;

        tracing::debug!(
            model = %result.model,
            output_tokens = result.output_tokens,
            total_time_ms = result.total_time_ms,
            "LLM generation complete"
        );

        Ok(GenerateResponse {
            text: result.text,
            model: result.model,
            finish_reason: Self::convert_finish_reason(result.finish_reason),
            usage: Some(TokenUsage::new(result.input_tokens, result.output_tokens)),
        })
    }

    async fn is_available(&self) -> bool {
        self.backend.is_available().await
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
