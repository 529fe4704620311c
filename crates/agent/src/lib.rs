//! Interview orchestration
//!
//! Features:
//! - Per-interview conversation state with time budget and follow-up stack
//! - Lexical consent classification with a configurable ambiguity policy
//! - LLM-backed response analysis that degrades to a neutral reading
//! - Adaptive follow-up generation plus deterministic trigger rules
//! - Phase-driven interview orchestrator over pluggable speech and audio
//! - Pure metrics finalization and quality-based escalation

pub mod analyzer;
pub mod consent;
pub mod conversation_state;
pub mod follow_up;
pub mod observer;
pub mod orchestrator;
pub mod scoring;

pub use analyzer::{AnalysisContext, LlmResponseAnalyzer, ResponseAnalyzer};
pub use consent::{classify_consent, ConsentDecision};
pub use conversation_state::{
    ConversationSnapshot, ConversationState, ConversationStateManager, SharedConversationState,
};
pub use follow_up::{FollowUpContext, FollowUpGenerator};
pub use observer::{InterviewObserver, NoopObserver};
pub use orchestrator::InterviewOrchestrator;
pub use scoring::{finalize_metrics, quality_escalation};

use interview_agent_core::ConversationPhase;
use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Conversation state not found: {0}")]
    StateNotFound(String),

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition {
        from: ConversationPhase,
        to: ConversationPhase,
    },

    #[error(transparent)]
    Core(#[from] interview_agent_core::Error),
}

impl From<AgentError> for interview_agent_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Core(e) => e,
            AgentError::StateNotFound(id) => {
                interview_agent_core::Error::NotFound(format!("conversation state {}", id))
            }
            other => interview_agent_core::Error::Internal(other.to_string()),
        }
    }
}
