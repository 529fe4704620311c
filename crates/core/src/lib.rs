//! Core traits and types for the interview agent
//!
//! This crate provides foundational types used across all other crates:
//! - Call guide and interview domain model
//! - Response analysis and follow-up candidate types
//! - Core traits for pluggable backends (STT, TTS, audio channel, LLM)
//! - Error types and the degraded-outcome wrapper

pub mod analysis;
pub mod audio;
pub mod call_guide;
pub mod conversation;
pub mod error;
pub mod interview;
pub mod llm_types;
pub mod outcome;
pub mod traits;

pub use analysis::{FollowUpCandidate, ResponseAnalysis, Sentiment};
pub use audio::{AudioClip, AudioEncoding};
pub use call_guide::{
    AdaptiveRules, CallGuide, FollowUpAction, FollowUpTrigger, InterestSignal, Question,
    QuestionType, Section,
};
pub use conversation::{ConversationPhase, HistoryEntry, Speaker};
pub use error::{Error, Result};
pub use interview::{
    EngagementMetrics, Interview, InterviewResponse, InterviewStatus, QualityMetrics,
    TranscriptEntry,
};
pub use llm_types::{FinishReason, GenerateRequest, GenerateResponse, Message, Role, TokenUsage};
pub use outcome::Outcome;
pub use traits::{AudioChannel, LanguageModel, SpeechToText, TextToSpeech, Transcript};
