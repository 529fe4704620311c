//! Core error type shared across crates

use thiserror::Error;

use crate::interview::InterviewStatus;

/// Result alias used by core traits
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced through the core traits
#[derive(Error, Debug)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Audio channel error: {0}")]
    Audio(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: InterviewStatus,
        to: InterviewStatus,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Short machine-readable label, used as a metrics dimension
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Llm(_) => "llm",
            Error::Speech(_) => "speech",
            Error::Audio(_) => "audio",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::NotFound(_) => "not_found",
            Error::Serialization(_) => "serialization",
            Error::Configuration(_) => "configuration",
            Error::Timeout(_) => "timeout",
            Error::Internal(_) => "internal",
        }
    }
}
