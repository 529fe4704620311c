//! Speech input and output for the interview agent
//!
//! - `stt`: Deepgram transcription and a passthrough transcriber
//! - `tts`: ElevenLabs synthesis and a passthrough synthesizer
//! - `channel`: scripted audio channel driven by the tokio clock
//! - `factory`: provider selection from settings

pub mod channel;
pub mod factory;
pub mod stt;
pub mod tts;

pub use channel::{ScriptedAudioChannel, ScriptedTurn};
pub use factory::SpeechFactory;
pub use stt::{DeepgramConfig, DeepgramStt, PassthroughStt};
pub use tts::{ElevenLabsConfig, ElevenLabsTts, PassthroughTts};

use thiserror::Error;

/// Speech provider errors
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Empty audio")]
    EmptyAudio,

    #[error("Timeout")]
    Timeout,
}

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SpeechError::Timeout
        } else {
            SpeechError::Network(err.to_string())
        }
    }
}

impl From<SpeechError> for interview_agent_core::Error {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::Timeout => {
                interview_agent_core::Error::Timeout("speech request".to_string())
            }
            other => interview_agent_core::Error::Speech(other.to_string()),
        }
    }
}
