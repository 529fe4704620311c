//! Speech processing traits

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{AudioClip, Result};

/// Final transcription of one utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    /// Provider confidence (0.0 - 1.0)
    pub confidence: f32,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

impl Transcript {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            language: None,
            duration_seconds: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Speech-to-Text interface
///
/// Implementations:
/// - `DeepgramStt` - Deepgram pre-recorded transcription
/// - `PassthroughStt` - decodes UTF-8 payloads, for tests and dry runs
///
/// # Example
///
/// ```ignore
/// let transcript = stt.transcribe(&clip).await?;
/// println!("Heard: {}", transcript.text);
/// ```
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Transcribe a complete utterance
    async fn transcribe(&self, audio: &AudioClip) -> Result<Transcript>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}

/// Text-to-Speech interface
///
/// Implementations:
/// - `ElevenLabsTts` - ElevenLabs synthesis
/// - `PassthroughTts` - encodes the text as the payload, for tests and dry runs
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Synthesize text to an audio clip
    async fn synthesize(&self, text: &str) -> Result<AudioClip>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}

/// Bidirectional audio link to the respondent
///
/// Telephony or WebSocket bridges implement this; the orchestrator only
/// plays clips and waits for utterances.
#[async_trait]
pub trait AudioChannel: Send + Sync {
    /// Deliver synthesized audio; returns once the channel accepted it.
    /// `text` is what the clip says, for channels that also show captions.
    async fn play(&self, clip: AudioClip, text: &str) -> Result<()>;

    /// Wait up to `timeout` for the next respondent utterance.
    /// `Ok(None)` means nothing was said in time.
    async fn capture(&self, timeout: Duration) -> Result<Option<AudioClip>>;

    /// Release the channel once the interview is over
    async fn close(&self) {}
}
