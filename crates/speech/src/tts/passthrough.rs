//! Passthrough synthesizer
//!
//! Encodes the text itself as the clip payload so captured output can be
//! read back without a real voice.

use async_trait::async_trait;

use interview_agent_core::{AudioClip, AudioEncoding, Result, TextToSpeech};

#[derive(Debug, Default, Clone)]
pub struct PassthroughTts;

#[async_trait]
impl TextToSpeech for PassthroughTts {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        Ok(AudioClip::new(text.as_bytes().to_vec(), AudioEncoding::Pcm16, 16_000))
    }

    fn model_name(&self) -> &str {
        "passthrough"
    }
}
