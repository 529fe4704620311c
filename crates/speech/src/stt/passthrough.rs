//! Passthrough transcriber
//!
//! Treats the clip bytes as UTF-8 text. Pairs with `PassthroughTts` and the
//! scripted audio channel for offline runs and tests.

use async_trait::async_trait;

use interview_agent_core::{AudioClip, Result, SpeechToText, Transcript};

/// Fixed confidence reported for every passthrough transcript
const PASSTHROUGH_CONFIDENCE: f32 = 0.95;

#[derive(Debug, Default, Clone)]
pub struct PassthroughStt;

#[async_trait]
impl SpeechToText for PassthroughStt {
    async fn transcribe(&self, audio: &AudioClip) -> Result<Transcript> {
        let text = String::from_utf8_lossy(&audio.data).trim().to_string();
        Ok(Transcript::new(text, PASSTHROUGH_CONFIDENCE))
    }

    fn model_name(&self) -> &str {
        "passthrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_agent_core::AudioEncoding;

    #[tokio::test]
    async fn test_decodes_text() {
        let clip = AudioClip::new(b" yes, go ahead ".to_vec(), AudioEncoding::Pcm16, 16_000);
        let transcript = PassthroughStt.transcribe(&clip).await.unwrap();
        assert_eq!(transcript.text, "yes, go ahead");
        assert_eq!(transcript.confidence, PASSTHROUGH_CONFIDENCE);
    }
}
