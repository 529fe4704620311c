//! ElevenLabs synthesis
//!
//! `POST {endpoint}/v1/text-to-speech/{voice_id}` returns MP3 bytes for the
//! whole utterance.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use interview_agent_config::SpeechConfig;
use interview_agent_core::{AudioClip, AudioEncoding, Result, TextToSpeech};

use crate::SpeechError;

/// Sample rate of the MP3 stream ElevenLabs returns by default
const OUTPUT_SAMPLE_RATE: u32 = 44_100;

/// ElevenLabs configuration
#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub voice_id: String,
    pub endpoint: String,
    pub model: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub timeout: Duration,
}

impl ElevenLabsConfig {
    pub fn from_settings(settings: &SpeechConfig) -> std::result::Result<Self, SpeechError> {
        let api_key = settings
            .elevenlabs_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SpeechError::Configuration("ELEVENLABS_API_KEY not set".to_string()))?;

        if settings.elevenlabs_voice_id.is_empty() {
            return Err(SpeechError::Configuration(
                "ELEVENLABS_VOICE_ID not set".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            voice_id: settings.elevenlabs_voice_id.clone(),
            endpoint: settings.elevenlabs_endpoint.trim_end_matches('/').to_string(),
            model: settings.elevenlabs_model.clone(),
            stability: 0.5,
            similarity_boost: 0.75,
            timeout: Duration::from_secs(settings.timeout_seconds),
        })
    }
}

/// ElevenLabs TTS backend
pub struct ElevenLabsTts {
    config: ElevenLabsConfig,
    client: Client,
}

impl ElevenLabsTts {
    pub fn new(config: ElevenLabsConfig) -> std::result::Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SpeechError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(voice_id = %config.voice_id, "Initialized ElevenLabs TTS");
        Ok(Self { config, client })
    }

    fn body<'a>(&'a self, text: &'a str) -> SynthesisRequest<'a> {
        SynthesisRequest {
            text,
            model_id: &self.config.model,
            voice_settings: VoiceSettings {
                stability: self.config.stability,
                similarity_boost: self.config.similarity_boost,
            },
        }
    }

    async fn request(&self, text: &str) -> std::result::Result<AudioClip, SpeechError> {
        let response = self
            .client
            .post(format!(
                "{}/v1/text-to-speech/{}",
                self.config.endpoint, self.config.voice_id
            ))
            .header("xi-api-key", &self.config.api_key)
            .header("accept", AudioEncoding::Mp3.mime_type())
            .json(&self.body(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api(format!("HTTP {}: {}", status, error)));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(SpeechError::InvalidResponse("empty audio body".to_string()));
        }

        Ok(AudioClip::new(bytes.to_vec(), AudioEncoding::Mp3, OUTPUT_SAMPLE_RATE))
    }
}

#[async_trait]
impl TextToSpeech for ElevenLabsTts {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        if text.trim().is_empty() {
            return Ok(AudioClip::new(Vec::new(), AudioEncoding::Mp3, OUTPUT_SAMPLE_RATE));
        }

        let start = Instant::now();
        let clip = self.request(text).await?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes = clip.len(),
            "ElevenLabs synthesis complete"
        );
        Ok(clip)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}
