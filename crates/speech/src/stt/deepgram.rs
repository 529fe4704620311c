//! Deepgram pre-recorded transcription
//!
//! Sends one complete utterance per request to
//! `POST {endpoint}/v1/listen` and reads the first alternative of the
//! first channel.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use interview_agent_config::SpeechConfig;
use interview_agent_core::{AudioClip, AudioEncoding, Result, SpeechToText, Transcript};

use crate::SpeechError;

/// Deepgram configuration
#[derive(Debug, Clone)]
pub struct DeepgramConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub language: String,
    pub timeout: Duration,
}

impl DeepgramConfig {
    pub fn from_settings(settings: &SpeechConfig) -> std::result::Result<Self, SpeechError> {
        let api_key = settings
            .deepgram_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                SpeechError::Configuration("DEEPGRAM_API_KEY not set".to_string())
            })?;

        Ok(Self {
            api_key,
            endpoint: settings.deepgram_endpoint.trim_end_matches('/').to_string(),
            model: settings.deepgram_model.clone(),
            language: "en".to_string(),
            timeout: Duration::from_secs(settings.timeout_seconds),
        })
    }
}

/// Deepgram STT backend
pub struct DeepgramStt {
    config: DeepgramConfig,
    client: Client,
}

impl DeepgramStt {
    pub fn new(config: DeepgramConfig) -> std::result::Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SpeechError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(model = %config.model, "Initialized Deepgram STT");
        Ok(Self { config, client })
    }

    fn query(&self, clip: &AudioClip) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("model", self.config.model.clone()),
            ("punctuate", "true".to_string()),
            ("smart_format", "true".to_string()),
            ("language", self.config.language.clone()),
        ];
        // Raw formats carry no header, so Deepgram needs the layout spelled out
        match clip.encoding {
            AudioEncoding::Pcm16 => {
                query.push(("encoding", "linear16".to_string()));
                query.push(("sample_rate", clip.sample_rate.to_string()));
            }
            AudioEncoding::Mulaw => {
                query.push(("encoding", "mulaw".to_string()));
                query.push(("sample_rate", clip.sample_rate.to_string()));
            }
            _ => {}
        }
        query
    }

    async fn request(&self, clip: &AudioClip) -> std::result::Result<Transcript, SpeechError> {
        if clip.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }

        let response = self
            .client
            .post(format!("{}/v1/listen", self.config.endpoint))
            .query(&self.query(clip))
            .header("authorization", format!("Token {}", self.config.api_key))
            .header("content-type", clip.encoding.mime_type())
            .body(clip.data.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api(format!("HTTP {}: {}", status, error)));
        }

        let body: DeepgramResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::InvalidResponse(e.to_string()))?;

        body.into_transcript(&self.config.language)
    }
}

#[async_trait]
impl SpeechToText for DeepgramStt {
    async fn transcribe(&self, audio: &AudioClip) -> Result<Transcript> {
        let start = Instant::now();
        let transcript = self.request(audio).await?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            confidence = transcript.confidence,
            "Deepgram transcription complete"
        );
        Ok(transcript)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
    #[serde(default)]
    metadata: Option<DeepgramMetadata>,
}

#[derive(Debug, Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(Debug, Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Deserialize)]
struct DeepgramAlternative {
    transcript: String,
    #[serde(default)]
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct DeepgramMetadata {
    #[serde(default)]
    duration: Option<f64>,
}

impl DeepgramResponse {
    fn into_transcript(self, language: &str) -> std::result::Result<Transcript, SpeechError> {
        let alternative = self
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
            .ok_or_else(|| SpeechError::InvalidResponse("no transcription alternatives".to_string()))?;

        Ok(Transcript {
            text: alternative.transcript,
            confidence: alternative.confidence,
            language: Some(language.to_string()),
            duration_seconds: self.metadata.and_then(|m| m.duration),
        })
    }
}
