//! Speech provider factory

use std::sync::Arc;

use interview_agent_config::{SpeechConfig, SttProvider, TtsProvider};
use interview_agent_core::{SpeechToText, TextToSpeech};

use crate::stt::{DeepgramConfig, DeepgramStt, PassthroughStt};
use crate::tts::{ElevenLabsConfig, ElevenLabsTts, PassthroughTts};
use crate::SpeechError;

/// Creates speech backends from settings
pub struct SpeechFactory;

impl SpeechFactory {
    pub fn create_stt(settings: &SpeechConfig) -> Result<Arc<dyn SpeechToText>, SpeechError> {
        match settings.stt_provider {
            SttProvider::Deepgram => {
                let config = DeepgramConfig::from_settings(settings)?;
                Ok(Arc::new(DeepgramStt::new(config)?))
            }
            SttProvider::Mock => {
                tracing::warn!("Using passthrough STT");
                Ok(Arc::new(PassthroughStt))
            }
        }
    }

    pub fn create_tts(settings: &SpeechConfig) -> Result<Arc<dyn TextToSpeech>, SpeechError> {
        match settings.tts_provider {
            TtsProvider::ElevenLabs => {
                let config = ElevenLabsConfig::from_settings(settings)?;
                Ok(Arc::new(ElevenLabsTts::new(config)?))
            }
            TtsProvider::Mock => {
                tracing::warn!("Using passthrough TTS");
                Ok(Arc::new(PassthroughTts))
            }
        }
    }
}
