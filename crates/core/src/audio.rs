//! Audio clip types exchanged with speech providers and the call channel

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Audio encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    /// 16-bit signed PCM (little-endian)
    #[default]
    Pcm16,
    /// μ-law (telephony)
    Mulaw,
    /// WAV container
    Wav,
    /// MP3 (ElevenLabs default output)
    Mp3,
    /// Opus in an Ogg container
    Opus,
}

impl AudioEncoding {
    /// MIME type sent as Content-Type to transcription services
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioEncoding::Pcm16 => "audio/l16",
            AudioEncoding::Mulaw => "audio/mulaw",
            AudioEncoding::Wav => "audio/wav",
            AudioEncoding::Mp3 => "audio/mpeg",
            AudioEncoding::Opus => "audio/ogg",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pcm16" | "pcm" | "linear16" => Some(AudioEncoding::Pcm16),
            "mulaw" | "ulaw" => Some(AudioEncoding::Mulaw),
            "wav" => Some(AudioEncoding::Wav),
            "mp3" | "mpeg" => Some(AudioEncoding::Mp3),
            "opus" | "ogg" => Some(AudioEncoding::Opus),
            _ => None,
        }
    }
}

/// One utterance worth of encoded audio.
///
/// Bytes are shared so a clip can be fanned out to recorders and the channel
/// without copying.
#[derive(Clone, PartialEq)]
pub struct AudioClip {
    pub data: Arc<[u8]>,
    pub encoding: AudioEncoding,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(data: impl Into<Arc<[u8]>>, encoding: AudioEncoding, sample_rate: u32) -> Self {
        Self {
            data: data.into(),
            encoding,
            sample_rate,
        }
    }

    /// 16kHz PCM clip, the format most transcription services accept raw
    pub fn pcm16(data: impl Into<Arc<[u8]>>) -> Self {
        Self::new(data, AudioEncoding::Pcm16, 16_000)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Approximate duration in milliseconds; only meaningful for raw PCM
    pub fn duration_ms(&self) -> Option<u64> {
        match self.encoding {
            AudioEncoding::Pcm16 if self.sample_rate > 0 => {
                Some((self.data.len() as u64 / 2) * 1000 / self.sample_rate as u64)
            }
            AudioEncoding::Mulaw if self.sample_rate > 0 => {
                Some(self.data.len() as u64 * 1000 / self.sample_rate as u64)
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioClip")
            .field("bytes", &self.data.len())
            .field("encoding", &self.encoding)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_duration() {
        // one second of 16kHz 16-bit mono
        let clip = AudioClip::pcm16(vec![0u8; 32_000]);
        assert_eq!(clip.duration_ms(), Some(1000));
        assert_eq!(clip.encoding.mime_type(), "audio/l16");
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!(AudioEncoding::from_str("MP3"), Some(AudioEncoding::Mp3));
        assert_eq!(AudioEncoding::from_str("linear16"), Some(AudioEncoding::Pcm16));
        assert_eq!(AudioEncoding::from_str("flac"), None);
    }

    #[test]
    fn test_compressed_clip_has_no_duration() {
        let clip = AudioClip::new(vec![1u8, 2, 3], AudioEncoding::Mp3, 44_100);
        assert_eq!(clip.duration_ms(), None);
        assert!(!clip.is_empty());
    }
}
