//! Text-to-speech backends

mod elevenlabs;
mod passthrough;

pub use elevenlabs::{ElevenLabsConfig, ElevenLabsTts};
pub use passthrough::PassthroughTts;
