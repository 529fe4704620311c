//! Core traits for the interview agent
//!
//! External collaborators sit behind one trait per capability so a real
//! provider and a deterministic test double are interchangeable:
//!
//! ```text
//! Speech:
//!   - SpeechToText: audio clip -> transcript
//!   - TextToSpeech: text -> audio clip
//!   - AudioChannel: delivers agent audio, captures respondent utterances
//!
//! Language models:
//!   - LanguageModel: free-text and schema-constrained generation
//! ```

mod llm;
mod speech;

pub use llm::{extract_json_object, LanguageModel, STRUCTURED_TEMPERATURE};
pub use speech::{AudioChannel, SpeechToText, TextToSpeech, Transcript};
