//! Speech-to-text backends

mod deepgram;
mod passthrough;

pub use deepgram::{DeepgramConfig, DeepgramStt};
pub use passthrough::PassthroughStt;
