//! Configuration management for the interview agent
//!
//! Supports loading configuration from:
//! - YAML/JSON files under `config/`
//! - Environment variables (`INTERVIEW_AGENT_` prefix, `__` separator)
//!
//! Call guides are authored as YAML or JSON documents and loaded through
//! [`load_call_guide`] or [`load_call_guides_dir`].

pub mod call_guide;
pub mod constants;
pub mod settings;

pub use call_guide::{load_call_guide, load_call_guides_dir, parse_call_guide, GuideFormat};
pub use settings::{
    load_settings, ConsentPolicy, InterviewConfig, LlmProvider, LlmSettings,
    ObservabilityConfig, RuntimeEnvironment, ServerConfig, Settings, SpeechConfig, SttProvider,
    TtsProvider, WebhookConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for interview_agent_core::Error {
    fn from(err: ConfigError) -> Self {
        interview_agent_core::Error::Configuration(err.to_string())
    }
}
