//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{endpoints, follow_ups, listen_timeouts, models, quality, server, time_budget};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub speech: SpeechConfig,

    #[serde(default)]
    pub interview: InterviewConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Directory of YAML/JSON call guides preloaded at startup
    #[serde(default)]
    pub call_guides_dir: Option<String>,
}

impl Settings {
    /// Validate all sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_llm()?;
        self.validate_interview()?;

        if self.environment.is_production() {
            if self.llm.provider == LlmProvider::Claude && self.llm.api_key.is_none() {
                return Err(ConfigError::MissingField("llm.api_key".to_string()));
            }
            if self.speech.stt_provider == SttProvider::Deepgram
                && self.speech.deepgram_api_key.is_none()
            {
                return Err(ConfigError::MissingField(
                    "speech.deepgram_api_key".to_string(),
                ));
            }
            if self.speech.tts_provider == TtsProvider::ElevenLabs
                && self.speech.elevenlabs_api_key.is_none()
            {
                return Err(ConfigError::MissingField(
                    "speech.elevenlabs_api_key".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if server.max_concurrent_interviews == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_concurrent_interviews".to_string(),
                message: "Must allow at least one interview".to_string(),
            });
        }

        if server.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: "Timeout cannot be 0".to_string(),
            });
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        let llm = &self.llm;

        if !(0.0..=1.0).contains(&llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", llm.temperature),
            });
        }

        if llm.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_tokens".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    fn validate_interview(&self) -> Result<(), ConfigError> {
        let interview = &self.interview;

        for (field, value) in [
            ("interview.low_density_threshold", interview.low_density_threshold),
            ("interview.high_density_threshold", interview.high_density_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("Must be between 0.0 and 1.0, got {}", value),
                });
            }
        }

        for (field, value) in [
            ("interview.escalation_min_completion", interview.escalation_min_completion),
            ("interview.escalation_min_engagement", interview.escalation_min_engagement),
            ("interview.escalation_max_error_rate", interview.escalation_max_error_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("Must be between 0.0 and 1.0, got {}", value),
                });
            }
        }

        if interview.low_density_threshold > interview.high_density_threshold {
            return Err(ConfigError::InvalidValue {
                field: "interview.low_density_threshold".to_string(),
                message: "Must not exceed high_density_threshold".to_string(),
            });
        }

        if interview.hard_stop_seconds >= interview.prioritize_window_seconds {
            return Err(ConfigError::InvalidValue {
                field: "interview.hard_stop_seconds".to_string(),
                message: "Must be below prioritize_window_seconds".to_string(),
            });
        }

        if interview.answer_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "interview.answer_timeout_seconds".to_string(),
                message: "Timeout cannot be 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Orchestrations allowed to run at once
    #[serde(default = "default_max_concurrent_interviews")]
    pub max_concurrent_interviews: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_interviews() -> usize {
    server::MAX_CONCURRENT_INTERVIEWS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            max_concurrent_interviews: default_max_concurrent_interviews(),
        }
    }
}

/// Which language model backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Claude,
    /// Scripted replies, no network
    Mock,
}

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub provider: LlmProvider,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_anthropic_key", skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_anthropic_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay; doubles on each attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_llm_model() -> String {
    std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| models::CLAUDE_DEFAULT.to_string())
}

fn default_anthropic_key() -> Option<String> {
    std::env::var("ANTHROPIC_API_KEY").ok()
}

fn default_anthropic_endpoint() -> String {
    endpoints::ANTHROPIC_DEFAULT.to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_llm_model(),
            api_key: default_anthropic_key(),
            endpoint: default_anthropic_endpoint(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_seconds: default_llm_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    #[default]
    Deepgram,
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    #[default]
    ElevenLabs,
    Mock,
}

/// Speech-to-text and text-to-speech settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub stt_provider: SttProvider,

    #[serde(default)]
    pub tts_provider: TtsProvider,

    #[serde(default = "default_deepgram_key", skip_serializing)]
    pub deepgram_api_key: Option<String>,

    #[serde(default = "default_deepgram_endpoint")]
    pub deepgram_endpoint: String,

    #[serde(default = "default_deepgram_model")]
    pub deepgram_model: String,

    #[serde(default = "default_elevenlabs_key", skip_serializing)]
    pub elevenlabs_api_key: Option<String>,

    #[serde(default = "default_elevenlabs_endpoint")]
    pub elevenlabs_endpoint: String,

    #[serde(default = "default_elevenlabs_voice")]
    pub elevenlabs_voice_id: String,

    #[serde(default = "default_elevenlabs_model")]
    pub elevenlabs_model: String,

    #[serde(default = "default_speech_timeout")]
    pub timeout_seconds: u64,
}

fn default_deepgram_key() -> Option<String> {
    std::env::var("DEEPGRAM_API_KEY").ok()
}

fn default_deepgram_endpoint() -> String {
    endpoints::DEEPGRAM_DEFAULT.to_string()
}

fn default_deepgram_model() -> String {
    models::DEEPGRAM_DEFAULT.to_string()
}

fn default_elevenlabs_key() -> Option<String> {
    std::env::var("ELEVENLABS_API_KEY").ok()
}

fn default_elevenlabs_endpoint() -> String {
    endpoints::ELEVENLABS_DEFAULT.to_string()
}

fn default_elevenlabs_voice() -> String {
    std::env::var("ELEVENLABS_VOICE_ID").unwrap_or_default()
}

fn default_elevenlabs_model() -> String {
    models::ELEVENLABS_DEFAULT.to_string()
}

fn default_speech_timeout() -> u64 {
    30
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            stt_provider: SttProvider::default(),
            tts_provider: TtsProvider::default(),
            deepgram_api_key: default_deepgram_key(),
            deepgram_endpoint: default_deepgram_endpoint(),
            deepgram_model: default_deepgram_model(),
            elevenlabs_api_key: default_elevenlabs_key(),
            elevenlabs_endpoint: default_elevenlabs_endpoint(),
            elevenlabs_voice_id: default_elevenlabs_voice(),
            elevenlabs_model: default_elevenlabs_model(),
            timeout_seconds: default_speech_timeout(),
        }
    }
}

/// How an unclear consent reply is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsentPolicy {
    /// Proceed as if the respondent agreed
    #[default]
    Affirmative,
    /// End the call as if the respondent declined
    Decline,
}

/// Orchestration tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewConfig {
    #[serde(default = "default_consent_timeout")]
    pub consent_timeout_seconds: u64,

    #[serde(default = "default_introduction_timeout")]
    pub introduction_timeout_seconds: u64,

    #[serde(default = "default_answer_timeout")]
    pub answer_timeout_seconds: u64,

    #[serde(default = "default_closing_timeout")]
    pub closing_timeout_seconds: u64,

    #[serde(default = "default_hard_stop")]
    pub hard_stop_seconds: u64,

    #[serde(default = "default_prioritize_window")]
    pub prioritize_window_seconds: u64,

    #[serde(default = "default_prioritize_backlog")]
    pub prioritize_backlog: usize,

    #[serde(default = "default_low_density")]
    pub low_density_threshold: f32,

    #[serde(default = "default_high_density")]
    pub high_density_threshold: f32,

    #[serde(default = "default_max_follow_ups")]
    pub max_follow_ups_per_question: usize,

    #[serde(default = "default_max_candidates")]
    pub max_follow_up_candidates: usize,

    /// Used when a guide does not set its own maximum duration
    #[serde(default = "default_interview_timeout")]
    pub default_interview_timeout_minutes: u32,

    #[serde(default)]
    pub ambiguous_consent: ConsentPolicy,

    #[serde(default = "default_min_completion")]
    pub escalation_min_completion: f64,

    #[serde(default = "default_min_engagement")]
    pub escalation_min_engagement: f64,

    #[serde(default = "default_max_error_rate")]
    pub escalation_max_error_rate: f64,
}

fn default_consent_timeout() -> u64 {
    listen_timeouts::CONSENT_SECS
}

fn default_introduction_timeout() -> u64 {
    listen_timeouts::INTRODUCTION_SECS
}

fn default_answer_timeout() -> u64 {
    listen_timeouts::ANSWER_SECS
}

fn default_closing_timeout() -> u64 {
    listen_timeouts::CLOSING_SECS
}

fn default_hard_stop() -> u64 {
    time_budget::HARD_STOP_SECS
}

fn default_prioritize_window() -> u64 {
    time_budget::PRIORITIZE_WINDOW_SECS
}

fn default_prioritize_backlog() -> usize {
    time_budget::PRIORITIZE_BACKLOG
}

fn default_low_density() -> f32 {
    follow_ups::LOW_DENSITY
}

fn default_high_density() -> f32 {
    follow_ups::HIGH_DENSITY
}

fn default_max_follow_ups() -> usize {
    follow_ups::MAX_PER_QUESTION
}

fn default_max_candidates() -> usize {
    follow_ups::MAX_CANDIDATES
}

fn default_interview_timeout() -> u32 {
    time_budget::DEFAULT_INTERVIEW_TIMEOUT_MINUTES
}

fn default_min_completion() -> f64 {
    quality::MIN_COMPLETION
}

fn default_min_engagement() -> f64 {
    quality::MIN_ENGAGEMENT
}

fn default_max_error_rate() -> f64 {
    quality::MAX_ERROR_RATE
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            consent_timeout_seconds: default_consent_timeout(),
            introduction_timeout_seconds: default_introduction_timeout(),
            answer_timeout_seconds: default_answer_timeout(),
            closing_timeout_seconds: default_closing_timeout(),
            hard_stop_seconds: default_hard_stop(),
            prioritize_window_seconds: default_prioritize_window(),
            prioritize_backlog: default_prioritize_backlog(),
            low_density_threshold: default_low_density(),
            high_density_threshold: default_high_density(),
            max_follow_ups_per_question: default_max_follow_ups(),
            max_follow_up_candidates: default_max_candidates(),
            default_interview_timeout_minutes: default_interview_timeout(),
            ambiguous_consent: ConsentPolicy::default(),
            escalation_min_completion: default_min_completion(),
            escalation_min_engagement: default_min_engagement(),
            escalation_max_error_rate: default_max_error_rate(),
        }
    }
}

impl InterviewConfig {
    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_seconds)
    }

    pub fn introduction_timeout(&self) -> Duration {
        Duration::from_secs(self.introduction_timeout_seconds)
    }

    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_seconds)
    }

    pub fn closing_timeout(&self) -> Duration {
        Duration::from_secs(self.closing_timeout_seconds)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Terminal-status notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub urls: Vec<String>,

    /// Sent as `X-Webhook-Secret` when set
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,

    #[serde(default = "default_webhook_timeout")]
    pub timeout_seconds: u64,
}

fn default_webhook_timeout() -> u64 {
    10
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            secret: None,
            timeout_seconds: default_webhook_timeout(),
        }
    }
}

impl WebhookConfig {
    pub fn is_enabled(&self) -> bool {
        !self.urls.is_empty()
    }
}

/// Load settings from files and environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("INTERVIEW_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
