//! Application State
//!
//! Shared state across all handlers.

use std::path::Path;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;
use tokio::sync::Semaphore;

use interview_agent_agent::{FollowUpGenerator, InterviewOrchestrator, LlmResponseAnalyzer};
use interview_agent_config::{load_call_guides_dir, Settings};
use interview_agent_core::{LanguageModel, SpeechToText, TextToSpeech};
use interview_agent_llm::LlmFactory;
use interview_agent_speech::SpeechFactory;

use crate::metrics::{init_metrics, MeteredLanguageModel, PrometheusObserver};
use crate::store::{CallGuideStore, InterviewStore};
use crate::webhook::WebhookNotifier;
use crate::websocket::ChannelRegistry;
use crate::ServerError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Settings>>,
    pub guides: Arc<CallGuideStore>,
    pub interviews: Arc<InterviewStore>,
    pub orchestrator: Arc<InterviewOrchestrator>,
    /// Audio channels of interviews being conducted
    pub channels: Arc<ChannelRegistry>,
    pub webhooks: WebhookNotifier,
    /// One permit per concurrently conducted interview
    pub interview_slots: Arc<Semaphore>,
    /// Checked by the readiness probe
    pub llm: Arc<dyn LanguageModel>,
    /// `None` when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Builds providers from settings
    pub fn new(config: Settings) -> Result<Self, ServerError> {
        let llm = LlmFactory::create(&config.llm)
            .map_err(|e| ServerError::Config(format!("language model: {}", e)))?;
        let stt = SpeechFactory::create_stt(&config.speech)
            .map_err(|e| ServerError::Config(format!("speech-to-text: {}", e)))?;
        let tts = SpeechFactory::create_tts(&config.speech)
            .map_err(|e| ServerError::Config(format!("text-to-speech: {}", e)))?;

        Ok(Self::with_providers(config, stt, tts, llm))
    }

    /// State over explicit providers
    pub fn with_providers(
        config: Settings,
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        let interview_config = config.interview.clone();

        let analysis_llm: Arc<dyn LanguageModel> =
            Arc::new(MeteredLanguageModel::new(Arc::clone(&llm), "analysis"));
        let follow_up_llm: Arc<dyn LanguageModel> =
            Arc::new(MeteredLanguageModel::new(Arc::clone(&llm), "follow_up"));

        let orchestrator = InterviewOrchestrator::new(
            stt,
            tts,
            Arc::clone(&analysis_llm),
            interview_config.clone(),
        )
        .with_analyzer(Arc::new(LlmResponseAnalyzer::new(analysis_llm)))
        .with_follow_up_generator(Arc::new(FollowUpGenerator::from_config(
            follow_up_llm,
            &interview_config,
        )))
        .with_observer(Arc::new(PrometheusObserver));

        let metrics = config
            .observability
            .metrics_enabled
            .then(init_metrics);

        Self {
            guides: Arc::new(CallGuideStore::new()),
            interviews: Arc::new(InterviewStore::new()),
            orchestrator: Arc::new(orchestrator),
            channels: Arc::new(ChannelRegistry::new()),
            webhooks: WebhookNotifier::new(config.webhook.clone()),
            interview_slots: Arc::new(Semaphore::new(config.server.max_concurrent_interviews)),
            llm,
            metrics,
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Get a read guard to the current configuration
    pub fn get_config(&self) -> parking_lot::RwLockReadGuard<'_, Settings> {
        self.config.read()
    }

    /// Loads every guide file in `dir`; returns how many were stored
    pub fn preload_guides(&self, dir: impl AsRef<Path>) -> Result<usize, ServerError> {
        let guides = load_call_guides_dir(dir)?;
        let mut loaded = 0;
        for guide in guides {
            let guide_id = guide.guide_id.clone();
            match self.guides.insert(guide) {
                Ok(_) => loaded += 1,
                Err(e) => tracing::warn!(guide_id = %guide_id, error = %e, "Skipping call guide"),
            }
        }
        Ok(loaded)
    }

    /// Interviews currently holding a slot
    pub fn active_interviews(&self) -> usize {
        let max = self.get_config().server.max_concurrent_interviews;
        max.saturating_sub(self.interview_slots.available_permits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_agent_config::{LlmProvider, SttProvider, TtsProvider};

    fn mock_settings() -> Settings {
        let mut settings = Settings::default();
        settings.llm.provider = LlmProvider::Mock;
        settings.speech.stt_provider = SttProvider::Mock;
        settings.speech.tts_provider = TtsProvider::Mock;
        settings.observability.metrics_enabled = false;
        settings
    }

    #[test]
    fn test_state_from_mock_settings() {
        let state = AppState::new(mock_settings()).unwrap();
        assert!(state.metrics.is_none());
        assert_eq!(state.active_interviews(), 0);
        assert_eq!(state.llm.model_name(), "scripted");
    }

    #[test]
    fn test_preload_guides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("commuting.yaml"),
            r#"
guide_id: commuting
name: Commuting
research_objective: Understand commuting habits
sections:
  - section_name: Usage
    questions:
      - id: q1
        text: How do you get to work?
"#,
        )
        .unwrap();

        let state = AppState::new(mock_settings()).unwrap();
        assert_eq!(state.preload_guides(dir.path()).unwrap(), 1);
        assert_eq!(state.guides.get("commuting").unwrap().total_questions(), 1);
        assert!(state.preload_guides(dir.path().join("missing")).is_err());
    }
}
