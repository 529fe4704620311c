//! Prometheus metrics
//!
//! Interview events arrive through [`PrometheusObserver`], which the
//! orchestrator calls; token usage is counted by wrapping the language model
//! in [`MeteredLanguageModel`]. Everything is rendered at `GET /metrics`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use interview_agent_agent::InterviewObserver;
use interview_agent_core::{
    FollowUpCandidate, GenerateRequest, GenerateResponse, Interview, InterviewResponse,
    LanguageModel, Result,
};

use crate::state::AppState;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the global Prometheus recorder once and returns its handle.
///
/// If another recorder is already installed the handle renders nothing,
/// which keeps tests that build several routers working.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                describe_metrics();
                handle
            }
            Err(e) => {
                tracing::warn!(error = %e, "Metrics recorder already installed");
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

fn describe_metrics() {
    metrics::describe_counter!("interviews_total", "Finished interviews by status");
    metrics::describe_histogram!("interview_duration_seconds", "Interview wall-clock duration");
    metrics::describe_histogram!("interview_completion_rate", "Share of guide questions answered");
    metrics::describe_counter!("responses_total", "Recorded responses by section");
    metrics::describe_counter!("response_sentiment_total", "Recorded responses by sentiment");
    metrics::describe_histogram!("information_density", "Analyzed information density");
    metrics::describe_counter!("follow_ups_generated_total", "Follow-ups asked by action");
    metrics::describe_histogram!("engagement_score", "Overall engagement per interview");
    metrics::describe_histogram!("stt_latency_seconds", "Transcription latency");
    metrics::describe_histogram!("tts_latency_seconds", "Synthesis latency");
    metrics::describe_histogram!("llm_latency_seconds", "Language model latency by operation");
    metrics::describe_counter!("llm_tokens_used_total", "Language model tokens by operation");
    metrics::describe_counter!("errors_total", "Provider failures and degradations");
    metrics::describe_counter!("escalations_total", "Interviews flagged for human review");
    metrics::describe_gauge!("active_interviews", "Interviews currently being conducted");
}

/// Prometheus metrics endpoint
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

/// Observer that records interview events as Prometheus metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusObserver;

impl InterviewObserver for PrometheusObserver {
    fn interview_started(&self, _interview: &Interview) {
        metrics::gauge!("active_interviews").increment(1.0);
    }

    fn interview_finished(&self, interview: &Interview) {
        metrics::gauge!("active_interviews").decrement(1.0);
        metrics::counter!(
            "interviews_total",
            "status" => interview.status.as_str(),
            "call_guide_id" => interview.call_guide_id.clone()
        )
        .increment(1);
        if let Some(duration) = interview.duration_seconds {
            metrics::histogram!("interview_duration_seconds").record(duration);
        }
        metrics::histogram!("interview_completion_rate")
            .record(interview.quality_metrics.completion_percentage);
        metrics::histogram!("engagement_score")
            .record(interview.engagement_metrics.overall_engagement);
    }

    fn response_recorded(&self, response: &InterviewResponse) {
        metrics::counter!("responses_total", "section" => response.section_name.clone())
            .increment(1);
        if let Some(sentiment) = response.sentiment {
            metrics::counter!("response_sentiment_total", "sentiment" => sentiment.as_str())
                .increment(1);
        }
        if let Some(density) = response.information_density {
            metrics::histogram!("information_density").record(f64::from(density));
        }
    }

    fn follow_up_asked(&self, candidate: &FollowUpCandidate) {
        metrics::counter!(
            "follow_ups_generated_total",
            "action_type" => candidate.action_type.as_str()
        )
        .increment(1);
    }

    fn stt_latency(&self, elapsed: Duration) {
        metrics::histogram!("stt_latency_seconds").record(elapsed.as_secs_f64());
    }

    fn tts_latency(&self, elapsed: Duration) {
        metrics::histogram!("tts_latency_seconds").record(elapsed.as_secs_f64());
    }

    fn llm_latency(&self, operation: &str, elapsed: Duration) {
        metrics::histogram!("llm_latency_seconds", "operation" => operation.to_string())
            .record(elapsed.as_secs_f64());
    }

    fn error(&self, error_type: &str, component: &str) {
        metrics::counter!(
            "errors_total",
            "error_type" => error_type.to_string(),
            "component" => component.to_string()
        )
        .increment(1);
    }

    fn escalation(&self, reason: &str) {
        metrics::counter!("escalations_total", "reason" => escalation_label(reason)).increment(1);
    }
}

/// Escalation reasons carry free text after a colon; only the prefix is a label
fn escalation_label(reason: &str) -> String {
    reason
        .split(':')
        .next()
        .unwrap_or(reason)
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

/// Language model wrapper counting token usage under one operation label
pub struct MeteredLanguageModel {
    inner: Arc<dyn LanguageModel>,
    operation: &'static str,
}

impl MeteredLanguageModel {
    pub fn new(inner: Arc<dyn LanguageModel>, operation: &'static str) -> Self {
        Self { inner, operation }
    }
}

#[async_trait]
impl LanguageModel for MeteredLanguageModel {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let response = self.inner.generate(request).await?;
        if let Some(usage) = &response.usage {
            metrics::counter!("llm_tokens_used_total", "operation" => self.operation)
                .increment(u64::from(usage.total_tokens));
        }
        Ok(response)
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_agent_core::InterviewStatus;
    use interview_agent_llm::ScriptedLanguageModel;

    #[test]
    fn test_escalation_label() {
        assert_eq!(escalation_label("System error: boom"), "system_error");
        assert_eq!(escalation_label("Respondent distress"), "respondent_distress");
    }

    #[tokio::test]
    async fn test_metered_model_passes_through() {
        let inner = Arc::new(ScriptedLanguageModel::with_default_reply("three word reply"));
        let metered = MeteredLanguageModel::new(inner.clone(), "analysis");

        let response = metered
            .generate(GenerateRequest::prompt("Summarize", None))
            .await
            .unwrap();
        assert_eq!(response.text, "three word reply");
        assert_eq!(metered.model_name(), "scripted");
        assert_eq!(inner.call_count(), 1);
    }

    #[test]
    fn test_observer_renders_interview_metrics() {
        let handle = init_metrics();
        let observer = PrometheusObserver;

        let mut interview = Interview::new("guide-metrics");
        observer.interview_started(&interview);
        interview.transition_to(InterviewStatus::InProgress).unwrap();
        interview.transition_to(InterviewStatus::Completed).unwrap();
        observer.interview_finished(&interview);
        observer.error("timeout", "stt");

        let rendered = handle.render();
        if rendered.is_empty() {
            // another recorder owns the process in this test binary
            return;
        }
        assert!(rendered.contains("interviews_total"));
        assert!(rendered.contains("guide-metrics"));
        assert!(rendered.contains("errors_total"));
    }
}
