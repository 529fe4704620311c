//! Webhook notifications for finished interviews
//!
//! Every configured URL receives `{event, timestamp, data}` once an
//! interview reaches a terminal status. Delivery failures are logged and
//! never affect the interview.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use interview_agent_config::WebhookConfig;
use interview_agent_core::{Interview, InterviewStatus};

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "X-Webhook-Secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WebhookEvent {
    #[serde(rename = "interview.completed")]
    InterviewCompleted,
    #[serde(rename = "interview.failed")]
    InterviewFailed,
    #[serde(rename = "interview.cancelled")]
    InterviewCancelled,
}

impl WebhookEvent {
    /// Event for a terminal status; `no_show` and live statuses have none
    pub fn for_status(status: InterviewStatus) -> Option<Self> {
        match status {
            InterviewStatus::Completed => Some(WebhookEvent::InterviewCompleted),
            InterviewStatus::Failed => Some(WebhookEvent::InterviewFailed),
            InterviewStatus::Cancelled => Some(WebhookEvent::InterviewCancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::InterviewCompleted => "interview.completed",
            WebhookEvent::InterviewFailed => "interview.failed",
            WebhookEvent::InterviewCancelled => "interview.cancelled",
        }
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    event: WebhookEvent,
    timestamp: String,
    data: serde_json::Value,
}

/// Posts interview events to the configured URLs
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default webhook client");
                reqwest::Client::new()
            });
        Self { client, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    /// Notifies every URL about a finished interview.
    ///
    /// Returns how many deliveries got a success status.
    pub async fn notify(&self, interview: &Interview) -> usize {
        let Some(event) = WebhookEvent::for_status(interview.status) else {
            return 0;
        };
        if !self.is_enabled() {
            return 0;
        }

        let payload = WebhookPayload {
            event,
            timestamp: Utc::now().to_rfc3339(),
            data: event_data(interview),
        };

        let mut delivered = 0;
        for url in &self.config.urls {
            let mut request = self.client.post(url).json(&payload);
            if let Some(secret) = &self.config.secret {
                request = request.header(SECRET_HEADER, secret);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    delivered += 1;
                    tracing::info!(url = %url, event = event.as_str(), "Webhook delivered");
                }
                Ok(response) => {
                    tracing::warn!(
                        url = %url,
                        status = %response.status(),
                        event = event.as_str(),
                        "Webhook rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, event = event.as_str(), "Webhook failed");
                }
            }
        }
        delivered
    }
}

fn event_data(interview: &Interview) -> serde_json::Value {
    serde_json::json!({
        "interview_id": interview.interview_id,
        "call_guide_id": interview.call_guide_id,
        "status": interview.status,
        "duration_seconds": interview.duration_seconds,
        "completion_percentage": interview.quality_metrics.completion_percentage,
        "requires_human_review": interview.requires_human_review,
        "escalation_reason": interview.escalation_reason,
    })
}
