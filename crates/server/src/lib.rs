//! Interview Agent Server
//!
//! HTTP API for call guides and interviews, a WebSocket audio bridge for
//! live interviews, background orchestration, Prometheus metrics and
//! webhook notifications.

pub mod http;
pub mod metrics;
pub mod runner;
pub mod state;
pub mod store;
pub mod webhook;
pub mod websocket;

pub use http::create_router;
pub use metrics::{init_metrics, MeteredLanguageModel, PrometheusObserver};
pub use runner::{cancel_interview, start_interview};
pub use state::AppState;
pub use store::{CallGuideStore, InterviewStore};
pub use webhook::{WebhookEvent, WebhookNotifier};
pub use websocket::{ChannelRegistry, WebSocketChannel, WsMessage};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Capacity exhausted: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status = StatusCode::from(self);
        if status.is_server_error() {
            tracing::error!(%status, "{}", message);
        } else {
            tracing::debug!(%status, "{}", message);
        }
        (status, Json(serde_json::json!({ "detail": message }))).into_response()
    }
}

impl From<interview_agent_core::Error> for ServerError {
    fn from(err: interview_agent_core::Error) -> Self {
        use interview_agent_core::Error;
        match err {
            Error::NotFound(what) => ServerError::NotFound(what),
            Error::InvalidTransition { .. } => ServerError::InvalidRequest(err.to_string()),
            Error::Configuration(msg) => ServerError::Config(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<interview_agent_config::ConfigError> for ServerError {
    fn from(err: interview_agent_config::ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}
