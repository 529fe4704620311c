//! HTTP Endpoints
//!
//! REST API for call guides and interviews.

use std::time::Duration;

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use interview_agent_core::{CallGuide, Interview, InterviewStatus};

use crate::metrics::metrics_handler;
use crate::runner::{cancel_interview, start_interview, Cancellation};
use crate::state::AppState;
use crate::websocket::ws_handler;
use crate::ServerError;

const DEFAULT_LIST_LIMIT: usize = 50;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let (cors_layer, timeout) = {
        let config = state.get_config();
        (
            build_cors_layer(&config.server.cors_origins, config.server.cors_enabled),
            Duration::from_secs(config.server.timeout_seconds),
        )
    };

    Router::new()
        // Call guides
        .route("/api/call-guides", post(create_call_guide).get(list_call_guides))
        .route(
            "/api/call-guides/:id",
            get(get_call_guide)
                .put(update_call_guide)
                .delete(delete_call_guide),
        )
        // Interviews
        .route("/api/interviews", post(schedule_interview).get(list_interviews))
        .route("/api/interviews/:id", get(get_interview).delete(cancel))
        .route("/api/interviews/:id/transcript", get(get_transcript))
        .route("/api/interviews/:id/progress", get(get_progress))
        .route("/api/interviews/:id/start", post(start))
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        // WebSocket
        .route("/ws/interviews/:id", get(ws_handler))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - disabled: permissive
/// - enabled with no origins: any origin, no credentials
/// - otherwise the configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins");
        return CorsLayer::permissive();
    }

    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("All configured CORS origins are invalid, falling back to localhost");
        return CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods(methods)
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods(methods)
        .allow_headers(Any)
}

async fn create_call_guide(
    State(state): State<AppState>,
    Json(guide): Json<CallGuide>,
) -> Result<(StatusCode, Json<CallGuide>), ServerError> {
    if guide.sections.is_empty() {
        return Err(ServerError::InvalidRequest(
            "Call guide needs at least one section".to_string(),
        ));
    }
    let guide = state.guides.insert(guide)?;
    tracing::info!(guide_id = %guide.guide_id, questions = guide.total_questions(), "Call guide created");
    Ok((StatusCode::CREATED, Json(guide)))
}

async fn list_call_guides(State(state): State<AppState>) -> Json<Vec<CallGuide>> {
    Json(state.guides.list())
}

async fn get_call_guide(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CallGuide>, ServerError> {
    Ok(Json(state.guides.get(&id)?))
}

async fn update_call_guide(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(guide): Json<CallGuide>,
) -> Result<Json<CallGuide>, ServerError> {
    let guide = state.guides.update(&id, guide)?;
    tracing::info!(guide_id = %id, version = %guide.version, "Call guide updated");
    Ok(Json(guide))
}

async fn delete_call_guide(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.guides.remove(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Schedule request
#[derive(Debug, Deserialize)]
struct ScheduleRequest {
    call_guide_id: String,
    #[serde(default)]
    respondent_phone: Option<String>,
    #[serde(default)]
    respondent_name: Option<String>,
    #[serde(default)]
    respondent_email: Option<String>,
    #[serde(default)]
    scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Vec<String>,
}

async fn schedule_interview(
    State(state): State<AppState>,
    Json(request): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<Interview>), ServerError> {
    if !state.guides.contains(&request.call_guide_id) {
        return Err(ServerError::InvalidRequest(format!(
            "Call guide {} not found",
            request.call_guide_id
        )));
    }

    let mut interview = Interview::new(request.call_guide_id).with_respondent(
        request.respondent_name,
        request.respondent_phone,
        request.respondent_email,
    );
    if let Some(at) = request.scheduled_at {
        interview = interview.scheduled_for(at);
    }
    interview.tags = request.tags;

    let interview = state.interviews.insert(interview);
    tracing::info!(interview_id = %interview.interview_id, "Interview scheduled");
    Ok((StatusCode::CREATED, Json(interview)))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    limit: Option<usize>,
}

async fn list_interviews(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Interview>>, ServerError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(InterviewStatus::from_str(raw).ok_or_else(|| {
            ServerError::InvalidRequest(format!("Unknown interview status: {}", raw))
        })?),
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Ok(Json(state.interviews.list(status, limit)))
}

async fn get_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Interview>, ServerError> {
    Ok(Json(state.interviews.get(&id)?))
}

async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let interview = state.interviews.get(&id)?;
    Ok(Json(serde_json::json!({
        "interview_id": interview.interview_id,
        "status": interview.status,
        "responses": interview.transcript(),
    })))
}

/// Live conversation state of an interview being conducted
async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let interview = state.interviews.get(&id)?;
    let snapshot = state
        .orchestrator
        .state_manager()
        .snapshot(&id)
        .ok_or_else(|| {
            ServerError::NotFound(format!(
                "Interview {} is not being conducted ({})",
                id, interview.status
            ))
        })?;
    Ok(Json(serde_json::json!({
        "interview_id": id,
        "status": interview.status,
        "conversation": snapshot,
    })))
}

async fn start(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServerError> {
    let interview = start_interview(&state, &id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "interview_id": interview.interview_id,
            "status": interview.status,
            "websocket_url": format!("/ws/interviews/{}", interview.interview_id),
        })),
    ))
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    match cancel_interview(&state, &id)? {
        Cancellation::Cancelled(_) => Ok(StatusCode::NO_CONTENT.into_response()),
        Cancellation::Requested => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "interview_id": id,
                "status": "cancellation_requested",
            })),
        )
            .into_response()),
    }
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "interview-agent",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "active_interviews": state.active_interviews(),
    }))
}

/// Readiness: the language model must answer within two seconds
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let llm_status =
        match tokio::time::timeout(Duration::from_secs(2), state.llm.is_available()).await {
            Ok(true) => "ok",
            Ok(false) => "unreachable",
            Err(_) => "timeout",
        };
    let ready = llm_status == "ok";

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "ready": ready,
            "checks": {
                "llm": { "status": llm_status, "model": state.llm.model_name() },
                "call_guides": { "status": "ok", "count": state.guides.len() },
            },
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
}
