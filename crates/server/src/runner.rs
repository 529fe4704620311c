//! Background orchestration of interviews
//!
//! Starting an interview moves it to `in_progress` in the store, opens its
//! WebSocket channel and spawns one task that conducts it. The task owns a
//! concurrency permit until the final record is stored and webhooks fire.

use std::sync::Arc;

use interview_agent_core::{Interview, InterviewStatus};

use crate::state::AppState;
use crate::ServerError;

/// Result of a cancellation request
#[derive(Debug)]
pub enum Cancellation {
    /// The interview had not started and is now cancelled
    Cancelled(Interview),
    /// The running orchestration will stop at its next checkpoint
    Requested,
}

/// Starts conducting a scheduled interview in the background
pub fn start_interview(state: &AppState, interview_id: &str) -> Result<Interview, ServerError> {
    let scheduled = state.interviews.get(interview_id)?;
    if scheduled.status != InterviewStatus::Scheduled {
        return Err(not_scheduled());
    }
    let guide = state.guides.get(&scheduled.call_guide_id)?;

    let permit = Arc::clone(&state.interview_slots)
        .try_acquire_owned()
        .map_err(|_| {
            ServerError::Unavailable("Too many interviews in progress".to_string())
        })?;

    let started = state.interviews.update(interview_id, |interview| {
        if interview.status != InterviewStatus::Scheduled {
            return Err(not_scheduled());
        }
        interview.transition_to(InterviewStatus::InProgress)?;
        Ok(interview.clone())
    })?;

    let channel = state.channels.open(interview_id);
    let task_state = state.clone();
    let interview = started.clone();
    let guide_id = guide.guide_id.clone();

    tokio::spawn(async move {
        let _permit = permit;
        let finished = task_state
            .orchestrator
            .conduct_interview(&guide, interview, channel.as_ref())
            .await;

        task_state.channels.remove(&finished.interview_id);
        task_state.interviews.replace(finished.clone());
        tracing::info!(
            interview_id = %finished.interview_id,
            status = %finished.status,
            "Interview finished"
        );
        task_state.webhooks.notify(&finished).await;
    });

    tracing::info!(interview_id = %started.interview_id, call_guide_id = %guide_id, "Interview started");
    Ok(started)
}

/// Cancels a scheduled interview, or asks a running one to stop
pub fn cancel_interview(state: &AppState, interview_id: &str) -> Result<Cancellation, ServerError> {
    let cancelled = state.interviews.update(interview_id, |interview| match interview.status {
        InterviewStatus::Scheduled => {
            interview.transition_to(InterviewStatus::Cancelled)?;
            interview.add_note("Interview cancelled before start");
            Ok(Some(interview.clone()))
        }
        InterviewStatus::InProgress => Ok(None),
        other => Err(ServerError::InvalidRequest(format!(
            "Interview is already {}",
            other
        ))),
    })?;

    match cancelled {
        Some(interview) => {
            let webhooks = state.webhooks.clone();
            let notified = interview.clone();
            tokio::spawn(async move {
                webhooks.notify(&notified).await;
            });
            tracing::info!(interview_id = %interview_id, "Scheduled interview cancelled");
            Ok(Cancellation::Cancelled(interview))
        }
        None => {
            if state
                .orchestrator
                .state_manager()
                .request_termination(interview_id, "cancelled by operator")
            {
                tracing::info!(interview_id = %interview_id, "Cancellation requested");
                Ok(Cancellation::Requested)
            } else {
                Err(ServerError::Conflict(
                    "Interview is between states; retry the cancellation".to_string(),
                ))
            }
        }
    }
}

fn not_scheduled() -> ServerError {
    ServerError::InvalidRequest("Interview is not in scheduled status".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use interview_agent_config::{LlmProvider, Settings, SttProvider, TtsProvider};
    use interview_agent_core::{CallGuide, Question, Section};

    fn state(max_concurrent: usize) -> AppState {
        let mut settings = Settings::default();
        settings.llm.provider = LlmProvider::Mock;
        settings.speech.stt_provider = SttProvider::Mock;
        settings.speech.tts_provider = TtsProvider::Mock;
        settings.observability.metrics_enabled = false;
        settings.server.max_concurrent_interviews = max_concurrent;
        AppState::new(settings).unwrap()
    }

    fn schedule(state: &AppState) -> Interview {
        let guide = CallGuide::new(
            "Commuting",
            "Understand commuting habits",
            vec![Section::new(
                "Usage",
                vec![
                    Question::new("q1", "How do you get to work?"),
                    Question::new("q2", "What would you change?"),
                ],
            )],
        );
        let guide = state.guides.insert(guide).unwrap();
        state.interviews.insert(Interview::new(&guide.guide_id))
    }

    async fn wait_until_finished(state: &AppState, interview_id: &str) -> Interview {
        for _ in 0..10_000 {
            let interview = state.interviews.get(interview_id).unwrap();
            if interview.is_terminal() {
                return interview;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        panic!("interview {} never finished", interview_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_respondent_runs_to_completion() {
        let state = state(4);
        let interview = schedule(&state);

        let started = start_interview(&state, &interview.interview_id).unwrap();
        assert_eq!(started.status, InterviewStatus::InProgress);
        assert!(state.channels.get(&interview.interview_id).is_some());
        assert!(matches!(
            start_interview(&state, &interview.interview_id),
            Err(ServerError::InvalidRequest(_))
        ));

        let finished = wait_until_finished(&state, &interview.interview_id).await;
        assert_eq!(finished.status, InterviewStatus::Completed);
        assert_eq!(finished.quality_metrics.questions_asked, 2);
        assert_eq!(finished.quality_metrics.questions_answered, 0);
        assert!(state.channels.is_empty());
        assert_eq!(state.active_interviews(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit() {
        let state = state(1);
        let first = schedule(&state);
        let second = schedule(&state);

        start_interview(&state, &first.interview_id).unwrap();
        assert!(matches!(
            start_interview(&state, &second.interview_id),
            Err(ServerError::Unavailable(_))
        ));
        assert_eq!(
            state.interviews.get(&second.interview_id).unwrap().status,
            InterviewStatus::Scheduled
        );

        wait_until_finished(&state, &first.interview_id).await;
        start_interview(&state, &second.interview_id).unwrap();
    }

    #[tokio::test]
    async fn test_cancel_scheduled() {
        let state = state(4);
        let interview = schedule(&state);

        match cancel_interview(&state, &interview.interview_id).unwrap() {
            Cancellation::Cancelled(cancelled) => {
                assert_eq!(cancelled.status, InterviewStatus::Cancelled)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            cancel_interview(&state, &interview.interview_id),
            Err(ServerError::InvalidRequest(_))
        ));
        assert!(matches!(
            start_interview(&state, &interview.interview_id),
            Err(ServerError::InvalidRequest(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_running_interview() {
        let state = state(4);
        let interview = schedule(&state);
        start_interview(&state, &interview.interview_id).unwrap();

        // let the orchestration register its conversation state
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(matches!(
            cancel_interview(&state, &interview.interview_id).unwrap(),
            Cancellation::Requested
        ));

        let finished = wait_until_finished(&state, &interview.interview_id).await;
        assert_eq!(finished.status, InterviewStatus::Cancelled);
        assert!(finished
            .interviewer_notes
            .iter()
            .any(|n| n.contains("cancelled by operator")));
    }

    #[test]
    fn test_missing_guide_or_interview() {
        let state = state(4);
        assert!(matches!(
            start_interview(&state, "missing"),
            Err(ServerError::NotFound(_))
        ));
        let orphan = state.interviews.insert(Interview::new("no-such-guide"));
        assert!(matches!(
            start_interview(&state, &orphan.interview_id),
            Err(ServerError::NotFound(_))
        ));
    }
}
