//! Interview observation hooks
//!
//! The orchestrator reports lifecycle events, provider latencies and
//! degradations through an injected observer. All methods default to no-ops.

use std::time::Duration;

use interview_agent_core::{FollowUpCandidate, Interview, InterviewResponse};

pub trait InterviewObserver: Send + Sync + 'static {
    fn interview_started(&self, _interview: &Interview) {}

    /// Called once with the interview in its terminal status
    fn interview_finished(&self, _interview: &Interview) {}

    fn response_recorded(&self, _response: &InterviewResponse) {}

    fn follow_up_asked(&self, _candidate: &FollowUpCandidate) {}

    fn stt_latency(&self, _elapsed: Duration) {}

    fn tts_latency(&self, _elapsed: Duration) {}

    /// `operation` is `analysis` or `follow_up`
    fn llm_latency(&self, _operation: &str, _elapsed: Duration) {}

    /// A provider failed or degraded; `component` is `stt`, `tts`, `llm`,
    /// `audio` or `orchestrator`
    fn error(&self, _error_type: &str, _component: &str) {}

    fn escalation(&self, _reason: &str) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl InterviewObserver for NoopObserver {}
