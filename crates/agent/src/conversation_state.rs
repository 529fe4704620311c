//! Conversation state tracking
//!
//! One `ConversationState` per running interview: phase, position in the
//! call guide, asked/answered bookkeeping, the follow-up stack and the time
//! budget. The clock is `tokio::time::Instant` so paused-time tests observe
//! budget effects deterministically.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::time::Instant;

use interview_agent_config::constants::time_budget;
use interview_agent_config::InterviewConfig;
use interview_agent_core::{ConversationPhase, HistoryEntry};

use crate::AgentError;

/// Handle to one interview's state, shared between the orchestration task
/// and read-only observers such as the progress endpoint
pub type SharedConversationState = Arc<Mutex<ConversationState>>;

/// Mutable state of one interview
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub interview_id: String,
    pub call_guide_id: String,
    phase: ConversationPhase,

    pub current_section_index: usize,
    pub current_question_index: usize,
    pub current_section_name: Option<String>,
    pub current_question_id: Option<String>,

    pub questions_asked: Vec<String>,
    pub questions_answered: Vec<String>,
    pub questions_skipped: Vec<String>,
    pub sections_completed: Vec<String>,

    follow_up_stack: Vec<String>,
    follow_up_depth: usize,

    history: Vec<HistoryEntry>,
    pub key_facts_collected: HashMap<String, String>,
    pub detected_signals: Vec<String>,

    pub time_budget_seconds: u64,
    started_at: Instant,
    pub started_at_utc: DateTime<Utc>,
    pub section_started_at: Option<Instant>,

    pub consent_given: bool,
    pub should_terminate: bool,
    pub termination_reason: Option<String>,
    /// Speech, audio and model failures absorbed during the run
    pub provider_errors: usize,
    pub requires_human_escalation: bool,
}

impl ConversationState {
    pub fn new(
        interview_id: impl Into<String>,
        call_guide_id: impl Into<String>,
        time_budget_seconds: u64,
    ) -> Self {
        Self {
            interview_id: interview_id.into(),
            call_guide_id: call_guide_id.into(),
            phase: ConversationPhase::Consent,
            current_section_index: 0,
            current_question_index: 0,
            current_section_name: None,
            current_question_id: None,
            questions_asked: Vec::new(),
            questions_answered: Vec::new(),
            questions_skipped: Vec::new(),
            sections_completed: Vec::new(),
            follow_up_stack: Vec::new(),
            follow_up_depth: 0,
            history: Vec::new(),
            key_facts_collected: HashMap::new(),
            detected_signals: Vec::new(),
            time_budget_seconds,
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
            section_started_at: None,
            consent_given: false,
            should_terminate: false,
            termination_reason: None,
            provider_errors: 0,
            requires_human_escalation: false,
        }
    }

    pub fn phase(&self) -> ConversationPhase {
        self.phase
    }

    /// Moves to `target` if the phase table allows it
    pub fn transition_phase(&mut self, target: ConversationPhase) -> Result<(), AgentError> {
        if self.phase == target {
            return Ok(());
        }
        if !self.phase.can_transition_to(target) {
            return Err(AgentError::InvalidTransition {
                from: self.phase,
                to: target,
            });
        }
        tracing::debug!(
            interview_id = %self.interview_id,
            from = %self.phase,
            to = %target,
            "Phase transition"
        );
        self.phase = target;
        Ok(())
    }

    pub fn time_elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Seconds left in the budget, never negative
    pub fn time_remaining(&self) -> f64 {
        let budget = self.time_budget_seconds as f64;
        (budget - self.time_elapsed().as_secs_f64()).max(0.0)
    }

    /// Primary questions asked but not yet answered. A silent or failed
    /// reply leaves its question unanswered, so silence grows the backlog.
    pub fn unanswered_backlog(&self) -> usize {
        self.questions_asked
            .len()
            .saturating_sub(self.questions_answered.len())
    }

    pub fn follow_up_depth(&self) -> usize {
        self.follow_up_depth
    }

    pub fn follow_up_stack(&self) -> &[String] {
        &self.follow_up_stack
    }

    pub fn push_follow_up(&mut self, question: impl Into<String>) {
        self.follow_up_stack.push(question.into());
        self.follow_up_depth = self.follow_up_stack.len();
    }

    pub fn pop_follow_up(&mut self) -> Option<String> {
        let popped = self.follow_up_stack.pop();
        self.follow_up_depth = self.follow_up_stack.len();
        popped
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn add_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// Last `n` history entries, oldest first
    pub fn recent_history(&self, n: usize) -> &[HistoryEntry] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    pub fn mark_asked(&mut self, question_id: &str) {
        self.questions_asked.push(question_id.to_string());
    }

    pub fn mark_answered(&mut self, question_id: &str) {
        self.questions_answered.push(question_id.to_string());
    }

    pub fn complete_section(&mut self, section_name: &str) {
        if !self.sections_completed.iter().any(|s| s == section_name) {
            self.sections_completed.push(section_name.to_string());
        }
    }

    pub fn record_key_fact(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.key_facts_collected.insert(key.into(), value.into());
    }

    pub fn terminate(&mut self, reason: impl Into<String>) {
        self.should_terminate = true;
        self.termination_reason = Some(reason.into());
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            interview_id: self.interview_id.clone(),
            call_guide_id: self.call_guide_id.clone(),
            phase: self.phase,
            current_section_index: self.current_section_index,
            current_question_index: self.current_question_index,
            current_section_name: self.current_section_name.clone(),
            current_question_id: self.current_question_id.clone(),
            questions_asked: self.questions_asked.len(),
            questions_answered: self.questions_answered.len(),
            questions_skipped: self.questions_skipped.len(),
            sections_completed: self.sections_completed.clone(),
            follow_up_depth: self.follow_up_depth,
            history_length: self.history.len(),
            time_elapsed_seconds: self.time_elapsed().as_secs_f64(),
            time_remaining_seconds: self.time_remaining(),
            consent_given: self.consent_given,
            provider_errors: self.provider_errors,
            started_at: self.started_at_utc,
        }
    }
}

/// Serializable view of a live conversation
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub interview_id: String,
    pub call_guide_id: String,
    pub phase: ConversationPhase,
    pub current_section_index: usize,
    pub current_question_index: usize,
    pub current_section_name: Option<String>,
    pub current_question_id: Option<String>,
    pub questions_asked: usize,
    pub questions_answered: usize,
    pub questions_skipped: usize,
    pub sections_completed: Vec<String>,
    pub follow_up_depth: usize,
    pub history_length: usize,
    pub time_elapsed_seconds: f64,
    pub time_remaining_seconds: f64,
    pub consent_given: bool,
    pub provider_errors: usize,
    pub started_at: DateTime<Utc>,
}

/// Registry of live conversation states keyed by interview id
///
/// Callers guarantee at most one orchestration per interview id; the table
/// lock is only held for lookups, never across an await.
pub struct ConversationStateManager {
    states: RwLock<HashMap<String, SharedConversationState>>,
    prioritize_window_seconds: f64,
    prioritize_backlog: usize,
}

impl Default for ConversationStateManager {
    fn default() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            prioritize_window_seconds: time_budget::PRIORITIZE_WINDOW_SECS as f64,
            prioritize_backlog: time_budget::PRIORITIZE_BACKLOG,
        }
    }
}

impl ConversationStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &InterviewConfig) -> Self {
        Self {
            prioritize_window_seconds: config.prioritize_window_seconds as f64,
            prioritize_backlog: config.prioritize_backlog,
            ..Self::default()
        }
    }

    /// Registers a fresh state; an existing state for the same id is replaced
    pub fn create_state(
        &self,
        interview_id: &str,
        call_guide_id: &str,
        time_budget_seconds: u64,
    ) -> SharedConversationState {
        let state = Arc::new(Mutex::new(ConversationState::new(
            interview_id,
            call_guide_id,
            time_budget_seconds,
        )));
        let previous = self
            .states
            .write()
            .insert(interview_id.to_string(), Arc::clone(&state));
        if previous.is_some() {
            tracing::warn!(interview_id, "Replacing existing conversation state");
        }
        state
    }

    pub fn get_state(&self, interview_id: &str) -> Result<SharedConversationState, AgentError> {
        self.states
            .read()
            .get(interview_id)
            .cloned()
            .ok_or_else(|| AgentError::StateNotFound(interview_id.to_string()))
    }

    pub fn snapshot(&self, interview_id: &str) -> Option<ConversationSnapshot> {
        let state = self.states.read().get(interview_id).cloned()?;
        let snapshot = state.lock().snapshot();
        Some(snapshot)
    }

    pub fn remove_state(&self, interview_id: &str) -> bool {
        self.states.write().remove(interview_id).is_some()
    }

    /// Asks a running interview to stop at its next question boundary
    pub fn request_termination(&self, interview_id: &str, reason: &str) -> bool {
        match self.states.read().get(interview_id) {
            Some(state) => {
                state.lock().terminate(reason);
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.states.read().len()
    }

    pub fn get_time_remaining(&self, state: &ConversationState) -> f64 {
        state.time_remaining()
    }

    /// True when little time is left and primary questions are piling up
    pub fn should_prioritize_remaining_questions(&self, state: &ConversationState) -> bool {
        state.time_remaining() < self.prioritize_window_seconds
            && state.unanswered_backlog() > self.prioritize_backlog
    }

    /// Returns false once the section is exhausted, marking it completed
    pub fn advance_to_next_question(
        &self,
        state: &mut ConversationState,
        total_in_section: usize,
    ) -> bool {
        state.current_question_index += 1;
        if state.current_question_index >= total_in_section {
            if let Some(name) = state.current_section_name.clone() {
                state.complete_section(&name);
            }
            return false;
        }
        true
    }

    /// Returns false once every section is done, moving the phase to closing
    pub fn advance_to_next_section(
        &self,
        state: &mut ConversationState,
        total_sections: usize,
    ) -> bool {
        state.current_section_index += 1;
        state.current_question_index = 0;
        state.section_started_at = Some(Instant::now());
        if state.current_section_index >= total_sections {
            if let Err(e) = state.transition_phase(ConversationPhase::Closing) {
                tracing::warn!(interview_id = %state.interview_id, error = %e, "Cannot enter closing");
            }
            return false;
        }
        true
    }

    pub fn push_follow_up(&self, state: &mut ConversationState, question: impl Into<String>) {
        state.push_follow_up(question);
    }

    pub fn pop_follow_up(&self, state: &mut ConversationState) -> Option<String> {
        state.pop_follow_up()
    }

    /// Single gate for every follow-up decision; evaluate fresh each time
    pub fn should_generate_follow_up(&self, state: &ConversationState, max_depth: usize) -> bool {
        if state.follow_up_depth() >= max_depth {
            return false;
        }
        if self.should_prioritize_remaining_questions(state) {
            return false;
        }
        state.follow_up_stack().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConversationStateManager {
        ConversationStateManager::new()
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_remaining_is_monotonic_and_floored() {
        let manager = manager();
        let shared = manager.create_state("i1", "g1", 90);

        let mut previous = manager.get_time_remaining(&shared.lock());
        assert_eq!(previous, 90.0);

        for _ in 0..12 {
            tokio::time::advance(Duration::from_secs(10)).await;
            let remaining = manager.get_time_remaining(&shared.lock());
            assert!(remaining <= previous);
            assert!(remaining >= 0.0);
            previous = remaining;
        }
        assert_eq!(previous, 0.0);
    }

    #[test]
    fn test_stack_depth_invariant() {
        let mut state = ConversationState::new("i1", "g1", 600);
        assert_eq!(state.pop_follow_up(), None);
        assert_eq!(state.follow_up_depth(), 0);

        state.push_follow_up("why?");
        state.push_follow_up("can you give an example?");
        assert_eq!(state.follow_up_depth(), state.follow_up_stack().len());
        assert_eq!(state.follow_up_depth(), 2);

        assert_eq!(state.pop_follow_up().as_deref(), Some("can you give an example?"));
        assert_eq!(state.pop_follow_up().as_deref(), Some("why?"));
        assert_eq!(state.pop_follow_up(), None);
        assert_eq!(state.follow_up_depth(), 0);
        assert!(state.follow_up_stack().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_prioritize_vetoes_follow_ups() {
        let manager = manager();
        let shared = manager.create_state("i1", "g1", 400);
        let mut state = shared.lock();

        for q in ["q1", "q2", "q3", "q4"] {
            state.mark_asked(q);
        }
        assert!(manager.should_generate_follow_up(&state, 3));

        // Backlog of 4 but still 400s left
        assert!(!manager.should_prioritize_remaining_questions(&state));
        drop(state);

        tokio::time::advance(Duration::from_secs(150)).await;
        let state = shared.lock();
        assert!(manager.should_prioritize_remaining_questions(&state));
        for depth in [1, 3, 10] {
            assert!(!manager.should_generate_follow_up(&state, depth));
        }
    }

    #[test]
    fn test_gate_depth_and_pending_stack() {
        let manager = manager();
        let mut state = ConversationState::new("i1", "g1", 3600);
        assert!(manager.should_generate_follow_up(&state, 1));
        assert!(!manager.should_generate_follow_up(&state, 0));

        state.push_follow_up("tell me more");
        assert!(!manager.should_generate_follow_up(&state, 5));
        state.pop_follow_up();
        assert!(manager.should_generate_follow_up(&state, 5));
    }

    #[test]
    fn test_advance_question_completes_section() {
        let manager = manager();
        let mut state = ConversationState::new("i1", "g1", 3600);
        state.current_section_name = Some("Usage".to_string());

        assert!(manager.advance_to_next_question(&mut state, 2));
        assert!(!manager.advance_to_next_question(&mut state, 2));
        assert_eq!(state.sections_completed, vec!["Usage".to_string()]);
    }

    #[test]
    fn test_advance_section_enters_closing() {
        let manager = manager();
        let mut state = ConversationState::new("i1", "g1", 3600);
        state.transition_phase(ConversationPhase::Introduction).unwrap();
        state.transition_phase(ConversationPhase::MainInterview).unwrap();

        state.current_question_index = 3;
        assert!(manager.advance_to_next_section(&mut state, 2));
        assert_eq!(state.current_question_index, 0);
        assert!(state.section_started_at.is_some());

        assert!(!manager.advance_to_next_section(&mut state, 2));
        assert_eq!(state.phase(), ConversationPhase::Closing);
    }

    #[test]
    fn test_invalid_phase_transition() {
        let mut state = ConversationState::new("i1", "g1", 3600);
        let err = state
            .transition_phase(ConversationPhase::Closing)
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidTransition { .. }));
        assert_eq!(state.phase(), ConversationPhase::Consent);
    }

    #[test]
    fn test_registry_lifecycle() {
        let manager = manager();
        manager.create_state("i1", "g1", 60);
        assert_eq!(manager.active_count(), 1);

        // Duplicate id replaces the old state
        manager.get_state("i1").unwrap().lock().mark_asked("q1");
        manager.create_state("i1", "g1", 60);
        assert!(manager.get_state("i1").unwrap().lock().questions_asked.is_empty());
        assert_eq!(manager.active_count(), 1);

        let snapshot = manager.snapshot("i1").unwrap();
        assert_eq!(snapshot.phase, ConversationPhase::Consent);

        assert!(manager.remove_state("i1"));
        assert!(matches!(
            manager.get_state("i1"),
            Err(AgentError::StateNotFound(_))
        ));
        assert!(manager.snapshot("i1").is_none());
    }

    #[test]
    fn test_recent_history() {
        let mut state = ConversationState::new("i1", "g1", 60);
        for i in 0..8 {
            state.add_history(HistoryEntry::agent(format!("line {}", i)));
        }
        let recent = state.recent_history(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].text, "line 3");
    }
}
