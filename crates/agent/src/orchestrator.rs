//! Interview orchestrator
//!
//! Drives one interview through consent, introduction, the scripted
//! sections and closing. Provider failures degrade locally (empty
//! transcript, neutral analysis, no follow-up); only an unrecoverable
//! error or panic fails the interview. Whatever happens, the returned
//! interview is in a terminal status with its metrics computed.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::time::Instant;
use tracing::Instrument;

use interview_agent_config::InterviewConfig;
use interview_agent_core::{
    AudioChannel, CallGuide, ConversationPhase, FollowUpCandidate, HistoryEntry, InterestSignal,
    Interview, InterviewResponse, InterviewStatus, LanguageModel, Question, ResponseAnalysis,
    Section, SpeechToText, TextToSpeech,
};

use crate::analyzer::{AnalysisContext, LlmResponseAnalyzer, ResponseAnalyzer};
use crate::consent::classify_consent;
use crate::conversation_state::{ConversationState, ConversationStateManager, SharedConversationState};
use crate::follow_up::{FollowUpContext, FollowUpGenerator};
use crate::observer::{InterviewObserver, NoopObserver};
use crate::scoring::{finalize_metrics, quality_escalation};
use crate::AgentError;

const CONSENT_SCRIPT: &str = "Thank you for participating in this research interview. \
Before we begin, I need to inform you that this call may be recorded for quality and research purposes. \
Your responses will be kept confidential and used only for research. \
You may stop the interview at any time. Do you consent to participate in this interview?";
const CONSENT_ACCEPTED: &str = "Thank you. Let's begin.";
const CONSENT_DECLINED: &str = "I understand. Thank you for your time. Goodbye.";
const INTRODUCTION_DONE: &str = "Excellent. Let's get started.";
const FOLLOW_UP_THANKS: &str = "Thank you for elaborating.";
const CLOSING_SCRIPT: &str = "Thank you so much for sharing your thoughts with me today. \
Your insights are very valuable for our research. \
Is there anything else you'd like to add before we finish?";
const GOODBYE: &str = "Thank you again for your time. Have a great day!";

/// Closing remarks shorter than this are treated as a plain goodbye
const MIN_FINAL_REMARKS_CHARS: usize = 10;
/// History entries handed to the analyzer
const ANALYSIS_HISTORY_WINDOW: usize = 5;

/// How the phase sequence ended
#[derive(Debug)]
enum PhaseExit {
    Completed,
    ConsentDeclined,
    Terminated(String),
}

/// Borrowed inputs of one run
struct InterviewRun<'a> {
    guide: &'a CallGuide,
    channel: &'a dyn AudioChannel,
    state: SharedConversationState,
}

impl InterviewRun<'_> {
    /// Runs `f` against the locked state; never call across an await
    fn with_state<R>(&self, f: impl FnOnce(&mut ConversationState) -> R) -> R {
        f(&mut self.state.lock())
    }
}

/// Result of one asked question
struct Exchange {
    response_id: String,
    reply: String,
    analysis: ResponseAnalysis,
}

pub struct InterviewOrchestrator {
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    analyzer: Arc<dyn ResponseAnalyzer>,
    follow_ups: Arc<FollowUpGenerator>,
    state_manager: Arc<ConversationStateManager>,
    observer: Arc<dyn InterviewObserver>,
    config: InterviewConfig,
}

impl InterviewOrchestrator {
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
        llm: Arc<dyn LanguageModel>,
        config: InterviewConfig,
    ) -> Self {
        Self {
            stt,
            tts,
            analyzer: Arc::new(LlmResponseAnalyzer::new(Arc::clone(&llm))),
            follow_ups: Arc::new(FollowUpGenerator::from_config(llm, &config)),
            state_manager: Arc::new(ConversationStateManager::from_config(&config)),
            observer: Arc::new(NoopObserver),
            config,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ResponseAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_follow_up_generator(mut self, generator: Arc<FollowUpGenerator>) -> Self {
        self.follow_ups = generator;
        self
    }

    pub fn with_state_manager(mut self, manager: Arc<ConversationStateManager>) -> Self {
        self.state_manager = manager;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn InterviewObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state_manager(&self) -> &Arc<ConversationStateManager> {
        &self.state_manager
    }

    pub fn config(&self) -> &InterviewConfig {
        &self.config
    }

    /// Time budget for a guide; guides without a maximum use the configured default
    pub fn time_budget_for(&self, guide: &CallGuide) -> u64 {
        if guide.max_duration_minutes == 0 {
            u64::from(self.config.default_interview_timeout_minutes) * 60
        } else {
            guide.time_budget_seconds()
        }
    }

    /// Conducts a complete interview within the guide's time budget
    pub async fn conduct_interview(
        &self,
        guide: &CallGuide,
        interview: Interview,
        channel: &dyn AudioChannel,
    ) -> Interview {
        let budget = self.time_budget_for(guide);
        self.conduct_interview_with_budget(guide, interview, channel, budget)
            .await
    }

    /// Conducts a complete interview with an explicit time budget in seconds.
    ///
    /// Never fails: the returned interview is completed, cancelled or failed.
    pub async fn conduct_interview_with_budget(
        &self,
        guide: &CallGuide,
        mut interview: Interview,
        channel: &dyn AudioChannel,
        time_budget_seconds: u64,
    ) -> Interview {
        if interview.is_terminal() {
            tracing::warn!(
                interview_id = %interview.interview_id,
                status = %interview.status,
                "Interview already finished, not conducting"
            );
            return interview;
        }

        let span = tracing::info_span!(
            "interview",
            interview_id = %interview.interview_id,
            call_guide_id = %guide.guide_id
        );

        async move {
            tracing::info!(time_budget_seconds, "Starting interview");
            if interview.status == InterviewStatus::Scheduled {
                if let Err(e) = interview.transition_to(InterviewStatus::InProgress) {
                    tracing::error!(error = %e, "Cannot start interview");
                }
            }
            self.observer.interview_started(&interview);

            let state = self.state_manager.create_state(
                &interview.interview_id,
                &guide.guide_id,
                time_budget_seconds,
            );
            let run = InterviewRun {
                guide,
                channel,
                state,
            };

            let exit = AssertUnwindSafe(self.run_phases(&run, &mut interview))
                .catch_unwind()
                .await;

            let target = match exit {
                Ok(Ok(PhaseExit::Completed)) => InterviewStatus::Completed,
                Ok(Ok(PhaseExit::ConsentDeclined)) => {
                    interview.add_note("Respondent declined consent");
                    InterviewStatus::Cancelled
                }
                Ok(Ok(PhaseExit::Terminated(reason))) => {
                    interview.add_note(format!("Interview cancelled: {}", reason));
                    InterviewStatus::Cancelled
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Interview failed");
                    self.fail(&mut interview, &e.to_string());
                    InterviewStatus::Failed
                }
                Err(panic) => {
                    let message = panic_message(panic);
                    tracing::error!(error = %message, "Interview aborted by panic");
                    self.fail(&mut interview, &message);
                    InterviewStatus::Failed
                }
            };

            self.finish(&run, &mut interview, target);
            run.channel.close().await;
            self.state_manager.remove_state(&interview.interview_id);
            interview
        }
        .instrument(span)
        .await
    }

    fn fail(&self, interview: &mut Interview, message: &str) {
        let reason = format!("System error: {}", message);
        self.observer.error("orchestration", "orchestrator");
        self.observer.escalation(&reason);
        interview.escalate(reason);
    }

    /// Copies progress out of the state, computes metrics and seals the status
    fn finish(&self, run: &InterviewRun<'_>, interview: &mut Interview, target: InterviewStatus) {
        run.with_state(|s| {
            interview.sections_completed = s.sections_completed.clone();
            interview.questions_skipped = s.questions_skipped.clone();
        });
        finalize_metrics(interview, run.guide);

        if target == InterviewStatus::Completed {
            let provider_errors = run.with_state(|s| s.provider_errors);
            if let Some(reason) = quality_escalation(interview, provider_errors, &self.config) {
                tracing::warn!(reason = %reason, "Flagging interview for human review");
                run.with_state(|s| s.requires_human_escalation = true);
                self.observer.escalation(&reason);
                interview.escalate(reason);
            }
        }

        if let Err(e) = interview.transition_to(target) {
            tracing::error!(error = %e, "Forcing terminal status");
            interview.status = target;
            let now = Utc::now();
            interview.completed_at.get_or_insert(now);
        }

        tracing::info!(
            status = %interview.status,
            responses = interview.responses.len(),
            duration_seconds = interview.duration_seconds.unwrap_or_default(),
            "Interview finished"
        );
        self.observer.interview_finished(interview);
    }

    async fn run_phases(
        &self,
        run: &InterviewRun<'_>,
        interview: &mut Interview,
    ) -> Result<PhaseExit, AgentError> {
        if !self.consent_phase(run, interview).await? {
            return Ok(PhaseExit::ConsentDeclined);
        }
        if let Some(reason) = run.with_state(|s| pending_termination(s)) {
            return Ok(PhaseExit::Terminated(reason));
        }

        self.introduction_phase(run).await?;

        if let Some(reason) = self.main_phase(run, interview).await? {
            return Ok(PhaseExit::Terminated(reason));
        }

        self.closing_phase(run, interview).await?;
        Ok(PhaseExit::Completed)
    }

    async fn consent_phase(
        &self,
        run: &InterviewRun<'_>,
        interview: &mut Interview,
    ) -> Result<bool, AgentError> {
        tracing::info!(phase = %ConversationPhase::Consent, "Entering phase");

        self.say(run, CONSENT_SCRIPT).await;
        let reply = self.listen(run, self.config.consent_timeout()).await;
        run.with_state(|s| s.add_history(HistoryEntry::respondent(&reply)));

        let decision = classify_consent(&reply);
        let consented = decision.resolve(self.config.ambiguous_consent);
        tracing::info!(?decision, consented, "Consent classified");

        if consented {
            run.with_state(|s| s.consent_given = true);
            interview.record_consent();
            self.speak(run, CONSENT_ACCEPTED).await;
            Ok(true)
        } else {
            self.speak(run, CONSENT_DECLINED).await;
            run.with_state(|s| {
                s.terminate("consent declined");
                s.transition_phase(ConversationPhase::Completed)
            })?;
            Ok(false)
        }
    }

    async fn introduction_phase(&self, run: &InterviewRun<'_>) -> Result<(), AgentError> {
        run.with_state(|s| s.transition_phase(ConversationPhase::Introduction))?;
        tracing::info!(phase = %ConversationPhase::Introduction, "Entering phase");

        let intro = format!(
            "Great! This interview will take approximately {} minutes. \
             I'll be asking you questions about {}. \
             Feel free to share your thoughts openly, there are no right or wrong answers. \
             Are you ready to begin?",
            run.guide.estimated_duration_minutes, run.guide.research_objective
        );
        self.say(run, &intro).await;

        // Pacing only: the reply never changes the flow
        let reply = self.listen(run, self.config.introduction_timeout()).await;
        run.with_state(|s| s.add_history(HistoryEntry::respondent(&reply)));

        self.speak(run, INTRODUCTION_DONE).await;
        Ok(())
    }

    /// Returns the termination reason if an operator stopped the interview
    async fn main_phase(
        &self,
        run: &InterviewRun<'_>,
        interview: &mut Interview,
    ) -> Result<Option<String>, AgentError> {
        run.with_state(|s| s.transition_phase(ConversationPhase::MainInterview))?;
        tracing::info!(phase = %ConversationPhase::MainInterview, "Entering phase");

        let total_sections = run.guide.sections.len();
        let hard_stop = self.config.hard_stop_seconds as f64;
        let mut entered_any = false;

        for (section_index, section) in run.guide.sections.iter().enumerate() {
            let skip = run.with_state(|s| {
                s.current_section_index = section_index;
                s.current_question_index = 0;
                s.current_section_name = Some(section.section_name.clone());
                s.section_started_at = Some(Instant::now());
                section.should_skip(&s.key_facts_collected)
            });

            if skip {
                tracing::info!(section = %section.section_name, "Skipping section");
                run.with_state(|s| self.state_manager.advance_to_next_section(s, total_sections));
                continue;
            }

            tracing::info!(section = %section.section_name, "Starting section");
            if entered_any {
                let transition = format!(
                    "Now let's talk about {}.",
                    section.section_name.to_lowercase()
                );
                self.speak(run, &transition).await;
            }
            entered_any = true;

            let mut out_of_time = false;
            for (question_index, question) in section.questions.iter().enumerate() {
                let (remaining, termination) = run.with_state(|s| {
                    s.current_question_index = question_index;
                    s.current_question_id = Some(question.id.clone());
                    (s.time_remaining(), pending_termination(s))
                });

                if let Some(reason) = termination {
                    return Ok(Some(reason));
                }

                if remaining < hard_stop {
                    tracing::warn!(
                        remaining_seconds = remaining,
                        question_id = %question.id,
                        "Time running out, wrapping up"
                    );
                    run.with_state(|s| {
                        s.questions_skipped.extend(
                            run.guide
                                .sections
                                .iter()
                                .skip(section_index)
                                .flat_map(|sec| sec.questions.iter())
                                .skip_while(|q| q.id != question.id)
                                .map(|q| q.id.clone()),
                        );
                    });
                    out_of_time = true;
                    break;
                }

                self.question_cycle(run, interview, section, question).await?;
                run.with_state(|s| {
                    self.state_manager
                        .advance_to_next_question(s, section.questions.len())
                });
            }

            // An entered section counts as completed however far it got
            run.with_state(|s| s.complete_section(&section.section_name));

            if out_of_time {
                break;
            }
            run.with_state(|s| self.state_manager.advance_to_next_section(s, total_sections));
        }

        Ok(None)
    }

    async fn question_cycle(
        &self,
        run: &InterviewRun<'_>,
        interview: &mut Interview,
        section: &Section,
        question: &Question,
    ) -> Result<(), AgentError> {
        tracing::debug!(question_id = %question.id, "Asking question");

        let exchange = self
            .ask(run, interview, section, &question.id, &question.text, None)
            .await;

        self.speak(run, acknowledgment(&exchange.analysis)).await;

        let max_depth = question
            .max_follow_ups
            .min(self.config.max_follow_ups_per_question);
        if !run.with_state(|s| self.state_manager.should_generate_follow_up(s, max_depth)) {
            tracing::debug!(question_id = %question.id, "Follow-ups gated off");
            return Ok(());
        }

        let Some(candidate) = self.pick_follow_up(run, question, &exchange).await else {
            return Ok(());
        };

        self.follow_up_cycle(run, interview, section, question, &exchange, candidate)
            .await
    }

    async fn pick_follow_up(
        &self,
        run: &InterviewRun<'_>,
        question: &Question,
        exchange: &Exchange,
    ) -> Option<FollowUpCandidate> {
        // Silence gives the model nothing to probe; only trigger rules such
        // as `short` can re-prompt it
        if exchange.reply.is_empty() {
            return self
                .follow_ups
                .apply_trigger_rules(question, &exchange.reply, &exchange.analysis)
                .into_iter()
                .next();
        }

        let context = FollowUpContext {
            research_objective: run.guide.research_objective.clone(),
            time_remaining_seconds: run.with_state(|s| s.time_remaining()),
        };
        let max_candidates = self
            .config
            .max_follow_up_candidates
            .min(question.max_follow_ups);

        let start = Instant::now();
        let outcome = self
            .follow_ups
            .generate_follow_ups(question, &exchange.reply, &exchange.analysis, &context, max_candidates)
            .await;
        self.observer.llm_latency("follow_up", start.elapsed());
        if outcome.is_degraded() {
            self.report_error(run, "degraded", "llm");
        }

        let mut candidates = outcome.into_value();
        if candidates.is_empty() {
            candidates = self
                .follow_ups
                .apply_trigger_rules(question, &exchange.reply, &exchange.analysis);
        }
        candidates.into_iter().next()
    }

    async fn follow_up_cycle(
        &self,
        run: &InterviewRun<'_>,
        interview: &mut Interview,
        section: &Section,
        question: &Question,
        parent: &Exchange,
        candidate: FollowUpCandidate,
    ) -> Result<(), AgentError> {
        tracing::info!(
            question_id = %question.id,
            action = %candidate.action_type,
            follow_up = %candidate.question_text,
            "Asking follow-up"
        );

        let depth = run.with_state(|s| {
            s.transition_phase(ConversationPhase::FollowUps)?;
            s.push_follow_up(candidate.question_text.clone());
            Ok::<_, AgentError>(s.follow_up_depth())
        })?;
        self.observer.follow_up_asked(&candidate);

        let follow_up_id = format!("{}_followup_{}", question.id, depth);
        self.ask(
            run,
            interview,
            section,
            &follow_up_id,
            &candidate.question_text,
            Some(&parent.response_id),
        )
        .await;

        if let Some(parent_response) = interview
            .responses
            .iter_mut()
            .find(|r| r.response_id == parent.response_id)
        {
            parent_response.follow_up_count += 1;
        }

        self.speak(run, FOLLOW_UP_THANKS).await;

        run.with_state(|s| {
            s.pop_follow_up();
            s.transition_phase(ConversationPhase::MainInterview)
        })?;
        Ok(())
    }

    /// Speaks a question, listens, analyzes and records the response
    async fn ask(
        &self,
        run: &InterviewRun<'_>,
        interview: &mut Interview,
        section: &Section,
        question_id: &str,
        question_text: &str,
        parent_response_id: Option<&str>,
    ) -> Exchange {
        let is_primary = parent_response_id.is_none();

        self.speak(run, question_text).await;
        run.with_state(|s| {
            s.add_history(
                HistoryEntry::agent(question_text)
                    .with_metadata("question_id", serde_json::json!(question_id)),
            );
            if is_primary {
                s.mark_asked(question_id);
            }
        });

        let asked_at = Utc::now();
        let reply = self.listen(run, self.config.answer_timeout()).await;
        let answered_at = Utc::now();

        run.with_state(|s| {
            s.add_history(HistoryEntry::respondent(&reply));
            if is_primary && !reply.is_empty() {
                s.mark_answered(question_id);
                s.record_key_fact(question_id, &reply);
            }
        });

        let mut response = InterviewResponse::new(
            &interview.interview_id,
            question_id,
            &section.section_name,
            question_text,
            &reply,
            asked_at,
            answered_at,
        );
        if let Some(parent) = parent_response_id {
            response = response.as_follow_up(parent);
        }

        let analysis = if reply.is_empty() {
            ResponseAnalysis::neutral()
        } else {
            self.analyze(run, question_text, &reply).await
        };
        response.attach_analysis(&analysis);
        run.with_state(|s| s.detected_signals.extend(analysis.signals.iter().cloned()));

        self.observer.response_recorded(&response);
        let response_id = response.response_id.clone();
        interview.responses.push(response);

        Exchange {
            response_id,
            reply,
            analysis,
        }
    }

    async fn analyze(&self, run: &InterviewRun<'_>, question: &str, reply: &str) -> ResponseAnalysis {
        let context = run.with_state(|s| AnalysisContext {
            research_objective: run.guide.research_objective.clone(),
            previous_responses: s
                .recent_history(ANALYSIS_HISTORY_WINDOW)
                .iter()
                .map(HistoryEntry::render)
                .collect(),
            time_remaining_seconds: s.time_remaining(),
        });

        let start = Instant::now();
        let outcome = self.analyzer.analyze_response(question, reply, &context).await;
        self.observer.llm_latency("analysis", start.elapsed());

        if let Some(reason) = outcome.reason() {
            tracing::warn!(reason, "Using neutral analysis");
            self.report_error(run, "degraded", "llm");
        }
        outcome.into_value()
    }

    async fn closing_phase(
        &self,
        run: &InterviewRun<'_>,
        interview: &mut Interview,
    ) -> Result<(), AgentError> {
        run.with_state(|s| s.transition_phase(ConversationPhase::Closing))?;
        tracing::info!(phase = %ConversationPhase::Closing, "Entering phase");

        self.say(run, CLOSING_SCRIPT).await;
        let remarks = self.listen(run, self.config.closing_timeout()).await;
        if remarks.chars().count() > MIN_FINAL_REMARKS_CHARS {
            run.with_state(|s| s.add_history(HistoryEntry::respondent(&remarks)));
            interview.add_note(format!("Final thoughts: {}", remarks));
        }

        self.speak(run, GOODBYE).await;
        run.with_state(|s| s.transition_phase(ConversationPhase::Completed))?;
        Ok(())
    }

    /// Speaks and records the line as agent history
    async fn say(&self, run: &InterviewRun<'_>, text: &str) {
        self.speak(run, text).await;
        run.with_state(|s| s.add_history(HistoryEntry::agent(text)));
    }

    /// Synthesizes and plays `text`; failures are logged, never raised
    async fn speak(&self, run: &InterviewRun<'_>, text: &str) {
        let start = Instant::now();
        let clip = match self.tts.synthesize(text).await {
            Ok(clip) => clip,
            Err(e) => {
                tracing::warn!(error = %e, "Speech synthesis failed");
                self.report_error(run, e.kind(), "tts");
                return;
            }
        };
        self.observer.tts_latency(start.elapsed());

        if let Err(e) = run.channel.play(clip, text).await {
            tracing::warn!(error = %e, "Audio playback failed");
            self.report_error(run, e.kind(), "audio");
            return;
        }
        tracing::debug!(text = %preview(text), "Spoke");
    }

    fn report_error(&self, run: &InterviewRun<'_>, error_type: &str, component: &str) {
        run.with_state(|s| s.provider_errors += 1);
        self.observer.error(error_type, component);
    }

    /// Waits for and transcribes one utterance; empty on timeout or failure
    async fn listen(&self, run: &InterviewRun<'_>, timeout: Duration) -> String {
        let clip = match tokio::time::timeout(timeout, run.channel.capture(timeout)).await {
            Ok(Ok(Some(clip))) if !clip.is_empty() => clip,
            Ok(Ok(_)) | Err(_) => {
                tracing::debug!(timeout_secs = timeout.as_secs(), "No response heard");
                return String::new();
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Audio capture failed");
                self.report_error(run, e.kind(), "audio");
                return String::new();
            }
        };

        let start = Instant::now();
        match self.stt.transcribe(&clip).await {
            Ok(transcript) => {
                self.observer.stt_latency(start.elapsed());
                let text = transcript.text.trim().to_string();
                tracing::debug!(text = %preview(&text), "Heard");
                text
            }
            Err(e) => {
                tracing::warn!(error = %e, "Speech recognition failed");
                self.report_error(run, e.kind(), "stt");
                String::new()
            }
        }
    }
}

fn pending_termination(state: &ConversationState) -> Option<String> {
    state.should_terminate.then(|| {
        state
            .termination_reason
            .clone()
            .unwrap_or_else(|| "terminated".to_string())
    })
}

fn acknowledgment(analysis: &ResponseAnalysis) -> &'static str {
    if analysis.has_signal(InterestSignal::Enthusiasm) {
        "That's great!"
    } else if analysis.has_signal(InterestSignal::Hesitation) {
        "I see."
    } else if analysis.sentiment.is_positive() {
        "Interesting."
    } else {
        "I understand."
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during interview".to_string()
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}
