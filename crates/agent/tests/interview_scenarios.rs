//! End-to-end interview scenarios
//!
//! Each test drives `conduct_interview` with passthrough speech, a scripted
//! audio channel and a scripted language model on a paused tokio clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use interview_agent_agent::{
    AnalysisContext, InterviewObserver, InterviewOrchestrator, ResponseAnalyzer,
};
use interview_agent_config::{ConsentPolicy, InterviewConfig};
use interview_agent_core::{
    AudioClip, CallGuide, Error, FollowUpAction, FollowUpCandidate, FollowUpTrigger, Interview,
    InterviewResponse, InterviewStatus, Outcome, Question, ResponseAnalysis, Section,
    SpeechToText, Transcript,
};
use interview_agent_llm::ScriptedLanguageModel;
use interview_agent_speech::{PassthroughStt, PassthroughTts, ScriptedAudioChannel, ScriptedTurn};

const LOVE_IT: &str = "I really love it, it's the best thing ever";

fn guide(questions: &[(&str, &str)]) -> CallGuide {
    let questions = questions
        .iter()
        .map(|(id, text)| Question::new(*id, *text))
        .collect();
    CallGuide::new(
        "App feedback",
        "how people use the mobile app",
        vec![Section::new("Usage", questions)],
    )
}

fn scripted_orchestrator(llm: Arc<ScriptedLanguageModel>, config: InterviewConfig) -> InterviewOrchestrator {
    InterviewOrchestrator::new(Arc::new(PassthroughStt), Arc::new(PassthroughTts), llm, config)
}

/// Answers analysis requests with a fixed density and follow-up requests
/// with two ranked candidates
fn research_llm(density: f32) -> Arc<ScriptedLanguageModel> {
    Arc::new(ScriptedLanguageModel::from_fn(move |request| {
        let system = request.system_prompt().unwrap_or_default();
        if system.contains("research analyst") {
            Ok(json!({
                "sentiment": "very_positive",
                "confidence": 0.9,
                "information_density": density,
                "signals": ["enthusiasm"]
            })
            .to_string())
        } else if system.contains("interviewer") {
            Ok(json!({"follow_ups": [
                {"question_text": "What do you love most about it?", "reason": "enthusiasm",
                 "action_type": "drill_deeper", "priority": 0.9},
                {"question_text": "Can you give an example?", "reason": "detail",
                 "action_type": "example", "priority": 0.5}
            ]})
            .to_string())
        } else {
            Ok("{}".to_string())
        }
    }))
}

#[derive(Default)]
struct CountingObserver {
    started: AtomicUsize,
    finished: AtomicUsize,
    responses: AtomicUsize,
    follow_ups: AtomicUsize,
    escalations: AtomicUsize,
}

impl InterviewObserver for CountingObserver {
    fn interview_started(&self, _interview: &Interview) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn interview_finished(&self, interview: &Interview) {
        assert!(interview.is_terminal());
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn response_recorded(&self, _response: &InterviewResponse) {
        self.responses.fetch_add(1, Ordering::SeqCst);
    }

    fn follow_up_asked(&self, _candidate: &FollowUpCandidate) {
        self.follow_ups.fetch_add(1, Ordering::SeqCst);
    }

    fn escalation(&self, _reason: &str) {
        self.escalations.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn dense_answers_get_one_follow_up_each() {
    let guide = guide(&[
        ("q1", "What do you think of the app?"),
        ("q2", "How often do you use it?"),
    ]);
    let llm = research_llm(0.8);
    let observer = Arc::new(CountingObserver::default());
    let orchestrator =
        scripted_orchestrator(llm.clone(), InterviewConfig::default()).with_observer(observer.clone());
    let channel = ScriptedAudioChannel::from_answers(["Yes, I agree", "Ready", LOVE_IT, LOVE_IT, LOVE_IT, LOVE_IT]);

    let interview = Interview::new(&guide.guide_id);
    let interview_id = interview.interview_id.clone();
    let result = orchestrator.conduct_interview(&guide, interview, &channel).await;

    assert_eq!(result.status, InterviewStatus::Completed);
    assert!(result.consent_given);
    assert_eq!(result.responses.len(), 4);

    let follow_ups: Vec<_> = result.follow_up_responses().collect();
    assert_eq!(follow_ups.len(), 2);
    assert_eq!(follow_ups[0].question_id, "q1_followup_1");
    assert_eq!(follow_ups[1].question_id, "q2_followup_1");
    assert_eq!(follow_ups[0].question_text, "What do you love most about it?");
    assert_eq!(
        follow_ups[0].parent_response_id.as_deref(),
        Some(result.responses[0].response_id.as_str())
    );
    assert_eq!(
        follow_ups[1].parent_response_id.as_deref(),
        Some(result.responses[2].response_id.as_str())
    );
    assert_eq!(result.responses[0].follow_up_count, 1);

    assert_eq!(result.quality_metrics.questions_asked, 2);
    assert_eq!(result.quality_metrics.questions_answered, 2);
    assert_eq!(result.quality_metrics.follow_ups_generated, 2);
    assert_eq!(result.quality_metrics.completion_percentage, 1.0);
    assert!(result.engagement_metrics.overall_engagement > 0.5);
    assert_eq!(result.sections_completed, vec!["Usage".to_string()]);

    assert!(channel.played_contains("That's great!"));
    assert!(channel.played_contains("Thank you for elaborating."));
    assert!(channel.played_contains("Have a great day!"));
    assert!(channel.is_closed());

    assert_eq!(observer.started.load(Ordering::SeqCst), 1);
    assert_eq!(observer.finished.load(Ordering::SeqCst), 1);
    assert_eq!(observer.responses.load(Ordering::SeqCst), 4);
    assert_eq!(observer.follow_ups.load(Ordering::SeqCst), 2);
    assert!(!result.requires_human_review);
    assert_eq!(observer.escalations.load(Ordering::SeqCst), 0);

    assert!(orchestrator.state_manager().snapshot(&interview_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn declined_consent_ends_before_introduction() {
    let guide = guide(&[("q1", "What do you think of the app?")]);
    let llm = Arc::new(ScriptedLanguageModel::default());
    let orchestrator = scripted_orchestrator(llm.clone(), InterviewConfig::default());
    let channel = ScriptedAudioChannel::from_answers(["no thanks", "this should never be heard"]);

    let result = orchestrator
        .conduct_interview(&guide, Interview::new(&guide.guide_id), &channel)
        .await;

    assert_eq!(result.status, InterviewStatus::Cancelled);
    assert!(!result.consent_given);
    assert!(result.responses.is_empty());
    assert_eq!(result.quality_metrics.questions_asked, 0);
    assert!(!result.requires_human_review);
    assert!(result
        .interviewer_notes
        .iter()
        .any(|n| n.contains("declined consent")));
    assert!(result.completed_at.is_some());

    assert!(channel.played_contains("I understand. Thank you for your time. Goodbye."));
    assert!(!channel.played_contains("This interview will take approximately"));
    assert_eq!(channel.remaining_turns(), 1);
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_stops_main_phase() {
    let guide = guide(&[
        ("q1", "What do you think of the app?"),
        ("q2", "How often do you use it?"),
        ("q3", "What would you change?"),
    ]);
    let orchestrator = scripted_orchestrator(
        Arc::new(ScriptedLanguageModel::default()),
        InterviewConfig::default(),
    );
    let channel = ScriptedAudioChannel::new([
        ScriptedTurn::say("yes"),
        ScriptedTurn::say("ready"),
        ScriptedTurn::SayAfter(Duration::from_secs(40), "I mostly use it on weekends".to_string()),
    ]);

    let result = orchestrator
        .conduct_interview_with_budget(&guide, Interview::new(&guide.guide_id), &channel, 90)
        .await;

    assert_eq!(result.status, InterviewStatus::Completed);
    assert_eq!(result.responses.len(), 1);
    assert_eq!(result.responses[0].question_id, "q1");
    assert_eq!(result.sections_completed, vec!["Usage".to_string()]);
    assert_eq!(result.questions_skipped, vec!["q2".to_string(), "q3".to_string()]);
    assert!((result.quality_metrics.completion_percentage - 1.0 / 3.0).abs() < 1e-9);

    assert!(!channel.played_contains("How often do you use it?"));
    // Closing still runs after the hard stop
    assert!(channel.played_contains("Is there anything else you'd like to add"));
}

#[tokio::test(start_paused = true)]
async fn silent_consent_follows_policy() {
    let guide = guide(&[("q1", "What do you think of the app?")]);

    // Default policy treats silence as consent and carries on
    let orchestrator = scripted_orchestrator(
        Arc::new(ScriptedLanguageModel::default()),
        InterviewConfig::default(),
    );
    let channel = ScriptedAudioChannel::new([ScriptedTurn::Silence]);
    let result = orchestrator
        .conduct_interview(&guide, Interview::new(&guide.guide_id), &channel)
        .await;
    assert_eq!(result.status, InterviewStatus::Completed);
    assert_eq!(result.responses.len(), 1);
    assert!(!result.responses[0].is_answered());
    assert_eq!(result.engagement_metrics.silence_count, 1);

    let strict = InterviewConfig {
        ambiguous_consent: ConsentPolicy::Decline,
        ..InterviewConfig::default()
    };
    let orchestrator = scripted_orchestrator(Arc::new(ScriptedLanguageModel::default()), strict);
    let channel = ScriptedAudioChannel::new([ScriptedTurn::Silence]);
    let result = orchestrator
        .conduct_interview(&guide, Interview::new(&guide.guide_id), &channel)
        .await;
    assert_eq!(result.status, InterviewStatus::Cancelled);
    assert!(result.responses.is_empty());
}

#[tokio::test(start_paused = true)]
async fn llm_outage_degrades_without_failing() {
    let guide = guide(&[
        ("q1", "What do you think of the app?"),
        ("q2", "How often do you use it?"),
    ]);
    let orchestrator = scripted_orchestrator(
        Arc::new(ScriptedLanguageModel::failing("provider unavailable")),
        InterviewConfig::default(),
    );
    let channel = ScriptedAudioChannel::from_answers(["sure", "yes", "It's fine", "Daily"]);

    let result = orchestrator
        .conduct_interview(&guide, Interview::new(&guide.guide_id), &channel)
        .await;

    assert_eq!(result.status, InterviewStatus::Completed);
    assert_eq!(result.responses.len(), 2);
    for response in &result.responses {
        assert_eq!(response.information_density, Some(0.5));
        assert_eq!(response.confidence_score, Some(0.0));
    }
    assert_eq!(result.quality_metrics.follow_ups_generated, 0);
    // Every analysis failed, so the finished interview goes to a human
    assert!(result.requires_human_review);
    assert_eq!(
        result.escalation_reason.as_deref(),
        Some("Quality below threshold: error rate 1.00 > 0.30")
    );
}

struct BrokenStt;

#[async_trait]
impl SpeechToText for BrokenStt {
    async fn transcribe(&self, _audio: &AudioClip) -> interview_agent_core::Result<Transcript> {
        Err(Error::Speech("recognizer crashed".to_string()))
    }

    fn model_name(&self) -> &str {
        "broken"
    }
}

#[tokio::test(start_paused = true)]
async fn speech_and_channel_failures_are_empty_answers() {
    let guide = guide(&[("q1", "What do you think of the app?")]);
    let orchestrator = InterviewOrchestrator::new(
        Arc::new(BrokenStt),
        Arc::new(PassthroughTts),
        Arc::new(ScriptedLanguageModel::default()),
        InterviewConfig::default(),
    );
    let channel = ScriptedAudioChannel::new([
        ScriptedTurn::say("yes"),
        ScriptedTurn::Fail("line dropped".to_string()),
    ]);

    let result = orchestrator
        .conduct_interview(&guide, Interview::new(&guide.guide_id), &channel)
        .await;

    assert_eq!(result.status, InterviewStatus::Completed);
    assert_eq!(result.responses.len(), 1);
    assert_eq!(result.responses[0].response_text, "");
    assert_eq!(result.quality_metrics.questions_answered, 0);
}

struct PanickingAnalyzer;

#[async_trait]
impl ResponseAnalyzer for PanickingAnalyzer {
    async fn analyze_response(
        &self,
        _question: &str,
        _response: &str,
        _context: &AnalysisContext,
    ) -> Outcome<ResponseAnalysis> {
        panic!("analysis invariant violated");
    }
}

#[tokio::test(start_paused = true)]
async fn unrecoverable_error_fails_with_escalation() {
    let guide = guide(&[("q1", "What do you think of the app?")]);
    let observer = Arc::new(CountingObserver::default());
    let orchestrator = scripted_orchestrator(
        Arc::new(ScriptedLanguageModel::default()),
        InterviewConfig::default(),
    )
    .with_analyzer(Arc::new(PanickingAnalyzer))
    .with_observer(observer.clone());
    let channel = ScriptedAudioChannel::from_answers(["yes", "ready", "It's useful"]);

    let interview = Interview::new(&guide.guide_id);
    let interview_id = interview.interview_id.clone();
    let result = orchestrator.conduct_interview(&guide, interview, &channel).await;

    assert_eq!(result.status, InterviewStatus::Failed);
    assert!(result.requires_human_review);
    assert_eq!(
        result.escalation_reason.as_deref(),
        Some("System error: analysis invariant violated")
    );
    assert!(result.completed_at.is_some());
    assert!(result.duration_seconds.is_some());
    assert_eq!(observer.escalations.load(Ordering::SeqCst), 1);
    assert_eq!(observer.finished.load(Ordering::SeqCst), 1);
    assert!(orchestrator.state_manager().snapshot(&interview_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn trigger_rules_cover_empty_llm_suggestions() {
    let question = Question::new("q1", "What do you think of the app?").with_trigger(FollowUpTrigger {
        condition: "short".to_string(),
        action: FollowUpAction::Probe,
        priority: 7,
        template: Some("Could you say a bit more about that?".to_string()),
    });
    let guide = CallGuide::new(
        "App feedback",
        "how people use the mobile app",
        vec![Section::new("Usage", vec![question])],
    );
    let llm = Arc::new(ScriptedLanguageModel::from_fn(|request| {
        if request.system_prompt().unwrap_or_default().contains("interviewer") {
            Ok(r#"{"follow_ups": []}"#.to_string())
        } else {
            Ok("{}".to_string())
        }
    }));
    let orchestrator = scripted_orchestrator(llm, InterviewConfig::default());
    let channel = ScriptedAudioChannel::from_answers(["yes", "ready", "It's ok", "The menus are slow"]);

    let result = orchestrator
        .conduct_interview(&guide, Interview::new(&guide.guide_id), &channel)
        .await;

    assert_eq!(result.responses.len(), 2);
    assert!(result.responses[1].is_follow_up);
    assert_eq!(result.responses[1].question_text, "Could you say a bit more about that?");
    assert_eq!(result.responses[1].response_text, "The menus are slow");
}

#[tokio::test(start_paused = true)]
async fn closing_remarks_become_notes() {
    let guide = guide(&[("q1", "What do you think of the app?")]);
    let orchestrator = scripted_orchestrator(
        Arc::new(ScriptedLanguageModel::default()),
        InterviewConfig::default(),
    );
    let channel = ScriptedAudioChannel::from_answers([
        "yes",
        "ready",
        "It's useful",
        "Please add a dark mode to the app",
    ]);

    let result = orchestrator
        .conduct_interview(&guide, Interview::new(&guide.guide_id), &channel)
        .await;

    assert_eq!(
        result.interviewer_notes,
        vec!["Final thoughts: Please add a dark mode to the app".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn operator_termination_cancels_at_next_question() {
    let guide = guide(&[
        ("q1", "What do you think of the app?"),
        ("q2", "How often do you use it?"),
    ]);
    let orchestrator = Arc::new(scripted_orchestrator(
        Arc::new(ScriptedLanguageModel::default()),
        InterviewConfig::default(),
    ));
    let manager = Arc::clone(orchestrator.state_manager());
    let interview = Interview::new(&guide.guide_id);
    let interview_id = interview.interview_id.clone();

    let handle = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move {
            let channel = ScriptedAudioChannel::new([
                ScriptedTurn::say("yes"),
                ScriptedTurn::say("ready"),
                ScriptedTurn::SayAfter(Duration::from_secs(30), "It's useful".to_string()),
                ScriptedTurn::say("Every day"),
            ]);
            orchestrator.conduct_interview(&guide, interview, &channel).await
        }
    });

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(manager.request_termination(&interview_id, "operator request"));

    let result = handle.await.unwrap();
    assert_eq!(result.status, InterviewStatus::Cancelled);
    assert_eq!(result.responses.len(), 1);
    assert!(result
        .interviewer_notes
        .contains(&"Interview cancelled: operator request".to_string()));
}

#[tokio::test]
async fn finished_interviews_are_returned_unchanged() {
    let guide = guide(&[("q1", "What do you think of the app?")]);
    let orchestrator = scripted_orchestrator(
        Arc::new(ScriptedLanguageModel::default()),
        InterviewConfig::default(),
    );
    let channel = ScriptedAudioChannel::from_answers(["yes"]);

    let mut interview = Interview::new(&guide.guide_id);
    interview.transition_to(InterviewStatus::Cancelled).unwrap();
    let result = orchestrator.conduct_interview(&guide, interview, &channel).await;

    assert_eq!(result.status, InterviewStatus::Cancelled);
    assert!(channel.played().is_empty());
    assert_eq!(channel.remaining_turns(), 1);
}

#[tokio::test(start_paused = true)]
async fn silence_fires_short_trigger() {
    let question = Question::new("q1", "What do you think of the app?").with_trigger(FollowUpTrigger {
        condition: "short".to_string(),
        action: FollowUpAction::Probe,
        priority: 5,
        template: Some("Could you say a bit more?".to_string()),
    });
    let guide = CallGuide::new(
        "App feedback",
        "how people use the mobile app",
        vec![Section::new("Usage", vec![question])],
    );
    let llm = Arc::new(ScriptedLanguageModel::default());
    let orchestrator = scripted_orchestrator(llm.clone(), InterviewConfig::default());
    let channel = ScriptedAudioChannel::new([
        ScriptedTurn::say("yes"),
        ScriptedTurn::say("ready"),
        ScriptedTurn::Silence,
        ScriptedTurn::say("The menus are slow"),
    ]);

    let result = orchestrator
        .conduct_interview(&guide, Interview::new(&guide.guide_id), &channel)
        .await;

    assert_eq!(result.status, InterviewStatus::Completed);
    assert_eq!(result.responses.len(), 2);
    assert!(!result.responses[0].is_answered());
    assert_eq!(result.responses[0].follow_up_count, 1);

    let follow_up = &result.responses[1];
    assert!(follow_up.is_follow_up);
    assert_eq!(follow_up.question_id, "q1_followup_1");
    assert_eq!(follow_up.question_text, "Could you say a bit more?");
    assert_eq!(
        follow_up.parent_response_id.as_deref(),
        Some(result.responses[0].response_id.as_str())
    );
    assert_eq!(follow_up.response_text, "The menus are slow");
    assert!(channel.played_contains("Could you say a bit more?"));

    // Only the follow-up answer is analyzed; silence never reaches the model
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn poor_quality_completes_with_escalation() {
    let guide = guide(&[
        ("q1", "What do you think of the app?"),
        ("q2", "How often do you use it?"),
    ]);
    let observer = Arc::new(CountingObserver::default());
    let orchestrator = scripted_orchestrator(
        Arc::new(ScriptedLanguageModel::default()),
        InterviewConfig::default(),
    )
    .with_observer(observer.clone());
    let channel = ScriptedAudioChannel::new([ScriptedTurn::say("yes"), ScriptedTurn::say("ready")]);

    let result = orchestrator
        .conduct_interview(&guide, Interview::new(&guide.guide_id), &channel)
        .await;

    assert_eq!(result.status, InterviewStatus::Completed);
    assert_eq!(result.quality_metrics.questions_asked, 2);
    assert_eq!(result.quality_metrics.questions_answered, 0);
    assert!(result.requires_human_review);
    assert_eq!(
        result.escalation_reason.as_deref(),
        Some("Quality below threshold: completion 0.00 < 0.30")
    );
    assert_eq!(observer.escalations.load(Ordering::SeqCst), 1);
    assert_eq!(observer.finished.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn skipped_section_is_never_entered() {
    let mut advanced = Section::new(
        "Advanced",
        vec![Question::new("q2", "How do you use the export feature?")],
    );
    advanced.skip_conditions = vec!["never used".to_string()];
    let guide = CallGuide::new(
        "App feedback",
        "how people use the mobile app",
        vec![
            Section::new("Usage", vec![Question::new("q1", "Which features do you use?")]),
            advanced,
            Section::new("Wrap", vec![Question::new("q3", "What would you change?")]),
        ],
    );
    let orchestrator = scripted_orchestrator(
        Arc::new(ScriptedLanguageModel::default()),
        InterviewConfig::default(),
    );
    let channel = ScriptedAudioChannel::from_answers([
        "yes",
        "ready",
        "Mostly reports, I have never used the export feature",
        "Faster sync",
    ]);

    let result = orchestrator
        .conduct_interview(&guide, Interview::new(&guide.guide_id), &channel)
        .await;

    assert_eq!(result.status, InterviewStatus::Completed);
    let asked: Vec<&str> = result
        .primary_responses()
        .map(|r| r.question_id.as_str())
        .collect();
    assert_eq!(asked, vec!["q1", "q3"]);
    assert_eq!(result.sections_completed, vec!["Usage".to_string(), "Wrap".to_string()]);
    assert!(result.questions_skipped.is_empty());
    assert_eq!(result.quality_metrics.total_questions, 3);
    assert_eq!(result.quality_metrics.questions_asked, 2);

    assert!(!channel.played_contains("How do you use the export feature?"));
    assert!(!channel.played_contains("Now let's talk about advanced."));
    assert!(channel.played_contains("Now let's talk about wrap."));
}

/// Four silent answers, then a dense one that would normally be probed
async fn run_backlog_interview(time_budget_seconds: u64) -> Interview {
    let guide = guide(&[
        ("q1", "What do you think of the app?"),
        ("q2", "How often do you use it?"),
        ("q3", "Which feature do you use most?"),
        ("q4", "What frustrates you?"),
        ("q5", "What do you love about it?"),
    ]);
    let config = InterviewConfig {
        answer_timeout_seconds: 5,
        ..InterviewConfig::default()
    };
    let orchestrator = scripted_orchestrator(research_llm(0.8), config);
    let channel = ScriptedAudioChannel::new([
        ScriptedTurn::say("yes"),
        ScriptedTurn::say("ready"),
        ScriptedTurn::Silence,
        ScriptedTurn::Silence,
        ScriptedTurn::Silence,
        ScriptedTurn::Silence,
        ScriptedTurn::say(LOVE_IT),
        ScriptedTurn::say(LOVE_IT),
    ]);

    orchestrator
        .conduct_interview_with_budget(&guide, Interview::new(&guide.guide_id), &channel, time_budget_seconds)
        .await
}

#[tokio::test(start_paused = true)]
async fn backlog_near_deadline_vetoes_follow_ups() {
    // Well inside the prioritisation window: the backlog of four blocks probing
    let rushed = run_backlog_interview(250).await;
    assert_eq!(rushed.status, InterviewStatus::Completed);
    assert_eq!(rushed.primary_responses().count(), 5);
    assert_eq!(rushed.responses[4].information_density, Some(0.8));
    assert_eq!(rushed.follow_up_responses().count(), 0);

    // Same answers with plenty of time left: the dense answer is probed
    let relaxed = run_backlog_interview(3600).await;
    let follow_ups: Vec<_> = relaxed.follow_up_responses().collect();
    assert_eq!(follow_ups.len(), 1);
    assert_eq!(follow_ups[0].question_id, "q5_followup_1");
}
