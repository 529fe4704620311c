//! Interview aggregate, per-question responses and computed metrics

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::analysis::{ResponseAnalysis, Sentiment};
use crate::{Error, Result};

/// Lifecycle status of an interview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    NoShow,
}

static STATUS_TRANSITIONS: Lazy<HashMap<InterviewStatus, &'static [InterviewStatus]>> =
    Lazy::new(|| {
        use InterviewStatus::*;
        let mut map = HashMap::new();
        map.insert(Scheduled, &[InProgress, Cancelled, NoShow] as &[_]);
        map.insert(InProgress, &[Completed, Failed, Cancelled] as &[_]);
        map.insert(Completed, &[] as &[_]);
        map.insert(Failed, &[] as &[_]);
        map.insert(Cancelled, &[] as &[_]);
        map.insert(NoShow, &[] as &[_]);
        map
    });

impl InterviewStatus {
    pub fn allowed_transitions(&self) -> &'static [InterviewStatus] {
        STATUS_TRANSITIONS.get(self).copied().unwrap_or(&[])
    }

    pub fn can_transition_to(&self, target: InterviewStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::Scheduled => "scheduled",
            InterviewStatus::InProgress => "in_progress",
            InterviewStatus::Completed => "completed",
            InterviewStatus::Failed => "failed",
            InterviewStatus::Cancelled => "cancelled",
            InterviewStatus::NoShow => "no_show",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "scheduled" => Some(InterviewStatus::Scheduled),
            "in_progress" => Some(InterviewStatus::InProgress),
            "completed" => Some(InterviewStatus::Completed),
            "failed" => Some(InterviewStatus::Failed),
            "cancelled" => Some(InterviewStatus::Cancelled),
            "no_show" => Some(InterviewStatus::NoShow),
            _ => None,
        }
    }
}

impl std::fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One answered question or follow-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewResponse {
    pub response_id: String,
    pub interview_id: String,
    pub question_id: String,
    pub section_name: String,
    pub question_text: String,
    pub response_text: String,
    pub asked_at: DateTime<Utc>,
    pub answered_at: DateTime<Utc>,
    pub response_time_seconds: f64,

    // Analysis
    pub sentiment: Option<Sentiment>,
    pub confidence_score: Option<f32>,
    #[serde(default)]
    pub key_phrases: Vec<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    pub information_density: Option<f32>,
    #[serde(default)]
    pub requires_clarification: bool,
    #[serde(default)]
    pub signals: Vec<String>,

    // Follow-up linkage
    #[serde(default)]
    pub is_follow_up: bool,
    /// Back-reference to the response this probes; not an ownership edge
    #[serde(default)]
    pub parent_response_id: Option<String>,
    #[serde(default)]
    pub follow_up_count: usize,

    #[serde(default)]
    pub flags: Vec<String>,
}

impl InterviewResponse {
    pub fn new(
        interview_id: impl Into<String>,
        question_id: impl Into<String>,
        section_name: impl Into<String>,
        question_text: impl Into<String>,
        response_text: impl Into<String>,
        asked_at: DateTime<Utc>,
        answered_at: DateTime<Utc>,
    ) -> Self {
        let response_time_seconds =
            ((answered_at - asked_at).num_milliseconds() as f64 / 1000.0).max(0.0);
        Self {
            response_id: uuid::Uuid::new_v4().to_string(),
            interview_id: interview_id.into(),
            question_id: question_id.into(),
            section_name: section_name.into(),
            question_text: question_text.into(),
            response_text: response_text.into(),
            asked_at,
            answered_at,
            response_time_seconds,
            sentiment: None,
            confidence_score: None,
            key_phrases: Vec::new(),
            themes: Vec::new(),
            information_density: None,
            requires_clarification: false,
            signals: Vec::new(),
            is_follow_up: false,
            parent_response_id: None,
            follow_up_count: 0,
            flags: Vec::new(),
        }
    }

    /// Marks this response as a follow-up probing `parent_response_id`
    pub fn as_follow_up(mut self, parent_response_id: impl Into<String>) -> Self {
        self.is_follow_up = true;
        self.parent_response_id = Some(parent_response_id.into());
        self
    }

    pub fn attach_analysis(&mut self, analysis: &ResponseAnalysis) {
        self.sentiment = Some(analysis.sentiment);
        self.confidence_score = Some(analysis.confidence);
        self.key_phrases = analysis.key_phrases.clone();
        self.themes = analysis.themes.clone();
        self.information_density = Some(analysis.information_density);
        self.requires_clarification = analysis.requires_clarification;
        self.signals = analysis.signals.clone();
    }

    /// A response with any non-whitespace text counts as answered
    pub fn is_answered(&self) -> bool {
        !self.response_text.trim().is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.response_text.split_whitespace().count()
    }

    pub fn has_signal(&self, signal: &str) -> bool {
        self.signals.iter().any(|s| s == signal)
    }
}

/// Engagement metrics derived from the response list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    /// Mean response length in words
    pub avg_response_length: f64,
    /// Mean seconds between question and answer
    pub avg_response_time: f64,
    /// Share of responses carrying an enthusiasm signal
    pub enthusiasm_score: f64,
    pub hesitation_count: usize,
    pub interruption_count: usize,
    /// Responses that came back empty
    pub silence_count: usize,
    /// Bounded weighted score in [0, 1]
    pub overall_engagement: f64,
}

/// Quality metrics derived from the response list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Answered primary questions over questions declared by the guide
    pub completion_percentage: f64,
    pub total_questions: usize,
    pub questions_asked: usize,
    pub questions_answered: usize,
    pub follow_ups_generated: usize,
    /// Mean information density of analysed responses
    pub insight_yield: f64,
    /// Share of primary questions asked out of those declared
    pub guide_adherence: f64,
    pub technical_quality_score: f64,
    pub stt_accuracy: Option<f64>,
}

/// Question/answer view of an interview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub response_id: String,
    pub question_id: String,
    pub section_name: String,
    pub question: String,
    pub response: String,
    pub is_follow_up: bool,
    pub parent_response_id: Option<String>,
    pub asked_at: DateTime<Utc>,
    pub sentiment: Option<Sentiment>,
}

/// Aggregate root for one interview session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interview {
    pub interview_id: String,
    pub call_guide_id: String,
    pub respondent_id: Option<String>,
    pub respondent_name: Option<String>,
    pub respondent_phone: Option<String>,
    pub respondent_email: Option<String>,

    pub status: InterviewStatus,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    /// Telephony call identifier, when the call was placed by a provider
    pub call_sid: Option<String>,

    #[serde(default)]
    pub responses: Vec<InterviewResponse>,
    #[serde(default)]
    pub sections_completed: Vec<String>,
    #[serde(default)]
    pub questions_skipped: Vec<String>,

    #[serde(default)]
    pub engagement_metrics: EngagementMetrics,
    #[serde(default)]
    pub quality_metrics: QualityMetrics,

    #[serde(default)]
    pub requires_human_review: bool,
    pub escalation_reason: Option<String>,
    #[serde(default)]
    pub interviewer_notes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub consent_given: bool,
    pub consent_timestamp: Option<DateTime<Utc>>,
}

impl Interview {
    pub fn new(call_guide_id: impl Into<String>) -> Self {
        Self {
            interview_id: uuid::Uuid::new_v4().to_string(),
            call_guide_id: call_guide_id.into(),
            respondent_id: None,
            respondent_name: None,
            respondent_phone: None,
            respondent_email: None,
            status: InterviewStatus::Scheduled,
            created_at: Utc::now(),
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            duration_seconds: None,
            call_sid: None,
            responses: Vec::new(),
            sections_completed: Vec::new(),
            questions_skipped: Vec::new(),
            engagement_metrics: EngagementMetrics::default(),
            quality_metrics: QualityMetrics::default(),
            requires_human_review: false,
            escalation_reason: None,
            interviewer_notes: Vec::new(),
            tags: Vec::new(),
            consent_given: false,
            consent_timestamp: None,
        }
    }

    pub fn with_respondent(
        mut self,
        name: Option<String>,
        phone: Option<String>,
        email: Option<String>,
    ) -> Self {
        self.respondent_name = name;
        self.respondent_phone = phone;
        self.respondent_email = email;
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// Applies a lifecycle transition, stamping start and completion times
    pub fn transition_to(&mut self, target: InterviewStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        let now = Utc::now();
        if target == InterviewStatus::InProgress && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if target.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
            if let Some(started) = self.started_at {
                self.duration_seconds =
                    Some(((now - started).num_milliseconds() as f64 / 1000.0).max(0.0));
            }
        }
        self.status = target;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn record_consent(&mut self) {
        self.consent_given = true;
        self.consent_timestamp = Some(Utc::now());
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.interviewer_notes.push(note.into());
    }

    /// Flags the interview for human review
    pub fn escalate(&mut self, reason: impl Into<String>) {
        self.requires_human_review = true;
        self.escalation_reason = Some(reason.into());
    }

    pub fn find_response(&self, response_id: &str) -> Option<&InterviewResponse> {
        self.responses.iter().find(|r| r.response_id == response_id)
    }

    pub fn primary_responses(&self) -> impl Iterator<Item = &InterviewResponse> {
        self.responses.iter().filter(|r| !r.is_follow_up)
    }

    pub fn follow_up_responses(&self) -> impl Iterator<Item = &InterviewResponse> {
        self.responses.iter().filter(|r| r.is_follow_up)
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.responses
            .iter()
            .map(|r| TranscriptEntry {
                response_id: r.response_id.clone(),
                question_id: r.question_id.clone(),
                section_name: r.section_name.clone(),
                question: r.question_text.clone(),
                response: r.response_text.clone(),
                is_follow_up: r.is_follow_up,
                parent_response_id: r.parent_response_id.clone(),
                asked_at: r.asked_at,
                sentiment: r.sentiment,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_lifecycle() {
        assert!(InterviewStatus::Scheduled.can_transition_to(InterviewStatus::InProgress));
        assert!(InterviewStatus::Scheduled.can_transition_to(InterviewStatus::Cancelled));
        assert!(InterviewStatus::InProgress.can_transition_to(InterviewStatus::Cancelled));
        assert!(!InterviewStatus::Completed.can_transition_to(InterviewStatus::Cancelled));
        assert!(!InterviewStatus::Scheduled.can_transition_to(InterviewStatus::Completed));
        assert!(!InterviewStatus::InProgress.can_transition_to(InterviewStatus::Scheduled));

        for status in [
            InterviewStatus::Completed,
            InterviewStatus::Failed,
            InterviewStatus::Cancelled,
            InterviewStatus::NoShow,
        ] {
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn test_transition_stamps_times() {
        let mut interview = Interview::new("guide-1");
        interview.transition_to(InterviewStatus::InProgress).unwrap();
        assert!(interview.started_at.is_some());
        assert!(interview.completed_at.is_none());

        interview.transition_to(InterviewStatus::Completed).unwrap();
        assert!(interview.completed_at.is_some());
        assert!(interview.duration_seconds.unwrap() >= 0.0);
        assert!(interview.is_terminal());
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut interview = Interview::new("guide-1");
        let err = interview.transition_to(InterviewStatus::Completed).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(interview.status, InterviewStatus::Scheduled);
    }

    #[test]
    fn test_response_time_and_linkage() {
        let asked = Utc::now();
        let answered = asked + Duration::milliseconds(2500);
        let parent = InterviewResponse::new("i1", "q1", "Intro", "Why?", "Because", asked, answered);
        assert!((parent.response_time_seconds - 2.5).abs() < 1e-9);
        assert!(parent.is_answered());
        assert_eq!(parent.word_count(), 1);

        let child = InterviewResponse::new("i1", "q1_followup_1", "Intro", "More?", "", asked, answered)
            .as_follow_up(parent.response_id.clone());
        assert!(child.is_follow_up);
        assert_eq!(child.parent_response_id.as_deref(), Some(parent.response_id.as_str()));
        assert!(!child.is_answered());
    }

    #[test]
    fn test_attach_analysis() {
        let now = Utc::now();
        let mut response = InterviewResponse::new("i1", "q1", "Intro", "Why?", "I love it", now, now);
        let analysis = ResponseAnalysis {
            sentiment: Sentiment::Positive,
            information_density: 0.8,
            signals: vec!["enthusiasm".to_string()],
            ..ResponseAnalysis::neutral()
        };
        response.attach_analysis(&analysis);
        assert_eq!(response.sentiment, Some(Sentiment::Positive));
        assert_eq!(response.information_density, Some(0.8));
        assert!(response.has_signal("enthusiasm"));
    }

    #[test]
    fn test_transcript_view() {
        let now = Utc::now();
        let mut interview = Interview::new("guide-1");
        interview
            .responses
            .push(InterviewResponse::new(&interview.interview_id, "q1", "Intro", "Why?", "Because", now, now));
        let transcript = interview.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].question, "Why?");
        assert_eq!(transcript[0].response, "Because");
    }
}
