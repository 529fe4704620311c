//! Conversation types including phases and history entries

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Macro-stages of an interview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    /// Disclosure and consent collection
    #[default]
    Consent,
    /// Expected-duration framing
    Introduction,
    /// Scripted sections and questions
    MainInterview,
    /// Probing a primary answer further
    FollowUps,
    /// Wrap-up and final remarks
    Closing,
    /// Terminal
    Completed,
}

static PHASE_TRANSITIONS: Lazy<HashMap<ConversationPhase, &'static [ConversationPhase]>> =
    Lazy::new(|| {
        use ConversationPhase::*;
        let mut map = HashMap::new();
        map.insert(Consent, &[Introduction, Completed] as &[_]);
        map.insert(Introduction, &[MainInterview, Closing, Completed] as &[_]);
        map.insert(MainInterview, &[FollowUps, Closing, Completed] as &[_]);
        map.insert(FollowUps, &[MainInterview, Closing, Completed] as &[_]);
        map.insert(Closing, &[Completed] as &[_]);
        map.insert(Completed, &[] as &[_]);
        map
    });

impl ConversationPhase {
    pub fn allowed_transitions(&self) -> &'static [ConversationPhase] {
        PHASE_TRANSITIONS.get(self).copied().unwrap_or(&[])
    }

    pub fn can_transition_to(&self, target: ConversationPhase) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationPhase::Completed)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ConversationPhase::Consent => "Consent",
            ConversationPhase::Introduction => "Introduction",
            ConversationPhase::MainInterview => "Main Interview",
            ConversationPhase::FollowUps => "Follow-ups",
            ConversationPhase::Closing => "Closing",
            ConversationPhase::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Who produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    Respondent,
    System,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Agent => "agent",
            Speaker::Respondent => "respondent",
            Speaker::System => "system",
        }
    }
}

/// One line of the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl HistoryEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(Speaker::Agent, text)
    }

    pub fn respondent(text: impl Into<String>) -> Self {
        Self::new(Speaker::Respondent, text)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// `speaker: text`, the form used in LLM context bundles
    pub fn render(&self) -> String {
        format!("{}: {}", self.speaker.as_str(), self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        assert!(ConversationPhase::Consent.can_transition_to(ConversationPhase::Introduction));
        assert!(ConversationPhase::Consent.can_transition_to(ConversationPhase::Completed));
        assert!(!ConversationPhase::Consent.can_transition_to(ConversationPhase::MainInterview));
        assert!(ConversationPhase::FollowUps.can_transition_to(ConversationPhase::MainInterview));
        assert!(ConversationPhase::Completed.allowed_transitions().is_empty());
        assert!(ConversationPhase::Completed.is_terminal());
    }

    #[test]
    fn test_phase_serde_names() {
        let json = serde_json::to_string(&ConversationPhase::MainInterview).unwrap();
        assert_eq!(json, "\"main_interview\"");
    }

    #[test]
    fn test_history_entry_render() {
        let entry = HistoryEntry::respondent("I use it daily")
            .with_metadata("question_id", serde_json::json!("q1"));
        assert_eq!(entry.render(), "respondent: I use it daily");
        assert_eq!(entry.metadata["question_id"], "q1");
    }
}
