//! Call guide model: the static script driving one interview type
//!
//! A call guide is read-only for the duration of an interview. Sections and
//! questions are asked in list order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::{Error, Result};

/// Kinds of questions a guide can ask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    Open,
    Closed,
    Scale,
    MultipleChoice,
}

/// What a follow-up question tries to achieve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpAction {
    #[default]
    DrillDeeper,
    Probe,
    Clarify,
    Example,
    Compare,
}

impl FollowUpAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpAction::DrillDeeper => "drill_deeper",
            FollowUpAction::Probe => "probe",
            FollowUpAction::Clarify => "clarify",
            FollowUpAction::Example => "example",
            FollowUpAction::Compare => "compare",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "drill_deeper" | "drill-deeper" | "deeper" => Some(FollowUpAction::DrillDeeper),
            "probe" => Some(FollowUpAction::Probe),
            "clarify" => Some(FollowUpAction::Clarify),
            "example" => Some(FollowUpAction::Example),
            "compare" => Some(FollowUpAction::Compare),
            _ => None,
        }
    }

    /// Phrasing used when a trigger rule has no template of its own
    pub fn default_phrasing(&self) -> &'static str {
        match self {
            FollowUpAction::DrillDeeper => "Can you tell me more about that?",
            FollowUpAction::Probe => "What makes you say that?",
            FollowUpAction::Clarify => "Could you clarify what you mean by that?",
            FollowUpAction::Example => "Could you give me a specific example?",
            FollowUpAction::Compare => "How does that compare to other options you've tried?",
        }
    }
}

impl std::fmt::Display for FollowUpAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule that proposes a follow-up when its condition matches a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpTrigger {
    /// Condition keyword (`vague`, `short`, `enthusiasm`, ...) or a phrase
    /// looked for in the response
    pub condition: String,
    pub action: FollowUpAction,
    /// Relative priority, 1-10
    #[serde(default = "default_trigger_priority")]
    pub priority: u8,
    #[serde(default)]
    pub template: Option<String>,
}

fn default_trigger_priority() -> u8 {
    1
}

/// One scripted question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default = "new_id")]
    pub id: String,
    pub text: String,
    #[serde(rename = "type", default)]
    pub question_type: QuestionType,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub follow_up_triggers: Vec<FollowUpTrigger>,
    #[serde(default = "default_max_follow_ups")]
    pub max_follow_ups: usize,
    /// Seconds budgeted for this question
    #[serde(default = "default_time_allocation")]
    pub time_allocation: u64,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub expected_response_patterns: Vec<String>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_follow_ups() -> usize {
    3
}

fn default_time_allocation() -> u64 {
    120
}

impl Question {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            question_type: QuestionType::Open,
            required: true,
            follow_up_triggers: Vec::new(),
            max_follow_ups: default_max_follow_ups(),
            time_allocation: default_time_allocation(),
            context: None,
            expected_response_patterns: Vec::new(),
        }
    }

    pub fn with_type(mut self, question_type: QuestionType) -> Self {
        self.question_type = question_type;
        self
    }

    pub fn with_max_follow_ups(mut self, max: usize) -> Self {
        self.max_follow_ups = max;
        self
    }

    pub fn with_trigger(mut self, trigger: FollowUpTrigger) -> Self {
        self.follow_up_triggers.push(trigger);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn has_triggers(&self) -> bool {
        !self.follow_up_triggers.is_empty()
    }
}

/// Group of related questions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub section_name: String,
    #[serde(default)]
    pub objective: String,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub order: u32,
    /// Soft time limit in seconds
    #[serde(default)]
    pub time_limit: Option<u64>,
    /// Skip the section when any of these appears in the collected key facts
    #[serde(default)]
    pub skip_conditions: Vec<String>,
}

impl Section {
    pub fn new(name: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            section_name: name.into(),
            objective: String::new(),
            questions,
            order: 0,
            time_limit: None,
            skip_conditions: Vec::new(),
        }
    }

    pub fn with_skip_condition(mut self, condition: impl Into<String>) -> Self {
        self.skip_conditions.push(condition.into());
        self
    }

    /// True when any skip condition is contained in the rendered key facts
    pub fn should_skip(&self, key_facts: &HashMap<String, String>) -> bool {
        if self.skip_conditions.is_empty() || key_facts.is_empty() {
            return false;
        }
        let rendered = render_key_facts(key_facts);
        self.skip_conditions
            .iter()
            .filter(|c| !c.trim().is_empty())
            .any(|c| rendered.contains(&c.to_lowercase()))
    }
}

/// Flattens key facts into a single lowercase `key: value` string
fn render_key_facts(key_facts: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = key_facts.keys().collect();
    keys.sort();
    keys.iter()
        .map(|k| format!("{}: {}", k, key_facts[*k]))
        .collect::<Vec<_>>()
        .join("; ")
        .to_lowercase()
}

/// Engagement signals the analyzer may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestSignal {
    Enthusiasm,
    Hesitation,
    Confusion,
    Agreement,
    Disagreement,
    Emotional,
}

impl InterestSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestSignal::Enthusiasm => "enthusiasm",
            InterestSignal::Hesitation => "hesitation",
            InterestSignal::Confusion => "confusion",
            InterestSignal::Agreement => "agreement",
            InterestSignal::Disagreement => "disagreement",
            InterestSignal::Emotional => "emotional",
        }
    }
}

/// Guide-level adaptive behaviour configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveRules {
    #[serde(default)]
    pub interest_signals: Vec<InterestSignal>,
    #[serde(default)]
    pub skip_conditions: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub complexity_adaptation: bool,
}

impl Default for AdaptiveRules {
    fn default() -> Self {
        Self {
            interest_signals: Vec::new(),
            skip_conditions: HashMap::new(),
            complexity_adaptation: true,
        }
    }
}

/// Complete interview script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallGuide {
    #[serde(default = "new_id")]
    pub guide_id: String,
    pub name: String,
    pub research_objective: String,
    #[serde(default)]
    pub target_respondent_profile: HashMap<String, serde_json::Value>,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub adaptive_rules: AdaptiveRules,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_estimated_minutes")]
    pub estimated_duration_minutes: u32,
    #[serde(default = "default_max_minutes")]
    pub max_duration_minutes: u32,
    #[serde(default = "default_min_completion")]
    pub min_completion_percentage: f32,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_estimated_minutes() -> u32 {
    30
}

fn default_max_minutes() -> u32 {
    60
}

fn default_min_completion() -> f32 {
    0.7
}

impl CallGuide {
    pub fn new(
        name: impl Into<String>,
        research_objective: impl Into<String>,
        sections: Vec<Section>,
    ) -> Self {
        let now = Utc::now();
        Self {
            guide_id: new_id(),
            name: name.into(),
            research_objective: research_objective.into(),
            target_respondent_profile: HashMap::new(),
            sections,
            adaptive_rules: AdaptiveRules::default(),
            created_at: now,
            updated_at: now,
            created_by: None,
            version: default_version(),
            tags: Vec::new(),
            estimated_duration_minutes: default_estimated_minutes(),
            max_duration_minutes: default_max_minutes(),
            min_completion_percentage: default_min_completion(),
        }
    }

    /// Number of questions declared across all sections
    pub fn total_questions(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    /// Interview time budget in seconds
    pub fn time_budget_seconds(&self) -> u64 {
        u64::from(self.max_duration_minutes) * 60
    }

    pub fn find_question(&self, question_id: &str) -> Option<(&Section, &Question)> {
        self.sections.iter().find_map(|section| {
            section
                .questions
                .iter()
                .find(|q| q.id == question_id)
                .map(|q| (section, q))
        })
    }

    /// Structural checks applied before a guide is stored or run
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Configuration("call guide name is empty".to_string()));
        }
        if self.sections.is_empty() {
            return Err(Error::Configuration(format!(
                "call guide '{}' has no sections",
                self.name
            )));
        }
        if self.max_duration_minutes == 0 {
            return Err(Error::Configuration(
                "max_duration_minutes must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_completion_percentage) {
            return Err(Error::Configuration(format!(
                "min_completion_percentage must be within [0, 1], got {}",
                self.min_completion_percentage
            )));
        }

        let mut seen = HashSet::new();
        for section in &self.sections {
            if section.questions.is_empty() {
                return Err(Error::Configuration(format!(
                    "section '{}' has no questions",
                    section.section_name
                )));
            }
            for question in &section.questions {
                if question.text.trim().is_empty() {
                    return Err(Error::Configuration(format!(
                        "question '{}' has empty text",
                        question.id
                    )));
                }
                if !seen.insert(question.id.as_str()) {
                    return Err(Error::Configuration(format!(
                        "duplicate question id '{}'",
                        question.id
                    )));
                }
                if let Some(trigger) = question
                    .follow_up_triggers
                    .iter()
                    .find(|t| !(1..=10).contains(&t.priority))
                {
                    return Err(Error::Configuration(format!(
                        "trigger '{}' on question '{}' has priority {} outside 1-10",
                        trigger.condition, question.id, trigger.priority
                    )));
                }
            }
        }
        Ok(())
    }

    /// Marks the guide as edited: stamps `updated_at` and bumps the minor version
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version = match self.version.split_once('.') {
            Some((major, minor)) => match minor.parse::<u32>() {
                Ok(minor) => format!("{}.{}", major, minor + 1),
                Err(_) => format!("{}.1", self.version),
            },
            None => format!("{}.1", self.version),
        };
    }
}
