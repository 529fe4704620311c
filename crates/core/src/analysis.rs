//! Response analysis and follow-up candidate types
//!
//! Both are ephemeral: produced and consumed inside one question cycle.

use serde::{Deserialize, Serialize};

use crate::call_guide::{FollowUpAction, InterestSignal};

/// Sentiment of a single response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    VeryPositive,
    Positive,
    #[default]
    Neutral,
    Negative,
    VeryNegative,
    Mixed,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::VeryPositive => "very_positive",
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
            Sentiment::VeryNegative => "very_negative",
            Sentiment::Mixed => "mixed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "very_positive" => Some(Sentiment::VeryPositive),
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            "very_negative" => Some(Sentiment::VeryNegative),
            "mixed" => Some(Sentiment::Mixed),
            _ => None,
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Sentiment::Positive | Sentiment::VeryPositive)
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, Sentiment::Negative | Sentiment::VeryNegative)
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured signals extracted from one free-text response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAnalysis {
    #[serde(default)]
    pub sentiment: Sentiment,
    /// Model confidence in [0, 1]
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub key_phrases: Vec<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    /// Research-relevant content in [0, 1]
    #[serde(default = "default_density")]
    pub information_density: f32,
    #[serde(default)]
    pub requires_clarification: bool,
    /// Lowercase signal labels (enthusiasm, hesitation, confusion, ...)
    #[serde(default)]
    pub signals: Vec<String>,
    #[serde(default)]
    pub contradictions: Vec<String>,
    #[serde(default)]
    pub notable_content: Option<String>,
}

fn default_density() -> f32 {
    0.5
}

impl Default for ResponseAnalysis {
    fn default() -> Self {
        Self::neutral()
    }
}

impl ResponseAnalysis {
    /// Fallback used whenever analysis cannot be obtained
    pub fn neutral() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            confidence: 0.0,
            key_phrases: Vec::new(),
            themes: Vec::new(),
            information_density: default_density(),
            requires_clarification: false,
            signals: Vec::new(),
            contradictions: Vec::new(),
            notable_content: None,
        }
    }

    /// Clamps scores into [0, 1] and lowercases signal labels
    pub fn normalized(mut self) -> Self {
        self.confidence = clamp_unit(self.confidence);
        self.information_density = clamp_unit(self.information_density);
        self.signals = self
            .signals
            .into_iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn has_signal(&self, signal: InterestSignal) -> bool {
        self.signals.iter().any(|s| s == signal.as_str())
    }

    pub fn has_contradictions(&self) -> bool {
        !self.contradictions.is_empty()
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A proposed follow-up question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpCandidate {
    pub question_text: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub action_type: FollowUpAction,
    /// Priority in [0, 1], higher first
    #[serde(default)]
    pub priority: f32,
    #[serde(default)]
    pub expected_insight: String,
}

impl FollowUpCandidate {
    pub fn new(question_text: impl Into<String>, action_type: FollowUpAction, priority: f32) -> Self {
        Self {
            question_text: question_text.into(),
            reason: String::new(),
            action_type,
            priority: clamp_unit(priority),
            expected_insight: String::new(),
        }
    }
}

/// Sorts candidates by priority, highest first
pub fn sort_by_priority(candidates: &mut [FollowUpCandidate]) {
    candidates.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
