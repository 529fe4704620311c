//! Adaptive follow-up generation
//!
//! Two sources of candidates:
//! - an LLM call constrained to a fixed schema, attempted only when the
//!   analysis suggests the answer is worth probing
//! - the question's own trigger rules, evaluated deterministically

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use interview_agent_config::constants::follow_ups;
use interview_agent_config::InterviewConfig;
use interview_agent_core::analysis::sort_by_priority;
use interview_agent_core::{
    FollowUpAction, FollowUpCandidate, InterestSignal, LanguageModel, Outcome, Question,
    ResponseAnalysis,
};

const INTERVIEWER_SYSTEM_PROMPT: &str =
    "You are an expert interviewer skilled at asking insightful follow-up questions.";

/// Word count below which an answer counts as short
const SHORT_ANSWER_WORDS: usize = 20;
/// Word count above which an answer counts as detailed
const DETAILED_ANSWER_WORDS: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct FollowUpContext {
    pub research_objective: String,
    pub time_remaining_seconds: f64,
}

pub struct FollowUpGenerator {
    llm: Arc<dyn LanguageModel>,
    low_density_threshold: f32,
    high_density_threshold: f32,
}

impl FollowUpGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            low_density_threshold: follow_ups::LOW_DENSITY,
            high_density_threshold: follow_ups::HIGH_DENSITY,
        }
    }

    pub fn from_config(llm: Arc<dyn LanguageModel>, config: &InterviewConfig) -> Self {
        Self {
            llm,
            low_density_threshold: config.low_density_threshold,
            high_density_threshold: config.high_density_threshold,
        }
    }

    /// Whether an answer is worth probing at all
    pub fn should_generate_follow_ups(&self, analysis: &ResponseAnalysis, question: &Question) -> bool {
        analysis.requires_clarification
            || analysis.information_density < self.low_density_threshold
            || analysis.information_density > self.high_density_threshold
            || analysis.has_signal(InterestSignal::Enthusiasm)
            || analysis.has_signal(InterestSignal::Emotional)
            || analysis.has_contradictions()
            || question.has_triggers()
    }

    /// Candidates ordered by priority, at most `max_follow_ups` of them.
    /// Provider or parse failures degrade to an empty list.
    pub async fn generate_follow_ups(
        &self,
        question: &Question,
        response: &str,
        analysis: &ResponseAnalysis,
        context: &FollowUpContext,
        max_follow_ups: usize,
    ) -> Outcome<Vec<FollowUpCandidate>> {
        if max_follow_ups == 0 || !self.should_generate_follow_ups(analysis, question) {
            tracing::debug!(question_id = %question.id, "No follow-ups needed");
            return Outcome::Fresh(Vec::new());
        }

        let prompt = self.build_prompt(question, response, analysis, context, max_follow_ups);
        let schema = Self::schema(max_follow_ups);

        let value = match self
            .llm
            .generate_structured(&prompt, &schema, Some(INTERVIEWER_SYSTEM_PROMPT))
            .await
        {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(question_id = %question.id, error = %e, "Follow-up generation failed");
                return Outcome::degraded(Vec::new(), e.to_string());
            }
        };

        let generated: GeneratedFollowUps = match serde_json::from_value(value) {
            Ok(generated) => generated,
            Err(e) => {
                tracing::warn!(question_id = %question.id, error = %e, "Malformed follow-up output");
                return Outcome::degraded(Vec::new(), format!("malformed follow-ups: {}", e));
            }
        };

        let mut candidates: Vec<FollowUpCandidate> = generated
            .follow_ups
            .into_iter()
            .filter_map(RawFollowUp::into_candidate)
            .collect();
        sort_by_priority(&mut candidates);
        candidates.truncate(max_follow_ups);

        tracing::info!(
            question_id = %question.id,
            count = candidates.len(),
            "Generated follow-up candidates"
        );
        Outcome::Fresh(candidates)
    }

    /// Candidates from the question's own trigger rules, highest priority first
    pub fn apply_trigger_rules(
        &self,
        question: &Question,
        response: &str,
        analysis: &ResponseAnalysis,
    ) -> Vec<FollowUpCandidate> {
        let mut candidates: Vec<FollowUpCandidate> = question
            .follow_up_triggers
            .iter()
            .filter(|trigger| self.condition_met(&trigger.condition, response, analysis))
            .map(|trigger| {
                let text = trigger
                    .template
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| trigger.action.default_phrasing().to_string());
                let mut candidate =
                    FollowUpCandidate::new(text, trigger.action, f32::from(trigger.priority) / 10.0);
                candidate.reason = format!("Triggered by: {}", trigger.condition);
                candidate.expected_insight = format!("Follow up on {}", trigger.action);
                candidate
            })
            .collect();
        sort_by_priority(&mut candidates);
        candidates
    }

    fn condition_met(&self, condition: &str, response: &str, analysis: &ResponseAnalysis) -> bool {
        let condition = condition.to_lowercase();
        let words = response.split_whitespace().count();

        if condition.contains("vague") {
            return analysis.information_density < self.low_density_threshold;
        }
        if condition.contains("enthusiasm") {
            return analysis.has_signal(InterestSignal::Enthusiasm);
        }
        if condition.contains("hesitation") {
            return analysis.has_signal(InterestSignal::Hesitation);
        }
        if condition.contains("confusion") {
            return analysis.has_signal(InterestSignal::Confusion);
        }
        if condition.contains("short") {
            return words < SHORT_ANSWER_WORDS;
        }
        if condition.contains("detailed") || condition.contains("long") {
            return words > DETAILED_ANSWER_WORDS;
        }
        if condition.contains("negative") {
            return analysis.sentiment.is_negative();
        }
        !condition.trim().is_empty() && response.to_lowercase().contains(condition.trim())
    }

    fn schema(max_follow_ups: usize) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "follow_ups": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "question_text": {"type": "string"},
                            "reason": {"type": "string"},
                            "action_type": {
                                "type": "string",
                                "enum": ["drill_deeper", "probe", "clarify", "example", "compare"]
                            },
                            "priority": {"type": "number", "minimum": 0, "maximum": 1},
                            "expected_insight": {"type": "string"}
                        },
                        "required": ["question_text", "reason", "action_type", "priority"]
                    },
                    "maxItems": max_follow_ups
                }
            },
            "required": ["follow_ups"]
        })
    }

    fn build_prompt(
        &self,
        question: &Question,
        response: &str,
        analysis: &ResponseAnalysis,
        context: &FollowUpContext,
        max_follow_ups: usize,
    ) -> String {
        let mut prompt = format!(
            "Generate insightful follow-up questions for this interview response:\n\n\
             **Original Question:**\n{}\n\n\
             **Respondent's Answer:**\n{}\n\n\
             **Analysis:**\n\
             - Sentiment: {}\n\
             - Information Density: {:.2}\n\
             - Key Themes: {}\n\
             - Signals: {}\n\
             - Requires Clarification: {}\n",
            question.text,
            response,
            analysis.sentiment,
            analysis.information_density,
            analysis.themes.join(", "),
            analysis.signals.join(", "),
            analysis.requires_clarification,
        );

        if analysis.has_contradictions() {
            prompt.push_str(&format!(
                "- Contradictions: {}\n",
                analysis.contradictions.join(", ")
            ));
        }
        if let Some(context_note) = &question.context {
            prompt.push_str(&format!("\n**Question Context:**\n{}\n", context_note));
        }
        if !context.research_objective.is_empty() {
            prompt.push_str(&format!(
                "\n**Research Objective:**\n{}\n",
                context.research_objective
            ));
        }
        prompt.push_str(&format!(
            "\n**Time Remaining:** {:.0} seconds\n",
            context.time_remaining_seconds
        ));

        prompt.push_str(&format!(
            "\n**Task:**\n\
             Generate follow-up questions that will extract maximum insight value. Consider:\n\n\
             1. **drill_deeper**: Ask for more details on interesting points\n\
             2. **probe**: Explore reasoning and motivations\n\
             3. **clarify**: Resolve vague or ambiguous statements\n\
             4. **example**: Request concrete examples\n\
             5. **compare**: Compare with alternatives or past experiences\n\n\
             For each follow-up:\n\
             - Make it conversational and natural\n\
             - Avoid yes/no questions\n\
             - Prioritize questions that align with the research objective\n\
             - Consider the time remaining\n\n\
             Generate up to {} follow-up questions, ranked by priority (most valuable first).\n",
            max_follow_ups
        ));
        prompt
    }
}

#[derive(Debug, Deserialize)]
struct GeneratedFollowUps {
    #[serde(default)]
    follow_ups: Vec<RawFollowUp>,
}

#[derive(Debug, Deserialize)]
struct RawFollowUp {
    question_text: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    action_type: String,
    #[serde(default)]
    priority: f32,
    #[serde(default)]
    expected_insight: String,
}

impl RawFollowUp {
    fn into_candidate(self) -> Option<FollowUpCandidate> {
        if self.question_text.trim().is_empty() {
            return None;
        }
        let action = FollowUpAction::from_str(&self.action_type).unwrap_or_default();
        let mut candidate = FollowUpCandidate::new(self.question_text.trim(), action, self.priority);
        candidate.reason = self.reason;
        candidate.expected_insight = self.expected_insight;
        Some(candidate)
    }
}
