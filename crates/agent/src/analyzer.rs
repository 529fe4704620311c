//! Response analysis
//!
//! Turns one free-text answer into a `ResponseAnalysis` through a
//! schema-constrained LLM call. Analysis never fails past this boundary:
//! provider or parse errors yield a degraded neutral reading.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use interview_agent_core::{
    GenerateRequest, InterviewResponse, LanguageModel, Outcome, ResponseAnalysis,
};

const ANALYST_SYSTEM_PROMPT: &str =
    "You are an expert research analyst specializing in qualitative interview analysis.";

const PATTERN_SYSTEM_PROMPT: &str =
    "You are an expert at identifying patterns in qualitative research.";

const COMPARISON_TEMPERATURE: f32 = 0.5;

/// Context bundle handed to the analyzer with each answer
#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    pub research_objective: String,
    /// Rendered recent history, oldest first
    pub previous_responses: Vec<String>,
    pub time_remaining_seconds: f64,
}

#[async_trait]
pub trait ResponseAnalyzer: Send + Sync + 'static {
    /// Analyze one answer; always yields a usable analysis
    async fn analyze_response(
        &self,
        question: &str,
        response: &str,
        context: &AnalysisContext,
    ) -> Outcome<ResponseAnalysis>;
}

/// Analyzer backed by a language model
pub struct LlmResponseAnalyzer {
    llm: Arc<dyn LanguageModel>,
}

impl LlmResponseAnalyzer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "sentiment": {
                    "type": "string",
                    "enum": ["very_positive", "positive", "neutral", "negative", "very_negative", "mixed"]
                },
                "confidence": {"type": "number", "minimum": 0, "maximum": 1},
                "key_phrases": {"type": "array", "items": {"type": "string"}},
                "themes": {"type": "array", "items": {"type": "string"}},
                "information_density": {"type": "number", "minimum": 0, "maximum": 1},
                "requires_clarification": {"type": "boolean"},
                "signals": {"type": "array", "items": {"type": "string"}},
                "contradictions": {"type": "array", "items": {"type": "string"}},
                "notable_content": {"type": "string"}
            },
            "required": ["sentiment", "confidence", "information_density"]
        })
    }

    fn build_prompt(question: &str, response: &str, context: &AnalysisContext) -> String {
        let mut prompt = format!(
            "Analyze this interview response in detail:\n\n\
             **Question Asked:**\n{}\n\n\
             **Respondent's Answer:**\n{}\n",
            question, response
        );

        if !context.previous_responses.is_empty() {
            prompt.push_str(&format!(
                "\n**Previous Context:**\n{}\n",
                context.previous_responses.join("\n")
            ));
        }
        if !context.research_objective.is_empty() {
            prompt.push_str(&format!(
                "\n**Research Objective:**\n{}\n",
                context.research_objective
            ));
        }
        if context.time_remaining_seconds > 0.0 {
            prompt.push_str(&format!(
                "\n**Interview Time Remaining:** {:.0} seconds. \
                 Mark clarification as required only if it is worth that time.\n",
                context.time_remaining_seconds
            ));
        }

        prompt.push_str(
            "\n**Analysis Task:**\n\
             Provide a detailed analysis including:\n\n\
             1. **Sentiment**: Overall emotional tone (very_positive, positive, neutral, negative, very_negative, mixed)\n\
             2. **Confidence**: Your confidence in this analysis (0.0 to 1.0)\n\
             3. **Key Phrases**: Important phrases or quotes from the response\n\
             4. **Themes**: Main themes or topics addressed\n\
             5. **Information Density**: How much valuable insight this response contains (0.0 to 1.0)\n\
             \x20  - 0.0-0.3: Vague, surface-level, or off-topic\n\
             \x20  - 0.4-0.6: Moderate detail and relevance\n\
             \x20  - 0.7-1.0: Rich, detailed, highly relevant insights\n\
             6. **Requires Clarification**: Does this response need follow-up questions?\n\
             7. **Signals**: Detected signals (enthusiasm, hesitation, confusion, agreement, disagreement, emotional)\n\
             8. **Contradictions**: Any contradictions with prior responses or internal inconsistencies\n\
             9. **Notable Content**: Brief summary of what makes this response valuable (or not)\n\n\
             Focus on extracting maximum research value from this response.\n",
        );
        prompt
    }

    /// Free-text comparison of several responses; degrades to an empty summary
    pub async fn compare_responses(
        &self,
        responses: &[InterviewResponse],
        research_objective: &str,
    ) -> Outcome<String> {
        if responses.is_empty() {
            return Outcome::Fresh(String::new());
        }

        let listed = responses
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. Q: {}\nA: {}", i + 1, r.question_text, r.response_text))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Compare these interview responses and identify patterns:\n\n\
             **Research Objective:**\n{}\n\n\
             **Responses:**\n{}\n\n\
             **Analysis Task:**\n\
             Identify:\n\
             1. Common themes across responses\n\
             2. Contradictions or inconsistencies\n\
             3. Evolution of opinions/attitudes\n\
             4. Areas needing deeper exploration\n\
             5. Overall coherence of the narrative\n",
            research_objective, listed
        );

        let request = GenerateRequest::prompt(prompt, Some(PATTERN_SYSTEM_PROMPT))
            .with_temperature(COMPARISON_TEMPERATURE);

        match self.llm.generate(request).await {
            Ok(response) => Outcome::Fresh(response.text),
            Err(e) => {
                tracing::warn!(error = %e, "Response comparison failed");
                Outcome::degraded(String::new(), e.to_string())
            }
        }
    }
}

#[async_trait]
impl ResponseAnalyzer for LlmResponseAnalyzer {
    async fn analyze_response(
        &self,
        question: &str,
        response: &str,
        context: &AnalysisContext,
    ) -> Outcome<ResponseAnalysis> {
        let prompt = Self::build_prompt(question, response, context);
        let schema = Self::schema();

        let value = match self
            .llm
            .generate_structured(&prompt, &schema, Some(ANALYST_SYSTEM_PROMPT))
            .await
        {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Response analysis failed, using neutral analysis");
                return Outcome::degraded(ResponseAnalysis::neutral(), e.to_string());
            }
        };

        match serde_json::from_value::<ResponseAnalysis>(value) {
            Ok(analysis) => Outcome::Fresh(analysis.normalized()),
            Err(e) => {
                tracing::warn!(error = %e, "Analysis did not match schema, using neutral analysis");
                Outcome::degraded(ResponseAnalysis::neutral(), format!("malformed analysis: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_agent_core::Sentiment;
    use interview_agent_llm::ScriptedLanguageModel;

    fn context() -> AnalysisContext {
        AnalysisContext {
            research_objective: "Understand commuting habits".to_string(),
            previous_responses: vec!["agent: How do you get to work?".to_string()],
            time_remaining_seconds: 1200.0,
        }
    }

    #[tokio::test]
    async fn test_parses_structured_analysis() {
        let llm = Arc::new(ScriptedLanguageModel::with_default_reply(
            r#"```json
            {"sentiment": "very_positive", "confidence": 0.9, "information_density": 1.3,
             "signals": ["Enthusiasm"], "themes": ["cycling"]}
            ```"#,
        ));
        let analyzer = LlmResponseAnalyzer::new(llm.clone());

        let outcome = analyzer
            .analyze_response("How do you commute?", "I cycle and I love it", &context())
            .await;
        assert!(!outcome.is_degraded());
        let analysis = outcome.into_value();
        assert_eq!(analysis.sentiment, Sentiment::VeryPositive);
        assert_eq!(analysis.information_density, 1.0);
        assert_eq!(analysis.signals, vec!["enthusiasm".to_string()]);

        let request = &llm.requests()[0];
        assert_eq!(request.system_prompt(), Some(ANALYST_SYSTEM_PROMPT));
        let prompt = request.last_user_message().unwrap_or_default();
        assert!(prompt.contains("I cycle and I love it"));
        assert!(prompt.contains("Understand commuting habits"));
        assert!(prompt.contains("agent: How do you get to work?"));
        assert!(prompt.contains("Interview Time Remaining:** 1200 seconds"));
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_neutral() {
        let analyzer = LlmResponseAnalyzer::new(Arc::new(ScriptedLanguageModel::failing("down")));
        let outcome = analyzer
            .analyze_response("Q", "A", &AnalysisContext::default())
            .await;
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value(), &ResponseAnalysis::neutral());
    }

    #[tokio::test]
    async fn test_malformed_output_degrades_to_neutral() {
        let analyzer = LlmResponseAnalyzer::new(Arc::new(
            ScriptedLanguageModel::with_default_reply("I think it was positive."),
        ));
        let outcome = analyzer
            .analyze_response("Q", "A", &AnalysisContext::default())
            .await;
        assert!(outcome.is_degraded());

        let analyzer = LlmResponseAnalyzer::new(Arc::new(
            ScriptedLanguageModel::with_default_reply(r#"{"sentiment": "ecstatic"}"#),
        ));
        let outcome = analyzer
            .analyze_response("Q", "A", &AnalysisContext::default())
            .await;
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value().sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn test_compare_responses() {
        let llm = Arc::new(ScriptedLanguageModel::with_default_reply("Consistent preference for cycling."));
        let analyzer = LlmResponseAnalyzer::new(llm.clone());
        let now = chrono::Utc::now();
        let responses = vec![
            InterviewResponse::new("i1", "q1", "Usage", "How do you commute?", "By bike", now, now),
            InterviewResponse::new("i1", "q2", "Usage", "Why?", "It's quick", now, now),
        ];

        let outcome = analyzer.compare_responses(&responses, "Commuting").await;
        assert_eq!(outcome.value(), "Consistent preference for cycling.");
        assert_eq!(llm.requests()[0].temperature, Some(COMPARISON_TEMPERATURE));

        let failing = LlmResponseAnalyzer::new(Arc::new(ScriptedLanguageModel::failing("down")));
        let outcome = failing.compare_responses(&responses, "Commuting").await;
        assert!(outcome.is_degraded());
        assert!(outcome.value().is_empty());
    }
}
