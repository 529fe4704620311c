//! Language Model traits

use async_trait::async_trait;

use crate::{Error, GenerateRequest, GenerateResponse, Result};

/// Temperature used for schema-constrained generation
pub const STRUCTURED_TEMPERATURE: f32 = 0.3;

/// Language Model interface
///
/// Implementations:
/// - `LanguageModelAdapter` over `ClaudeBackend` - Anthropic Messages API
/// - `ScriptedLanguageModel` - deterministic replies for tests
///
/// # Example
///
/// ```ignore
/// let request = GenerateRequest::prompt("Summarize this answer", Some("You are an analyst"));
/// let response = llm.generate(request).await?;
/// println!("{}", response.text);
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Free-text completion
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Completion constrained to a JSON schema
    ///
    /// Appends the schema to the prompt, generates at a low temperature and
    /// parses the first JSON object in the reply. Malformed output is an
    /// error; callers decide how to degrade.
    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
        system_prompt: Option<&str>,
    ) -> Result<serde_json::Value> {
        let schema_text = serde_json::to_string_pretty(schema)?;
        let full_prompt = format!(
            "{}\n\nRespond with a JSON object matching this schema:\n{}\n\nRespond with ONLY the JSON object, no other text.",
            prompt, schema_text
        );
        let request = GenerateRequest::prompt(full_prompt, system_prompt)
            .with_temperature(STRUCTURED_TEMPERATURE);
        let response = self.generate(request).await?;
        extract_json_object(&response.text)
    }

    /// Check if model is available
    async fn is_available(&self) -> bool;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}

/// Parses the first top-level JSON object in `text`.
///
/// Tolerates markdown code fences and prose around the object.
pub fn extract_json_object(text: &str) -> Result<serde_json::Value> {
    let trimmed = text.trim();
    if let Ok(value @ serde_json::Value::Object(_)) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return Ok(value);
    }

    let start = trimmed
        .find('{')
        .ok_or_else(|| Error::Llm(format!("no JSON object in response: {}", preview(trimmed))))?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in trimmed[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &trimmed[start..start + offset + 1];
                    return serde_json::from_str(candidate).map_err(|e| {
                        Error::Llm(format!("malformed JSON in response: {}", e))
                    });
                }
            }
            _ => {}
        }
    }

    Err(Error::Llm(format!(
        "unterminated JSON object in response: {}",
        preview(trimmed)
    )))
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}
