//! Claude backend
//!
//! Implements the Anthropic Messages API (`POST {endpoint}/v1/messages`).
//! System messages are lifted into the top-level `system` field; the rest
//! are sent as alternating user/assistant turns.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use interview_agent_core::{Message, Role};

use crate::backend::{with_retry, FinishReason, GenerationParams, GenerationResult, LlmBackend, LlmConfig};
use crate::LlmError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude backend
pub struct ClaudeBackend {
    config: LlmConfig,
    api_key: String,
    client: Client,
}

impl ClaudeBackend {
    /// Create a new Claude backend
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = match config.api_key.as_deref() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => {
                return Err(LlmError::Configuration(
                    "ANTHROPIC_API_KEY not set. Set it via environment or config.".to_string(),
                ))
            }
        };

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn build_request(&self, messages: &[Message], params: &GenerationParams) -> ClaudeRequest {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>();

        ClaudeRequest {
            model: params
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            max_tokens: params.max_tokens.unwrap_or(self.config.max_tokens),
            messages: convert_messages(messages),
            system: if system.is_empty() {
                None
            } else {
                Some(system.join("\n\n"))
            },
            temperature: Some(params.temperature.unwrap_or(self.config.temperature)),
        }
    }

    /// Execute a single request (used by retry logic)
    async fn execute_request(&self, request: &ClaudeRequest) -> Result<ClaudeApiResponse, LlmError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.endpoint))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            // 5xx and rate limiting are retryable, other 4xx are not
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(LlmError::Network(format!("Server error {}: {}", status, error)));
            }
            if status.as_u16() == 404 {
                return Err(LlmError::ModelNotFound(request.model.clone()));
            }
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error)));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

/// Convert messages to Claude format, dropping system messages
fn convert_messages(messages: &[Message]) -> Vec<ClaudeMessage> {
    messages
        .iter()
        .filter_map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => return None,
            };
            Some(ClaudeMessage {
                role: role.to_string(),
                content: m.content.clone(),
            })
        })
        .collect()
}

#[async_trait]
impl LlmBackend for ClaudeBackend {
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<GenerationResult, LlmError> {
        let request = self.build_request(messages, params);
        if request.messages.is_empty() {
            return Err(LlmError::Generation("no user message to send".to_string()));
        }

        let start = Instant::now();
        let response = with_retry(self.config.max_retries, self.config.initial_backoff, || {
            self.execute_request(&request)
        })
        .await?;

        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                ClaudeContentBlock::Text { text } => Some(text.as_str()),
                ClaudeContentBlock::Other => None,
            })
            .collect::<String>();

        Ok(GenerationResult {
            text,
            model: response.model.unwrap_or(request.model),
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            total_time_ms: start.elapsed().as_millis() as u64,
            finish_reason: match response.stop_reason {
                Some(ClaudeStopReason::MaxTokens) => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// =============================================================================
// Claude API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ClaudeApiResponse {
    #[serde(default)]
    model: Option<String>,
    content: Vec<ClaudeContentBlock>,
    #[serde(default)]
    stop_reason: Option<ClaudeStopReason>,
    usage: ClaudeUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ClaudeStopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: &str) -> LlmConfig {
        LlmConfig::default()
            .with_endpoint(endpoint)
            .with_api_key("test-key")
            .with_model("claude-test")
            .with_retries(2, Duration::from_millis(1))
    }

    fn claude_reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": "claude-test",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 4}
        })
    }

    #[test]
    fn test_missing_api_key() {
        let config = LlmConfig {
            api_key: None,
            ..LlmConfig::default()
        };
        assert!(matches!(
            ClaudeBackend::new(config),
            Err(LlmError::Configuration(_))
        ));
    }

    #[test]
    fn test_request_lifts_system_prompt() {
        let backend = ClaudeBackend::new(test_config("http://localhost")).unwrap();
        let messages = vec![
            Message::system("You are an analyst"),
            Message::user("Analyze this"),
        ];
        let params = GenerationParams {
            temperature: Some(0.3),
            ..Default::default()
        };

        let request = backend.build_request(&messages, &params);
        assert_eq!(request.system.as_deref(), Some("You are an analyst"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.model, "claude-test");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["system"], "You are an analyst");
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Hello!"},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}}
            ],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;

        let response: ClaudeApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.stop_reason, Some(ClaudeStopReason::MaxTokens));
        assert_eq!(response.content.len(), 2);
        assert_eq!(response.usage.output_tokens, 5);
    }

    #[tokio::test]
    async fn test_generate_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(claude_reply("Interesting answer")))
            .expect(1)
            .mount(&server)
            .await;

        let backend = ClaudeBackend::new(test_config(&server.uri())).unwrap();
        let result = backend
            .generate(&[Message::user("hi")], &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(result.text, "Interesting answer");
        assert_eq!(result.input_tokens, 12);
        assert_eq!(result.output_tokens, 4);
        assert_eq!(result.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(3)
            .mount(&server)
            .await;

        let backend = ClaudeBackend::new(test_config(&server.uri())).unwrap();
        let result = backend
            .generate(&[Message::user("hi")], &GenerationParams::default())
            .await;
        assert!(matches!(result, Err(LlmError::Network(_))));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let backend = ClaudeBackend::new(test_config(&server.uri())).unwrap();
        let result = backend
            .generate(&[Message::user("hi")], &GenerationParams::default())
            .await;
        assert!(matches!(result, Err(LlmError::Api(_))));
    }
}
