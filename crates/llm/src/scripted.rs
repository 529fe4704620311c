//! Scripted language model
//!
//! Deterministic stand-in for a real provider. Replies come from, in order:
//! the queue of scripted replies, the responder function, the fixed default.
//! Every request is recorded for inspection.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use interview_agent_core::{
    Error, GenerateRequest, GenerateResponse, LanguageModel, Result, TokenUsage,
};

type Responder = Box<dyn Fn(&GenerateRequest) -> Result<String> + Send + Sync>;

/// One queued reply
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Fail(String),
}

/// Language model with canned replies
pub struct ScriptedLanguageModel {
    queue: Mutex<VecDeque<ScriptedReply>>,
    responder: Option<Responder>,
    default_reply: String,
    latency: Option<Duration>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl Default for ScriptedLanguageModel {
    fn default() -> Self {
        Self::with_default_reply("{}")
    }
}

impl ScriptedLanguageModel {
    /// Always answers with `reply` once the queue is empty
    pub fn with_default_reply(reply: impl Into<String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            default_reply: reply.into(),
            latency: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Computes each reply from the request
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&GenerateRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    /// Every call fails with an LLM error
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_fn(move |_| Err(Error::Llm(message.clone())))
    }

    /// Delay applied to every call, observed on the tokio clock
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a reply served before the responder or default
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.queue.lock().push_back(ScriptedReply::Text(reply.into()));
    }

    /// Queue a failure
    pub fn push_failure(&self, message: impl Into<String>) {
        self.queue.lock().push_back(ScriptedReply::Fail(message.into()));
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_reply(&self, request: &GenerateRequest) -> Result<String> {
        if let Some(reply) = self.queue.lock().pop_front() {
            return match reply {
                ScriptedReply::Text(text) => Ok(text),
                ScriptedReply::Fail(message) => Err(Error::Llm(message)),
            };
        }
        match &self.responder {
            Some(responder) => responder(request),
            None => Ok(self.default_reply.clone()),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.requests.lock().push(request.clone());
        let text = self.next_reply(&request)?;

        let prompt_words = request
            .messages
            .iter()
            .map(|m| m.content.split_whitespace().count())
            .sum::<usize>() as u32;
        let completion_words = text.split_whitespace().count() as u32;

        Ok(GenerateResponse {
            text,
            model: "scripted".to_string(),
            finish_reason: Default::default(),
            usage: Some(TokenUsage::new(prompt_words, completion_words)),
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
