//! Language Model Seam
//!
//! The reasoning loop only ever asks for "the next reply to this transcript".
//! Tool descriptions travel inside the system prompt, so any plain
//! chat-completion backend can drive the assistant.
//!
//! ```rust,ignore
//! let provider: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::from_env()?);
//! let completion = provider.complete(transcript.messages(), &GenerationOptions::for_model("qwen2.5")).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Sampling settings sent with every completion request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier understood by the backend
    pub model: String,

    /// Kept low; tool calls must be valid JSON
    pub temperature: f32,

    pub top_p: f32,

    /// Upper bound on generated tokens per reply
    pub max_tokens: u32,

    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

impl GenerationOptions {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            temperature: 0.2,
            top_p: 0.9,
            max_tokens: 2048,
            stop_sequences: Vec::new(),
        }
    }
}

/// One reply from the model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,

    /// Model that actually answered
    pub model: String,

    pub usage: Option<TokenUsage>,

    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// A finished reply with no usage data
    pub fn text(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage: None,
            finish_reason: Some(FinishReason::Stop),
        }
    }

    /// Whether the reply was cut off by the token limit
    pub fn is_truncated(&self) -> bool {
        self.finish_reason == Some(FinishReason::Length)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
}

/// A model the backend can serve
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

/// Chat-completion backend driving the reasoning loop
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// `Ok(false)` when the backend answers but is not usable
    async fn health_check(&self) -> Result<bool>;

    /// Next assistant reply for `messages`
    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}
