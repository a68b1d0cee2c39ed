//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference.

use std::time::Duration;

use assistant_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, TokenUsage},
};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    error::OllamaError,
    generation::chat::{ChatMessage, ChatMessageResponse, MessageRole, request::ChatMessageRequest},
    models::ModelOptions,
};

use crate::settings::OllamaConfig;

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create from configuration
    ///
    /// Fails when `host` is not an absolute http(s) URL.
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        let mut url = reqwest::Url::parse(&config.host)
            .map_err(|e| AgentError::Configuration(format!("invalid OLLAMA_HOST '{}': {}", config.host, e)))?;
        if !url.has_host() || url.set_port(Some(config.port)).is_err() {
            return Err(AgentError::Configuration(format!(
                "OLLAMA_HOST '{}' has no host to connect to",
                config.host
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Configuration(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client: Ollama::new_with_client(url, config.port, http),
            config,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OllamaConfig::from_env())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Convert transcript messages to Ollama format
    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => MessageRole::System,
                    Role::User => MessageRole::User,
                    Role::Assistant => MessageRole::Assistant,
                    // tool output is fed back as user context
                    Role::Tool => MessageRole::User,
                };
                ChatMessage::new(role, m.content.clone())
            })
            .collect()
    }

    fn build_options(opts: &GenerationOptions) -> ModelOptions {
        let options = ModelOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX));

        if opts.stop_sequences.is_empty() {
            options
        } else {
            options.stop(opts.stop_sequences.clone())
        }
    }

    /// A reply that used up `max_tokens` was cut off
    fn convert_completion(response: ChatMessageResponse, options: &GenerationOptions) -> Completion {
        let usage = response.final_data.as_ref().map(|d| {
            TokenUsage::new(
                u32::try_from(d.prompt_eval_count).unwrap_or(u32::MAX),
                u32::try_from(d.eval_count).unwrap_or(u32::MAX),
            )
        });

        let finish_reason = match usage {
            Some(u) if u.completion_tokens >= options.max_tokens => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        let model = if response.model.is_empty() {
            options.model.clone()
        } else {
            response.model
        };

        Completion {
            content: response.message.content,
            model,
            usage,
            finish_reason: Some(finish_reason),
        }
    }

    fn provider_error(err: OllamaError) -> AgentError {
        match err {
            OllamaError::ReqwestError(e) if e.is_connect() || e.is_timeout() => {
                AgentError::ProviderUnavailable(e.to_string())
            }
            OllamaError::ReqwestError(e) => AgentError::Provider(e.to_string()),
            OllamaError::JsonError(e) => AgentError::Provider(format!("invalid Ollama response: {}", e)),
            other => AgentError::Provider(other.to_string()),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", Self::provider_error(e));
                Ok(false)
            }
        }
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        let request = ChatMessageRequest::new(options.model.clone(), Self::convert_messages(messages))
            .options(Self::build_options(options));

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(Self::provider_error)?;

        Ok(Self::convert_completion(response, options))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(Self::provider_error)?;

        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
            })
            .collect())
    }
}
