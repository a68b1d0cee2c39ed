//! Reasoning Loop
//!
//! ReAct (Reason + Act) over a fixed tool pool. Each run is a fresh turn
//! seeded with one user message and surfaces its progress as a stream of
//! [`Step`]s: the seed, every assistant message and every tool result.

use async_stream::stream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::{Message, Transcript};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolRegistry, ToolResult};

/// Stream of reasoning steps; ends after the final answer or an error
pub type StepStream = Pin<Box<dyn Stream<Item = Result<Step>> + Send>>;

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt; tool descriptions are appended when enabled
    pub system_prompt: String,

    /// Maximum model round-trips before giving up
    pub max_iterations: usize,

    pub generation: GenerationOptions,

    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 10,
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
        }
    }
}

impl AgentConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.generation.model = model.into();
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a cloud operations assistant. You help users inspect and manage their cloud resources.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

Only call one tool per response. After receiving tool results, summarize them for the user.
If you can answer directly without tools, do so.
Never invent resource names or identifiers that did not come from a tool result."#;

/// One unit of reasoning output
#[derive(Clone, Debug)]
pub struct Step {
    /// Model round-trip that produced the step; 0 for the seeded user message
    pub iteration: usize,

    /// Latest message of the turn
    pub message: Message,

    /// Set on the assistant message that requested a tool and on that tool's result
    pub tool_call: Option<ToolCall>,
}

/// The reasoning agent: a model handle plus an immutable tool pool
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_descriptions && !self.tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.tools.generate_prompt_section());
        }

        prompt
    }

    /// Run one turn for `input`, yielding every step as it happens.
    ///
    /// The stream owns the agent handle, so it outlives any borrow of the
    /// session that created it.
    pub fn steps(self: Arc<Self>, input: impl Into<String>) -> StepStream {
        let input = input.into();

        Box::pin(stream! {
            let seed = Message::user(input);
            let mut transcript = Transcript::open(self.build_system_prompt(), seed.clone());
            yield Ok(Step { iteration: 0, message: seed, tool_call: None });

            for iteration in 1..=self.config.max_iterations {
                let completion = match self
                    .provider
                    .complete(transcript.messages(), &self.config.generation)
                    .await
                {
                    Ok(completion) => completion,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                if completion.is_truncated() {
                    tracing::warn!(iteration, model = %completion.model, "Model reply hit the token limit");
                }

                let call = parse_tool_call(&completion.content);
                let reply = Message::assistant(completion.content);
                transcript.push(reply.clone());
                yield Ok(Step { iteration, message: reply, tool_call: call.clone() });

                let call = match call {
                    Some(call) => call,
                    None => return,
                };

                tracing::debug!(tool = %call.name, iteration, "Executing tool");
                let result = self.execute_tool(&call).await;
                let observation = Message::tool(format_tool_result(&result), call.id.clone())
                    .with_name(&call.name);
                transcript.push(observation.clone());
                yield Ok(Step { iteration, message: observation, tool_call: Some(call) });
            }

            tracing::warn!(max = self.config.max_iterations, "Reasoning loop hit its iteration limit");
            yield Err(AgentError::MaxIterations(self.config.max_iterations));
        })
    }

    /// Run one turn to completion and return the final message content
    pub async fn run(self: Arc<Self>, input: impl Into<String>) -> Result<String> {
        let mut steps = self.steps(input);
        let mut last = None;

        while let Some(step) = steps.next().await {
            last = Some(step?);
        }

        last.map(|step| step.message.content)
            .ok_or_else(|| AgentError::Other("reasoning produced no output".into()))
    }

    async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        let result = match self.tools.execute(call).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::failure(&call.name, format!("Error: {}", e))
            }
        };

        match &call.id {
            Some(id) => result.with_id(id),
            None => result,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("provider", &self.provider.name())
            .field("tools", &self.tools.names())
            .field("max_iterations", &self.config.max_iterations)
            .finish()
    }
}

fn format_tool_result(result: &ToolResult) -> String {
    if result.success {
        format!("[Tool '{}' returned]\n{}", result.name, result.output)
    } else {
        format!("[Tool '{}' failed]\n{}", result.name, result.output)
    }
}

/// Extract a tool call from model output.
///
/// Accepts a fenced ```` ```tool ```` block, or failing that a reply that is
/// nothing but a JSON object carrying a `"tool"` key. JSON quoted inside
/// prose is part of the answer. Calls without an id get a fresh one.
pub fn parse_tool_call(content: &str) -> Option<ToolCall> {
    const FENCE: &str = "```tool";

    let fenced = content.find(FENCE).and_then(|start| {
        let body = &content[start + FENCE.len()..];
        let end = body.find("```")?;
        serde_json::from_str::<ToolCall>(body[..end].trim()).ok()
    });

    let mut call = fenced.or_else(|| parse_inline_tool_call(content))?;
    if call.id.is_none() {
        call.id = Some(uuid::Uuid::new_v4().to_string());
    }
    Some(call)
}

fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    let body = content.trim();
    if !(body.starts_with('{') && body.ends_with('}')) {
        return None;
    }

    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(body).ok()?;
    if !object.contains_key("tool") {
        return None;
    }

    serde_json::from_value(serde_json::Value::Object(object)).ok()
}
