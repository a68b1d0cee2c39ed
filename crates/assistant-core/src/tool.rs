//! Tool System
//!
//! The uniform, model-facing tool contract and the tool pool the reasoning
//! loop draws from. Local cloud tools (see [`crate::cloud`]) and tools exposed
//! by remote capability sessions (see [`crate::remote`]) both end up here as
//! `Arc<dyn Tool>`.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, Result};

/// A request from the model to run one tool.
///
/// Models write `"tool"` as often as `"name"`, so both keys are accepted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(alias = "tool")]
    pub name: String,

    #[serde(default)]
    pub arguments: Map<String, Value>,

    /// Correlates the observation with this call
    #[serde(default)]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Map::new(),
            id: None,
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Outcome of running a tool. A failed outcome is still an observation
/// for the model, not an error of the turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    pub id: Option<String>,
    pub success: bool,
    pub output: String,
}

impl ToolResult {
    fn new(name: impl Into<String>, success: bool, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success,
            output: output.into(),
        }
    }

    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(name, true, output)
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(name, false, error)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// One named argument a tool accepts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub name: String,

    /// JSON Schema type name
    #[serde(rename = "type")]
    pub param_type: String,

    pub description: String,

    #[serde(default)]
    pub required: bool,
}

impl ParameterSchema {
    pub fn required(name: impl Into<String>, param_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// How a tool presents itself to the model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique within a tool pool
    pub name: String,

    pub description: String,

    pub parameters: Vec<ParameterSchema>,

    /// Provider tag for cloud tools, session name for remote tools
    #[serde(default)]
    pub category: Option<String>,
}

impl ToolSchema {
    /// Markdown entry for the system prompt
    pub fn describe(&self) -> String {
        let mut out = format!("### {}\n{}\n", self.name, self.description);
        if !self.parameters.is_empty() {
            out.push_str("**Parameters:**\n");
            for param in &self.parameters {
                let required = if param.required { " (required)" } else { "" };
                let _ = writeln!(out, "- `{}` ({}){}: {}", param.name, param.param_type, required, param.description);
            }
        }
        out
    }
}

/// The contract every tool in the pool satisfies, local or remote
#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Reject calls missing a required argument
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let schema = self.schema();
        match schema
            .parameters
            .iter()
            .find(|p| p.required && !call.arguments.contains_key(&p.name))
        {
            Some(missing) => Err(AgentError::ToolValidation(format!(
                "{} requires argument '{}'",
                schema.name, missing.name
            ))),
            None => Ok(()),
        }
    }
}

/// Ordered, name-unique pool of tools offered to the model
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, rejecting a name that is already taken
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if self.index.contains_key(&name) {
            return Err(AgentError::Configuration(format!("duplicate tool name '{}' in tool pool", name)));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Add every tool in order, stopping at the first duplicate
    pub fn extend(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Result<()> {
        tools.into_iter().try_for_each(|tool| self.register(tool))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// Look up, validate and run a call
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tool.validate(call)?;
        tool.execute(call).await
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.schema().name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// System prompt section teaching the call format and listing every tool
    pub fn generate_prompt_section(&self) -> String {
        let mut prompt = String::from(
            "## Available Tools\n\n\
             To use a tool, reply with exactly one fenced block:\n\n\
             ```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n",
        );
        for schema in self.schemas() {
            prompt.push_str(&schema.describe());
            prompt.push('\n');
        }
        prompt
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}
