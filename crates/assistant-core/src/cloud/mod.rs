//! Cloud Provider Tools
//!
//! Provider-specific command tools and the factory that hands them out.
//!
//! ```text
//! CloudToolFactory ──get_tool("aws")──▶ CloudToolHandle ──▶ Arc<dyn CloudTool>
//!                                         (impl Tool)          (CommandLineTool "aws")
//! ```
//!
//! A [`CloudTool`] knows its provider, trigger keywords and capability tags
//! and runs a command string. [`CloudToolHandle`] adapts it to the uniform
//! [`Tool`] contract so it can sit in the same pool as remote tools.

mod aws;
mod command;
mod factory;

pub use aws::{aws_cli_tool, AWS_PROVIDER};
pub use command::{split_command, CommandLineTool, CommandSpec};
pub use factory::{CloudToolFactory, MatchMode};

use async_trait::async_trait;
use std::process::Output;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::tool::{ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema};

/// Outcome of a command that ran to completion
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutput {
    /// Exit code 0, carries stdout
    Success(String),
    /// Non-zero exit, carries stderr
    Failure(String),
}

impl CommandOutput {
    pub fn from_output(output: &Output) -> Self {
        if output.status.success() {
            CommandOutput::Success(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            CommandOutput::Failure(String::from_utf8_lossy(&output.stderr).into_owned())
        }
    }

    /// Text handed back to the model: stdout, or `Error: <stderr>`
    pub fn render(&self) -> String {
        match self {
            CommandOutput::Success(stdout) => stdout.clone(),
            CommandOutput::Failure(stderr) => format!("Error: {}", stderr),
        }
    }
}

/// Contract for a provider's command tool
///
/// `run` and `arun` accept the same command grammar (shell words, without the
/// provider binary) and must behave the same. `Err` is reserved for faults
/// that are not a normal non-zero exit.
#[async_trait]
pub trait CloudTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Provider tag, e.g. "aws"
    fn provider(&self) -> &str;

    /// Coarse domain tags (storage, compute, ...)
    fn capabilities(&self) -> &[String] {
        &[]
    }

    /// Lowercase words that suggest this tool
    fn keywords(&self) -> &[String] {
        &[]
    }

    /// Run without blocking the executor
    async fn arun(&self, command: &str) -> Result<CommandOutput>;

    /// Run on the calling thread
    fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Model-facing wrapper around a provider's singleton [`CloudTool`]
#[derive(Clone)]
pub struct CloudToolHandle {
    tool: Arc<dyn CloudTool>,
}

impl CloudToolHandle {
    pub fn new(tool: Arc<dyn CloudTool>) -> Self {
        Self { tool }
    }

    /// The wrapped instance
    pub fn instance(&self) -> &Arc<dyn CloudTool> {
        &self.tool
    }

    /// Whether both handles wrap the same instance
    pub fn same_instance(&self, other: &CloudToolHandle) -> bool {
        Arc::ptr_eq(&self.tool, &other.tool)
    }

    pub fn into_tool(self) -> Arc<dyn Tool> {
        Arc::new(self)
    }
}

impl std::fmt::Debug for CloudToolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudToolHandle")
            .field("name", &self.tool.name())
            .field("provider", &self.tool.provider())
            .finish()
    }
}

#[async_trait]
impl Tool for CloudToolHandle {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.tool.name().to_string(),
            description: self.tool.description().to_string(),
            parameters: vec![ParameterSchema::required(
                "command",
                "string",
                "The command to execute, without the leading binary name (e.g. 'ec2 describe-instances')",
            )],
            category: Some(self.tool.provider().to_string()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let name = self.tool.name();
        let command = call.get_str("command").ok_or_else(|| {
            AgentError::ToolValidation(format!("{} argument 'command' must be a string", name))
        })?;
        tracing::debug!(tool = %name, %command, "Running cloud command");

        let result = match self.tool.arun(command).await {
            Ok(CommandOutput::Success(stdout)) => ToolResult::success(name, stdout),
            Ok(failed) => ToolResult::failure(name, failed.render()),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "Cloud command faulted");
                ToolResult::failure(
                    name,
                    format!("Error executing {} command: {}", self.tool.provider(), e),
                )
            }
        };

        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn printf_tool() -> CommandLineTool {
        CommandLineTool::new(CommandSpec::new("printf_cli", "Formats text", "test", "printf"))
    }

    #[tokio::test]
    async fn test_handle_returns_stdout() {
        let handle = CloudToolHandle::new(Arc::new(printf_tool()));
        let call = ToolCall::new("printf_cli").with_argument("command", r#"'%s|' s3 ls "my bucket""#);

        let result = handle.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "s3|ls|my bucket|");
    }

    #[tokio::test]
    async fn test_handle_reports_fault_as_text() {
        let tool = CommandLineTool::new(CommandSpec::new(
            "ghost_cli",
            "Missing binary",
            "ghost",
            "definitely-not-a-real-binary-7f3a",
        ));
        let handle = CloudToolHandle::new(Arc::new(tool));
        let call = ToolCall::new("ghost_cli").with_argument("command", "list");

        let result = handle.execute(&call).await.unwrap();
        assert!(!result.success);
        assert!(result.output.starts_with("Error executing ghost command: "));
    }

    #[tokio::test]
    async fn test_non_string_command_is_rejected() {
        let handle = CloudToolHandle::new(Arc::new(printf_tool()));

        let numeric = handle
            .execute(&ToolCall::new("printf_cli").with_argument("command", 5))
            .await
            .unwrap_err();
        assert!(matches!(numeric, AgentError::ToolValidation(ref msg) if msg.contains("'command'")));

        let missing = handle.execute(&ToolCall::new("printf_cli")).await.unwrap_err();
        assert!(matches!(missing, AgentError::ToolValidation(_)));
    }

    #[test]
    fn test_handle_schema_uses_provider_category() {
        let handle = CloudToolHandle::new(Arc::new(printf_tool()));
        let schema = handle.schema();
        assert_eq!(schema.name, "printf_cli");
        assert_eq!(schema.category.as_deref(), Some("test"));
        assert!(schema.parameters[0].required);
    }
}
