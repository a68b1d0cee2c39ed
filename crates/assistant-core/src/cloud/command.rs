//! Command-line executor tool
//!
//! Splits a command string into shell words, prepends the provider's binary
//! and runs it as a subprocess with stdout and stderr captured separately.

use async_trait::async_trait;
use std::process::Stdio;

use super::{CloudTool, CommandOutput};
use crate::error::{AgentError, Result};

/// Static description of a command-line tool
#[derive(Clone, Debug)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub provider: String,
    /// Binary prepended to every command (e.g. "aws")
    pub binary: String,
    pub capabilities: Vec<String>,
    pub keywords: Vec<String>,
}

impl CommandSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        provider: impl Into<String>,
        binary: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            provider: provider.into(),
            binary: binary.into(),
            capabilities: Vec::new(),
            keywords: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.capabilities = capabilities.iter().map(|c| c.to_lowercase()).collect();
        self
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_lowercase()).collect();
        self
    }
}

/// Runs `<binary> <shell words...>`
#[derive(Clone, Debug)]
pub struct CommandLineTool {
    spec: CommandSpec,
}

impl CommandLineTool {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Full argument vector, binary first
    pub fn argv(&self, command: &str) -> Result<Vec<String>> {
        let mut argv = vec![self.spec.binary.clone()];
        argv.extend(split_command(command)?);
        Ok(argv)
    }

    fn spawn_error(&self, err: &std::io::Error) -> AgentError {
        AgentError::ToolExecution(format!("failed to run '{}': {}", self.spec.binary, err))
    }
}

#[async_trait]
impl CloudTool for CommandLineTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn provider(&self) -> &str {
        &self.spec.provider
    }

    fn capabilities(&self) -> &[String] {
        &self.spec.capabilities
    }

    fn keywords(&self) -> &[String] {
        &self.spec.keywords
    }

    async fn arun(&self, command: &str) -> Result<CommandOutput> {
        let args = split_command(command)?;
        let output = tokio::process::Command::new(&self.spec.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(&e))?;

        tracing::debug!(binary = %self.spec.binary, status = ?output.status, "Command finished");
        Ok(CommandOutput::from_output(&output))
    }

    fn run(&self, command: &str) -> Result<CommandOutput> {
        let args = split_command(command)?;
        let output = std::process::Command::new(&self.spec.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(&e))?;

        Ok(CommandOutput::from_output(&output))
    }
}

/// Split a command line into words using POSIX shell quoting rules.
///
/// Single quotes are literal, double quotes honour `\"`, `\\`, `\$` and
/// `` \` ``, and a backslash outside quotes escapes the next character.
/// No expansion of any kind is performed.
pub fn split_command(input: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(quote_error("unterminated single quote", input)),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => current.push(c),
                            Some('\n') => {}
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => return Err(quote_error("unterminated double quote", input)),
                        },
                        Some(c) => current.push(c),
                        None => return Err(quote_error("unterminated double quote", input)),
                    }
                }
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(c) => {
                    in_word = true;
                    current.push(c);
                }
                None => return Err(quote_error("trailing backslash", input)),
            },
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if in_word {
        words.push(current);
    }

    Ok(words)
}

fn quote_error(reason: &str, input: &str) -> AgentError {
    AgentError::ToolExecution(format!("cannot parse command ({}): {}", reason, input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_quoted_words_together() {
        assert_eq!(
            split_command(r#"s3 ls "my bucket""#).unwrap(),
            vec!["s3", "ls", "my bucket"]
        );
        assert_eq!(
            split_command("ec2 describe-instances --query 'Reservations[*].Instances[*]'").unwrap(),
            vec!["ec2", "describe-instances", "--query", "Reservations[*].Instances[*]"]
        );
    }

    #[test]
    fn test_split_escapes_and_adjacent_quotes() {
        assert_eq!(split_command(r#"a\ b "c\"d" e'f'g"#).unwrap(), vec!["a b", "c\"d", "efg"]);
        assert_eq!(split_command(r#""a\nb""#).unwrap(), vec!["a\\nb"]);
        assert_eq!(split_command("''").unwrap(), vec![""]);
        assert!(split_command("   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_rejects_unterminated_quotes() {
        assert!(matches!(split_command("s3 ls 'oops"), Err(AgentError::ToolExecution(_))));
        assert!(matches!(split_command("s3 ls \"oops"), Err(AgentError::ToolExecution(_))));
        assert!(split_command("trailing\\").is_err());
    }

    #[test]
    fn test_argv_prepends_binary() {
        let tool = CommandLineTool::new(CommandSpec::new("aws_cli", "AWS", "aws", "aws"));
        assert_eq!(
            tool.argv(r#"s3 ls "my bucket""#).unwrap(),
            vec!["aws", "s3", "ls", "my bucket"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_returns_error_text() {
        let tool = CommandLineTool::new(CommandSpec::new("sh_cli", "Shell", "test", "sh"));

        let output = tool.arun(r#"-c "echo boom >&2; exit 3""#).await.unwrap();
        assert_eq!(output, CommandOutput::Failure("boom\n".into()));
        assert!(output.render().starts_with("Error: "));
        assert!(output.render().contains("boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_and_arun_agree() {
        let tool = CommandLineTool::new(CommandSpec::new("printf_cli", "Formats", "test", "printf"));
        let command = r#"'%s|' s3 ls "my bucket""#;

        let blocking = tool.run(command).unwrap();
        let non_blocking = tool.arun(command).await.unwrap();
        assert_eq!(blocking, CommandOutput::Success("s3|ls|my bucket|".into()));
        assert_eq!(blocking, non_blocking);
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_fault() {
        let tool = CommandLineTool::new(CommandSpec::new(
            "ghost",
            "Missing",
            "ghost",
            "definitely-not-a-real-binary-7f3a",
        ));
        assert!(matches!(tool.arun("x").await, Err(AgentError::ToolExecution(_))));
        assert!(matches!(tool.run("x"), Err(AgentError::ToolExecution(_))));
    }
}
