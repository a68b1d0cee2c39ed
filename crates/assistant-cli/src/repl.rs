//! Line-oriented conversation loop.

use std::io::Write;

use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use assistant_core::{AgentSession, Role};

const EXAMPLES: &[&str] = &[
    "List my EC2 instances",
    "Show my IAM users",
    "[Future] List my Azure VMs",
];

pub fn print_welcome(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "\nWelcome to Cloud Assistant! Here are some example questions:")?;
    for example in EXAMPLES {
        writeln!(out, "- {}", example)?;
    }
    Ok(())
}

/// Whether a line ends the conversation
pub fn is_exit(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "exit" | "quit")
}

/// Read questions until `exit`, `quit` or end of input
pub async fn run<R>(session: &mut AgentSession, input: R, out: &mut impl Write, stream: bool) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        write!(out, "You: ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        if is_exit(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        if let Err(e) = answer(session, line.trim(), out, stream).await {
            writeln!(out, "Error: {}", e)?;
        }
    }

    writeln!(out, "Goodbye!")?;
    Ok(())
}

/// Answer one question, printing either the final reply or every message
pub async fn answer(session: &mut AgentSession, prompt: &str, out: &mut impl Write, stream: bool) -> anyhow::Result<()> {
    if !stream {
        let response = session.process(prompt).await.map_err(|e| anyhow::anyhow!(e.user_message()))?;
        writeln!(out, "Assistant: {}", response)?;
        return Ok(());
    }

    let mut events = session.stream(prompt).await.map_err(|e| anyhow::anyhow!(e.user_message()))?;
    while let Some(event) = events.next().await {
        let event = event.map_err(|e| anyhow::anyhow!(e.user_message()))?;
        match (event.role, event.tool) {
            (Role::Tool, Some(tool)) => writeln!(out, "Tool ({}): {}", tool, event.content)?,
            _ => writeln!(out, "Assistant: {}", event.content)?,
        }
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assistant_core::{
        message::Message,
        provider::{Completion, GenerationOptions, LlmProvider, ModelInfo},
        AgentError, CloudToolFactory, RemoteServers, Result, SessionManager,
    };
    use assistant_runtime::McpConnector;
    use async_trait::async_trait;

    use super::*;

    /// Replies "You said: <last message>", failing on "boom"
    struct ParrotProvider;

    #[async_trait]
    impl LlmProvider for ParrotProvider {
        fn name(&self) -> &str {
            "parrot"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if last == "boom" {
                return Err(AgentError::ProviderUnavailable("connection refused".into()));
            }
            Ok(Completion::text(&options.model, format!("You said: {}", last)))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    fn session() -> AgentSession {
        AgentSession::new(
            Arc::new(ParrotProvider),
            CloudToolFactory::with_defaults(),
            SessionManager::new(Arc::new(McpConnector::new()), RemoteServers::new()),
        )
    }

    async fn transcript(input: &str, stream: bool) -> String {
        let mut session = session();
        let mut out = Vec::new();
        run(&mut session, input.as_bytes(), &mut out, stream).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_exit_words() {
        assert!(is_exit("exit"));
        assert!(is_exit("  QUIT \n"));
        assert!(!is_exit("exit now"));
    }

    #[tokio::test]
    async fn test_loop_answers_until_quit() {
        let text = transcript("hello\n\nQuit\nnever asked\n", false).await;
        assert!(text.contains("Assistant: You said: hello"));
        assert!(!text.contains("never asked"));
        assert!(text.trim_end().ends_with("Goodbye!"));
    }

    #[tokio::test]
    async fn test_loop_survives_errors_and_eof() {
        let text = transcript("boom\nhello\n", false).await;
        assert!(text.contains("Error: "));
        assert!(text.contains("Assistant: You said: hello"));
        assert!(text.trim_end().ends_with("Goodbye!"));
    }

    #[tokio::test]
    async fn test_stream_mode_prints_messages() {
        let text = transcript("hello\nexit\n", true).await;
        assert!(text.contains("Assistant: You said: hello"));
        assert_eq!(text.matches("Assistant:").count(), 1);
    }

    #[test]
    fn test_welcome_lists_examples() {
        let mut out = Vec::new();
        print_welcome(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Welcome to Cloud Assistant!"));
        assert!(text.contains("- List my EC2 instances"));
    }
}
