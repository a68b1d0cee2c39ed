//! Streaming Adapter
//!
//! Turns a reasoning [`StepStream`] into the events a caller actually sees:
//! non-empty messages, minus the echo of the caller's own input.

use futures::{future, Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;

use crate::error::Result;
use crate::message::Role;
use crate::reasoning::StepStream;

/// SSE event name for incremental content
pub const MESSAGE_EVENT: &str = "message";

/// SSE event name for a mid-stream failure
pub const ERROR_EVENT: &str = "error";

/// Stream of events produced by one turn
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// One surfaced message
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreamEvent {
    pub role: Role,
    pub content: String,
    /// Tool involved in the step, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

impl StreamEvent {
    /// Wire payload: `{"content": <text>}`
    pub fn payload(&self) -> String {
        serde_json::json!({ "content": self.content }).to_string()
    }
}

/// Filter steps into events, dropping empty messages and any message whose
/// content is exactly `input`. Errors pass through unchanged.
pub fn events(steps: StepStream, input: impl Into<String>) -> EventStream {
    let input = input.into();

    let events = steps.filter_map(move |step| {
        let event = match step {
            Ok(step) if step.message.content.is_empty() || step.message.content == input => None,
            Ok(step) => Some(Ok(StreamEvent {
                role: step.message.role,
                content: step.message.content,
                tool: step.tool_call.map(|call| call.name),
            })),
            Err(e) => Some(Err(e)),
        };
        future::ready(event)
    });

    Box::pin(events)
}

/// Wrap a question in markdown formatting instructions, as the HTTP
/// streaming surface sends it to the model.
pub fn markdown_prompt(prompt: &str) -> String {
    format!(
        "\nPlease provide your response using proper markdown formatting:\n\
         - Use `code` for inline code\n\
         - Use ```language\ncode\n``` for code blocks\n\
         - Use **bold** for emphasis\n\
         - Use - or * for bullet points\n\
         - Use 1. 2. etc for numbered lists\n\
         - Use > for quotes\n\
         - Use ### for subheadings\n\
         - Use tables when presenting structured data\n\
         - Use [text](url) for links\n\
         - Use `diagrams` directory to generate AWS architecture diagrams\n\
         \n\
         Here's the user's question:\n\
         {}\n",
        prompt
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::message::Message;
    use crate::reasoning::Step;
    use crate::tool::ToolCall;
    use futures::stream;

    fn step(message: Message) -> Result<Step> {
        Ok(Step {
            iteration: 1,
            message,
            tool_call: None,
        })
    }

    fn steps(items: Vec<Result<Step>>) -> StepStream {
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn test_echo_and_empty_messages_are_dropped() {
        let input = "list my buckets";
        let items = vec![
            step(Message::user(input)),
            step(Message::assistant("")),
            Ok(Step {
                iteration: 1,
                message: Message::tool("bucket-a\nbucket-b", None),
                tool_call: Some(ToolCall::new("aws_cli")),
            }),
            step(Message::assistant("You have two buckets.")),
        ];

        let events: Vec<StreamEvent> = events(steps(items), input).map(|e| e.unwrap()).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].tool.as_deref(), Some("aws_cli"));
        assert_eq!(events[1].content, "You have two buckets.");
        assert!(events.iter().all(|e| e.content != input));
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let items = vec![step(Message::assistant("thinking")), Err(AgentError::MaxIterations(10))];
        let events: Vec<Result<StreamEvent>> = events(steps(items), "q").collect().await;
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(AgentError::MaxIterations(10))));
    }

    #[test]
    fn test_payload_shape() {
        let event = StreamEvent {
            role: Role::Assistant,
            content: "say \"hi\"".into(),
            tool: None,
        };
        let value: serde_json::Value = serde_json::from_str(&event.payload()).unwrap();
        assert_eq!(value, serde_json::json!({"content": "say \"hi\""}));
    }

    #[test]
    fn test_markdown_prompt_ends_with_question() {
        let prompt = markdown_prompt("List my EC2 instances");
        assert!(prompt.contains("proper markdown formatting"));
        assert!(prompt.trim_end().ends_with("List my EC2 instances"));
    }

    #[test]
    fn test_markdown_prompt_points_diagrams_at_their_directory() {
        let prompt = markdown_prompt("Draw my VPC");
        let links = prompt.find("- Use [text](url) for links\n").unwrap();
        let diagrams = prompt
            .find("- Use `diagrams` directory to generate AWS architecture diagrams\n")
            .unwrap();
        let question = prompt.find("Here's the user's question:").unwrap();
        assert!(links < diagrams && diagrams < question);
    }
}
