//! Error Types

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Assistant error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Tool not found in the active tool pool
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Unexpected fault while running a tool (missing binary, bad quoting, ...)
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Maximum iterations reached in reasoning loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Unsupported provider, duplicate tool name or unreadable configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation invoked in the wrong session state
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// One or more capability sessions failed to start
    #[error("Failed to open capability sessions: {}", .failed.join("; "))]
    RemoteOpen { failed: Vec<String> },

    /// Protocol error talking to a capability session
    #[error("Capability session error: {0}")]
    Remote(String),

    /// One or more capability sessions failed to close cleanly
    #[error("Capability session cleanup failed: {0}")]
    SessionCleanup(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(msg) => format!("The AI service encountered an error: {}", msg),
            AgentError::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            AgentError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            AgentError::ToolValidation(msg) => format!("Invalid tool input: {}", msg),
            AgentError::ToolExecution(msg) => format!("Tool error: {}", msg),
            AgentError::MaxIterations(_) => "The request took too long to process. Please try a simpler query.".into(),
            AgentError::Configuration(msg) => format!("The assistant is misconfigured: {}", msg),
            AgentError::Lifecycle(_) => "The assistant session has been shut down. Please start a new one.".into(),
            AgentError::RemoteOpen { failed } => {
                format!("Some capability servers could not be started: {}", failed.join("; "))
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
