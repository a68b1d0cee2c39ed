//! # assistant-runtime
//!
//! Concrete collaborators for `assistant-core`.
//!
//! - **Ollama**: local LLM inference through `ollama-rs` (feature `ollama`)
//! - **MCP**: capability sessions through the `rmcp` client over child-process stdio
//! - **Settings**: environment and capability server file loading
//!
//! ## Usage
//!
//! ```rust,ignore
//! use assistant_runtime::{McpConnector, OllamaProvider, Settings};
//!
//! let settings = Settings::load()?;
//! let provider = OllamaProvider::from_config(settings.ollama.clone())?;
//! let remote = SessionManager::new(Arc::new(McpConnector::new()), settings.remote_servers()?);
//! let mut session = AgentSession::new(Arc::new(provider), settings.factory(), remote)
//!     .with_options(settings.session_options());
//! ```

pub mod mcp;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod settings;

pub use mcp::McpConnector;
#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;
pub use settings::{OllamaConfig, Settings};

// Re-export core types for convenience
pub use assistant_core::{AgentError, AgentSession, LlmProvider, Result, SessionManager};
