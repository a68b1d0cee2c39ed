//! # assistant-core
//!
//! Tool routing and agent session orchestration for the cloud assistant.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          AgentSession                            │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────┐  │
//! │  │ CloudToolFactory │   │  SessionManager  │   │ LlmProvider  │  │
//! │  │  (local tools)   │   │  (remote tools)  │   │  (Strategy)  │  │
//! │  └────────┬─────────┘   └────────┬─────────┘   └──────┬───────┘  │
//! │           └──────────┬───────────┘                    │          │
//! │                ToolRegistry ─────────▶ Agent (ReAct) ◀┘          │
//! └────────────────────────────────┬─────────────────────────────────┘
//!                                  ▼
//!                         stream::events ──▶ CLI / HTTP
//! ```
//!
//! The `LlmProvider` and `CapabilityConnector` traits keep the model backend
//! and the remote tool transport swappable; concrete implementations live in
//! `assistant-runtime`.

pub mod cloud;
pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod remote;
pub mod session;
pub mod stream;
pub mod tool;

pub use cloud::{CloudTool, CloudToolFactory, CloudToolHandle, CommandOutput, MatchMode};
pub use error::{AgentError, Result};
pub use message::{Message, Role};
pub use provider::LlmProvider;
pub use reasoning::{Agent, AgentConfig, Step};
pub use remote::{CapabilityConnector, CapabilitySession, CleanupReport, RemoteServers, RemoteSessionConfig, SessionManager};
pub use session::{AgentSession, SessionOptions, SessionState};
pub use stream::{EventStream, StreamEvent};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
