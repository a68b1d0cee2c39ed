//! Agent Session
//!
//! Owns the model handle, the merged tool pool (local cloud tools first,
//! then remote capability tools) and the reasoning agent built over it.
//!
//! ```text
//! Uninitialized ──load_tools──▶ ToolsLoaded ──setup──▶ Ready
//!        │                           │                  │
//!        └───────────────cleanup─────┴──────────────────┴──▶ Closed
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::cloud::{CloudToolFactory, CloudToolHandle};
use crate::error::{AgentError, Result};
use crate::provider::LlmProvider;
use crate::reasoning::{Agent, AgentConfig};
use crate::remote::{CleanupReport, SessionManager};
use crate::stream::{events, EventStream};
use crate::tool::ToolRegistry;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle position of an [`AgentSession`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    ToolsLoaded,
    Ready,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::ToolsLoaded => "tools_loaded",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Knobs for an [`AgentSession`]
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Fail `load_tools` when any remote session fails to open. When false the
    /// failure is logged and the session continues with whatever opened.
    pub require_remote: bool,

    pub agent: AgentConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            require_remote: true,
            agent: AgentConfig::default(),
        }
    }
}

/// A conversational agent over cloud and remote tools
pub struct AgentSession {
    id: SessionId,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    state: SessionState,
    provider: Arc<dyn LlmProvider>,
    factory: CloudToolFactory,
    remote: SessionManager,
    options: SessionOptions,
    pool: Arc<ToolRegistry>,
    agent: Option<Arc<Agent>>,
}

impl AgentSession {
    pub fn new(provider: Arc<dyn LlmProvider>, factory: CloudToolFactory, remote: SessionManager) -> Self {
        Self {
            id: SessionId::new(),
            created_at: Utc::now(),
            closed_at: None,
            state: SessionState::Uninitialized,
            provider,
            factory,
            remote,
            options: SessionOptions::default(),
            pool: Arc::new(ToolRegistry::new()),
            agent: None,
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Names in the current tool pool, local tools first
    pub fn tool_names(&self) -> Vec<String> {
        self.pool.names()
    }

    pub fn tool_count(&self) -> usize {
        self.pool.len()
    }

    /// Cloud tools relevant to `query`, or all of them when none match
    pub fn relevant_tools(&self, query: &str) -> Vec<CloudToolHandle> {
        self.factory.find_tools_for_query(query)
    }

    pub fn factory(&self) -> &CloudToolFactory {
        &self.factory
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(AgentError::Lifecycle(format!(
                "cannot {} session {}: it has been cleaned up",
                operation, self.id
            )));
        }
        Ok(())
    }

    /// Open remote sessions and build the merged tool pool
    pub async fn load_tools(&mut self) -> Result<()> {
        self.ensure_open("load tools for")?;

        match self.remote.open_all().await {
            Ok(()) => {}
            Err(e @ AgentError::RemoteOpen { .. }) if !self.options.require_remote => {
                tracing::warn!(session = %self.id, error = %e, "Continuing without some capability sessions");
            }
            Err(e) => return Err(e),
        }

        let mut pool = ToolRegistry::new();
        pool.extend(self.factory.get_all_tools().into_iter().map(CloudToolHandle::into_tool))?;
        let remote_tools = if self.options.require_remote {
            self.remote.tools().await?
        } else {
            self.remote.tools_skipping_failures().await
        };
        pool.extend(remote_tools)?;

        tracing::info!(session = %self.id, tools = pool.len(), "Tool pool loaded");
        self.pool = Arc::new(pool);
        self.state = SessionState::ToolsLoaded;
        Ok(())
    }

    /// Load tools and build the reasoning agent. The agent is only rebuilt
    /// when the pool's tool names changed.
    pub async fn setup(&mut self) -> Result<()> {
        let previous = self.agent.as_ref().map(|agent| agent.tools().names());
        self.load_tools().await?;

        let unchanged = previous.as_ref() == Some(&self.pool.names());
        if !unchanged {
            tracing::info!(session = %self.id, model = %self.options.agent.generation.model, "Building agent");
            self.agent = Some(Arc::new(Agent::new(
                self.provider.clone(),
                self.pool.clone(),
                self.options.agent.clone(),
            )));
        }

        self.state = SessionState::Ready;
        Ok(())
    }

    async fn ready_agent(&mut self, operation: &str) -> Result<Arc<Agent>> {
        self.ensure_open(operation)?;
        if self.state != SessionState::Ready {
            self.setup().await?;
        }

        self.agent
            .clone()
            .ok_or_else(|| AgentError::Lifecycle(format!("session {} has no agent", self.id)))
    }

    /// Run one turn and return the final message content
    pub async fn process(&mut self, text: &str) -> Result<String> {
        let agent = self.ready_agent("process input in").await?;
        tracing::debug!(session = %self.id, "Processing input");
        agent.run(text).await
    }

    /// Run one turn, surfacing each new non-empty message as it appears.
    ///
    /// The returned stream owns its agent handle and does not borrow the
    /// session.
    pub async fn stream(&mut self, text: &str) -> Result<EventStream> {
        let agent = self.ready_agent("stream from").await?;
        tracing::debug!(session = %self.id, "Streaming input");
        Ok(events(agent.steps(text), text))
    }

    /// Release every remote session. Safe to call repeatedly.
    pub async fn cleanup(&mut self) -> CleanupReport {
        let report = self.remote.close_all().await;

        if self.state != SessionState::Closed {
            let closed_at = Utc::now();
            tracing::info!(
                session = %self.id,
                open_secs = (closed_at - self.created_at).num_seconds(),
                "Session closed"
            );
            self.closed_at = Some(closed_at);
        }
        self.state = SessionState::Closed;
        self.agent = None;
        self.pool = Arc::new(ToolRegistry::new());

        report
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("tools", &self.pool.names())
            .field("remote", &self.remote)
            .finish()
    }
}
