//! MCP capability sessions over child-process stdio
//!
//! ```text
//! McpConnector::open ──spawn──▶ TokioChildProcess ──serve──▶ McpSession
//!                                                              │ tools/list
//!                                                              ▼
//!                                                    McpTool (impl Tool) ──tools/call──▶ server
//! ```
//!
//! The protocol itself (handshake, pagination, ping replies) is handled by
//! `rmcp`; this module only adapts its client to the capability seam.

pub mod adapter;

use std::sync::Arc;

use rmcp::model::{CallToolRequestParam, ClientCapabilities, ClientInfo, Implementation, ProtocolVersion};
use rmcp::service::RunningService;
use rmcp::transport::TokioChildProcess;
use rmcp::{Peer, RoleClient, ServiceExt};
use tokio::process::Command;
use tokio::sync::Mutex;

use assistant_core::error::{AgentError, Result};
use assistant_core::remote::{CapabilityConnector, CapabilitySession, RemoteSessionConfig};
use assistant_core::tool::{Tool, ToolCall, ToolResult, ToolSchema};
use async_trait::async_trait;

/// Identity sent in `initialize`
fn client_info() -> ClientInfo {
    ClientInfo {
        protocol_version: ProtocolVersion::V_2024_11_05,
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "cloud-assistant".into(),
            title: None,
            version: env!("CARGO_PKG_VERSION").into(),
            icons: None,
            website_url: None,
        },
    }
}

/// Launches MCP servers as child processes
#[derive(Clone, Debug, Default)]
pub struct McpConnector;

impl McpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CapabilityConnector for McpConnector {
    async fn open(&self, name: &str, config: &RemoteSessionConfig) -> Result<Arc<dyn CapabilitySession>> {
        let mut command = Command::new(&config.command);
        command.args(&config.args).envs(&config.env);

        let transport = TokioChildProcess::new(command)
            .map_err(|e| AgentError::Remote(format!("cannot launch '{}' for session '{}': {}", config.command, name, e)))?;
        tracing::debug!(session = %name, pid = ?transport.id(), "Spawned capability server");

        // a failed handshake drops the transport, which kills the child
        let service = client_info()
            .serve(transport)
            .await
            .map_err(|e| AgentError::Remote(format!("session '{}' failed to initialize: {}", name, e)))?;

        tracing::info!(
            session = %name,
            server = %service.peer_info().map_or("unknown", |info| info.server_info.name.as_str()),
            "Capability session initialized"
        );

        Ok(Arc::new(McpSession {
            name: name.to_string(),
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
        }))
    }
}

/// An initialized MCP server
pub struct McpSession {
    name: String,
    peer: Peer<RoleClient>,
    /// `None` once closed
    service: Mutex<Option<RunningService<RoleClient, ClientInfo>>>,
}

#[async_trait]
impl CapabilitySession for McpSession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn tools(&self) -> Result<Vec<Arc<dyn Tool>>> {
        let listed = self
            .peer
            .list_all_tools()
            .await
            .map_err(|e| AgentError::Remote(format!("session '{}' tools/list failed: {}", self.name, e)))?;

        Ok(listed
            .into_iter()
            .map(|info| {
                Arc::new(McpTool {
                    schema: adapter::tool_schema(&info, &self.name),
                    session: self.name.clone(),
                    peer: self.peer.clone(),
                }) as Arc<dyn Tool>
            })
            .collect())
    }

    /// Cancels the client loop, which closes stdin and reaps the server
    async fn close(&self) -> Result<()> {
        let Some(service) = self.service.lock().await.take() else {
            return Ok(());
        };

        let reason = service
            .cancel()
            .await
            .map_err(|e| AgentError::Remote(format!("session '{}' did not shut down: {}", self.name, e)))?;
        tracing::debug!(session = %self.name, ?reason, "Capability session closed");
        Ok(())
    }
}

/// A tool served by an MCP session
pub struct McpTool {
    schema: ToolSchema,
    session: String,
    peer: Peer<RoleClient>,
}

#[async_trait]
impl Tool for McpTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        tracing::debug!(session = %self.session, tool = %self.schema.name, "Calling remote tool");

        let result = self
            .peer
            .call_tool(CallToolRequestParam {
                name: self.schema.name.clone().into(),
                arguments: Some(call.arguments.clone()),
            })
            .await
            .map_err(|e| AgentError::Remote(format!("session '{}' tools/call failed: {}", self.session, e)))?;

        Ok(adapter::tool_result(&self.schema.name, &result))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use assistant_core::remote::{RemoteServers, SessionManager};

    /// Minimal MCP server: two pages of tools, one tool that succeeds after
    /// pinging the client and one that reports an error.
    const FAKE_SERVER: &str = r##"
        while IFS= read -r line; do
          id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
          case "$line" in
            *'"method":"initialize"'*)
              printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake-docs","version":"0.1"}}}\n' "$id" ;;
            *'"method":"tools/list"'*'"cursor":"page-2"'*)
              printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"describe_stack","description":"Describe a stack","inputSchema":{"type":"object","properties":{"stack":{"type":"string"}},"required":["stack"]}}]}}\n' "$id" ;;
            *'"method":"tools/list"'*)
              printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"search_docs","description":"Search AWS documentation","inputSchema":{"type":"object","properties":{"query":{"type":"string"}}}}],"nextCursor":"page-2"}}\n' "$id" ;;
            *'"method":"tools/call"'*'"name":"search_docs"'*)
              printf '{"jsonrpc":"2.0","id":"srv-1","method":"ping"}\n'
              printf '{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info","data":"searching"}}\n'
              printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"S3 is object storage."},{"type":"text","text":"See the user guide."}]}}\n' "$id" ;;
            *'"method":"tools/call"'*)
              printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"stack not found"}],"isError":true}}\n' "$id" ;;
          esac
        done
    "##;

    fn fake_config() -> RemoteSessionConfig {
        RemoteSessionConfig::new("sh").with_args(["-c", FAKE_SERVER])
    }

    #[tokio::test]
    async fn test_session_lists_and_calls_tools() {
        let connector = McpConnector::new();
        let session = connector.open("docs", &fake_config()).await.unwrap();
        assert_eq!(session.name(), "docs");

        let tools = session.tools().await.unwrap();
        let names: Vec<String> = tools.iter().map(|t| t.schema().name).collect();
        assert_eq!(names, vec!["search_docs", "describe_stack"]);

        let found = tools[0]
            .execute(&ToolCall::new("search_docs").with_argument("query", "s3"))
            .await
            .unwrap();
        assert!(found.success);
        assert_eq!(found.output, "S3 is object storage.\nSee the user guide.");

        let missing = tools[1]
            .execute(&ToolCall::new("describe_stack").with_argument("stack", "prod"))
            .await
            .unwrap();
        assert!(!missing.success);
        assert_eq!(missing.output, "stack not found");

        session.close().await.unwrap();
        // tools stop working once their session is closed
        assert!(tools[0].execute(&ToolCall::new("search_docs")).await.is_err());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_handshake_is_an_open_error() {
        let err = McpConnector::new()
            .open("broken", &RemoteSessionConfig::new("false"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("failed to initialize"));
    }

    #[tokio::test]
    async fn test_manager_over_real_processes() {
        let servers = RemoteServers::new()
            .with("docs", fake_config())
            .with("broken", RemoteSessionConfig::new("definitely-not-a-real-binary-7f3a"));
        let mut manager = SessionManager::new(Arc::new(McpConnector::new()), servers);

        assert!(manager.open_all().await.is_err());
        assert_eq!(manager.open_names(), vec!["docs"]);
        assert_eq!(manager.tools().await.unwrap().len(), 2);

        let report = manager.close_all().await;
        assert!(report.is_clean());
        assert_eq!(report.closed, vec!["docs"]);
    }
}
