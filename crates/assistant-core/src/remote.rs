//! Remote Capability Sessions
//!
//! External processes (MCP servers) that contribute tools at runtime.
//!
//! The [`SessionManager`] opens every configured session through a
//! [`CapabilityConnector`], collects their tools in configuration order and
//! closes them all on cleanup. The transport itself lives behind the
//! connector; see `assistant_runtime::mcp` for the stdio implementation.

use async_trait::async_trait;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::tool::Tool;

/// How to launch one capability session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSessionConfig {
    /// Executable to launch (e.g. "uvx")
    pub command: String,

    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment overrides layered over the inherited environment
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl RemoteSessionConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Named session configurations, kept in declaration order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RemoteServers(Vec<(String, RemoteSessionConfig)>);

impl RemoteServers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a session configuration
    pub fn insert(&mut self, name: impl Into<String>, config: RemoteSessionConfig) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = config,
            None => self.0.push((name, config)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, config: RemoteSessionConfig) -> Self {
        self.insert(name, config);
        self
    }

    pub fn get(&self, name: &str) -> Option<&RemoteSessionConfig> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RemoteSessionConfig)> {
        self.0.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse either a bare `{name: config}` map or `{"mcpServers": {...}}`
    pub fn from_json(text: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum File {
            Wrapped {
                #[serde(rename = "mcpServers")]
                mcp_servers: RemoteServers,
            },
            Bare(RemoteServers),
        }

        let file: File = serde_json::from_str(text)
            .map_err(|e| AgentError::Configuration(format!("invalid capability server config: {}", e)))?;
        Ok(match file {
            File::Wrapped { mcp_servers } => mcp_servers,
            File::Bare(servers) => servers,
        })
    }
}

impl<'de> Deserialize<'de> for RemoteServers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = RemoteServers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of session name to launch configuration")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut servers = RemoteServers::new();
                while let Some((name, config)) = map.next_entry::<String, RemoteSessionConfig>()? {
                    servers.insert(name, config);
                }
                Ok(servers)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Opens capability sessions (the transport side of remote tools)
#[async_trait]
pub trait CapabilityConnector: Send + Sync {
    /// Start the session described by `config`
    async fn open(&self, name: &str, config: &RemoteSessionConfig) -> Result<Arc<dyn CapabilitySession>>;
}

/// One open capability session
#[async_trait]
pub trait CapabilitySession: Send + Sync {
    /// Logical session name
    fn name(&self) -> &str;

    /// Tools exposed by the session; valid only while it is open
    async fn tools(&self) -> Result<Vec<Arc<dyn Tool>>>;

    /// Terminate the session
    async fn close(&self) -> Result<()>;
}

/// Outcome of closing every open session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Sessions closed without error
    pub closed: Vec<String>,
    /// `(session, error)` for sessions that failed to close cleanly
    pub failures: Vec<(String, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// The aggregated failure, if any
    pub fn to_error(&self) -> Option<AgentError> {
        if self.failures.is_empty() {
            return None;
        }
        let detail = self
            .failures
            .iter()
            .map(|(name, err)| format!("{}: {}", name, err))
            .collect::<Vec<_>>()
            .join("; ");
        Some(AgentError::SessionCleanup(detail))
    }
}

struct OpenSession {
    session: Arc<dyn CapabilitySession>,
    tools: Option<Vec<Arc<dyn Tool>>>,
}

/// Opens, queries and closes the configured capability sessions
pub struct SessionManager {
    connector: Arc<dyn CapabilityConnector>,
    servers: RemoteServers,
    open: Vec<OpenSession>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn CapabilityConnector>, servers: RemoteServers) -> Self {
        Self {
            connector,
            servers,
            open: Vec::new(),
        }
    }

    /// Names of open sessions, in configuration order
    pub fn open_names(&self) -> Vec<&str> {
        self.open.iter().map(|o| o.session.name()).collect()
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.open.iter().any(|o| o.session.name() == name)
    }

    /// Open every configured session that is not already open.
    ///
    /// Sessions that start are kept even when others fail, so a later
    /// [`close_all`](Self::close_all) still releases them; the failures are
    /// reported together.
    pub async fn open_all(&mut self) -> Result<()> {
        let mut failed = Vec::new();

        for (name, config) in self.servers.iter() {
            if self.open.iter().any(|o| o.session.name() == name) {
                continue;
            }

            tracing::info!(session = %name, command = %config.command, "Opening capability session");
            match self.connector.open(name, config).await {
                Ok(session) => self.open.push(OpenSession { session, tools: None }),
                Err(e) => {
                    tracing::warn!(session = %name, error = %e, "Capability session failed to open");
                    failed.push(format!("{}: {}", name, e));
                }
            }
        }

        // keep configuration order regardless of which attempt opened first
        let order = self.servers.names();
        let position = |name: &str| order.iter().position(|n| *n == name).unwrap_or(usize::MAX);
        self.open.sort_by_key(|o| position(o.session.name()));

        if failed.is_empty() {
            Ok(())
        } else {
            Err(AgentError::RemoteOpen { failed })
        }
    }

    /// Tools of every open session, concatenated in configuration order
    pub async fn tools(&mut self) -> Result<Vec<Arc<dyn Tool>>> {
        let mut all = Vec::new();

        for open in &mut self.open {
            if open.tools.is_none() {
                let tools = open.session.tools().await?;
                tracing::debug!(session = %open.session.name(), count = tools.len(), "Loaded remote tools");
                open.tools = Some(tools);
            }
            if let Some(tools) = &open.tools {
                all.extend(tools.iter().cloned());
            }
        }

        Ok(all)
    }

    /// Like [`tools`](Self::tools), but a session whose listing fails is
    /// closed and dropped instead of failing the whole call
    pub async fn tools_skipping_failures(&mut self) -> Vec<Arc<dyn Tool>> {
        let mut failed = Vec::new();

        for (index, open) in self.open.iter_mut().enumerate() {
            if open.tools.is_some() {
                continue;
            }
            match open.session.tools().await {
                Ok(tools) => {
                    tracing::debug!(session = %open.session.name(), count = tools.len(), "Loaded remote tools");
                    open.tools = Some(tools);
                }
                Err(e) => {
                    tracing::warn!(session = %open.session.name(), error = %e, "Dropping capability session whose tools could not be listed");
                    failed.push(index);
                }
            }
        }

        for index in failed.into_iter().rev() {
            let open = self.open.remove(index);
            if let Err(e) = open.session.close().await {
                tracing::debug!(session = %open.session.name(), error = %e, "Close after failed tool listing");
            }
        }

        self.open
            .iter()
            .filter_map(|o| o.tools.as_ref())
            .flatten()
            .cloned()
            .collect()
    }

    /// Close every open session. Never fails: close errors are collected
    /// into the report and logged once.
    pub async fn close_all(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        for open in self.open.drain(..) {
            let name = open.session.name().to_string();
            match open.session.close().await {
                Ok(()) => report.closed.push(name),
                Err(e) => report.failures.push((name, e.to_string())),
            }
        }

        if let Some(err) = report.to_error() {
            tracing::warn!(error = %err, "Some capability sessions did not close cleanly");
        } else if !report.closed.is_empty() {
            tracing::info!(count = report.closed.len(), "Closed capability sessions");
        }

        report
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("servers", &self.servers.names())
            .field("open", &self.open_names())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tool::tests::EchoTool;
    use std::sync::Mutex;

    /// In-memory connector: each session exposes one echo tool named after it.
    #[derive(Default)]
    pub(crate) struct FakeConnector {
        pub fail_open: Vec<&'static str>,
        pub fail_tools: Vec<&'static str>,
        pub fail_close: Vec<&'static str>,
        pub opened: Mutex<Vec<String>>,
        pub closed: Arc<Mutex<Vec<String>>>,
    }

    struct FakeSession {
        name: String,
        fail_tools: bool,
        fail_close: bool,
        closed: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl CapabilityConnector for FakeConnector {
        async fn open(&self, name: &str, _config: &RemoteSessionConfig) -> Result<Arc<dyn CapabilitySession>> {
            if self.fail_open.contains(&name) {
                return Err(AgentError::Remote(format!("{} refused to start", name)));
            }
            self.opened.lock().unwrap().push(name.to_string());
            Ok(Arc::new(FakeSession {
                name: name.to_string(),
                fail_tools: self.fail_tools.contains(&name),
                fail_close: self.fail_close.contains(&name),
                closed: self.closed.clone(),
            }))
        }
    }

    #[async_trait]
    impl CapabilitySession for FakeSession {
        fn name(&self) -> &str {
            &self.name
        }

        async fn tools(&self) -> Result<Vec<Arc<dyn Tool>>> {
            if self.fail_tools {
                return Err(AgentError::Remote("tools/list timed out".into()));
            }
            let name: &'static str = Box::leak(format!("{}_echo", self.name).into_boxed_str());
            Ok(vec![Arc::new(EchoTool(name))])
        }

        async fn close(&self) -> Result<()> {
            self.closed.lock().unwrap().push(self.name.clone());
            if self.fail_close {
                Err(AgentError::Remote("broken pipe".into()))
            } else {
                Ok(())
            }
        }
    }

    pub(crate) fn servers(names: &[&str]) -> RemoteServers {
        names.iter().fold(RemoteServers::new(), |servers, name| {
            servers.with(*name, RemoteSessionConfig::new("uvx").with_args([format!("{}@latest", name)]))
        })
    }

    fn tool_names(tools: &[Arc<dyn Tool>]) -> Vec<String> {
        tools.iter().map(|t| t.schema().name).collect()
    }

    #[test]
    fn test_config_preserves_file_order() {
        let json = r#"{
            "mcpServers": {
                "zeta": {"command": "uvx", "args": ["zeta@latest"], "env": {"FASTMCP_LOG_LEVEL": "ERROR"}},
                "alpha": {"command": "npx", "args": ["-y", "@azure/mcp@latest", "server", "start"]}
            }
        }"#;
        let servers = RemoteServers::from_json(json).unwrap();
        assert_eq!(servers.names(), vec!["zeta", "alpha"]);
        assert_eq!(servers.get("zeta").unwrap().env["FASTMCP_LOG_LEVEL"], "ERROR");
        assert!(servers.get("alpha").unwrap().env.is_empty());

        let bare = RemoteServers::from_json(r#"{"b": {"command": "x"}, "a": {"command": "y"}}"#).unwrap();
        assert_eq!(bare.names(), vec!["b", "a"]);
    }

    #[test]
    fn test_config_rejects_garbage() {
        let err = RemoteServers::from_json(r#"{"a": {"args": []}}"#).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_open_all_is_idempotent_and_ordered() {
        let connector = Arc::new(FakeConnector::default());
        let mut manager = SessionManager::new(connector.clone(), servers(&["core", "docs"]));

        manager.open_all().await.unwrap();
        manager.open_all().await.unwrap();
        assert_eq!(connector.opened.lock().unwrap().len(), 2);
        assert_eq!(manager.open_names(), vec!["core", "docs"]);

        let tools = manager.tools().await.unwrap();
        assert_eq!(tool_names(&tools), vec!["core_echo", "docs_echo"]);
    }

    #[tokio::test]
    async fn test_partial_open_failure_still_cleans_up() {
        let connector = Arc::new(FakeConnector {
            fail_open: vec!["broken"],
            ..Default::default()
        });
        let mut manager = SessionManager::new(connector.clone(), servers(&["core", "broken"]));

        let err = manager.open_all().await.unwrap_err();
        match err {
            AgentError::RemoteOpen { failed } => {
                assert_eq!(failed.len(), 1);
                assert!(failed[0].starts_with("broken:"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(manager.is_open("core"));

        let report = manager.close_all().await;
        assert!(report.is_clean());
        assert_eq!(report.closed, vec!["core"]);
        assert_eq!(*connector.closed.lock().unwrap(), vec!["core".to_string()]);
    }

    #[tokio::test]
    async fn test_close_failures_are_aggregated_not_raised() {
        let connector = Arc::new(FakeConnector {
            fail_close: vec!["core"],
            ..Default::default()
        });
        let mut manager = SessionManager::new(connector.clone(), servers(&["core", "docs"]));
        manager.open_all().await.unwrap();

        let report = manager.close_all().await;
        assert_eq!(report.closed, vec!["docs"]);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.to_error(), Some(AgentError::SessionCleanup(_))));
        // both were attempted
        assert_eq!(connector.closed.lock().unwrap().len(), 2);

        let again = manager.close_all().await;
        assert!(again.is_clean());
        assert!(again.closed.is_empty());
    }

    #[tokio::test]
    async fn test_tool_listing_failure_drops_only_that_session() {
        let connector = Arc::new(FakeConnector {
            fail_tools: vec!["docs"],
            ..Default::default()
        });
        let mut manager = SessionManager::new(connector.clone(), servers(&["core", "docs"]));
        manager.open_all().await.unwrap();

        assert!(manager.tools().await.is_err());

        let tools = manager.tools_skipping_failures().await;
        assert_eq!(tool_names(&tools), vec!["core_echo"]);
        assert_eq!(manager.open_names(), vec!["core"]);
        assert_eq!(*connector.closed.lock().unwrap(), vec!["docs".to_string()]);
    }
}
