//! Process settings
//!
//! Everything the binaries need to wire up a session, read from the
//! environment (after `.env` is loaded) with defaults for local use.

use std::path::{Path, PathBuf};
#[cfg(feature = "ollama")]
use std::sync::Arc;

use anyhow::{Context, Result};
use assistant_core::cloud::{CloudToolFactory, MatchMode};
use assistant_core::provider::DEFAULT_MODEL;
use assistant_core::reasoning::AgentConfig;
use assistant_core::remote::{RemoteServers, RemoteSessionConfig};
use assistant_core::session::SessionOptions;
#[cfg(feature = "ollama")]
use assistant_core::{remote::SessionManager, session::AgentSession};

#[cfg(feature = "ollama")]
use crate::{mcp::McpConnector, ollama::OllamaProvider};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `OLLAMA_HOST` and `OLLAMA_PORT` through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let host = lookup("OLLAMA_HOST").unwrap_or(defaults.host);
        let port = lookup("OLLAMA_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        Self {
            host,
            port,
            ..defaults
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host.trim_end_matches('/'), self.port)
    }
}

/// Resolved settings
#[derive(Clone, Debug)]
pub struct Settings {
    /// `ASSISTANT_MODEL`
    pub model: String,
    /// `OLLAMA_HOST`, `OLLAMA_PORT`
    pub ollama: OllamaConfig,
    /// `ASSISTANT_MCP_CONFIG`: JSON file of capability servers
    pub mcp_config: Option<PathBuf>,
    /// `ASSISTANT_MATCH_MODE`
    pub match_mode: MatchMode,
    /// `ASSISTANT_MAX_ITERATIONS`
    pub max_iterations: usize,
    /// `ASSISTANT_REQUIRE_REMOTE`
    pub require_remote: bool,
    /// `BIND_ADDR`
    pub bind_addr: String,
    /// `CORS_ORIGINS`, comma separated
    pub cors_origins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            ollama: OllamaConfig::default(),
            mcp_config: None,
            match_mode: MatchMode::default(),
            max_iterations: AgentConfig::default().max_iterations,
            require_remote: true,
            bind_addr: DEFAULT_BIND_ADDR.into(),
            cors_origins: vec![DEFAULT_CORS_ORIGIN.into()],
        }
    }
}

impl Settings {
    /// Load `.env` (if present) and read the environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset or blank keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let match_mode = match get("ASSISTANT_MATCH_MODE") {
            Some(raw) => raw.parse::<MatchMode>().context("ASSISTANT_MATCH_MODE")?,
            None => defaults.match_mode,
        };

        let max_iterations = match get("ASSISTANT_MAX_ITERATIONS") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("ASSISTANT_MAX_ITERATIONS must be a positive integer, got '{}'", raw))?,
            None => defaults.max_iterations,
        };

        let require_remote = match get("ASSISTANT_REQUIRE_REMOTE") {
            Some(raw) => parse_flag(&raw).with_context(|| format!("ASSISTANT_REQUIRE_REMOTE is not a boolean: '{}'", raw))?,
            None => defaults.require_remote,
        };

        let cors_origins = match get("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect(),
            None => defaults.cors_origins,
        };

        Ok(Self {
            model: get("ASSISTANT_MODEL").unwrap_or(defaults.model),
            ollama: OllamaConfig::from_lookup(&lookup),
            mcp_config: get("ASSISTANT_MCP_CONFIG").map(PathBuf::from),
            match_mode,
            max_iterations,
            require_remote,
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            cors_origins,
        })
    }

    /// Capability servers from the configured file, or the built-in set
    pub fn remote_servers(&self) -> Result<RemoteServers> {
        match &self.mcp_config {
            Some(path) => load_remote_servers(path),
            None => Ok(default_remote_servers()),
        }
    }

    pub fn factory(&self) -> CloudToolFactory {
        CloudToolFactory::with_defaults().with_match_mode(self.match_mode)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            require_remote: self.require_remote,
            agent: AgentConfig::default()
                .with_model(&self.model)
                .with_max_iterations(self.max_iterations),
        }
    }

    /// Ollama-backed session over the configured cloud tools and MCP servers
    #[cfg(feature = "ollama")]
    pub fn build_session(&self) -> Result<AgentSession> {
        let provider = OllamaProvider::from_config(self.ollama.clone()).context("Ollama provider")?;
        let remote = SessionManager::new(Arc::new(McpConnector::new()), self.remote_servers()?);

        Ok(AgentSession::new(Arc::new(provider), self.factory(), remote).with_options(self.session_options()))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a capability server file (`{"mcpServers": {...}}` or a bare map)
pub fn load_remote_servers(path: &Path) -> Result<RemoteServers> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read capability server config {}", path.display()))?;
    RemoteServers::from_json(&text).with_context(|| format!("in {}", path.display()))
}

/// The AWS Labs MCP servers, launched through `uvx`
pub fn default_remote_servers() -> RemoteServers {
    [
        "awslabs.core-mcp-server",
        "awslabs.aws-diagram-mcp-server",
        "awslabs.aws-documentation-mcp-server",
    ]
    .into_iter()
    .fold(RemoteServers::new(), |servers, name| {
        servers.with(
            name,
            RemoteSessionConfig::new("uvx")
                .with_args([format!("{}@latest", name)])
                .with_env("FASTMCP_LOG_LEVEL", "ERROR"),
        )
    })
}
