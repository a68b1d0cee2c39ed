//! Cloud tool factory
//!
//! Holds one constructor per provider and builds each provider's tool at most
//! once, on first request. Construction goes through a `OnceLock`, so
//! concurrent first use still yields a single instance.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use super::{aws_cli_tool, CloudTool, CloudToolHandle, AWS_PROVIDER};
use crate::error::{AgentError, Result};

type Constructor = Box<dyn Fn() -> Arc<dyn CloudTool> + Send + Sync>;

/// How query text is matched against keywords, provider tags and capabilities
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Unanchored substring match: "s3" also matches inside "pass3word"
    #[default]
    Substring,
    /// Term must be bounded by non-alphanumeric characters or the text edges
    WholeWord,
}

impl FromStr for MatchMode {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "substring" => Ok(MatchMode::Substring),
            "whole-word" | "whole_word" | "word" => Ok(MatchMode::WholeWord),
            other => Err(AgentError::Configuration(format!("unknown match mode '{}'", other))),
        }
    }
}

impl MatchMode {
    fn matches(self, query: &str, term: &str) -> bool {
        let term = term.to_lowercase();
        if term.is_empty() {
            return false;
        }
        match self {
            MatchMode::Substring => query.contains(&term),
            MatchMode::WholeWord => contains_word(query, &term),
        }
    }
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

struct ProviderSlot {
    provider: String,
    construct: Constructor,
    instance: OnceLock<Arc<dyn CloudTool>>,
}

impl ProviderSlot {
    fn instance(&self) -> &Arc<dyn CloudTool> {
        self.instance.get_or_init(|| {
            tracing::info!(provider = %self.provider, "Constructing cloud tool");
            (self.construct)()
        })
    }
}

/// Registry of cloud providers and their lazily built tools
pub struct CloudToolFactory {
    slots: Vec<ProviderSlot>,
    match_mode: MatchMode,
}

impl Default for CloudToolFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CloudToolFactory {
    /// Factory with no providers
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            match_mode: MatchMode::default(),
        }
    }

    /// Factory with the built-in providers (currently `aws`)
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register(AWS_PROVIDER, || Arc::new(aws_cli_tool()));
        factory
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    /// Register a provider constructor. Re-registering a provider replaces
    /// its constructor in place and drops any instance already built.
    pub fn register<F>(&mut self, provider: impl Into<String>, construct: F)
    where
        F: Fn() -> Arc<dyn CloudTool> + Send + Sync + 'static,
    {
        let slot = ProviderSlot {
            provider: provider.into(),
            construct: Box::new(construct),
            instance: OnceLock::new(),
        };

        match self.slots.iter_mut().find(|s| s.provider == slot.provider) {
            Some(existing) => {
                tracing::debug!(provider = %slot.provider, "Replacing cloud tool constructor");
                *existing = slot;
            }
            None => self.slots.push(slot),
        }
    }

    /// Registered provider tags, in registration order
    pub fn providers(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.provider.as_str()).collect()
    }

    /// Wrapper for a provider's singleton tool
    pub fn get_tool(&self, provider: &str) -> Result<CloudToolHandle> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.provider == provider)
            .ok_or_else(|| AgentError::Configuration(format!("Provider {} not supported", provider)))?;

        Ok(CloudToolHandle::new(slot.instance().clone()))
    }

    /// Wrappers for every provider, in registration order
    pub fn get_all_tools(&self) -> Vec<CloudToolHandle> {
        self.slots
            .iter()
            .map(|slot| CloudToolHandle::new(slot.instance().clone()))
            .collect()
    }

    /// Tools whose keywords, provider tag or capabilities occur in the query.
    ///
    /// Falls back to every tool when nothing matches.
    pub fn find_tools_for_query(&self, query: &str) -> Vec<CloudToolHandle> {
        let query = query.to_lowercase();
        let mode = self.match_mode;

        let relevant: Vec<CloudToolHandle> = self
            .slots
            .iter()
            .filter_map(|slot| {
                let tool = slot.instance();
                let hit = tool.keywords().iter().any(|k| mode.matches(&query, k))
                    || mode.matches(&query, &slot.provider)
                    || tool.capabilities().iter().any(|c| mode.matches(&query, c));
                hit.then(|| CloudToolHandle::new(tool.clone()))
            })
            .collect();

        if relevant.is_empty() {
            tracing::debug!("No tool matched query, offering all tools");
            self.get_all_tools()
        } else {
            relevant
        }
    }
}

impl std::fmt::Debug for CloudToolFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudToolFactory")
            .field("providers", &self.providers())
            .field("match_mode", &self.match_mode)
            .finish()
    }
}
