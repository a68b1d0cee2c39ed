//! Application State

use std::sync::Arc;

use assistant_core::AgentSession;
use tokio::sync::Mutex;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The one agent session; requests take turns on it
    pub session: Arc<Mutex<AgentSession>>,
}

impl AppState {
    pub fn new(session: AgentSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }
}
