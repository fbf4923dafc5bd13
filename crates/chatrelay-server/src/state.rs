//! Shared server state, wired once at startup and read-only per request.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use chatrelay_agent::AgentRegistry;
use chatrelay_core::config::Settings;
use chatrelay_provider::ChatClient;
use chatrelay_tools::ToolRegistry;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub client: Arc<ChatClient>,
    pub tools: Arc<ToolRegistry>,
    pub agents: Arc<AgentRegistry>,
    /// Parent token for every per-request cancellation token; cancelled on
    /// process shutdown.
    pub shutdown: CancellationToken,
}
