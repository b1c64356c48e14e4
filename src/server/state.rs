use axum::extract::FromRef;

use crate::config::{AppConfig, McpSettingsHandle};
use crate::kanban::{BoardStore, TextGenerator};
use crate::mcp::{McpRateLimiter, McpRegistry};
use std::sync::Arc;
use std::time::Instant;

pub type GuardedBoardStore = Arc<dyn BoardStore>;
pub type GuardedTextGenerator = Arc<dyn TextGenerator>;
pub type GuardedMcpRegistry = Arc<McpRegistry>;
pub type GuardedRateLimiter = Arc<McpRateLimiter>;

#[derive(Clone)]
pub struct ServerState {
    pub start_time: Instant,
    pub server_version: String,
    pub mcp_settings: McpSettingsHandle,
    pub registry: GuardedMcpRegistry,
    pub rate_limiter: GuardedRateLimiter,
    pub boards: GuardedBoardStore,
    pub generator: GuardedTextGenerator,
}

impl ServerState {
    pub fn new(
        config: &AppConfig,
        registry: GuardedMcpRegistry,
        boards: GuardedBoardStore,
        generator: GuardedTextGenerator,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            mcp_settings: McpSettingsHandle::new(config.mcp.clone()),
            registry,
            rate_limiter: Arc::new(McpRateLimiter::new(config.rate_limit.clone())),
            boards,
            generator,
        }
    }
}

impl FromRef<ServerState> for GuardedMcpRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.registry.clone()
    }
}

impl FromRef<ServerState> for McpSettingsHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.mcp_settings.clone()
    }
}
