use anyhow::{Context, Result};
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use super::metrics::{init_metrics, metrics_handler};
use super::state::{GuardedMcpRegistry, ServerState};
use crate::config::McpSettingsHandle;
use crate::mcp::{mcp_handler, McpRateLimiter};

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct ServerStats {
    name: &'static str,
    version: String,
    uptime_secs: u64,
    uptime: String,
    mcp_enabled: bool,
    tools: usize,
    resources: usize,
}

fn format_uptime(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(
    State(state): State<ServerState>,
    State(registry): State<GuardedMcpRegistry>,
    State(settings): State<McpSettingsHandle>,
) -> impl IntoResponse {
    let uptime = state.start_time.elapsed();
    Json(ServerStats {
        name: crate::mcp::protocol::SERVER_NAME,
        version: state.server_version.clone(),
        uptime_secs: uptime.as_secs(),
        uptime: format_uptime(uptime),
        mcp_enabled: settings.snapshot().enabled,
        tools: registry.tool_count(),
        resources: registry.resource_count(),
    })
}

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/mcp", get(mcp_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn spawn_rate_limit_cleanup(rate_limiter: Arc<McpRateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = rate_limiter.cleanup_stale_entries();
            if removed > 0 {
                debug!("Dropped {} idle rate limit entries", removed);
            }
        }
    });
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(listener: TcpListener, state: ServerState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    init_metrics();
    spawn_rate_limit_cleanup(state.rate_limiter.clone());

    info!(
        "MCP server listening on {} with {} tools and {} resources",
        listener.local_addr()?,
        state.registry.tool_count(),
        state.registry.resource_count()
    );

    let app = make_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

pub async fn run_server(state: ServerState, bind_address: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((bind_address, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", bind_address, port))?;

    serve_with_shutdown(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested");
    })
    .await
}
