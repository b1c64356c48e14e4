//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own seeded board store,
//! listening on a random port.

use super::constants::*;
use super::fixtures::{seeded_store, FakeGenerator};
use kanban_mcp_server::config::{AppConfig, ConnectionConfig};
use kanban_mcp_server::kanban::TextGenerator;
use kanban_mcp_server::mcp::{McpRegistry, RateLimitConfig};
use kanban_mcp_server::server::{serve_with_shutdown, ServerState};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Knobs for a test server. Defaults: MCP enabled without auth, the
/// `FakeGenerator`, and the default rate limits.
pub struct TestServerOptions {
    pub connection: ConnectionConfig,
    pub generator: Arc<dyn TextGenerator>,
    pub rate_limit: RateLimitConfig,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            generator: Arc::new(FakeGenerator),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Test server instance
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Live MCP settings, for tests that change them at runtime
    #[allow(dead_code)]
    pub state: ServerState,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

#[allow(dead_code)]
impl TestServer {
    /// Spawns a new test server with default options
    pub async fn spawn() -> Self {
        Self::spawn_with(TestServerOptions::default()).await
    }

    pub async fn spawn_with_connection(connection: ConnectionConfig) -> Self {
        Self::spawn_with(TestServerOptions {
            connection,
            ..Default::default()
        })
        .await
    }

    pub async fn spawn_with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self::spawn_with(TestServerOptions {
            generator,
            ..Default::default()
        })
        .await
    }

    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if port binding fails or the server doesn't become ready
    /// within timeout.
    pub async fn spawn_with(options: TestServerOptions) -> Self {
        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let config = AppConfig {
            port,
            bind_address: "127.0.0.1".to_string(),
            boards_file: None,
            mcp: options.connection,
            rate_limit: options.rate_limit,
        };
        let state = ServerState::new(
            &config,
            Arc::new(McpRegistry::with_defaults().expect("Failed to build registry")),
            Arc::new(seeded_store()),
            options.generator,
        );

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let server_state = state.clone();
        tokio::spawn(async move {
            serve_with_shutdown(listener, server_state, async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            state,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// WebSocket URL of the MCP endpoint
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/mcp", self.port)
    }

    /// Waits for the server to become ready by polling the `/` endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
