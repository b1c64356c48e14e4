//! MCP test client over a real WebSocket connection.

use super::constants::RESPONSE_TIMEOUT_MS;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub struct McpTestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: i64,
}

#[allow(dead_code)]
impl McpTestClient {
    pub async fn connect(url: &str) -> Self {
        Self::try_connect(url, None)
            .await
            .expect("Failed to connect to MCP endpoint")
    }

    /// Connect with `Authorization: Bearer <token>`.
    pub async fn connect_with_bearer(url: &str, token: &str) -> Self {
        Self::try_connect(url, Some(token))
            .await
            .expect("Failed to connect to MCP endpoint")
    }

    pub async fn try_connect(url: &str, bearer: Option<&str>) -> Result<Self, tungstenite::Error> {
        let mut request = url.into_client_request()?;
        if let Some(token) = bearer {
            request.headers_mut().insert(
                "Authorization",
                format!("Bearer {}", token)
                    .parse()
                    .expect("Invalid header value"),
            );
        }
        let (ws, _) = connect_async(request).await?;
        Ok(Self { ws, next_id: 1 })
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("Failed to send frame");
    }

    /// Wait for the next text frame and parse it as JSON.
    pub async fn recv(&mut self) -> Value {
        self.try_recv(Duration::from_millis(RESPONSE_TIMEOUT_MS))
            .await
            .expect("Timed out waiting for MCP response")
    }

    /// Next text frame within `wait`, or `None`.
    pub async fn try_recv(&mut self, wait: Duration) -> Option<Value> {
        let result = timeout(wait, async {
            while let Some(Ok(msg)) = self.ws.next().await {
                if let Message::Text(text) = msg {
                    return serde_json::from_str::<Value>(&text).ok();
                }
            }
            None
        })
        .await;
        result.ok().flatten()
    }

    /// Send a request with a fresh numeric id and return its response.
    pub async fn request(&mut self, method: &str, params: Option<Value>) -> Value {
        let id = self.next_id;
        self.next_id += 1;

        let mut frame = json!({ "jsonrpc": "2.0", "id": id, "method": method });
        if let Some(params) = params {
            frame["params"] = params;
        }
        self.send_raw(&frame.to_string()).await;

        let response = self.recv().await;
        assert_eq!(response["id"], json!(id), "response id mismatch: {}", response);
        response
    }

    pub async fn notify(&mut self, method: &str) {
        let frame = json!({ "jsonrpc": "2.0", "method": method });
        self.send_raw(&frame.to_string()).await;
    }

    /// The usual handshake: `initialize` then `notifications/initialized`.
    pub async fn initialize(&mut self) -> Value {
        let response = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "e2e-tests", "version": "1.0" }
                })),
            )
            .await;
        self.notify("notifications/initialized").await;
        response
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Value {
        self.request(
            "tools/call",
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    pub async fn read_resource(&mut self, uri: &str) -> Value {
        self.request("resources/read", Some(json!({ "uri": uri }))).await
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// HTTP status of a refused upgrade, or `None` when the upgrade succeeded.
#[allow(dead_code)]
pub async fn connect_error_status(url: &str, bearer: Option<&str>) -> Option<u16> {
    match McpTestClient::try_connect(url, bearer).await {
        Ok(client) => {
            client.close().await;
            None
        }
        Err(tungstenite::Error::Http(response)) => Some(response.status().as_u16()),
        Err(e) => panic!("Unexpected connection error: {}", e),
    }
}
