//! MCP WebSocket Connections
//!
//! Authenticates the upgrade request, builds the connection's
//! [`ProtocolHandler`] and runs the frame loop until the socket closes.
//! Frames on one connection are handled strictly one at a time.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::context::ToolContext;
use super::filter::CapabilityFilter;
use super::handler::ProtocolHandler;
use crate::config::{AuthType, ConnectionConfig};
use crate::kanban::UserIdentity;
use crate::server::metrics;
use crate::server::state::ServerState;

/// Identity given to token-authenticated connections when no user is configured.
pub const DEFAULT_TOKEN_USER: &str = "mcp-agent";

/// Reasons a connection is refused before the upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportReject {
    #[error("MCP is disabled")]
    Disabled,

    #[error("missing MCP token")]
    MissingToken,

    #[error("invalid MCP token")]
    InvalidToken,
}

impl TransportReject {
    pub fn status(&self) -> StatusCode {
        match self {
            TransportReject::Disabled => StatusCode::FORBIDDEN,
            TransportReject::MissingToken | TransportReject::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
        }
    }

    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            TransportReject::Disabled => "disabled",
            TransportReject::MissingToken => "missing_token",
            TransportReject::InvalidToken => "invalid_token",
        }
    }
}

impl IntoResponse for TransportReject {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// An accepted connection: the settings it keeps for its lifetime and the
/// identity it acts as.
#[derive(Debug, Clone)]
pub struct Admission {
    pub config: ConnectionConfig,
    pub identity: Option<UserIdentity>,
}

pub fn authenticate(
    config: ConnectionConfig,
    presented_token: Option<&str>,
) -> Result<Admission, TransportReject> {
    if !config.enabled {
        return Err(TransportReject::Disabled);
    }

    let identity = match config.auth_type {
        AuthType::None => None,
        AuthType::Token => {
            let presented = presented_token
                .filter(|t| !t.is_empty())
                .ok_or(TransportReject::MissingToken)?;
            let expected = config
                .token
                .as_deref()
                .ok_or(TransportReject::InvalidToken)?;
            if !tokens_match(presented, expected) {
                return Err(TransportReject::InvalidToken);
            }
            let user = config.token_user.as_deref().unwrap_or(DEFAULT_TOKEN_USER);
            Some(UserIdentity::new(user))
        }
    };

    Ok(Admission { config, identity })
}

/// Compare digests so the time taken does not depend on the matching prefix.
fn tokens_match(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// The `?token=` query parameter wins over the header unless it is empty.
fn token_from_request(query_token: Option<String>, headers: &HeaderMap) -> Option<String> {
    query_token
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(headers))
}

#[derive(Debug, Deserialize)]
pub struct McpQuery {
    token: Option<String>,
}

/// WebSocket upgrade handler for MCP
pub async fn mcp_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<McpQuery>,
    headers: HeaderMap,
    State(state): State<ServerState>,
) -> Response {
    let presented = token_from_request(query.token, &headers);

    let admission = match authenticate(state.mcp_settings.snapshot(), presented.as_deref()) {
        Ok(admission) => admission,
        Err(reject) => {
            metrics::record_connection_rejection(reject.reason());
            warn!("MCP connection rejected: {}", reject);
            return reject.into_response();
        }
    };

    let connection_id = Uuid::new_v4().to_string();
    info!(
        "MCP WebSocket upgrade {} for {}",
        connection_id,
        admission
            .identity
            .as_ref()
            .map_or("anonymous", |u| u.id.as_str())
    );

    let context = ToolContext {
        identity: admission.identity,
        connection_id,
        boards: state.boards.clone(),
        generator: state.generator.clone(),
        server_version: state.server_version.clone(),
        start_time: state.start_time,
    };
    let handler = ProtocolHandler::new(
        state.registry.clone(),
        CapabilityFilter::from_config(&admission.config),
        context,
        state.rate_limiter.clone(),
    );

    ws.on_upgrade(move |socket| run_connection(socket, handler))
}

/// Handle an established MCP WebSocket connection
pub async fn run_connection(socket: WebSocket, mut handler: ProtocolHandler) {
    let connection_id = handler.connection_id().to_string();
    if let Err(e) = handler.activate() {
        error!("MCP connection {} could not start: {}", connection_id, e);
        return;
    }

    metrics::connection_opened();
    debug!("MCP connection {} established", connection_id);

    let (mut ws_sink, mut ws_stream) = socket.split();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let Some(response) = handler.handle_frame(text.as_str()).await else {
                    continue;
                };
                match serde_json::to_string(&response) {
                    Ok(json) => {
                        if ws_sink.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize MCP response: {}", e);
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                debug!("Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!("Received close frame");
                break;
            }
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        }
    }

    handler.close();
    metrics::connection_closed();
    info!("MCP connection {} closed", connection_id);
}
