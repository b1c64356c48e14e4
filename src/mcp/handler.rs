//! MCP Protocol Handler
//!
//! One [`ProtocolHandler`] per connection. It owns the connection's filter
//! and context, turns inbound text frames into JSON-RPC responses and never
//! lets a failure escape as anything other than a structured error.
//!
//! Lifecycle: `Created` -> `Ready` on the first frame (or an explicit
//! [`ProtocolHandler::activate`]), `Ready` -> `Closed` on disconnect.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::context::ToolContext;
use super::filter::CapabilityFilter;
use super::protocol::{
    methods, ClientInfo, InitializeParams, InitializeResult, McpError, McpRequest, McpResponse,
    PingResult, RequestId, ResourceContent, ResourceTemplatesListResult, ResourcesCapability,
    ResourcesListResult, ResourcesReadParams, ServerCapabilities, ServerInfo, ToolsCallParams,
    ToolsCallResult, ToolsCapability, ToolsListResult, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
    SERVER_NAME,
};
use super::rate_limit::McpRateLimiter;
use super::registry::{CapabilityError, McpRegistry, ToolCategory};
use crate::server::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Created,
    Ready,
    Closed,
}

pub struct ProtocolHandler {
    registry: Arc<McpRegistry>,
    filter: CapabilityFilter,
    context: Arc<ToolContext>,
    rate_limiter: Arc<McpRateLimiter>,
    state: HandlerState,
    client_info: Option<ClientInfo>,
}

impl ProtocolHandler {
    pub fn new(
        registry: Arc<McpRegistry>,
        filter: CapabilityFilter,
        context: ToolContext,
        rate_limiter: Arc<McpRateLimiter>,
    ) -> Self {
        Self {
            registry,
            filter,
            context: Arc::new(context),
            rate_limiter,
            state: HandlerState::Created,
            client_info: None,
        }
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    pub fn connection_id(&self) -> &str {
        &self.context.connection_id
    }

    pub fn client_info(&self) -> Option<&ClientInfo> {
        self.client_info.as_ref()
    }

    /// Move from `Created` to `Ready`, making sure both catalogs carry
    /// their defaults. Idempotent once `Ready`.
    pub fn activate(&mut self) -> Result<(), McpError> {
        match self.state {
            HandlerState::Ready => Ok(()),
            HandlerState::Closed => Err(McpError::InvalidRequest(
                "connection is closed".to_string(),
            )),
            HandlerState::Created => {
                self.registry.ensure_defaults().map_err(|e| {
                    error!("Failed to load default MCP catalog: {:#}", e);
                    McpError::InternalError
                })?;
                self.state = HandlerState::Ready;
                debug!("MCP handler ready on connection {}", self.connection_id());
                Ok(())
            }
        }
    }

    pub fn close(&mut self) {
        if self.state != HandlerState::Closed {
            self.state = HandlerState::Closed;
            debug!("MCP handler closed on connection {}", self.connection_id());
        }
    }

    /// Handle one inbound text frame. Returns `None` when nothing should be
    /// sent back (notifications).
    pub async fn handle_frame(&mut self, text: &str) -> Option<McpResponse> {
        let started = Instant::now();

        let frame: Value = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Unparsable MCP frame on {}: {}", self.connection_id(), e);
                metrics::record_request("invalid", McpError::ParseError.kind(), started.elapsed());
                return Some(McpResponse::error(None, McpError::ParseError));
            }
        };

        let request = match self.validate_envelope(frame) {
            Ok(request) => request,
            Err((id, err)) => {
                metrics::record_request("invalid", err.kind(), started.elapsed());
                return Some(McpResponse::error(id, err));
            }
        };

        let label = method_label(&request.method);
        debug!(
            "MCP request {} (id {:?}) on {}",
            request.method,
            request.id,
            self.connection_id()
        );

        let result = self.dispatch(&request).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_request(label, outcome, started.elapsed());

        let id = request.id?;
        Some(match result {
            Ok(value) => McpResponse::success(id, value),
            Err(err) => McpResponse::error(Some(id), err),
        })
    }

    /// Envelope checks. Failures here always get a response, with the id
    /// when it can be recovered from the frame.
    fn validate_envelope(
        &mut self,
        frame: Value,
    ) -> Result<McpRequest, (Option<RequestId>, McpError)> {
        if frame.is_array() {
            return Err((
                None,
                McpError::InvalidRequest("batch requests are not supported".to_string()),
            ));
        }

        let fallback_id = RequestId::recover(&frame);

        if self.state == HandlerState::Created {
            self.activate().map_err(|e| (fallback_id.clone(), e))?;
        }
        if self.state == HandlerState::Closed {
            return Err((
                fallback_id,
                McpError::InvalidRequest("connection is closed".to_string()),
            ));
        }

        let request: McpRequest = serde_json::from_value(frame)
            .map_err(|e| (fallback_id.clone(), McpError::InvalidRequest(e.to_string())))?;

        if request.jsonrpc != JSONRPC_VERSION {
            return Err((
                fallback_id,
                McpError::InvalidRequest(format!(
                    "unsupported jsonrpc version {:?}",
                    request.jsonrpc
                )),
            ));
        }
        if request.method.is_empty() {
            return Err((
                fallback_id,
                McpError::InvalidRequest("method must not be empty".to_string()),
            ));
        }

        Ok(request)
    }

    async fn dispatch(&mut self, request: &McpRequest) -> Result<Value, McpError> {
        let params = request.params.as_ref();
        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(params),
            methods::INITIALIZED => Ok(serde_json::json!({})),
            methods::SHUTDOWN => {
                debug!("MCP client on {} requested shutdown", self.connection_id());
                Ok(serde_json::json!({}))
            }
            methods::PING => to_result(&PingResult {}),
            methods::TOOLS_LIST => to_result(&ToolsListResult {
                tools: self.registry.tools.list(Some(&self.filter)),
            }),
            methods::TOOLS_CALL => self.handle_tools_call(params).await,
            methods::RESOURCES_LIST => to_result(&ResourcesListResult {
                resources: self.registry.resources.list(Some(&self.filter)),
            }),
            methods::RESOURCES_TEMPLATES_LIST => to_result(&ResourceTemplatesListResult {
                resource_templates: self.registry.resources.templates(Some(&self.filter)),
            }),
            methods::RESOURCES_READ => self.handle_resources_read(params).await,
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_initialize(&mut self, params: Option<&Value>) -> Result<Value, McpError> {
        let params: InitializeParams = match params {
            None | Some(Value::Null) => InitializeParams::default(),
            Some(value) => parse_params(Some(value))?,
        };

        if let Some(requested) = &params.protocol_version {
            if requested != MCP_PROTOCOL_VERSION {
                debug!(
                    "Client requested protocol {}, answering with {}",
                    requested, MCP_PROTOCOL_VERSION
                );
            }
        }
        if let Some(client) = &params.client_info {
            info!(
                "MCP client {} {} initialized on connection {}",
                client.name,
                client.version.as_deref().unwrap_or("?"),
                self.connection_id()
            );
        }
        self.client_info = params.client_info;

        to_result(&InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
                resources: ResourcesCapability {
                    subscribe: false,
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: self.context.server_version.clone(),
            },
        })
    }

    async fn handle_tools_call(&self, params: Option<&Value>) -> Result<Value, McpError> {
        let params: ToolsCallParams = parse_params(params)?;
        if params.name.is_empty() {
            return Err(McpError::InvalidParams("tool name must not be empty".to_string()));
        }
        let arguments = match params.arguments {
            None | Some(Value::Null) => Value::Object(Default::default()),
            Some(args @ Value::Object(_)) => args,
            Some(_) => {
                return Err(McpError::InvalidParams(
                    "arguments must be an object".to_string(),
                ))
            }
        };

        let tool = self
            .registry
            .tools
            .lookup(&params.name, &self.filter)
            .ok_or_else(|| McpError::ToolNotFound(params.name.clone()))?;

        self.check_rate_limit(tool.category())?;

        // Run on its own task so a panic stays inside it.
        let ctx = Arc::clone(&self.context);
        let outcome = tokio::spawn(async move { tool.invoke(&ctx, arguments).await }).await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                self.log_failure("Tool", &params.name, &err);
                map_tool_error(err)?
            }
            Err(join_err) => {
                error!(
                    "Tool {} aborted on connection {}: {}",
                    params.name,
                    self.connection_id(),
                    join_err
                );
                return Err(McpError::InternalError);
            }
        };

        to_result(&result)
    }

    async fn handle_resources_read(&self, params: Option<&Value>) -> Result<Value, McpError> {
        let params: ResourcesReadParams = parse_params(params)?;
        if params.uri.is_empty() {
            return Err(McpError::InvalidParams("uri must not be empty".to_string()));
        }

        let (resource, uri_params) = self
            .registry
            .resources
            .resolve(&params.uri, Some(&self.filter))
            .ok_or_else(|| McpError::ResourceNotFound(params.uri.clone()))?;

        self.check_rate_limit(ToolCategory::Read)?;

        let ctx = Arc::clone(&self.context);
        let uri = params.uri.clone();
        let outcome =
            tokio::spawn(async move { resource.read(&ctx, &uri, &uri_params).await }).await;

        let content: ResourceContent = match outcome {
            Ok(Ok(content)) => content,
            Ok(Err(err)) => {
                self.log_failure("Resource", &params.uri, &err);
                return Err(map_resource_error(err, &params.uri));
            }
            Err(join_err) => {
                error!(
                    "Resource {} aborted on connection {}: {}",
                    params.uri,
                    self.connection_id(),
                    join_err
                );
                return Err(McpError::InternalError);
            }
        };

        to_result(&content)
    }

    fn check_rate_limit(&self, category: ToolCategory) -> Result<(), McpError> {
        let key = self.context.rate_limit_key();
        self.rate_limiter
            .check_and_record(&key, category)
            .map_err(|retry_after_secs| {
                metrics::record_rate_limit_hit(category.as_str());
                warn!(
                    "MCP rate limit hit for {} ({}), retry after {}s",
                    key,
                    category.as_str(),
                    retry_after_secs
                );
                McpError::RateLimited { retry_after_secs }
            })
    }

    fn log_failure(&self, kind: &str, target: &str, err: &CapabilityError) {
        match err {
            CapabilityError::Failed(e) => error!(
                "{} {} failed on connection {}: {:#}",
                kind,
                target,
                self.connection_id(),
                e
            ),
            other => debug!("{} {} returned: {}", kind, target, other),
        }
    }
}

/// Map a tool failure onto the wire. A domain not-found is reported to the
/// agent as an error result, not a protocol error.
pub fn map_tool_error(err: CapabilityError) -> Result<ToolsCallResult, McpError> {
    match err {
        CapabilityError::InvalidArguments(msg) => Err(McpError::InvalidParams(msg)),
        CapabilityError::NotFound(msg) => Ok(ToolsCallResult::error(msg)),
        CapabilityError::Failed(_) => Err(McpError::InternalError),
    }
}

/// Map a resource failure onto the wire.
pub fn map_resource_error(err: CapabilityError, uri: &str) -> McpError {
    match err {
        CapabilityError::InvalidArguments(msg) => McpError::InvalidParams(msg),
        CapabilityError::NotFound(_) => McpError::ResourceNotFound(uri.to_string()),
        CapabilityError::Failed(_) => McpError::InternalError,
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<&Value>) -> Result<T, McpError> {
    let params = params.ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))?;
    serde_json::from_value(params.clone()).map_err(|e| McpError::InvalidParams(e.to_string()))
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| {
        error!("Failed to serialize MCP result: {}", e);
        McpError::InternalError
    })
}

/// Metric label for a method. Unknown methods share one label.
fn method_label(method: &str) -> &'static str {
    methods::ALL
        .iter()
        .copied()
        .find(|m| *m == method)
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kanban::{GenerationError, GenerationOptions, TextGenerator, UserIdentity};
    use crate::mcp::protocol::codes;
    use crate::mcp::rate_limit::RateLimitConfig;
    use crate::mcp::registry::{ResourceBuilder, ToolBuilder};
    use crate::mcp::tools::test_support::seeded_context;
    use crate::mcp::uri_template::UriParams;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    const SECRET: &str = "connection string postgres://admin:hunter2@db";

    fn registry() -> Arc<McpRegistry> {
        let registry = McpRegistry::with_defaults().unwrap();
        registry.tools.register(
            ToolBuilder::new("explode")
                .description("Always fails")
                .build(|_ctx, _args| async move {
                    Err(CapabilityError::Failed(anyhow::anyhow!(SECRET)))
                }),
        );
        registry.tools.register(
            ToolBuilder::new("panic")
                .description("Always panics")
                .build(|_ctx, _args| async move {
                    if SECRET.is_empty() {
                        return Ok(ToolsCallResult::text("unreachable"));
                    }
                    panic!("{}", SECRET)
                }),
        );
        Arc::new(registry)
    }

    fn handler_with(registry: Arc<McpRegistry>, filter: CapabilityFilter) -> ProtocolHandler {
        ProtocolHandler::new(
            registry,
            filter,
            seeded_context(None),
            Arc::new(McpRateLimiter::default()),
        )
    }

    fn handler() -> ProtocolHandler {
        handler_with(registry(), CapabilityFilter::allow_all())
    }

    async fn call(handler: &mut ProtocolHandler, frame: Value) -> Value {
        let response = handler
            .handle_frame(&frame.to_string())
            .await
            .expect("response expected");
        serde_json::to_value(response).unwrap()
    }

    fn request(id: i64, method: &str, params: Value) -> Value {
        json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
    }

    #[tokio::test]
    async fn test_malformed_json_is_parse_error_with_null_id() {
        let mut handler = handler();
        let response = handler.handle_frame("{not json").await.unwrap();
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["error"]["code"], codes::PARSE_ERROR);
        assert!(json["id"].is_null());
    }

    #[tokio::test]
    async fn test_batch_is_invalid_request() {
        let mut handler = handler();
        let json = call(&mut handler, json!([request(1, "ping", json!({}))])).await;
        assert_eq!(json["error"]["code"], codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_method_and_bad_version_are_invalid_request() {
        let mut handler = handler();
        let json = call(&mut handler, json!({"jsonrpc": "2.0", "id": 3})).await;
        assert_eq!(json["error"]["code"], codes::INVALID_REQUEST);
        assert_eq!(json["id"], 3);

        let json = call(&mut handler, json!({"jsonrpc": "1.0", "id": "x", "method": "ping"})).await;
        assert_eq!(json["error"]["code"], codes::INVALID_REQUEST);
        assert_eq!(json["id"], "x");

        let json = call(&mut handler, json!({"id": 4, "method": "ping"})).await;
        assert_eq!(json["error"]["code"], codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_numeric_ids_beyond_i64_are_echoed() {
        let mut handler = handler();
        let json = call(
            &mut handler,
            json!({"jsonrpc": "2.0", "id": u64::MAX, "method": "ping"}),
        )
        .await;
        assert!(json.get("error").is_none());
        assert_eq!(json["id"], json!(u64::MAX));

        let json = call(&mut handler, json!({"jsonrpc": "2.0", "id": 1.5, "method": "ping"})).await;
        assert!(json["result"].is_object());
        assert_eq!(json["id"], json!(1.5));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let mut handler = handler();
        let json = call(&mut handler, request(1, "frobnicate", json!({}))).await;
        assert_eq!(json["error"]["code"], codes::METHOD_NOT_FOUND);
        assert_eq!(json["id"], 1);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let mut handler = handler();
        for frame in [
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": null, "method": "ping"}),
            json!({"jsonrpc": "2.0", "method": "frobnicate"}),
            json!({"jsonrpc": "2.0", "method": "tools/call", "params": {"name": "explode"}}),
        ] {
            assert!(handler.handle_frame(&frame.to_string()).await.is_none());
        }
    }

    #[tokio::test]
    async fn test_initialize() {
        let mut handler = handler();
        let json = call(
            &mut handler,
            request(
                1,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test-agent", "version": "1.0"}
                }),
            ),
        )
        .await;

        assert_eq!(json["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(json["result"]["serverInfo"]["name"], "kanban-mcp");
        assert_eq!(json["result"]["capabilities"]["resources"]["subscribe"], false);
        assert_eq!(handler.client_info().unwrap().name, "test-agent");
    }

    #[tokio::test]
    async fn test_first_frame_activates_and_loads_defaults() {
        let registry = Arc::new(McpRegistry::new());
        let mut handler = handler_with(Arc::clone(&registry), CapabilityFilter::allow_all());
        assert_eq!(handler.state(), HandlerState::Created);
        assert_eq!(registry.tool_count(), 0);

        let json = call(&mut handler, request(1, "tools/list", json!({}))).await;
        assert_eq!(handler.state(), HandlerState::Ready);
        assert_eq!(json["result"]["tools"].as_array().unwrap().len(), 7);
        assert_eq!(registry.resource_count(), 5);
    }

    #[tokio::test]
    async fn test_closed_handler_rejects_frames() {
        let mut handler = handler();
        handler.activate().unwrap();
        handler.close();
        assert_eq!(handler.state(), HandlerState::Closed);

        let json = call(&mut handler, request(9, "ping", json!({}))).await;
        assert_eq!(json["error"]["code"], codes::INVALID_REQUEST);
        assert_eq!(json["id"], 9);
        assert!(handler.activate().is_err());
    }

    #[tokio::test]
    async fn test_tools_list_respects_filter() {
        let mut handler = handler_with(
            registry(),
            CapabilityFilter::allow_all().with_tools(["list_boards", "get_board"]),
        );
        let json = call(&mut handler, request(1, "tools/list", Value::Null)).await;
        let names: Vec<_> = json["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["list_boards", "get_board"]);
        assert!(json["result"]["tools"][0].get("inputSchema").is_some());
    }

    #[tokio::test]
    async fn test_tools_call_success() {
        let mut handler = handler();
        let json = call(
            &mut handler,
            request(1, "tools/call", json!({"name": "list_boards", "arguments": {}})),
        )
        .await;
        assert_eq!(json["result"]["content"][0]["type"], "text");
        let payload: Value =
            serde_json::from_str(json["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(payload["total"], 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found_not_internal() {
        let mut handler = handler();
        let json = call(&mut handler, request(1, "tools/call", json!({"name": "unknown_tool"}))).await;
        assert_eq!(json["error"]["code"], codes::TOOL_NOT_FOUND);
        assert_eq!(json["error"]["message"], "Tool not found: unknown_tool");
    }

    #[tokio::test]
    async fn test_disabled_tool_is_indistinguishable_from_missing() {
        let mut handler = handler_with(
            registry(),
            CapabilityFilter::allow_all().with_tools(["list_boards"]),
        );
        let disabled = call(&mut handler, request(1, "tools/call", json!({"name": "get_board"}))).await;
        let missing = call(&mut handler, request(1, "tools/call", json!({"name": "get_boardz"}))).await;

        assert_eq!(disabled["error"]["code"], missing["error"]["code"]);
        assert_eq!(disabled["error"]["message"], "Tool not found: get_board");
        assert_eq!(missing["error"]["message"], "Tool not found: get_boardz");
    }

    #[tokio::test]
    async fn test_tools_call_invalid_params() {
        let mut handler = handler();
        for params in [
            Value::Null,
            json!({}),
            json!({"name": 5}),
            json!({"name": ""}),
            json!({"name": "get_board", "arguments": [1, 2]}),
            json!({"name": "get_board", "arguments": {"board_id": "one"}}),
        ] {
            let frame = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": params});
            let json = call(&mut handler, frame).await;
            assert_eq!(json["error"]["code"], codes::INVALID_PARAMS, "params: {params}");
        }
    }

    #[tokio::test]
    async fn test_failing_tool_does_not_leak_detail() {
        let mut handler = handler();
        for name in ["explode", "panic"] {
            let json = call(&mut handler, request(1, "tools/call", json!({"name": name}))).await;
            assert_eq!(json["error"]["code"], codes::INTERNAL_ERROR);
            assert_eq!(json["error"]["message"], "Internal error");
            assert!(!json.to_string().contains("hunter2"));
        }

        // The connection keeps working afterwards.
        let json = call(&mut handler, request(2, "ping", json!({}))).await;
        assert!(json["result"].is_object());
    }

    struct TimeoutGenerator;

    #[async_trait::async_trait]
    impl TextGenerator for TimeoutGenerator {
        fn name(&self) -> &str {
            "timeout"
        }

        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, GenerationError> {
            Err(GenerationError::Timeout(Duration::from_secs(30)))
        }
    }

    #[tokio::test]
    async fn test_generator_timeout_is_internal_error() {
        let mut context = seeded_context(None);
        context.generator = Arc::new(TimeoutGenerator);
        let mut handler = ProtocolHandler::new(
            registry(),
            CapabilityFilter::allow_all(),
            context,
            Arc::new(McpRateLimiter::default()),
        );

        let json = call(
            &mut handler,
            request(
                1,
                "tools/call",
                json!({"name": "summarize_board", "arguments": {"board_id": 1}}),
            ),
        )
        .await;
        assert_eq!(json["error"]["code"], codes::INTERNAL_ERROR);
        assert_eq!(json["error"]["message"], "Internal error");
        assert!(!json.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_domain_not_found_is_tool_error_result() {
        let mut handler = handler();
        let json = call(
            &mut handler,
            request(1, "tools/call", json!({"name": "get_board", "arguments": {"board_id": 99}})),
        )
        .await;
        assert_eq!(json["result"]["isError"], true);
        assert_eq!(json["result"]["content"][0]["text"], "board 99 not found");
    }

    #[tokio::test]
    async fn test_resources_read_extracts_params_and_echoes_content() {
        let captured: Arc<Mutex<Option<UriParams>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&captured);

        let registry = McpRegistry::new();
        registry.resources.register(
            ResourceBuilder::new("kanban://boards/{board_id}", "board")
                .build(move |_ctx, uri, params| {
                    *sink.lock().unwrap() = Some(params);
                    async move {
                        Ok(ResourceContent {
                            uri,
                            mime_type: "text/markdown".to_string(),
                            text: "# Board 42".to_string(),
                        })
                    }
                })
                .unwrap(),
        );
        let mut handler = handler_with(Arc::new(registry), CapabilityFilter::allow_all());

        let json = call(
            &mut handler,
            request(7, "resources/read", json!({"uri": "kanban://boards/42"})),
        )
        .await;

        let params = captured.lock().unwrap().clone().unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params["board_id"], "42");
        assert_eq!(
            json["result"],
            json!({"uri": "kanban://boards/42", "mimeType": "text/markdown", "text": "# Board 42"})
        );
        assert_eq!(json["id"], 7);
    }

    #[tokio::test]
    async fn test_resources_read_not_found_and_disabled() {
        let mut handler = handler_with(
            registry(),
            CapabilityFilter::allow_all().with_resources(["boards"]),
        );
        let missing = call(
            &mut handler,
            request(1, "resources/read", json!({"uri": "kanban://nothing/1"})),
        )
        .await;
        let disabled = call(
            &mut handler,
            request(2, "resources/read", json!({"uri": "kanban://boards/1"})),
        )
        .await;
        assert_eq!(missing["error"]["code"], codes::RESOURCE_NOT_FOUND);
        assert_eq!(disabled["error"]["code"], codes::RESOURCE_NOT_FOUND);

        let allowed = call(
            &mut handler,
            request(3, "resources/read", json!({"uri": "kanban://boards"})),
        )
        .await;
        assert_eq!(allowed["result"]["uri"], "kanban://boards");
    }

    #[tokio::test]
    async fn test_resources_read_missing_uri_is_invalid_params() {
        let mut handler = handler();
        let json = call(&mut handler, request(1, "resources/read", json!({}))).await;
        assert_eq!(json["error"]["code"], codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_resources_list_and_templates() {
        let mut handler = handler_with(
            registry(),
            CapabilityFilter::allow_all().with_resources(["boards", "board", "card_schema"]),
        );
        let list = call(&mut handler, request(1, "resources/list", json!({}))).await;
        let uris: Vec<_> = list["result"]["resources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["uri"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            uris,
            vec![
                "kanban://boards",
                "kanban://boards/{board_id}",
                "kanban://schemas/card/{card_type}"
            ]
        );

        let templates = call(&mut handler, request(2, "resources/templates/list", json!({}))).await;
        assert_eq!(
            templates["result"]["resourceTemplates"].as_array().unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_rate_limit_returns_retry_after() {
        let mut handler = ProtocolHandler::new(
            registry(),
            CapabilityFilter::allow_all(),
            seeded_context(Some(UserIdentity::new("alice"))),
            Arc::new(McpRateLimiter::new(RateLimitConfig {
                read_per_minute: 100,
                write_per_minute: 1,
                generate_per_minute: 1,
            })),
        );
        let create = json!({"name": "create_card", "arguments": {"board_id": 1, "title": "a"}});

        let first = call(&mut handler, request(1, "tools/call", create.clone())).await;
        assert!(first["result"].is_object());

        let second = call(&mut handler, request(2, "tools/call", create)).await;
        assert_eq!(second["error"]["code"], codes::RATE_LIMITED);
        assert!(second["error"]["data"]["retry_after_secs"].as_u64().unwrap() >= 1);

        // Reads have their own budget.
        let read = call(&mut handler, request(3, "tools/call", json!({"name": "list_boards"}))).await;
        assert!(read["result"].is_object());
    }

    #[test]
    fn test_error_mapping_is_pure() {
        assert_eq!(
            map_tool_error(CapabilityError::InvalidArguments("bad".into())).unwrap_err(),
            McpError::InvalidParams("bad".into())
        );
        assert_eq!(
            map_tool_error(CapabilityError::NotFound("gone".into())).unwrap(),
            ToolsCallResult::error("gone")
        );
        assert_eq!(
            map_tool_error(CapabilityError::Failed(anyhow::anyhow!("boom"))).unwrap_err(),
            McpError::InternalError
        );
        assert_eq!(
            map_resource_error(CapabilityError::NotFound("x".into()), "kanban://cards/1"),
            McpError::ResourceNotFound("kanban://cards/1".into())
        );
    }

    #[test]
    fn test_method_label() {
        assert_eq!(method_label("tools/call"), "tools/call");
        assert_eq!(method_label("frobnicate"), "unknown");
    }
}
