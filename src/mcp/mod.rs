//! MCP (Model Context Protocol) Server
//!
//! Exposes kanban boards and AI helpers to LLM agents as MCP tools and
//! resources.
//!
//! ## Architecture
//!
//! - Transport: WebSocket at `/mcp`, one JSON-RPC message per text frame
//! - Auth: none, or a shared token checked before the upgrade
//! - Catalogs: tools by name, resources by `kanban://` URI template, shared
//!   by every connection
//! - Per connection: a capability filter and an identity-bearing context

pub mod connection;
pub mod context;
pub mod filter;
pub mod handler;
pub mod protocol;
pub mod rate_limit;
pub mod registry;
pub mod resources;
pub mod tools;
pub mod uri_template;

pub use connection::{authenticate, mcp_handler, Admission, TransportReject};
pub use context::ToolContext;
pub use filter::CapabilityFilter;
pub use handler::{HandlerState, ProtocolHandler};
pub use protocol::{McpError, McpRequest, McpResponse};
pub use rate_limit::{McpRateLimiter, RateLimitConfig};
pub use registry::{
    CapabilityError, McpRegistry, McpResource, McpTool, ResourceCatalog, ToolCatalog,
};
pub use uri_template::{UriParams, UriTemplate};
