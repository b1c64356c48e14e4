//! Kanban MCP Server Library
//!
//! Exposes kanban boards to LLM agents over the Model Context Protocol.

pub mod config;
pub mod kanban;
pub mod mcp;
pub mod server;

pub use config::{AppConfig, CliConfig, ConnectionConfig};
pub use kanban::{BoardStore, InMemoryBoardStore, TextGenerator, UnconfiguredGenerator};
pub use mcp::McpRegistry;
pub use server::{run_server, ServerState};
