//! MCP Tools
//!
//! Built-in tools for boards, cards and AI assistance.

pub mod ai;
pub mod boards;
pub mod cards;

use std::sync::Arc;

use super::registry::McpTool;

/// The built-in tool set, in listing order.
pub fn default_tools() -> Vec<Arc<dyn McpTool>> {
    let mut tools = boards::tools();
    tools.extend(cards::tools());
    tools.extend(ai::tools());
    tools
}
