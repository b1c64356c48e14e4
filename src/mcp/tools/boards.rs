//! Board Tools
//!
//! Read-only tools for discovering boards and their contents.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::mcp::context::ToolContext;
use crate::mcp::protocol::ToolsCallResult;
use crate::mcp::registry::{parse_arguments, McpTool, ToolBuilder, ToolCategory, ToolResult};

pub fn tools() -> Vec<Arc<dyn McpTool>> {
    vec![list_boards_tool(), get_board_tool()]
}

// ============================================================================
// list_boards
// ============================================================================

fn list_boards_tool() -> Arc<dyn McpTool> {
    ToolBuilder::new("list_boards")
        .description("List the kanban boards visible to the caller, with card counts")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {}
        }))
        .category(ToolCategory::Read)
        .build(list_boards_handler)
}

async fn list_boards_handler(ctx: ToolContext, _params: Value) -> ToolResult {
    let boards = ctx.boards.list_boards(ctx.user())?;
    Ok(ToolsCallResult::json(&serde_json::json!({
        "boards": boards,
        "total": boards.len(),
    }))?)
}

// ============================================================================
// get_board
// ============================================================================

#[derive(Debug, Deserialize)]
struct GetBoardParams {
    board_id: u64,
}

fn get_board_tool() -> Arc<dyn McpTool> {
    ToolBuilder::new("get_board")
        .description("Get a board with its columns and all of its cards")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "board_id": {
                    "type": "integer",
                    "description": "Board ID",
                    "minimum": 1
                }
            },
            "required": ["board_id"]
        }))
        .category(ToolCategory::Read)
        .build(get_board_handler)
}

async fn get_board_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: GetBoardParams = parse_arguments(params)?;
    let board = ctx.boards.get_board(ctx.user(), params.board_id)?;
    Ok(ToolsCallResult::json(&board)?)
}
