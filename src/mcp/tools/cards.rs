//! Card Tools
//!
//! Searching, creating and moving cards.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kanban::{Card, NewCard};
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::ToolsCallResult;
use crate::mcp::registry::{
    parse_arguments, CapabilityError, McpTool, ToolBuilder, ToolCategory, ToolResult,
};

pub fn tools() -> Vec<Arc<dyn McpTool>> {
    vec![search_cards_tool(), create_card_tool(), move_card_tool()]
}

// ============================================================================
// search_cards
// ============================================================================

const MAX_SEARCH_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchCardsParams {
    query: String,
    #[serde(default)]
    board_id: Option<u64>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
struct SearchCardsResult {
    cards: Vec<Card>,
    total: usize,
}

fn search_cards_tool() -> Arc<dyn McpTool> {
    ToolBuilder::new("search_cards")
        .description("Search card titles and descriptions (case-insensitive) across visible boards")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to look for"
                },
                "board_id": {
                    "type": "integer",
                    "description": "Restrict the search to one board"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of cards (default 20)",
                    "minimum": 1,
                    "maximum": 100
                }
            },
            "required": ["query"]
        }))
        .category(ToolCategory::Read)
        .build(search_cards_handler)
}

async fn search_cards_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: SearchCardsParams = parse_arguments(params)?;
    if params.query.trim().is_empty() {
        return Err(CapabilityError::InvalidArguments(
            "query must not be empty".to_string(),
        ));
    }
    let limit = params.limit.clamp(1, MAX_SEARCH_LIMIT);

    let cards = ctx
        .boards
        .search_cards(ctx.user(), params.query.trim(), params.board_id, limit)?;
    let total = cards.len();
    Ok(ToolsCallResult::json(&SearchCardsResult { cards, total })?)
}

// ============================================================================
// create_card
// ============================================================================

fn create_card_tool() -> Arc<dyn McpTool> {
    ToolBuilder::new("create_card")
        .description("Create a card on a board. Defaults to the board's first column and type 'task'")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "board_id": {
                    "type": "integer",
                    "description": "Board to add the card to"
                },
                "title": {
                    "type": "string",
                    "description": "Card title"
                },
                "column": {
                    "type": "string",
                    "description": "Column name (default: first column)"
                },
                "description": {
                    "type": "string",
                    "description": "Card body"
                },
                "card_type": {
                    "type": "string",
                    "enum": ["task", "bug", "feature", "note"]
                }
            },
            "required": ["board_id", "title"]
        }))
        .category(ToolCategory::Write)
        .build(create_card_handler)
}

async fn create_card_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let new_card: NewCard = parse_arguments(params)?;
    let card = ctx.boards.create_card(ctx.user(), new_card)?;
    Ok(ToolsCallResult::json(&card)?)
}

// ============================================================================
// move_card
// ============================================================================

#[derive(Debug, Deserialize)]
struct MoveCardParams {
    card_id: u64,
    column: String,
}

fn move_card_tool() -> Arc<dyn McpTool> {
    ToolBuilder::new("move_card")
        .description("Move a card to another column of its board")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "card_id": {
                    "type": "integer",
                    "description": "Card ID"
                },
                "column": {
                    "type": "string",
                    "description": "Target column name"
                }
            },
            "required": ["card_id", "column"]
        }))
        .category(ToolCategory::Write)
        .build(move_card_handler)
}

async fn move_card_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: MoveCardParams = parse_arguments(params)?;
    let card = ctx
        .boards
        .move_card(ctx.user(), params.card_id, &params.column)?;
    Ok(ToolsCallResult::json(&card)?)
}
