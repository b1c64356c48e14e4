//! Board Resources
//!
//! Read-only views of boards and cards addressed by `kanban://` URIs.

use std::sync::Arc;

use crate::mcp::context::ToolContext;
use crate::mcp::protocol::ResourceContent;
use crate::mcp::registry::{parse_id_param, McpResource, ResourceBuilder, ResourceResult};
use crate::mcp::uri_template::{UriParams, UriTemplateError};

/// Board resources in match order.
pub fn resources() -> Result<Vec<Arc<dyn McpResource>>, UriTemplateError> {
    Ok(vec![
        ResourceBuilder::new("kanban://boards", "boards")
            .description("Summaries of every board visible to the caller")
            .build(boards_handler)?,
        ResourceBuilder::new("kanban://boards/{board_id}", "board")
            .description("A board with its columns and cards")
            .build(board_handler)?,
        ResourceBuilder::new("kanban://boards/{board_id}/cards", "board_cards")
            .description("The cards of one board, ordered by column")
            .build(board_cards_handler)?,
        ResourceBuilder::new("kanban://cards/{card_id}", "card")
            .description("A single card")
            .build(card_handler)?,
    ])
}

async fn boards_handler(ctx: ToolContext, uri: String, _params: UriParams) -> ResourceResult {
    let boards = ctx.boards.list_boards(ctx.user())?;
    Ok(ResourceContent::json(uri, &boards)?)
}

async fn board_handler(ctx: ToolContext, uri: String, params: UriParams) -> ResourceResult {
    let board_id = parse_id_param(&params, "board_id", &uri)?;
    let board = ctx.boards.get_board(ctx.user(), board_id)?;
    Ok(ResourceContent::json(uri, &board)?)
}

async fn board_cards_handler(ctx: ToolContext, uri: String, params: UriParams) -> ResourceResult {
    let board_id = parse_id_param(&params, "board_id", &uri)?;
    let cards = ctx.boards.list_cards(ctx.user(), board_id)?;
    Ok(ResourceContent::json(uri, &cards)?)
}

async fn card_handler(ctx: ToolContext, uri: String, params: UriParams) -> ResourceResult {
    let card_id = parse_id_param(&params, "card_id", &uri)?;
    let card = ctx.boards.get_card(ctx.user(), card_id)?;
    Ok(ResourceContent::json(uri, &card)?)
}
