//! AI Tools
//!
//! Tools that delegate to the configured text generator. The prompt is
//! assembled here from board data; the generator only sees text.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::kanban::{BoardWithCards, CardType, GenerationOptions};
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{ToolDefinition, ToolsCallResult};
use crate::mcp::registry::{parse_arguments, McpTool, ToolCategory, ToolResult};

/// Cards beyond this are left out of the summary prompt.
const MAX_PROMPT_CARDS: usize = 200;

pub fn tools() -> Vec<Arc<dyn McpTool>> {
    vec![
        Arc::new(SummarizeBoardTool::default()),
        Arc::new(DraftCardDescriptionTool::default()),
    ]
}

// ============================================================================
// summarize_board
// ============================================================================

#[derive(Debug, Deserialize)]
struct SummarizeBoardParams {
    board_id: u64,
}

pub struct SummarizeBoardTool {
    options: GenerationOptions,
}

impl Default for SummarizeBoardTool {
    fn default() -> Self {
        Self {
            options: GenerationOptions {
                max_tokens: 400,
                temperature: 0.2,
                system_prompt: Some(
                    "You summarize kanban boards for a project team. Be concise and factual."
                        .to_string(),
                ),
            },
        }
    }
}

#[async_trait]
impl McpTool for SummarizeBoardTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "summarize_board",
            "Summarize the state of a board: progress per column, blockers and notable cards",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "board_id": {
                        "type": "integer",
                        "description": "Board ID"
                    }
                },
                "required": ["board_id"]
            }),
        )
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Generate
    }

    async fn invoke(&self, ctx: &ToolContext, arguments: Value) -> ToolResult {
        let params: SummarizeBoardParams = parse_arguments(arguments)?;
        let board = ctx.boards.get_board(ctx.user(), params.board_id)?;
        let prompt = board_summary_prompt(&board);
        debug!(
            "summarize_board: {} cards, prompt {} bytes, generator {}",
            board.cards.len(),
            prompt.len(),
            ctx.generator.name()
        );

        let summary = ctx.generator.generate(&prompt, &self.options).await?;
        Ok(ToolsCallResult::text(summary))
    }
}

fn board_summary_prompt(board: &BoardWithCards) -> String {
    let mut prompt = format!("Board: {}\n", board.board.name);
    if !board.board.description.is_empty() {
        let _ = writeln!(prompt, "Description: {}", board.board.description);
    }

    for column in &board.board.columns {
        let cards: Vec<_> = board
            .cards
            .iter()
            .filter(|c| &c.column == column)
            .take(MAX_PROMPT_CARDS)
            .collect();
        let _ = writeln!(prompt, "\n## {} ({} cards)", column, cards.len());
        for card in cards {
            let _ = writeln!(prompt, "- [{}] {}", card.card_type, card.title);
        }
    }

    prompt.push_str("\nSummarize progress, risks and what should happen next.");
    prompt
}

// ============================================================================
// draft_card_description
// ============================================================================

#[derive(Debug, Deserialize)]
struct DraftCardDescriptionParams {
    title: String,
    #[serde(default)]
    card_type: CardType,
    #[serde(default)]
    context: Option<String>,
}

pub struct DraftCardDescriptionTool {
    options: GenerationOptions,
}

impl Default for DraftCardDescriptionTool {
    fn default() -> Self {
        Self {
            options: GenerationOptions {
                max_tokens: 300,
                temperature: 0.5,
                system_prompt: Some(
                    "You write clear, actionable kanban card descriptions.".to_string(),
                ),
            },
        }
    }
}

#[async_trait]
impl McpTool for DraftCardDescriptionTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "draft_card_description",
            "Draft a description for a new card from its title",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Card title"
                    },
                    "card_type": {
                        "type": "string",
                        "enum": ["task", "bug", "feature", "note"]
                    },
                    "context": {
                        "type": "string",
                        "description": "Extra background for the draft"
                    }
                },
                "required": ["title"]
            }),
        )
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Generate
    }

    async fn invoke(&self, ctx: &ToolContext, arguments: Value) -> ToolResult {
        let params: DraftCardDescriptionParams = parse_arguments(arguments)?;
        let prompt = draft_prompt(&params);
        let draft = ctx.generator.generate(&prompt, &self.options).await?;
        Ok(ToolsCallResult::text(draft))
    }
}

fn draft_prompt(params: &DraftCardDescriptionParams) -> String {
    let guidance = match params.card_type {
        CardType::Bug => "Include steps to reproduce, expected and actual behaviour.",
        CardType::Feature => "Describe the user value and acceptance criteria.",
        CardType::Task => "List the concrete steps needed to finish it.",
        CardType::Note => "Keep it short.",
    };
    let mut prompt = format!(
        "Write a description for a {} card titled \"{}\". {}",
        params.card_type, params.title, guidance
    );
    if let Some(context) = params.context.as_deref().filter(|c| !c.is_empty()) {
        let _ = write!(prompt, "\nContext: {context}");
    }
    prompt
}
