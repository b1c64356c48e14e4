//! Board storage boundary.
//!
//! The MCP layer only reaches board data through [`BoardStore`]. Every
//! operation is scoped to the caller's identity; boards the caller cannot
//! see are reported as missing.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use anyhow::{anyhow, Context};
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::models::{Board, BoardSummary, BoardWithCards, Card, CardType, NewCard, UserIdentity};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("board {0} not found")]
    BoardNotFound(u64),

    #[error("card {0} not found")]
    CardNotFound(u64),

    #[error("column {column:?} does not exist on board {board_id}")]
    InvalidColumn { board_id: u64, column: String },

    #[error("invalid card: {0}")]
    InvalidCard(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait BoardStore: Send + Sync {
    /// Boards visible to `user`, ordered by id.
    fn list_boards(&self, user: Option<&UserIdentity>) -> StoreResult<Vec<BoardSummary>>;

    fn get_board(&self, user: Option<&UserIdentity>, board_id: u64) -> StoreResult<BoardWithCards>;

    fn list_cards(&self, user: Option<&UserIdentity>, board_id: u64) -> StoreResult<Vec<Card>>;

    fn get_card(&self, user: Option<&UserIdentity>, card_id: u64) -> StoreResult<Card>;

    /// Case-insensitive substring search over card titles and descriptions.
    fn search_cards(
        &self,
        user: Option<&UserIdentity>,
        query: &str,
        board_id: Option<u64>,
        limit: usize,
    ) -> StoreResult<Vec<Card>>;

    fn create_card(&self, user: Option<&UserIdentity>, card: NewCard) -> StoreResult<Card>;

    fn move_card(&self, user: Option<&UserIdentity>, card_id: u64, column: &str) -> StoreResult<Card>;
}

// ============================================================================
// Seed file
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub boards: Vec<SeedBoard>,
}

#[derive(Debug, Deserialize)]
pub struct SeedBoard {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub cards: Vec<SeedCard>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCard {
    pub column: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub card_type: CardType,
}

// ============================================================================
// In-memory implementation
// ============================================================================

#[derive(Debug, Default)]
struct StoreState {
    boards: BTreeMap<u64, Board>,
    cards: BTreeMap<u64, Card>,
    next_card_id: u64,
}

impl StoreState {
    fn visible_board(&self, user: Option<&UserIdentity>, board_id: u64) -> StoreResult<&Board> {
        self.boards
            .get(&board_id)
            .filter(|b| b.is_visible_to(user))
            .ok_or(StoreError::BoardNotFound(board_id))
    }

    fn cards_of(&self, board: &Board) -> Vec<Card> {
        let mut cards: Vec<Card> = self
            .cards
            .values()
            .filter(|c| c.board_id == board.id)
            .cloned()
            .collect();
        let column_pos = |c: &Card| board.columns.iter().position(|col| col == &c.column);
        cards.sort_by_key(|c| (column_pos(c), c.id));
        cards
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBoardStore {
    state: RwLock<StoreState>,
}

impl InMemoryBoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedFile) -> StoreResult<Self> {
        let now = Utc::now();
        let mut state = StoreState {
            next_card_id: 1,
            ..Default::default()
        };

        for seed_board in seed.boards {
            if seed_board.columns.is_empty() {
                return Err(StoreError::InvalidCard(format!(
                    "board {} has no columns",
                    seed_board.id
                )));
            }
            let board = Board {
                id: seed_board.id,
                name: seed_board.name,
                description: seed_board.description,
                columns: seed_board.columns,
                members: seed_board.members,
                created_at: now,
            };
            for seed_card in seed_board.cards {
                if !board.has_column(&seed_card.column) {
                    return Err(StoreError::InvalidColumn {
                        board_id: board.id,
                        column: seed_card.column,
                    });
                }
                let id = state.next_card_id;
                state.next_card_id += 1;
                state.cards.insert(
                    id,
                    Card {
                        id,
                        board_id: board.id,
                        column: seed_card.column,
                        title: seed_card.title,
                        description: seed_card.description,
                        card_type: seed_card.card_type,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
            state.boards.insert(board.id, board);
        }

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read boards file {}", path.display()))?;
        let seed: SeedFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse boards file {}", path.display()))?;
        let store = Self::from_seed(seed)?;
        info!("Loaded {} boards from {}", store.board_count(), path.display());
        Ok(store)
    }

    pub fn board_count(&self) -> usize {
        self.state.read().map(|s| s.boards.len()).unwrap_or(0)
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend(anyhow!("board store lock poisoned")))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend(anyhow!("board store lock poisoned")))
    }
}

impl BoardStore for InMemoryBoardStore {
    fn list_boards(&self, user: Option<&UserIdentity>) -> StoreResult<Vec<BoardSummary>> {
        let state = self.read()?;
        Ok(state
            .boards
            .values()
            .filter(|b| b.is_visible_to(user))
            .map(|b| BoardSummary {
                id: b.id,
                name: b.name.clone(),
                description: b.description.clone(),
                card_count: state.cards.values().filter(|c| c.board_id == b.id).count(),
            })
            .collect())
    }

    fn get_board(&self, user: Option<&UserIdentity>, board_id: u64) -> StoreResult<BoardWithCards> {
        let state = self.read()?;
        let board = state.visible_board(user, board_id)?;
        Ok(BoardWithCards {
            board: board.clone(),
            cards: state.cards_of(board),
        })
    }

    fn list_cards(&self, user: Option<&UserIdentity>, board_id: u64) -> StoreResult<Vec<Card>> {
        let state = self.read()?;
        let board = state.visible_board(user, board_id)?;
        Ok(state.cards_of(board))
    }

    fn get_card(&self, user: Option<&UserIdentity>, card_id: u64) -> StoreResult<Card> {
        let state = self.read()?;
        state
            .cards
            .get(&card_id)
            .filter(|c| {
                state
                    .boards
                    .get(&c.board_id)
                    .is_some_and(|b| b.is_visible_to(user))
            })
            .cloned()
            .ok_or(StoreError::CardNotFound(card_id))
    }

    fn search_cards(
        &self,
        user: Option<&UserIdentity>,
        query: &str,
        board_id: Option<u64>,
        limit: usize,
    ) -> StoreResult<Vec<Card>> {
        let state = self.read()?;
        if let Some(board_id) = board_id {
            state.visible_board(user, board_id)?;
        }
        let needle = query.to_lowercase();
        Ok(state
            .cards
            .values()
            .filter(|c| board_id.map_or(true, |id| c.board_id == id))
            .filter(|c| {
                state
                    .boards
                    .get(&c.board_id)
                    .is_some_and(|b| b.is_visible_to(user))
            })
            .filter(|c| c.matches(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    fn create_card(&self, user: Option<&UserIdentity>, new_card: NewCard) -> StoreResult<Card> {
        let title = new_card.title.trim();
        if title.is_empty() {
            return Err(StoreError::InvalidCard("title must not be empty".to_string()));
        }

        let mut state = self.write()?;
        let board = state.visible_board(user, new_card.board_id)?;
        let column = match new_card.column {
            Some(column) if board.has_column(&column) => column,
            Some(column) => {
                return Err(StoreError::InvalidColumn {
                    board_id: board.id,
                    column,
                })
            }
            None => board.columns.first().cloned().ok_or_else(|| {
                StoreError::InvalidCard(format!("board {} has no columns", board.id))
            })?,
        };

        let now = Utc::now();
        let id = state.next_card_id.max(1);
        state.next_card_id = id + 1;
        let card = Card {
            id,
            board_id: new_card.board_id,
            column,
            title: title.to_string(),
            description: new_card.description.unwrap_or_default(),
            card_type: new_card.card_type,
            created_at: now,
            updated_at: now,
        };
        state.cards.insert(id, card.clone());
        Ok(card)
    }

    fn move_card(&self, user: Option<&UserIdentity>, card_id: u64, column: &str) -> StoreResult<Card> {
        let mut state = self.write()?;
        let board_id = state
            .cards
            .get(&card_id)
            .map(|c| c.board_id)
            .ok_or(StoreError::CardNotFound(card_id))?;
        let board = state
            .visible_board(user, board_id)
            .map_err(|_| StoreError::CardNotFound(card_id))?;
        if !board.has_column(column) {
            return Err(StoreError::InvalidColumn {
                board_id,
                column: column.to_string(),
            });
        }

        let card = state
            .cards
            .get_mut(&card_id)
            .ok_or(StoreError::CardNotFound(card_id))?;
        card.column = column.to_string();
        card.updated_at = Utc::now();
        Ok(card.clone())
    }
}
