//! Board and card models shared between the store and the MCP layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the principal behind a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    #[default]
    Task,
    Bug,
    Feature,
    Note,
}

impl CardType {
    pub const ALL: [CardType; 4] = [
        CardType::Task,
        CardType::Bug,
        CardType::Feature,
        CardType::Note,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Task => "task",
            CardType::Bug => "bug",
            CardType::Feature => "feature",
            CardType::Note => "note",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "task" => Ok(CardType::Task),
            "bug" => Ok(CardType::Bug),
            "feature" => Ok(CardType::Feature),
            "note" => Ok(CardType::Note),
            other => Err(format!("unknown card type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub columns: Vec<String>,
    /// Empty means the board is public.
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Board {
    pub fn is_visible_to(&self, user: Option<&UserIdentity>) -> bool {
        if self.members.is_empty() {
            return true;
        }
        user.is_some_and(|u| self.members.iter().any(|m| m == &u.id))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: u64,
    pub board_id: u64,
    pub column: String,
    pub title: String,
    pub description: String,
    pub card_type: CardType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn matches(&self, needle_lowercase: &str) -> bool {
        self.title.to_lowercase().contains(needle_lowercase)
            || self.description.to_lowercase().contains(needle_lowercase)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSummary {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub card_count: usize,
}

/// A board together with its cards, ordered by column then id.
#[derive(Debug, Clone, Serialize)]
pub struct BoardWithCards {
    #[serde(flatten)]
    pub board: Board,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCard {
    pub board_id: u64,
    pub title: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub card_type: CardType,
}
