//! Kanban domain collaborators consumed by the MCP layer.
//!
//! Persistence and text generation live behind narrow traits so the
//! protocol layer never depends on a concrete backend.

pub mod generator;
pub mod models;
pub mod store;

pub use generator::{GenerationError, GenerationOptions, TextGenerator, UnconfiguredGenerator};
pub use models::{Board, BoardSummary, BoardWithCards, Card, CardType, NewCard, UserIdentity};
pub use store::{BoardStore, InMemoryBoardStore, SeedFile, StoreError, StoreResult};
