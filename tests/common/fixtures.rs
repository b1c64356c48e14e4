//! Test fixtures: seeded boards and stand-in text generators.

use async_trait::async_trait;
use kanban_mcp_server::kanban::{
    GenerationError, GenerationOptions, InMemoryBoardStore, SeedFile, TextGenerator,
};

/// Two boards: a public one with three cards and a private one with a single
/// card, visible only to `alice`.
pub fn seeded_store() -> InMemoryBoardStore {
    let seed: SeedFile = serde_json::from_value(serde_json::json!({
        "boards": [
            {
                "id": 1,
                "name": "Roadmap",
                "description": "Product roadmap",
                "columns": ["Todo", "Doing", "Done"],
                "cards": [
                    {
                        "column": "Todo",
                        "title": "Design login page",
                        "description": "Mockups for the new login flow",
                        "card_type": "feature"
                    },
                    {
                        "column": "Doing",
                        "title": "Fix crash on save",
                        "description": "Saving an empty board crashes",
                        "card_type": "bug"
                    },
                    {
                        "column": "Done",
                        "title": "Release notes",
                        "card_type": "note"
                    }
                ]
            },
            {
                "id": 2,
                "name": "Private",
                "columns": ["Inbox"],
                "members": ["alice"],
                "cards": [
                    { "column": "Inbox", "title": "Secret plan" }
                ]
            }
        ]
    }))
    .expect("Invalid seed fixture");
    InMemoryBoardStore::from_seed(seed).expect("Failed to build seeded store")
}

/// Generator that answers with a fixed prefix followed by the prompt.
pub struct FakeGenerator;

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        Ok(format!("GENERATED: {}", prompt))
    }
}

/// Generator whose provider error carries a secret that must never reach
/// the client.
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Provider(
            "upstream rejected api key sk-hunter2".to_string(),
        ))
    }
}
