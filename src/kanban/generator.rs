//! Text generation boundary used by the AI tools.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Options for a single generation request.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: Option<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.3,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation is not configured")]
    Unavailable,

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider error: {0}")]
    Provider(String),
}

/// Something that turns a prompt into text (an LLM provider in production).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;
}

/// Generator used when no provider is configured. Always fails.
#[derive(Debug, Default)]
pub struct UnconfiguredGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Unavailable)
    }
}
