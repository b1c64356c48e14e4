use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub boards_file: Option<String>,

    // Feature configs
    pub mcp: Option<McpFileConfig>,
    pub rate_limit: Option<RateLimitFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct McpFileConfig {
    pub enabled: Option<bool>,
    /// "none" or "token"
    pub auth_type: Option<String>,
    pub token: Option<String>,
    pub token_user: Option<String>,
    /// Omitted means every tool is enabled.
    pub enabled_tools: Option<Vec<String>>,
    /// Omitted means every resource is enabled.
    pub enabled_resources: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RateLimitFileConfig {
    pub read_per_minute: Option<u32>,
    pub write_per_minute: Option<u32>,
    pub generate_per_minute: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
