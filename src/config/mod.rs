mod file_config;

pub use file_config::{FileConfig, McpFileConfig, RateLimitFileConfig};

use crate::mcp::rate_limit::RateLimitConfig;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// How MCP connections prove who they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AuthType {
    /// Every connection is accepted anonymously.
    #[default]
    None,
    /// A shared token must be presented at handshake.
    Token,
}

/// Settings applied to a connection at handshake time. A connection keeps
/// the snapshot it was accepted with for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub enabled: bool,
    pub auth_type: AuthType,
    pub token: Option<String>,
    /// Identity bound to token-authenticated connections.
    pub token_user: Option<String>,
    /// `None` enables every tool.
    pub enabled_tools: Option<HashSet<String>>,
    /// `None` enables every resource.
    pub enabled_resources: Option<HashSet<String>>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth_type: AuthType::None,
            token: None,
            token_user: None,
            enabled_tools: None,
            enabled_resources: None,
        }
    }
}

/// Shared, reloadable MCP settings.
#[derive(Debug, Clone, Default)]
pub struct McpSettingsHandle(Arc<RwLock<ConnectionConfig>>);

impl McpSettingsHandle {
    pub fn new(config: ConnectionConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    pub fn snapshot(&self) -> ConnectionConfig {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn replace(&self, config: ConnectionConfig) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub port: u16,
    pub bind_address: String,
    pub boards_file: Option<PathBuf>,
    pub auth_type: AuthType,
    pub mcp_token: Option<String>,
    pub token_user: Option<String>,
    pub disable_mcp: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub bind_address: String,
    pub boards_file: Option<PathBuf>,
    pub mcp: ConnectionConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);
        let bind_address = file
            .bind_address
            .unwrap_or_else(|| cli.bind_address.clone());
        if bind_address.trim().is_empty() {
            bail!("bind_address must not be empty");
        }

        let boards_file = file
            .boards_file
            .map(PathBuf::from)
            .or_else(|| cli.boards_file.clone());
        if let Some(path) = &boards_file {
            if !path.is_file() {
                bail!("Boards file does not exist: {:?}", path);
            }
        }

        let mcp = resolve_connection_config(cli, file.mcp)?;

        let defaults = RateLimitConfig::default();
        let rl_file = file.rate_limit.unwrap_or_default();
        let rate_limit = RateLimitConfig {
            read_per_minute: rl_file.read_per_minute.unwrap_or(defaults.read_per_minute),
            write_per_minute: rl_file.write_per_minute.unwrap_or(defaults.write_per_minute),
            generate_per_minute: rl_file
                .generate_per_minute
                .unwrap_or(defaults.generate_per_minute),
        };

        Ok(Self {
            port,
            bind_address,
            boards_file,
            mcp,
            rate_limit,
        })
    }
}

/// Resolve the `[mcp]` section over the CLI flags. Also used when the
/// settings are reloaded at runtime.
pub fn resolve_connection_config(
    cli: &CliConfig,
    file_mcp: Option<McpFileConfig>,
) -> Result<ConnectionConfig> {
    let file = file_mcp.unwrap_or_default();

    let enabled = file.enabled.unwrap_or(!cli.disable_mcp);
    let auth_type = match file.auth_type {
        Some(s) => match parse_auth_type(&s) {
            Some(auth_type) => auth_type,
            None => bail!("Unknown MCP auth_type: {:?} (expected \"none\" or \"token\")", s),
        },
        None => cli.auth_type,
    };
    let token = file
        .token
        .or_else(|| cli.mcp_token.clone())
        .filter(|t| !t.is_empty());
    let token_user = file.token_user.or_else(|| cli.token_user.clone());

    if auth_type == AuthType::Token && token.is_none() {
        bail!("MCP auth_type \"token\" requires a token (--mcp-token or [mcp].token)");
    }

    Ok(ConnectionConfig {
        enabled,
        auth_type,
        token,
        token_user,
        enabled_tools: file.enabled_tools.map(|v| v.into_iter().collect()),
        enabled_resources: file.enabled_resources.map(|v| v.into_iter().collect()),
    })
}

/// Uses clap's ValueEnum trait for parsing.
fn parse_auth_type(s: &str) -> Option<AuthType> {
    AuthType::from_str(s, true).ok()
}
