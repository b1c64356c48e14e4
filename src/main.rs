use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kanban_mcp_server::config::{self, AuthType};
use kanban_mcp_server::kanban::{BoardStore, InMemoryBoardStore, UnconfiguredGenerator};
use kanban_mcp_server::mcp::McpRegistry;
use kanban_mcp_server::server::{metrics, run_server, ServerState};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The address to bind to.
    #[clap(long, default_value = "127.0.0.1")]
    pub bind_address: String,

    /// JSON file with the boards to serve. Without it the server starts empty.
    #[clap(long, value_parser = parse_path)]
    pub boards_file: Option<PathBuf>,

    /// How MCP clients authenticate.
    #[clap(long, value_enum, default_value = "none")]
    pub auth_type: AuthType,

    /// Shared token for `--auth-type token`.
    #[clap(long, env = "KANBAN_MCP_TOKEN", hide_env_values = true)]
    pub mcp_token: Option<String>,

    /// User the token-authenticated connections act as.
    #[clap(long)]
    pub token_user: Option<String>,

    /// Refuse all MCP connections.
    #[clap(long)]
    pub disable_mcp: bool,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            port: args.port,
            bind_address: args.bind_address.clone(),
            boards_file: args.boards_file.clone(),
            auth_type: args.auth_type,
            mcp_token: args.mcp_token.clone(),
            token_user: args.token_user.clone(),
            disable_mcp: args.disable_mcp,
        }
    }
}

fn load_file_config(path: Option<&PathBuf>) -> Result<Option<config::FileConfig>> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Ok(Some(config::FileConfig::load(path)?))
        }
        None => Ok(None),
    }
}

/// Re-read the `[mcp]` section on SIGHUP. Open connections keep the settings
/// they were admitted with.
#[cfg(unix)]
fn spawn_settings_reload(
    config_path: Option<PathBuf>,
    cli_config: config::CliConfig,
    settings: config::McpSettingsHandle,
) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::{error, warn};

    let mut hangups = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            let Some(path) = config_path.as_ref() else {
                warn!("SIGHUP received but no --config file was given, nothing to reload");
                continue;
            };
            let reloaded = config::FileConfig::load(path)
                .and_then(|file| config::resolve_connection_config(&cli_config, file.mcp));
            match reloaded {
                Ok(mcp) => {
                    info!(
                        "Reloaded MCP settings: enabled={}, auth={:?}",
                        mcp.enabled, mcp.auth_type
                    );
                    settings.replace(mcp);
                }
                Err(e) => error!("Failed to reload MCP settings, keeping current: {:#}", e),
            }
        }
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = load_file_config(cli_args.config.as_ref())?;

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  bind: {}:{}", app_config.bind_address, app_config.port);
    info!("  boards_file: {:?}", app_config.boards_file);
    info!(
        "  mcp: enabled={}, auth={:?}",
        app_config.mcp.enabled, app_config.mcp.auth_type
    );

    info!("Initializing metrics...");
    metrics::init_metrics();

    let boards: Arc<dyn BoardStore> = match &app_config.boards_file {
        Some(path) => Arc::new(InMemoryBoardStore::load(path)?),
        None => {
            info!("No boards file given, starting with an empty store");
            Arc::new(InMemoryBoardStore::new())
        }
    };

    let registry = Arc::new(McpRegistry::with_defaults()?);
    info!(
        "Registered {} MCP tools and {} MCP resources",
        registry.tool_count(),
        registry.resource_count()
    );

    let state = ServerState::new(
        &app_config,
        registry,
        boards,
        Arc::new(UnconfiguredGenerator),
    );

    #[cfg(unix)]
    spawn_settings_reload(
        cli_args.config.clone(),
        cli_config,
        state.mcp_settings.clone(),
    )?;

    run_server(state, &app_config.bind_address, app_config.port).await
}
