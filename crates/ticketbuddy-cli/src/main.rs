//! TicketBuddy CLI - HTTP server, MCP adapter and maintenance commands.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ticketbuddy_core::{Config, Secrets};
use ticketbuddy_github::GitHubClient;
use ticketbuddy_mcp::{ApiClient, McpServer};
use ticketbuddy_server::AppState;
use ticketbuddy_storage::Store;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ticketbuddy")]
#[command(author, version, about = "TicketBuddy - ticket triage with a GitHub bridge", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "TICKETBUDDY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Run the MCP adapter on stdin/stdout
    Mcp {
        /// Base URL of the HTTP API (overrides TICKETBUDDY_API)
        #[arg(long)]
        api: Option<String>,
    },

    /// Refresh mirrors of the linked GitHub repository once
    Sync,

    /// Inspect or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Print a single value (e.g. `server.bind`)
    Get { key: String },

    /// Set a value and save the file
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mcp_mode = matches!(cli.command, Some(Commands::Mcp { .. }));
    init_logging(cli.verbose, mcp_mode);

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::config_path()?,
    };
    let secrets = Secrets::from_env();

    match cli.command {
        Some(Commands::Serve { bind }) => {
            let config = Config::load_from(&config_path)?;
            serve(&config, &secrets, bind).await?;
        }
        Some(Commands::Mcp { api }) => {
            let base = api.unwrap_or(secrets.api_base);
            info!(api = %base, "TicketBuddy MCP server running on stdio");
            McpServer::new(ApiClient::new(base)).run().await?;
        }
        Some(Commands::Sync) => {
            let config = Config::load_from(&config_path)?;
            sync(&config, &secrets).await?;
        }
        Some(Commands::Config { command }) => {
            print!("{}", run_config(command, &config_path)?);
        }
        None => {
            println!("TicketBuddy - ticket triage with a GitHub bridge");
            println!("Run with --help for usage information");
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `--verbose` picks debug over info. The MCP
/// adapter owns stdout, so its logs go to stderr.
fn init_logging(verbose: bool, mcp_mode: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if mcp_mode {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}

async fn serve(config: &Config, secrets: &Secrets, bind: Option<String>) -> anyhow::Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind))?;

    let store = Store::connect(config.database_path()?).await?;
    let state = AppState::from_config(store, config, secrets);

    ticketbuddy_server::serve(
        state,
        addr,
        Duration::from_secs(config.sync.interval_secs),
    )
    .await?;
    Ok(())
}

async fn sync(config: &Config, secrets: &Secrets) -> anyhow::Result<()> {
    let Some(token) = secrets.github_token.as_deref() else {
        bail!("GITHUB_TOKEN is not set");
    };

    let store = Store::connect(config.database_path()?).await?;
    let github = GitHubClient::with_base_url(config.github.api_url.clone(), token);

    match ticketbuddy_server::resync_linked_repository(&store, &github).await? {
        Some(report) => println!(
            "Synced {} pull requests and {} issues",
            report.pull_requests, report.issues
        ),
        None => println!("No repository linked"),
    }
    Ok(())
}

/// Execute a `config` subcommand and return what should be printed.
fn run_config(command: ConfigCommands, path: &Path) -> anyhow::Result<String> {
    match command {
        ConfigCommands::Show => {
            let config = Config::load_from(path)?;
            let contents = toml::to_string_pretty(&config)?;
            Ok(format!(
                "# {}\n{}\n# environment\n{:?}\n",
                path.display(),
                contents,
                Secrets::from_env()
            ))
        }
        ConfigCommands::Get { key } => {
            let config = Config::load_from(path)?;
            match config.get(&key)? {
                Some(value) => Ok(format!("{}\n", value)),
                None => Ok(format!("{} is not set\n", key)),
            }
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load_from(path)?;
            config.set(&key, &value)?;
            config.save_to(path)?;
            Ok(format!("Set {} = {}\n", key, value))
        }
    }
}
