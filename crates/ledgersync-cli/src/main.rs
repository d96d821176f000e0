//! Ledgersync CLI - Command-line interface for the Xero sync pipeline
//!
//! Provides commands for:
//! - Connecting to Xero (OAuth2 with PKCE)
//! - Running a chunked sync to completion
//! - Enriching synced invoices with work descriptions
//! - Inspecting and clearing local state
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ledgersync_core::config::Config;

mod commands;
mod context;
mod output;

use commands::{
    auth::AuthCommand, clear::ClearCommand, config::ConfigCommand, enrich::EnrichCommand,
    status::StatusCommand, sync::SyncCommand,
};
use context::{config_path, load_config};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "ledgersync", version, about = "Sync Xero records into a local store")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Connect to or disconnect from Xero
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Sync customers, invoices and bank transactions
    Sync(SyncCommand),
    /// Generate work descriptions and keywords for synced invoices
    Enrich(EnrichCommand),
    /// Show record counts, pending enrichment and sync cursors
    Status(StatusCommand),
    /// Delete synced records and cursors
    Clear(ClearCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = config_path(cli.config.as_deref());
    // `config init --force` must be able to replace an unreadable file
    let config = match (&cli.command, load_config(&path)) {
        (_, Ok(config)) => config,
        (Commands::Config(ConfigCommand::Init { force: true }), Err(_)) => Config::default(),
        (_, Err(e)) => return Err(e),
    };

    let level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let format = OutputFormat::from_flag(cli.json);

    match cli.command {
        Commands::Auth(cmd) => cmd.execute(config, format).await,
        Commands::Sync(cmd) => cmd.execute(config, format).await,
        Commands::Enrich(cmd) => cmd.execute(config, format).await,
        Commands::Status(cmd) => cmd.execute(config, format).await,
        Commands::Clear(cmd) => cmd.execute(config, format).await,
        Commands::Config(cmd) => cmd.execute(config, &path, format).await,
    }
}
