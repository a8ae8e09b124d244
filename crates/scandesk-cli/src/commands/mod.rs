//! CLI command definitions and dispatch.

pub mod add_user;
pub mod check_config;
pub mod run;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use scandesk_core::config::ScanConfig;
use scandesk_storage::{Database, DatabaseConfig};

use crate::console::OutputFormat;
use crate::settings;

/// Multi-scanner scan station with RFID login
#[derive(Debug, Parser)]
#[command(name = "scandesk", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: config/scandesk.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of plain text
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Notification and report format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start scanners, RFID login, and session assignment
    Run(run::RunArgs),
    /// Load and validate the configuration, then print it
    CheckConfig,
    /// Register a user and badge in the tag directory
    AddUser(add_user::AddUserArgs),
}

impl Cli {
    pub async fn execute(&self) -> anyhow::Result<()> {
        match &self.command {
            Commands::Run(args) => run::execute(args, self.config.as_deref(), self.format).await,
            Commands::CheckConfig => check_config::execute(self.config.as_deref(), self.format),
            Commands::AddUser(args) => {
                add_user::execute(args, self.config.as_deref(), self.format).await
            }
        }
    }
}

/// Load and validate the configuration.
pub(crate) fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<ScanConfig> {
    let config = settings::load(path).context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Open the SQLite database named in `config`, applying migrations.
pub(crate) async fn open_database(config: &ScanConfig) -> anyhow::Result<Database> {
    let path = &config.persistence.database_path;
    Database::new(DatabaseConfig::from(&config.persistence))
        .await
        .with_context(|| format!("failed to open database {path}"))
}
