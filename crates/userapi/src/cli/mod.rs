mod migrate;
mod serve;

pub use migrate::MigrateCommand;
pub use serve::ServeCommand;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use userapi_core::config::{AppConfig, LogFormat};

/// userapi - user records service and schema migration tool
#[derive(Parser)]
#[command(name = "userapi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "userapi.toml", global = true)]
    pub config: PathBuf,

    /// Migrations directory (overrides the config file).
    #[arg(long, global = true)]
    pub migrations_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server.
    Serve(ServeCommand),

    /// Manage database migrations.
    Migrate(MigrateCommand),
}

/// Options shared by every command.
pub struct GlobalArgs {
    pub config: PathBuf,
    pub migrations_dir: Option<PathBuf>,
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        // Load .env if present
        dotenvy::dotenv().ok();

        let globals = GlobalArgs {
            config: self.config,
            migrations_dir: self.migrations_dir,
        };
        match self.command {
            Commands::Serve(cmd) => cmd.execute(&globals).await,
            Commands::Migrate(cmd) => cmd.execute(&globals).await,
        }
    }
}

/// Load the config file, falling back to `DATABASE_URL` when it is absent.
///
/// Returns `Ok(None)` when neither is available.
pub fn load_config(path: &Path) -> Result<Option<AppConfig>> {
    if path.exists() {
        return Ok(Some(AppConfig::from_file(path)?));
    }
    match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => Ok(Some(AppConfig::default_with_database_url(&url))),
        _ => Ok(None),
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    if let Err(e) = result {
        eprintln!("Tracing already initialized: {}", e);
    }
}
