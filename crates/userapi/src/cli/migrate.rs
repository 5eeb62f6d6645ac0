use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use console::style;

use userapi_core::config::{DatabaseConfig, LogFormat, LoggingConfig, MigrationsConfig};
use userapi_runtime::migrations::{
    create_migration, load_migrations, MigrationEvent, MigrationRunner, MigrationState, Outcome,
    PgMigrationLog, RunFailure, RunReport,
};
use userapi_runtime::Database;

use super::{init_tracing, load_config, GlobalArgs};

/// Manage database migrations.
#[derive(Parser)]
pub struct MigrateCommand {
    #[command(subcommand)]
    pub action: MigrateAction,
}

#[derive(Subcommand)]
pub enum MigrateAction {
    /// Apply all pending migrations.
    Up,

    /// Roll back applied migrations, newest first.
    Down {
        /// Roll back at most this many migrations (default: all).
        #[arg(long)]
        steps: Option<usize>,
    },

    /// Show applied and pending migrations.
    Status,

    /// Create a new up/down migration pair.
    Create {
        /// Migration name, e.g. add_users_index.
        name: String,
    },
}

/// Everything a migrate action needs, resolved once from flags and config.
pub struct MigrateContext {
    pub migrations_dir: PathBuf,
    pub table: String,
    pub database: Option<DatabaseConfig>,
    pub logging: LoggingConfig,
}

/// Log level used when there is no config file to read `[logging]` from.
const DEFAULT_LOG_LEVEL: &str = "warn";

impl MigrateContext {
    pub fn resolve(globals: &GlobalArgs) -> Result<Self> {
        let config = load_config(&globals.config)?;

        let logging = match &config {
            Some(c) if globals.config.exists() => c.logging.clone(),
            _ => LoggingConfig {
                level: DEFAULT_LOG_LEVEL.to_string(),
                format: LogFormat::Pretty,
            },
        };

        let migrations = config
            .as_ref()
            .map(|c| c.migrations.clone())
            .unwrap_or_default();
        let MigrationsConfig { directory, table } = migrations;

        Ok(Self {
            migrations_dir: globals.migrations_dir.clone().unwrap_or(directory),
            table,
            database: config.map(|c| c.database),
            logging,
        })
    }

    async fn runner(&self) -> Result<MigrationRunner<PgMigrationLog>> {
        let Some(database) = &self.database else {
            anyhow::bail!(
                "No database configured: create userapi.toml with a [database] section or set DATABASE_URL"
            );
        };
        let db = Database::from_config(database)
            .await
            .context("Failed to connect to database")?;
        let log = PgMigrationLog::with_table(db.pool().clone(), self.table.clone());
        Ok(MigrationRunner::new(log))
    }
}

impl MigrateCommand {
    pub async fn execute(self, globals: &GlobalArgs) -> Result<()> {
        let ctx = MigrateContext::resolve(globals)?;
        init_tracing(&ctx.logging.level, ctx.logging.format);

        match self.action {
            MigrateAction::Up => migrate_up(&ctx).await,
            MigrateAction::Down { steps } => migrate_down(&ctx, steps).await,
            MigrateAction::Status => migrate_status(&ctx).await,
            MigrateAction::Create { name } => migrate_create(&ctx, &name),
        }
    }
}

fn print_header(title: &str) {
    println!();
    println!("  {} {}", style("userapi").bold().cyan(), title);
    println!();
}

fn print_event(event: &MigrationEvent) {
    let label = format!("{} ({})", event.version, event.name);
    match event.outcome {
        Outcome::Applied => println!("  {} Applied {}", style("✓").green(), label),
        Outcome::RolledBack => println!("  {} Rolled back {}", style("✓").green(), label),
        Outcome::AlreadyApplied => {
            println!("  {} {}", style("-").dim(), style(format!("{} already applied", label)).dim())
        }
        Outcome::Skipped => {
            println!("  {} {}", style("-").dim(), style(format!("{} skipped", label)).dim())
        }
    }
}

/// Print the outcome of a run. A failed run becomes an error so the process
/// exits non-zero.
fn finish(
    result: std::result::Result<RunReport, RunFailure>,
    verb: &str,
    done: &str,
) -> Result<()> {
    match result {
        Ok(report) => {
            let count = report.executed_count();
            if count == 0 {
                println!("  {} No migrations to {}", style("ℹ").blue(), verb);
            } else {
                println!();
                println!("  {} {} {} migration(s)", style("✓").green(), done, count);
            }
            println!();
            Ok(())
        }
        Err(failure) => {
            let completed = failure.completed.executed_count();
            println!();
            println!(
                "  {} Migration {} failed: {}",
                style("✗").red(),
                failure.failed_version().unwrap_or("?"),
                failure.error
            );
            println!(
                "  {} {} migration(s) completed before the failure",
                style("ℹ").blue(),
                completed
            );
            println!();
            Err(failure.into())
        }
    }
}

fn load(dir: &Path) -> Result<Vec<userapi_runtime::Migration>> {
    load_migrations(dir)
        .with_context(|| format!("Failed to load migrations from {}", dir.display()))
}

async fn migrate_up(ctx: &MigrateContext) -> Result<()> {
    print_header("Migrations");

    let migrations = load(&ctx.migrations_dir)?;
    if migrations.is_empty() {
        println!(
            "  {} No migrations found in {}",
            style("ℹ").blue(),
            ctx.migrations_dir.display()
        );
        println!();
        return Ok(());
    }

    let runner = ctx.runner().await?;
    println!("  {} Running pending migrations...", style("→").dim());
    finish(runner.up(&migrations, print_event).await, "apply", "Applied")
}

async fn migrate_down(ctx: &MigrateContext, steps: Option<usize>) -> Result<()> {
    print_header("Migrations");

    if steps == Some(0) {
        println!("  {} Nothing to roll back (steps=0)", style("ℹ").blue());
        println!();
        return Ok(());
    }

    let migrations = load(&ctx.migrations_dir)?;
    let runner = ctx.runner().await?;
    println!("  {} Rolling back migrations...", style("→").dim());
    finish(runner.down(&migrations, steps, print_event).await, "roll back", "Rolled back")
}

async fn migrate_status(ctx: &MigrateContext) -> Result<()> {
    print_header("Migration Status");

    let migrations = load(&ctx.migrations_dir)?;
    let runner = ctx.runner().await?;
    let status = runner.status(&migrations).await?;

    if status.total() == 0 && status.orphaned.is_empty() {
        println!("  {} No migrations found", style("ℹ").blue());
        println!();
        return Ok(());
    }

    for m in &status.migrations {
        let down_marker = if m.has_down {
            style("↓").green().to_string()
        } else {
            style("-").dim().to_string()
        };
        match m.state {
            MigrationState::Applied => {
                let at = m
                    .applied_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!(
                    "  {} {} {} {} {} ({})",
                    style("✓").green(),
                    down_marker,
                    m.version,
                    style(&m.name).cyan(),
                    style("applied").green(),
                    at
                );
            }
            MigrationState::Pending => println!(
                "  {} {} {} {} {}",
                style("○").yellow(),
                down_marker,
                m.version,
                style(&m.name).yellow(),
                style("pending").yellow()
            ),
        }
    }

    if !status.orphaned.is_empty() {
        println!();
        println!("  {} Applied but missing from {}:", style("!").red(), ctx.migrations_dir.display());
        for entry in &status.orphaned {
            println!("    {} {} ({})", style("→").dim(), entry.version, entry.name);
        }
    }

    println!();
    println!(
        "  {} {} applied, {} pending, {} total",
        style("ℹ").blue(),
        status.applied_count(),
        status.pending_count(),
        status.total()
    );
    println!();
    println!(
        "  {} = has down migration, {} = no down migration",
        style("↓").green(),
        style("-").dim()
    );
    println!();
    Ok(())
}

fn migrate_create(ctx: &MigrateContext, name: &str) -> Result<()> {
    let created = create_migration(&ctx.migrations_dir, name, Utc::now())?;

    println!();
    println!("  {} Created migration {}", style("✓").green(), created.version);
    println!("    {} {}", style("↑").dim(), created.up_path.display());
    println!("    {} {}", style("↓").dim(), created.down_path.display());
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals(dir: &Path, migrations_dir: Option<PathBuf>) -> GlobalArgs {
        GlobalArgs {
            config: dir.join("missing.toml"),
            migrations_dir,
        }
    }

    #[test]
    fn test_parse_down_steps() {
        let cmd = MigrateCommand::try_parse_from(["migrate", "down", "--steps", "2"]).unwrap();
        assert!(matches!(cmd.action, MigrateAction::Down { steps: Some(2) }));

        let cmd = MigrateCommand::try_parse_from(["migrate", "down"]).unwrap();
        assert!(matches!(cmd.action, MigrateAction::Down { steps: None }));
    }

    #[test]
    fn test_context_prefers_flag_over_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("userapi.toml");
        std::fs::write(
            &config,
            "[database]\nurl = \"postgres://localhost/app\"\n\n[migrations]\ndirectory = \"from_config\"\ntable = \"schema_log\"\n",
        )
        .unwrap();

        let ctx = MigrateContext::resolve(&GlobalArgs {
            config: config.clone(),
            migrations_dir: None,
        })
        .unwrap();
        assert_eq!(ctx.migrations_dir, PathBuf::from("from_config"));
        assert_eq!(ctx.table, "schema_log");

        let ctx = MigrateContext::resolve(&GlobalArgs {
            config,
            migrations_dir: Some(PathBuf::from("from_flag")),
        })
        .unwrap();
        assert_eq!(ctx.migrations_dir, PathBuf::from("from_flag"));
    }

    #[test]
    fn test_context_reads_logging_section() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("userapi.toml");
        std::fs::write(
            &config,
            "[database]\nurl = \"postgres://localhost/app\"\n\n[logging]\nlevel = \"debug\"\nformat = \"json\"\n",
        )
        .unwrap();

        let ctx = MigrateContext::resolve(&GlobalArgs {
            config,
            migrations_dir: None,
        })
        .unwrap();
        assert_eq!(ctx.logging.level, "debug");
        assert_eq!(ctx.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_context_without_config_logs_at_warn() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = MigrateContext::resolve(&globals(dir.path(), None)).unwrap();
        assert_eq!(ctx.logging.level, "warn");
        assert_eq!(ctx.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_create_works_without_database() {
        let dir = tempfile::tempdir().unwrap();
        let migrations_dir = dir.path().join("migrations");
        let mut ctx = MigrateContext::resolve(&globals(dir.path(), Some(migrations_dir.clone()))).unwrap();
        ctx.database = None;

        migrate_create(&ctx, "add_index").unwrap();
        let files: Vec<_> = std::fs::read_dir(&migrations_dir).unwrap().collect();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_runner_requires_database() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = MigrateContext {
            migrations_dir: dir.path().to_path_buf(),
            table: "migration_log".into(),
            database: None,
            logging: LoggingConfig::default(),
        };
        assert!(ctx.runner().await.is_err());
    }
}
