//! Versioned SQL schema migrations.
//!
//! Migration files live in one directory and are named
//! `{version}_{name}.{up|down}.sql`. Versions are compared as plain strings, so
//! they must be fixed width (`migrate create` uses `YYYYMMDDhhmmss`).
//!
//! A run ensures the ledger table exists, plans the work against the versions
//! recorded there and applies each step in its own transaction. The schema
//! change and its ledger write commit together; the run stops at the first
//! failure.

mod error;
mod executor;
mod ledger;
mod migration;
mod planner;
mod runner;
mod source;
mod sql;

#[cfg(test)]
pub(crate) mod memory;

pub use error::{ExecutionStage, MigrationError, Result};
pub use executor::MigrationExecutor;
pub use ledger::{BoxFuture, MigrationLog, PgMigrationLog, SchemaTransaction};
pub use migration::{Direction, Migration, MigrationLogEntry, Outcome, UnknownDirection};
pub use planner::{plan, status, MigrationState, MigrationStatus, Plan, StatusReport};
pub use runner::{MigrationEvent, MigrationRunner, RunFailure, RunReport};
pub use source::{
    create_migration, load_migrations, parse_file_name, scan_migrations_dir, CreatedMigration,
    MigrationFile, ParsedFile, ScannedFile,
};
pub use sql::{executable_statements, split_sql_statements};
