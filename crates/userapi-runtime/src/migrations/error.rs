use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Where inside a migration's transaction execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStage {
    Begin,
    /// 1-based index of the failing statement.
    Statement(usize),
    Commit,
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStage::Begin => write!(f, "begin transaction"),
            ExecutionStage::Statement(n) => write!(f, "statement {}", n),
            ExecutionStage::Commit => write!(f, "commit"),
        }
    }
}

/// Errors raised while discovering, planning or running migrations.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Failed to read migrations at {}: {source}", .path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        version: String,
        first: String,
        second: String,
    },

    #[error("Failed to create migration log table: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("Failed to read applied migrations: {0}")]
    Query(#[source] sqlx::Error),

    #[error("Failed to write migration log entry for {version}: {source}")]
    Write {
        version: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Migration {version} ({name}) failed at {stage}: {source}")]
    Execution {
        version: String,
        name: String,
        stage: ExecutionStage,
        #[source]
        source: sqlx::Error,
    },

    #[error("Migration {version} ({name}) has no down migration")]
    Irreversible { version: String, name: String },

    #[error("Invalid migration name '{0}': use letters, digits, '_' or '-'")]
    InvalidName(String),

    #[error("Failed to write migration file {}: {source}", .path.display())]
    Scaffold {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrationError {
    /// The migration version this error is about, if any.
    pub fn version(&self) -> Option<&str> {
        match self {
            MigrationError::DuplicateVersion { version, .. }
            | MigrationError::Write { version, .. }
            | MigrationError::Execution { version, .. }
            | MigrationError::Irreversible { version, .. } => Some(version),
            _ => None,
        }
    }
}

/// Result type alias using MigrationError.
pub type Result<T> = std::result::Result<T, MigrationError>;
