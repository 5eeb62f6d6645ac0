use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sql::executable_statements;

/// Which way a migration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A direction string that is neither `up` nor `down`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown migration direction '{0}'")]
pub struct UnknownDirection(pub String);

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(UnknownDirection(other.to_string())),
        }
    }
}

/// A versioned pair of forward and backward SQL scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Sortable identifier, unique across the set.
    pub version: String,
    /// Human-readable label.
    pub name: String,
    /// SQL applied when migrating forward. May be empty.
    pub up_sql: String,
    /// SQL applied when rolling back. May be empty.
    pub down_sql: String,
}

impl Migration {
    pub fn new(
        version: impl Into<String>,
        name: impl Into<String>,
        up_sql: impl Into<String>,
        down_sql: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            name: name.into(),
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }

    /// `{version}_{name}`, the shared stem of both files.
    pub fn id(&self) -> String {
        format!("{}_{}", self.version, self.name)
    }

    /// The SQL body for `direction`.
    pub fn body(&self, direction: Direction) -> &str {
        match direction {
            Direction::Up => &self.up_sql,
            Direction::Down => &self.down_sql,
        }
    }

    /// Whether the down body contains at least one executable statement.
    pub fn has_down(&self) -> bool {
        !executable_statements(&self.down_sql).is_empty()
    }
}

/// One row of the migration ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationLogEntry {
    pub version: String,
    pub name: String,
    pub direction: Direction,
    pub applied_at: DateTime<Utc>,
}

/// What happened to one migration during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The up body ran and the ledger row was written.
    Applied,
    /// The down body ran and the ledger row was removed.
    RolledBack,
    /// Already recorded as applied; nothing ran.
    AlreadyApplied,
    /// Not applied, so there was nothing to roll back.
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Applied => "applied",
            Outcome::RolledBack => "rolled back",
            Outcome::AlreadyApplied => "already applied",
            Outcome::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_round_trip() {
        assert_eq!("up".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!(Direction::Down.to_string(), "down");
        assert_eq!(
            "sideways".parse::<Direction>().unwrap_err(),
            UnknownDirection("sideways".into())
        );
    }

    #[test]
    fn test_body_selects_direction() {
        let m = Migration::new("20230101", "init", "CREATE TABLE a (id INT);", "DROP TABLE a;");
        assert_eq!(m.body(Direction::Up), "CREATE TABLE a (id INT);");
        assert_eq!(m.body(Direction::Down), "DROP TABLE a;");
        assert_eq!(m.id(), "20230101_init");
    }

    #[test]
    fn test_has_down_ignores_comments() {
        let scaffold = Migration::new("1", "x", "", "-- Rollback: x\n-- Version: 1\n\n");
        assert!(!scaffold.has_down());

        let real = Migration::new("1", "x", "", "-- drop it\nDROP TABLE x;");
        assert!(real.has_down());
    }
}
