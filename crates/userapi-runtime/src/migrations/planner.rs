use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::migration::{Direction, Migration, MigrationLogEntry};

/// The ordered work for one run.
#[derive(Debug, Clone)]
pub struct Plan {
    pub direction: Direction,
    /// Migrations to execute, in execution order.
    pub steps: Vec<Migration>,
    /// Up runs only: migrations skipped because they are already applied.
    pub already_applied: Vec<Migration>,
    /// Down runs only: migrations skipped because they are not applied.
    pub skipped: Vec<Migration>,
}

impl Plan {
    /// Keep only the first `n` steps.
    pub fn limit(mut self, n: usize) -> Self {
        self.steps.truncate(n);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Work out which migrations to run for `direction`.
///
/// Up runs execute unapplied migrations in ascending version order. Down runs
/// revert applied migrations in descending version order. The result depends
/// only on the set of migrations and applied versions, not on their order.
pub fn plan(direction: Direction, migrations: &[Migration], applied: &[String]) -> Plan {
    let applied: HashSet<&str> = applied.iter().map(String::as_str).collect();

    let mut sorted = migrations.to_vec();
    sorted.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.name.cmp(&b.name)));

    let (done, todo): (Vec<Migration>, Vec<Migration>) = sorted
        .into_iter()
        .partition(|m| applied.contains(m.version.as_str()));

    match direction {
        Direction::Up => Plan {
            direction,
            steps: todo,
            already_applied: done,
            skipped: Vec::new(),
        },
        Direction::Down => Plan {
            direction,
            steps: done.into_iter().rev().collect(),
            already_applied: Vec::new(),
            skipped: todo,
        },
    }
}

/// Whether a known migration has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Applied,
    Pending,
}

/// Status of one migration file.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub version: String,
    pub name: String,
    pub state: MigrationState,
    pub applied_at: Option<DateTime<Utc>>,
    pub has_down: bool,
}

/// Status of every known migration plus ledger rows without a file.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub migrations: Vec<MigrationStatus>,
    /// Applied versions with no matching migration file.
    pub orphaned: Vec<MigrationLogEntry>,
}

impl StatusReport {
    pub fn applied_count(&self) -> usize {
        self.migrations
            .iter()
            .filter(|m| m.state == MigrationState::Applied)
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.migrations
            .iter()
            .filter(|m| m.state == MigrationState::Pending)
            .count()
    }

    pub fn total(&self) -> usize {
        self.migrations.len()
    }
}

/// Compare known migrations with the ledger.
pub fn status(migrations: &[Migration], entries: &[MigrationLogEntry]) -> StatusReport {
    let applied: HashMap<&str, &MigrationLogEntry> = entries
        .iter()
        .filter(|e| e.direction == Direction::Up)
        .map(|e| (e.version.as_str(), e))
        .collect();

    let mut sorted: Vec<&Migration> = migrations.iter().collect();
    sorted.sort_by(|a, b| a.version.cmp(&b.version));

    let statuses = sorted
        .into_iter()
        .map(|m| {
            let entry = applied.get(m.version.as_str());
            MigrationStatus {
                version: m.version.clone(),
                name: m.name.clone(),
                state: if entry.is_some() {
                    MigrationState::Applied
                } else {
                    MigrationState::Pending
                },
                applied_at: entry.map(|e| e.applied_at),
                has_down: m.has_down(),
            }
        })
        .collect();

    let known: HashSet<&str> = migrations.iter().map(|m| m.version.as_str()).collect();
    let orphaned = entries
        .iter()
        .filter(|e| e.direction == Direction::Up && !known.contains(e.version.as_str()))
        .cloned()
        .collect();

    StatusReport {
        migrations: statuses,
        orphaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration(version: &str) -> Migration {
        Migration::new(version, format!("m{}", version), "SELECT 1;", "SELECT 2;")
    }

    fn versions(migrations: &[Migration]) -> Vec<&str> {
        migrations.iter().map(|m| m.version.as_str()).collect()
    }

    fn entry(version: &str) -> MigrationLogEntry {
        MigrationLogEntry {
            version: version.into(),
            name: "x".into(),
            direction: Direction::Up,
            applied_at: Utc::now(),
        }
    }

    #[test]
    fn test_up_plan_ascending() {
        let all = vec![migration("20230103"), migration("20230101"), migration("20230102")];
        let plan = plan(Direction::Up, &all, &[]);
        assert_eq!(versions(&plan.steps), vec!["20230101", "20230102", "20230103"]);
        assert!(plan.already_applied.is_empty());
    }

    #[test]
    fn test_down_plan_descending() {
        let all = vec![migration("20230101"), migration("20230102"), migration("20230103")];
        let applied = vec!["20230101".into(), "20230102".into(), "20230103".into()];
        let plan = plan(Direction::Down, &all, &applied);
        assert_eq!(versions(&plan.steps), vec!["20230103", "20230102", "20230101"]);
    }

    #[test]
    fn test_up_skips_applied() {
        let all = vec![migration("1"), migration("2"), migration("3")];
        let plan = plan(Direction::Up, &all, &["2".to_string()]);
        assert_eq!(versions(&plan.steps), vec!["1", "3"]);
        assert_eq!(versions(&plan.already_applied), vec!["2"]);
    }

    #[test]
    fn test_down_skips_unapplied() {
        let all = vec![migration("1"), migration("2"), migration("3")];
        let plan = plan(Direction::Down, &all, &["1".to_string(), "3".to_string()]);
        assert_eq!(versions(&plan.steps), vec!["3", "1"]);
        assert_eq!(versions(&plan.skipped), vec!["2"]);
    }

    #[test]
    fn test_plan_is_independent_of_input_order() {
        let a = vec![migration("3"), migration("1"), migration("2")];
        let b = vec![migration("2"), migration("3"), migration("1")];
        let applied = vec!["2".to_string()];
        assert_eq!(
            versions(&plan(Direction::Up, &a, &applied).steps),
            versions(&plan(Direction::Up, &b, &applied).steps)
        );
        assert_eq!(
            versions(&plan(Direction::Down, &a, &applied).steps),
            versions(&plan(Direction::Down, &b, &applied).steps)
        );
    }

    #[test]
    fn test_limit() {
        let all = vec![migration("1"), migration("2"), migration("3")];
        let applied: Vec<String> = vec!["1".into(), "2".into(), "3".into()];
        let plan = plan(Direction::Down, &all, &applied).limit(1);
        assert_eq!(versions(&plan.steps), vec!["3"]);
    }

    #[test]
    fn test_applied_versions_without_files_are_ignored() {
        let all = vec![migration("1")];
        let plan = plan(Direction::Down, &all, &["0".to_string(), "1".to_string()]);
        assert_eq!(versions(&plan.steps), vec!["1"]);
    }

    #[test]
    fn test_status_counts_and_orphans() {
        let all = vec![migration("1"), migration("2"), migration("3")];
        let entries = vec![entry("1"), entry("legacy")];
        let report = status(&all, &entries);

        assert_eq!(report.total(), 3);
        assert_eq!(report.applied_count(), 1);
        assert_eq!(report.pending_count(), 2);
        assert_eq!(report.migrations[0].state, MigrationState::Applied);
        assert!(report.migrations[0].applied_at.is_some());
        assert_eq!(report.migrations[1].state, MigrationState::Pending);
        assert_eq!(report.orphaned.len(), 1);
        assert_eq!(report.orphaned[0].version, "legacy");
    }
}
