use thiserror::Error;
use tracing::{debug, error, info};

use super::error::MigrationError;
use super::executor::MigrationExecutor;
use super::ledger::MigrationLog;
use super::migration::{Direction, Migration, Outcome};
use super::planner::{self, StatusReport};

/// Progress notification for one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEvent {
    pub version: String,
    pub name: String,
    pub outcome: Outcome,
}

impl MigrationEvent {
    fn new(migration: &Migration, outcome: Outcome) -> Self {
        Self {
            version: migration.version.clone(),
            name: migration.name.clone(),
            outcome,
        }
    }
}

/// Everything that happened during a run, in order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub direction: Direction,
    pub events: Vec<MigrationEvent>,
}

impl RunReport {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            events: Vec::new(),
        }
    }

    /// Migrations whose SQL ran and committed.
    pub fn executed(&self) -> impl Iterator<Item = &MigrationEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Applied | Outcome::RolledBack))
    }

    pub fn executed_count(&self) -> usize {
        self.executed().count()
    }
}

/// A run that stopped early.
///
/// `completed` lists the migrations that committed before the failure.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub completed: RunReport,
    #[source]
    pub error: MigrationError,
}

impl RunFailure {
    /// The version that failed, if the failure was tied to one.
    pub fn failed_version(&self) -> Option<&str> {
        self.error.version()
    }
}

/// Drives planning and execution against a ledger.
pub struct MigrationRunner<L: MigrationLog> {
    log: L,
}

impl<L: MigrationLog> MigrationRunner<L> {
    pub fn new(log: L) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Apply every pending migration.
    pub async fn up(
        &self,
        migrations: &[Migration],
        on_event: impl FnMut(&MigrationEvent),
    ) -> Result<RunReport, RunFailure> {
        self.run(Direction::Up, migrations, None, on_event).await
    }

    /// Roll back applied migrations, newest first. `steps` limits how many.
    pub async fn down(
        &self,
        migrations: &[Migration],
        steps: Option<usize>,
        on_event: impl FnMut(&MigrationEvent),
    ) -> Result<RunReport, RunFailure> {
        self.run(Direction::Down, migrations, steps, on_event).await
    }

    /// Plan and execute one run, calling `on_event` as each migration
    /// completes. Stops at the first failure.
    pub async fn run(
        &self,
        direction: Direction,
        migrations: &[Migration],
        steps: Option<usize>,
        mut on_event: impl FnMut(&MigrationEvent),
    ) -> Result<RunReport, RunFailure> {
        let mut report = RunReport::new(direction);

        let applied = match self.applied_versions().await {
            Ok(applied) => applied,
            Err(error) => {
                return Err(RunFailure {
                    completed: report,
                    error,
                })
            }
        };
        debug!("Already applied migrations: {:?}", applied);

        let mut plan = planner::plan(direction, migrations, &applied);
        if let Some(n) = steps {
            plan = plan.limit(n);
        }

        for migration in &plan.already_applied {
            let event = MigrationEvent::new(migration, Outcome::AlreadyApplied);
            on_event(&event);
            report.events.push(event);
        }
        // Not applied, so nothing to revert. Recorded but not announced.
        for migration in &plan.skipped {
            debug!("Skipping {} ({}): not applied", migration.version, migration.name);
            report
                .events
                .push(MigrationEvent::new(migration, Outcome::Skipped));
        }

        if plan.is_empty() {
            info!("No migrations to run {}", direction);
            return Ok(report);
        }
        info!("Running {} migration(s) {}", plan.steps.len(), direction);

        let executor = MigrationExecutor::new(&self.log);
        for migration in &plan.steps {
            info!("Running migration {} ({}) {}", migration.version, migration.name, direction);
            match executor.apply(migration, direction).await {
                Ok(outcome) => {
                    let event = MigrationEvent::new(migration, outcome);
                    on_event(&event);
                    report.events.push(event);
                }
                Err(error) => {
                    error!("Migration {} failed: {}", migration.version, error);
                    return Err(RunFailure {
                        completed: report,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Status of every known migration against the ledger.
    pub async fn status(&self, migrations: &[Migration]) -> Result<StatusReport, MigrationError> {
        self.log.ensure_schema().await?;
        let entries = self.log.entries().await?;
        Ok(planner::status(migrations, &entries))
    }

    async fn applied_versions(&self) -> Result<Vec<String>, MigrationError> {
        self.log.ensure_schema().await?;
        self.log.applied_versions().await
    }
}
