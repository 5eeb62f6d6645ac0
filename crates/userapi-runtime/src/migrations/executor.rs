use std::time::Instant;

use tracing::{debug, info, warn};

use super::error::{ExecutionStage, MigrationError, Result};
use super::ledger::{MigrationLog, SchemaTransaction};
use super::migration::{Direction, Migration, Outcome};
use super::sql::executable_statements;

/// Runs one migration and its ledger update inside a single transaction.
pub struct MigrationExecutor<'a, L: MigrationLog> {
    log: &'a L,
}

impl<'a, L: MigrationLog> MigrationExecutor<'a, L> {
    /// Create a new migration executor.
    pub fn new(log: &'a L) -> Self {
        Self { log }
    }

    /// Apply `migration` in `direction`.
    ///
    /// On any failure the transaction is rolled back, so neither the schema
    /// change nor the ledger row is kept.
    pub async fn apply(&self, migration: &Migration, direction: Direction) -> Result<Outcome> {
        let statements = executable_statements(migration.body(direction));
        if direction == Direction::Down && statements.is_empty() {
            return Err(MigrationError::Irreversible {
                version: migration.version.clone(),
                name: migration.name.clone(),
            });
        }

        let start = Instant::now();
        let mut tx = self
            .log
            .begin()
            .await
            .map_err(|source| execution_error(migration, ExecutionStage::Begin, source))?;

        for (i, statement) in statements.iter().enumerate() {
            debug!(version = %migration.version, "Executing statement {}", i + 1);
            if let Err(source) = tx.execute(statement).await {
                rollback(tx, migration).await;
                return Err(execution_error(
                    migration,
                    ExecutionStage::Statement(i + 1),
                    source,
                ));
            }
        }

        let logged = match direction {
            Direction::Up => self.log.record(&mut tx, migration, Direction::Up).await,
            Direction::Down => self.log.remove(&mut tx, &migration.version).await,
        };
        if let Err(e) = logged {
            rollback(tx, migration).await;
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(|source| execution_error(migration, ExecutionStage::Commit, source))?;

        let outcome = match direction {
            Direction::Up => Outcome::Applied,
            Direction::Down => Outcome::RolledBack,
        };
        info!(
            version = %migration.version,
            name = %migration.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Migration {}",
            outcome
        );
        Ok(outcome)
    }
}

fn execution_error(
    migration: &Migration,
    stage: ExecutionStage,
    source: sqlx::Error,
) -> MigrationError {
    MigrationError::Execution {
        version: migration.version.clone(),
        name: migration.name.clone(),
        stage,
        source,
    }
}

async fn rollback<T: SchemaTransaction>(tx: T, migration: &Migration) {
    if let Err(e) = tx.rollback().await {
        warn!(
            "Failed to roll back transaction for migration {}: {}",
            migration.version, e
        );
    }
}
