//! The migration ledger: a table recording which migrations have run.

use std::future::Future;
use std::pin::Pin;

use sqlx::postgres::Postgres;
use sqlx::{PgPool, Row, Transaction};

use super::error::{MigrationError, Result};
use super::migration::{Direction, Migration, MigrationLogEntry};

/// Boxed future returned by the ledger traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A transaction against the migration target.
pub trait SchemaTransaction: Send + Sized + 'static {
    /// Execute a single SQL statement.
    fn execute<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, sqlx::Result<()>>;

    fn commit(self) -> BoxFuture<'static, sqlx::Result<()>>;

    fn rollback(self) -> BoxFuture<'static, sqlx::Result<()>>;
}

/// Durable record of applied migrations.
///
/// A version counts as applied while an `up` row exists for it. Rolling back
/// deletes that row in the same transaction as the down body, so the ledger
/// holds at most one row per version.
pub trait MigrationLog: Send + Sync {
    type Transaction: SchemaTransaction;

    /// Create the ledger table if it does not exist.
    fn ensure_schema(&self) -> BoxFuture<'_, Result<()>>;

    /// Applied versions, oldest first.
    fn applied_versions(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    /// Every ledger row, oldest first.
    fn entries(&self) -> BoxFuture<'_, Result<Vec<MigrationLogEntry>>>;

    /// Open a transaction on the database holding the ledger.
    fn begin(&self) -> BoxFuture<'_, sqlx::Result<Self::Transaction>>;

    /// Insert a ledger row inside `tx`.
    fn record<'a>(
        &'a self,
        tx: &'a mut Self::Transaction,
        migration: &'a Migration,
        direction: Direction,
    ) -> BoxFuture<'a, Result<()>>;

    /// Delete the ledger row for `version` inside `tx`.
    fn remove<'a>(
        &'a self,
        tx: &'a mut Self::Transaction,
        version: &'a str,
    ) -> BoxFuture<'a, Result<()>>;
}

impl SchemaTransaction for Transaction<'static, Postgres> {
    fn execute<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, sqlx::Result<()>> {
        Box::pin(async move {
            sqlx::query(sql).persistent(false).execute(&mut **self).await?;
            Ok(())
        })
    }

    fn commit(self) -> BoxFuture<'static, sqlx::Result<()>> {
        Box::pin(Transaction::commit(self))
    }

    fn rollback(self) -> BoxFuture<'static, sqlx::Result<()>> {
        Box::pin(Transaction::rollback(self))
    }
}

/// Ledger stored in a PostgreSQL table.
#[derive(Clone)]
pub struct PgMigrationLog {
    pool: PgPool,
    table: String,
}

impl PgMigrationLog {
    pub const DEFAULT_TABLE: &'static str = "migration_log";

    pub fn new(pool: PgPool) -> Self {
        Self::with_table(pool, Self::DEFAULT_TABLE)
    }

    /// Use a custom ledger table name.
    pub fn with_table(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn quoted_table(&self) -> String {
        quote_ident(&self.table)
    }
}

/// Quote an SQL identifier, doubling embedded quotes.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

impl MigrationLog for PgMigrationLog {
    type Transaction = Transaction<'static, Postgres>;

    fn ensure_schema(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let create_table = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id BIGSERIAL PRIMARY KEY,
                    version VARCHAR(255) NOT NULL UNIQUE,
                    name VARCHAR(255) NOT NULL,
                    direction VARCHAR(10) NOT NULL,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                self.quoted_table()
            );
            let create_index = format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} (applied_at)",
                quote_ident(&format!("{}_applied_at_idx", self.table)),
                self.quoted_table()
            );

            for statement in [create_table, create_index] {
                sqlx::query(&statement)
                    .execute(&self.pool)
                    .await
                    .map_err(MigrationError::Schema)?;
            }
            Ok(())
        })
    }

    fn applied_versions(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            let query = format!(
                "SELECT version FROM {} WHERE direction = 'up' ORDER BY applied_at ASC, id ASC",
                self.quoted_table()
            );
            let rows: Vec<(String,)> = sqlx::query_as(&query)
                .fetch_all(&self.pool)
                .await
                .map_err(MigrationError::Query)?;

            Ok(rows.into_iter().map(|(version,)| version).collect())
        })
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<MigrationLogEntry>>> {
        Box::pin(async move {
            let query = format!(
                "SELECT version, name, direction, applied_at FROM {} ORDER BY applied_at ASC, id ASC",
                self.quoted_table()
            );
            let rows = sqlx::query(&query)
                .fetch_all(&self.pool)
                .await
                .map_err(MigrationError::Query)?;

            rows.iter()
                .map(|row| {
                    let direction: String = row.try_get("direction")?;
                    Ok(MigrationLogEntry {
                        version: row.try_get("version")?,
                        name: row.try_get("name")?,
                        direction: direction
                            .parse()
                            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
                        applied_at: row.try_get("applied_at")?,
                    })
                })
                .collect::<sqlx::Result<Vec<_>>>()
                .map_err(MigrationError::Query)
        })
    }

    fn begin(&self) -> BoxFuture<'_, sqlx::Result<Self::Transaction>> {
        Box::pin(self.pool.begin())
    }

    fn record<'a>(
        &'a self,
        tx: &'a mut Self::Transaction,
        migration: &'a Migration,
        direction: Direction,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let query = format!(
                "INSERT INTO {} (version, name, direction) VALUES ($1, $2, $3)",
                self.quoted_table()
            );
            sqlx::query(&query)
                .bind(&migration.version)
                .bind(&migration.name)
                .bind(direction.as_str())
                .execute(&mut **tx)
                .await
                .map_err(|source| MigrationError::Write {
                    version: migration.version.clone(),
                    source,
                })?;
            Ok(())
        })
    }

    fn remove<'a>(
        &'a self,
        tx: &'a mut Self::Transaction,
        version: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let query = format!("DELETE FROM {} WHERE version = $1", self.quoted_table());
            sqlx::query(&query)
                .bind(version)
                .execute(&mut **tx)
                .await
                .map_err(|source| MigrationError::Write {
                    version: version.to_string(),
                    source,
                })?;
            Ok(())
        })
    }
}
