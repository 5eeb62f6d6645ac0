//! In-memory ledger and database for exercising the executor and runner.
//!
//! Statements are staged per transaction and only become visible on commit.
//! `CREATE TABLE x` and `DROP TABLE x` maintain a set of table names so tests
//! can compare schema states.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use super::error::{MigrationError, Result};
use super::ledger::{BoxFuture, MigrationLog, SchemaTransaction};
use super::migration::{Direction, Migration, MigrationLogEntry};

#[derive(Default)]
pub(crate) struct MemoryState {
    pub tables: BTreeSet<String>,
    pub ledger: Vec<MigrationLogEntry>,
    /// Every statement handed to `execute`, committed or not.
    pub executed: Vec<String>,
    /// Statements containing any of these markers fail.
    pub fail_markers: HashSet<String>,
    pub fail_commit_for: HashSet<String>,
    pub fail_schema: bool,
    pub fail_write: bool,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Clone, Default)]
pub(crate) struct MemoryLog {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_statements_containing(&self, marker: &str) {
        self.state.lock().unwrap().fail_markers.insert(marker.to_string());
    }

    pub fn fail_commit_of(&self, version: &str) {
        self.state.lock().unwrap().fail_commit_for.insert(version.to_string());
    }

    pub fn fail_schema(&self) {
        self.state.lock().unwrap().fail_schema = true;
    }

    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_write = true;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_markers.clear();
        state.fail_commit_for.clear();
        state.fail_schema = false;
        state.fail_write = false;
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&MemoryState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    pub fn tables(&self) -> BTreeSet<String> {
        self.with_state(|s| s.tables.clone())
    }

    pub fn ledger_versions(&self) -> Vec<String> {
        self.with_state(|s| s.ledger.iter().map(|e| e.version.clone()).collect())
    }

    pub fn executed_count(&self) -> usize {
        self.with_state(|s| s.executed.len())
    }
}

enum Staged {
    Statement(String),
    Record(MigrationLogEntry),
    Remove(String),
}

pub(crate) struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    staged: Vec<Staged>,
}

fn table_after(sql: &str, keyword: &str) -> Option<String> {
    let upper = sql.to_uppercase();
    let idx = upper.find(keyword)?;
    sql[idx + keyword.len()..]
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .find(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
}

impl SchemaTransaction for MemoryTransaction {
    fn execute<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, sqlx::Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.executed.push(sql.to_string());
            if state.fail_markers.iter().any(|m| sql.contains(m.as_str())) {
                return Err(sqlx::Error::Protocol(format!("injected failure: {}", sql)));
            }
            drop(state);
            self.staged.push(Staged::Statement(sql.to_string()));
            Ok(())
        })
    }

    fn commit(self) -> BoxFuture<'static, sqlx::Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();

            let versions: Vec<&str> = self
                .staged
                .iter()
                .filter_map(|s| match s {
                    Staged::Record(e) => Some(e.version.as_str()),
                    Staged::Remove(v) => Some(v.as_str()),
                    Staged::Statement(_) => None,
                })
                .collect();
            if versions.iter().any(|v| state.fail_commit_for.contains(*v)) {
                state.rollbacks += 1;
                return Err(sqlx::Error::Protocol("injected commit failure".into()));
            }

            for staged in &self.staged {
                match staged {
                    Staged::Statement(sql) => {
                        if let Some(table) = table_after(sql, "CREATE TABLE") {
                            state.tables.insert(table);
                        } else if let Some(table) = table_after(sql, "DROP TABLE") {
                            state.tables.remove(&table);
                        }
                    }
                    Staged::Record(entry) => state.ledger.push(entry.clone()),
                    Staged::Remove(version) => state.ledger.retain(|e| &e.version != version),
                }
            }
            state.commits += 1;
            Ok(())
        })
    }

    fn rollback(self) -> BoxFuture<'static, sqlx::Result<()>> {
        Box::pin(async move {
            self.state.lock().unwrap().rollbacks += 1;
            Ok(())
        })
    }
}

impl MigrationLog for MemoryLog {
    type Transaction = MemoryTransaction;

    fn ensure_schema(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.state.lock().unwrap().fail_schema {
                return Err(MigrationError::Schema(sqlx::Error::Protocol(
                    "permission denied".into(),
                )));
            }
            Ok(())
        })
    }

    fn applied_versions(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            Ok(self.with_state(|s| {
                s.ledger
                    .iter()
                    .filter(|e| e.direction == Direction::Up)
                    .map(|e| e.version.clone())
                    .collect()
            }))
        })
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<MigrationLogEntry>>> {
        Box::pin(async move { Ok(self.with_state(|s| s.ledger.clone())) })
    }

    fn begin(&self) -> BoxFuture<'_, sqlx::Result<Self::Transaction>> {
        Box::pin(async move {
            Ok(MemoryTransaction {
                state: self.state.clone(),
                staged: Vec::new(),
            })
        })
    }

    fn record<'a>(
        &'a self,
        tx: &'a mut Self::Transaction,
        migration: &'a Migration,
        direction: Direction,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let (fail, duplicate) = self.with_state(|s| {
                (
                    s.fail_write,
                    s.ledger.iter().any(|e| e.version == migration.version),
                )
            });
            if fail || duplicate {
                return Err(MigrationError::Write {
                    version: migration.version.clone(),
                    source: sqlx::Error::Protocol("ledger write rejected".into()),
                });
            }
            tx.staged.push(Staged::Record(MigrationLogEntry {
                version: migration.version.clone(),
                name: migration.name.clone(),
                direction,
                applied_at: Utc::now(),
            }));
            Ok(())
        })
    }

    fn remove<'a>(
        &'a self,
        tx: &'a mut Self::Transaction,
        version: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.with_state(|s| s.fail_write) {
                return Err(MigrationError::Write {
                    version: version.to_string(),
                    source: sqlx::Error::Protocol("ledger write rejected".into()),
                });
            }
            tx.staged.push(Staged::Remove(version.to_string()));
            Ok(())
        })
    }
}
