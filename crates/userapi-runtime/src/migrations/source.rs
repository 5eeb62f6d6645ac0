//! Discovery of migration files on disk.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::error::{MigrationError, Result};
use super::migration::{Direction, Migration};

/// Version format used by `create_migration`. Fixed width, so string order
/// matches chronological order.
const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

/// A filename that fits `{version}_{name}.{up|down}.sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub version: String,
    pub name: String,
    pub direction: Direction,
}

/// How one directory entry was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedFile {
    Matched(MigrationFile),
    /// Not a `.sql` file; ignored.
    Skipped,
    /// A `.sql` file that does not follow the naming convention.
    Malformed(String),
}

/// A directory entry together with its classification.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub parsed: ParsedFile,
}

/// Classify a file name against `{version}_{name}.{up|down}.sql`.
pub fn parse_file_name(file_name: &str) -> ParsedFile {
    let Some(stem) = file_name.strip_suffix(".sql") else {
        return ParsedFile::Skipped;
    };

    let Some((base, suffix)) = stem.split_once('.') else {
        return ParsedFile::Malformed("missing .up or .down suffix".to_string());
    };
    if suffix.contains('.') {
        return ParsedFile::Malformed("too many '.' separators".to_string());
    }

    let direction = match suffix.parse::<Direction>() {
        Ok(direction) => direction,
        Err(_) => {
            return ParsedFile::Malformed(format!(
                "suffix '.{}' is neither .up nor .down",
                suffix
            ))
        }
    };

    let Some((version, name)) = base.split_once('_') else {
        return ParsedFile::Malformed("missing '_' between version and name".to_string());
    };
    if version.is_empty() {
        return ParsedFile::Malformed("empty version".to_string());
    }
    if name.is_empty() {
        return ParsedFile::Malformed("empty name".to_string());
    }

    ParsedFile::Matched(MigrationFile {
        version: version.to_string(),
        name: name.to_string(),
        direction,
    })
}

/// List and classify every entry of `dir`, without descending into
/// subdirectories. Entries are returned sorted by path.
pub fn scan_migrations_dir(dir: &Path) -> Result<Vec<ScannedFile>> {
    let discovery = |source| MigrationError::Discovery {
        path: dir.to_path_buf(),
        source,
    };

    let mut scanned = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(discovery)? {
        let entry = entry.map_err(discovery)?;
        let path = entry.path();

        let is_dir = entry.file_type().map_err(discovery)?.is_dir();
        let parsed = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if !is_dir => parse_file_name(name),
            _ => ParsedFile::Skipped,
        };

        scanned.push(ScannedFile { path, parsed });
    }

    scanned.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(scanned)
}

struct PendingMigration {
    name: String,
    up_sql: String,
    down_sql: String,
}

/// Load every migration in `dir`, sorted ascending by version.
///
/// Up and down files that share `{version}_{name}` are merged; a missing
/// counterpart leaves that body empty. A missing directory yields no
/// migrations.
///
/// Besides I/O failures, loading also enforces version uniqueness: two files
/// that share a version but not a name fail with `DuplicateVersion` instead of
/// loading as two migrations.
pub fn load_migrations(dir: &Path) -> Result<Vec<Migration>> {
    if !dir.exists() {
        debug!("Migrations directory does not exist: {:?}", dir);
        return Ok(Vec::new());
    }

    let mut by_version: BTreeMap<String, PendingMigration> = BTreeMap::new();

    for file in scan_migrations_dir(dir)? {
        let parsed = match file.parsed {
            ParsedFile::Matched(parsed) => parsed,
            ParsedFile::Skipped => continue,
            ParsedFile::Malformed(reason) => {
                warn!("Ignoring migration file {:?}: {}", file.path, reason);
                continue;
            }
        };

        let sql = std::fs::read_to_string(&file.path).map_err(|source| {
            MigrationError::Discovery {
                path: file.path.clone(),
                source,
            }
        })?;

        let pending = by_version
            .entry(parsed.version.clone())
            .or_insert_with(|| PendingMigration {
                name: parsed.name.clone(),
                up_sql: String::new(),
                down_sql: String::new(),
            });

        if pending.name != parsed.name {
            return Err(MigrationError::DuplicateVersion {
                version: parsed.version,
                first: pending.name.clone(),
                second: parsed.name,
            });
        }

        match parsed.direction {
            Direction::Up => pending.up_sql = sql,
            Direction::Down => pending.down_sql = sql,
        }
    }

    // BTreeMap iteration is ascending by plain string comparison of version
    let migrations: Vec<Migration> = by_version
        .into_iter()
        .map(|(version, p)| Migration::new(version, p.name, p.up_sql, p.down_sql))
        .collect();

    debug!("Loaded {} migrations from {:?}", migrations.len(), dir);
    Ok(migrations)
}

/// Paths written by `create_migration`.
#[derive(Debug, Clone)]
pub struct CreatedMigration {
    pub version: String,
    pub up_path: PathBuf,
    pub down_path: PathBuf,
}

/// Scaffold an empty up/down pair named `{timestamp}_{name}` in `dir`.
pub fn create_migration(dir: &Path, name: &str, now: DateTime<Utc>) -> Result<CreatedMigration> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(MigrationError::InvalidName(name.to_string()));
    }

    std::fs::create_dir_all(dir).map_err(|source| MigrationError::Scaffold {
        path: dir.to_path_buf(),
        source,
    })?;

    let version = now.format(VERSION_FORMAT).to_string();
    let up_path = dir.join(format!("{}_{}.up.sql", version, name));
    let down_path = dir.join(format!("{}_{}.down.sql", version, name));

    let up = format!(
        "-- Migration: {}\n-- Version: {}\n-- Description: {}\n\n",
        name, version, name
    );
    let down = format!("-- Rollback: {}\n-- Version: {}\n\n", name, version);

    write_new_file(&up_path, &up)?;
    write_new_file(&down_path, &down)?;

    Ok(CreatedMigration {
        version,
        up_path,
        down_path,
    })
}

fn write_new_file(path: &Path, content: &str) -> Result<()> {
    let scaffold = |source| MigrationError::Scaffold {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(scaffold)?;
    file.write_all(content.as_bytes()).map_err(scaffold)
}
