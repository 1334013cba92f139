//! SQLite connection management and schema migrations.
//!
//! The whole process shares one connection behind a mutex. Callers lock it, run their
//! synchronous queries and drop the guard before the next `.await`.

use crate::{ClinicError, ClinicResult};
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Driver error type, re-exported for callers that construct or match on it.
pub use rusqlite::Error as SqlError;

const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../migrations/001_initial.sql"))];

/// Shared handle to the clinic database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file at `path` and run pending migrations.
    pub fn open(path: &Path) -> ClinicResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClinicError::InvalidInput(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for tests and throwaway runs).
    pub fn open_in_memory() -> ClinicResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> ClinicResult<Self> {
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection for the duration of one unit of work.
    pub fn lock(&self) -> ClinicResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ClinicError::LockPoisoned)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

fn configure_pragmas(conn: &Connection) -> ClinicResult<()> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> ClinicResult<()> {
    let current_version = current_version(conn);

    for &(version, sql) in MIGRATIONS {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| ClinicError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Current schema version (0 if no schema exists yet).
pub fn current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i64>>(0)
    })
    .ok()
    .flatten()
    .unwrap_or(0)
}

/// Current UTC time as stored in `created_at`/`updated_at` columns.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Map "no rows" to `ClinicError::NotFound(entity)`.
pub(crate) fn not_found(entity: &'static str) -> impl FnOnce(rusqlite::Error) -> ClinicError {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => ClinicError::NotFound(entity),
        other => ClinicError::Database(other),
    }
}

/// True when `table` has a row with `id`. `table` must be a trusted literal.
pub(crate) fn exists(conn: &Connection, table: &str, id: i64) -> ClinicResult<bool> {
    let found: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)"),
        [id],
        |row| row.get(0),
    )?;
    Ok(found == 1)
}

/// `LIKE` pattern matching `term` anywhere, with `%`, `_` and `\\` escaped.
///
/// Use with `LIKE ?n ESCAPE '\\'`. Blank input yields `None` (no filter).
pub(crate) fn contains_pattern(term: Option<&str>) -> Option<String> {
    let term = term.map(str::trim).filter(|t| !t.is_empty())?;
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}
