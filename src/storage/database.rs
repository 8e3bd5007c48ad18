//! Database operations using rusqlite.
//!
//! All engine state lives here; calls into the engine are short-lived and
//! stateless, so the connection is the only coordination point.

use crate::levels::{LevelTable, LevelThreshold};
use crate::storage::schema::{CURRENT_VERSION, SCHEMA, SCHEMA_VERSION_TABLE, SEED_LEVELS};
use rusqlite::{Connection, ErrorCode, Result as SqliteResult};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// How long a writer waits on a locked database before giving up with a
/// retryable error.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database wrapper for SQLite operations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &PathBuf) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::IoError(e.to_string()))?;
        }

        let conn =
            Connection::open(path).map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.configure()?;
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.configure()?;
        db.initialize()?;

        Ok(db)
    }

    /// Connection-level settings applied before any query runs.
    fn configure(&self) -> Result<(), DatabaseError> {
        self.conn
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(SCHEMA_VERSION_TABLE)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        let current_version = self.get_schema_version()?;

        if current_version < CURRENT_VERSION {
            self.migrate(current_version)?;
        }

        Ok(())
    }

    /// Get the current schema version.
    fn get_schema_version(&self) -> Result<i32, DatabaseError> {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        );

        match result {
            Ok(version) => Ok(version),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(DatabaseError::from_sqlite(e)),
        }
    }

    /// Run database migrations.
    fn migrate(&self, from_version: i32) -> Result<(), DatabaseError> {
        if from_version < 1 {
            self.conn
                .execute_batch(SCHEMA)
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            self.conn
                .execute_batch(SEED_LEVELS)
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            self.conn
                .execute(
                    "INSERT INTO schema_version (version, applied_at) VALUES (?, datetime('now'))",
                    [CURRENT_VERSION],
                )
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            tracing::info!("Database migrated to version {}", CURRENT_VERSION);
        }

        Ok(())
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Load the level ladder from the seeded threshold table.
    pub fn level_table(&self) -> Result<LevelTable, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, min_xp FROM level_thresholds ORDER BY min_xp ASC")
            .map_err(DatabaseError::from_sqlite)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(LevelThreshold {
                    name: row.get(0)?,
                    min_xp: row.get(1)?,
                })
            })
            .map_err(DatabaseError::from_sqlite)?;

        let tiers = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::from_sqlite)?;

        LevelTable::new(tiers).map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    /// The database was locked past the busy timeout. Retryable.
    #[error("Database busy: {0}")]
    Busy(String),
}

impl DatabaseError {
    /// Map a rusqlite error, keeping lock contention distinguishable so
    /// callers can surface it as retryable.
    pub(crate) fn from_sqlite(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                DatabaseError::Busy(e.to_string())
            }
            _ => DatabaseError::QueryFailed(e.to_string()),
        }
    }

    /// Map an error raised on a transaction boundary (BEGIN IMMEDIATE or
    /// COMMIT). Lock contention stays retryable there too.
    pub(crate) fn transaction(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                DatabaseError::Busy(e.to_string())
            }
            _ => DatabaseError::TransactionFailed(e.to_string()),
        }
    }

    /// Whether retrying the failed call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::Busy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_migrates() {
        let db = Database::open_in_memory().unwrap();

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM level_thresholds", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        // A second initialize must not re-run the migration or duplicate seeds
        db.initialize().unwrap();

        let versions: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_busy_on_transaction_boundary_is_retryable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        assert!(DatabaseError::transaction(busy).is_retryable());

        let other = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some("boom".to_string()),
        );
        assert!(!DatabaseError::transaction(other).is_retryable());
    }

    #[test]
    fn test_level_table_loads_seeded_ladder() {
        let db = Database::open_in_memory().unwrap();
        let table = db.level_table().unwrap();

        assert_eq!(table.resolve(0).name, "Aprendiz");
        assert_eq!(table.resolve(1000).name, "Doutor");
    }
}
