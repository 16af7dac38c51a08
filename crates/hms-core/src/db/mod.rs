//! Database layer for the hospital core.

mod audit;
mod discharges;
mod invoices;
mod patients;
mod queue;
mod roster;
mod schema;

pub use audit::*;
pub use discharges::*;
pub use invoices::*;
pub use roster::*;
pub use schema::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

use crate::models::LedgerError;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not permitted: {0}")]
    NotPermitted(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Classify a failed write: unique-index violations become `Conflict`.
    pub(crate) fn on_write(err: rusqlite::Error, conflict: impl FnOnce() -> String) -> Self {
        if is_unique_violation(&err) {
            DbError::Conflict(conflict())
        } else {
            DbError::Sqlite(err)
        }
    }
}

/// Whether the error comes from a UNIQUE index or constraint.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Reject anything that is not a calendar date in `YYYY-MM-DD` form.
pub(crate) fn require_date(field: &str, value: &str) -> DbResult<()> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| DbError::Validation(format!("{field} must be YYYY-MM-DD, got {value:?}")))
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}
