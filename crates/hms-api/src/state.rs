//! Shared application state.

use std::sync::{Arc, Mutex};

use hms_core::{Database, DbError};

use crate::config::{ApiConfig, IN_MEMORY_DB};
use crate::error::ApiError;
use crate::events::EventHub;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Database>>,
    pub config: Arc<ApiConfig>,
    pub events: EventHub,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            events: EventHub::new(config.event_capacity),
            config: Arc::new(config),
        }
    }

    /// Open the database named by the configuration.
    pub fn open(config: ApiConfig) -> Result<Self, DbError> {
        let db = if config.db_path == IN_MEMORY_DB {
            Database::open_in_memory()?
        } else {
            Database::open(&config.db_path)?
        };
        Ok(Self::new(db, config))
    }

    /// Run `f` with the database locked. The lock is released before
    /// returning, so callers never hold it across an `.await`.
    pub fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T, DbError>) -> Result<T, ApiError> {
        let db = self
            .db
            .lock()
            .map_err(|e| ApiError::Internal(format!("Lock poisoned: {e}")))?;
        f(&db).map_err(ApiError::from)
    }
}
