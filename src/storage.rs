//! Local persistence for pending activities.
//!
//! Activities live in a single `SQLite` database:
//!
//! ```text
//! ~/.maint/maint.sqlite
//!   activity            # One row per activity, equipment path split into columns
//!   activity_assignee   # (activity_id, user_id) pairs
//! ```
//!
//! Writes that change status are compare-and-swap on the status column: the
//! row is only updated if it still holds the status the caller read.

mod activity;

use std::{fs, io, path::PathBuf, time::Duration};

use rusqlite::Connection;
use uuid::Uuid;

use crate::model::Status;

pub use activity::ActivityFilter;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tables and the indexes queries by area, status, issue type, creation
/// time, and assignee rely on.
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS activity (
        id                TEXT PRIMARY KEY,
        area              TEXT NOT NULL,
        machine           TEXT NOT NULL DEFAULT '',
        element           TEXT NOT NULL DEFAULT '',
        component         TEXT NOT NULL DEFAULT '',
        equipment_display TEXT NOT NULL,
        issue_type        TEXT NOT NULL,
        description       TEXT NOT NULL,
        status            TEXT NOT NULL,
        scheduled_date    TEXT,
        shift             TEXT,
        created_by        TEXT NOT NULL,
        created_at        TEXT NOT NULL,
        completed_by      TEXT,
        completed_at      TEXT
    );

    CREATE TABLE IF NOT EXISTS activity_assignee (
        activity_id TEXT NOT NULL REFERENCES activity(id),
        user_id     TEXT NOT NULL,
        PRIMARY KEY (activity_id, user_id)
    );

    CREATE INDEX IF NOT EXISTS activity_area ON activity(area);
    CREATE INDEX IF NOT EXISTS activity_status ON activity(status);
    CREATE INDEX IF NOT EXISTS activity_issue_type ON activity(issue_type);
    CREATE INDEX IF NOT EXISTS activity_created_at ON activity(created_at);
    CREATE INDEX IF NOT EXISTS activity_assignee_user ON activity_assignee(user_id);
";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("activity not found: {0}")]
    ActivityNotFound(Uuid),

    #[error("activity already exists: {0}")]
    ActivityAlreadyExists(Uuid),

    #[error("activity {id} is {actual}, expected {expected}")]
    StatusConflict {
        id: Uuid,
        expected: Status,
        actual: Status,
    },

    #[error("corrupt database: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// `SQLite`-backed storage for activities.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Opens (or creates) the database at `path`.
    ///
    /// The parent directory and schema are created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the directory or schema can't be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let storage = Self { path };
        storage.connect()?.execute_batch(SCHEMA)?;
        tracing::debug!(path = %storage.path.display(), "storage ready");
        Ok(storage)
    }

    /// Returns the default database path: `~/.maint/maint.sqlite`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".maint").join("maint.sqlite"))
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}
