//! SQLite storage for workflow checkpoints and finished analyses.
//!
//! One connection per process, shared behind a mutex. Repositories borrow it
//! through [`Database::with_conn`] and never hold the lock across an await.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod analysis_repo;
pub mod checkpoint_repo;
pub mod error;
pub mod migrations;

pub use analysis_repo::{AnalysisRecord, AnalysisRepository, AnalysisRow, SqliteAnalysisRepository};
pub use checkpoint_repo::SqliteCheckpointStore;
pub use error::DatabaseError;

/// How long a writer waits on another connection before `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Shared handle to the doclara database. Clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database file, creating parent directories and applying
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| DatabaseError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let db = Self::prepare(conn)?;
        log::info!("Opened database {}", crate::sanitize::redact_path(path));
        Ok(db)
    }

    /// A private database that disappears with the handle.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with exclusive access to the connection.
    ///
    /// Blocking: the async repositories call this inline, so a contended
    /// write can hold a runtime worker for up to [`BUSY_TIMEOUT`]. No other
    /// in-process lock is held while waiting.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let guard = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&guard)
    }
}

/// `~/.doclara/data/doclara.db`, if a home directory is known.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".doclara").join("data").join("doclara.db"))
}
