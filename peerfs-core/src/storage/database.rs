use crate::error::Result;
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the node's SQLite metadata file, shared by the catalog and the
/// node registry. Every call opens its own connection; WAL keeps readers off
/// the writer's back.
#[derive(Debug, Clone)]
pub struct MetaDatabase {
    db_path: PathBuf,
}

impl MetaDatabase {
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Self { db_path };
        let conn = db.connect()?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("Opened metadata db {:?} (journal_mode={})", db.db_path, mode);
        Ok(db)
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}
