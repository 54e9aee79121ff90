use crate::error::Result;
use crate::hash::ContentHash;
use crate::storage::database::MetaDatabase;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

/// File record as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Insertion sequence; lower means older.
    pub pk: i64,
    pub path: String,
    pub content_hash: ContentHash,
    pub last_modified: DateTime<Utc>,
    pub pending_push: bool,
    pub tombstoned: bool,
}

impl FileRecord {
    pub fn is_active(&self) -> bool {
        !self.tombstoned
    }
}

#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub path: String,
    pub content_hash: ContentHash,
    pub last_modified: DateTime<Utc>,
    pub pending_push: bool,
}

#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(FileRecord),
    AlreadyExists,
}

const RECORD_COLUMNS: &str = "pk, path, sha256, last_modified, pending_push, tombstoned";

/// Persistent table of file records keyed by path.
///
/// At most one active (non-tombstoned) row exists per path. Tombstoned rows
/// stay until [`Catalog::purge`] is called for them, so any number of them
/// may share a path.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: MetaDatabase,
}

impl Catalog {
    pub fn new(db: MetaDatabase) -> Result<Self> {
        let catalog = Self { db };
        catalog.init_schema()?;
        Ok(catalog)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.db.connect()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS files (
                pk INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                last_modified TEXT NOT NULL,
                pending_push INTEGER NOT NULL DEFAULT 0,
                tombstoned INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        // One active row per path
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_files_active_path
             ON files(path) WHERE tombstoned = 0",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_files_sha256 ON files(sha256, tombstoned)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_files_pending
             ON files(pending_push, tombstoned)",
            [],
        )?;

        Ok(())
    }

    /// Insert a new active record. Never overwrites an active record at the same path.
    pub fn insert(&self, record: &NewFileRecord) -> Result<InsertOutcome> {
        let conn = self.db.connect()?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO files (path, sha256, last_modified, pending_push, tombstoned)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![
                record.path,
                record.content_hash.to_hex(),
                record.last_modified.to_rfc3339(),
                record.pending_push,
            ],
        )?;

        if inserted == 0 {
            return Ok(InsertOutcome::AlreadyExists);
        }

        Ok(InsertOutcome::Inserted(FileRecord {
            pk: conn.last_insert_rowid(),
            path: record.path.clone(),
            content_hash: record.content_hash,
            last_modified: record.last_modified,
            pending_push: record.pending_push,
            tombstoned: false,
        }))
    }

    /// Get the active record at a path
    pub fn get_active(&self, path: &str) -> Result<Option<FileRecord>> {
        let conn = self.db.connect()?;

        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM files WHERE path = ?1 AND tombstoned = 0",
                    RECORD_COLUMNS
                ),
                [path],
                record_from_row,
            )
            .optional()?;

        Ok(record)
    }

    /// All rows ever recorded for a path, tombstones included, oldest first.
    pub fn list_path_history(&self, path: &str) -> Result<Vec<FileRecord>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM files WHERE path = ?1 ORDER BY pk",
            RECORD_COLUMNS
        ))?;

        let rows = stmt.query_map([path], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    /// Active records sharing a hash, in insertion order (earliest first).
    pub fn find_by_hash(&self, hash: &ContentHash) -> Result<Vec<FileRecord>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM files WHERE sha256 = ?1 AND tombstoned = 0 ORDER BY pk",
            RECORD_COLUMNS
        ))?;

        let rows = stmt.query_map([hash.to_hex()], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    /// The earliest inserted active record with this hash.
    pub fn first_by_hash(&self, hash: &ContentHash) -> Result<Option<FileRecord>> {
        let conn = self.db.connect()?;

        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM files WHERE sha256 = ?1 AND tombstoned = 0
                     ORDER BY pk LIMIT 1",
                    RECORD_COLUMNS
                ),
                [hash.to_hex()],
                record_from_row,
            )
            .optional()?;

        Ok(record)
    }

    pub fn exists_by_hash(&self, hash: &ContentHash) -> Result<bool> {
        let conn = self.db.connect()?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM files WHERE sha256 = ?1 AND tombstoned = 0)",
            [hash.to_hex()],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    /// Soft delete - tombstone the active record and flag it for propagation.
    /// Returns the tombstoned record, or `None` when the path had no active record.
    pub fn mark_deleted(&self, path: &str) -> Result<Option<FileRecord>> {
        let conn = self.db.connect()?;
        let now = Utc::now().to_rfc3339();

        let record = conn
            .query_row(
                &format!(
                    "UPDATE files SET tombstoned = 1, pending_push = 1, last_modified = ?1
                     WHERE path = ?2 AND tombstoned = 0
                     RETURNING {}",
                    RECORD_COLUMNS
                ),
                params![now, path],
                record_from_row,
            )
            .optional()?;

        Ok(record)
    }

    /// Records the transmitter still has to act on, oldest first.
    pub fn list_pending(&self, limit: usize) -> Result<Vec<FileRecord>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM files WHERE pending_push = 1 OR tombstoned = 1
             ORDER BY pk LIMIT ?1",
            RECORD_COLUMNS
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    /// Propagation of an active record finished.
    pub fn clear_pending_push(&self, pk: i64) -> Result<bool> {
        let conn = self.db.connect()?;

        let affected = conn.execute(
            "UPDATE files SET pending_push = 0 WHERE pk = ?1 AND tombstoned = 0",
            [pk],
        )?;

        Ok(affected > 0)
    }

    /// Hard delete - drop a tombstoned row once peers have been told.
    /// Active rows are never purged.
    pub fn purge(&self, pk: i64) -> Result<bool> {
        let conn = self.db.connect()?;

        let affected = conn.execute("DELETE FROM files WHERE pk = ?1 AND tombstoned = 1", [pk])?;

        Ok(affected > 0)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let sha256: String = row.get(2)?;
    let last_modified: String = row.get(3)?;

    Ok(FileRecord {
        pk: row.get(0)?,
        path: row.get(1)?,
        content_hash: ContentHash::parse(&sha256)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
        last_modified: DateTime::parse_from_rfc3339(&last_modified)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?
            .with_timezone(&Utc),
        pending_push: row.get(4)?,
        tombstoned: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::compute_hash;

    fn new_catalog() -> (tempfile::TempDir, Catalog) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = MetaDatabase::open(temp_dir.path().join("meta.db")).unwrap();
        (temp_dir, Catalog::new(db).unwrap())
    }

    fn new_record(path: &str, content: &[u8]) -> NewFileRecord {
        NewFileRecord {
            path: path.to_string(),
            content_hash: compute_hash(content),
            last_modified: Utc::now(),
            pending_push: false,
        }
    }

    fn inserted(outcome: InsertOutcome) -> FileRecord {
        match outcome {
            InsertOutcome::Inserted(record) => record,
            InsertOutcome::AlreadyExists => panic!("expected insert"),
        }
    }

    #[test]
    fn test_insert_refuses_active_duplicate() {
        let (_dir, catalog) = new_catalog();

        let first = inserted(catalog.insert(&new_record("a.txt", b"one")).unwrap());
        assert!(first.is_active());
        assert!(!first.pending_push);

        let again = catalog.insert(&new_record("a.txt", b"two")).unwrap();
        assert!(matches!(again, InsertOutcome::AlreadyExists));

        let stored = catalog.get_active("a.txt").unwrap().unwrap();
        assert_eq!(stored, first);
    }

    #[test]
    fn test_insert_after_tombstone_is_allowed() {
        let (_dir, catalog) = new_catalog();
        inserted(catalog.insert(&new_record("a.txt", b"one")).unwrap());
        catalog.mark_deleted("a.txt").unwrap().unwrap();

        let second = inserted(catalog.insert(&new_record("a.txt", b"two")).unwrap());
        assert_eq!(second.content_hash, compute_hash(b"two"));

        let history = catalog.list_path_history("a.txt").unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].tombstoned);
        assert!(history[1].is_active());
    }

    #[test]
    fn test_find_by_hash_orders_by_insertion() {
        let (_dir, catalog) = new_catalog();
        let hash = compute_hash(b"same");

        inserted(catalog.insert(&new_record("z/late-name.txt", b"same")).unwrap());
        inserted(catalog.insert(&new_record("a/early-name.txt", b"same")).unwrap());
        inserted(catalog.insert(&new_record("other.txt", b"different")).unwrap());

        let matches = catalog.find_by_hash(&hash).unwrap();
        let paths: Vec<_> = matches.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["z/late-name.txt", "a/early-name.txt"]);

        let first = catalog.first_by_hash(&hash).unwrap().unwrap();
        assert_eq!(first.path, "z/late-name.txt");

        catalog.mark_deleted("z/late-name.txt").unwrap();
        let first = catalog.first_by_hash(&hash).unwrap().unwrap();
        assert_eq!(first.path, "a/early-name.txt");
    }

    #[test]
    fn test_exists_by_hash_ignores_tombstones() {
        let (_dir, catalog) = new_catalog();
        let hash = compute_hash(b"content");
        assert!(!catalog.exists_by_hash(&hash).unwrap());

        inserted(catalog.insert(&new_record("f", b"content")).unwrap());
        assert!(catalog.exists_by_hash(&hash).unwrap());

        catalog.mark_deleted("f").unwrap();
        assert!(!catalog.exists_by_hash(&hash).unwrap());
        assert!(catalog.find_by_hash(&hash).unwrap().is_empty());
    }

    #[test]
    fn test_mark_deleted_sets_flags() {
        let (_dir, catalog) = new_catalog();
        assert!(catalog.mark_deleted("missing").unwrap().is_none());

        inserted(catalog.insert(&new_record("f", b"content")).unwrap());
        let tombstone = catalog.mark_deleted("f").unwrap().unwrap();
        assert!(tombstone.tombstoned);
        assert!(tombstone.pending_push);
        assert!(catalog.get_active("f").unwrap().is_none());
        assert!(catalog.mark_deleted("f").unwrap().is_none());
    }

    #[test]
    fn test_pending_clear_and_purge() {
        let (_dir, catalog) = new_catalog();
        let mut pushed = new_record("pushed", b"p");
        pushed.pending_push = true;
        let pushed = inserted(catalog.insert(&pushed).unwrap());
        inserted(catalog.insert(&new_record("quiet", b"q")).unwrap());
        inserted(catalog.insert(&new_record("gone", b"g")).unwrap());
        let gone = catalog.mark_deleted("gone").unwrap().unwrap();

        let pending: Vec<_> = catalog
            .list_pending(10)
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(pending, vec!["pushed", "gone"]);
        assert_eq!(catalog.list_pending(1).unwrap().len(), 1);

        // Active rows are never purged, tombstones never "cleared".
        assert!(!catalog.purge(pushed.pk).unwrap());
        assert!(!catalog.clear_pending_push(gone.pk).unwrap());

        assert!(catalog.clear_pending_push(pushed.pk).unwrap());
        assert!(catalog.purge(gone.pk).unwrap());
        assert!(catalog.list_pending(10).unwrap().is_empty());
        assert!(catalog.list_path_history("gone").unwrap().is_empty());
    }
}
