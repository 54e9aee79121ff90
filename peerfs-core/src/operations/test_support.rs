use crate::operations::*;
use crate::{
    ByteStore, Catalog, ContentHash, FileRecord, KeyLocks, LocalContentStore, MetaDatabase,
    NodeRegistry, RESERVED_DIR, compute_hash,
};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;

/// A node on a scratch directory with every operation wired up.
pub(crate) struct TestNode {
    _dir: tempfile::TempDir,
    db_path: PathBuf,
    pub content_store: Arc<dyn ByteStore>,
    pub catalog: Arc<Catalog>,
    pub registry: Arc<NodeRegistry>,
    pub path_locks: Arc<KeyLocks>,
    pub ingest: IngestFileOperation,
    pub clone_file: CloneFileOperation,
    pub delete: DeleteFileOperation,
    pub query_hash: QueryHashOperation,
    pub membership: NodeMembershipOperation,
}

impl TestNode {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join(RESERVED_DIR).join("meta.db");

        let content_store: Arc<dyn ByteStore> =
            Arc::new(LocalContentStore::new(dir.path().to_path_buf()).unwrap());
        let db = MetaDatabase::open(db_path.clone()).unwrap();
        let catalog = Arc::new(Catalog::new(db.clone()).unwrap());
        let registry = Arc::new(NodeRegistry::new(db).unwrap());
        let path_locks = Arc::new(KeyLocks::new());

        Self {
            ingest: IngestFileOperation::new(
                content_store.clone(),
                catalog.clone(),
                path_locks.clone(),
            ),
            clone_file: CloneFileOperation::new(
                content_store.clone(),
                catalog.clone(),
                path_locks.clone(),
            ),
            delete: DeleteFileOperation::new(
                content_store.clone(),
                catalog.clone(),
                path_locks.clone(),
            ),
            query_hash: QueryHashOperation::new(catalog.clone()),
            membership: NodeMembershipOperation::new(registry.clone()),
            content_store,
            catalog,
            registry,
            path_locks,
            db_path,
            _dir: dir,
        }
    }

    /// Make every `event` (INSERT or UPDATE) on the files table abort.
    pub fn break_catalog(&self, event: &str) {
        let conn = rusqlite::Connection::open(&self.db_path).unwrap();
        conn.execute_batch(&format!(
            "CREATE TRIGGER fail_files_{name} BEFORE {event} ON files
             BEGIN SELECT RAISE(ABORT, 'catalog unavailable'); END;",
            name = event.to_lowercase(),
        ))
        .unwrap();
    }

    pub async fn ingest_ok(&self, path: &str, content: &[u8]) -> FileRecord {
        let outcome = self
            .ingest
            .run(IngestFileOperationRequest {
                path: path.to_string(),
                body: Bytes::copy_from_slice(content),
            })
            .await
            .unwrap();
        match outcome {
            IngestFileOperationOutcome::Created(record) => record,
            other => panic!("ingest of {path} failed: {other:?}"),
        }
    }

    pub async fn clone_ok(&self, new_path: &str, content: &[u8]) -> FileRecord {
        let content_hash: ContentHash = compute_hash(content);
        let outcome = self
            .clone_file
            .run(CloneFileOperationRequest {
                new_path: new_path.to_string(),
                content_hash,
            })
            .await
            .unwrap();
        match outcome {
            CloneFileOperationOutcome::Cloned { record, .. } => record,
            other => panic!("clone to {new_path} failed: {other:?}"),
        }
    }

    pub async fn delete_ok(&self, path: &str) -> FileRecord {
        let outcome = self
            .delete
            .run(DeleteFileOperationRequest {
                path: path.to_string(),
            })
            .await
            .unwrap();
        match outcome {
            DeleteFileOperationOutcome::Deleted(record) => record,
            other => panic!("delete of {path} failed: {other:?}"),
        }
    }
}
