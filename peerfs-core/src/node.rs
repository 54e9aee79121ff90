use crate::operations::{
    CloneFileOperation, DeleteFileOperation, IngestFileOperation, NodeMembershipOperation,
    QueryHashOperation,
};
use crate::path::RESERVED_DIR;
use crate::{ByteStore, Catalog, KeyLocks, LocalContentStore, MetaDatabase, NodeRegistry, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_DB_FILE: &str = "meta.db";

/// Everything one node owns: its byte store, catalog, peer registry and the
/// per-path locks shared by all file operations.
#[derive(Clone)]
pub struct LocalNode {
    content_store: Arc<dyn ByteStore>,
    catalog: Arc<Catalog>,
    registry: Arc<NodeRegistry>,
    path_locks: Arc<KeyLocks>,
}

impl LocalNode {
    /// Open the node's stores under `data_dir`. The metadata db defaults to
    /// `{data_dir}/.peerfs/meta.db`.
    pub fn open(data_dir: &Path, db_path: Option<PathBuf>) -> Result<Self> {
        let content_store = Arc::new(LocalContentStore::new(data_dir.to_path_buf())?);
        let db_path =
            db_path.unwrap_or_else(|| data_dir.join(RESERVED_DIR).join(DEFAULT_DB_FILE));
        let db = MetaDatabase::open(db_path)?;

        Ok(Self::with_stores(
            content_store,
            Arc::new(Catalog::new(db.clone())?),
            Arc::new(NodeRegistry::new(db)?),
        ))
    }

    pub fn with_stores(
        content_store: Arc<dyn ByteStore>,
        catalog: Arc<Catalog>,
        registry: Arc<NodeRegistry>,
    ) -> Self {
        Self {
            content_store,
            catalog,
            registry,
            path_locks: Arc::new(KeyLocks::new()),
        }
    }

    pub fn content_store(&self) -> &Arc<dyn ByteStore> {
        &self.content_store
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn ingest_operation(&self) -> IngestFileOperation {
        IngestFileOperation::new(
            self.content_store.clone(),
            self.catalog.clone(),
            self.path_locks.clone(),
        )
    }

    pub fn clone_operation(&self) -> CloneFileOperation {
        CloneFileOperation::new(
            self.content_store.clone(),
            self.catalog.clone(),
            self.path_locks.clone(),
        )
    }

    pub fn delete_operation(&self) -> DeleteFileOperation {
        DeleteFileOperation::new(
            self.content_store.clone(),
            self.catalog.clone(),
            self.path_locks.clone(),
        )
    }

    pub fn query_hash_operation(&self) -> QueryHashOperation {
        QueryHashOperation::new(self.catalog.clone())
    }

    pub fn membership_operation(&self) -> NodeMembershipOperation {
        NodeMembershipOperation::new(self.registry.clone())
    }
}
