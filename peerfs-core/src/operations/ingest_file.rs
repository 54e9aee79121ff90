use crate::{
    ByteStore, Catalog, FileRecord, InsertOutcome, KeyLocks, NewFileRecord, PeerfsError, Result,
    normalize_path,
};
use bytes::Bytes;
use std::sync::Arc;

#[derive(Clone)]
pub struct IngestFileOperation {
    content_store: Arc<dyn ByteStore>,
    catalog: Arc<Catalog>,
    path_locks: Arc<KeyLocks>,
}

#[derive(Debug, Clone)]
pub struct IngestFileOperationRequest {
    pub path: String,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub enum IngestFileOperationOutcome {
    Created(FileRecord),
    AlreadyExists,
}

impl IngestFileOperation {
    pub fn new(
        content_store: Arc<dyn ByteStore>,
        catalog: Arc<Catalog>,
        path_locks: Arc<KeyLocks>,
    ) -> Self {
        Self {
            content_store,
            catalog,
            path_locks,
        }
    }

    pub async fn run(&self, request: IngestFileOperationRequest) -> Result<IngestFileOperationOutcome> {
        let IngestFileOperationRequest { path, body } = request;
        let path = normalize_path(&path)?;

        let _guard = self.path_locks.lock(&path).await;

        if self.catalog.get_active(&path)?.is_some() {
            tracing::debug!("ingest refused, {} already active", path);
            return Ok(IngestFileOperationOutcome::AlreadyExists);
        }

        let size = body.len();
        self.content_store.write(&path, body).await?;

        // The recorded hash comes from what actually landed on disk.
        let content_hash = match self.content_store.hash(&path).await {
            Ok(hash) => hash,
            Err(error) => {
                discard_bytes(self.content_store.as_ref(), &path).await;
                return Err(error);
            }
        };

        let record = NewFileRecord {
            path: path.clone(),
            content_hash,
            last_modified: chrono::Utc::now(),
            pending_push: false,
        };

        match self.catalog.insert(&record) {
            Ok(InsertOutcome::Inserted(record)) => {
                tracing::info!(
                    "ingested path={} sha256={} bytes={}",
                    record.path,
                    record.content_hash,
                    size
                );
                Ok(IngestFileOperationOutcome::Created(record))
            }
            Ok(InsertOutcome::AlreadyExists) => Err(PeerfsError::Internal(format!(
                "active record for {} appeared while its path lock was held",
                path
            ))),
            Err(error) => {
                discard_bytes(self.content_store.as_ref(), &path).await;
                Err(error)
            }
        }
    }
}

/// Roll back bytes written for a record that never committed.
pub(crate) async fn discard_bytes(content_store: &dyn ByteStore, path: &str) {
    if let Err(error) = content_store.remove(path).await {
        tracing::warn!("failed to roll back bytes at {}: {}", path, error);
        return;
    }
    if let Err(error) = content_store.prune_empty_parents(path).await {
        tracing::warn!("failed to prune directories above {}: {}", path, error);
    }
}
