use crate::{ByteStore, Catalog, FileRecord, KeyLocks, Result, normalize_path};
use std::sync::Arc;

/// Remove a file's bytes and tombstone its record so peers can still be told.
#[derive(Clone)]
pub struct DeleteFileOperation {
    content_store: Arc<dyn ByteStore>,
    catalog: Arc<Catalog>,
    path_locks: Arc<KeyLocks>,
}

#[derive(Debug, Clone)]
pub struct DeleteFileOperationRequest {
    pub path: String,
}

#[derive(Debug, Clone)]
pub enum DeleteFileOperationOutcome {
    Deleted(FileRecord),
    NotFound,
}

impl DeleteFileOperation {
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

    pub async fn run(&self, request: DeleteFileOperationRequest) -> Result<DeleteFileOperationOutcome> {
        let path = normalize_path(&request.path)?;

        let _guard = self.path_locks.lock(&path).await;

        if self.catalog.get_active(&path)?.is_none() {
            return Ok(DeleteFileOperationOutcome::NotFound);
        }

        // Bytes are moved aside, not deleted, until the tombstone commits.
        let stash = self.content_store.stash(&path).await?;
        if stash.is_none() {
            tracing::warn!("delete of {}: bytes already missing, tombstoning anyway", path);
        }

        let record = match self.catalog.mark_deleted(&path) {
            Ok(record) => record,
            Err(error) => {
                if let Some(stash) = stash {
                    if let Err(restore_error) = self.content_store.restore(stash).await {
                        tracing::error!(
                            "failed to restore bytes of {} after catalog error: {}",
                            path,
                            restore_error
                        );
                    }
                }
                return Err(error);
            }
        };

        let Some(record) = record else {
            if let Some(stash) = stash {
                self.content_store.restore(stash).await?;
            }
            return Ok(DeleteFileOperationOutcome::NotFound);
        };

        if let Some(stash) = stash {
            if let Err(error) = self.content_store.discard(stash).await {
                tracing::warn!("failed to drop stashed bytes of {}: {}", path, error);
            }
        }
        if let Err(error) = self.content_store.prune_empty_parents(&path).await {
            tracing::warn!("failed to prune directories above {}: {}", path, error);
        }

        tracing::info!("tombstoned path={} sha256={}", record.path, record.content_hash);
        Ok(DeleteFileOperationOutcome::Deleted(record))
    }
}
