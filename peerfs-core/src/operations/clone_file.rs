use crate::operations::ingest_file::discard_bytes;
use crate::{
    ByteStore, Catalog, ContentHash, FileRecord, InsertOutcome, KeyLocks, NewFileRecord,
    PeerfsError, Result, normalize_path, verify_hash,
};
use std::sync::Arc;

/// Source lookups retried when the chosen source is deleted while we wait for its lock.
const MAX_SOURCE_ATTEMPTS: usize = 3;

/// Materialize already known content under a new path by copying local bytes.
#[derive(Clone)]
pub struct CloneFileOperation {
    content_store: Arc<dyn ByteStore>,
    catalog: Arc<Catalog>,
    path_locks: Arc<KeyLocks>,
}

#[derive(Debug, Clone)]
pub struct CloneFileOperationRequest {
    pub new_path: String,
    pub content_hash: ContentHash,
}

#[derive(Debug, Clone)]
pub enum CloneFileOperationOutcome {
    Cloned {
        record: FileRecord,
        source_path: String,
    },
    /// No active record carries the hash.
    NotFound,
    /// `new_path` already has an active record.
    AlreadyExists,
}

impl CloneFileOperation {
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

    pub async fn run(&self, request: CloneFileOperationRequest) -> Result<CloneFileOperationOutcome> {
        let CloneFileOperationRequest {
            new_path,
            content_hash,
        } = request;
        let new_path = normalize_path(&new_path)?;

        for _ in 0..MAX_SOURCE_ATTEMPTS {
            // Earliest inserted active record wins.
            let Some(source) = self.catalog.first_by_hash(&content_hash)? else {
                tracing::debug!("clone to {} found no record for {}", new_path, content_hash);
                return Ok(CloneFileOperationOutcome::NotFound);
            };

            let _guards = self
                .path_locks
                .lock_many(&[source.path.as_str(), new_path.as_str()])
                .await;

            if self.catalog.get_active(&new_path)?.is_some() {
                return Ok(CloneFileOperationOutcome::AlreadyExists);
            }

            let still_there = self
                .catalog
                .get_active(&source.path)?
                .is_some_and(|current| current.content_hash == content_hash);
            if !still_there {
                tracing::debug!("clone source {} went away, looking again", source.path);
                continue;
            }

            let record = self.copy_and_record(&source.path, &new_path, content_hash).await?;
            tracing::info!(
                "cloned path={} from={} sha256={}",
                record.path,
                source.path,
                record.content_hash
            );
            return Ok(CloneFileOperationOutcome::Cloned {
                record,
                source_path: source.path,
            });
        }

        Ok(CloneFileOperationOutcome::NotFound)
    }

    async fn copy_and_record(
        &self,
        source_path: &str,
        new_path: &str,
        content_hash: ContentHash,
    ) -> Result<FileRecord> {
        self.content_store.copy(source_path, new_path).await?;

        let verified = match self.content_store.read(new_path).await {
            Ok(copied) => verify_hash(&copied, &content_hash),
            Err(error) => Err(error),
        };
        if let Err(error) = verified {
            discard_bytes(self.content_store.as_ref(), new_path).await;
            return Err(error);
        }

        let record = NewFileRecord {
            path: new_path.to_string(),
            content_hash,
            last_modified: chrono::Utc::now(),
            pending_push: false,
        };

        match self.catalog.insert(&record) {
            Ok(InsertOutcome::Inserted(record)) => Ok(record),
            Ok(InsertOutcome::AlreadyExists) => Err(PeerfsError::Internal(format!(
                "active record for {} appeared while its path lock was held",
                new_path
            ))),
            Err(error) => {
                discard_bytes(self.content_store.as_ref(), new_path).await;
                Err(error)
            }
        }
    }
}
