use crate::error::{PeerfsError, Result};
use crate::hash::{ContentHash, compute_hash};
use crate::path::{RESERVED_DIR, normalize_path};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Bytes moved aside by [`ByteStore::stash`], waiting to be discarded or put back.
#[derive(Debug)]
pub struct Stash {
    path: String,
    staged: PathBuf,
}

impl Stash {
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Byte-level storage keyed by relative path.
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Write bytes at `path`, creating parent directories and replacing existing content.
    async fn write(&self, path: &str, data: Bytes) -> Result<()>;

    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Duplicate the bytes at `src` into `dst`, creating parent directories of `dst`.
    async fn copy(&self, src: &str, dst: &str) -> Result<()>;

    /// Remove a regular file or an empty directory.
    async fn remove(&self, path: &str) -> Result<RemoveOutcome>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Recompute the hash of the bytes currently stored at `path`.
    async fn hash(&self, path: &str) -> Result<ContentHash>;

    /// Move the file at `path` aside. Returns `None` when nothing is stored there.
    async fn stash(&self, path: &str) -> Result<Option<Stash>>;

    /// Put stashed bytes back at their original path.
    async fn restore(&self, stash: Stash) -> Result<()>;

    /// Drop stashed bytes for good.
    async fn discard(&self, stash: Stash) -> Result<()>;

    /// Remove empty directories above `path`, deepest first, stopping at the first
    /// directory that is not empty.
    async fn prune_empty_parents(&self, path: &str) -> Result<()>;
}

/// ByteStore over the local filesystem, rooted at a data directory.
/// Files live at {base_path}/{path}; scratch files under {base_path}/.peerfs.
pub struct LocalContentStore {
    base_path: PathBuf,
    scratch_seq: AtomicU64,
}

impl LocalContentStore {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(base_path.join(RESERVED_DIR).join("tmp"))?;
        std::fs::create_dir_all(base_path.join(RESERVED_DIR).join("stash"))?;
        Ok(Self {
            base_path,
            scratch_seq: AtomicU64::new(0),
        })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let normalized = normalize_path(path)?;
        Ok(self.base_path.join(normalized))
    }

    fn scratch_path(&self, area: &str) -> PathBuf {
        let seq = self.scratch_seq.fetch_add(1, Ordering::Relaxed);
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        self.base_path
            .join(RESERVED_DIR)
            .join(area)
            .join(format!("{}-{}-{}", std::process::id(), nanos, seq))
    }

    async fn ensure_parent(&self, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Move a fully written scratch file into place.
    async fn publish(&self, temp_path: &Path, target: &Path) -> Result<()> {
        let mut result = self.try_publish(temp_path, target).await;
        // A delete elsewhere may prune the parent between mkdir and rename.
        if matches!(&result, Err(PeerfsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound)
        {
            result = self.try_publish(temp_path, target).await;
        }
        if result.is_err() {
            let _ = fs::remove_file(temp_path).await;
        }
        result
    }

    async fn try_publish(&self, temp_path: &Path, target: &Path) -> Result<()> {
        self.ensure_parent(target).await?;
        fs::rename(temp_path, target).await?;
        Ok(())
    }
}

#[async_trait]
impl ByteStore for LocalContentStore {
    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        let target = self.resolve(path)?;

        // Write to temporary file first, then rename for atomicity
        let temp_path = self.scratch_path("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        self.publish(&temp_path, &target).await?;

        tracing::debug!("Stored {} bytes at {}", data.len(), path);
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let target = self.resolve(path)?;
        let data = fs::read(&target).await?;
        Ok(Bytes::from(data))
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let source = self.resolve(src)?;
        let target = self.resolve(dst)?;

        let temp_path = self.scratch_path("tmp");
        if let Err(error) = fs::copy(&source, &temp_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(error.into());
        }
        fs::File::open(&temp_path).await?.sync_all().await?;

        self.publish(&temp_path, &target).await?;

        tracing::debug!("Copied {} to {}", src, dst);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<RemoveOutcome> {
        let target = self.resolve(path)?;

        let metadata = match fs::symlink_metadata(&target).await {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RemoveOutcome::NotFound);
            }
            Err(error) => return Err(error.into()),
        };

        if metadata.is_dir() {
            fs::remove_dir(&target).await?;
        } else {
            fs::remove_file(&target).await?;
        }

        tracing::debug!("Removed {}", path);
        Ok(RemoveOutcome::Removed)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let target = self.resolve(path)?;
        Ok(fs::try_exists(&target).await?)
    }

    async fn hash(&self, path: &str) -> Result<ContentHash> {
        let data = self.read(path).await?;
        Ok(compute_hash(&data))
    }

    async fn stash(&self, path: &str) -> Result<Option<Stash>> {
        let target = self.resolve(path)?;
        let staged = self.scratch_path("stash");

        match fs::rename(&target, &staged).await {
            Ok(()) => Ok(Some(Stash {
                path: path.to_string(),
                staged,
            })),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn restore(&self, stash: Stash) -> Result<()> {
        let target = self.resolve(&stash.path)?;
        self.ensure_parent(&target).await?;
        fs::rename(&stash.staged, &target).await?;
        Ok(())
    }

    async fn discard(&self, stash: Stash) -> Result<()> {
        fs::remove_file(&stash.staged).await?;
        Ok(())
    }

    async fn prune_empty_parents(&self, path: &str) -> Result<()> {
        let normalized = normalize_path(path)?;
        let mut current = Path::new(&normalized).parent();

        while let Some(dir) = current {
            let Some(dir_str) = dir.to_str().filter(|value| !value.is_empty()) else {
                break;
            };
            match self.remove(dir_str).await {
                Ok(_) => tracing::debug!("Pruned empty directory {}", dir_str),
                Err(PeerfsError::Io(_)) => break,
                Err(error) => return Err(error),
            }
            current = dir.parent();
        }

        Ok(())
    }
}
