//! Peerfs Core - per-node coordinator for a loosely replicated, content-addressed file store
//!
//! - Files are deduplicated by SHA256 content hash
//! - SQLite catalog with tombstones and propagation flags
//! - SQLite registry of fleet peers
//! - Per-path locking so bytes and metadata change together

pub mod error;
pub mod hash;
pub mod key_lock;
pub mod node;
pub mod operations;
pub mod path;
pub mod storage;

pub use error::{PeerfsError, Result};
pub use hash::{CONTENT_HASH_LEN, ContentHash, compute_hash, verify_hash};
pub use key_lock::{KeyGuard, KeyLocks};
pub use node::LocalNode;
pub use operations::*;
pub use path::{RESERVED_DIR, normalize_path};
pub use storage::{
    AddNodeOutcome, ByteStore, Catalog, FileRecord, InsertOutcome, LocalContentStore,
    MetaDatabase, NewFileRecord, NodeEntry, NodeRegistry, RemoveOutcome, Stash,
};
