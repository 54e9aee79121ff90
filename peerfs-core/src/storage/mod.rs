//! Storage modules for Peerfs
//!
//! Byte storage on the local filesystem plus the SQLite catalog and node registry.

pub mod catalog;
pub mod content_store;
pub mod database;
pub mod node_registry;

pub use catalog::{Catalog, FileRecord, InsertOutcome, NewFileRecord};
pub use content_store::{ByteStore, LocalContentStore, RemoveOutcome, Stash};
pub use database::MetaDatabase;
pub use node_registry::{AddNodeOutcome, NodeEntry, NodeRegistry};
