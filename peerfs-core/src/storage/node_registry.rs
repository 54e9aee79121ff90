use crate::error::Result;
use crate::storage::database::MetaDatabase;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// A registered peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub address: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddNodeOutcome {
    Added,
    AlreadyRegistered,
}

/// Persistent set of peer addresses.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    db: MetaDatabase,
}

impl NodeRegistry {
    pub fn new(db: MetaDatabase) -> Result<Self> {
        let registry = Self { db };
        registry.init_schema()?;
        Ok(registry)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.db.connect()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                address TEXT PRIMARY KEY,
                registered_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Register a peer. The uniqueness check and the insert are one statement.
    pub fn add_node(&self, address: &str) -> Result<AddNodeOutcome> {
        let conn = self.db.connect()?;

        let inserted = conn.execute(
            "INSERT INTO nodes (address, registered_at) VALUES (?1, ?2)
             ON CONFLICT(address) DO NOTHING",
            params![address, Utc::now().to_rfc3339()],
        )?;

        if inserted == 0 {
            Ok(AddNodeOutcome::AlreadyRegistered)
        } else {
            Ok(AddNodeOutcome::Added)
        }
    }

    /// Deregister a peer. Succeeds whether or not it was registered; returns
    /// whether a row was actually dropped.
    pub fn remove_node(&self, address: &str) -> Result<bool> {
        let conn = self.db.connect()?;

        let affected = conn.execute("DELETE FROM nodes WHERE address = ?1", [address])?;

        Ok(affected > 0)
    }

    pub fn contains(&self, address: &str) -> Result<bool> {
        let conn = self.db.connect()?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM nodes WHERE address = ?1)",
            [address],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    /// All peers, in registration order.
    pub fn list_nodes(&self) -> Result<Vec<NodeEntry>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(
            "SELECT address, registered_at FROM nodes ORDER BY registered_at, address",
        )?;

        let rows = stmt.query_map([], |row| {
            let address: String = row.get(0)?;
            let registered_at: String = row.get(1)?;

            Ok(NodeEntry {
                address,
                registered_at: DateTime::parse_from_rfc3339(&registered_at)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?
                    .with_timezone(&Utc),
            })
        })?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row?);
        }

        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_registry() -> (tempfile::TempDir, NodeRegistry) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = MetaDatabase::open(temp_dir.path().join("meta.db")).unwrap();
        (temp_dir, NodeRegistry::new(db).unwrap())
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let (_dir, registry) = new_registry();

        assert_eq!(registry.add_node("10.0.0.1").unwrap(), AddNodeOutcome::Added);
        assert_eq!(
            registry.add_node("10.0.0.1").unwrap(),
            AddNodeOutcome::AlreadyRegistered
        );

        let nodes = registry.list_nodes().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].address, "10.0.0.1");
    }

    #[test]
    fn test_remove_node_always_succeeds() {
        let (_dir, registry) = new_registry();

        assert!(!registry.remove_node("10.0.0.9").unwrap());

        registry.add_node("10.0.0.9").unwrap();
        assert!(registry.contains("10.0.0.9").unwrap());
        assert!(registry.remove_node("10.0.0.9").unwrap());
        assert!(!registry.remove_node("10.0.0.9").unwrap());
        assert!(!registry.contains("10.0.0.9").unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_add_node_creates_one_entry() {
        let (_dir, registry) = new_registry();
        let registry = Arc::new(registry);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                registry.add_node("192.168.1.7").unwrap()
            }));
        }

        let mut added = 0;
        for handle in handles {
            if handle.await.unwrap() == AddNodeOutcome::Added {
                added += 1;
            }
        }

        assert_eq!(added, 1);
        assert_eq!(registry.list_nodes().unwrap().len(), 1);
    }
}
