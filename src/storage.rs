//! The storage adapter: an external, opaque key-value collaborator that the
//! routing table persists itself through. Wire encoding, on-disk layout,
//! and durability all belong to whatever implements this trait; the core
//! only ever sees byte strings under its own key namespace.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;

/// Four operations the routing table needs from a key-value store, plus a
/// streaming enumeration primitive whose presence is asserted but which the
/// core never calls directly — kept on the trait for forward compatibility
/// with adapters that want to offer bulk export/import.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &[u8], value: Vec<u8>) -> Result<()>;
    async fn del(&self, key: &[u8]) -> Result<()>;

    /// Enumerates all keys currently held by the adapter. Asserted by the
    /// trait, unused by the routing core itself.
    async fn create_read_stream(&self) -> Result<Vec<Vec<u8>>>;
}

/// Reference in-memory adapter. Not part of any durability story — it
/// exists so the routing core has something concrete to run its own tests
/// against.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.entries.lock().await.insert(key.to_vec(), value);
        Ok(())
    }

    async fn del(&self, key: &[u8]) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn create_read_stream(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }
}
