//! K-buckets.
//!
//! A bucket holds up to `capacity` node ids, ordered stalest-first. The
//! full [`Contact`] record lives in the storage adapter; a bucket only
//! caches the records it has been asked to resolve, via [`Bucket::load_contacts`].

use std::collections::{HashMap, VecDeque};

use crate::error::{Error, Result};
use crate::routing::keys;
use crate::routing::Contact;
use crate::hash::Id;
use crate::storage::StorageAdapter;

/// A bounded, ordered sequence of up to `capacity` node ids: least recently
/// seen at the head, most recently seen at the tail.
#[derive(Debug)]
pub struct Bucket {
    index: usize,
    capacity: usize,
    order: VecDeque<Id>,
    cache: HashMap<Id, Contact>,
}

impl Bucket {
    pub fn new(index: usize, capacity: usize) -> Bucket {
        Bucket {
            index,
            capacity,
            order: VecDeque::with_capacity(capacity),
            cache: HashMap::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Replaces `order` wholesale (used when reconstructing a bucket from
    /// the routing table's aggregate snapshot). Clears the contact cache,
    /// since the restored ids have not been resolved yet.
    pub(crate) fn restore_order(&mut self, order: Vec<Id>) {
        self.order = order.into();
        self.cache.clear();
    }

    /// A plain copy of the current node id order, for persistence.
    pub fn order_snapshot(&self) -> Vec<Id> {
        self.order.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.order.len() >= self.capacity
    }

    /// Appends `contact` at the tail (freshest position). Rejects a full
    /// bucket or a node id already present; both are caller-interpreted
    /// conditions, never surfaced past `update_contact`.
    pub fn add(&mut self, contact: Contact) -> Result<usize> {
        if self.order.len() >= self.capacity {
            return Err(Error::BucketFull);
        }
        if self.order.contains(&contact.node_id) {
            return Err(Error::DuplicateContact);
        }
        self.order.push_back(contact.node_id);
        self.cache.insert(contact.node_id, contact);
        Ok(self.order.len() - 1)
    }

    /// Removes a contact by node id, returning the removed record if it had
    /// been resolved into the cache.
    pub fn remove(&mut self, node_id: &Id) -> Result<Contact> {
        let position = self
            .order
            .iter()
            .position(|id| id == node_id)
            .ok_or(Error::NotPresent)?;
        self.order.remove(position);
        self.cache.remove(node_id).ok_or(Error::NotPresent)
    }

    pub fn has(&self, node_id: &Id) -> bool {
        self.order.contains(node_id)
    }

    pub fn index_of(&self, node_id: &Id) -> Option<usize> {
        self.order.iter().position(|id| id == node_id)
    }

    /// Resolves `order[pos]` to a full [`Contact`], fetching it from
    /// storage and caching it if it wasn't already cached.
    pub async fn get(&mut self, pos: usize, storage: &dyn StorageAdapter) -> Result<Contact> {
        let node_id = *self
            .order
            .get(pos)
            .ok_or(Error::OutOfRange {
                position: pos,
                size: self.order.len(),
            })?;
        self.resolve(&node_id, storage).await
    }

    async fn resolve(&mut self, node_id: &Id, storage: &dyn StorageAdapter) -> Result<Contact> {
        if let Some(contact) = self.cache.get(node_id) {
            return Ok(contact.clone());
        }
        let contact = fetch_contact(storage, node_id).await?;
        self.cache.insert(*node_id, contact.clone());
        Ok(contact)
    }

    /// Snapshot of the currently cached contacts, in bucket order. Entries
    /// not yet resolved via [`Bucket::load_contacts`] are omitted.
    pub fn list(&self) -> Vec<Contact> {
        self.order
            .iter()
            .filter_map(|id| self.cache.get(id).cloned())
            .collect()
    }

    /// Persists `order` under `BUCKET-i`, and ensures `i` is recorded in the
    /// `BUCKETS` index list.
    pub async fn save(&self, storage: &dyn StorageAdapter) -> Result<()> {
        let order: Vec<Id> = self.order.iter().copied().collect();
        let encoded = bincode::serialize(&order).map_err(|e| Error::Storage(e.to_string()))?;
        storage.put(&keys::bucket_key(self.index), encoded).await?;

        let mut indexes = read_bucket_indexes(storage).await?;
        if indexes.insert(self.index) {
            write_bucket_indexes(storage, &indexes).await?;
        }
        Ok(())
    }

    /// Replaces `order` from `BUCKET-i`. A silent no-op if the key is
    /// absent — an unpersisted bucket is just an empty one.
    pub async fn load(&mut self, storage: &dyn StorageAdapter) -> Result<()> {
        match storage.get(&keys::bucket_key(self.index)).await? {
            Some(bytes) => {
                let order: Vec<Id> =
                    bincode::deserialize(&bytes).map_err(|e| Error::Storage(e.to_string()))?;
                self.order = order.into();
                self.cache.clear();
            }
            None => {
                self.order.clear();
                self.cache.clear();
            }
        }
        Ok(())
    }

    /// Populates the local cache by reading every node id currently in
    /// `order`. A miss on any single entry fails the whole batch.
    pub async fn load_contacts(&mut self, storage: &dyn StorageAdapter) -> Result<()> {
        let ids: Vec<Id> = self.order.iter().copied().collect();
        for id in ids {
            if !self.cache.contains_key(&id) {
                let contact = fetch_contact(storage, &id).await?;
                self.cache.insert(id, contact);
            }
        }
        Ok(())
    }

    /// Loads the bucket, deletes every contained contact record, then
    /// deletes the bucket's own `BUCKET-i` entry.
    pub async fn empty(&mut self, storage: &dyn StorageAdapter) -> Result<()> {
        self.load(storage).await?;
        let ids: Vec<Id> = self.order.iter().copied().collect();
        for id in ids {
            storage.del(&keys::contact_key(&id)).await?;
        }
        storage.del(&keys::bucket_key(self.index)).await?;
        self.order.clear();
        self.cache.clear();
        Ok(())
    }
}

async fn fetch_contact(storage: &dyn StorageAdapter, node_id: &Id) -> Result<Contact> {
    let bytes = storage
        .get(&keys::contact_key(node_id))
        .await?
        .ok_or(Error::ContactUnknown(*node_id))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Storage(e.to_string()))
}

async fn read_bucket_indexes(storage: &dyn StorageAdapter) -> Result<std::collections::BTreeSet<usize>> {
    match storage.get(keys::BUCKETS_KEY).await? {
        Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| Error::Storage(e.to_string())),
        None => Ok(std::collections::BTreeSet::new()),
    }
}

async fn write_bucket_indexes(
    storage: &dyn StorageAdapter,
    indexes: &std::collections::BTreeSet<usize>,
) -> Result<()> {
    let encoded = serde_json::to_vec(indexes).map_err(|e| Error::Storage(e.to_string()))?;
    storage.put(keys::BUCKETS_KEY, encoded).await
}
