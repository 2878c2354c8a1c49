//! The routing table: a sparse map from bucket index to [`Bucket`], plus
//! the content-addressed contact store, persisted write-through via a
//! [`StorageAdapter`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::hash::{Id, BITS};
use crate::routing::{keys, Bucket, Contact};
use crate::storage::StorageAdapter;

struct State {
    loaded: bool,
    buckets: HashMap<usize, Arc<Mutex<Bucket>>>,
}

/// The locally-held, distance-partitioned view of the overlay network.
pub struct RoutingTable {
    self_id: Id,
    k: usize,
    storage: Arc<dyn StorageAdapter>,
    state: Mutex<State>,
}

impl RoutingTable {
    pub fn new(self_id: Id, k: usize, storage: Arc<dyn StorageAdapter>) -> RoutingTable {
        RoutingTable {
            self_id,
            k,
            storage,
            state: Mutex::new(State {
                loaded: false,
                buckets: HashMap::new(),
            }),
        }
    }

    pub fn self_id(&self) -> Id {
        self.self_id
    }

    /// Lazily materializes the bucket map from the `ROUTING-TABLE`
    /// snapshot. An absent or corrupt snapshot is treated as an empty
    /// table, never as an error.
    async fn ensure_loaded(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.loaded {
            return Ok(());
        }

        let snapshot = read_snapshot(&*self.storage).await.unwrap_or_default();
        for (index, order) in snapshot {
            let mut bucket = Bucket::new(index, self.k);
            bucket.restore_order(order);
            state.buckets.insert(index, Arc::new(Mutex::new(bucket)));
        }
        state.loaded = true;
        Ok(())
    }

    /// Sum of bucket sizes.
    pub async fn size(&self) -> Result<usize> {
        self.ensure_loaded().await?;
        let state = self.state.lock().await;
        let mut total = 0;
        for bucket in state.buckets.values() {
            total += bucket.lock().await.len();
        }
        Ok(total)
    }

    /// The set of populated bucket indices.
    pub async fn indexes(&self) -> Result<Vec<usize>> {
        self.ensure_loaded().await?;
        let state = self.state.lock().await;
        let mut populated = Vec::new();
        for (index, bucket) in state.buckets.iter() {
            if !bucket.lock().await.is_empty() {
                populated.push(*index);
            }
        }
        populated.sort_unstable();
        Ok(populated)
    }

    /// Drops all buckets in memory and persists an empty snapshot.
    pub async fn empty(&self) -> Result<()> {
        self.ensure_loaded().await?;
        let mut state = self.state.lock().await;
        for bucket in state.buckets.values() {
            bucket.lock().await.empty(&*self.storage).await?;
        }
        state.buckets.clear();
        drop(state);
        write_snapshot(&*self.storage, &BTreeMap::new()).await?;
        self.storage.del(keys::BUCKETS_KEY).await?;
        debug!("routing table emptied");
        Ok(())
    }

    /// Returns the bucket at index `i`, creating (and persisting) an empty
    /// one if necessary.
    pub async fn get_bucket(&self, index: usize) -> Result<Arc<Mutex<Bucket>>> {
        if index >= BITS {
            return Err(Error::InvalidBucketIndex(index));
        }
        self.ensure_loaded().await?;
        let mut state = self.state.lock().await;
        if let Some(bucket) = state.buckets.get(&index) {
            return Ok(Arc::clone(bucket));
        }

        let bucket = Bucket::new(index, self.k);
        bucket.save(&*self.storage).await?;
        write_snapshot_entry(&*self.storage, index, &[]).await?;
        let handle = Arc::new(Mutex::new(bucket));
        state.buckets.insert(index, Arc::clone(&handle));
        trace!(bucket = index, "created empty bucket");
        Ok(handle)
    }

    /// Returns the bucket at index `i` only if it already exists, without
    /// creating one. Used by the nearest-contacts walk to skip over
    /// never-populated indices without persisting anything.
    pub async fn existing_bucket(&self, index: usize) -> Result<Option<Arc<Mutex<Bucket>>>> {
        self.ensure_loaded().await?;
        let state = self.state.lock().await;
        Ok(state.buckets.get(&index).map(Arc::clone))
    }

    /// Succeeds iff bucket `i` exists and is non-empty.
    pub async fn has_bucket(&self, index: usize) -> Result<bool> {
        match self.existing_bucket(index).await? {
            Some(bucket) => Ok(!bucket.lock().await.is_empty()),
            None => Ok(false),
        }
    }

    /// Deserializes the Contact record for `node_id` from the store.
    pub async fn get_contact(&self, node_id: &Id) -> Result<Contact> {
        let bytes = self
            .storage
            .get(&keys::contact_key(node_id))
            .await?
            .ok_or(Error::ContactUnknown(*node_id))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Storage(e.to_string()))
    }

    /// Upserts the Contact record keyed by `node_id`.
    pub async fn set_contact(&self, contact: &Contact) -> Result<()> {
        let encoded = serde_json::to_vec(contact).map_err(|e| Error::Storage(e.to_string()))?;
        self.storage
            .put(&keys::contact_key(&contact.node_id), encoded)
            .await
    }

    /// Succeeds iff some bucket contains `contact.node_id`.
    pub async fn in_table(&self, contact: &Contact) -> Result<bool> {
        let Some(index) = Id::bucket_index(&self.self_id, &contact.node_id) else {
            return Ok(false);
        };
        match self.existing_bucket(index).await? {
            Some(bucket) => Ok(bucket.lock().await.has(&contact.node_id)),
            None => Ok(false),
        }
    }

    /// Persists a bucket's current order under its own `BUCKET-i` record
    /// (and the `BUCKETS` index list) and keeps the `ROUTING-TABLE`
    /// aggregate snapshot in sync with it. Used by the router after every
    /// structural mutation, so a fresh `RoutingTable` reloaded from the
    /// same adapter reproduces the same state.
    pub async fn persist_bucket(&self, bucket: &Bucket) -> Result<()> {
        bucket.save(&*self.storage).await?;
        write_snapshot_entry(&*self.storage, bucket.index(), &bucket.order_snapshot()).await
    }

    pub fn storage(&self) -> &dyn StorageAdapter {
        &*self.storage
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

async fn read_snapshot(storage: &dyn StorageAdapter) -> Result<BTreeMap<usize, Vec<Id>>> {
    match storage.get(keys::ROUTING_TABLE_KEY).await? {
        Some(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_default()),
        None => Ok(BTreeMap::new()),
    }
}

async fn write_snapshot(storage: &dyn StorageAdapter, snapshot: &BTreeMap<usize, Vec<Id>>) -> Result<()> {
    let encoded = serde_json::to_vec(snapshot).map_err(|e| Error::Storage(e.to_string()))?;
    storage.put(keys::ROUTING_TABLE_KEY, encoded).await
}

async fn write_snapshot_entry(storage: &dyn StorageAdapter, index: usize, order: &[Id]) -> Result<()> {
    let mut snapshot = read_snapshot(storage).await.unwrap_or_default();
    snapshot.insert(index, order.to_vec());
    write_snapshot(storage, &snapshot).await
}
