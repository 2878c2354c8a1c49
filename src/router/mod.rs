//! The router: the only component that talks to the RPC transport. Owns
//! contact update/eviction policy, nearest-contact retrieval, and drives
//! the iterative lookup state machine defined in [`lookup`].

mod lookup;

pub use lookup::{LookupKind, LookupOutcome};

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::events::{self, Event, EventReceiver, EventSender};
use crate::hash::{Id, BITS};
use crate::routing::{Contact, RoutingTable};
use crate::rpc::Request;
use crate::transport::Transport;
use crate::validator::{AcceptAll, Validator};

pub struct Router {
    self_id: Id,
    table: Arc<RoutingTable>,
    transport: Arc<dyn Transport>,
    validator: Arc<dyn Validator>,
    config: Configuration,
    events: EventSender,
}

impl Router {
    pub fn new(
        table: Arc<RoutingTable>,
        transport: Arc<dyn Transport>,
        validator: Option<Arc<dyn Validator>>,
        config: Configuration,
    ) -> Router {
        let (events, _) = events::channel();
        Router {
            self_id: table.self_id(),
            table,
            transport,
            validator: validator.unwrap_or_else(|| Arc::new(AcceptAll)),
            config,
            events,
        }
    }

    pub fn self_id(&self) -> Id {
        self.self_id
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn self_contact(&self) -> Contact {
        self.transport.self_contact().clone()
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn validator(&self) -> &Arc<dyn Validator> {
        &self.validator
    }

    /// Subscribes to `add`/`drop`/`shift` lifecycle events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    fn emit(&self, event: Event) {
        // No subscribers is not an error; the event is simply dropped.
        let _ = self.events.send(event);
    }

    /// Enforces Kademlia's LRU-with-liveness-probe eviction policy for an
    /// observed contact.
    pub async fn update_contact(&self, mut contact: Contact) -> Result<()> {
        contact.seen();
        self.table.set_contact(&contact).await?;

        let index = Id::bucket_index(&self.self_id, &contact.node_id)
            .ok_or(Error::InvalidBucketIndex(0))?;
        debug_assert!(index < BITS);

        let bucket_handle = self.table.get_bucket(index).await?;
        let mut bucket = bucket_handle.lock().await;
        bucket.load_contacts(self.table.storage()).await?;

        if bucket.has(&contact.node_id) {
            bucket.remove(&contact.node_id)?;
            let position = bucket.add(contact.clone())?;
            self.table.set_contact(&contact).await?;
            self.table.persist_bucket(&bucket).await?;
            trace!(node = %contact.node_id, bucket = index, "contact refreshed");
            self.emit(Event::Shift {
                contact,
                bucket_index: index,
                new_position: position,
            });
            return Ok(());
        }

        if !bucket.is_full() {
            let position = bucket
                .add(contact.clone())
                .expect("checked: not present, not full");
            self.table.set_contact(&contact).await?;
            self.table.persist_bucket(&bucket).await?;
            debug!(node = %contact.node_id, bucket = index, "contact added");
            self.emit(Event::Add {
                contact,
                bucket_index: index,
                position,
            });
            return Ok(());
        }

        // Bucket full: probe the stalest entry before evicting anything.
        let head = bucket.get(0, self.table.storage()).await?;
        drop(bucket);

        let ping = Request::ping(self.transport.self_contact().clone());
        let head_alive = self
            .transport
            .send(&head, ping, self.config.network_timeout)
            .await
            .is_ok();

        // The head may have changed during the round trip; reload before
        // touching it.
        let bucket_handle = self.table.get_bucket(index).await?;
        let mut bucket = bucket_handle.lock().await;
        bucket.load(self.table.storage()).await?;
        bucket.load_contacts(self.table.storage()).await?;

        if head_alive {
            if bucket.is_empty() {
                return Ok(());
            }
            let mut current_head = bucket.get(0, self.table.storage()).await?;
            bucket.remove(&current_head.node_id)?;
            current_head.seen();
            let position = bucket.add(current_head.clone())?;
            self.table.set_contact(&current_head).await?;
            self.table.persist_bucket(&bucket).await?;
            trace!(node = %current_head.node_id, bucket = index, "head alive, new contact discarded");
            self.emit(Event::Shift {
                contact: current_head,
                bucket_index: index,
                new_position: position,
            });
        } else {
            if !bucket.is_empty() {
                let stalest = bucket.get(0, self.table.storage()).await?;
                bucket.remove(&stalest.node_id)?;
                self.table.persist_bucket(&bucket).await?;
                warn!(node = %stalest.node_id, bucket = index, "stale head unresponsive, evicted");
                self.emit(Event::Drop { contact: stalest });
            }
            let position = bucket.add(contact.clone())?;
            self.table.set_contact(&contact).await?;
            self.table.persist_bucket(&bucket).await?;
            debug!(node = %contact.node_id, bucket = index, "contact added after eviction");
            self.emit(Event::Add {
                contact,
                bucket_index: index,
                position,
            });
        }

        Ok(())
    }

    /// Removes a contact from its bucket and emits `drop`.
    pub async fn remove_contact(&self, contact: &Contact) -> Result<()> {
        let Some(index) = Id::bucket_index(&self.self_id, &contact.node_id) else {
            return Ok(());
        };
        let bucket_handle = self.table.get_bucket(index).await?;
        let mut bucket = bucket_handle.lock().await;
        bucket.load_contacts(self.table.storage()).await?;
        let removed = bucket.remove(&contact.node_id)?;
        self.table.persist_bucket(&bucket).await?;
        self.emit(Event::Drop { contact: removed });
        Ok(())
    }

    /// Returns up to `limit` contacts, sorted by XOR distance to `target`
    /// ascending, excluding `exclude`.
    pub async fn get_nearest_contacts(
        &self,
        target: &Id,
        limit: usize,
        exclude: Option<&Id>,
    ) -> Result<Vec<Contact>> {
        let natural = Id::bucket_index(&self.self_id, target).unwrap_or(0);
        let mut collected: Vec<Contact> = Vec::with_capacity(limit);

        let visiting_order = std::iter::once(natural)
            .chain(natural + 1..BITS)
            .chain((0..natural).rev());

        for index in visiting_order {
            if collected.len() >= limit {
                break;
            }
            if !self.table.has_bucket(index).await? {
                continue;
            }
            let Some(bucket_handle) = self.table.existing_bucket(index).await? else {
                continue;
            };
            let mut bucket = bucket_handle.lock().await;
            bucket.load_contacts(self.table.storage()).await?;

            let mut entries = bucket.list();
            entries.retain(|c| match exclude {
                Some(ex) => &c.node_id != ex,
                None => true,
            });
            entries.sort_by_key(|c| Id::distance(target, &c.node_id));

            let space_left = limit - collected.len();
            entries.truncate(space_left);
            collected.extend(entries);
        }

        Ok(collected)
    }

    /// Issues a `FIND_NODE` for a random identifier that lands in bucket
    /// `index`, refreshing it.
    pub async fn refresh_bucket(&self, index: usize) -> Result<()> {
        let target = Id::random_id_in_bucket(&self.self_id, index);
        self.lookup_by_id(LookupKind::Node, target).await?;
        Ok(())
    }

    /// Refreshes every populated bucket strictly beyond the closest
    /// populated one.
    pub async fn refresh_buckets_beyond_closest(&self) -> Result<()> {
        let indexes = self.table.indexes().await?;
        let Some(min_index) = indexes.iter().min().copied() else {
            return Ok(());
        };
        for index in indexes.into_iter().filter(|i| *i > min_index) {
            self.refresh_bucket(index).await?;
        }
        Ok(())
    }
}
