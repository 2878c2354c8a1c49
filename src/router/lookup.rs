//! The iterative `FIND_NODE` / `FIND_VALUE` lookup.
//!
//! This is the transient, per-call state machine: it owns a shortlist, a
//! contacted set, and the closest-node bookkeeping for exactly one
//! `lookup()` invocation, then disappears.

use std::collections::HashSet;
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::hash::Id;
use crate::router::Router;
use crate::routing::Contact;
use crate::rpc::{Item, Request, Response};

/// Which of the two iterative walks to run.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LookupKind {
    Node,
    Value,
}

/// The result of a completed lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// The `K` closest contacts found, closest first.
    Node(Vec<Contact>),
    /// The value found under the looked-up key.
    Value(Vec<u8>),
}

/// One batch member's outcome, after folding transport failure and
/// validation failure into a single "query failure" concept.
enum Outcome {
    Success(Response),
    Failure,
}

struct BatchResult {
    contact: Contact,
    outcome: Outcome,
}

impl Router {
    /// Executes an iterative lookup for the `K` closest contacts to `key`,
    /// or for the value stored under it. `key` is the raw,
    /// unhashed application key; it is hashed once via [`Id::create_id`].
    pub async fn lookup(&self, kind: LookupKind, key: &[u8]) -> Result<LookupOutcome> {
        let hashed_key = Id::create_id(key);
        self.lookup_by_id(kind, hashed_key).await
    }

    /// As [`Router::lookup`], but against an already-hashed target
    /// identifier. Used internally by bucket refresh, whose targets are
    /// synthetic points in the metric space rather than application keys.
    pub(crate) async fn lookup_by_id(
        &self,
        kind: LookupKind,
        hashed_key: Id,
    ) -> Result<LookupOutcome> {
        let mut shortlist = self
            .get_nearest_contacts(&hashed_key, self.config().alpha, Some(&self.self_id()))
            .await?;
        if shortlist.is_empty() {
            return Err(Error::NotConnected);
        }

        let mut closest_node = shortlist[0].clone();
        let mut closest_distance = Id::distance(&hashed_key, &closest_node.node_id);
        let mut contacted: HashSet<Id> = HashSet::new();
        let mut found_value = false;
        let mut found_item: Option<Item> = None;
        let mut contacts_without_value: Vec<Contact> = Vec::new();

        let mut batch = shortlist.clone();
        batch.truncate(self.config().alpha);

        loop {
            if batch.is_empty() {
                break;
            }
            let closest_before_round = closest_node.node_id;

            let results = futures::future::join_all(
                batch
                    .iter()
                    .cloned()
                    .map(|contact| self.dispatch_query(kind, hashed_key, contact)),
            )
            .await;

            let mut batch_all_failed = true;
            for BatchResult { contact, outcome } in results {
                match outcome {
                    Outcome::Failure => {
                        self.handle_query_failure(&mut shortlist, &contact).await?;
                    }
                    Outcome::Success(response) => {
                        batch_all_failed = false;
                        contacted.insert(contact.node_id);
                        self.update_contact(contact.clone()).await?;

                        let distance = Id::distance(&hashed_key, &contact.node_id);
                        if distance < closest_distance {
                            closest_node = contact.clone();
                            closest_distance = distance;
                        }

                        match kind {
                            LookupKind::Node => {
                                if let Some(nodes) = response.nodes {
                                    merge_shortlist(&mut shortlist, nodes);
                                }
                            }
                            LookupKind::Value => match response.item {
                                Some(item) => {
                                    found_value = true;
                                    found_item = Some(item);
                                }
                                None => {
                                    contacts_without_value.push(contact.clone());
                                    if let Some(nodes) = response.nodes {
                                        merge_shortlist(&mut shortlist, nodes);
                                    }
                                }
                            },
                        }
                    }
                }
            }

            if batch_all_failed {
                warn!("lookup batch failed entirely");
                return Err(Error::LookupFailed);
            }

            if found_value {
                return self
                    .finish_value_lookup(found_item, contacts_without_value)
                    .await;
            }

            if closest_node.node_id == closest_before_round || shortlist.len() >= self.config().k {
                return match kind {
                    LookupKind::Node => Ok(self.finish_node_lookup(shortlist, hashed_key)),
                    LookupKind::Value => Err(Error::NotPresent),
                };
            }

            batch = shortlist
                .iter()
                .filter(|c| !contacted.contains(&c.node_id))
                .take(self.config().alpha)
                .cloned()
                .collect();

            if batch.is_empty() {
                return match kind {
                    LookupKind::Node => Ok(self.finish_node_lookup(shortlist, hashed_key)),
                    LookupKind::Value => Err(Error::NotPresent),
                };
            }
        }

        match kind {
            LookupKind::Node => Ok(self.finish_node_lookup(shortlist, hashed_key)),
            LookupKind::Value => Err(Error::NotPresent),
        }
    }

    fn finish_node_lookup(&self, mut shortlist: Vec<Contact>, hashed_key: Id) -> LookupOutcome {
        shortlist = shortlist.into_iter().unique_by(|c| c.node_id).collect();
        shortlist.sort_by_key(|c| Id::distance(&hashed_key, &c.node_id));
        shortlist.truncate(self.config().k);
        LookupOutcome::Node(shortlist)
    }

    async fn finish_value_lookup(
        &self,
        found_item: Option<Item>,
        contacts_without_value: Vec<Contact>,
    ) -> Result<LookupOutcome> {
        let item = found_item.expect("found_value implies found_item is set");
        if let Some(nearest) = contacts_without_value
            .iter()
            .min_by_key(|c| Id::distance(&self.self_id(), &c.node_id))
        {
            let request = Request::store(self.self_contact(), item.clone());
            let destination = nearest.clone();
            let transport = Arc::clone(self.transport());
            let timeout = self.config().network_timeout;
            tokio::spawn(async move {
                if transport.send(&destination, request, timeout).await.is_err() {
                    debug!("replication store to closest value-lacking peer failed");
                }
            });
        }
        info!("lookup resolved a value, replication fired and forgotten");
        Ok(LookupOutcome::Value(item.value))
    }

    async fn dispatch_query(&self, kind: LookupKind, hashed_key: Id, contact: Contact) -> BatchResult {
        let request = match kind {
            LookupKind::Node => {
                Request::find_node(self.self_contact(), hashed_key, self.config().k)
            }
            LookupKind::Value => Request::find_value(self.self_contact(), hashed_key),
        };

        let outcome = match self
            .transport()
            .send(&contact, request, self.config().network_timeout)
            .await
        {
            Err(_) => Outcome::Failure,
            Ok(response) => match (kind, &response.item) {
                (LookupKind::Value, Some(item)) => {
                    if self.validator().validate(&item.key, &item.value).await {
                        Outcome::Success(response)
                    } else {
                        Outcome::Failure
                    }
                }
                _ => Outcome::Success(response),
            },
        };

        BatchResult { contact, outcome }
    }

    async fn handle_query_failure(&self, shortlist: &mut Vec<Contact>, contact: &Contact) -> Result<()> {
        shortlist.retain(|c| c.node_id != contact.node_id);
        match self.remove_contact(contact).await {
            Ok(()) | Err(Error::NotPresent) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn merge_shortlist(shortlist: &mut Vec<Contact>, nodes: Vec<Contact>) {
    shortlist.extend(nodes);
    *shortlist = std::mem::take(shortlist)
        .into_iter()
        .unique_by(|c| c.node_id)
        .collect();
}
