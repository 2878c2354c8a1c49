//! Remote procedure call shapes.
//!
//! These are the wire-shaped `{ method, params }` / `{ result }` records
//! kept as plain serializable data. The socket, the framing, and retry
//! policy belong to the [`crate::transport::Transport`] that actually moves
//! these bytes; this module only describes their shape.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::hash::Id;
use crate::routing::Contact;

/// The four RPC methods the routing/lookup core relies on.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum Method {
    Ping,
    Store,
    FindNode,
    FindValue,
}

/// A stored record, as returned by a `FIND_VALUE` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub key: Id,
    pub value: Vec<u8>,
    pub publisher: Id,
    #[serde(with = "crate::routing::contact::system_time_serde")]
    pub timestamp: SystemTime,
}

/// The request half of an RPC: `{ method, params }` where `params` carries
/// the sender's own descriptor plus whatever the method needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub sender: Contact,
    /// The lookup target for `FIND_NODE`/`FIND_VALUE`, or the key being
    /// written for `STORE`.
    pub key: Option<Id>,
    /// The item payload for `STORE`.
    pub item: Option<Item>,
    /// How many contacts the responder should return for `FIND_NODE`.
    pub nodes_wanted: Option<usize>,
}

impl Request {
    pub fn ping(sender: Contact) -> Request {
        Request {
            method: Method::Ping,
            sender,
            key: None,
            item: None,
            nodes_wanted: None,
        }
    }

    pub fn store(sender: Contact, item: Item) -> Request {
        Request {
            method: Method::Store,
            sender,
            key: Some(item.key),
            item: Some(item),
            nodes_wanted: None,
        }
    }

    pub fn find_node(sender: Contact, key: Id, nodes_wanted: usize) -> Request {
        Request {
            method: Method::FindNode,
            sender,
            key: Some(key),
            item: None,
            nodes_wanted: Some(nodes_wanted),
        }
    }

    pub fn find_value(sender: Contact, key: Id) -> Request {
        Request {
            method: Method::FindValue,
            sender,
            key: Some(key),
            item: None,
            nodes_wanted: None,
        }
    }
}

/// The response half of an RPC: `{ result: { nodes?, item? } }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    pub nodes: Option<Vec<Contact>>,
    pub item: Option<Item>,
}

impl Response {
    pub fn with_nodes(nodes: Vec<Contact>) -> Response {
        Response {
            nodes: Some(nodes),
            item: None,
        }
    }

    pub fn with_item(item: Item) -> Response {
        Response {
            nodes: None,
            item: Some(item),
        }
    }

    pub fn empty() -> Response {
        Response::default()
    }
}
