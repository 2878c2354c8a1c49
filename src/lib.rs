//! `kadcore`: the routing table and iterative lookup core of a Kademlia-style
//! DHT. Wire transport, on-disk storage, value validation, bootstrap and
//! publish/replicate policy are all external collaborators, supplied by the
//! host application through the traits in [`transport`], [`storage`], and
//! [`validator`].

pub mod config;
pub mod error;
pub mod events;
pub mod hash;
pub mod router;
pub mod routing;
pub mod rpc;
pub mod storage;
pub mod transport;
pub mod validator;

pub use config::{Configuration, Factory};
pub use error::{Error, Result};
pub use hash::Id;
pub use router::{LookupKind, LookupOutcome, Router};
pub use routing::{Bucket, Contact, RoutingTable};
pub use storage::{MemoryStorage, StorageAdapter};
pub use transport::Transport;
pub use validator::{AcceptAll, Validator};
