//! Error kinds for the routing core: invalid-argument failures are fatal
//! and surfaced as-is, while per-query RPC/validation failures are absorbed
//! by the router and only ever bubble up as [`Error::LookupFailed`] when an
//! entire batch dies.

use crate::hash::Id;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A bucket index outside of `[0, BITS)` was requested.
    #[error("invalid bucket index: {0}")]
    InvalidBucketIndex(usize),

    /// [`crate::routing::Bucket::add`] was called on a full bucket.
    #[error("bucket is full")]
    BucketFull,

    /// [`crate::routing::Bucket::add`] was called with a node id already
    /// present in the bucket.
    #[error("contact already present in bucket")]
    DuplicateContact,

    /// [`crate::routing::Bucket::remove`] or `get` was called for a
    /// node id / position not present in the bucket.
    #[error("contact not present in bucket")]
    NotPresent,

    /// `position` exceeds the bucket's current size.
    #[error("position {position} out of range for bucket of size {size}")]
    OutOfRange { position: usize, size: usize },

    /// [`crate::routing::RoutingTable::get_contact`] found no record for
    /// the requested node id.
    #[error("no contact record for {0}")]
    ContactUnknown(Id),

    /// The storage adapter failed. The initiating operation fails with it;
    /// storage errors are never absorbed.
    #[error("storage adapter error: {0}")]
    Storage(String),

    /// A transport send failed or timed out. Absorbed inside a lookup as a
    /// per-query failure; never surfaced on its own except through
    /// [`Error::LookupFailed`].
    #[error("transport error: {0}")]
    Transport(String),

    /// The routing table held no contacts to seed a lookup with.
    #[error("routing table has no known peers to start a lookup from")]
    NotConnected,

    /// Every query in a lookup batch failed (transport error, timeout, or
    /// validation failure) with no closer contacts left to try.
    #[error("lookup failed: every queried peer errored")]
    LookupFailed,
}

pub type Result<T> = std::result::Result<T, Error>;
