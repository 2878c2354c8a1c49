//! Routing table and k-bucket storage.

pub mod bucket;
pub mod contact;
pub(crate) mod keys;
pub mod table;

pub use bucket::Bucket;
pub use contact::Contact;
pub use table::RoutingTable;
