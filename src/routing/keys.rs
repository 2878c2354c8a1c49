//! Storage key namespaces used by the routing table.

use crate::hash::Id;

pub const ROUTING_TABLE_KEY: &[u8] = b"ROUTING-TABLE";
pub const BUCKETS_KEY: &[u8] = b"BUCKETS";

pub fn bucket_key(index: usize) -> Vec<u8> {
    format!("BUCKET-{index}").into_bytes()
}

pub fn contact_key(node_id: &Id) -> Vec<u8> {
    format!("CONTACT-{node_id}").into_bytes()
}
