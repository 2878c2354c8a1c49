//! Peer descriptors.

use std::net::SocketAddr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::hash::Id;

/// A peer descriptor: identifier, advisory address, and last-observed time.
///
/// Two contacts are equal iff their `node_id` matches; `address` is
/// advisory (it may change across observations of the same peer) and plays
/// no part in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub node_id: Id,
    pub address: SocketAddr,
    #[serde(with = "system_time_serde")]
    pub last_seen: SystemTime,
}

impl Contact {
    pub fn new(node_id: Id, address: SocketAddr) -> Contact {
        Contact {
            node_id,
            address,
            last_seen: SystemTime::now(),
        }
    }

    /// Stamps this contact as observed right now. Called whenever a
    /// response is received from it, or it is the sender of an incoming
    /// request.
    pub fn seen(&mut self) {
        self.last_seen = SystemTime::now();
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.node_id == other.node_id
    }
}

impl Eq for Contact {}

impl std::hash::Hash for Contact {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.node_id.hash(state);
    }
}

pub(crate) mod system_time_serde {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        (since_epoch.as_secs(), since_epoch.subsec_nanos()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (secs, nanos): (u64, u32) = Deserialize::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::new(secs, nanos))
    }
}
