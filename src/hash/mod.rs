//! Identifier arithmetic.
//!
//! A pure utility layer over fixed-width node/key identifiers. Nothing here
//! talks to the network or to storage; it only knows how to hash, compare,
//! and XOR fixed-width byte strings the way Kademlia's metric space requires.

use std::cmp::Ordering;
use std::fmt;

use rand::Rng;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};

/// Bit-width of identifiers used throughout the routing core.
pub const BITS: usize = 160;
/// Byte-width of identifiers, derived from [`BITS`].
pub const BYTES: usize = BITS / 8;

/// A fixed-width identifier, used both for node IDs and for the hashed form
/// of arbitrary lookup keys.
///
/// `Id` is a plain value type: cheap to copy, totally ordered, and XOR-able.
/// All arithmetic treats the byte array as a big-endian unsigned integer.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct Id {
    raw: [u8; BYTES],
}

impl Id {
    /// The all-zero identifier.
    pub const fn zero() -> Id {
        Id { raw: [0u8; BYTES] }
    }

    /// Builds an identifier from a caller-supplied, already-hashed byte
    /// string. Useful for tests and for transports that hand over raw IDs.
    pub fn from_bytes(bytes: [u8; BYTES]) -> Id {
        Id { raw: bytes }
    }

    /// A uniformly random identifier, used to mint fresh node IDs.
    pub fn random() -> Id {
        let mut raw = [0u8; BYTES];
        rand::thread_rng().fill(&mut raw[..]);
        Id { raw }
    }

    /// Hashes an arbitrary key (a lookup key, or a peer's advertised public
    /// material) down to an `Id`: the single place a key or a peer's
    /// identity becomes a point in the XOR metric space.
    pub fn create_id(key: &[u8]) -> Id {
        let mut hasher = Sha1::new();
        hasher.update(key);
        let digest = hasher.finalize();

        let mut raw = [0u8; BYTES];
        let n = BYTES.min(digest.len());
        raw[..n].copy_from_slice(&digest[..n]);
        Id { raw }
    }

    /// Borrows the big-endian byte representation.
    pub fn as_bytes(&self) -> &[u8; BYTES] {
        &self.raw
    }

    /// The XOR distance between two identifiers. The result is itself a
    /// valid `Id`, since XOR is closed over fixed-width bit strings.
    pub fn distance(a: &Id, b: &Id) -> Id {
        let mut raw = [0u8; BYTES];
        for i in 0..BYTES {
            raw[i] = a.raw[i] ^ b.raw[i];
        }
        Id { raw }
    }

    /// Unsigned, big-endian comparison. Lexicographic byte comparison over a
    /// big-endian representation *is* unsigned integer comparison, so this
    /// is just array ordering.
    pub fn compare(a: &Id, b: &Id) -> Ordering {
        a.raw.cmp(&b.raw)
    }

    /// Index, in `[0, BITS)`, of the most significant set bit of this
    /// identifier when treated as a distance. Returns `None` for the
    /// all-zero identifier, which is the only case in which
    /// [`Id::bucket_index`] is undefined (the two identifiers being
    /// compared are equal).
    fn highest_set_bit(&self) -> Option<usize> {
        for (byte_index, byte) in self.raw.iter().enumerate() {
            if *byte == 0 {
                continue;
            }
            for bit in (0..8).rev() {
                if byte & (1 << bit) != 0 {
                    let bit_from_msb = 7 - bit;
                    return Some(byte_index * 8 + bit_from_msb);
                }
            }
        }
        None
    }

    /// The bucket a peer with id `other` falls into, from the point of view
    /// of a node whose own id is `self_id`: the position of the most
    /// significant bit at which the two identifiers differ, counted from
    /// the most significant bit (index 0) down to the least significant
    /// (index `BITS - 1`).
    ///
    /// Undefined (returns `None`) when `self_id == other`; callers must not
    /// ask for the bucket index of the local node.
    pub fn bucket_index(self_id: &Id, other: &Id) -> Option<usize> {
        Id::distance(self_id, other).highest_set_bit()
    }

    /// Produces a random identifier whose distance from `self_id` lands
    /// exactly in bucket `index`: the most significant differing bit sits
    /// at `index`, with every more significant bit matching `self_id` and
    /// every less significant bit randomized. Used to mint a lookup target
    /// when refreshing a stale bucket.
    pub fn random_id_in_bucket(self_id: &Id, index: usize) -> Id {
        assert!(index < BITS, "bucket index {index} out of range");

        let mut distance = [0u8; BYTES];
        rand::thread_rng().fill(&mut distance[..]);

        for bit_from_msb in 0..index {
            clear_bit(&mut distance, bit_from_msb);
        }
        set_bit(&mut distance, index);

        let distance = Id { raw: distance };
        Id::distance(self_id, &distance)
    }
}

fn bit_location(bit_from_msb: usize) -> (usize, u8) {
    let byte_index = bit_from_msb / 8;
    let bit_in_byte = 7 - (bit_from_msb % 8);
    (byte_index, bit_in_byte)
}

fn set_bit(raw: &mut [u8; BYTES], bit_from_msb: usize) {
    let (byte_index, bit_in_byte) = bit_location(bit_from_msb);
    raw[byte_index] |= 1 << bit_in_byte;
}

fn clear_bit(raw: &mut [u8; BYTES], bit_from_msb: usize) {
    let (byte_index, bit_in_byte) = bit_location(bit_from_msb);
    raw[byte_index] &= !(1 << bit_in_byte);
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        Id::compare(self, other)
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.raw {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl<'de> Visitor<'de> for IdVisitor {
            type Value = Id;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{BYTES} bytes of identifier")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Id, E>
            where
                E: de::Error,
            {
                if v.len() != BYTES {
                    return Err(de::Error::invalid_length(v.len(), &self));
                }
                let mut raw = [0u8; BYTES];
                raw.copy_from_slice(v);
                Ok(Id { raw })
            }
        }

        deserializer.deserialize_bytes(IdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_zero_for_identical_ids() {
        let id = Id::random();
        assert_eq!(Id::distance(&id, &id), Id::zero());
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Id::random();
        let b = Id::random();
        assert_eq!(Id::distance(&a, &b), Id::distance(&b, &a));
    }

    #[test]
    fn bucket_index_is_none_for_self() {
        let id = Id::random();
        assert_eq!(Id::bucket_index(&id, &id), None);
    }

    #[test]
    fn bucket_index_of_adjacent_ids() {
        let mut raw = [0u8; BYTES];
        raw[BYTES - 1] = 0b0000_0001;
        let a = Id::from_bytes(raw);
        let b = Id::zero();
        assert_eq!(Id::bucket_index(&a, &b), Some(BITS - 1));
    }

    #[test]
    fn bucket_index_of_far_apart_ids() {
        let mut raw = [0u8; BYTES];
        raw[0] = 0b1000_0000;
        let a = Id::from_bytes(raw);
        let b = Id::zero();
        assert_eq!(Id::bucket_index(&a, &b), Some(0));
    }

    #[test]
    fn compare_matches_unsigned_big_endian_order() {
        let mut smaller = [0u8; BYTES];
        let mut larger = [0u8; BYTES];
        smaller[0] = 1;
        larger[0] = 2;
        assert_eq!(
            Id::compare(&Id::from_bytes(smaller), &Id::from_bytes(larger)),
            Ordering::Less
        );
    }

    #[test]
    fn random_id_in_bucket_lands_in_requested_bucket() {
        let self_id = Id::random();
        for index in [0usize, 1, 79, 158, 159] {
            let candidate = Id::random_id_in_bucket(&self_id, index);
            assert_eq!(Id::bucket_index(&self_id, &candidate), Some(index));
        }
    }

    #[test]
    fn create_id_is_deterministic() {
        let a = Id::create_id(b"hello world");
        let b = Id::create_id(b"hello world");
        assert_eq!(a, b);
        let c = Id::create_id(b"hello world!");
        assert_ne!(a, c);
    }

    #[test]
    fn display_round_trips_through_hex_length() {
        let id = Id::random();
        assert_eq!(format!("{id}").len(), BYTES * 2);
    }
}
