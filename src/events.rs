//! Router lifecycle events, broadcast over a `tokio::sync::broadcast`
//! channel so subscribers can await events without blocking the router.

use tokio::sync::broadcast;

use crate::routing::Contact;

/// Default capacity of the event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A contact lifecycle change, emitted by the router as contacts enter,
/// leave, or reorder within buckets.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A new contact entered bucket `bucket_index` at `position`.
    Add {
        contact: Contact,
        bucket_index: usize,
        position: usize,
    },
    /// A contact was evicted, either by a failed head-probe or by a lookup
    /// query failure.
    Drop { contact: Contact },
    /// An existing contact was repositioned within its bucket (typically:
    /// moved to the tail after being re-observed).
    Shift {
        contact: Contact,
        bucket_index: usize,
        new_position: usize,
    },
}

/// Sending half of the event channel, held by the router.
pub type EventSender = broadcast::Sender<Event>;
/// Receiving half of the event channel, handed out to subscribers.
pub type EventReceiver = broadcast::Receiver<Event>;

/// Builds a fresh event channel pair.
pub fn channel() -> (EventSender, EventReceiver) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}
