//! The transport: the only collaborator that actually talks to the
//! network. Wire encoding, sockets, and timeouts are explicitly out of
//! scope for this crate — the router only ever sees this trait.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::Result;
use crate::routing::Contact;
use crate::rpc::{Request, Response};

/// Sends RPCs to remote peers and reports the local node's own descriptor.
///
/// A concrete implementation typically owns a pair of UDP sockets and its
/// own node id directly; here that ownership is pushed behind a trait so
/// the router never has to know whether "sending an RPC" means a UDP
/// datagram, a QUIC stream, or an in-process channel in a test harness.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// This node's own descriptor, as the transport knows it (address,
    /// listening port, etc). Read once by the router at construction.
    fn self_contact(&self) -> &Contact;

    /// Sends `request` to `destination` and awaits its response, giving up
    /// after `timeout`. A transport error or timeout is reported as `Err`;
    /// the router treats any `Err` here as a per-query failure.
    async fn send(
        &self,
        destination: &Contact,
        request: Request,
        timeout: Duration,
    ) -> Result<Response>;
}
