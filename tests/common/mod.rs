//! An in-process overlay network used to exercise `Router` end to end, the
//! way two real nodes would be wired up over a loopback UDP socket. Here
//! the "socket" is a shared peer registry and the "wire" is a direct call
//! into the destination's own `Router`/value store — the transport itself
//! stays a true external collaborator, this harness just stands in for one.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use kadcore::{
    Configuration, Contact, Error, Factory, Id, MemoryStorage, Result, Router, RoutingTable,
    Transport,
};
use kadcore::rpc::{Item, Method, Request, Response};

static NEXT_PORT: AtomicU16 = AtomicU16::new(10_000);

fn next_addr() -> SocketAddr {
    let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

/// One simulated node: its own router plus whatever values it happens to
/// hold locally (the storage/value side of a real `FIND_VALUE` responder,
/// which is likewise outside this crate's scope).
pub struct Peer {
    pub router: Arc<Router>,
    values: Mutex<HashMap<Id, Item>>,
    online: AtomicBool,
}

impl Peer {
    pub fn id(&self) -> Id {
        self.router.self_id()
    }

    pub async fn publish(&self, item: Item) {
        self.values.lock().await.insert(item.key, item);
    }

    pub async fn holds(&self, key: &Id) -> bool {
        self.values.lock().await.contains_key(key)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

/// Registry of simulated peers, shared by every `SimTransport`.
pub struct Network {
    peers: Mutex<HashMap<Id, Arc<Peer>>>,
}

impl Network {
    pub fn new() -> Arc<Network> {
        Arc::new(Network {
            peers: Mutex::new(HashMap::new()),
        })
    }

    pub async fn spawn_peer(self: &Arc<Self>, config: Configuration) -> Arc<Peer> {
        let self_id = Id::random();
        let contact = Contact::new(self_id, next_addr());
        let transport = Arc::new(SimTransport {
            contact,
            network: Arc::clone(self),
        });
        let storage = Arc::new(MemoryStorage::new());
        let table = Arc::new(RoutingTable::new(self_id, config.k, storage));
        let router = Arc::new(Router::new(table, transport, None, config));
        let peer = Arc::new(Peer {
            router,
            values: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
        });
        self.peers.lock().await.insert(self_id, Arc::clone(&peer));
        peer
    }

    /// Makes `from` aware of `to`, as a real bootstrap procedure would
    /// (out of scope for this crate — tests drive it directly instead).
    pub async fn introduce(&self, from: &Peer, to: &Peer) {
        from.router
            .update_contact(Contact::new(to.id(), to.router.self_contact().address))
            .await
            .unwrap();
    }

    async fn get(&self, id: &Id) -> Option<Arc<Peer>> {
        self.peers.lock().await.get(id).cloned()
    }
}

struct SimTransport {
    contact: Contact,
    network: Arc<Network>,
}

#[async_trait]
impl Transport for SimTransport {
    fn self_contact(&self) -> &Contact {
        &self.contact
    }

    async fn send(&self, destination: &Contact, request: Request, _timeout: Duration) -> Result<Response> {
        let peer = self
            .network
            .get(&destination.node_id)
            .await
            .ok_or_else(|| Error::Transport("no such peer".into()))?;

        if !peer.online.load(Ordering::SeqCst) {
            return Err(Error::Transport("peer unreachable".into()));
        }

        peer.router.update_contact(request.sender.clone()).await?;

        match request.method {
            Method::Ping => Ok(Response::empty()),
            Method::Store => {
                let item = request
                    .item
                    .ok_or_else(|| Error::Transport("STORE without item".into()))?;
                peer.publish(item).await;
                Ok(Response::empty())
            }
            Method::FindNode => {
                let key = request
                    .key
                    .ok_or_else(|| Error::Transport("FIND_NODE without key".into()))?;
                let wanted = request.nodes_wanted.unwrap_or(20);
                let nodes = peer
                    .router
                    .get_nearest_contacts(&key, wanted, Some(&peer.id()))
                    .await?;
                Ok(Response::with_nodes(nodes))
            }
            Method::FindValue => {
                let key = request
                    .key
                    .ok_or_else(|| Error::Transport("FIND_VALUE without key".into()))?;
                if let Some(item) = peer.values.lock().await.get(&key).cloned() {
                    Ok(Response::with_item(item))
                } else {
                    let nodes = peer
                        .router
                        .get_nearest_contacts(&key, 20, Some(&peer.id()))
                        .await?;
                    Ok(Response::with_nodes(nodes))
                }
            }
        }
    }
}

pub fn default_config() -> Configuration {
    Factory::new().k_factor(20).alpha(3).build()
}
