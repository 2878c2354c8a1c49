//! End-to-end lookup scenarios against a small simulated overlay.

mod common;

use std::time::{Duration, SystemTime};

use kadcore::rpc::Item;
use kadcore::{Id, LookupOutcome};

use common::{default_config, Network};

/// The querying node only knows one peer directly; that peer's
/// `FIND_NODE` response introduces a second peer, which the lookup then
/// contacts in its next iteration.
#[tokio::test]
async fn lookup_converges_through_an_intermediate_peer() {
    let network = Network::new();
    let a = network.spawn_peer(default_config()).await;
    let b = network.spawn_peer(default_config()).await;
    let c = network.spawn_peer(default_config()).await;

    network.introduce(&a, &b).await;
    network.introduce(&b, &c).await;

    let outcome = a
        .router
        .lookup(kadcore::LookupKind::Node, b"convergence-target")
        .await
        .unwrap();

    match outcome {
        LookupOutcome::Node(contacts) => {
            assert!(contacts.iter().any(|contact| contact.node_id == b.id()));
            assert!(contacts.iter().any(|contact| contact.node_id == c.id()));
        }
        other => panic!("expected a Node outcome, got {other:?}"),
    }
}

/// One known peer lacks the value, another has it; the lookup returns
/// the value and fires a replication `STORE` at the peer that lacked it.
#[tokio::test]
async fn value_lookup_replicates_to_peer_without_the_value() {
    let network = Network::new();
    let querier = network.spawn_peer(default_config()).await;
    let holder = network.spawn_peer(default_config()).await;
    let empty_handed = network.spawn_peer(default_config()).await;

    network.introduce(&querier, &holder).await;
    network.introduce(&querier, &empty_handed).await;

    let key = Id::create_id(b"some-published-key");
    holder
        .publish(Item {
            key,
            value: b"the-value".to_vec(),
            publisher: holder.id(),
            timestamp: SystemTime::now(),
        })
        .await;

    let outcome = querier
        .router
        .lookup(kadcore::LookupKind::Value, b"some-published-key")
        .await
        .unwrap();

    assert_eq!(outcome, LookupOutcome::Value(b"the-value".to_vec()));

    // The STORE replication tail is fire-and-forget; give the spawned task
    // a moment to land before checking for its side effect.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(empty_handed.holds(&key).await);
}
