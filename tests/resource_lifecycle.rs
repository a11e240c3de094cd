//! Cross-component resource scenarios (spec §8).

use std::sync::Arc;

use cluster_coordinator::{Coordinator, CoordinatorConfig, ProtocolFactory};
use cluster_coordinator::raft::MockRaftProtocol;
use cluster_coordinator::router::RaftProtocol;
use cluster_coordinator::transport::InMemoryNetwork;

fn protocol_factory() -> ProtocolFactory {
    Arc::new(|name: &str| Arc::new(MockRaftProtocol::named(name.to_string())) as Arc<dyn RaftProtocol>)
}

async fn build_coordinator(net: &InMemoryNetwork, node: &str, members: Vec<String>) -> Coordinator {
    let net = net.clone();
    Coordinator::new(
        CoordinatorConfig::new(node, members),
        move |uri| net.transport_for(uri.to_string()),
        protocol_factory(),
    )
    .await
    .unwrap()
}

/// Scenario 3: resource isolation. Two distinct resources on the same
/// coordinator must not share open/closed state.
#[tokio::test]
async fn acquiring_one_resource_leaves_others_closed() {
    let net = InMemoryNetwork::new();
    let members = vec!["test-1".to_string(), "test-2".to_string(), "test-3".to_string()];
    let coord = build_coordinator(&net, "test-1", members).await;
    coord.open().await.unwrap();

    let alpha = coord.get_resource("alpha", None).await.unwrap();
    let beta = coord.get_resource("beta", None).await.unwrap();

    coord.acquire_resource("alpha").await.unwrap();

    assert!(alpha.cluster.is_open());
    assert!(beta.cluster.is_closed());

    coord.close().await;
}

/// `get_resource(R)` called twice returns the same object identity.
#[tokio::test]
async fn get_resource_is_idempotent_by_identity() {
    let net = InMemoryNetwork::new();
    let coord = build_coordinator(&net, "test-1", vec!["test-1".to_string()]).await;

    let first = coord.get_resource("alpha", None).await.unwrap();
    let second = coord.get_resource("alpha", None).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

/// `acquire(R); release(R); acquire(R)` leaves R in the same state as one
/// `acquire(R)`.
#[tokio::test]
async fn acquire_release_acquire_matches_single_acquire() {
    let net = InMemoryNetwork::new();
    let coord = build_coordinator(&net, "test-1", vec!["test-1".to_string()]).await;
    coord.open().await.unwrap();

    let holder = coord.get_resource("alpha", None).await.unwrap();

    coord.acquire_resource("alpha").await.unwrap();
    coord.release_resource("alpha").await.unwrap();
    coord.acquire_resource("alpha").await.unwrap();

    assert!(holder.cluster.is_open());

    coord.close().await;
}

/// `acquire(R); acquire(R)` is indistinguishable from one `acquire(R)`.
#[tokio::test]
async fn double_acquire_matches_single_acquire() {
    let net = InMemoryNetwork::new();
    let coord = build_coordinator(&net, "test-1", vec!["test-1".to_string()]).await;
    coord.open().await.unwrap();

    let holder = coord.get_resource("alpha", None).await.unwrap();
    coord.acquire_resource("alpha").await.unwrap();
    coord.acquire_resource("alpha").await.unwrap();

    assert!(holder.cluster.is_open());

    coord.close().await;
}
