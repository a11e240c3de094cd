//! Cluster Manager (spec §4.3) — owns one Raft Context plus its Router and
//! Member Registry view; exposes open/close lifecycle and membership
//! events.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::info;

use crate::member::MemberEndpoint;
use crate::registry::MemberRegistry;
use crate::router::{RaftProtocol, ResourceRouter};

/// `JOIN` or `LEAVE` of a member, as delivered to membership listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipEventKind {
    Join,
    Leave,
}

#[derive(Clone)]
pub struct MembershipEvent {
    pub kind: MembershipEventKind,
    pub member: Arc<MemberEndpoint>,
}

pub type MembershipListener =
    Arc<dyn Fn(MembershipEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct ListenerEntry {
    id: u64,
    listener: MembershipListener,
}

/// Local view of a named Raft group: its member registry, routing plumbing,
/// and lifecycle. `id` is `0` for the global cluster, `hash(resource-name)`
/// for resource clusters.
#[derive(Clone)]
pub struct ClusterManager {
    pub id: u32,
    local_member: Arc<MemberEndpoint>,
    members: MemberRegistry,
    protocol: Arc<dyn RaftProtocol>,
    listeners: Arc<RwLock<Vec<ListenerEntry>>>,
    next_listener_id: Arc<AtomicU64>,
    open: Arc<AtomicBool>,
    event_tx: mpsc::UnboundedSender<MembershipEvent>,
}

impl ClusterManager {
    /// Builds a cluster manager over `local_member` plus the shared member
    /// registry, bound to `protocol`. Spawns the background task that
    /// delivers membership events to listeners in FIFO order, serialized
    /// on this task (the cluster's own executor).
    pub fn new(
        id: u32,
        local_member: Arc<MemberEndpoint>,
        members: MemberRegistry,
        protocol: Arc<dyn RaftProtocol>,
    ) -> Self {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<MembershipEvent>();
        let listeners: Arc<RwLock<Vec<ListenerEntry>>> = Arc::new(RwLock::new(Vec::new()));
        let listeners_for_task = listeners.clone();

        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let snapshot: Vec<MembershipListener> = listeners_for_task
                    .read()
                    .await
                    .iter()
                    .map(|e| e.listener.clone())
                    .collect();
                for listener in snapshot {
                    listener(event.clone()).await;
                }
            }
        });

        Self {
            id,
            local_member,
            members,
            protocol,
            listeners,
            next_listener_id: Arc::new(AtomicU64::new(0)),
            open: Arc::new(AtomicBool::new(false)),
            event_tx,
        }
    }

    pub fn protocol(&self) -> Arc<dyn RaftProtocol> {
        self.protocol.clone()
    }

    pub fn local_member(&self) -> Arc<MemberEndpoint> {
        self.local_member.clone()
    }

    pub async fn member(&self, uri: &str) -> Option<Arc<MemberEndpoint>> {
        self.members.get(uri).await
    }

    pub async fn insert_member(&self, uri: String, endpoint: Arc<MemberEndpoint>) {
        self.members.insert(uri, endpoint).await;
    }

    pub async fn remove_member(&self, uri: &str) -> Option<Arc<MemberEndpoint>> {
        self.members.remove(uri).await
    }

    pub async fn members_snapshot(&self) -> HashMap<String, Arc<MemberEndpoint>> {
        self.members.snapshot().await
    }

    /// Installs the router, marking the cluster open. No-op if already
    /// open. MUST complete before the bound protocol is driven.
    pub async fn open(&self) {
        if self.open.swap(true, Ordering::SeqCst) {
            return;
        }
        ResourceRouter::create_routes(self, self.protocol.clone()).await;
        info!(cluster_id = self.id, "cluster opened");
    }

    /// Stops delivering events, destroys routes. No-op if already closed.
    pub async fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        ResourceRouter::destroy_routes(self, self.protocol.clone()).await;
        info!(cluster_id = self.id, "cluster closed");
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    /// Registers a membership listener, returning an id usable with
    /// [`Self::remove_membership_listener`].
    pub async fn add_membership_listener(&self, listener: MembershipListener) -> u64 {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.write().await.push(ListenerEntry { id, listener });
        id
    }

    pub async fn remove_membership_listener(&self, id: u64) {
        self.listeners.write().await.retain(|e| e.id != id);
    }

    /// Delivers a membership event to all listeners, in the order it was
    /// submitted relative to other events emitted on this cluster.
    pub fn emit_membership_event(&self, event: MembershipEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Derives this cluster's id the way the coordinator derives a resource
    /// cluster's id from its name: a stable, non-cryptographic hash.
    pub fn hash_id(name: &str) -> u32 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        name.hash(&mut hasher);
        (hasher.finish() & 0xFFFF_FFFF) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{MemberInfo, MemberKind};
    use crate::raft::MockRaftProtocol;
    use crate::transport::InMemoryNetwork;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex;

    async fn local_endpoint(net: &InMemoryNetwork, uri: &str) -> Arc<MemberEndpoint> {
        let transport = net.transport_for(uri.to_string());
        let endpoint = MemberEndpoint::new(MemberInfo::new(uri, MemberKind::Active), transport);
        net.register(uri.to_string(), endpoint.clone()).await;
        endpoint
    }

    #[tokio::test]
    async fn open_close_are_idempotent() {
        let net = InMemoryNetwork::new();
        let local = local_endpoint(&net, "test-1").await;
        let protocol = Arc::new(MockRaftProtocol::new());
        let cluster = ClusterManager::new(0, local, crate::registry::MemberRegistry::new(), protocol);

        cluster.open().await;
        cluster.open().await;
        assert!(cluster.is_open());

        cluster.close().await;
        cluster.close().await;
        assert!(cluster.is_closed());
    }

    #[tokio::test]
    async fn membership_events_delivered_fifo() {
        let net = InMemoryNetwork::new();
        let local = local_endpoint(&net, "test-1").await;
        let peer = local_endpoint(&net, "test-2").await;
        let protocol = Arc::new(MockRaftProtocol::new());
        let cluster = ClusterManager::new(0, local, crate::registry::MemberRegistry::new(), protocol);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let counter_clone = counter.clone();
        cluster
            .add_membership_listener(Arc::new(move |event: MembershipEvent| {
                let seen = seen_clone.clone();
                let counter = counter_clone.clone();
                Box::pin(async move {
                    let order = counter.fetch_add(1, Ordering::SeqCst);
                    seen.lock().await.push((order, event.kind));
                })
            }))
            .await;

        for _ in 0..5 {
            cluster.emit_membership_event(MembershipEvent {
                kind: MembershipEventKind::Join,
                member: peer.clone(),
            });
        }
        cluster.emit_membership_event(MembershipEvent {
            kind: MembershipEventKind::Leave,
            member: peer.clone(),
        });

        // Give the dispatch task a chance to drain.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let observed = seen.lock().await;
        assert_eq!(observed.len(), 6);
        assert_eq!(observed.last().unwrap().1, MembershipEventKind::Leave);
        for (i, (order, _)) in observed.iter().enumerate() {
            assert_eq!(*order, i);
        }
    }

    #[test]
    fn hash_id_is_deterministic() {
        assert_eq!(ClusterManager::hash_id("alpha"), ClusterManager::hash_id("alpha"));
        assert_ne!(ClusterManager::hash_id("alpha"), ClusterManager::hash_id("beta"));
    }
}
