//! Raft Context (spec §4, component D) — the opaque Raft protocol engine
//! instance the coordinator owns one per resource plus one for global
//! membership. The engine itself (leader election, log replication, safety
//! proofs) is an external collaborator; this module defines two
//! implementations of the [`RaftProtocol`] handler surface (spec §6) that
//! surface drives:
//!
//! - [`MockRaftProtocol`] — a reference engine tracking only a term and a
//!   believed leader, used by the scenario tests in spec §8 to exercise real
//!   routing and lifecycle ordering without standing up actual consensus.
//! - [`OpenRaftProtocol`] — adapts the six fixed topics onto a real
//!   `openraft::Raft` instance for production use, built the way the
//!   teacher's `raft.rs` wires `openraft` to its gRPC transport.
//!
//! ## Implementation note on async traits
//!
//! openraft uses RPITIT (return-position impl Trait in Trait) rather than
//! `async_trait::async_trait`. Implementations of `RaftStorage`,
//! `RaftLogReader`, `RaftSnapshotBuilder` and `RaftNetwork` below use plain
//! `async fn` — NOT `#[async_trait]` — to match.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::ops::RangeBounds;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use openraft::error::{InstallSnapshotError, RPCError, RaftError, Unreachable};
use openraft::network::{RPCOption, RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use openraft::storage::{Adaptor, RaftLogReader, RaftSnapshotBuilder, RaftStorage};
use openraft::{
    AnyError, BasicNode, Entry, LogId, LogState, RaftLogId, Snapshot, SnapshotMeta, StorageError,
    StoredMembership, TokioRuntime, Vote,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CoordinatorError, TransportError};
use crate::router::{OutboundSender, RaftProtocol, RaftRequest, RaftResponse, Topic};

type OutboundTable = Mutex<std::collections::HashMap<Topic, OutboundSender>>;

/// Routing is a `CoordinatorError` concern (spec §4.2/§7 draws `InvalidMember`
/// as distinct from a `Transport` failure); the engine's own surface only
/// speaks `TransportError`, so `InvalidMember` is folded into `NoPeer` here —
/// from the engine's point of view both mean "couldn't reach that uri."
fn outbound_error_to_transport(e: CoordinatorError) -> TransportError {
    match e {
        CoordinatorError::Transport(inner) => inner,
        CoordinatorError::InvalidMember(uri) => TransportError::NoPeer(uri),
        other => TransportError::Io(other.to_string()),
    }
}

// ── Reference (mock) engine ─────────────────────────────────────────────────

/// An in-memory stand-in for a real Raft engine: tracks a term and an
/// optional leader, applies no real consensus, but implements the full
/// [`RaftProtocol`] surface so routing and lifecycle can be exercised in
/// tests without a real quorum.
pub struct MockRaftProtocol {
    node_id: String,
    term: AtomicU64,
    leader: Mutex<Option<String>>,
    outbound: OutboundTable,
}

impl MockRaftProtocol {
    pub fn new() -> Self {
        Self::named("local")
    }

    pub fn named(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            term: AtomicU64::new(0),
            leader: Mutex::new(None),
            outbound: Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn leader(&self) -> Option<String> {
        self.leader.lock().unwrap().clone()
    }

    pub fn term(&self) -> u64 {
        self.term.load(Ordering::SeqCst)
    }

    /// Test hook: force this node to believe it is the leader, as a real
    /// engine would after winning an election.
    pub fn become_leader(&self) {
        *self.leader.lock().unwrap() = Some(self.node_id.clone());
        self.term.fetch_add(1, Ordering::SeqCst);
    }

    fn outbound_for(&self, topic: Topic) -> Option<OutboundSender> {
        self.outbound.lock().unwrap().get(&topic).cloned()
    }

    /// Sends `req` to a peer over `topic`, the way a real engine would use
    /// its outbound slot to reach another node.
    pub async fn send_to_peer(
        &self,
        topic: Topic,
        req: RaftRequest,
    ) -> Result<RaftResponse, TransportError> {
        let sender = self
            .outbound_for(topic)
            .ok_or_else(|| TransportError::Io("outbound not installed".into()))?;
        sender(req).await.map_err(outbound_error_to_transport)
    }

    fn echo(&self, req: RaftRequest) -> RaftResponse {
        RaftResponse {
            payload: serde_json::json!({ "node_id": self.node_id, "echo": req.payload }),
        }
    }
}

impl Default for MockRaftProtocol {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RaftProtocol for MockRaftProtocol {
    async fn on_sync(&self, req: RaftRequest) -> Result<RaftResponse, TransportError> {
        Ok(self.echo(req))
    }

    async fn on_poll(&self, _req: RaftRequest) -> Result<RaftResponse, TransportError> {
        Ok(RaftResponse {
            payload: serde_json::json!({ "node_id": self.node_id, "leader": self.leader(), "term": self.term() }),
        })
    }

    async fn on_vote(&self, req: RaftRequest) -> Result<RaftResponse, TransportError> {
        Ok(self.echo(req))
    }

    async fn on_append(&self, req: RaftRequest) -> Result<RaftResponse, TransportError> {
        Ok(self.echo(req))
    }

    async fn on_query(&self, req: RaftRequest) -> Result<RaftResponse, TransportError> {
        Ok(self.echo(req))
    }

    async fn on_commit(&self, req: RaftRequest) -> Result<RaftResponse, TransportError> {
        Ok(self.echo(req))
    }

    fn set_outbound(&self, topic: Topic, sender: OutboundSender) {
        self.outbound.lock().unwrap().insert(topic, sender);
    }

    fn clear_outbound(&self, topic: Topic) {
        self.outbound.lock().unwrap().remove(&topic);
    }
}

// ── openraft-backed engine (production path) ────────────────────────────────

/// Application log entry: an opaque command bound for a resource's state
/// machine, or a no-op. The concrete resource state machines themselves are
/// out of scope (spec §1); this is the minimal payload the Raft log needs
/// to carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogCommand {
    Apply { command: serde_json::Value },
    Noop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogResponse {
    pub ok: bool,
}

openraft::declare_raft_types!(
    pub TypeConfig:
        D            = LogCommand,
        R            = LogResponse,
        NodeId       = u64,
        Node         = BasicNode,
        Entry        = Entry<TypeConfig>,
        SnapshotData = Cursor<Vec<u8>>,
        AsyncRuntime = TokioRuntime,
);

pub type NodeId = u64;
pub type RaftInstance = openraft::Raft<TypeConfig>;

/// Derives a stable `u64` node id from a URI, the way the coordinator
/// derives a resource cluster id from its name.
pub fn node_id_from_uri(uri: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut h = std::collections::hash_map::DefaultHasher::new();
    uri.hash(&mut h);
    h.finish()
}

/// In-memory combined log + state machine storage, wrapped by
/// `Adaptor::new` to produce the v2 `(RaftLogStorage, RaftStateMachine)`
/// split `Raft::new` requires. Durable, segment-file backed log storage is
/// out of scope (spec §1): it is an external collaborator.
pub struct MemStorage {
    vote: Option<Vote<NodeId>>,
    log: BTreeMap<u64, Entry<TypeConfig>>,
    committed: Option<LogId<NodeId>>,
    last_purged: Option<LogId<NodeId>>,
    last_applied: Option<LogId<NodeId>>,
    last_membership: StoredMembership<NodeId, BasicNode>,
    snapshot: Option<Snapshot<TypeConfig>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self {
            vote: None,
            log: BTreeMap::new(),
            committed: None,
            last_purged: None,
            last_applied: None,
            last_membership: StoredMembership::default(),
            snapshot: None,
        }
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl RaftLogReader<TypeConfig> for MemStorage {
    async fn try_get_log_entries<RB>(
        &mut self,
        range: RB,
    ) -> Result<Vec<Entry<TypeConfig>>, StorageError<NodeId>>
    where
        RB: RangeBounds<u64> + Clone + std::fmt::Debug + Send,
    {
        Ok(self.log.range(range).map(|(_, e)| e.clone()).collect())
    }
}

/// Log reader backed by a snapshot of the log at a point in time.
pub struct MemLogReader {
    log: BTreeMap<u64, Entry<TypeConfig>>,
}

impl RaftLogReader<TypeConfig> for MemLogReader {
    async fn try_get_log_entries<RB>(
        &mut self,
        range: RB,
    ) -> Result<Vec<Entry<TypeConfig>>, StorageError<NodeId>>
    where
        RB: RangeBounds<u64> + Clone + std::fmt::Debug + Send,
    {
        Ok(self.log.range(range).map(|(_, e)| e.clone()).collect())
    }
}

pub struct MemSnapshotBuilder {
    last_applied: Option<LogId<NodeId>>,
    last_membership: StoredMembership<NodeId, BasicNode>,
}

impl RaftSnapshotBuilder<TypeConfig> for MemSnapshotBuilder {
    async fn build_snapshot(&mut self) -> Result<Snapshot<TypeConfig>, StorageError<NodeId>> {
        let data = Vec::new();
        let snap_id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
            .to_string();

        Ok(Snapshot {
            meta: SnapshotMeta {
                last_log_id: self.last_applied,
                last_membership: self.last_membership.clone(),
                snapshot_id: snap_id,
            },
            snapshot: Box::new(Cursor::new(data)),
        })
    }
}

/// `RaftStorage` v1 implementation, wrapped by `Adaptor::new` to produce the
/// v2 split traits. Method names follow the v1 API (`append_to_log`, not
/// `append`; `apply_to_state_machine`, not `apply`).
impl RaftStorage<TypeConfig> for MemStorage {
    type LogReader = MemLogReader;
    type SnapshotBuilder = MemSnapshotBuilder;

    async fn save_vote(&mut self, vote: &Vote<NodeId>) -> Result<(), StorageError<NodeId>> {
        self.vote = Some(*vote);
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<Vote<NodeId>>, StorageError<NodeId>> {
        Ok(self.vote)
    }

    async fn get_log_state(&mut self) -> Result<LogState<TypeConfig>, StorageError<NodeId>> {
        let last = self.log.values().next_back().map(|e| *e.get_log_id());
        Ok(LogState {
            last_purged_log_id: self.last_purged,
            last_log_id: last,
        })
    }

    async fn save_committed(
        &mut self,
        committed: Option<LogId<NodeId>>,
    ) -> Result<(), StorageError<NodeId>> {
        self.committed = committed;
        Ok(())
    }

    async fn read_committed(&mut self) -> Result<Option<LogId<NodeId>>, StorageError<NodeId>> {
        Ok(self.committed)
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        MemLogReader {
            log: self.log.clone(),
        }
    }

    async fn append_to_log<I>(&mut self, entries: I) -> Result<(), StorageError<NodeId>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + Send,
    {
        for entry in entries {
            self.log.insert(entry.get_log_id().index, entry);
        }
        Ok(())
    }

    async fn delete_conflict_logs_since(
        &mut self,
        log_id: LogId<NodeId>,
    ) -> Result<(), StorageError<NodeId>> {
        self.log.retain(|&idx, _| idx < log_id.index);
        Ok(())
    }

    async fn purge_logs_upto(&mut self, log_id: LogId<NodeId>) -> Result<(), StorageError<NodeId>> {
        self.log.retain(|&idx, _| idx > log_id.index);
        self.last_purged = Some(log_id);
        Ok(())
    }

    async fn last_applied_state(
        &mut self,
    ) -> Result<(Option<LogId<NodeId>>, StoredMembership<NodeId, BasicNode>), StorageError<NodeId>>
    {
        Ok((self.last_applied, self.last_membership.clone()))
    }

    async fn apply_to_state_machine(
        &mut self,
        entries: &[Entry<TypeConfig>],
    ) -> Result<Vec<LogResponse>, StorageError<NodeId>> {
        let mut responses = Vec::new();
        for entry in entries {
            self.last_applied = Some(*entry.get_log_id());
            match &entry.payload {
                openraft::EntryPayload::Blank => responses.push(LogResponse { ok: true }),
                openraft::EntryPayload::Normal(_) => responses.push(LogResponse { ok: true }),
                openraft::EntryPayload::Membership(m) => {
                    self.last_membership =
                        StoredMembership::new(Some(*entry.get_log_id()), m.clone());
                    responses.push(LogResponse { ok: true });
                }
            }
        }
        Ok(responses)
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        MemSnapshotBuilder {
            last_applied: self.last_applied,
            last_membership: self.last_membership.clone(),
        }
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> Result<Box<Cursor<Vec<u8>>>, StorageError<NodeId>> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &SnapshotMeta<NodeId, BasicNode>,
        _snapshot: Box<Cursor<Vec<u8>>>,
    ) -> Result<(), StorageError<NodeId>> {
        self.last_applied = meta.last_log_id;
        self.last_membership = meta.last_membership.clone();
        Ok(())
    }

    async fn get_current_snapshot(
        &mut self,
    ) -> Result<Option<Snapshot<TypeConfig>>, StorageError<NodeId>> {
        Ok(self.snapshot.clone())
    }
}

fn unreachable(msg: impl std::fmt::Display) -> Unreachable {
    Unreachable::new(&AnyError::error(msg.to_string()))
}

/// Per-peer network handle whose three RPCs route through the router's
/// installed outbound senders (VOTE, APPEND, SYNC) rather than dialing a
/// transport directly — the coordinator's topic routing *is* this engine's
/// network layer.
pub struct RoutedNetwork {
    target_uri: String,
    outbound: Arc<OutboundTable>,
}

fn to_rpc_error<E: std::error::Error>(e: TransportError) -> RPCError<NodeId, BasicNode, RaftError<NodeId, E>> {
    RPCError::Unreachable(unreachable(e))
}

impl RoutedNetwork {
    async fn send(
        &self,
        topic: Topic,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        let sender = self
            .outbound
            .lock()
            .unwrap()
            .get(&topic)
            .cloned()
            .ok_or_else(|| TransportError::Io("outbound not installed".into()))?;
        let resp = sender(RaftRequest {
            uri: self.target_uri.clone(),
            payload,
        })
        .await
        .map_err(outbound_error_to_transport)?;
        Ok(resp.payload)
    }
}

impl RaftNetwork<TypeConfig> for RoutedNetwork {
    async fn append_entries(
        &mut self,
        rpc: AppendEntriesRequest<TypeConfig>,
        _option: RPCOption,
    ) -> Result<AppendEntriesResponse<NodeId>, RPCError<NodeId, BasicNode, RaftError<NodeId>>> {
        let payload = serde_json::to_value(&rpc)
            .map_err(|e| to_rpc_error(TransportError::Serialization(e.to_string())))?;
        let resp = self.send(Topic::Append, payload).await.map_err(to_rpc_error)?;
        serde_json::from_value(resp)
            .map_err(|e| to_rpc_error(TransportError::Serialization(e.to_string())))
    }

    async fn vote(
        &mut self,
        rpc: VoteRequest<NodeId>,
        _option: RPCOption,
    ) -> Result<VoteResponse<NodeId>, RPCError<NodeId, BasicNode, RaftError<NodeId>>> {
        let payload = serde_json::to_value(&rpc)
            .map_err(|e| to_rpc_error(TransportError::Serialization(e.to_string())))?;
        let resp = self.send(Topic::Vote, payload).await.map_err(to_rpc_error)?;
        serde_json::from_value(resp)
            .map_err(|e| to_rpc_error(TransportError::Serialization(e.to_string())))
    }

    async fn install_snapshot(
        &mut self,
        rpc: InstallSnapshotRequest<TypeConfig>,
        _option: RPCOption,
    ) -> Result<
        InstallSnapshotResponse<NodeId>,
        RPCError<NodeId, BasicNode, RaftError<NodeId, InstallSnapshotError>>,
    > {
        let payload = serde_json::to_value(&rpc)
            .map_err(|e| to_rpc_error::<InstallSnapshotError>(TransportError::Serialization(e.to_string())))?;
        let resp = self
            .send(Topic::Sync, payload)
            .await
            .map_err(to_rpc_error::<InstallSnapshotError>)?;
        serde_json::from_value(resp)
            .map_err(|e| to_rpc_error::<InstallSnapshotError>(TransportError::Serialization(e.to_string())))
    }
}

pub struct RoutedNetworkFactory {
    outbound: Arc<OutboundTable>,
}

impl RaftNetworkFactory<TypeConfig> for RoutedNetworkFactory {
    type Network = RoutedNetwork;

    async fn new_client(&mut self, _target: NodeId, node: &BasicNode) -> Self::Network {
        RoutedNetwork {
            target_uri: node.addr.clone(),
            outbound: self.outbound.clone(),
        }
    }
}

/// Adapts the fixed six-topic [`RaftProtocol`] surface onto a real
/// `openraft::Raft` instance. VOTE/APPEND/SYNC map onto openraft's three
/// wire RPCs; POLL reports leadership/term to a peer polling liveness,
/// QUERY performs a linearizable read-index check, COMMIT proposes a
/// client write — all driven through `self.raft`.
pub struct OpenRaftProtocol {
    raft: RaftInstance,
    outbound: Arc<OutboundTable>,
}

impl OpenRaftProtocol {
    /// Builds a fresh engine bound to `node_id`, initialised (if `members`
    /// is non-empty and this is the lowest id) with the given peer set.
    pub async fn new(node_id: NodeId, members: BTreeMap<NodeId, BasicNode>) -> Self {
        let config = Arc::new(
            openraft::Config {
                heartbeat_interval: 500,
                election_timeout_min: 1_500,
                election_timeout_max: 3_000,
                ..Default::default()
            }
            .validate()
            .expect("valid openraft config"),
        );

        let outbound: Arc<OutboundTable> = Arc::new(Mutex::new(std::collections::HashMap::new()));
        let factory = RoutedNetworkFactory {
            outbound: outbound.clone(),
        };
        let (log_store, state_machine) = Adaptor::new(MemStorage::new());

        let raft = openraft::Raft::new(node_id, config, factory, log_store, state_machine)
            .await
            .expect("failed to create Raft instance");

        if !members.is_empty() {
            let min_id = *members.keys().min().unwrap();
            if node_id == min_id {
                if let Err(e) = raft.initialize(members).await {
                    info!(error = %e, "Raft already initialised (ignoring on restart)");
                }
            }
        }

        Self { raft, outbound }
    }

    pub fn raft(&self) -> &RaftInstance {
        &self.raft
    }

    pub fn is_leader(&self, node_id: NodeId) -> bool {
        self.raft.metrics().borrow().current_leader == Some(node_id)
    }

    pub fn current_leader(&self) -> Option<NodeId> {
        self.raft.metrics().borrow().current_leader
    }
}

#[async_trait]
impl RaftProtocol for OpenRaftProtocol {
    async fn on_sync(&self, req: RaftRequest) -> Result<RaftResponse, TransportError> {
        let rpc: InstallSnapshotRequest<TypeConfig> = serde_json::from_value(req.payload)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        let resp = self
            .raft
            .install_snapshot(rpc)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(RaftResponse {
            payload: serde_json::to_value(resp).map_err(|e| TransportError::Serialization(e.to_string()))?,
        })
    }

    async fn on_poll(&self, _req: RaftRequest) -> Result<RaftResponse, TransportError> {
        let metrics = self.raft.metrics().borrow().clone();
        Ok(RaftResponse {
            payload: serde_json::json!({
                "current_leader": metrics.current_leader,
                "current_term": metrics.current_term,
            }),
        })
    }

    async fn on_vote(&self, req: RaftRequest) -> Result<RaftResponse, TransportError> {
        let rpc: VoteRequest<NodeId> = serde_json::from_value(req.payload)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        let resp = self
            .raft
            .vote(rpc)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(RaftResponse {
            payload: serde_json::to_value(resp).map_err(|e| TransportError::Serialization(e.to_string()))?,
        })
    }

    async fn on_append(&self, req: RaftRequest) -> Result<RaftResponse, TransportError> {
        let rpc: AppendEntriesRequest<TypeConfig> = serde_json::from_value(req.payload)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        let resp = self
            .raft
            .append_entries(rpc)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(RaftResponse {
            payload: serde_json::to_value(resp).map_err(|e| TransportError::Serialization(e.to_string()))?,
        })
    }

    async fn on_query(&self, _req: RaftRequest) -> Result<RaftResponse, TransportError> {
        self.raft
            .ensure_linearizable()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(RaftResponse {
            payload: serde_json::json!({ "linearizable": true }),
        })
    }

    async fn on_commit(&self, req: RaftRequest) -> Result<RaftResponse, TransportError> {
        let resp = self
            .raft
            .client_write(LogCommand::Apply {
                command: req.payload,
            })
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(RaftResponse {
            payload: serde_json::json!({ "ok": resp.data.ok }),
        })
    }

    fn set_outbound(&self, topic: Topic, sender: OutboundSender) {
        self.outbound.lock().unwrap().insert(topic, sender);
    }

    fn clear_outbound(&self, topic: Topic) {
        self.outbound.lock().unwrap().remove(&topic);
    }

    async fn close(&self) {
        if let Err(e) = self.raft.shutdown().await {
            tracing::warn!(error = %e, "raft shutdown join error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_is_deterministic() {
        assert_eq!(node_id_from_uri("node-1"), node_id_from_uri("node-1"));
        assert_ne!(node_id_from_uri("node-1"), node_id_from_uri("node-2"));
    }

    #[tokio::test]
    async fn mem_storage_vote_roundtrip() {
        let mut s = MemStorage::new();
        let vote = Vote::new(1, 42);
        s.save_vote(&vote).await.unwrap();
        assert_eq!(s.read_vote().await.unwrap(), Some(vote));
    }

    #[tokio::test]
    async fn mem_storage_initial_log_state() {
        let mut s = MemStorage::new();
        let state = s.get_log_state().await.unwrap();
        assert!(state.last_log_id.is_none());
        assert!(state.last_purged_log_id.is_none());
    }

    #[tokio::test]
    async fn mock_protocol_echoes_requests() {
        let protocol = MockRaftProtocol::new();
        let resp = protocol
            .on_vote(RaftRequest {
                uri: "peer-1".into(),
                payload: serde_json::json!({"term": 3}),
            })
            .await
            .unwrap();
        assert_eq!(resp.payload["echo"]["term"], 3);
    }

    #[test]
    fn mock_protocol_tracks_leadership() {
        let protocol = MockRaftProtocol::named("node-a");
        assert!(protocol.leader().is_none());
        protocol.become_leader();
        assert_eq!(protocol.leader().as_deref(), Some("node-a"));
        assert_eq!(protocol.term(), 1);
    }
}
