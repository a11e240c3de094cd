//! Resource Router (spec §4.2) — binds a Raft protocol engine to the local
//! member's handler table under six fixed topics, and translates the
//! engine's outbound requests into member-endpoint sends.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cluster::ClusterManager;
use crate::error::{CoordinatorError, TransportError};

/// Symbolic address used to multiplex protocol traffic on one transport.
/// Exactly six topics exist; this is a closed set by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Sync,
    Poll,
    Vote,
    Append,
    Query,
    Commit,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Topic::Sync,
        Topic::Poll,
        Topic::Vote,
        Topic::Append,
        Topic::Query,
        Topic::Commit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Sync => "SYNC",
            Topic::Poll => "POLL",
            Topic::Vote => "VOTE",
            Topic::Append => "APPEND",
            Topic::Query => "QUERY",
            Topic::Commit => "COMMIT",
        }
    }
}

/// The only protocol ID ever used: the ID space is intentionally small
/// because at most one Raft protocol is active per cluster.
pub const PROTOCOL_ID: u16 = 1;

/// A request carrying a target `uri`, as required by every Raft protocol
/// request the core consumes (spec §6). `payload` is the engine-specific
/// request body, opaque to the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftRequest {
    pub uri: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftResponse {
    pub payload: serde_json::Value,
}

/// An outbound callback the router installs on the protocol engine for one
/// topic: given a request (carrying its target uri), look up the peer and
/// send. Fails with `InvalidMember` when `req.uri` names no member of this
/// cluster (a routing-policy error, distinct from a `Transport` failure
/// reaching a uri that is a member) — spec §4.2/§7.
pub type OutboundSender = Arc<
    dyn Fn(RaftRequest) -> Pin<Box<dyn Future<Output = Result<RaftResponse, CoordinatorError>> + Send>>
        + Send
        + Sync,
>;

/// The external collaborator this crate does not implement: a Raft protocol
/// engine instance with a well-defined handler surface. Each of the six
/// fixed topics has an inbound method the router forwards requests to, and
/// an outbound slot the router fills with a sender that reaches peers
/// through the owning cluster's members.
#[async_trait]
pub trait RaftProtocol: Send + Sync + 'static {
    async fn on_sync(&self, req: RaftRequest) -> Result<RaftResponse, TransportError>;
    async fn on_poll(&self, req: RaftRequest) -> Result<RaftResponse, TransportError>;
    async fn on_vote(&self, req: RaftRequest) -> Result<RaftResponse, TransportError>;
    async fn on_append(&self, req: RaftRequest) -> Result<RaftResponse, TransportError>;
    async fn on_query(&self, req: RaftRequest) -> Result<RaftResponse, TransportError>;
    async fn on_commit(&self, req: RaftRequest) -> Result<RaftResponse, TransportError>;

    /// Installs the outbound callback for `topic`. Called once per topic by
    /// `create_routes`.
    fn set_outbound(&self, topic: Topic, sender: OutboundSender);

    /// Clears the outbound callback for `topic`, so the engine can no
    /// longer emit messages through it. Called once per topic by
    /// `destroy_routes`.
    fn clear_outbound(&self, topic: Topic);

    /// Starts the engine's own driving (election timers, log replication).
    /// A no-op for engines that are already live once constructed.
    async fn open(&self) {}

    /// Stops the engine's own driving. A no-op by default.
    async fn close(&self) {}
}

fn serialize_response(resp: RaftResponse) -> Result<Vec<u8>, TransportError> {
    serde_json::to_vec(&resp).map_err(|e| TransportError::Serialization(e.to_string()))
}

fn deserialize_request(payload: Vec<u8>) -> Result<RaftRequest, TransportError> {
    serde_json::from_slice(&payload).map_err(|e| TransportError::Serialization(e.to_string()))
}

/// Binds a [`RaftProtocol`] to a cluster's local member handler table
/// (inbound) and its outbound request slots (outbound), under the six
/// fixed topics.
pub struct ResourceRouter;

macro_rules! inbound_handler {
    ($protocol:expr, $method:ident) => {{
        let protocol = $protocol.clone();
        let handler: crate::member::InboundHandler = Arc::new(move |payload: Vec<u8>| {
            let protocol = protocol.clone();
            Box::pin(async move {
                let req = deserialize_request(payload)?;
                let resp = protocol.$method(req).await?;
                serialize_response(resp)
            })
        });
        handler
    }};
}

impl ResourceRouter {
    /// Installs all six inbound handlers and all six outbound senders.
    /// MUST complete before the protocol engine is opened.
    pub async fn create_routes(cluster: &ClusterManager, protocol: Arc<dyn RaftProtocol>) {
        let local = cluster.local_member();

        local
            .register_handler(Topic::Sync, PROTOCOL_ID, inbound_handler!(protocol, on_sync))
            .await;
        local
            .register_handler(Topic::Poll, PROTOCOL_ID, inbound_handler!(protocol, on_poll))
            .await;
        local
            .register_handler(Topic::Vote, PROTOCOL_ID, inbound_handler!(protocol, on_vote))
            .await;
        local
            .register_handler(Topic::Append, PROTOCOL_ID, inbound_handler!(protocol, on_append))
            .await;
        local
            .register_handler(Topic::Query, PROTOCOL_ID, inbound_handler!(protocol, on_query))
            .await;
        local
            .register_handler(Topic::Commit, PROTOCOL_ID, inbound_handler!(protocol, on_commit))
            .await;

        for topic in Topic::ALL {
            let cluster_handle = cluster.clone();
            let sender: OutboundSender = Arc::new(move |req: RaftRequest| {
                let cluster_handle = cluster_handle.clone();
                Box::pin(async move {
                    let member = cluster_handle
                        .member(&req.uri)
                        .await
                        .ok_or_else(|| invalid_member(req.uri.clone()))?;
                    let payload = serde_json::to_vec(&req)
                        .map_err(|e| CoordinatorError::Transport(TransportError::Serialization(e.to_string())))?;
                    let resp_bytes = member
                        .send(topic, PROTOCOL_ID, payload)
                        .await
                        .map_err(CoordinatorError::Transport)?;
                    serde_json::from_slice(&resp_bytes)
                        .map_err(|e| CoordinatorError::Transport(TransportError::Serialization(e.to_string())))
                })
            });
            protocol.set_outbound(topic, sender);
        }

        info!(cluster_id = cluster.id, "routes installed");
    }

    /// Unregisters all six handlers and clears all six outbound callbacks.
    /// MUST occur after the protocol engine is closed. After this call the
    /// protocol can neither emit nor receive any message through this
    /// cluster.
    pub async fn destroy_routes(cluster: &ClusterManager, protocol: Arc<dyn RaftProtocol>) {
        let local = cluster.local_member();
        for topic in Topic::ALL {
            local.unregister_handler(topic, PROTOCOL_ID).await;
            protocol.clear_outbound(topic);
        }
        debug!(cluster_id = cluster.id, "routes destroyed");
    }
}

/// Looking up a peer outside the cluster's current member set fails fast,
/// per spec invariant 5.
pub fn invalid_member(uri: impl Into<String>) -> CoordinatorError {
    CoordinatorError::InvalidMember(uri.into())
}
