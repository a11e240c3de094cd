//! Member Endpoint (spec §4.1) — per-peer send/receive abstraction keyed by
//! URI, with a single-threaded cooperative scheduler serializing every
//! handler invocation and outbound send bound to that peer.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::router::{Topic, PROTOCOL_ID};

/// Participation in the global Raft quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Participates in the global Raft quorum.
    Active,
    /// Observes the cluster but never votes.
    Passive,
}

/// Liveness as tracked by the membership layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Alive,
    Suspicious,
    Dead,
}

/// `{uri, type, status}` tuple. URI is the primary key across the whole
/// system; mutated only via membership events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub uri: String,
    pub kind: MemberKind,
    pub status: MemberStatus,
}

impl MemberInfo {
    pub fn new(uri: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            uri: uri.into(),
            kind,
            status: MemberStatus::Alive,
        }
    }
}

/// A handler invoked with the raw inbound payload for a `(topic,
/// protocol_id)` pair, returning the raw outbound response payload.
pub type InboundHandler = Arc<
    dyn Fn(Vec<u8>) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransportError>> + Send>>
        + Send
        + Sync,
>;

/// The wire-level contract a member endpoint sits on top of. Implementations
/// own physical connectivity (a gRPC channel, an in-memory queue for tests)
/// and dispatch every inbound request into whatever handler is currently
/// registered for its `(topic, protocol_id)`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self) -> Result<(), TransportError>;
    async fn close(&self) -> Result<(), TransportError>;

    /// Send `payload` to this transport's peer under `(topic, protocol_id)`
    /// and await the reply. Fails with [`TransportError::NoPeer`] if the
    /// peer is unreachable or unknown.
    async fn send(
        &self,
        topic: Topic,
        protocol_id: u16,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError>;
}

/// One unit of work serialized on a member endpoint's executor: either an
/// inbound dispatch or an outbound send, each carrying a reply channel.
enum EndpointCommand {
    Dispatch {
        topic: Topic,
        protocol_id: u16,
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<Vec<u8>, TransportError>>,
    },
    Send {
        topic: Topic,
        protocol_id: u16,
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<Vec<u8>, TransportError>>,
    },
}

/// Per-peer send/receive abstraction (spec §4.1).
///
/// All handler invocations and outbound sends bound to one endpoint run one
/// at a time, in submission order, on a single background task — the Rust
/// stand-in for the "single-thread cooperative scheduler" the spec
/// describes. `open`/`close` are idempotent.
pub struct MemberEndpoint {
    info: RwLock<MemberInfo>,
    transport: Arc<dyn Transport>,
    handlers: Arc<RwLock<HashMap<(Topic, u16), InboundHandler>>>,
    open: Arc<AtomicBool>,
    cmd_tx: mpsc::UnboundedSender<EndpointCommand>,
}

impl MemberEndpoint {
    pub fn new(info: MemberInfo, transport: Arc<dyn Transport>) -> Arc<Self> {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<EndpointCommand>();
        let handlers: Arc<RwLock<HashMap<(Topic, u16), InboundHandler>>> =
            Arc::new(RwLock::new(HashMap::new()));
        let transport_for_task = transport.clone();
        let handlers_for_task = handlers.clone();

        // The endpoint's executor: a single task draining `cmd_rx` in
        // order, so no two handler invocations or sends for this peer ever
        // run concurrently.
        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                match cmd {
                    EndpointCommand::Dispatch {
                        topic,
                        protocol_id,
                        payload,
                        reply,
                    } => {
                        let handler = handlers_for_task.read().await.get(&(topic, protocol_id)).cloned();
                        let result = match handler {
                            Some(h) => h(payload).await,
                            None => Err(TransportError::NoPeer(format!(
                                "no handler for ({topic:?}, {protocol_id})"
                            ))),
                        };
                        let _ = reply.send(result);
                    }
                    EndpointCommand::Send {
                        topic,
                        protocol_id,
                        payload,
                        reply,
                    } => {
                        let result = transport_for_task.send(topic, protocol_id, payload).await;
                        let _ = reply.send(result);
                    }
                }
            }
        });

        Arc::new(Self {
            info: RwLock::new(info),
            transport,
            handlers,
            open: Arc::new(AtomicBool::new(false)),
            cmd_tx,
        })
    }

    pub async fn info(&self) -> MemberInfo {
        self.info.read().await.clone()
    }

    pub async fn set_status(&self, status: MemberStatus) {
        self.info.write().await.status = status;
    }

    /// Idempotent: returns immediately if already open.
    pub async fn open(&self) -> Result<(), TransportError> {
        if self.open.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.transport.open().await?;
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Idempotent: returns immediately if already closed.
    pub async fn close(&self) -> Result<(), TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.open.store(false, Ordering::SeqCst);
        self.transport.close().await
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Installs a handler keyed by `(topic, protocol_id)`. At most one
    /// handler per key; re-registration replaces.
    pub async fn register_handler(&self, topic: Topic, protocol_id: u16, handler: InboundHandler) {
        debug!(?topic, protocol_id, "registering inbound handler");
        self.handlers.write().await.insert((topic, protocol_id), handler);
    }

    /// Removes the handler; safe if absent.
    pub async fn unregister_handler(&self, topic: Topic, protocol_id: u16) {
        debug!(?topic, protocol_id, "unregistering inbound handler");
        self.handlers.write().await.remove(&(topic, protocol_id));
    }

    /// Dispatches an inbound request to whatever handler is currently
    /// registered, serialized on this endpoint's executor. Used by the
    /// transport layer (gRPC service handler, in-memory network) to deliver
    /// a received request into this node's handler table.
    pub async fn dispatch(
        &self,
        topic: Topic,
        protocol_id: u16,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(EndpointCommand::Dispatch {
                topic,
                protocol_id,
                payload,
                reply: reply_tx,
            })
            .map_err(|_| TransportError::Io("endpoint executor shut down".into()))?;
        reply_rx
            .await
            .map_err(|_| TransportError::Io("endpoint executor dropped reply".into()))?
    }

    /// Serializes `payload`, transports it to this endpoint's peer, and
    /// awaits the reply. Fails with [`TransportError::NoPeer`] if the peer
    /// is unreachable.
    pub async fn send(
        &self,
        topic: Topic,
        protocol_id: u16,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        if !self.is_open() {
            warn!(?topic, protocol_id, "send on a closed member endpoint");
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(EndpointCommand::Send {
                topic,
                protocol_id,
                payload,
                reply: reply_tx,
            })
            .map_err(|_| TransportError::Io("endpoint executor shut down".into()))?;
        reply_rx
            .await
            .map_err(|_| TransportError::Io("endpoint executor dropped reply".into()))?
    }
}

/// Convenience constant mirroring the spec's `(topic, PROTOCOL_ID)` keying;
/// re-exported here so callers need not import from [`crate::router`] just
/// to register a handler.
pub const DEFAULT_PROTOCOL_ID: u16 = PROTOCOL_ID;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryNetwork;

    #[tokio::test]
    async fn open_close_are_idempotent() {
        let net = InMemoryNetwork::new();
        let transport = net.transport_for("test-1".into());
        let endpoint = MemberEndpoint::new(MemberInfo::new("test-1", MemberKind::Active), transport);

        endpoint.open().await.unwrap();
        endpoint.open().await.unwrap();
        assert!(endpoint.is_open());

        endpoint.close().await.unwrap();
        endpoint.close().await.unwrap();
        assert!(!endpoint.is_open());
    }

    #[tokio::test]
    async fn register_then_unregister_handler_is_safe() {
        let net = InMemoryNetwork::new();
        let transport = net.transport_for("test-1".into());
        let endpoint = MemberEndpoint::new(MemberInfo::new("test-1", MemberKind::Active), transport);

        let handler: InboundHandler = Arc::new(|payload| Box::pin(async move { Ok(payload) }));
        endpoint.register_handler(Topic::Vote, PROTOCOL_ID, handler).await;
        endpoint.unregister_handler(Topic::Vote, PROTOCOL_ID).await;
        // Unregistering an absent key is safe too.
        endpoint.unregister_handler(Topic::Vote, PROTOCOL_ID).await;

        let result = endpoint.dispatch(Topic::Vote, PROTOCOL_ID, vec![1]).await;
        assert!(matches!(result, Err(TransportError::NoPeer(_))));
    }

    #[tokio::test]
    async fn dispatch_invokes_registered_handler() {
        let net = InMemoryNetwork::new();
        let transport = net.transport_for("test-1".into());
        let endpoint = MemberEndpoint::new(MemberInfo::new("test-1", MemberKind::Active), transport);

        let handler: InboundHandler =
            Arc::new(|payload| Box::pin(async move { Ok([payload, vec![9]].concat()) }));
        endpoint.register_handler(Topic::Append, PROTOCOL_ID, handler).await;

        let resp = endpoint
            .dispatch(Topic::Append, PROTOCOL_ID, vec![1, 2])
            .await
            .unwrap();
        assert_eq!(resp, vec![1, 2, 9]);
    }
}
