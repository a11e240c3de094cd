//! Transport implementations for [`crate::member::Transport`].
//!
//! Two implementations: [`InMemoryNetwork`] — a shared in-process registry
//! used by tests and by the scenario harness in spec §8, modeled on the
//! teacher's static/Consul discovery duality but collapsed to a single
//! process; and [`GrpcTransport`] — the production path, dialing peers
//! over the `MemberTransport` gRPC service (spec §4.1/§6) the way the
//! teacher's `GrpcNetwork` dials `LoadTestCoordinator`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;
use tracing::warn;

use crate::error::TransportError;
use crate::member::{MemberEndpoint, Transport};
use crate::router::Topic;

pub mod proto {
    tonic::include_proto!("coordinator");
}

use proto::member_transport_client::MemberTransportClient;
use proto::member_transport_server::{MemberTransport, MemberTransportServer};
use proto::Envelope;

fn topic_tag(topic: Topic) -> &'static str {
    topic.as_str()
}

fn topic_from_tag(tag: &str) -> Result<Topic, TransportError> {
    Topic::ALL
        .into_iter()
        .find(|t| t.as_str() == tag)
        .ok_or_else(|| TransportError::Io(format!("unknown topic tag '{tag}'")))
}

// ── In-memory network (tests, scenario harness) ────────────────────────────

/// Shared in-process registry mapping a peer's URI to the local
/// [`MemberEndpoint`] hosting it. Used in place of real sockets so the
/// three-node scenarios in spec §8 can run deterministically in one
/// process.
#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    endpoints: Arc<RwLock<HashMap<String, Arc<MemberEndpoint>>>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, uri: String, endpoint: Arc<MemberEndpoint>) {
        self.endpoints.write().await.insert(uri, endpoint);
    }

    pub async fn unregister(&self, uri: &str) {
        self.endpoints.write().await.remove(uri);
    }

    /// Builds a [`Transport`] that, when sent to, looks up `target_uri` in
    /// this registry and dispatches directly into its endpoint — the
    /// in-memory stand-in for a network hop.
    pub fn transport_for(&self, target_uri: String) -> Arc<dyn Transport> {
        Arc::new(InMemoryTransport {
            target_uri,
            endpoints: self.endpoints.clone(),
        })
    }
}

struct InMemoryTransport {
    target_uri: String,
    endpoints: Arc<RwLock<HashMap<String, Arc<MemberEndpoint>>>>,
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn open(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(
        &self,
        topic: Topic,
        protocol_id: u16,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        let endpoint = self
            .endpoints
            .read()
            .await
            .get(&self.target_uri)
            .cloned()
            .ok_or_else(|| TransportError::NoPeer(self.target_uri.clone()))?;
        endpoint.dispatch(topic, protocol_id, payload).await
    }
}

// ── gRPC network (production path) ──────────────────────────────────────────

/// Per-peer gRPC channel, dialed lazily on first send (mirrors the
/// teacher's `connect_lazy` + bounded connect/RPC timeouts so a down peer
/// fails fast instead of hanging until an election timer fires).
pub struct GrpcTransport {
    target_addr: String,
    client: RwLock<Option<MemberTransportClient<Channel>>>,
}

impl GrpcTransport {
    pub fn new(target_addr: impl Into<String>) -> Arc<dyn Transport> {
        Arc::new(Self {
            target_addr: target_addr.into(),
            client: RwLock::new(None),
        })
    }

    async fn client(&self) -> Result<MemberTransportClient<Channel>, TransportError> {
        if let Some(c) = self.client.read().await.as_ref() {
            return Ok(c.clone());
        }
        let uri = if self.target_addr.starts_with("http") {
            self.target_addr.clone()
        } else {
            format!("http://{}", self.target_addr)
        };
        let channel = Endpoint::from_shared(uri)
            .map_err(|e| TransportError::Io(e.to_string()))?
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(4))
            .connect_lazy();
        let client = MemberTransportClient::new(channel);
        *self.client.write().await = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    async fn open(&self) -> Result<(), TransportError> {
        self.client().await.map(|_| ())
    }

    async fn close(&self) -> Result<(), TransportError> {
        *self.client.write().await = None;
        Ok(())
    }

    async fn send(
        &self,
        topic: Topic,
        protocol_id: u16,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        let mut client = self.client().await?;
        let resp = client
            .send(Request::new(Envelope {
                topic: topic_tag(topic).to_string(),
                protocol_id: protocol_id as u32,
                payload,
            }))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(resp.into_inner().payload)
    }
}

/// Server-side gRPC service dispatching inbound envelopes into the local
/// member's handler table (spec §4.1's "local member" handler table).
#[derive(Clone)]
pub struct MemberTransportService {
    local_member: Arc<MemberEndpoint>,
}

impl MemberTransportService {
    pub fn new(local_member: Arc<MemberEndpoint>) -> MemberTransportServer<Self> {
        MemberTransportServer::new(Self { local_member })
    }
}

#[tonic::async_trait]
impl MemberTransport for MemberTransportService {
    async fn send(
        &self,
        request: Request<Envelope>,
    ) -> Result<tonic::Response<Envelope>, tonic::Status> {
        let envelope = request.into_inner();
        let topic = topic_from_tag(&envelope.topic)
            .map_err(|e| tonic::Status::invalid_argument(e.to_string()))?;

        let response_payload = self
            .local_member
            .dispatch(topic, envelope.protocol_id as u16, envelope.payload)
            .await
            .map_err(|e| {
                warn!(error = %e, "dispatch failed");
                tonic::Status::unavailable(e.to_string())
            })?;

        Ok(tonic::Response::new(Envelope {
            topic: envelope.topic,
            protocol_id: envelope.protocol_id,
            payload: response_payload,
        }))
    }
}
