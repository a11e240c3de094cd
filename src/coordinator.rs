//! Coordinator (spec §4.4) — the crate's single entry point: owns the
//! global Raft group, the shared member registry, and every resource's
//! Holder, and enforces the open/close ordering spec §5 requires.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::cluster::{ClusterManager, MembershipEvent, MembershipEventKind};
use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::member::{MemberEndpoint, MemberInfo, MemberKind, Transport};
use crate::registry::MemberRegistry;
use crate::resource::{build_resource, ResourceConfig, ResourceHolder, ResourceKind};
use crate::router::RaftProtocol;

/// Builds a fresh [`RaftProtocol`] instance for a named Raft group (the
/// global context, or one resource). Called once at construction for the
/// global context and once per distinct name from `get_resource`.
pub type ProtocolFactory = Arc<dyn Fn(&str) -> Arc<dyn RaftProtocol> + Send + Sync>;

const GLOBAL_CONTEXT_NAME: &str = "__global__";

/// The crate's top-level handle (spec §3 "Coordinator state"). Built once
/// per node; every resource cluster shares its local Member Endpoint and
/// Member Registry, per spec §1's "co-resident Raft groups sharing one
/// transport."
pub struct Coordinator {
    config: CoordinatorConfig,
    local_member: Arc<MemberEndpoint>,
    members: MemberRegistry,
    global_cluster: Arc<ClusterManager>,
    global_context: Arc<dyn RaftProtocol>,
    resources: RwLock<HashMap<String, Arc<ResourceHolder>>>,
    protocol_factory: ProtocolFactory,
    membership_listener_id: Mutex<Option<u64>>,
    open: AtomicBool,
}

impl Coordinator {
    /// Deep-copies `config`, builds the local Member Endpoint (`ACTIVE`
    /// iff `config.local_member` is itself in `config.members`), a
    /// remote `ACTIVE` Member Endpoint for every other configured uri,
    /// and the global Raft Context/Cluster Manager (id `0`).
    pub async fn new(
        config: CoordinatorConfig,
        transport_factory: impl Fn(&str) -> Arc<dyn Transport>,
        protocol_factory: ProtocolFactory,
    ) -> Result<Self> {
        config.validate()?;

        let local_kind = if config.members.contains(&config.local_member) {
            MemberKind::Active
        } else {
            MemberKind::Passive
        };
        let local_member = MemberEndpoint::new(
            MemberInfo::new(config.local_member.clone(), local_kind),
            transport_factory(&config.local_member),
        );

        let members = MemberRegistry::new();
        members.insert(config.local_member.clone(), local_member.clone()).await;
        for uri in &config.members {
            if uri == &config.local_member {
                continue;
            }
            let endpoint = MemberEndpoint::new(
                MemberInfo::new(uri.clone(), MemberKind::Active),
                transport_factory(uri),
            );
            members.insert(uri.clone(), endpoint).await;
        }

        let global_context = protocol_factory(GLOBAL_CONTEXT_NAME);
        let global_cluster = Arc::new(ClusterManager::new(
            0,
            local_member.clone(),
            members.clone(),
            global_context.clone(),
        ));

        Ok(Self {
            config,
            local_member,
            members,
            global_cluster,
            global_context,
            resources: RwLock::new(HashMap::new()),
            protocol_factory,
            membership_listener_id: Mutex::new(None),
            open: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// No-op if already open. Opens every Member Endpoint in parallel,
    /// installs the membership listener, then opens the global cluster
    /// and global context in order. `open` is set last, and only on
    /// success (spec §5 ordering guarantee 1).
    pub async fn open(&self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let endpoints: Vec<_> = self.members.snapshot().await.into_values().collect();
        let mut handles = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            handles.push(tokio::spawn(async move { endpoint.open().await }));
        }
        for handle in handles {
            handle
                .await
                .map_err(|e| CoordinatorError::Configuration(format!("member endpoint open task panicked: {e}")))?
                .map_err(CoordinatorError::Transport)?;
        }

        let listener_id = self.install_membership_listener().await;
        *self.membership_listener_id.lock().await = Some(listener_id);

        self.global_cluster.open().await;
        self.global_context.open().await;

        self.open.store(true, Ordering::SeqCst);
        info!(local_member = %self.config.local_member, "coordinator opened");
        Ok(())
    }

    /// No-op if not open. Clears the open flag first, then in order:
    /// starts closing every Member Endpoint (futures captured, not yet
    /// awaited), removes the membership listener, closes every resource
    /// holder, closes the global context then the global cluster, and
    /// finally awaits the member-close futures (spec §5 ordering
    /// guarantee 2).
    pub async fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }

        let endpoints: Vec<_> = self.members.snapshot().await.into_values().collect();
        let member_close_handles: Vec<_> = endpoints
            .into_iter()
            .map(|endpoint| tokio::spawn(async move { let _ = endpoint.close().await; }))
            .collect();

        if let Some(id) = self.membership_listener_id.lock().await.take() {
            self.global_cluster.remove_membership_listener(id).await;
        }

        self.close_resources().await;

        self.global_context.close().await;
        self.global_cluster.close().await;

        for handle in member_close_handles {
            let _ = handle.await;
        }
        info!(local_member = %self.config.local_member, "coordinator closed");
    }

    /// Snapshot read of `members`.
    pub async fn member(&self, uri: &str) -> Option<Arc<MemberEndpoint>> {
        self.members.get(uri).await
    }

    /// Unmodifiable view of `members`.
    pub async fn members(&self) -> HashMap<String, Arc<MemberEndpoint>> {
        self.members.snapshot().await
    }

    /// Compute-if-absent in `resources`. `config` defaults to a `Map`
    /// resource with no replica restriction when omitted. Fails with
    /// `Configuration` if `config.replicas` isn't a subset of `members`
    /// or the resource name is empty.
    pub async fn get_resource(&self, name: &str, config: Option<ResourceConfig>) -> Result<Arc<ResourceHolder>> {
        if let Some(holder) = self.resources.read().await.get(name).cloned() {
            return Ok(holder);
        }

        let mut resources = self.resources.write().await;
        if let Some(holder) = resources.get(name).cloned() {
            return Ok(holder);
        }

        let config = config.unwrap_or_else(|| ResourceConfig::new(ResourceKind::Map));
        let known_members = self.members.snapshot().await;
        let known: Vec<&str> = known_members.keys().map(String::as_str).collect();
        config.validate(&known)?;

        let resource = build_resource(name, config.resource_type)?;
        let protocol = (self.protocol_factory)(name);
        let cluster_id = ClusterManager::hash_id(name);
        let cluster = Arc::new(ClusterManager::new(
            cluster_id,
            self.local_member.clone(),
            self.members.clone(),
            protocol.clone(),
        ));
        let holder = Arc::new(ResourceHolder::new(resource, cluster, protocol));
        resources.insert(name.to_string(), holder.clone());
        Ok(holder)
    }

    /// Fails `NotOpen` unless the coordinator is open, `UnknownResource`
    /// if `name` was never registered via `get_resource`. No-op if the
    /// holder's cluster is already open.
    pub async fn acquire_resource(&self, name: &str) -> Result<()> {
        if !self.is_open() {
            return Err(CoordinatorError::NotOpen);
        }
        let holder = self
            .resources
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| CoordinatorError::UnknownResource(name.to_string()))?;
        holder.acquire().await;
        Ok(())
    }

    /// No-op if the holder's cluster is already closed. Fails
    /// `UnknownResource` if `name` was never registered.
    pub async fn release_resource(&self, name: &str) -> Result<()> {
        let holder = self
            .resources
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| CoordinatorError::UnknownResource(name.to_string()))?;
        holder.release().await;
        Ok(())
    }

    /// Closes every registered resource holder concurrently; returns once
    /// all have finished closing.
    async fn close_resources(&self) {
        let holders: Vec<_> = self.resources.read().await.values().cloned().collect();
        let handles: Vec<_> = holders
            .into_iter()
            .map(|holder| tokio::spawn(async move { holder.release().await }))
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Installs the membership listener that keeps `members` in sync with
    /// `JOIN`/`LEAVE` events from the global cluster. `JOIN` inserts the
    /// event's own endpoint idempotently (existing entries untouched);
    /// `LEAVE` removes the uri. The endpoint is carried directly on the
    /// event, so no downcast from a trait object is ever needed.
    async fn install_membership_listener(&self) -> u64 {
        let members = self.members.clone();
        self.global_cluster
            .add_membership_listener(Arc::new(move |event: MembershipEvent| {
                let members = members.clone();
                Box::pin(async move {
                    let uri = event.member.info().await.uri;
                    match event.kind {
                        MembershipEventKind::Join => {
                            if !members.contains(&uri).await {
                                members.insert(uri, event.member).await;
                            }
                        }
                        MembershipEventKind::Leave => {
                            members.remove(&uri).await;
                        }
                    }
                })
            }))
            .await
    }
}
