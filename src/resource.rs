//! Resource Holder (spec §4.4, §9) — binds one user-facing Resource handle
//! to its private Cluster Manager and Raft Context, plus the
//! `ResourceKind` factory table that replaces the source's reflective,
//! single-argument resource construction (spec §9).

use std::sync::Arc;

use crate::cluster::ClusterManager;
use crate::error::{CoordinatorError, Result};
use crate::router::RaftProtocol;

/// Closed enumeration of concrete resource types a `ResourceConfig` can
/// name. The state machines themselves are out of scope (spec §1) — each
/// variant is instantiated as a thin [`Resource`] handle carrying the kind
/// and a name, adapted to its private Raft Context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    AtomicBoolean,
    AtomicReference,
    StateLog,
    Map,
    Set,
}

impl ResourceKind {
    fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::AtomicBoolean => "AtomicBoolean",
            ResourceKind::AtomicReference => "AtomicReference",
            ResourceKind::StateLog => "StateLog",
            ResourceKind::Map => "Map",
            ResourceKind::Set => "Set",
        }
    }
}

/// Flattened replacement for the source's deep `AsyncBooleanConfig :
/// ResourceConfig`, `AsyncReferenceConfig : AsyncCollectionConfig`
/// hierarchy (spec §9): one record, variant behavior selected by
/// `resource_type`.
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    pub resource_type: ResourceKind,
    /// Serializer override; `None` uses the coordinator-wide default.
    pub serializer: Option<String>,
    /// Must be a subset of the coordinator's `members`, or empty (spec §6).
    pub replicas: Vec<String>,
}

impl ResourceConfig {
    pub fn new(resource_type: ResourceKind) -> Self {
        Self {
            resource_type,
            serializer: None,
            replicas: Vec::new(),
        }
    }

    pub fn with_replicas(mut self, replicas: Vec<String>) -> Self {
        self.replicas = replicas;
        self
    }

    /// Validates `replicas` is a subset of `known_members`, per spec §6 /
    /// scenario 6. Empty `replicas` is always valid (defaults to the full
    /// member set at the Raft layer).
    pub fn validate(&self, known_members: &[&str]) -> Result<()> {
        for replica in &self.replicas {
            if !known_members.contains(&replica.as_str()) {
                return Err(CoordinatorError::Configuration(format!(
                    "replica '{replica}' is not a member of this cluster"
                )));
            }
        }
        Ok(())
    }
}

/// A thin, user-facing handle over a named resource's private Raft Context.
/// The concrete state-machine semantics (what `AtomicBoolean::set` does,
/// what `Map::get` does) are out of scope (spec §1); what's implemented
/// here is the structural identity the Coordinator dispatches on and
/// returns from `get_resource`.
pub trait Resource: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
    fn kind(&self) -> ResourceKind;
}

#[derive(Debug)]
struct GenericResource {
    name: String,
    kind: ResourceKind,
}

impl Resource for GenericResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }
}

/// The factory table spec §9 calls for: `resource_kind` dispatched through
/// a constructor, replacing reflective single-argument construction.
/// Unknown kinds can't arise (the enum is closed), but an empty resource
/// name is rejected the same way a bad reflective constructor argument
/// would be: `ConfigurationError`.
pub fn build_resource(name: &str, kind: ResourceKind) -> Result<Arc<dyn Resource>> {
    if name.is_empty() {
        return Err(CoordinatorError::Configuration(format!(
            "cannot instantiate {} resource with an empty name",
            kind.as_str()
        )));
    }
    Ok(Arc::new(GenericResource {
        name: name.to_string(),
        kind,
    }))
}

/// Resource Holder (spec §3): `{resource, cluster, state}`. Exclusively
/// owned by the Coordinator; created by `get_resource`, opened lazily by
/// `acquire_resource`, closed by `release_resource` or coordinator
/// shutdown.
pub struct ResourceHolder {
    pub resource: Arc<dyn Resource>,
    pub cluster: Arc<ClusterManager>,
    pub state: Arc<dyn RaftProtocol>,
}

impl std::fmt::Debug for ResourceHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHolder")
            .field("resource", &self.resource)
            .field("cluster_id", &self.cluster.id)
            .finish_non_exhaustive()
    }
}

impl ResourceHolder {
    pub fn new(resource: Arc<dyn Resource>, cluster: Arc<ClusterManager>, state: Arc<dyn RaftProtocol>) -> Self {
        Self {
            resource,
            cluster,
            state,
        }
    }

    /// Opens the cluster (installing routes), then the Raft Context —
    /// the order spec §4.2 requires (`create_routes` before the engine is
    /// driven). No-op if already open.
    pub async fn acquire(&self) {
        if self.cluster.is_open() {
            return;
        }
        self.cluster.open().await;
        self.state.open().await;
    }

    /// Closes the Raft Context, then the cluster (destroying routes) —
    /// the reverse of `acquire`, per invariant 2. No-op if already closed.
    pub async fn release(&self) {
        if self.cluster.is_closed() {
            return;
        }
        self.state.close().await;
        self.cluster.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replicas_subset_of_members_is_valid() {
        let config = ResourceConfig::new(ResourceKind::Map)
            .with_replicas(vec!["test-1".into(), "test-2".into()]);
        assert!(config.validate(&["test-1", "test-2", "test-3"]).is_ok());
    }

    #[test]
    fn replicas_outside_members_is_configuration_error() {
        let config = ResourceConfig::new(ResourceKind::Map).with_replicas(vec!["test-99".into()]);
        let err = config.validate(&["test-1", "test-2", "test-3"]).unwrap_err();
        assert!(matches!(err, CoordinatorError::Configuration(_)));
    }

    #[test]
    fn empty_replicas_is_always_valid() {
        let config = ResourceConfig::new(ResourceKind::AtomicBoolean);
        assert!(config.validate(&[]).is_ok());
    }

    #[test]
    fn build_resource_rejects_empty_name() {
        let err = build_resource("", ResourceKind::Set).unwrap_err();
        assert!(matches!(err, CoordinatorError::Configuration(_)));
    }

    #[test]
    fn build_resource_carries_kind_and_name() {
        let resource = build_resource("alpha", ResourceKind::StateLog).unwrap();
        assert_eq!(resource.name(), "alpha");
        assert_eq!(resource.kind(), ResourceKind::StateLog);
    }
}
