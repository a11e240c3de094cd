//! Member Registry (spec §2, component B) — concurrent `uri -> Member
//! Endpoint` mapping shared by the Coordinator and every Cluster Manager.
//! Reads are lock-free-ish (a single `RwLock` read guard); writes are
//! restricted to the membership-event handler and coordinator close, per
//! spec §5's shared-resource policy.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::member::MemberEndpoint;

#[derive(Clone, Default)]
pub struct MemberRegistry {
    members: Arc<RwLock<HashMap<String, Arc<MemberEndpoint>>>>,
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, uri: &str) -> Option<Arc<MemberEndpoint>> {
        self.members.read().await.get(uri).cloned()
    }

    pub async fn insert(&self, uri: String, endpoint: Arc<MemberEndpoint>) {
        self.members.write().await.insert(uri, endpoint);
    }

    pub async fn remove(&self, uri: &str) -> Option<Arc<MemberEndpoint>> {
        self.members.write().await.remove(uri)
    }

    pub async fn contains(&self, uri: &str) -> bool {
        self.members.read().await.contains_key(uri)
    }

    /// An unmodifiable view, per spec §4.4's `members()` contract.
    pub async fn snapshot(&self) -> HashMap<String, Arc<MemberEndpoint>> {
        self.members.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{MemberInfo, MemberKind};
    use crate::transport::InMemoryNetwork;

    #[tokio::test]
    async fn insert_then_remove_is_observable() {
        let net = InMemoryNetwork::new();
        let registry = MemberRegistry::new();
        let endpoint = MemberEndpoint::new(
            MemberInfo::new("test-1", MemberKind::Active),
            net.transport_for("test-1".into()),
        );

        assert!(registry.get("test-1").await.is_none());
        registry.insert("test-1".into(), endpoint).await;
        assert!(registry.get("test-1").await.is_some());
        assert_eq!(registry.len().await, 1);

        registry.remove("test-1").await;
        assert!(registry.get("test-1").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn snapshot_is_a_point_in_time_copy() {
        let net = InMemoryNetwork::new();
        let registry = MemberRegistry::new();
        let endpoint = MemberEndpoint::new(
            MemberInfo::new("test-1", MemberKind::Active),
            net.transport_for("test-1".into()),
        );
        registry.insert("test-1".into(), endpoint).await;

        let snap = registry.snapshot().await;
        registry.insert(
            "test-2".into(),
            MemberEndpoint::new(
                MemberInfo::new("test-2", MemberKind::Active),
                net.transport_for("test-2".into()),
            ),
        )
        .await;

        assert_eq!(snap.len(), 1);
        assert_eq!(registry.len().await, 2);
    }
}
