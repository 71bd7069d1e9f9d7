use crate::error::{Result, RuntimeError};
use crate::traits::PodClient;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use readygate_core::PodKey;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct MockState {
    pods: BTreeMap<PodKey, Pod>,
    next_version: u64,
    status_updates: u64,
    forced_conflicts: u32,
}

/// In-memory Pod store for tests and local development
///
/// Mimics the API server's optimistic concurrency: every write bumps
/// `metadata.resourceVersion`, and a status write carrying a different
/// version fails with `Conflict`.
#[derive(Clone, Default)]
pub struct MockPodClient {
    state: Arc<RwLock<MockState>>,
}

impl MockPodClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a Pod, assigning a fresh resourceVersion
    pub async fn insert_pod(&self, mut pod: Pod) -> Result<PodKey> {
        let key = PodKey::from_pod(&pod)?;
        let mut state = self.state.write().await;
        state.next_version += 1;
        pod.metadata.namespace = Some(key.namespace.clone());
        pod.metadata.resource_version = Some(state.next_version.to_string());
        state.pods.insert(key.clone(), pod);
        debug!("Mock: pod stored: {}", key);
        Ok(key)
    }

    /// Current stored copy of a Pod
    pub async fn pod(&self, key: &PodKey) -> Option<Pod> {
        self.state.read().await.pods.get(key).cloned()
    }

    /// Number of successful status writes so far
    pub async fn status_updates(&self) -> u64 {
        self.state.read().await.status_updates
    }

    /// Make the next `count` status writes fail with `Conflict`
    pub async fn fail_status_updates_with_conflict(&self, count: u32) {
        self.state.write().await.forced_conflicts = count;
    }
}

#[async_trait]
impl PodClient for MockPodClient {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        let key = PodKey::new(namespace, name);
        self.state
            .read()
            .await
            .pods
            .get(&key)
            .cloned()
            .ok_or_else(|| RuntimeError::pod_not_found(namespace, name))
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>> {
        let state = self.state.read().await;
        Ok(state
            .pods
            .iter()
            .filter(|(k, _)| namespace.map(|ns| k.namespace == ns).unwrap_or(true))
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn update_pod_status(&self, namespace: &str, name: &str, pod: &Pod) -> Result<Pod> {
        let key = PodKey::new(namespace, name);
        let mut state = self.state.write().await;

        if state.forced_conflicts > 0 {
            state.forced_conflicts -= 1;
            return Err(RuntimeError::conflict(
                namespace,
                name,
                "the object has been modified; please apply your changes to the latest version and try again",
            ));
        }

        state.next_version += 1;
        let next_version = state.next_version.to_string();

        let stored = state
            .pods
            .get_mut(&key)
            .ok_or_else(|| RuntimeError::pod_not_found(namespace, name))?;

        if let Some(version) = pod.metadata.resource_version.as_deref() {
            if stored.metadata.resource_version.as_deref() != Some(version) {
                return Err(RuntimeError::conflict(
                    namespace,
                    name,
                    format!(
                        "resourceVersion {} is stale (current {})",
                        version,
                        stored.metadata.resource_version.as_deref().unwrap_or("")
                    ),
                ));
            }
        }

        // Status subresource: only .status is taken from the request
        stored.status = pod.status.clone();
        stored.metadata.resource_version = Some(next_version);
        let updated = stored.clone();
        state.status_updates += 1;

        debug!("Mock: pod status updated: {}", key);
        Ok(updated)
    }
}
