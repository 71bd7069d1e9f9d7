use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;

/// Trait for Pod read/write implementations
///
/// This trait abstracts over the Kubernetes API server. It enables testing
/// the reconciler via `MockPodClient` without a cluster.
#[async_trait]
pub trait PodClient: Send + Sync {
    /// Fetch a single Pod. Fails with `PodNotFound` if it no longer exists.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;

    /// List Pods in one namespace, or in all namespaces when `None`
    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>>;

    /// Write the status subresource of a Pod.
    ///
    /// The Pod's `metadata.resourceVersion` guards the write; a stale version
    /// fails with `Conflict`.
    async fn update_pod_status(&self, namespace: &str, name: &str, pod: &Pod) -> Result<Pod>;
}
