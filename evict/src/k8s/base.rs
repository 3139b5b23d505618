use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use thiserror::Error;

/// Errors emitted by the Kubernetes integration.
#[derive(Debug, Error)]
pub enum K8sError {
    /// An error returned by the [`kube`] client when talking to the API server.
    #[error("An error occurred with kube when dealing with K8s: {0}")]
    Kube(#[from] kube::Error),
}

/// Read-only view of the cluster used to build evaluation snapshots.
///
/// Every call reflects the API server at the time it is made; implementations must
/// not cache across calls.
#[async_trait]
pub trait K8sClient: Send + Sync {
    /// Lists the PodDisruptionBudgets of every namespace.
    async fn list_pod_disruption_budgets(&self) -> Result<Vec<PodDisruptionBudget>, K8sError>;

    /// Lists the pods bound to `node_name`, across namespaces.
    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>, K8sError>;
}
