use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::Client;
use kube::api::{Api, ListParams};
use tracing::debug;

use crate::k8s::{K8sClient, K8sError};

/// [`K8sClient`] backed by a [`kube::Client`].
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    /// Connects using the ambient configuration (in-cluster or kubeconfig).
    pub async fn new() -> Result<KubeClient, K8sError> {
        let client = Client::try_default().await?;

        Ok(KubeClient { client })
    }

    pub fn from_client(client: Client) -> KubeClient {
        KubeClient { client }
    }
}

#[async_trait]
impl K8sClient for KubeClient {
    async fn list_pod_disruption_budgets(&self) -> Result<Vec<PodDisruptionBudget>, K8sError> {
        let api: Api<PodDisruptionBudget> = Api::all(self.client.clone());
        let pdbs = api.list(&ListParams::default()).await?.items;
        debug!(count = pdbs.len(), "listed pod disruption budgets");

        Ok(pdbs)
    }

    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>, K8sError> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let params = ListParams::default().fields(&format!("spec.nodeName={node_name}"));
        let pods = api.list(&params).await?.items;
        debug!(node_name, count = pods.len(), "listed pods on node");

        Ok(pods)
    }
}
