use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;

use crate::k8s::{K8sClient, K8sError};

#[derive(Debug, Default)]
struct Inner {
    pdbs: Vec<PodDisruptionBudget>,
    pods: Vec<Pod>,
    /// Number of upcoming list calls that fail.
    failures: usize,
    list_calls: usize,
}

/// In-memory [`K8sClient`] holding a fixed set of objects.
///
/// Failures can be injected to exercise callers' retry handling.
#[derive(Debug, Default)]
pub struct MockK8sClient {
    inner: Mutex<Inner>,
}

impl MockK8sClient {
    pub fn new(pdbs: Vec<PodDisruptionBudget>, pods: Vec<Pod>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pdbs,
                pods,
                ..Inner::default()
            }),
        }
    }

    pub fn add_pdb(&self, pdb: PodDisruptionBudget) {
        self.inner.lock().unwrap().pdbs.push(pdb);
    }

    pub fn add_pod(&self, pod: Pod) {
        self.inner.lock().unwrap().pods.push(pod);
    }

    /// Makes the next `count` list calls fail with an API error.
    pub fn fail_next(&self, count: usize) {
        self.inner.lock().unwrap().failures = count;
    }

    /// Total number of list calls made so far, failed ones included.
    pub fn list_calls(&self) -> usize {
        self.inner.lock().unwrap().list_calls
    }

    fn record_call(inner: &mut Inner) -> Result<(), K8sError> {
        inner.list_calls += 1;
        if inner.failures > 0 {
            inner.failures -= 1;
            return Err(api_error());
        }

        Ok(())
    }
}

/// Builds the error the API server returns when it is unavailable.
pub fn api_error() -> K8sError {
    K8sError::Kube(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: "the server is currently unable to handle the request".to_string(),
        reason: "ServiceUnavailable".to_string(),
        code: 503,
    }))
}

#[async_trait]
impl K8sClient for MockK8sClient {
    async fn list_pod_disruption_budgets(&self) -> Result<Vec<PodDisruptionBudget>, K8sError> {
        let mut inner = self.inner.lock().unwrap();
        Self::record_call(&mut inner)?;

        Ok(inner.pdbs.clone())
    }

    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>, K8sError> {
        let mut inner = self.inner.lock().unwrap();
        Self::record_call(&mut inner)?;

        Ok(inner
            .pods
            .iter()
            .filter(|pod| {
                pod.spec
                    .as_ref()
                    .and_then(|spec| spec.node_name.as_deref())
                    == Some(node_name)
            })
            .cloned()
            .collect())
    }
}
