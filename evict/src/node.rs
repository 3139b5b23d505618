//! Node-level checks built on top of the eviction limits.
//!
//! Before a node is voluntarily disrupted, every pod on it must be disruptable and the
//! budgets must allow evicting all of them.

use k8s_openapi::api::core::v1::Pod;
use tracing::debug;

use crate::error::PodBlockEvictionError;
use crate::pdb::Limits;
use crate::pod;
use crate::types::ObjectKey;

/// Checks whether the pods of a node can all be disrupted.
///
/// The do-not-disrupt annotation is checked on every pod first, so mirror pods and daemon
/// pods can still block disruption through it. Budgets are consulted afterwards.
pub fn validate_pods_disruptable(
    pods: &[Pod],
    limits: &Limits,
) -> Result<(), PodBlockEvictionError> {
    if let Some(blocking) = pods.iter().find(|pod| !pod::is_disruptable(pod)) {
        let pod = ObjectKey::from_object(blocking);
        debug!(%pod, "pod blocks disruption through its annotation");

        return Err(PodBlockEvictionError::DoNotDisrupt { pod });
    }

    let (pdbs, evictable) = limits.can_evict_pods(pods);
    if !evictable {
        return Err(PodBlockEvictionError::PdbViolation { pdbs });
    }

    Ok(())
}

/// Returns the pods that need a new home when their node goes away.
pub fn reschedulable_pods(pods: &[Pod]) -> Vec<&Pod> {
    pods.iter().filter(|pod| pod::is_reschedulable(pod)).collect()
}

/// Returns the reschedulable pods that cannot currently be moved at all, either because a
/// budget never tolerates disruption or because the pod opted out.
pub fn currently_stuck_pods<'a>(pods: &'a [Pod], limits: &Limits) -> Vec<&'a Pod> {
    reschedulable_pods(pods)
        .into_iter()
        .filter(|pod| !limits.is_currently_reschedulable(pod))
        .collect()
}
