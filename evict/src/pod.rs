//! Generic pod-state predicates.
//!
//! These decide which pods the eviction limits apply to at all, independently of any
//! PodDisruptionBudget: terminal and terminating pods are ignored, mirror pods cannot
//! be evicted through the API server, and pods tolerating the disrupted taint would
//! land back on the node being drained.

use k8s_openapi::api::core::v1::{Pod, Toleration};

/// Annotation through which a pod opts out of voluntary disruption.
pub const DO_NOT_DISRUPT_ANNOTATION_KEY: &str = "karpenter.sh/do-not-disrupt";

/// Taint placed on nodes that are being disrupted.
pub const DISRUPTED_TAINT_KEY: &str = "karpenter.sh/disrupted";
pub const DISRUPTED_TAINT_EFFECT: &str = "NoSchedule";

const PHASE_SUCCEEDED: &str = "Succeeded";
const PHASE_FAILED: &str = "Failed";

const CONDITION_READY: &str = "Ready";
const CONDITION_FALSE: &str = "False";

const TOLERATION_OPERATOR_EXISTS: &str = "Exists";
const TOLERATION_OPERATOR_EQUAL: &str = "Equal";

/// Returns `true` when the pod ran to completion or failed.
pub fn is_terminal(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .is_some_and(|phase| phase == PHASE_SUCCEEDED || phase == PHASE_FAILED)
}

/// Returns `true` when deletion of the pod has been requested.
pub fn is_terminating(pod: &Pod) -> bool {
    pod.metadata.deletion_timestamp.is_some()
}

/// Returns `true` for pods that are neither terminal nor terminating.
pub fn is_active(pod: &Pod) -> bool {
    !is_terminal(pod) && !is_terminating(pod)
}

/// Returns `true` for mirror pods, which the kubelet owns through a `Node` owner reference.
pub fn is_owned_by_node(pod: &Pod) -> bool {
    is_owned_by(pod, "v1", "Node")
}

pub fn is_owned_by_stateful_set(pod: &Pod) -> bool {
    is_owned_by(pod, "apps/v1", "StatefulSet")
}

fn is_owned_by(pod: &Pod, api_version: &str, kind: &str) -> bool {
    pod.metadata
        .owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|owner| owner.api_version == api_version && owner.kind == kind)
}

/// Returns `true` if any toleration of the pod matches the disrupted `NoSchedule` taint.
pub fn tolerates_disrupted_no_schedule_taint(pod: &Pod) -> bool {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.tolerations.as_deref())
        .unwrap_or_default()
        .iter()
        .any(|toleration| {
            tolerates_taint(toleration, DISRUPTED_TAINT_KEY, None, DISRUPTED_TAINT_EFFECT)
        })
}

/// Kubernetes toleration matching: an empty effect tolerates every effect, an empty key
/// with `Exists` tolerates every taint, and `Equal` (the default operator) compares values.
fn tolerates_taint(
    toleration: &Toleration,
    taint_key: &str,
    taint_value: Option<&str>,
    taint_effect: &str,
) -> bool {
    let effect = toleration.effect.as_deref().unwrap_or_default();
    if !effect.is_empty() && effect != taint_effect {
        return false;
    }

    let key = toleration.key.as_deref().unwrap_or_default();
    if !key.is_empty() && key != taint_key {
        return false;
    }

    match toleration.operator.as_deref() {
        Some(TOLERATION_OPERATOR_EXISTS) => true,
        None | Some("") | Some(TOLERATION_OPERATOR_EQUAL) => {
            // An empty key is only valid together with `Exists`.
            !key.is_empty()
                && toleration.value.as_deref().unwrap_or_default()
                    == taint_value.unwrap_or_default()
        }
        Some(_) => false,
    }
}

/// Returns `true` if the eviction API would be called for this pod when its node is drained.
pub fn is_evictable(pod: &Pod) -> bool {
    is_active(pod) && !tolerates_disrupted_no_schedule_taint(pod) && !is_owned_by_node(pod)
}

/// Returns `true` if the pod needs a new home when its node goes away.
///
/// StatefulSet pods must be deleted before their replacement is created, so a terminating
/// StatefulSet pod still counts as needing capacity.
pub fn is_reschedulable(pod: &Pod) -> bool {
    (is_active(pod) || (is_owned_by_stateful_set(pod) && is_terminating(pod)))
        && !tolerates_disrupted_no_schedule_taint(pod)
        && !is_owned_by_node(pod)
}

pub fn has_do_not_disrupt(pod: &Pod) -> bool {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(DO_NOT_DISRUPT_ANNOTATION_KEY))
        .is_some_and(|value| value == "true")
}

/// Returns `false` only for active pods carrying the do-not-disrupt annotation.
///
/// Terminal and terminating pods cannot block disruption through the annotation.
pub fn is_disruptable(pod: &Pod) -> bool {
    !(is_active(pod) && has_do_not_disrupt(pod))
}

/// Returns `true` when the pod reports an explicit `Ready=False` condition.
///
/// A pod without a `Ready` condition is not considered unready.
pub fn is_unready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_deref())
        .unwrap_or_default()
        .iter()
        .any(|condition| condition.type_ == CONDITION_READY && condition.status == CONDITION_FALSE)
}
