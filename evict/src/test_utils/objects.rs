use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use k8s_openapi::api::core::v1::{Pod, PodCondition, PodSpec, PodStatus, Toleration};
use k8s_openapi::api::policy::v1::{
    PodDisruptionBudget, PodDisruptionBudgetSpec, PodDisruptionBudgetStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference, Time};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;

/// Namespace used when a test does not pick one.
pub const DEFAULT_NAMESPACE: &str = "default";

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

fn string_map(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
    if pairs.is_empty() {
        return None;
    }

    Some(
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    )
}

/// Options for [`pod`].
#[derive(Debug, Clone, Default)]
pub struct PodOptions {
    pub name: Option<&'static str>,
    pub namespace: Option<&'static str>,
    pub node_name: Option<&'static str>,
    pub labels: Vec<(&'static str, &'static str)>,
    pub annotations: Vec<(&'static str, &'static str)>,
    /// `(apiVersion, kind)` of a single owner reference.
    pub owner: Option<(&'static str, &'static str)>,
    pub tolerations: Vec<Toleration>,
    pub conditions: Vec<PodCondition>,
    pub phase: Option<&'static str>,
    /// Sets a deletion timestamp.
    pub terminating: bool,
}

/// Builds a pod. Unnamed pods get a unique name; the phase defaults to `Running`.
pub fn pod(options: PodOptions) -> Pod {
    let name = options
        .name
        .map(str::to_string)
        .unwrap_or_else(|| unique_name("pod"));

    let owner_references = options.owner.map(|(api_version, kind)| {
        vec![OwnerReference {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: unique_name("owner"),
            uid: unique_name("uid"),
            ..OwnerReference::default()
        }]
    });

    let deletion_timestamp = options.terminating.then(|| {
        serde_json::from_value::<Time>(serde_json::Value::String(
            "2024-01-01T00:00:00Z".to_string(),
        ))
        .expect("failed to build deletion timestamp")
    });

    Pod {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(options.namespace.unwrap_or(DEFAULT_NAMESPACE).to_string()),
            labels: string_map(&options.labels),
            annotations: string_map(&options.annotations),
            owner_references,
            deletion_timestamp,
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            node_name: options.node_name.map(str::to_string),
            tolerations: (!options.tolerations.is_empty()).then_some(options.tolerations),
            ..PodSpec::default()
        }),
        status: Some(PodStatus {
            phase: Some(options.phase.unwrap_or("Running").to_string()),
            conditions: (!options.conditions.is_empty()).then_some(options.conditions),
            ..PodStatus::default()
        }),
    }
}

/// A `Ready` condition with the given status (`"True"`, `"False"` or `"Unknown"`).
pub fn ready_condition(status: &str) -> PodCondition {
    PodCondition {
        type_: "Ready".to_string(),
        status: status.to_string(),
        ..PodCondition::default()
    }
}

/// Options for [`pdb`].
#[derive(Debug, Clone, Default)]
pub struct PdbOptions {
    pub name: Option<&'static str>,
    pub namespace: Option<&'static str>,
    /// Labels the budget selects through `matchLabels`.
    pub labels: Vec<(&'static str, &'static str)>,
    pub max_unavailable: Option<IntOrString>,
    pub min_available: Option<IntOrString>,
    pub unhealthy_pod_eviction_policy: Option<&'static str>,
    /// Value reported in `status.disruptionsAllowed`.
    pub disruptions_allowed: i32,
}

/// Builds a budget. Unnamed budgets get a unique name; the selector is always present so an
/// empty label list selects every pod of the namespace.
pub fn pdb(options: PdbOptions) -> PodDisruptionBudget {
    let name = options
        .name
        .map(str::to_string)
        .unwrap_or_else(|| unique_name("pdb"));

    PodDisruptionBudget {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(options.namespace.unwrap_or(DEFAULT_NAMESPACE).to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(PodDisruptionBudgetSpec {
            selector: Some(LabelSelector {
                match_labels: string_map(&options.labels),
                match_expressions: None,
            }),
            max_unavailable: options.max_unavailable,
            min_available: options.min_available,
            unhealthy_pod_eviction_policy: options
                .unhealthy_pod_eviction_policy
                .map(str::to_string),
        }),
        status: Some(PodDisruptionBudgetStatus {
            disruptions_allowed: options.disruptions_allowed,
            ..PodDisruptionBudgetStatus::default()
        }),
    }
}
