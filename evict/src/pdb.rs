//! PodDisruptionBudget eviction limits.
//!
//! A [`Limits`] value is a snapshot of every budget in the cluster, reduced to what the
//! eviction decision needs. It is built fresh for each evaluation and never refreshed:
//! callers that want newer data build a new one.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::core::{Selector, SelectorExt};
use tracing::debug;

use crate::error::LimitsError;
use crate::k8s::K8sClient;
use crate::pod;
use crate::types::ObjectKey;

/// Value of `unhealthyPodEvictionPolicy` that lets unready pods be evicted regardless of
/// the budget.
pub const ALWAYS_ALLOW_POLICY: &str = "AlwaysAllow";

const MAX_UNAVAILABLE_FIELD: &str = "maxUnavailable";
const MIN_AVAILABLE_FIELD: &str = "minAvailable";

/// Read-only summary of a single PodDisruptionBudget.
#[derive(Debug, Clone)]
pub struct PdbSummary {
    key: ObjectKey,
    /// `None` when the budget has no selector, which selects nothing.
    selector: Option<Selector>,
    disruptions_allowed: i32,
    is_fully_blocking: bool,
    can_always_evict_unhealthy_pods: bool,
}

impl PdbSummary {
    /// Summarizes a budget, failing if its selector or thresholds cannot be interpreted.
    pub fn new(pdb: &PodDisruptionBudget) -> Result<PdbSummary, LimitsError> {
        let key = ObjectKey::from_object(pdb);
        let spec = pdb.spec.clone().unwrap_or_default();

        let selector = match spec.selector {
            Some(selector) => Some(Selector::try_from(selector).map_err(|source| {
                LimitsError::InvalidSelector {
                    pdb: key.clone(),
                    source,
                }
            })?),
            None => None,
        };

        let max_unavailable_is_zero = match &spec.max_unavailable {
            Some(value) => matches!(
                threshold(&key, MAX_UNAVAILABLE_FIELD, value)?,
                Threshold::Count(0) | Threshold::Percent(0)
            ),
            None => false,
        };
        let min_available_is_everything = match &spec.min_available {
            Some(value) => threshold(&key, MIN_AVAILABLE_FIELD, value)? == Threshold::Percent(100),
            None => false,
        };

        let can_always_evict_unhealthy_pods =
            spec.unhealthy_pod_eviction_policy.as_deref() == Some(ALWAYS_ALLOW_POLICY);

        let disruptions_allowed = pdb
            .status
            .as_ref()
            .map(|status| status.disruptions_allowed)
            .unwrap_or_default();

        Ok(PdbSummary {
            key,
            selector,
            disruptions_allowed,
            is_fully_blocking: max_unavailable_is_zero || min_available_is_everything,
            can_always_evict_unhealthy_pods,
        })
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn disruptions_allowed(&self) -> i32 {
        self.disruptions_allowed
    }

    /// Returns `true` if the budget tolerates no disruption at all, whatever its current
    /// `disruptionsAllowed` counter says.
    pub fn is_fully_blocking(&self) -> bool {
        self.is_fully_blocking
    }

    pub fn can_always_evict_unhealthy_pods(&self) -> bool {
        self.can_always_evict_unhealthy_pods
    }

    /// Returns `true` if the budget applies to the pod: same namespace and matching labels.
    pub fn matches(&self, pod: &Pod) -> bool {
        if pod.metadata.namespace.as_deref().unwrap_or_default() != self.key.namespace {
            return false;
        }

        let Some(selector) = &self.selector else {
            return false;
        };

        match &pod.metadata.labels {
            Some(labels) => selector.matches(labels),
            None => selector.matches(&BTreeMap::new()),
        }
    }
}

/// A parsed `maxUnavailable`/`minAvailable` value.
#[derive(Debug, PartialEq, Eq)]
enum Threshold {
    Count(i64),
    Percent(i64),
}

fn threshold(
    pdb: &ObjectKey,
    field: &'static str,
    value: &IntOrString,
) -> Result<Threshold, LimitsError> {
    let invalid = |raw: &str| LimitsError::InvalidThreshold {
        pdb: pdb.clone(),
        field,
        value: raw.to_string(),
    };

    match value {
        IntOrString::Int(count) => Ok(Threshold::Count(i64::from(*count))),
        IntOrString::String(raw) => match raw.strip_suffix('%') {
            Some(percent) => percent
                .parse::<i64>()
                .map(Threshold::Percent)
                .map_err(|_| invalid(raw)),
            None => raw
                .parse::<i64>()
                .map(Threshold::Count)
                .map_err(|_| invalid(raw)),
        },
    }
}

/// Snapshot of every PodDisruptionBudget in the cluster.
///
/// Immutable after construction, so it can be shared across threads and queried any number
/// of times with identical answers.
#[derive(Debug, Clone, Default)]
pub struct Limits {
    pdbs: Arc<[PdbSummary]>,
}

impl Limits {
    /// Lists every budget through `client` and summarizes it.
    ///
    /// List failures are returned as-is; retrying is up to the caller.
    pub async fn new<C>(client: &C) -> Result<Limits, LimitsError>
    where
        C: K8sClient + ?Sized,
    {
        let pdbs = client
            .list_pod_disruption_budgets()
            .await
            .map_err(LimitsError::ListPdbs)?;

        Limits::from_pdbs(&pdbs)
    }

    /// Summarizes already listed budgets.
    ///
    /// A single budget that cannot be interpreted fails the whole snapshot.
    pub fn from_pdbs(pdbs: &[PodDisruptionBudget]) -> Result<Limits, LimitsError> {
        let pdbs = pdbs
            .iter()
            .map(PdbSummary::new)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = pdbs.len(), "built pod disruption budget limits");

        Ok(Limits { pdbs: pdbs.into() })
    }

    pub fn len(&self) -> usize {
        self.pdbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pdbs.is_empty()
    }

    /// Returns the budgets that apply to `pod`.
    pub fn pdbs_for<'a>(&'a self, pod: &'a Pod) -> impl Iterator<Item = &'a PdbSummary> + 'a {
        self.pdbs.iter().filter(move |pdb| pdb.matches(pod))
    }

    /// Returns whether every pod can be evicted right now.
    ///
    /// Stops at the first pod that cannot be evicted and returns the keys of the budgets
    /// responsible for it: every matching budget when more than one applies, otherwise the
    /// single blocking one. Pods the eviction API would not be called for are skipped.
    ///
    /// A fully blocking budget denies eviction even if its status still reports allowed
    /// disruptions, which happens when the disruption controller has not caught up yet.
    pub fn can_evict_pods<'p, I>(&self, pods: I) -> (Vec<ObjectKey>, bool)
    where
        I: IntoIterator<Item = &'p Pod>,
    {
        for pod in pods {
            let (pdbs, evictable) = self.is_evictable(pod, |pdb: &PdbSummary| {
                pdb.disruptions_allowed == 0 || pdb.is_fully_blocking
            });
            if !evictable {
                return (pdbs, false);
            }
        }

        (Vec::new(), true)
    }

    /// Returns `true` if a budget prevents evicting `pod` no matter how many disruptions it
    /// currently allows.
    pub fn is_currently_blocked(&self, pod: &Pod) -> bool {
        let (_, evictable) = self.is_evictable(pod, PdbSummary::is_fully_blocking);
        !evictable
    }

    /// Returns `true` if the pod could be moved off its node at some point without waiting
    /// for a budget to change.
    ///
    /// Allowed disruptions are not consulted; they only decide when the pod can leave.
    pub fn is_currently_reschedulable(&self, pod: &Pod) -> bool {
        !self.is_currently_blocked(pod)
            && !pod::has_do_not_disrupt(pod)
            && pod::is_reschedulable(pod)
    }

    fn is_evictable<F>(&self, pod: &Pod, is_blocking: F) -> (Vec<ObjectKey>, bool)
    where
        F: Fn(&PdbSummary) -> bool,
    {
        // We never call the eviction API for these pods, so budgets do not apply.
        if !pod::is_evictable(pod) {
            return (Vec::new(), true);
        }

        let matching: Vec<&PdbSummary> = self.pdbs_for(pod).collect();

        // The eviction API rejects pods covered by more than one budget.
        if matching.len() > 1 {
            return (matching.iter().map(|pdb| pdb.key.clone()).collect(), false);
        }

        for pdb in matching {
            if pdb.can_always_evict_unhealthy_pods && pod::is_unready(pod) {
                continue;
            }

            if is_blocking(pdb) {
                return (vec![pdb.key.clone()], false);
            }
        }

        (Vec::new(), true)
    }
}
