//! PodDisruptionBudget eviction limits.
//!
//! Decides whether pods can be evicted without violating the PodDisruptionBudgets of a
//! cluster and whether a pod is currently worth rescheduling. The evaluator is built
//! from a fresh snapshot of the cluster's budgets ([`pdb::Limits`]) and answers
//! synchronously; listing the snapshot goes through the [`k8s::K8sClient`] seam.

pub mod error;
pub mod k8s;
pub mod metrics;
pub mod node;
pub mod pdb;
pub mod pod;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
