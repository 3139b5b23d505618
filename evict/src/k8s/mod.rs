//! Kubernetes access for the evaluator.
//!
//! The evaluator only needs two list calls, modeled by the [`K8sClient`] trait so
//! tests and callers can supply their own snapshot. [`KubeClient`] is the default
//! implementation, backed by the [`kube`] crate and the ambient cluster
//! configuration (in-cluster service account or local `~/.kube/config`).

mod base;
mod client;

pub use base::*;
pub use client::*;
