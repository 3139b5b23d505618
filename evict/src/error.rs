use thiserror::Error;

use crate::k8s::K8sError;
use crate::types::ObjectKey;

/// Errors raised while building a [`crate::pdb::Limits`] snapshot.
///
/// Any of these aborts the whole evaluation: skipping a budget that cannot be
/// understood could hide a real block.
#[derive(Debug, Error)]
pub enum LimitsError {
    /// Listing budgets from the API server failed. Not retried here.
    #[error("failed to list pod disruption budgets: {0}")]
    ListPdbs(#[source] K8sError),

    /// A budget carries a label selector that cannot be parsed.
    #[error("pod disruption budget {pdb} has an invalid selector: {source}")]
    InvalidSelector {
        pdb: ObjectKey,
        #[source]
        source: kube::core::ParseExpressionError,
    },

    /// A budget threshold is neither an integer nor an integer percentage.
    #[error("pod disruption budget {pdb} has an invalid `{field}` value `{value}`")]
    InvalidThreshold {
        pdb: ObjectKey,
        field: &'static str,
        value: String,
    },
}

/// Reasons why the pods of a node cannot be disrupted right now.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PodBlockEvictionError {
    /// An active pod opted out of disruption through its annotation.
    #[error("pod {pod} has \"karpenter.sh/do-not-disrupt\" annotation")]
    DoNotDisrupt { pod: ObjectKey },

    /// Evicting the pods would violate one or more budgets.
    #[error("pdb {} prevents pod evictions", format_keys(.pdbs))]
    PdbViolation { pdbs: Vec<ObjectKey> },
}

fn format_keys(keys: &[ObjectKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_lists_every_budget() {
        let err = PodBlockEvictionError::PdbViolation {
            pdbs: vec![ObjectKey::new("ns", "pdb-1"), ObjectKey::new("ns", "pdb-2")],
        };

        assert_eq!(err.to_string(), "pdb ns/pdb-1, ns/pdb-2 prevents pod evictions");
    }
}
