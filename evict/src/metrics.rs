use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};

static REGISTER_METRICS: Once = Once::new();

pub const EVICT_EVALUATIONS_TOTAL: &str = "evict_evaluations_total";
pub const EVICT_STUCK_PODS: &str = "evict_stuck_pods";
pub const EVICT_EVALUATION_DURATION_SECONDS: &str = "evict_evaluation_duration_seconds";
pub const EVICT_LIST_ERRORS_TOTAL: &str = "evict_list_errors_total";
pub const NODE: &str = "node";
pub const OUTCOME: &str = "outcome";
pub const OUTCOME_DISRUPTABLE: &str = "disruptable";
pub const OUTCOME_DO_NOT_DISRUPT: &str = "do_not_disrupt";
pub const OUTCOME_PDB_VIOLATION: &str = "pdb_violation";
pub const OUTCOME_ERROR: &str = "error";

/// Registers the metrics emitted by callers of the evaluator. The evaluator itself records
/// nothing. Safe to call multiple times; the descriptions are registered once.
pub fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            EVICT_EVALUATIONS_TOTAL,
            Unit::Count,
            "Total number of node evaluations, labeled by node and outcome"
        );

        describe_gauge!(
            EVICT_STUCK_PODS,
            Unit::Count,
            "Pods on a node that cannot currently be rescheduled because of budgets or annotations, NaN when the last evaluation failed"
        );

        describe_histogram!(
            EVICT_EVALUATION_DURATION_SECONDS,
            Unit::Seconds,
            "Time taken in seconds to list and evaluate the pods of a node"
        );

        describe_counter!(
            EVICT_LIST_ERRORS_TOTAL,
            Unit::Count,
            "Total number of failed list calls against the Kubernetes API"
        );
    });
}
