use evict::error::{LimitsError, PodBlockEvictionError};
use evict::k8s::{K8sClient, K8sError, KubeClient};
use evict::metrics::{
    EVICT_EVALUATION_DURATION_SECONDS, EVICT_EVALUATIONS_TOTAL, EVICT_LIST_ERRORS_TOTAL,
    EVICT_STUCK_PODS, NODE, OUTCOME, OUTCOME_DISRUPTABLE, OUTCOME_DO_NOT_DISRUPT, OUTCOME_ERROR,
    OUTCOME_PDB_VIOLATION, register_metrics,
};
use evict::node::{currently_stuck_pods, reschedulable_pods, validate_pods_disruptable};
use evict::pdb::Limits;
use evict::types::ObjectKey;
use evict_config::shared::{CheckerConfig, RetryConfig};
use evict_telemetry::metrics::init_metrics;
use metrics::{counter, gauge, histogram};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};

/// Errors that prevent a node from being evaluated at all.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("failed to list the pods of node {node}: {source}")]
    ListPods {
        node: String,
        #[source]
        source: K8sError,
    },

    #[error("failed to build eviction limits: {0}")]
    Limits(#[from] LimitsError),
}

/// Result of evaluating the pods of one node against the cluster's budgets.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReport {
    pub node: String,
    /// Pods that would need a new home if the node went away.
    pub reschedulable_pods: usize,
    /// Reschedulable pods that cannot currently be moved at all.
    pub stuck_pods: Vec<ObjectKey>,
    /// Whether the node could be disrupted right now.
    pub disruption: Result<(), PodBlockEvictionError>,
}

impl NodeReport {
    fn outcome(&self) -> &'static str {
        match &self.disruption {
            Ok(()) => OUTCOME_DISRUPTABLE,
            Err(PodBlockEvictionError::DoNotDisrupt { .. }) => OUTCOME_DO_NOT_DISRUPT,
            Err(PodBlockEvictionError::PdbViolation { .. }) => OUTCOME_PDB_VIOLATION,
        }
    }
}

/// Starts the eviction checker with the provided configuration.
///
/// Connects to the cluster with the ambient credentials, exposes metrics and evaluates the
/// configured nodes every `interval_ms` until SIGTERM or SIGINT is received.
pub async fn start_checker_with_config(checker_config: CheckerConfig) -> anyhow::Result<()> {
    info!("starting eviction checker");

    log_config(&checker_config);

    init_metrics(env!("CARGO_PKG_NAME"))?;
    register_metrics();

    let client = KubeClient::new().await?;

    // SIGTERM is what Kubernetes sends before SIGKILL during pod termination.
    let mut sigterm = signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT (Ctrl+C) received, shutting down eviction checker");
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down eviction checker");
            }
        }
    };

    run_checker(&client, &checker_config, shutdown).await;

    info!("eviction checker stopped");

    Ok(())
}

fn log_config(config: &CheckerConfig) {
    debug!(
        nodes = ?config.nodes,
        interval_ms = config.interval_ms,
        sentry_enabled = config.sentry.is_some(),
        "checker config"
    );
    debug!(
        max_attempts = config.retry.max_attempts,
        initial_delay_ms = config.retry.initial_delay_ms,
        max_delay_ms = config.retry.max_delay_ms,
        backoff_factor = config.retry.backoff_factor,
        "retry config"
    );
}

/// Evaluates the configured nodes in rounds until `shutdown` completes.
///
/// A round in progress is always finished before shutting down.
pub async fn run_checker<C, S>(client: &C, config: &CheckerConfig, shutdown: S)
where
    C: K8sClient + ?Sized,
    S: Future<Output = ()>,
{
    let interval = Duration::from_millis(config.interval_ms);
    tokio::pin!(shutdown);

    loop {
        check_nodes(client, config).await;

        tokio::select! {
            biased;

            _ = &mut shutdown => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Runs one round over every configured node, recording metrics and logging the outcome.
///
/// A node that cannot be evaluated does not stop the round.
pub async fn check_nodes<C>(
    client: &C,
    config: &CheckerConfig,
) -> Vec<Result<NodeReport, EvaluationError>>
where
    C: K8sClient + ?Sized,
{
    let mut results = Vec::with_capacity(config.nodes.len());

    for node in &config.nodes {
        let started = Instant::now();
        let result = evaluate_node(client, node, &config.retry).await;
        histogram!(EVICT_EVALUATION_DURATION_SECONDS, NODE => node.clone())
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(report) => {
                record_report(report);
                log_report(report);
            }
            Err(err) => {
                counter!(EVICT_EVALUATIONS_TOTAL, NODE => node.clone(), OUTCOME => OUTCOME_ERROR)
                    .increment(1);
                gauge!(EVICT_STUCK_PODS, NODE => node.clone()).set(stuck_pods_value(&result));
                sentry::capture_error(err);
                error!(%node, error = %err, "failed to evaluate node");
            }
        }

        results.push(result);
    }

    results
}

/// Lists the pods of `node` and a fresh budget snapshot, then decides whether the node could
/// be disrupted right now.
///
/// List calls are retried according to `retry`. Budgets that cannot be interpreted fail the
/// evaluation immediately.
pub async fn evaluate_node<C>(
    client: &C,
    node: &str,
    retry: &RetryConfig,
) -> Result<NodeReport, EvaluationError>
where
    C: K8sClient + ?Sized,
{
    let pods = with_retry(
        retry,
        "list pods",
        |_: &K8sError| true,
        move || client.list_pods_on_node(node),
    )
    .await
    .map_err(|source| EvaluationError::ListPods {
        node: node.to_string(),
        source,
    })?;

    // Budgets are listed per node so every decision sees a fresh snapshot.
    let limits = with_retry(
        retry,
        "list pod disruption budgets",
        |err: &LimitsError| matches!(err, LimitsError::ListPdbs(_)),
        move || Limits::new(client),
    )
    .await?;

    let disruption = validate_pods_disruptable(&pods, &limits);
    let stuck_pods = currently_stuck_pods(&pods, &limits)
        .into_iter()
        .map(ObjectKey::from_object)
        .collect();

    Ok(NodeReport {
        node: node.to_string(),
        reschedulable_pods: reschedulable_pods(&pods).len(),
        stuck_pods,
        disruption,
    })
}

/// Calls `operation` until it succeeds, fails with an error `is_retryable` rejects, or
/// `retry.max_attempts` attempts have been made.
async fn with_retry<T, E, R, F, Fut>(
    retry: &RetryConfig,
    name: &'static str,
    is_retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    E: fmt::Display,
    R: Fn(&E) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }

        counter!(EVICT_LIST_ERRORS_TOTAL).increment(1);
        attempt += 1;
        if attempt >= retry.max_attempts {
            warn!(operation = name, attempt, error = %err, "giving up after repeated failures");

            return Err(err);
        }

        let delay = retry.delay_for_attempt(attempt - 1);
        warn!(
            operation = name,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

fn record_report(report: &NodeReport) {
    counter!(EVICT_EVALUATIONS_TOTAL, NODE => report.node.clone(), OUTCOME => report.outcome())
        .increment(1);
    gauge!(EVICT_STUCK_PODS, NODE => report.node.clone()).set(report.stuck_pods.len() as f64);
}

/// Value of the stuck pods gauge after an evaluation. A failed evaluation reports `NaN` so the
/// previous round's count is not mistaken for the current one.
fn stuck_pods_value(result: &Result<NodeReport, EvaluationError>) -> f64 {
    match result {
        Ok(report) => report.stuck_pods.len() as f64,
        Err(_) => f64::NAN,
    }
}

fn log_report(report: &NodeReport) {
    match &report.disruption {
        Ok(()) => info!(
            node = %report.node,
            reschedulable_pods = report.reschedulable_pods,
            stuck_pods = report.stuck_pods.len(),
            "node can be disrupted"
        ),
        Err(reason) => info!(
            node = %report.node,
            reschedulable_pods = report.reschedulable_pods,
            stuck_pods = report.stuck_pods.len(),
            %reason,
            "node cannot be disrupted"
        ),
    }

    if !report.stuck_pods.is_empty() {
        let stuck_pods: Vec<String> = report.stuck_pods.iter().map(ToString::to_string).collect();
        debug!(node = %report.node, ?stuck_pods, "pods that cannot currently be rescheduled");
    }
}
