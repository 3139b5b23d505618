#![cfg(feature = "test-utils")]

use evict::error::LimitsError;
use evict::pdb::{ALWAYS_ALLOW_POLICY, Limits};
use evict::pod::DO_NOT_DISRUPT_ANNOTATION_KEY;
use evict::test_utils::{
    MockK8sClient, PdbOptions, PodOptions, pdb, pod, ready_condition,
};
use evict::types::ObjectKey;
use evict_telemetry::tracing::init_test_tracing;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

const POD_LABELS: &[(&str, &str)] = &[("pdb-test", "value")];

fn pod_labels() -> Vec<(&'static str, &'static str)> {
    POD_LABELS.to_vec()
}

fn min_available_100_percent() -> PodDisruptionBudget {
    pdb(PdbOptions {
        labels: pod_labels(),
        min_available: Some(IntOrString::String("100%".to_string())),
        ..PdbOptions::default()
    })
}

/// The budgets that leave no room for disruption, each paired with a description.
fn blocking_budget_sets() -> Vec<(&'static str, Vec<PodDisruptionBudget>)> {
    vec![
        ("100% min available", vec![min_available_100_percent()]),
        (
            "0% max unavailable",
            vec![pdb(PdbOptions {
                labels: pod_labels(),
                max_unavailable: Some(IntOrString::String("0%".to_string())),
                ..PdbOptions::default()
            })],
        ),
        (
            "0 max unavailable",
            vec![pdb(PdbOptions {
                labels: pod_labels(),
                max_unavailable: Some(IntOrString::Int(0)),
                ..PdbOptions::default()
            })],
        ),
        (
            "multiple PDBs on the same pod",
            vec![
                pdb(PdbOptions {
                    name: Some("pdb-1"),
                    labels: pod_labels(),
                    min_available: Some(IntOrString::String("100%".to_string())),
                    ..PdbOptions::default()
                }),
                pdb(PdbOptions {
                    name: Some("pdb-2"),
                    labels: pod_labels(),
                    min_available: Some(IntOrString::String("100%".to_string())),
                    ..PdbOptions::default()
                }),
            ],
        ),
    ]
}

fn keys(pdbs: &[PodDisruptionBudget]) -> Vec<ObjectKey> {
    pdbs.iter().map(ObjectKey::from_object).collect()
}

#[tokio::test]
async fn can_evict_unhealthy_pods_when_policy_always_allows() {
    init_test_tracing();

    let budget = pdb(PdbOptions {
        labels: pod_labels(),
        min_available: Some(IntOrString::String("100%".to_string())),
        unhealthy_pod_eviction_policy: Some(ALWAYS_ALLOW_POLICY),
        ..PdbOptions::default()
    });
    let pod = pod(PodOptions {
        labels: pod_labels(),
        conditions: vec![ready_condition("False")],
        ..PodOptions::default()
    });
    let client = MockK8sClient::new(vec![budget], vec![]);

    let limits = Limits::new(&client).await.unwrap();

    assert_eq!(limits.can_evict_pods([&pod]), (vec![], true));
    assert!(limits.is_currently_reschedulable(&pod));
}

#[tokio::test]
async fn cannot_evict_unhealthy_pods_without_policy() {
    init_test_tracing();

    let budget = min_available_100_percent();
    let pod = pod(PodOptions {
        labels: pod_labels(),
        conditions: vec![ready_condition("False")],
        ..PodOptions::default()
    });
    let client = MockK8sClient::new(vec![budget.clone()], vec![]);

    let limits = Limits::new(&client).await.unwrap();

    assert_eq!(
        limits.can_evict_pods([&pod]),
        (vec![ObjectKey::from_object(&budget)], false)
    );
    assert!(!limits.is_currently_reschedulable(&pod));
}

#[tokio::test]
async fn healthy_pods_are_not_exempt_under_always_allow() {
    init_test_tracing();

    let budget = pdb(PdbOptions {
        labels: pod_labels(),
        min_available: Some(IntOrString::String("100%".to_string())),
        unhealthy_pod_eviction_policy: Some(ALWAYS_ALLOW_POLICY),
        ..PdbOptions::default()
    });
    let ready = pod(PodOptions {
        labels: pod_labels(),
        conditions: vec![ready_condition("True")],
        ..PodOptions::default()
    });
    let client = MockK8sClient::new(vec![budget.clone()], vec![]);

    let limits = Limits::new(&client).await.unwrap();

    assert_eq!(
        limits.can_evict_pods([&ready]),
        (vec![ObjectKey::from_object(&budget)], false)
    );
}

#[tokio::test]
async fn can_evict_pods_when_no_pdbs_match() {
    init_test_tracing();

    let budget = pdb(PdbOptions {
        labels: vec![("other", "value")],
        ..PdbOptions::default()
    });
    let pod = pod(PodOptions {
        labels: pod_labels(),
        ..PodOptions::default()
    });
    let client = MockK8sClient::new(vec![budget], vec![]);

    let limits = Limits::new(&client).await.unwrap();

    assert_eq!(limits.can_evict_pods([&pod]), (vec![], true));
    assert!(!limits.is_currently_blocked(&pod));
    assert!(limits.is_currently_reschedulable(&pod));
}

#[tokio::test]
async fn budgets_in_other_namespaces_never_match() {
    init_test_tracing();

    let budget = pdb(PdbOptions {
        namespace: Some("elsewhere"),
        labels: pod_labels(),
        max_unavailable: Some(IntOrString::Int(0)),
        ..PdbOptions::default()
    });
    let pod = pod(PodOptions {
        labels: pod_labels(),
        ..PodOptions::default()
    });
    let client = MockK8sClient::new(vec![budget], vec![]);

    let limits = Limits::new(&client).await.unwrap();

    assert_eq!(limits.can_evict_pods([&pod]), (vec![], true));
    assert!(limits.is_currently_reschedulable(&pod));
}

#[tokio::test]
async fn cannot_evict_when_disruptions_are_not_allowed_for_every_pod() {
    init_test_tracing();

    for (case, budgets) in blocking_budget_sets() {
        let pods = [
            pod(PodOptions {
                labels: pod_labels(),
                ..PodOptions::default()
            }),
            pod(PodOptions {
                labels: pod_labels(),
                ..PodOptions::default()
            }),
        ];
        let client = MockK8sClient::new(budgets.clone(), vec![]);

        let limits = Limits::new(&client).await.unwrap();
        let (violating, can_evict) = limits.can_evict_pods(&pods);

        assert_eq!(violating.len(), budgets.len(), "{case}");
        for key in keys(&budgets) {
            assert!(violating.contains(&key), "{case}: missing {key}");
        }
        assert!(!can_evict, "{case}");
    }
}

#[tokio::test]
async fn cannot_evict_when_disruptions_are_not_allowed_for_one_pod() {
    init_test_tracing();

    for (case, budgets) in blocking_budget_sets() {
        let pods = [
            pod(PodOptions {
                labels: pod_labels(),
                ..PodOptions::default()
            }),
            pod(PodOptions::default()),
        ];
        let client = MockK8sClient::new(budgets.clone(), vec![]);

        let limits = Limits::new(&client).await.unwrap();
        let (violating, can_evict) = limits.can_evict_pods(&pods);

        assert_eq!(violating.len(), budgets.len(), "{case}");
        for key in keys(&budgets) {
            assert!(violating.contains(&key), "{case}: missing {key}");
        }
        assert!(!can_evict, "{case}");
    }
}

#[tokio::test]
async fn pods_blocked_by_budgets_are_not_currently_reschedulable() {
    init_test_tracing();

    for (case, budgets) in blocking_budget_sets() {
        let pod = pod(PodOptions {
            labels: pod_labels(),
            ..PodOptions::default()
        });
        let client = MockK8sClient::new(budgets, vec![]);

        let limits = Limits::new(&client).await.unwrap();

        assert!(limits.is_currently_blocked(&pod), "{case}");
        assert!(!limits.is_currently_reschedulable(&pod), "{case}");
    }
}

#[tokio::test]
async fn pod_with_do_not_disrupt_annotation_is_not_currently_reschedulable() {
    init_test_tracing();

    let pod = pod(PodOptions {
        labels: pod_labels(),
        annotations: vec![(DO_NOT_DISRUPT_ANNOTATION_KEY, "true")],
        ..PodOptions::default()
    });
    let client = MockK8sClient::default();

    let limits = Limits::new(&client).await.unwrap();

    assert!(limits.is_empty());
    assert!(!limits.is_currently_blocked(&pod));
    assert!(!limits.is_currently_reschedulable(&pod));
}

#[tokio::test]
async fn list_failure_is_returned_without_retrying() {
    init_test_tracing();

    let client = MockK8sClient::new(vec![min_available_100_percent()], vec![]);
    client.fail_next(1);

    let result = Limits::new(&client).await;

    assert!(matches!(result, Err(LimitsError::ListPdbs(_))));
    assert_eq!(client.list_calls(), 1);

    // The next call sees the cluster again.
    let limits = Limits::new(&client).await.unwrap();
    assert_eq!(limits.len(), 1);
}

#[tokio::test]
async fn snapshots_do_not_see_later_changes() {
    init_test_tracing();

    let pod = pod(PodOptions {
        labels: pod_labels(),
        ..PodOptions::default()
    });
    let client = MockK8sClient::default();

    let before = Limits::new(&client).await.unwrap();
    client.add_pdb(min_available_100_percent());
    let after = Limits::new(&client).await.unwrap();

    assert_eq!(before.can_evict_pods([&pod]), (vec![], true));
    assert!(!after.can_evict_pods([&pod]).1);
}

#[tokio::test]
async fn repeated_evaluations_agree() {
    init_test_tracing();

    let blocked = pod(PodOptions {
        labels: pod_labels(),
        ..PodOptions::default()
    });
    let free = pod(PodOptions::default());
    let client = MockK8sClient::new(vec![min_available_100_percent()], vec![]);

    let limits = Limits::new(&client).await.unwrap();
    let shared = limits.clone();
    let from_task = tokio::spawn(async move {
        (
            shared.can_evict_pods([&free]),
            shared.is_currently_reschedulable(&free),
        )
    })
    .await
    .unwrap();

    assert_eq!(limits.can_evict_pods([&blocked]), limits.can_evict_pods([&blocked]));
    assert_eq!(
        limits.is_currently_blocked(&blocked),
        limits.is_currently_blocked(&blocked)
    );
    assert_eq!(from_task, ((vec![], true), true));
}

#[tokio::test]
async fn overlapping_permissive_budgets_block_the_pod() {
    init_test_tracing();

    let permissive = |name: &'static str| {
        pdb(PdbOptions {
            name: Some(name),
            labels: pod_labels(),
            max_unavailable: Some(IntOrString::Int(5)),
            disruptions_allowed: 5,
            ..PdbOptions::default()
        })
    };
    let budgets = vec![permissive("pdb-1"), permissive("pdb-2")];
    let pod = pod(PodOptions {
        labels: pod_labels(),
        ..PodOptions::default()
    });
    let client = MockK8sClient::new(budgets.clone(), vec![]);

    let limits = Limits::new(&client).await.unwrap();
    let (violating, can_evict) = limits.can_evict_pods([&pod]);

    assert!(!can_evict);
    assert_eq!(violating, keys(&budgets));
    assert!(limits.is_currently_blocked(&pod));
    assert!(!limits.is_currently_reschedulable(&pod));

    // Either budget alone allows disruption.
    let single = MockK8sClient::new(vec![permissive("pdb-3")], vec![]);
    let limits = Limits::new(&single).await.unwrap();
    assert_eq!(limits.can_evict_pods([&pod]), (vec![], true));
    assert!(!limits.is_currently_blocked(&pod));
    assert!(limits.is_currently_reschedulable(&pod));
}
