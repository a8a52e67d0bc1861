//! Node deployment lifecycle against the in-memory API

mod common;

use common::*;
use metakube_client::{MockFailure, NodeDeploymentStatus};
use metakube_provider::resources::NodeDeploymentResource;
use metakube_provider::{ManualClock, ProviderError};
use metakube_schema::*;

const CLUSTER_REF: &str = "p1:europe-west3-c:cl1";
const ND_ID: &str = "p1:cl1:nd0001";

#[tokio::test]
async fn test_create_with_composite_cluster_reference() {
    let mock = mock();
    let clock = ManualClock::new();
    seed_cluster(&mock);
    let cfg = node_deployment_config(CLUSTER_REF);

    let observed = NodeDeploymentResource::new(context(&mock, &clock))
        .create(&cfg)
        .await
        .unwrap();

    assert_eq!(observed.id, ND_ID);
    assert_eq!(observed.config.cluster_id, CLUSTER_REF);
    assert_eq!(observed.config.project_id, None);
    assert_eq!(observed.config.spec, cfg.spec);
    assert_eq!(observed.config.name.as_deref(), Some("workers"));
    assert_eq!(mock.calls("list_node_upgrades"), 1);
}

#[tokio::test]
async fn test_create_with_bare_cluster_id_and_default_kubelet() {
    let mock = mock();
    let clock = ManualClock::new();
    seed_cluster(&mock);
    let mut cfg = node_deployment_config("cl1");
    cfg.project_id = Some("p1".to_string());
    cfg.spec.template.versions = None;

    let observed = NodeDeploymentResource::new(context(&mock, &clock))
        .create(&cfg)
        .await
        .unwrap();

    assert_eq!(observed.id, ND_ID);
    assert_eq!(observed.config.spec.template.kubelet(), Some("1.18.8"));
    let stored = mock.deployment("nd0001").unwrap();
    assert_eq!(stored.spec.template.versions.kubelet, "1.18.8");
}

#[tokio::test]
async fn test_create_rejects_provider_mismatch() {
    let mock = mock();
    let clock = ManualClock::new();
    seed_cluster(&mock);
    let mut cfg = node_deployment_config(CLUSTER_REF);
    cfg.spec.template.cloud = Some(NodeCloud::Azure(AzureNodeConfig {
        size: "Standard_F2".to_string(),
        ..Default::default()
    }));

    let err = NodeDeploymentResource::new(context(&mock, &clock))
        .create(&cfg)
        .await
        .unwrap_err();

    match err {
        ProviderError::Validation(diags) => {
            assert_eq!(diags.len(), 1);
            assert_eq!(
                diags.iter().next().unwrap().summary,
                "provider for node deployment must (azure) match cluster provider (openstack)"
            );
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(mock.calls("create_machine_deployment"), 0);
}

#[tokio::test]
async fn test_create_rejects_kubelet_out_of_bounds() {
    let mock = mock();
    let clock = ManualClock::new();
    seed_cluster(&mock);
    let mut cfg = node_deployment_config(CLUSTER_REF);
    cfg.spec.template.versions = Some(NodeVersionsConfig {
        kubelet: Some("3.0.0".to_string()),
    });

    let err = NodeDeploymentResource::new(context(&mock, &clock))
        .create(&cfg)
        .await
        .unwrap_err();

    let diags = err.into_diagnostics();
    let summaries: Vec<&str> = diags.iter().map(|d| d.summary.as_str()).collect();
    assert_eq!(
        summaries,
        vec![
            "node deployment kubelet version 3.0.0 cannot be greater than cluster version 1.18.8",
            "unknown version for node deployment 3.0.0, available versions [1.17.9, 1.18.8]",
        ]
    );
}

#[tokio::test]
async fn test_create_in_unknown_cluster() {
    let mock = mock();
    let clock = ManualClock::new();
    let err = NodeDeploymentResource::new(context(&mock, &clock))
        .create(&node_deployment_config(CLUSTER_REF))
        .await
        .unwrap_err();
    match err {
        ProviderError::Validation(diags) => {
            assert_eq!(diags.iter().next().unwrap().attribute.as_deref(), Some("cluster_id"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_create_retries_while_cluster_is_busy() {
    let mock = mock();
    let clock = ManualClock::new();
    seed_cluster(&mock);
    mock.fail_next("create_machine_deployment", MockFailure::Conflict);
    mock.fail_next("create_machine_deployment", MockFailure::Status(503));

    NodeDeploymentResource::new(context(&mock, &clock))
        .create(&node_deployment_config(CLUSTER_REF))
        .await
        .unwrap();
    assert_eq!(mock.calls("create_machine_deployment"), 3);
}

#[tokio::test]
async fn test_create_failure_after_creation_keeps_id() {
    let mock = mock();
    let clock = ManualClock::new();
    seed_cluster(&mock);
    mock.fail_next("get_machine_deployment", MockFailure::Forbidden);

    let err = NodeDeploymentResource::new(context(&mock, &clock))
        .create(&node_deployment_config(CLUSTER_REF))
        .await
        .unwrap_err();

    assert_eq!(err.created_id(), Some(ND_ID));
    assert_eq!(err.status(), Some(403));
    assert!(mock.deployment("nd0001").is_some());
}

#[tokio::test]
async fn test_update_scales_in_place() {
    let mock = mock();
    let clock = ManualClock::new();
    seed_cluster(&mock);
    let resource = NodeDeploymentResource::new(context(&mock, &clock));
    let prior = resource
        .create(&node_deployment_config(CLUSTER_REF))
        .await
        .unwrap()
        .config;

    let mut planned = prior.clone();
    planned.spec.replicas = 5;
    let updated = resource.update(ND_ID, &prior, &planned).await.unwrap();

    assert_eq!(mock.calls("patch_machine_deployment"), 1);
    assert_eq!(mock.last_patch().unwrap()["spec"]["replicas"], 5);
    assert_eq!(updated.config.spec.replicas, 5);
}

#[tokio::test]
async fn test_update_waits_for_rollout() {
    let mock = mock();
    let clock = ManualClock::new();
    seed_cluster(&mock);
    let resource = NodeDeploymentResource::new(context_with_timeout(&mock, &clock, 10));
    let prior = resource
        .create(&node_deployment_config(CLUSTER_REF))
        .await
        .unwrap()
        .config;

    // Replicas that never become available
    let mut stuck = mock.deployment("nd0001").unwrap();
    stuck.status = Some(NodeDeploymentStatus {
        replicas: 2,
        updated_replicas: 2,
        ready_replicas: 1,
        available_replicas: 1,
        unavailable_replicas: 1,
    });
    mock.add_deployment(stuck);

    let err = resource.update(ND_ID, &prior, &prior).await.unwrap_err();
    match err {
        ProviderError::ConvergenceTimeout { last_observed, .. } => {
            assert_eq!(last_observed, "1/2 ready, 2/2 updated, 1/2 available");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(mock.calls("patch_machine_deployment"), 0);
}

#[tokio::test]
async fn test_moving_to_another_cluster_is_rejected() {
    let mock = mock();
    let clock = ManualClock::new();
    seed_cluster(&mock);
    let resource = NodeDeploymentResource::new(context(&mock, &clock));
    let prior = resource
        .create(&node_deployment_config(CLUSTER_REF))
        .await
        .unwrap()
        .config;

    let mut planned = prior.clone();
    planned.cluster_id = "p1:europe-west3-c:cl2".to_string();
    assert!(matches!(
        resource.update(ND_ID, &prior, &planned).await,
        Err(ProviderError::Validation(_))
    ));
}

#[tokio::test]
async fn test_delete_and_read_back() {
    let mock = mock();
    let clock = ManualClock::new();
    seed_cluster(&mock);
    let resource = NodeDeploymentResource::new(context(&mock, &clock));
    resource
        .create(&node_deployment_config(CLUSTER_REF))
        .await
        .unwrap();

    resource.delete(ND_ID).await.unwrap();
    assert_eq!(mock.calls("delete_machine_deployment"), 1);
    assert!(resource.read(ND_ID, None).await.unwrap().is_none());

    // Deleting again is not an error
    resource.delete(ND_ID).await.unwrap();
    assert_eq!(mock.calls("delete_machine_deployment"), 2);
}

#[tokio::test]
async fn test_import_uses_bare_cluster_id() {
    let mock = mock();
    let clock = ManualClock::new();
    seed_cluster(&mock);
    let resource = NodeDeploymentResource::new(context(&mock, &clock));
    resource
        .create(&node_deployment_config(CLUSTER_REF))
        .await
        .unwrap();

    let imported = resource.import(ND_ID).await.unwrap().config;
    assert_eq!(imported.project_id.as_deref(), Some("p1"));
    assert_eq!(imported.cluster_id, "cl1");
    assert_eq!(imported.spec.replicas, 2);

    assert!(matches!(
        resource.import("p1:cl1").await,
        Err(ProviderError::MalformedIdentity { .. })
    ));
}
