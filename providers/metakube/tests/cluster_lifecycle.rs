//! Cluster lifecycle against the in-memory API

mod common;

use common::*;
use metakube_client::{Cluster, ClusterHealth, HealthStatus, MockFailure};
use metakube_provider::resources::ClusterResource;
use metakube_provider::{ManualClock, ProviderError};
use metakube_schema::*;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

const CLUSTER_ID: &str = "p1:europe-west3-c:cl0001";

fn provisioning() -> ClusterHealth {
    ClusterHealth {
        etcd: HealthStatus::Provisioning,
        apiserver: HealthStatus::Down,
        ..ClusterHealth::all_up()
    }
}

async fn created(mock: &metakube_client::MockMetaKubeClient, clock: &ManualClock) -> ClusterConfig {
    ClusterResource::new(context(mock, clock))
        .create(&cluster_config())
        .await
        .expect("create cluster")
        .config
}

#[tokio::test]
async fn test_create_waits_for_health_and_reads_back() {
    let mock = mock();
    let clock = ManualClock::new();
    mock.push_health("cl0001", provisioning());
    mock.push_health("cl0001", provisioning());
    mock.push_health("cl0001", ClusterHealth::all_up());

    let observed = ClusterResource::new(context(&mock, &clock))
        .create(&cluster_config())
        .await
        .unwrap();

    assert_eq!(observed.id, CLUSTER_ID);
    assert_eq!(mock.calls("list_datacenters"), 1);
    assert_eq!(mock.calls("get_cluster_health"), 3);
    assert_eq!(clock.elapsed(), Duration::from_secs(2));

    let cfg = observed.config;
    assert_eq!(cfg.project_id, "p1");
    assert_eq!(cfg.dc_name, "dbl1");
    // team=x is inherited from the project and hidden
    assert_eq!(cfg.labels, BTreeMap::from([("env".to_string(), "prod".to_string())]));
    assert_eq!(cfg.sshkeys, BTreeSet::from(["k1".to_string(), "k2".to_string()]));
    assert_eq!(cfg.spec.pods_cidr.as_deref(), Some("172.25.0.0/16"));
    assert_eq!(cfg.spec.domain_name.as_deref(), Some("cluster.local"));
    assert!(cfg.creation_timestamp.is_some());
    match cfg.spec.cloud {
        Some(ClusterCloud::Openstack(os)) => {
            assert_eq!(os.password, "secret");
            assert_eq!(os.username, "user");
            assert_eq!(os.floating_ip_pool.as_deref(), Some("ext-net"));
        }
        other => panic!("unexpected cloud {:?}", other),
    }
}

#[tokio::test]
async fn test_create_rejects_invalid_tree_before_any_mutation() {
    let mock = mock();
    let clock = ManualClock::new();
    let mut cfg = cluster_config();
    cfg.dc_name = "nowhere".to_string();
    cfg.spec.cloud = None;

    let err = ClusterResource::new(context(&mock, &clock))
        .create(&cfg)
        .await
        .unwrap_err();

    match err {
        ProviderError::Validation(diags) => {
            assert_eq!(diags.len(), 2);
            let attributes: Vec<_> = diags.iter().filter_map(|d| d.attribute.clone()).collect();
            assert_eq!(attributes, vec!["spec.cloud".to_string(), "dc_name".to_string()]);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(mock.calls("create_cluster"), 0);
}

#[tokio::test]
async fn test_create_in_datacenter_of_other_provider() {
    let mock = mock();
    let clock = ManualClock::new();
    let mut cfg = cluster_config();
    cfg.dc_name = "aws-eu-central-1a".to_string();

    let err = ClusterResource::new(context(&mock, &clock))
        .create(&cfg)
        .await
        .unwrap_err();
    let diags = err.into_diagnostics();
    let diag = diags.iter().next().unwrap();
    assert_eq!(diag.summary, "Datacenter aws-eu-central-1a does not support provider openstack");
    assert!(diag.detail.as_deref().unwrap().contains("[dbl1]"));
}

#[tokio::test]
async fn test_create_times_out_with_last_health() {
    let mock = mock();
    let clock = ManualClock::new();
    mock.push_health("cl0001", provisioning());

    let err = ClusterResource::new(context_with_timeout(&mock, &clock, 10))
        .create(&cluster_config())
        .await
        .unwrap_err();

    assert_eq!(err.created_id(), Some(CLUSTER_ID));
    match err {
        ProviderError::PartiallyCreated { source, .. } => match *source {
            ProviderError::ConvergenceTimeout { resource, last_observed, .. } => {
                assert_eq!(resource, format!("cluster {}", CLUSTER_ID));
                assert!(last_observed.contains("apiserver: down"));
                assert!(last_observed.contains("etcd: provisioning"));
            }
            other => panic!("unexpected cause {:?}", other),
        },
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(mock.calls("get_cluster_health"), 5);
    assert_eq!(clock.elapsed(), Duration::from_secs(10));
}

#[tokio::test]
async fn test_ssh_key_failure_surfaces() {
    let mock = mock();
    let clock = ManualClock::new();
    mock.fail_next("assign_ssh_key_to_cluster", MockFailure::Forbidden);

    let err = ClusterResource::new(context(&mock, &clock))
        .create(&cluster_config())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert_eq!(err.created_id(), Some(CLUSTER_ID));
    assert_eq!(mock.calls("assign_ssh_key_to_cluster"), 1);
    assert_eq!(mock.calls("get_cluster_health"), 0);
    assert!(mock.cluster("cl0001").is_some());

    // The recorded id addresses the cluster that was left behind
    let read = ClusterResource::new(context(&mock, &clock))
        .read(err.created_id().unwrap(), None)
        .await
        .unwrap();
    assert!(read.is_some());
}

#[tokio::test]
async fn test_create_retries_unavailable_api() {
    let mock = mock();
    let clock = ManualClock::new();
    mock.fail_next("create_cluster", MockFailure::Status(503));
    mock.fail_next("create_cluster", MockFailure::Conflict);

    let observed = ClusterResource::new(context(&mock, &clock))
        .create(&cluster_config())
        .await
        .unwrap();

    assert_eq!(observed.id, CLUSTER_ID);
    assert_eq!(mock.calls("create_cluster"), 3);
    assert_eq!(clock.elapsed(), Duration::from_secs(2));
}

#[tokio::test]
async fn test_create_rejected_by_api_has_no_id() {
    let mock = mock();
    let clock = ManualClock::new();
    mock.fail_next("create_cluster", MockFailure::Forbidden);

    let err = ClusterResource::new(context(&mock, &clock))
        .create(&cluster_config())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert_eq!(err.created_id(), None);
    assert_eq!(mock.calls("create_cluster"), 1);
    assert!(mock.cluster("cl0001").is_none());
}

#[tokio::test]
async fn test_read_missing_cluster_is_none() {
    let mock = mock();
    let clock = ManualClock::new();
    let read = ClusterResource::new(context(&mock, &clock))
        .read("p1:europe-west3-c:gone", None)
        .await
        .unwrap();
    assert!(read.is_none());
}

#[tokio::test]
async fn test_malformed_id_makes_no_remote_call() {
    let mock = mock();
    let clock = ManualClock::new();
    let resource = ClusterResource::new(context(&mock, &clock));

    for id in ["p1:cl1", "p1::cl1", ""] {
        assert!(matches!(
            resource.read(id, None).await,
            Err(ProviderError::MalformedIdentity { .. })
        ));
        assert!(matches!(
            resource.delete(id).await,
            Err(ProviderError::MalformedIdentity { .. })
        ));
    }
    assert_eq!(mock.calls("get_cluster"), 0);
    assert_eq!(mock.calls("delete_cluster"), 0);
}

#[tokio::test]
async fn test_refresh_keeps_prior_secrets_and_credential() {
    let mock = mock();
    let clock = ManualClock::new();
    let resource = ClusterResource::new(context(&mock, &clock));
    let mut prior = created(&mock, &clock).await;
    prior.credential = Some("preset".to_string());

    let refreshed = resource.read(CLUSTER_ID, Some(&prior)).await.unwrap().unwrap();
    assert_eq!(refreshed.config, prior);
    assert!(refreshed.diagnostics.is_empty());
}

#[tokio::test]
async fn test_update_patches_and_reconciles_ssh_keys() {
    let mock = mock();
    let clock = ManualClock::new();
    let resource = ClusterResource::new(context(&mock, &clock));
    let prior = created(&mock, &clock).await;

    let mut planned = prior.clone();
    planned.labels = BTreeMap::from([("stage".to_string(), "blue".to_string())]);
    planned.spec.version = "1.19.3".to_string();
    planned.sshkeys = BTreeSet::from(["k2".to_string(), "k3".to_string()]);
    mock.fail_next("patch_cluster", MockFailure::Conflict);

    let updated = resource.update(CLUSTER_ID, &prior, &planned).await.unwrap();

    assert_eq!(mock.calls("patch_cluster"), 2);
    let patch = mock.last_patch().unwrap();
    assert!(patch["labels"]["env"].is_null());
    assert_eq!(patch["labels"]["stage"], "blue");
    assert_eq!(patch["spec"]["version"], "1.19.3");

    assert_eq!(mock.assigned_keys("cl0001"), planned.sshkeys);
    assert_eq!(updated.config.sshkeys, planned.sshkeys);
    assert_eq!(updated.config.spec.version, "1.19.3");
    assert_eq!(
        updated.config.labels,
        BTreeMap::from([("stage".to_string(), "blue".to_string())])
    );
}

#[tokio::test]
async fn test_update_ignores_already_detached_key() {
    let mock = mock();
    let clock = ManualClock::new();
    let resource = ClusterResource::new(context(&mock, &clock));
    let prior = created(&mock, &clock).await;

    let mut planned = prior.clone();
    planned.sshkeys = BTreeSet::from(["k2".to_string()]);
    mock.fail_next("detach_ssh_key_from_cluster", MockFailure::NotFound);

    resource.update(CLUSTER_ID, &prior, &planned).await.unwrap();
    assert_eq!(mock.calls("detach_ssh_key_from_cluster"), 1);
    assert_eq!(mock.calls("patch_cluster"), 0);
}

#[tokio::test]
async fn test_update_with_version_decrease_is_rejected() {
    let mock = mock();
    let clock = ManualClock::new();
    let resource = ClusterResource::new(context(&mock, &clock));
    let prior = created(&mock, &clock).await;

    let mut planned = prior.clone();
    planned.spec.version = "1.17.0".to_string();

    match resource.update(CLUSTER_ID, &prior, &planned).await {
        Err(ProviderError::Validation(diags)) => {
            assert_eq!(
                diags.iter().next().unwrap().attribute.as_deref(),
                Some("spec.version")
            );
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(mock.calls("patch_cluster"), 0);
}

#[tokio::test]
async fn test_delete_waits_until_gone() {
    let mock = mock();
    let clock = ManualClock::new();
    let resource = ClusterResource::new(context(&mock, &clock));
    created(&mock, &clock).await;
    mock.set_deletion_delay(2);
    let reads_before = mock.calls("get_cluster");

    resource.delete(CLUSTER_ID).await.unwrap();

    assert_eq!(mock.calls("delete_cluster"), 1);
    assert_eq!(mock.calls("get_cluster") - reads_before, 3);
    assert!(mock.cluster("cl0001").is_none());
}

#[tokio::test]
async fn test_delete_of_missing_cluster_succeeds_immediately() {
    let mock = mock();
    let clock = ManualClock::new();
    ClusterResource::new(context(&mock, &clock))
        .delete("p1:europe-west3-c:gone")
        .await
        .unwrap();
    assert_eq!(mock.calls("delete_cluster"), 1);
    assert_eq!(mock.calls("get_cluster"), 0);
}

#[tokio::test]
async fn test_delete_conflict_is_retried() {
    let mock = mock();
    let clock = ManualClock::new();
    let resource = ClusterResource::new(context(&mock, &clock));
    created(&mock, &clock).await;
    mock.fail_next("delete_cluster", MockFailure::Conflict);

    resource.delete(CLUSTER_ID).await.unwrap();
    assert_eq!(mock.calls("delete_cluster"), 2);
}

#[tokio::test]
async fn test_import_without_prior_tree() {
    let mock = mock();
    let clock = ManualClock::new();
    let mut cluster = Cluster {
        id: "imported".to_string(),
        ..seed_cluster(&mock)
    };
    cluster.labels = BTreeMap::from([
        ("team".to_string(), "x".to_string()),
        ("env".to_string(), "dev".to_string()),
    ]);
    mock.add_cluster(cluster);

    let observed = ClusterResource::new(context(&mock, &clock))
        .import("p1:europe-west3-c:imported")
        .await
        .unwrap();

    let cfg = observed.config;
    assert_eq!(cfg.name, "demo");
    assert_eq!(cfg.dc_name, "dbl1");
    assert_eq!(cfg.labels, BTreeMap::from([("env".to_string(), "dev".to_string())]));
    match cfg.spec.cloud {
        Some(ClusterCloud::Openstack(os)) => assert!(os.password.is_empty()),
        other => panic!("unexpected cloud {:?}", other),
    }
    assert!(matches!(
        ClusterResource::new(context(&mock, &clock))
            .import("p1:europe-west3-c:gone")
            .await,
        Err(ProviderError::Remote(_))
    ));
}
