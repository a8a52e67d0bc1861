//! Dispatch of untyped trees by resource type name

mod common;

use common::*;
use metakube_client::MockFailure;
use metakube_provider::{ManualClock, PlanAction, Provider, ProviderError};
use serde_json::json;

fn cluster_tree() -> serde_json::Value {
    json!({
        "project_id": "p1",
        "dc_name": "dbl1",
        "name": "demo",
        "labels": {"env": "prod"},
        "sshkeys": ["k1"],
        "spec": {
            "version": "1.18.8",
            "cloud": {
                "openstack": {
                    "tenant": "tenant",
                    "username": "user",
                    "password": "secret"
                }
            }
        }
    })
}

#[tokio::test]
async fn test_cluster_round_trip_through_trees() {
    let mock = mock();
    let clock = ManualClock::new();
    let provider = Provider::new(context(&mock, &clock));

    let created = provider.create("metakube_cluster", &cluster_tree()).await.unwrap();
    assert_eq!(created.id, "p1:europe-west3-c:cl0001");
    assert_eq!(created.state["type"], "kubernetes");
    assert_eq!(created.state["labels"], json!({"env": "prod"}));
    assert_eq!(created.state["spec"]["cloud"]["openstack"]["password"], "secret");
    assert!(created.state["spec"]["cloud"].get("aws").is_none());

    let read = provider
        .read("metakube_cluster", &created.id, Some(&created.state))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.state, created.state);

    provider.delete("metakube_cluster", &created.id).await.unwrap();
    assert!(provider
        .read("metakube_cluster", &created.id, Some(&created.state))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_failed_create_reports_created_id() {
    let mock = mock();
    let clock = ManualClock::new();
    let provider = Provider::new(context(&mock, &clock));
    mock.fail_next("assign_ssh_key_to_cluster", MockFailure::Status(500));

    let err = provider.create("metakube_cluster", &cluster_tree()).await.unwrap_err();
    let id = err.created_id().unwrap().to_string();
    assert_eq!(id, "p1:europe-west3-c:cl0001");

    // Keeping the id lets the next refresh find the cluster instead of creating another
    let read = provider.read("metakube_cluster", &id, Some(&cluster_tree())).await.unwrap();
    assert_eq!(read.unwrap().id, id);
    assert_eq!(mock.calls("create_cluster"), 1);
}

#[tokio::test]
async fn test_node_deployment_through_trees() {
    let mock = mock();
    let clock = ManualClock::new();
    seed_cluster(&mock);
    let provider = Provider::new(context(&mock, &clock));

    let tree = json!({
        "cluster_id": "p1:europe-west3-c:cl1",
        "spec": {
            "replicas": 1,
            "template": {
                "cloud": {"openstack": {"flavor": "m1.small", "image": "Ubuntu Focal"}}
            }
        }
    });
    let created = provider.create("metakube_node_deployment", &tree).await.unwrap();
    assert_eq!(created.id, "p1:cl1:nd0001");
    assert_eq!(created.state["spec"]["template"]["versions"]["kubelet"], "1.18.8");

    let imported = provider.import("metakube_node_deployment", &created.id).await.unwrap();
    assert_eq!(imported.state["cluster_id"], "cl1");
    assert_eq!(imported.state["project_id"], "p1");
}

#[tokio::test]
async fn test_two_cloud_blocks_fail_to_decode() {
    let mock = mock();
    let clock = ManualClock::new();
    let provider = Provider::new(context(&mock, &clock));
    let mut tree = cluster_tree();
    tree["spec"]["cloud"]["aws"] = json!({"access_key_id": "AKIA", "secret_access_key": "s"});

    let err = provider.create("metakube_cluster", &tree).await.unwrap_err();
    match &err {
        ProviderError::SchemaMapping { path, message } => {
            assert_eq!(path, "metakube_cluster");
            assert!(message.contains("only one cloud provider block may be set"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(mock.calls("list_datacenters"), 0);
}

#[tokio::test]
async fn test_unknown_resource_type() {
    let mock = mock();
    let clock = ManualClock::new();
    let provider = Provider::new(context(&mock, &clock));
    assert!(matches!(
        provider.read("metakube_project", "p1", None).await,
        Err(ProviderError::InvalidConfig(_))
    ));
}

#[test]
fn test_plan_through_trees() {
    let mock = mock();
    let clock = ManualClock::new();
    let provider = Provider::new(context(&mock, &clock));
    let prior = cluster_tree();

    let mut upgraded = prior.clone();
    upgraded["spec"]["version"] = json!("1.19.0");
    assert_eq!(
        provider.plan("metakube_cluster", &prior, &upgraded).unwrap(),
        PlanAction::UpdateInPlace
    );

    let mut moved = prior.clone();
    moved["dc_name"] = json!("cbk1");
    assert_eq!(
        provider.plan("metakube_cluster", &prior, &moved).unwrap(),
        PlanAction::Replace {
            attributes: vec!["dc_name".to_string()]
        }
    );
    assert_eq!(
        provider.plan("metakube_cluster", &prior, &prior).unwrap(),
        PlanAction::NoChange
    );
}
