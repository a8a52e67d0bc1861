//! Integration tests for the MetaKube client
//!
//! These tests talk to a real MetaKube API.
//! Set METAKUBE_HOST and METAKUBE_TOKEN environment variables to run.

use metakube_client::{MetaKubeClient, MetaKubeClientTrait};

fn client() -> MetaKubeClient {
    let host = std::env::var("METAKUBE_HOST")
        .unwrap_or_else(|_| "https://metakube.syseleven.de".to_string());
    let token = std::env::var("METAKUBE_TOKEN")
        .expect("METAKUBE_TOKEN environment variable must be set");
    MetaKubeClient::new(host, token).expect("Failed to create client")
}

#[tokio::test]
#[ignore] // Requires MetaKube API access
async fn test_validate_token() {
    client().validate_token().await.expect("token rejected");
}

#[tokio::test]
#[ignore]
async fn test_list_datacenters() {
    let datacenters = client()
        .list_datacenters()
        .await
        .expect("Failed to list datacenters");

    let seeds = datacenters.iter().filter(|dc| !dc.spec.seed.is_empty()).count();
    println!("Found {} datacenters, {} with a seed", datacenters.len(), seeds);
}

#[tokio::test]
#[ignore]
async fn test_missing_cluster_is_not_found() {
    let project = std::env::var("METAKUBE_PROJECT")
        .expect("METAKUBE_PROJECT environment variable must be set");
    let err = client()
        .get_project_cluster(&project, "does-not-exist")
        .await
        .expect_err("cluster should not exist");
    assert!(err.is_not_found() || err.is_forbidden(), "unexpected error: {}", err);
}
