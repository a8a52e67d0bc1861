//! Fixtures shared by the lifecycle tests

#![allow(dead_code)]

use metakube_client::{
    CloudSpec, Cluster, ClusterSpec, Datacenter, DatacenterMeta, DatacenterSpec, MasterVersion,
    MockMetaKubeClient, OpenstackCloudSpec, Project,
};
use metakube_provider::config::Timeouts;
use metakube_provider::{ManualClock, ResourceContext};
use metakube_schema::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

pub const PROJECT: &str = "p1";
pub const SEED: &str = "europe-west3-c";

pub fn datacenter(name: &str, seed: &str, provider: CloudProvider) -> Datacenter {
    let mut spec = DatacenterSpec {
        seed: seed.to_string(),
        ..Default::default()
    };
    let block = Some(serde_json::json!({}));
    match provider {
        CloudProvider::Openstack => spec.openstack = block,
        CloudProvider::Aws => spec.aws = block,
        CloudProvider::Azure => spec.azure = block,
        CloudProvider::BringYourOwn => spec.bringyourown = block,
    }
    Datacenter {
        metadata: DatacenterMeta { name: name.to_string() },
        spec,
    }
}

/// Mock with two datacenters and project `p1` labelled `team=x`
pub fn mock() -> MockMetaKubeClient {
    let mock = MockMetaKubeClient::new("https://metakube.test");
    mock.add_datacenter(datacenter("dbl1", SEED, CloudProvider::Openstack));
    mock.add_datacenter(datacenter("aws-eu-central-1a", SEED, CloudProvider::Aws));
    mock.add_project(Project {
        id: PROJECT.to_string(),
        name: "demo".to_string(),
        status: "Active".to_string(),
        labels: BTreeMap::from([("team".to_string(), "x".to_string())]),
    });
    mock
}

pub fn context(mock: &MockMetaKubeClient, clock: &ManualClock) -> ResourceContext {
    ResourceContext::new(Arc::new(mock.clone()), Timeouts::default()).with_clock(Arc::new(clock.clone()))
}

pub fn context_with_timeout(mock: &MockMetaKubeClient, clock: &ManualClock, secs: u64) -> ResourceContext {
    let timeout = Duration::from_secs(secs);
    let timeouts = Timeouts {
        create: timeout,
        update: timeout,
        delete: timeout,
    };
    ResourceContext::new(Arc::new(mock.clone()), timeouts).with_clock(Arc::new(clock.clone()))
}

pub fn cluster_config() -> ClusterConfig {
    ClusterConfig {
        project_id: PROJECT.to_string(),
        dc_name: "dbl1".to_string(),
        name: "demo".to_string(),
        labels: BTreeMap::from([("env".to_string(), "prod".to_string())]),
        sshkeys: BTreeSet::from(["k1".to_string(), "k2".to_string()]),
        spec: ClusterSpecConfig {
            version: "1.18.8".to_string(),
            cloud: Some(ClusterCloud::Openstack(OpenstackCloudConfig {
                tenant: "tenant".to_string(),
                username: "user".to_string(),
                password: "secret".to_string(),
                floating_ip_pool: Some("ext-net".to_string()),
                ..Default::default()
            })),
            audit_logging: true,
            ..Default::default()
        },
        cluster_type: DEFAULT_CLUSTER_TYPE.to_string(),
        ..Default::default()
    }
}

/// Existing OpenStack cluster `cl1` in project `p1`, with upgrades to 1.18.x advertised
pub fn seed_cluster(mock: &MockMetaKubeClient) -> Cluster {
    let cluster = Cluster {
        id: "cl1".to_string(),
        name: "demo".to_string(),
        cluster_type: DEFAULT_CLUSTER_TYPE.to_string(),
        spec: ClusterSpec {
            version: "1.18.8".to_string(),
            cloud: CloudSpec {
                datacenter_name: "dbl1".to_string(),
                openstack: Some(OpenstackCloudSpec {
                    floating_ip_pool: "ext-net".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    };
    mock.add_cluster(cluster.clone());
    mock.set_node_upgrades(vec![
        MasterVersion {
            version: "1.17.9".to_string(),
            ..Default::default()
        },
        MasterVersion {
            version: "1.18.8".to_string(),
            default: true,
            ..Default::default()
        },
    ]);
    cluster
}

pub fn node_deployment_config(cluster_id: &str) -> NodeDeploymentConfig {
    NodeDeploymentConfig {
        project_id: None,
        cluster_id: cluster_id.to_string(),
        name: Some("workers".to_string()),
        spec: NodeDeploymentSpecConfig {
            replicas: 2,
            dynamic_config: false,
            template: NodeTemplateConfig {
                cloud: Some(NodeCloud::Openstack(OpenstackNodeConfig {
                    flavor: "m1.small".to_string(),
                    image: "Ubuntu Focal".to_string(),
                    ..Default::default()
                })),
                versions: Some(NodeVersionsConfig {
                    kubelet: Some("1.18.8".to_string()),
                }),
                ..Default::default()
            },
        },
        ..Default::default()
    }
}
