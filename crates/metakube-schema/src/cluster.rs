//! Cluster resource configuration
//!
//! Typed shape of the `metakube_cluster` declarative tree.

use crate::cloud::{cluster_cloud, CloudBlock, ClusterCloud};
use crate::ResourceConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Cluster type used when the tree does not name one
pub const DEFAULT_CLUSTER_TYPE: &str = "kubernetes";

fn default_cluster_type() -> String {
    DEFAULT_CLUSTER_TYPE.to_string()
}

/// `metakube_cluster` tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClusterConfig {
    /// Project the cluster belongs to
    pub project_id: String,

    /// Seed datacenter the control plane runs in
    pub dc_name: String,

    /// Cluster name
    pub name: String,

    /// Labels set on the cluster, excluding the ones inherited from the project
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// SSH key ids assigned to the cluster nodes
    #[serde(default)]
    pub sshkeys: BTreeSet<String>,

    /// Cluster specification
    pub spec: ClusterSpecConfig,

    /// Cloud credential preset name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,

    /// Orchestrator flavour of the cluster
    #[serde(default = "default_cluster_type", rename = "type")]
    pub cluster_type: String,

    /// Creation timestamp (computed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,

    /// Deletion timestamp (computed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<String>,
}

impl ResourceConfig for ClusterConfig {
    const RESOURCE: &'static str = "metakube_cluster";
}

/// Cluster specification block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClusterSpecConfig {
    /// Kubernetes version, e.g. `1.18.8`
    pub version: String,

    /// Cloud provider block; exactly one provider must be set
    #[serde(default, with = "cluster_cloud")]
    #[schemars(with = "CloudBlock")]
    pub cloud: Option<ClusterCloud>,

    /// Machine networks, used for static IP assignment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub machine_networks: Vec<MachineNetworkConfig>,

    /// Enable audit logging
    #[serde(default)]
    pub audit_logging: bool,

    /// Enable the PodSecurityPolicy admission plugin
    #[serde(default)]
    pub pod_security_policy: bool,

    /// Enable the PodNodeSelector admission plugin
    #[serde(default)]
    pub pod_node_selector: bool,

    /// Internal IP range for ClusterIP services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services_cidr: Option<String>,

    /// Internal IP range for pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods_cidr: Option<String>,

    /// Cluster DNS domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
}

/// Machine network for static IP assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MachineNetworkConfig {
    /// Network CIDR
    pub cidr: String,

    /// Gateway address
    pub gateway: String,

    /// DNS servers handed to the machines
    #[serde(default)]
    pub dns_servers: BTreeSet<String>,
}
