//! MetaKube API models
//!
//! These models match the JSON payloads of the MetaKube (Kubermatic based)
//! REST API. Fields the API may omit are defaulted so partial replies decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Error payload returned by the API on non-2xx replies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: ErrorDetails,
}

/// Inner error details
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Datacenter (seed or node location) as listed by `/api/v1/dc`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Datacenter {
    #[serde(default)]
    pub metadata: DatacenterMeta,
    #[serde(default)]
    pub spec: DatacenterSpec,
}

/// Datacenter metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatacenterMeta {
    #[serde(default)]
    pub name: String,
}

/// Datacenter specification
///
/// Only the presence of a provider block matters to the provider, so the
/// provider specific contents are kept as raw JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterSpec {
    #[serde(default)]
    pub seed: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bringyourown: Option<serde_json::Value>,
}

/// Project model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Cluster model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, rename = "type")]
    pub cluster_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub credential: String,
    #[serde(default)]
    pub spec: ClusterSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

/// Body of the create cluster call
///
/// Network parameters are passed next to the cluster rather than inside its spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterSpec {
    pub cluster: Cluster,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_domain: String,
    #[serde(default, rename = "podsCIDR", skip_serializing_if = "String::is_empty")]
    pub pods_cidr: String,
    #[serde(default, rename = "servicesCIDR", skip_serializing_if = "String::is_empty")]
    pub services_cidr: String,
}

/// Cluster specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub cloud: CloudSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_network: Option<ClusterNetworkingConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub machine_networks: Vec<MachineNetworkingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_logging: Option<AuditLoggingSettings>,
    #[serde(default)]
    pub use_pod_security_policy_admission_plugin: bool,
    #[serde(default)]
    pub use_pod_node_selector_admission_plugin: bool,
}

/// Cloud provider specification of a cluster
///
/// The API populates exactly one provider block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSpec {
    #[serde(default, rename = "dc")]
    pub datacenter_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenstackCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bringyourown: Option<BringYourOwnCloudSpec>,
}

/// OpenStack cluster cloud specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackCloudSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tenant: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(default, rename = "floatingIpPool", skip_serializing_if = "String::is_empty")]
    pub floating_ip_pool: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub security_groups: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,
    #[serde(default, rename = "subnetID", skip_serializing_if = "String::is_empty")]
    pub subnet_id: String,
    #[serde(default, rename = "subnetCIDR", skip_serializing_if = "String::is_empty")]
    pub subnet_cidr: String,
}

/// AWS cluster cloud specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsCloudSpec {
    #[serde(default, rename = "accessKeyId", skip_serializing_if = "String::is_empty")]
    pub access_key_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_access_key: String,
    #[serde(default, rename = "vpcId", skip_serializing_if = "String::is_empty")]
    pub vpc_id: String,
    #[serde(default, rename = "securityGroupID", skip_serializing_if = "String::is_empty")]
    pub security_group_id: String,
    #[serde(default, rename = "routeTableId", skip_serializing_if = "String::is_empty")]
    pub route_table_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_profile_name: String,
    #[serde(default, rename = "roleARN", skip_serializing_if = "String::is_empty")]
    pub control_plane_role_arn: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub openstack_billing_tenant: String,
}

/// Azure cluster cloud specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCloudSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub availability_set: String,
    #[serde(default, rename = "clientID", skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_secret: String,
    #[serde(default, rename = "subscriptionID", skip_serializing_if = "String::is_empty")]
    pub subscription_id: String,
    #[serde(default, rename = "tenantID", skip_serializing_if = "String::is_empty")]
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_group: String,
    #[serde(default, rename = "routeTable", skip_serializing_if = "String::is_empty")]
    pub route_table_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub security_group: String,
    #[serde(default, rename = "subnet", skip_serializing_if = "String::is_empty")]
    pub subnet_name: String,
    #[serde(default, rename = "vnet", skip_serializing_if = "String::is_empty")]
    pub vnet_name: String,
}

/// Bring-your-own infrastructure carries no settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BringYourOwnCloudSpec {}

/// Internal cluster networking
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkingConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods: Option<NetworkRanges>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<NetworkRanges>,
}

/// A list of CIDR blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRanges {
    #[serde(default)]
    pub cidr_blocks: Vec<String>,
}

/// Machine network used for static IPAM
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineNetworkingConfig {
    #[serde(default, rename = "cidr")]
    pub cidr: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default, rename = "dnsServers")]
    pub dns_servers: Vec<String>,
}

/// Audit logging toggle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditLoggingSettings {
    #[serde(default)]
    pub enabled: bool,
}

/// Health state of a single control plane component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum HealthStatus {
    /// Not running (0)
    #[default]
    Down,
    /// Running (1)
    Up,
    /// Being set up (2)
    Provisioning,
}

impl From<u8> for HealthStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => HealthStatus::Up,
            2 => HealthStatus::Provisioning,
            _ => HealthStatus::Down,
        }
    }
}

impl From<HealthStatus> for u8 {
    fn from(value: HealthStatus) -> Self {
        match value {
            HealthStatus::Down => 0,
            HealthStatus::Up => 1,
            HealthStatus::Provisioning => 2,
        }
    }
}

/// Health snapshot of a cluster control plane
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterHealth {
    #[serde(default)]
    pub apiserver: HealthStatus,
    #[serde(default)]
    pub controller: HealthStatus,
    #[serde(default)]
    pub etcd: HealthStatus,
    #[serde(default)]
    pub machine_controller: HealthStatus,
    #[serde(default)]
    pub scheduler: HealthStatus,
    #[serde(default)]
    pub cloud_provider_infrastructure: HealthStatus,
    #[serde(default)]
    pub user_cluster_controller_manager: HealthStatus,
}

impl ClusterHealth {
    /// A snapshot where every component reports up
    pub fn all_up() -> Self {
        Self {
            apiserver: HealthStatus::Up,
            controller: HealthStatus::Up,
            etcd: HealthStatus::Up,
            machine_controller: HealthStatus::Up,
            scheduler: HealthStatus::Up,
            cloud_provider_infrastructure: HealthStatus::Up,
            user_cluster_controller_manager: HealthStatus::Up,
        }
    }

    /// True when all tracked components report up
    pub fn is_ready(&self) -> bool {
        [
            self.apiserver,
            self.controller,
            self.etcd,
            self.machine_controller,
            self.scheduler,
            self.cloud_provider_infrastructure,
            self.user_cluster_controller_manager,
        ]
        .iter()
        .all(|s| *s == HealthStatus::Up)
    }
}

/// SSH key assigned to a project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshKey {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub spec: SshKeySpec,
}

/// SSH key contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshKeySpec {
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub public_key: String,
}

/// Version offered by the API for upgrades or node deployments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterVersion {
    pub version: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub restricted_by_kubelet_version: bool,
}

/// Node deployment (machine deployment) model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDeployment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub spec: NodeDeploymentSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeDeploymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

/// Node deployment specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDeploymentSpec {
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub template: NodeSpec,
    #[serde(default)]
    pub dynamic_config: bool,
}

/// Template applied to every node of a deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(default)]
    pub cloud: NodeCloudSpec,
    #[serde(default)]
    pub operating_system: OperatingSystemSpec,
    #[serde(default)]
    pub versions: NodeVersionInfo,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<TaintSpec>,
}

/// Node taint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaintSpec {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub effect: String,
}

/// Per-provider node settings; exactly one block is populated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenstackNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureNodeSpec>,
}

/// OpenStack node settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackNodeSpec {
    pub flavor: String,
    pub image: String,
    #[serde(default, rename = "diskSize", skip_serializing_if = "Option::is_none")]
    pub root_disk_size_gb: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, rename = "useFloatingIP")]
    pub use_floating_ip: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_ready_check_period: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_ready_check_timeout: String,
}

/// AWS node settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsNodeSpec {
    pub instance_type: String,
    #[serde(default)]
    pub disk_size: i64,
    #[serde(default)]
    pub volume_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ami: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default, rename = "subnetID")]
    pub subnet_id: String,
    #[serde(default, rename = "assignPublicIP")]
    pub assign_public_ip: bool,
}

/// Azure node settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureNodeSpec {
    pub size: String,
    #[serde(default, rename = "assignPublicIP")]
    pub assign_public_ip: bool,
    #[serde(default, rename = "diskSizeGB")]
    pub disk_size_gb: i32,
    #[serde(default, rename = "osDiskSizeGB")]
    pub os_disk_size_gb: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
    #[serde(default, rename = "imageID", skip_serializing_if = "String::is_empty")]
    pub image_id: String,
}

/// Operating system of the nodes; at most one block is populated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatingSystemSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ubuntu: Option<UbuntuSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centos: Option<CentOsSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatcar: Option<FlatcarSpec>,
}

/// Ubuntu settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UbuntuSpec {
    #[serde(default)]
    pub dist_upgrade_on_boot: bool,
}

/// CentOS settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CentOsSpec {
    #[serde(default)]
    pub dist_upgrade_on_boot: bool,
}

/// Flatcar settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatcarSpec {
    #[serde(default)]
    pub disable_auto_update: bool,
}

/// Kubelet version of the nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeVersionInfo {
    #[serde(default)]
    pub kubelet: String,
}

/// Observed replica counts of a node deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDeploymentStatus {
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub updated_replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(default)]
    pub available_replicas: i32,
    #[serde(default)]
    pub unavailable_replicas: i32,
}

impl NodeDeployment {
    /// True when every desired replica is updated, ready and available
    pub fn is_ready(&self) -> bool {
        let desired = self.spec.replicas;
        match &self.status {
            Some(status) => {
                status.updated_replicas == desired
                    && status.ready_replicas == desired
                    && status.available_replicas == desired
                    && status.unavailable_replicas == 0
            }
            None => desired == 0,
        }
    }
}
