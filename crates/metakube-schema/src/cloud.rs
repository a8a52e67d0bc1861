//! Cloud provider variants
//!
//! The declarative tree selects a provider by populating exactly one of the
//! `openstack`, `aws`, `azure` (and, for clusters, `bringyourown`) blocks.
//! The blocks are decoded into a sum type here so the rest of the provider
//! never has to look at which block happens to be non-empty.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Cloud provider kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    /// OpenStack
    Openstack,
    /// Amazon Web Services
    Aws,
    /// Microsoft Azure
    Azure,
    /// Infrastructure provided by the user
    #[serde(rename = "bringyourown")]
    BringYourOwn,
}

impl CloudProvider {
    /// Block name used in the declarative tree
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Openstack => "openstack",
            CloudProvider::Aws => "aws",
            CloudProvider::Azure => "azure",
            CloudProvider::BringYourOwn => "bringyourown",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the populated arms, in declaration order
fn populated(arms: &[(CloudProvider, bool)]) -> Vec<CloudProvider> {
    arms.iter()
        .filter(|(_, set)| *set)
        .map(|(provider, _)| *provider)
        .collect()
}

fn conflict_message(found: &[CloudProvider]) -> String {
    let names: Vec<&str> = found.iter().map(CloudProvider::as_str).collect();
    format!(
        "only one cloud provider block may be set, found {}",
        names.join(", ")
    )
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

/// OpenStack cluster settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OpenstackCloudConfig {
    /// The OpenStack project used for billing
    pub tenant: String,
    /// The OpenStack account's username (write-only)
    pub username: String,
    /// The OpenStack account's password (write-only)
    pub password: String,
    /// Floating IP pool used by all worker nodes to receive a public IP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating_ip_pool: Option<String>,
    /// Security group all worker nodes are attached to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group: Option<String>,
    /// Network all worker nodes are attached to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Subnet of `network` used by the worker nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    /// Internal IP range of the nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_cidr: Option<String>,
}

/// AWS cluster settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AwsCloudConfig {
    /// Access key identifier (write-only)
    pub access_key_id: String,
    /// Secret access key (write-only)
    pub secret_access_key: String,
    /// Virtual private cloud identifier
    #[serde(default)]
    pub vpc_id: String,
    /// Security group identifier
    #[serde(default)]
    pub security_group_id: String,
    /// Route table identifier
    #[serde(default)]
    pub route_table_id: String,
    /// Instance profile name
    #[serde(default)]
    pub instance_profile_name: String,
    /// IAM role the control plane assumes
    #[serde(default)]
    pub role_arn: String,
    /// OpenStack project billed for the cluster
    #[serde(default)]
    pub openstack_billing_tenant: String,
}

/// Azure cluster settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AzureCloudConfig {
    /// Availability set
    #[serde(default)]
    pub availability_set: String,
    /// Service principal client id
    pub client_id: String,
    /// Service principal secret (write-only)
    pub client_secret: String,
    /// Subscription id
    pub subscription_id: String,
    /// Tenant id
    pub tenant_id: String,
    /// Resource group, assigned by the API when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    /// Route table, assigned by the API when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_table: Option<String>,
    /// Security group, assigned by the API when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group: Option<String>,
    /// Subnet, assigned by the API when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    /// Virtual network, assigned by the API when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnet: Option<String>,
}

/// Bring-your-own infrastructure has no settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BringYourOwnConfig {}

/// Cloud provider of a cluster
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterCloud {
    /// OpenStack cluster
    Openstack(OpenstackCloudConfig),
    /// AWS cluster
    Aws(AwsCloudConfig),
    /// Azure cluster
    Azure(AzureCloudConfig),
    /// Bring-your-own cluster
    BringYourOwn,
}

impl ClusterCloud {
    /// Provider kind of this variant
    pub fn provider(&self) -> CloudProvider {
        match self {
            ClusterCloud::Openstack(_) => CloudProvider::Openstack,
            ClusterCloud::Aws(_) => CloudProvider::Aws,
            ClusterCloud::Azure(_) => CloudProvider::Azure,
            ClusterCloud::BringYourOwn => CloudProvider::BringYourOwn,
        }
    }
}

/// Wire shape of the cluster `cloud` block
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CloudBlock {
    /// OpenStack cluster specification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenstackCloudConfig>,
    /// AWS cluster specification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsCloudConfig>,
    /// Azure cluster specification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureCloudConfig>,
    /// Bring your own infrastructure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bringyourown: Option<BringYourOwnConfig>,
}

impl CloudBlock {
    /// Select the single populated arm; `Ok(None)` when no block is set
    pub fn select(self) -> Result<Option<ClusterCloud>, String> {
        let found = populated(&[
            (CloudProvider::Openstack, self.openstack.is_some()),
            (CloudProvider::Aws, self.aws.is_some()),
            (CloudProvider::Azure, self.azure.is_some()),
            (CloudProvider::BringYourOwn, self.bringyourown.is_some()),
        ]);
        if found.len() > 1 {
            return Err(conflict_message(&found));
        }
        Ok(match self {
            CloudBlock { openstack: Some(os), .. } => Some(ClusterCloud::Openstack(os)),
            CloudBlock { aws: Some(aws), .. } => Some(ClusterCloud::Aws(aws)),
            CloudBlock { azure: Some(azure), .. } => Some(ClusterCloud::Azure(azure)),
            CloudBlock { bringyourown: Some(_), .. } => Some(ClusterCloud::BringYourOwn),
            _ => None,
        })
    }
}

impl From<Option<&ClusterCloud>> for CloudBlock {
    fn from(cloud: Option<&ClusterCloud>) -> Self {
        let mut block = CloudBlock::default();
        match cloud {
            Some(ClusterCloud::Openstack(os)) => block.openstack = Some(os.clone()),
            Some(ClusterCloud::Aws(aws)) => block.aws = Some(aws.clone()),
            Some(ClusterCloud::Azure(azure)) => block.azure = Some(azure.clone()),
            Some(ClusterCloud::BringYourOwn) => block.bringyourown = Some(BringYourOwnConfig {}),
            None => {}
        }
        block
    }
}

/// serde adapter between `CloudBlock` and `Option<ClusterCloud>`
pub mod cluster_cloud {
    use super::{CloudBlock, ClusterCloud};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize as a block with one arm set
    pub fn serialize<S: Serializer>(value: &Option<ClusterCloud>, serializer: S) -> Result<S::Ok, S::Error> {
        CloudBlock::from(value.as_ref()).serialize(serializer)
    }

    /// Deserialize, rejecting more than one populated arm
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<ClusterCloud>, D::Error> {
        let block = Option::<CloudBlock>::deserialize(deserializer)?.unwrap_or_default();
        block.select().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Node deployment
// ---------------------------------------------------------------------------

/// OpenStack node settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OpenstackNodeConfig {
    /// Instance flavor
    pub flavor: String,
    /// Image name
    pub image: String,
    /// Root disk size in GB; the flavor default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<i64>,
    /// Instance tags
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Attach a floating IP to every node
    #[serde(default)]
    pub use_floating_ip: bool,
    /// Interval between instance readiness checks, e.g. `10s`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_ready_check_period: Option<String>,
    /// Timeout of the instance readiness check, e.g. `4m`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_ready_check_timeout: Option<String>,
}

/// AWS node settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AwsNodeConfig {
    /// EC2 instance type
    pub instance_type: String,
    /// Root disk size in GB
    pub disk_size: i64,
    /// EBS volume type
    pub volume_type: String,
    /// Availability zone
    pub availability_zone: String,
    /// Subnet identifier
    pub subnet_id: String,
    /// Assign a public IP to every node
    #[serde(default)]
    pub assign_public_ip: bool,
    /// AMI override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ami: Option<String>,
    /// Instance tags
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Azure node settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AzureNodeConfig {
    /// VM size
    pub size: String,
    /// Assign a public IP to every node
    #[serde(default)]
    pub assign_public_ip: bool,
    /// Data disk size in GB
    #[serde(default)]
    pub disk_size_gb: i32,
    /// OS disk size in GB
    #[serde(default)]
    pub os_disk_size_gb: i32,
    /// Availability zones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
    /// Image override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// VM tags
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Cloud provider of a node deployment
#[derive(Debug, Clone, PartialEq)]
pub enum NodeCloud {
    /// OpenStack nodes
    Openstack(OpenstackNodeConfig),
    /// AWS nodes
    Aws(AwsNodeConfig),
    /// Azure nodes
    Azure(AzureNodeConfig),
}

impl NodeCloud {
    /// Provider kind of this variant
    pub fn provider(&self) -> CloudProvider {
        match self {
            NodeCloud::Openstack(_) => CloudProvider::Openstack,
            NodeCloud::Aws(_) => CloudProvider::Aws,
            NodeCloud::Azure(_) => CloudProvider::Azure,
        }
    }
}

/// Wire shape of the node template `cloud` block
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NodeCloudBlock {
    /// OpenStack node specification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenstackNodeConfig>,
    /// AWS node specification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsNodeConfig>,
    /// Azure node specification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureNodeConfig>,
}

impl NodeCloudBlock {
    /// Select the single populated arm; `Ok(None)` when no block is set
    pub fn select(self) -> Result<Option<NodeCloud>, String> {
        let found = populated(&[
            (CloudProvider::Openstack, self.openstack.is_some()),
            (CloudProvider::Aws, self.aws.is_some()),
            (CloudProvider::Azure, self.azure.is_some()),
        ]);
        if found.len() > 1 {
            return Err(conflict_message(&found));
        }
        Ok(match self {
            NodeCloudBlock { openstack: Some(os), .. } => Some(NodeCloud::Openstack(os)),
            NodeCloudBlock { aws: Some(aws), .. } => Some(NodeCloud::Aws(aws)),
            NodeCloudBlock { azure: Some(azure), .. } => Some(NodeCloud::Azure(azure)),
            _ => None,
        })
    }
}

impl From<Option<&NodeCloud>> for NodeCloudBlock {
    fn from(cloud: Option<&NodeCloud>) -> Self {
        let mut block = NodeCloudBlock::default();
        match cloud {
            Some(NodeCloud::Openstack(os)) => block.openstack = Some(os.clone()),
            Some(NodeCloud::Aws(aws)) => block.aws = Some(aws.clone()),
            Some(NodeCloud::Azure(azure)) => block.azure = Some(azure.clone()),
            None => {}
        }
        block
    }
}

/// serde adapter between `NodeCloudBlock` and `Option<NodeCloud>`
pub mod node_cloud {
    use super::{NodeCloud, NodeCloudBlock};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize as a block with one arm set
    pub fn serialize<S: Serializer>(value: &Option<NodeCloud>, serializer: S) -> Result<S::Ok, S::Error> {
        NodeCloudBlock::from(value.as_ref()).serialize(serializer)
    }

    /// Deserialize, rejecting more than one populated arm
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NodeCloud>, D::Error> {
        let block = Option::<NodeCloudBlock>::deserialize(deserializer)?.unwrap_or_default();
        block.select().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_block_selects_variant() {
        let block: CloudBlock = serde_json::from_value(json!({
            "aws": {"access_key_id": "id", "secret_access_key": "secret"}
        }))
        .unwrap();
        let cloud = block.select().unwrap().unwrap();
        assert_eq!(cloud.provider(), CloudProvider::Aws);
    }

    #[test]
    fn test_empty_block_selects_nothing() {
        let block: CloudBlock = serde_json::from_value(json!({})).unwrap();
        assert!(block.select().unwrap().is_none());
    }

    #[test]
    fn test_conflicting_blocks_are_rejected() {
        let block: NodeCloudBlock = serde_json::from_value(json!({
            "aws": {"instance_type": "t3.small", "disk_size": 25, "volume_type": "standard",
                    "availability_zone": "eu-central-1a", "subnet_id": "subnet-1"},
            "azure": {"size": "Standard_F2"}
        }))
        .unwrap();
        let err = block.select().unwrap_err();
        assert!(err.contains("aws, azure"), "unexpected message: {}", err);
    }

    #[test]
    fn test_bring_your_own_round_trips() {
        let block = CloudBlock::from(Some(&ClusterCloud::BringYourOwn));
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"bringyourown": {}})
        );
        assert_eq!(block.select().unwrap(), Some(ClusterCloud::BringYourOwn));
    }

    #[test]
    fn test_provider_display() {
        assert_eq!(CloudProvider::BringYourOwn.to_string(), "bringyourown");
        assert_eq!(CloudProvider::Openstack.to_string(), "openstack");
    }
}
