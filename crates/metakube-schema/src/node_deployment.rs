//! Node deployment resource configuration

use crate::cloud::{node_cloud, NodeCloud, NodeCloudBlock};
use crate::ResourceConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_replicas() -> i32 {
    1
}

/// `metakube_node_deployment` tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NodeDeploymentConfig {
    /// Project of the owning cluster; optional when `cluster_id` is a composite id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Owning cluster, either `project:seed:cluster` or a bare cluster id
    pub cluster_id: String,

    /// Node deployment name; generated by the API when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Node deployment specification
    pub spec: NodeDeploymentSpecConfig,

    /// Creation timestamp (computed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,

    /// Deletion timestamp (computed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<String>,
}

impl ResourceConfig for NodeDeploymentConfig {
    const RESOURCE: &'static str = "metakube_node_deployment";
}

/// Node deployment specification block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NodeDeploymentSpecConfig {
    /// Number of nodes
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Template applied to every node
    pub template: NodeTemplateConfig,

    /// Enable dynamic kubelet config
    #[serde(default)]
    pub dynamic_config: bool,
}

/// Node template block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NodeTemplateConfig {
    /// Kubernetes labels set on every node
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Cloud provider block; must match the cluster provider
    #[serde(default, with = "node_cloud")]
    #[schemars(with = "NodeCloudBlock")]
    pub cloud: Option<NodeCloud>,

    /// Operating system; the API default image when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<OperatingSystemConfig>,

    /// Component versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<NodeVersionsConfig>,

    /// Node taints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<TaintConfig>,
}

impl NodeTemplateConfig {
    /// Requested kubelet version, if any
    pub fn kubelet(&self) -> Option<&str> {
        self.versions
            .as_ref()
            .and_then(|v| v.kubelet.as_deref())
            .filter(|v| !v.is_empty())
    }
}

/// Operating system block; at most one distribution is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperatingSystemConfig {
    /// Ubuntu nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ubuntu: Option<DistUpgradeConfig>,

    /// CentOS nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centos: Option<DistUpgradeConfig>,

    /// Flatcar nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatcar: Option<FlatcarConfig>,
}

/// Ubuntu and CentOS settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DistUpgradeConfig {
    /// Upgrade the distribution on first boot
    #[serde(default)]
    pub dist_upgrade_on_boot: bool,
}

/// Flatcar settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlatcarConfig {
    /// Disable automatic updates
    #[serde(default)]
    pub disable_auto_update: bool,
}

/// Versions block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NodeVersionsConfig {
    /// Kubelet version; defaults to the cluster version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<String>,
}

/// Node taint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaintConfig {
    /// Taint key
    pub key: String,
    /// Taint value, may be empty
    #[serde(default)]
    pub value: String,
    /// `NoSchedule`, `PreferNoSchedule` or `NoExecute`
    pub effect: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CloudProvider;
    use serde_json::json;

    #[test]
    fn test_decode_node_deployment() {
        let tree = json!({
            "cluster_id": "p1:dbl1:cl1",
            "spec": {
                "template": {
                    "cloud": {"azure": {"size": "Standard_F2"}},
                    "versions": {"kubelet": "1.18.8"}
                }
            }
        });
        let cfg = NodeDeploymentConfig::from_tree(&tree).unwrap();
        assert_eq!(cfg.spec.replicas, 1);
        assert_eq!(cfg.spec.template.kubelet(), Some("1.18.8"));
        assert_eq!(
            cfg.spec.template.cloud.as_ref().map(NodeCloud::provider),
            Some(CloudProvider::Azure)
        );
    }

    #[test]
    fn test_empty_kubelet_is_unset() {
        let template = NodeTemplateConfig {
            versions: Some(NodeVersionsConfig { kubelet: Some(String::new()) }),
            ..Default::default()
        };
        assert_eq!(template.kubelet(), None);
    }

    #[test]
    fn test_decode_error_names_resource() {
        let err = NodeDeploymentConfig::from_tree(&json!({"spec": {}})).unwrap_err();
        assert!(err.to_string().starts_with("invalid metakube_node_deployment configuration"));
    }
}
