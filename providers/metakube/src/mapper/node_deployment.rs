//! Node deployment expand/flatten

use super::{non_empty, timestamp};
use crate::error::ProviderError;
use metakube_client::{
    AwsNodeSpec, AzureNodeSpec, CentOsSpec, FlatcarSpec, NodeCloudSpec, NodeDeployment,
    NodeDeploymentSpec, NodeSpec, NodeVersionInfo, OpenstackNodeSpec, OperatingSystemSpec,
    TaintSpec, UbuntuSpec,
};
use metakube_schema::{
    AwsNodeConfig, AzureNodeConfig, DistUpgradeConfig, FlatcarConfig, NodeCloud,
    NodeDeploymentConfig, NodeDeploymentSpecConfig, NodeTemplateConfig, NodeVersionsConfig,
    OpenstackNodeConfig, OperatingSystemConfig, TaintConfig,
};

const TAINT_EFFECTS: [&str; 3] = ["NoSchedule", "PreferNoSchedule", "NoExecute"];

/// Build the API node deployment.
///
/// `default_kubelet` is used when the template does not request a kubelet
/// version, normally the cluster version.
pub fn expand_node_deployment(
    cfg: &NodeDeploymentConfig,
    default_kubelet: &str,
) -> Result<NodeDeployment, ProviderError> {
    Ok(NodeDeployment {
        name: cfg.name.clone().unwrap_or_default(),
        spec: expand_node_deployment_spec(&cfg.spec, default_kubelet)?,
        ..Default::default()
    })
}

/// Expand the spec block; an absent kubelet version takes `default_kubelet`
pub fn expand_node_deployment_spec(
    spec: &NodeDeploymentSpecConfig,
    default_kubelet: &str,
) -> Result<NodeDeploymentSpec, ProviderError> {
    if spec.replicas < 0 {
        return Err(ProviderError::SchemaMapping {
            path: "spec.replicas".to_string(),
            message: format!("replicas must not be negative, got {}", spec.replicas),
        });
    }
    Ok(NodeDeploymentSpec {
        replicas: spec.replicas,
        template: expand_template(&spec.template, default_kubelet)?,
        dynamic_config: spec.dynamic_config,
    })
}

fn expand_template(
    template: &NodeTemplateConfig,
    default_kubelet: &str,
) -> Result<NodeSpec, ProviderError> {
    let taints = template
        .taints
        .iter()
        .map(expand_taint)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NodeSpec {
        cloud: expand_node_cloud(template.cloud.as_ref()),
        operating_system: template
            .operating_system
            .as_ref()
            .map(expand_operating_system)
            .unwrap_or_default(),
        versions: NodeVersionInfo {
            kubelet: template.kubelet().unwrap_or(default_kubelet).to_string(),
        },
        labels: template.labels.clone(),
        taints,
    })
}

fn expand_taint(taint: &TaintConfig) -> Result<TaintSpec, ProviderError> {
    if !TAINT_EFFECTS.contains(&taint.effect.as_str()) {
        return Err(ProviderError::SchemaMapping {
            path: "spec.template.taints.effect".to_string(),
            message: format!(
                "unsupported taint effect {:?}, expected one of {:?}",
                taint.effect, TAINT_EFFECTS
            ),
        });
    }
    Ok(TaintSpec {
        key: taint.key.clone(),
        value: taint.value.clone(),
        effect: taint.effect.clone(),
    })
}

fn expand_node_cloud(cloud: Option<&NodeCloud>) -> NodeCloudSpec {
    let mut spec = NodeCloudSpec::default();
    match cloud {
        Some(NodeCloud::Openstack(os)) => {
            spec.openstack = Some(OpenstackNodeSpec {
                flavor: os.flavor.clone(),
                image: os.image.clone(),
                root_disk_size_gb: os.disk_size,
                tags: os.tags.clone(),
                use_floating_ip: os.use_floating_ip,
                instance_ready_check_period: os.instance_ready_check_period.clone().unwrap_or_default(),
                instance_ready_check_timeout: os.instance_ready_check_timeout.clone().unwrap_or_default(),
            })
        }
        Some(NodeCloud::Aws(aws)) => {
            spec.aws = Some(AwsNodeSpec {
                instance_type: aws.instance_type.clone(),
                disk_size: aws.disk_size,
                volume_type: aws.volume_type.clone(),
                ami: aws.ami.clone().unwrap_or_default(),
                tags: aws.tags.clone(),
                availability_zone: aws.availability_zone.clone(),
                subnet_id: aws.subnet_id.clone(),
                assign_public_ip: aws.assign_public_ip,
            })
        }
        Some(NodeCloud::Azure(azure)) => {
            spec.azure = Some(AzureNodeSpec {
                size: azure.size.clone(),
                assign_public_ip: azure.assign_public_ip,
                disk_size_gb: azure.disk_size_gb,
                os_disk_size_gb: azure.os_disk_size_gb,
                tags: azure.tags.clone(),
                zones: azure.zones.clone(),
                image_id: azure.image_id.clone().unwrap_or_default(),
            })
        }
        None => {}
    }
    spec
}

fn expand_operating_system(os: &OperatingSystemConfig) -> OperatingSystemSpec {
    OperatingSystemSpec {
        ubuntu: os.ubuntu.as_ref().map(|u| UbuntuSpec {
            dist_upgrade_on_boot: u.dist_upgrade_on_boot,
        }),
        centos: os.centos.as_ref().map(|c| CentOsSpec {
            dist_upgrade_on_boot: c.dist_upgrade_on_boot,
        }),
        flatcar: os.flatcar.as_ref().map(|f| FlatcarSpec {
            disable_auto_update: f.disable_auto_update,
        }),
    }
}

/// Rebuild the spec block from an API reply
pub fn flatten_node_deployment_spec(spec: &NodeDeploymentSpec) -> NodeDeploymentSpecConfig {
    let template = &spec.template;
    NodeDeploymentSpecConfig {
        replicas: spec.replicas,
        dynamic_config: spec.dynamic_config,
        template: NodeTemplateConfig {
            labels: template.labels.clone(),
            cloud: flatten_node_cloud(&template.cloud),
            operating_system: flatten_operating_system(&template.operating_system),
            versions: non_empty(&template.versions.kubelet).map(|kubelet| NodeVersionsConfig {
                kubelet: Some(kubelet),
            }),
            taints: template
                .taints
                .iter()
                .map(|t| TaintConfig {
                    key: t.key.clone(),
                    value: t.value.clone(),
                    effect: t.effect.clone(),
                })
                .collect(),
        },
    }
}

/// Rebuild the node deployment tree.
///
/// `project_id` and `cluster_id` are the references the tree was declared
/// with; the API reply does not carry them.
pub fn flatten_node_deployment(
    deployment: &NodeDeployment,
    project_id: Option<String>,
    cluster_id: &str,
) -> NodeDeploymentConfig {
    NodeDeploymentConfig {
        project_id,
        cluster_id: cluster_id.to_string(),
        name: non_empty(&deployment.name),
        spec: flatten_node_deployment_spec(&deployment.spec),
        creation_timestamp: timestamp(deployment.creation_timestamp.as_ref()),
        deletion_timestamp: timestamp(deployment.deletion_timestamp.as_ref()),
    }
}

fn flatten_node_cloud(cloud: &NodeCloudSpec) -> Option<NodeCloud> {
    if let Some(os) = &cloud.openstack {
        return Some(NodeCloud::Openstack(OpenstackNodeConfig {
            flavor: os.flavor.clone(),
            image: os.image.clone(),
            disk_size: os.root_disk_size_gb,
            tags: os.tags.clone(),
            use_floating_ip: os.use_floating_ip,
            instance_ready_check_period: non_empty(&os.instance_ready_check_period),
            instance_ready_check_timeout: non_empty(&os.instance_ready_check_timeout),
        }));
    }
    if let Some(aws) = &cloud.aws {
        return Some(NodeCloud::Aws(AwsNodeConfig {
            instance_type: aws.instance_type.clone(),
            disk_size: aws.disk_size,
            volume_type: aws.volume_type.clone(),
            availability_zone: aws.availability_zone.clone(),
            subnet_id: aws.subnet_id.clone(),
            assign_public_ip: aws.assign_public_ip,
            ami: non_empty(&aws.ami),
            tags: aws.tags.clone(),
        }));
    }
    cloud.azure.as_ref().map(|azure| {
        NodeCloud::Azure(AzureNodeConfig {
            size: azure.size.clone(),
            assign_public_ip: azure.assign_public_ip,
            disk_size_gb: azure.disk_size_gb,
            os_disk_size_gb: azure.os_disk_size_gb,
            zones: azure.zones.clone(),
            image_id: non_empty(&azure.image_id),
            tags: azure.tags.clone(),
        })
    })
}

fn flatten_operating_system(os: &OperatingSystemSpec) -> Option<OperatingSystemConfig> {
    if os.ubuntu.is_none() && os.centos.is_none() && os.flatcar.is_none() {
        return None;
    }
    Some(OperatingSystemConfig {
        ubuntu: os.ubuntu.as_ref().map(|u| DistUpgradeConfig {
            dist_upgrade_on_boot: u.dist_upgrade_on_boot,
        }),
        centos: os.centos.as_ref().map(|c| DistUpgradeConfig {
            dist_upgrade_on_boot: c.dist_upgrade_on_boot,
        }),
        flatcar: os.flatcar.as_ref().map(|f| FlatcarConfig {
            disable_auto_update: f.disable_auto_update,
        }),
    })
}
