//! Cluster expand/flatten

use super::{flatten_cidr, non_empty, timestamp};
use crate::diagnostics::Diagnostics;
use crate::preserve::PreservedValues;
use metakube_client::{
    AuditLoggingSettings, AwsCloudSpec, AzureCloudSpec, BringYourOwnCloudSpec, CloudSpec,
    Cluster, ClusterNetworkingConfig, ClusterSpec, CreateClusterSpec, MachineNetworkingConfig,
    NetworkRanges, OpenstackCloudSpec,
};
use metakube_schema::{
    AwsCloudConfig, AzureCloudConfig, ClusterCloud, ClusterConfig, ClusterSpecConfig,
    MachineNetworkConfig, OpenstackCloudConfig,
};

/// Build the API cluster spec for datacenter `dc_name`
pub fn expand_cluster_spec(spec: &ClusterSpecConfig, dc_name: &str) -> ClusterSpec {
    ClusterSpec {
        version: spec.version.clone(),
        cloud: expand_cloud(spec.cloud.as_ref(), dc_name),
        cluster_network: expand_cluster_network(spec),
        machine_networks: spec.machine_networks.iter().map(expand_machine_network).collect(),
        audit_logging: Some(AuditLoggingSettings {
            enabled: spec.audit_logging,
        }),
        use_pod_security_policy_admission_plugin: spec.pod_security_policy,
        use_pod_node_selector_admission_plugin: spec.pod_node_selector,
    }
}

/// Build the create cluster request body.
///
/// The API takes the network parameters next to the cluster; they are also
/// left in the spec.
pub fn expand_create_cluster(cfg: &ClusterConfig) -> CreateClusterSpec {
    let spec = expand_cluster_spec(&cfg.spec, &cfg.dc_name);
    CreateClusterSpec {
        cluster: Cluster {
            name: cfg.name.clone(),
            labels: cfg.labels.clone(),
            cluster_type: cfg.cluster_type.clone(),
            credential: cfg.credential.clone().unwrap_or_default(),
            spec,
            ..Default::default()
        },
        dns_domain: cfg.spec.domain_name.clone().unwrap_or_default(),
        pods_cidr: cfg.spec.pods_cidr.clone().unwrap_or_default(),
        services_cidr: cfg.spec.services_cidr.clone().unwrap_or_default(),
    }
}

fn expand_cloud(cloud: Option<&ClusterCloud>, dc_name: &str) -> CloudSpec {
    let mut spec = CloudSpec {
        datacenter_name: dc_name.to_string(),
        ..Default::default()
    };
    match cloud {
        Some(ClusterCloud::Openstack(os)) => spec.openstack = Some(expand_openstack(os)),
        Some(ClusterCloud::Aws(aws)) => spec.aws = Some(expand_aws(aws)),
        Some(ClusterCloud::Azure(azure)) => spec.azure = Some(expand_azure(azure)),
        Some(ClusterCloud::BringYourOwn) => spec.bringyourown = Some(BringYourOwnCloudSpec {}),
        None => {}
    }
    spec
}

fn expand_openstack(os: &OpenstackCloudConfig) -> OpenstackCloudSpec {
    OpenstackCloudSpec {
        tenant: os.tenant.clone(),
        username: os.username.clone(),
        password: os.password.clone(),
        domain: String::new(),
        floating_ip_pool: os.floating_ip_pool.clone().unwrap_or_default(),
        security_groups: os.security_group.clone().unwrap_or_default(),
        network: os.network.clone().unwrap_or_default(),
        subnet_id: os.subnet_id.clone().unwrap_or_default(),
        subnet_cidr: os.subnet_cidr.clone().unwrap_or_default(),
    }
}

fn expand_aws(aws: &AwsCloudConfig) -> AwsCloudSpec {
    AwsCloudSpec {
        access_key_id: aws.access_key_id.clone(),
        secret_access_key: aws.secret_access_key.clone(),
        vpc_id: aws.vpc_id.clone(),
        security_group_id: aws.security_group_id.clone(),
        route_table_id: aws.route_table_id.clone(),
        instance_profile_name: aws.instance_profile_name.clone(),
        control_plane_role_arn: aws.role_arn.clone(),
        openstack_billing_tenant: aws.openstack_billing_tenant.clone(),
    }
}

fn expand_azure(azure: &AzureCloudConfig) -> AzureCloudSpec {
    AzureCloudSpec {
        availability_set: azure.availability_set.clone(),
        client_id: azure.client_id.clone(),
        client_secret: azure.client_secret.clone(),
        subscription_id: azure.subscription_id.clone(),
        tenant_id: azure.tenant_id.clone(),
        resource_group: azure.resource_group.clone().unwrap_or_default(),
        route_table_name: azure.route_table.clone().unwrap_or_default(),
        security_group: azure.security_group.clone().unwrap_or_default(),
        subnet_name: azure.subnet.clone().unwrap_or_default(),
        vnet_name: azure.vnet.clone().unwrap_or_default(),
    }
}

fn expand_cluster_network(spec: &ClusterSpecConfig) -> Option<ClusterNetworkingConfig> {
    if spec.services_cidr.is_none() && spec.pods_cidr.is_none() && spec.domain_name.is_none() {
        return None;
    }
    let ranges = |cidr: &Option<String>| {
        cidr.as_ref().map(|c| NetworkRanges {
            cidr_blocks: vec![c.clone()],
        })
    };
    Some(ClusterNetworkingConfig {
        dns_domain: spec.domain_name.clone().unwrap_or_default(),
        pods: ranges(&spec.pods_cidr),
        services: ranges(&spec.services_cidr),
    })
}

fn expand_machine_network(network: &MachineNetworkConfig) -> MachineNetworkingConfig {
    MachineNetworkingConfig {
        cidr: network.cidr.clone(),
        gateway: network.gateway.clone(),
        dns_servers: network.dns_servers.iter().cloned().collect(),
    }
}

/// Rebuild the spec block from an API reply.
///
/// Write-only fields come from `preserved`; extra CIDR blocks are dropped
/// with a warning.
pub fn flatten_cluster_spec(
    spec: &ClusterSpec,
    preserved: &PreservedValues,
    diags: &mut Diagnostics,
) -> ClusterSpecConfig {
    let network = spec.cluster_network.clone().unwrap_or_default();
    let blocks = |ranges: &Option<NetworkRanges>| {
        ranges
            .as_ref()
            .map(|r| r.cidr_blocks.clone())
            .unwrap_or_default()
    };

    ClusterSpecConfig {
        version: spec.version.clone(),
        cloud: flatten_cloud(&spec.cloud, preserved),
        machine_networks: spec.machine_networks.iter().map(flatten_machine_network).collect(),
        audit_logging: spec.audit_logging.as_ref().is_some_and(|a| a.enabled),
        pod_security_policy: spec.use_pod_security_policy_admission_plugin,
        pod_node_selector: spec.use_pod_node_selector_admission_plugin,
        services_cidr: flatten_cidr(&blocks(&network.services), "spec.services_cidr", diags),
        pods_cidr: flatten_cidr(&blocks(&network.pods), "spec.pods_cidr", diags),
        domain_name: non_empty(&network.dns_domain),
    }
}

/// Rebuild the whole cluster tree from an API reply.
///
/// Labels are taken as given, so project labels must already be removed.
/// SSH keys are listed separately and left empty here.
pub fn flatten_cluster(
    cluster: &Cluster,
    project_id: &str,
    preserved: &PreservedValues,
    diags: &mut Diagnostics,
) -> ClusterConfig {
    ClusterConfig {
        project_id: project_id.to_string(),
        dc_name: cluster.spec.cloud.datacenter_name.clone(),
        name: cluster.name.clone(),
        labels: cluster.labels.clone(),
        sshkeys: Default::default(),
        spec: flatten_cluster_spec(&cluster.spec, preserved, diags),
        credential: non_empty(&cluster.credential),
        cluster_type: cluster.cluster_type.clone(),
        creation_timestamp: timestamp(cluster.creation_timestamp.as_ref()),
        deletion_timestamp: timestamp(cluster.deletion_timestamp.as_ref()),
    }
}

fn flatten_cloud(cloud: &CloudSpec, preserved: &PreservedValues) -> Option<ClusterCloud> {
    if let Some(os) = &cloud.openstack {
        return Some(ClusterCloud::Openstack(flatten_openstack(os, preserved)));
    }
    if let Some(aws) = &cloud.aws {
        return Some(ClusterCloud::Aws(flatten_aws(aws, preserved)));
    }
    if let Some(azure) = &cloud.azure {
        return Some(ClusterCloud::Azure(flatten_azure(azure, preserved)));
    }
    cloud.bringyourown.as_ref().map(|_| ClusterCloud::BringYourOwn)
}

fn flatten_openstack(os: &OpenstackCloudSpec, preserved: &PreservedValues) -> OpenstackCloudConfig {
    let (username, password, tenant) = match preserved {
        PreservedValues::Openstack {
            username,
            password,
            tenant,
        } => (username.clone(), password.clone(), tenant.clone()),
        _ => (os.username.clone(), os.password.clone(), os.tenant.clone()),
    };
    OpenstackCloudConfig {
        tenant,
        username,
        password,
        floating_ip_pool: non_empty(&os.floating_ip_pool),
        security_group: non_empty(&os.security_groups),
        network: non_empty(&os.network),
        subnet_id: non_empty(&os.subnet_id),
        subnet_cidr: non_empty(&os.subnet_cidr),
    }
}

/// The reply value when set, otherwise the declared one
fn observed_or(observed: &str, declared: &str) -> String {
    if observed.is_empty() {
        declared.to_string()
    } else {
        observed.to_string()
    }
}

fn flatten_aws(aws: &AwsCloudSpec, preserved: &PreservedValues) -> AwsCloudConfig {
    let declared = match preserved {
        PreservedValues::Aws(declared) => declared.clone(),
        _ => AwsCloudConfig {
            access_key_id: aws.access_key_id.clone(),
            secret_access_key: aws.secret_access_key.clone(),
            ..Default::default()
        },
    };
    AwsCloudConfig {
        vpc_id: observed_or(&aws.vpc_id, &declared.vpc_id),
        security_group_id: observed_or(&aws.security_group_id, &declared.security_group_id),
        route_table_id: observed_or(&aws.route_table_id, &declared.route_table_id),
        instance_profile_name: observed_or(&aws.instance_profile_name, &declared.instance_profile_name),
        role_arn: observed_or(&aws.control_plane_role_arn, &declared.role_arn),
        openstack_billing_tenant: observed_or(
            &aws.openstack_billing_tenant,
            &declared.openstack_billing_tenant,
        ),
        ..declared
    }
}

fn flatten_azure(azure: &AzureCloudSpec, preserved: &PreservedValues) -> AzureCloudConfig {
    let declared = match preserved {
        PreservedValues::Azure(declared) => declared.clone(),
        _ => AzureCloudConfig {
            client_id: azure.client_id.clone(),
            client_secret: azure.client_secret.clone(),
            subscription_id: azure.subscription_id.clone(),
            tenant_id: azure.tenant_id.clone(),
            ..Default::default()
        },
    };
    let computed = |observed: &str, declared: &Option<String>| {
        non_empty(observed).or_else(|| declared.clone())
    };
    AzureCloudConfig {
        availability_set: observed_or(&azure.availability_set, &declared.availability_set),
        resource_group: computed(&azure.resource_group, &declared.resource_group),
        route_table: computed(&azure.route_table_name, &declared.route_table),
        security_group: computed(&azure.security_group, &declared.security_group),
        subnet: computed(&azure.subnet_name, &declared.subnet),
        vnet: computed(&azure.vnet_name, &declared.vnet),
        ..declared
    }
}

fn flatten_machine_network(network: &MachineNetworkingConfig) -> MachineNetworkConfig {
    MachineNetworkConfig {
        cidr: network.cidr.clone(),
        gateway: network.gateway.clone(),
        dns_servers: network.dns_servers.iter().cloned().collect(),
    }
}
