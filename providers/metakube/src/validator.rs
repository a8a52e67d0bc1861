//! Pre-flight validation
//!
//! Checks run before any mutating call. Every check adds to one diagnostics
//! batch instead of stopping at the first failure.

use crate::diagnostics::{Diagnostic, Diagnostics};
use metakube_client::{CloudSpec, Cluster, Datacenter, MasterVersion};
use metakube_schema::{CloudProvider, ClusterConfig, NodeDeploymentConfig};
use semver::Version;
use std::cmp::Ordering;

/// What applying a planned cluster tree requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    /// Planned and prior trees are equivalent
    NoChange,
    /// Every change can be patched
    UpdateInPlace,
    /// Changed attributes cannot be patched, the cluster must be recreated
    Replace {
        /// Dot separated paths of the create-only attributes that changed
        attributes: Vec<String>,
    },
}

/// Parse a version leniently: `v1.18`, `1.18` and `1.18.0` are all accepted
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    let core_len = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(core_len);
    let padded = match core.matches('.').count() {
        0 => format!("{}.0.0{}", core, rest),
        1 => format!("{}.0{}", core, rest),
        _ => trimmed.to_string(),
    };
    Version::parse(&padded).ok()
}

/// Compare two versions; `None` when either does not parse
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    Some(parse_version(a)?.cmp(&parse_version(b)?))
}

/// Provider of a cluster as reported by the API
pub fn cluster_provider(cloud: &CloudSpec) -> Option<CloudProvider> {
    if cloud.openstack.is_some() {
        Some(CloudProvider::Openstack)
    } else if cloud.aws.is_some() {
        Some(CloudProvider::Aws)
    } else if cloud.azure.is_some() {
        Some(CloudProvider::Azure)
    } else if cloud.bringyourown.is_some() {
        Some(CloudProvider::BringYourOwn)
    } else {
        None
    }
}

/// True when the datacenter can host clusters of `provider`
pub fn supports(dc: &Datacenter, provider: CloudProvider) -> bool {
    match provider {
        CloudProvider::Openstack => dc.spec.openstack.is_some(),
        CloudProvider::Aws => dc.spec.aws.is_some(),
        CloudProvider::Azure => dc.spec.azure.is_some(),
        CloudProvider::BringYourOwn => dc.spec.bringyourown.is_some(),
    }
}

/// Find the datacenter named `name` that supports `provider`.
///
/// Only datacenters with a seed can host a cluster. On failure the diagnostic
/// lists the datacenters that do support the provider.
pub fn find_datacenter<'a>(
    datacenters: &'a [Datacenter],
    name: &str,
    provider: Option<CloudProvider>,
) -> Result<&'a Datacenter, Diagnostic> {
    let named = datacenters
        .iter()
        .find(|dc| dc.metadata.name == name && !dc.spec.seed.is_empty());

    let Some(provider) = provider else {
        return named.ok_or_else(|| {
            Diagnostic::error("Unknown datacenter")
                .with_detail(format!("datacenter {} does not exist", name))
                .at("dc_name")
        });
    };

    let available: Vec<&str> = datacenters
        .iter()
        .filter(|dc| supports(dc, provider))
        .map(|dc| dc.metadata.name.as_str())
        .collect();
    let detail = format!(
        "Please select one of available datacenters for the provider {} - [{}]",
        provider,
        available.join(", ")
    );

    match named {
        Some(dc) if supports(dc, provider) => Ok(dc),
        Some(_) => Err(Diagnostic::error(format!(
            "Datacenter {} does not support provider {}",
            name, provider
        ))
        .with_detail(detail)
        .at("dc_name")),
        None => Err(Diagnostic::error("Unknown datacenter")
            .with_detail(detail)
            .at("dc_name")),
    }
}

/// Checks for cluster create and update
pub fn validate_cluster(cfg: &ClusterConfig, datacenters: &[Datacenter]) -> Diagnostics {
    let mut diags = Diagnostics::new();
    let provider = cfg.spec.cloud.as_ref().map(|c| c.provider());

    if provider.is_none() {
        diags.push(
            Diagnostic::error("No cloud provider selected")
                .with_detail("exactly one of openstack, aws, azure or bringyourown must be set")
                .at("spec.cloud"),
        );
    }
    if let Err(diag) = find_datacenter(datacenters, &cfg.dc_name, provider) {
        diags.push(diag);
    }
    diags
}

/// `planned` with computed values it leaves unset taken from `prior`
pub fn carry_computed(prior: &ClusterConfig, planned: &ClusterConfig) -> ClusterConfig {
    let mut normalized = planned.clone();
    normalized.creation_timestamp = prior.creation_timestamp.clone();
    normalized.deletion_timestamp = prior.deletion_timestamp.clone();
    if normalized.credential.is_none() {
        normalized.credential = prior.credential.clone();
    }
    let spec = &mut normalized.spec;
    if spec.services_cidr.is_none() {
        spec.services_cidr = prior.spec.services_cidr.clone();
    }
    if spec.pods_cidr.is_none() {
        spec.pods_cidr = prior.spec.pods_cidr.clone();
    }
    if spec.domain_name.is_none() {
        spec.domain_name = prior.spec.domain_name.clone();
    }
    normalized
}

/// Decide how a planned cluster tree can be applied over the prior one.
///
/// A version decrease or a change of any create-only attribute forces
/// replacement. Computed attributes left unset in the plan keep their prior
/// value and are not a change. Versions that do not parse never force
/// replacement.
pub fn plan_cluster(prior: &ClusterConfig, planned: &ClusterConfig) -> PlanAction {
    let mut attributes = Vec::new();
    let mut changed = |name: &str, differs: bool| {
        if differs {
            attributes.push(name.to_string());
        }
    };

    changed("project_id", prior.project_id != planned.project_id);
    changed("dc_name", prior.dc_name != planned.dc_name);
    changed("type", prior.cluster_type != planned.cluster_type);
    changed(
        "spec.cloud",
        prior.spec.cloud.as_ref().map(|c| c.provider()) != planned.spec.cloud.as_ref().map(|c| c.provider()),
    );
    changed("spec.machine_networks", prior.spec.machine_networks != planned.spec.machine_networks);
    for (name, before, after) in [
        ("spec.services_cidr", &prior.spec.services_cidr, &planned.spec.services_cidr),
        ("spec.pods_cidr", &prior.spec.pods_cidr, &planned.spec.pods_cidr),
        ("spec.domain_name", &prior.spec.domain_name, &planned.spec.domain_name),
    ] {
        changed(name, after.is_some() && before != after);
    }
    changed(
        "spec.version",
        compare_versions(&planned.spec.version, &prior.spec.version) == Some(Ordering::Less),
    );

    if !attributes.is_empty() {
        return PlanAction::Replace { attributes };
    }

    if &carry_computed(prior, planned) == prior {
        PlanAction::NoChange
    } else {
        PlanAction::UpdateInPlace
    }
}

/// Decide how a planned node deployment tree can be applied over the prior one.
///
/// Moving a node deployment to another cluster or project means recreating it.
pub fn plan_node_deployment(prior: &NodeDeploymentConfig, planned: &NodeDeploymentConfig) -> PlanAction {
    let mut attributes = Vec::new();
    if prior.cluster_id != planned.cluster_id {
        attributes.push("cluster_id".to_string());
    }
    if planned.project_id.is_some() && prior.project_id != planned.project_id {
        attributes.push("project_id".to_string());
    }
    if !attributes.is_empty() {
        return PlanAction::Replace { attributes };
    }
    if prior.name == planned.name && prior.spec == planned.spec {
        PlanAction::NoChange
    } else {
        PlanAction::UpdateInPlace
    }
}

/// Checks for node deployment create and update against the owning cluster.
///
/// `available` is the version list the API advertises for the cluster.
pub fn validate_node_deployment(
    cfg: &NodeDeploymentConfig,
    cluster: &Cluster,
    available: &[MasterVersion],
) -> Diagnostics {
    let mut diags = Diagnostics::new();
    let template = &cfg.spec.template;

    match (
        template.cloud.as_ref().map(|c| c.provider()),
        cluster_provider(&cluster.spec.cloud),
    ) {
        (None, _) => diags.push(
            Diagnostic::error("No cloud provider selected")
                .with_detail("exactly one of openstack, aws or azure must be set")
                .at("spec.template.cloud"),
        ),
        (Some(provider), Some(expected)) if provider != expected => diags.push(
            Diagnostic::error(format!(
                "provider for node deployment must ({}) match cluster provider ({})",
                provider, expected
            ))
            .at("spec.template.cloud"),
        ),
        _ => {}
    }

    if let Some(kubelet) = template.kubelet() {
        let cluster_version = &cluster.spec.version;
        if compare_versions(kubelet, cluster_version) == Some(Ordering::Greater) {
            diags.push(
                Diagnostic::error(format!(
                    "node deployment kubelet version {} cannot be greater than cluster version {}",
                    kubelet, cluster_version
                ))
                .at("spec.template.versions.kubelet"),
            );
        }

        let advertised = available.iter().any(|v| {
            v.version == kubelet || compare_versions(&v.version, kubelet) == Some(Ordering::Equal)
        });
        if !advertised {
            let versions: Vec<&str> = available.iter().map(|v| v.version.as_str()).collect();
            diags.push(
                Diagnostic::error(format!(
                    "unknown version for node deployment {}, available versions [{}]",
                    kubelet,
                    versions.join(", ")
                ))
                .at("spec.template.versions.kubelet"),
            );
        }
    }

    diags
}
