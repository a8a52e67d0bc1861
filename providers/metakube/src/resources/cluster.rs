//! Cluster lifecycle
//!
//! Clusters are addressed as `project_id:seed_dc:cluster_id`. The seed is the
//! one of the datacenter named in `dc_name` and is resolved once on create.

use super::{found, reject, Observed, ResourceContext};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ProviderError;
use crate::identity::{encode, CompositeId, CLUSTER_LAYOUT};
use crate::labels::exclude_project_labels;
use crate::mapper::{expand_cluster_spec, expand_create_cluster, flatten_cluster};
use crate::preserve::PreservedValues;
use crate::validator::{carry_computed, find_datacenter, plan_cluster, validate_cluster, PlanAction};
use crate::waiter::Tick;
use metakube_client::{ClusterHealth, HealthStatus, MetaKubeError};
use metakube_schema::ClusterConfig;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Create, read, update, delete and import of `metakube_cluster`
#[derive(Debug, Clone)]
pub struct ClusterResource {
    ctx: ResourceContext,
}

impl ClusterResource {
    /// Operations sharing `ctx`
    pub fn new(ctx: ResourceContext) -> Self {
        Self { ctx }
    }

    /// Create a cluster and wait for its control plane.
    ///
    /// SSH keys are assigned one by one after the cluster exists; a failing
    /// assignment stops the operation without undoing earlier ones. Any
    /// failure after the cluster exists comes back as
    /// [`ProviderError::PartiallyCreated`] carrying its id.
    pub async fn create(&self, cfg: &ClusterConfig) -> Result<Observed<ClusterConfig>, ProviderError> {
        info!("Creating cluster {} in project {}", cfg.name, cfg.project_id);
        let client = self.ctx.client();

        let datacenters = client.list_datacenters().await?;
        reject(validate_cluster(cfg, &datacenters))?;
        let provider = cfg.spec.cloud.as_ref().map(|c| c.provider());
        let dc = find_datacenter(&datacenters, &cfg.dc_name, provider)
            .map_err(|d| ProviderError::Validation(d.into()))?;
        let seed = dc.spec.seed.clone();

        let body = expand_create_cluster(cfg);
        let waiter = self.ctx.waiter(self.ctx.timeouts.create);
        let created = waiter
            .retry_transient(&format!("cluster {} in project {}", cfg.name, cfg.project_id), || {
                client.create_cluster(&cfg.project_id, &seed, &body)
            })
            .await?;
        let id = encode(&cfg.project_id, &seed, &created.id)?;
        info!("Created cluster {} ({})", cfg.name, id);

        self.complete_create(&id, cfg)
            .await
            .map_err(|e| ProviderError::partially_created(&id, e))
    }

    /// SSH keys, readiness and read back of a cluster that already exists
    async fn complete_create(
        &self,
        id: &str,
        cfg: &ClusterConfig,
    ) -> Result<Observed<ClusterConfig>, ProviderError> {
        let addr = CompositeId::parse(id, CLUSTER_LAYOUT)?;
        let client = self.ctx.client();
        for key in &cfg.sshkeys {
            debug!("Assigning SSH key {} to cluster {}", key, id);
            client
                .assign_ssh_key_to_cluster(&addr.container, &addr.location, &addr.resource, key)
                .await?;
        }

        self.wait_ready(&addr, self.ctx.timeouts.create).await?;
        self.read_existing(id, Some(cfg)).await
    }

    /// Refresh a cluster from the API.
    ///
    /// `prior` is the last known tree; its write-only values are carried
    /// over. Returns `None` when the cluster no longer exists.
    pub async fn read(
        &self,
        id: &str,
        prior: Option<&ClusterConfig>,
    ) -> Result<Option<Observed<ClusterConfig>>, ProviderError> {
        let addr = CompositeId::parse(id, CLUSTER_LAYOUT)?;
        let client = self.ctx.client();

        let Some(cluster) = found(
            client
                .get_cluster(&addr.container, &addr.location, &addr.resource)
                .await,
        )?
        else {
            info!("Cluster {} not found, removing it from state", id);
            return Ok(None);
        };

        let project = client.get_project(&addr.container).await?;
        let preserved = PreservedValues::capture(prior);
        let mut diags = Diagnostics::new();
        let mut cfg = flatten_cluster(&cluster, &addr.container, &preserved, &mut diags);
        cfg.labels = exclude_project_labels(&project.labels, cfg.labels);

        cfg.sshkeys = client
            .list_ssh_keys_assigned_to_cluster(&addr.container, &addr.location, &addr.resource)
            .await?
            .into_iter()
            .map(|key| key.id)
            .collect();

        if let Some(prior) = prior {
            if cfg.credential.is_none() {
                cfg.credential = prior.credential.clone();
            }
            if cfg.dc_name.is_empty() {
                cfg.dc_name = prior.dc_name.clone();
            }
            if cfg.cluster_type.is_empty() {
                cfg.cluster_type = prior.cluster_type.clone();
            }
        }

        for warning in diags.warnings() {
            warn!("Cluster {}: {}", id, warning);
        }
        Ok(Some(Observed {
            id: id.to_string(),
            config: cfg,
            diagnostics: diags,
        }))
    }

    /// Apply an in-place change.
    ///
    /// Name, labels and spec go out in a single PATCH, retried on conflicts.
    /// SSH keys are then reconciled one call per key.
    pub async fn update(
        &self,
        id: &str,
        prior: &ClusterConfig,
        planned: &ClusterConfig,
    ) -> Result<Observed<ClusterConfig>, ProviderError> {
        let addr = CompositeId::parse(id, CLUSTER_LAYOUT)?;
        let client = self.ctx.client();
        info!("Updating cluster {}", id);

        let datacenters = client.list_datacenters().await?;
        let mut diags = validate_cluster(planned, &datacenters);
        if let PlanAction::Replace { attributes } = plan_cluster(prior, planned) {
            for attribute in attributes {
                diags.push(
                    Diagnostic::error("Attribute cannot be changed in place")
                        .with_detail("the cluster has to be replaced to apply this change")
                        .at(attribute),
                );
            }
        }
        reject(diags)?;
        let planned = &carry_computed(prior, planned);

        if prior.name != planned.name || prior.labels != planned.labels || prior.spec != planned.spec {
            let patch = cluster_patch(prior, planned)?;
            let waiter = self.ctx.waiter(self.ctx.timeouts.update);
            waiter
                .retry_transient(&format!("cluster {}", id), || {
                    client.patch_cluster(&addr.container, &addr.location, &addr.resource, &patch)
                })
                .await?;
            debug!("Patched cluster {}", id);
        }

        self.sync_ssh_keys(&addr, &prior.sshkeys, &planned.sshkeys).await?;
        self.wait_ready(&addr, self.ctx.timeouts.update).await?;
        self.read_existing(id, Some(planned)).await
    }

    /// Delete a cluster and wait until it is gone
    pub async fn delete(&self, id: &str) -> Result<(), ProviderError> {
        let addr = CompositeId::parse(id, CLUSTER_LAYOUT)?;
        let client = self.ctx.client();
        info!("Deleting cluster {}", id);

        let waiter = self.ctx.waiter(self.ctx.timeouts.delete);
        waiter
            .wait_deleted(
                &format!("cluster {}", id),
                || client.delete_cluster(&addr.container, &addr.location, &addr.resource),
                || async {
                    let cluster = client
                        .get_cluster(&addr.container, &addr.location, &addr.resource)
                        .await?;
                    let since = cluster
                        .deletion_timestamp
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "unknown".to_string());
                    Ok::<_, MetaKubeError>(Tick::pending(format!("deletion in progress since {}", since)))
                },
            )
            .await?;
        info!("Deleted cluster {}", id);
        Ok(())
    }

    /// Adopt an existing cluster by id
    pub async fn import(&self, id: &str) -> Result<Observed<ClusterConfig>, ProviderError> {
        info!("Importing cluster {}", id);
        self.read_existing(id, None).await
    }

    async fn read_existing(
        &self,
        id: &str,
        prior: Option<&ClusterConfig>,
    ) -> Result<Observed<ClusterConfig>, ProviderError> {
        self.read(id, prior).await?.ok_or_else(|| {
            ProviderError::Remote(MetaKubeError::NotFound(format!("cluster {}", id)))
        })
    }

    /// Block until every control plane component reports up
    async fn wait_ready(&self, addr: &CompositeId, timeout: Duration) -> Result<(), ProviderError> {
        let client = self.ctx.client();
        let waiter = self.ctx.waiter(timeout);
        waiter
            .wait(&format!("cluster {}", addr), || async {
                let health = client
                    .get_cluster_health(&addr.container, &addr.location, &addr.resource)
                    .await?;
                let tick = if health.is_ready() {
                    Tick::Converged(())
                } else {
                    Tick::pending(describe_health(&health))
                };
                Ok::<_, MetaKubeError>(tick)
            })
            .await?;
        info!("Cluster {} is ready", addr);
        Ok(())
    }

    async fn sync_ssh_keys(
        &self,
        addr: &CompositeId,
        prior: &BTreeSet<String>,
        planned: &BTreeSet<String>,
    ) -> Result<(), ProviderError> {
        let client = self.ctx.client();
        for key in prior.difference(planned) {
            debug!("Detaching SSH key {} from cluster {}", key, addr);
            match client
                .detach_ssh_key_from_cluster(&addr.container, &addr.location, &addr.resource, key)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => debug!("SSH key {} was already detached", key),
                Err(e) => return Err(e.into()),
            }
        }
        for key in planned.difference(prior) {
            debug!("Assigning SSH key {} to cluster {}", key, addr);
            client
                .assign_ssh_key_to_cluster(&addr.container, &addr.location, &addr.resource, key)
                .await?;
        }
        Ok(())
    }
}

/// Merge patch carrying name, labels and spec.
///
/// Labels dropped from the tree are sent as `null` so the merge removes them.
fn cluster_patch(prior: &ClusterConfig, planned: &ClusterConfig) -> Result<serde_json::Value, ProviderError> {
    let mut labels = serde_json::Map::new();
    for key in prior.labels.keys() {
        if !planned.labels.contains_key(key) {
            labels.insert(key.clone(), serde_json::Value::Null);
        }
    }
    for (key, value) in &planned.labels {
        labels.insert(key.clone(), serde_json::Value::String(value.clone()));
    }
    let spec = serde_json::to_value(expand_cluster_spec(&planned.spec, &planned.dc_name)).map_err(|e| {
        ProviderError::SchemaMapping {
            path: "spec".to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(serde_json::json!({
        "name": planned.name,
        "labels": labels,
        "spec": spec,
    }))
}

/// Components that are not up yet, e.g. `etcd: provisioning, scheduler: down`
pub fn describe_health(health: &ClusterHealth) -> String {
    let components = [
        ("apiserver", health.apiserver),
        ("controller", health.controller),
        ("etcd", health.etcd),
        ("machine controller", health.machine_controller),
        ("scheduler", health.scheduler),
        ("cloud provider infrastructure", health.cloud_provider_infrastructure),
        ("user cluster controller manager", health.user_cluster_controller_manager),
    ];
    let pending: Vec<String> = components
        .iter()
        .filter(|(_, status)| *status != HealthStatus::Up)
        .map(|(name, status)| {
            let state = match status {
                HealthStatus::Down => "down",
                HealthStatus::Provisioning => "provisioning",
                HealthStatus::Up => "up",
            };
            format!("{}: {}", name, state)
        })
        .collect();
    if pending.is_empty() {
        "all components up".to_string()
    } else {
        pending.join(", ")
    }
}
