//! Node deployment lifecycle
//!
//! Node deployments are addressed as `project_id:cluster_id:node_deployment_id`.
//! The owning cluster may be referenced by its composite id or by its bare id
//! together with `project_id`.

use super::{found, reject, Observed, ResourceContext};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ProviderError;
use crate::identity::{encode, CompositeId, CLUSTER_LAYOUT, DELIMITER, NODE_DEPLOYMENT_LAYOUT};
use crate::mapper::{expand_node_deployment, expand_node_deployment_spec, flatten_node_deployment};
use crate::validator::{plan_node_deployment, validate_node_deployment, PlanAction};
use crate::waiter::Tick;
use metakube_client::{Cluster, MetaKubeError, NodeDeployment};
use metakube_schema::NodeDeploymentConfig;
use std::time::Duration;
use tracing::{debug, info};

/// Project and cluster owning a node deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRef {
    /// Owning project
    pub project_id: String,
    /// Bare cluster id
    pub cluster_id: String,
}

impl ClusterRef {
    /// Resolve the cluster reference of a node deployment tree
    pub fn resolve(cfg: &NodeDeploymentConfig) -> Result<Self, ProviderError> {
        let project_id = cfg.project_id.as_deref().filter(|p| !p.is_empty());

        if cfg.cluster_id.contains(DELIMITER) {
            let cluster = CompositeId::parse(&cfg.cluster_id, CLUSTER_LAYOUT)?;
            if let Some(project_id) = project_id {
                if project_id != cluster.container {
                    return Err(ProviderError::Validation(
                        Diagnostic::error("Project does not own the cluster")
                            .with_detail(format!(
                                "cluster {} belongs to project {}, not {}",
                                cfg.cluster_id, cluster.container, project_id
                            ))
                            .at("project_id")
                            .into(),
                    ));
                }
            }
            return Ok(Self {
                project_id: cluster.container,
                cluster_id: cluster.resource,
            });
        }

        let mut diags = Diagnostics::new();
        if cfg.cluster_id.is_empty() {
            diags.push(Diagnostic::error("Missing cluster").at("cluster_id"));
        }
        if project_id.is_none() {
            diags.push(
                Diagnostic::error("Missing project")
                    .with_detail(format!(
                        "project_id is required unless cluster_id has the form {}",
                        CLUSTER_LAYOUT
                    ))
                    .at("project_id"),
            );
        }
        reject(diags)?;
        Ok(Self {
            project_id: project_id.unwrap_or_default().to_string(),
            cluster_id: cfg.cluster_id.clone(),
        })
    }
}

/// Create, read, update, delete and import of `metakube_node_deployment`
#[derive(Debug, Clone)]
pub struct NodeDeploymentResource {
    ctx: ResourceContext,
}

impl NodeDeploymentResource {
    /// Operations sharing `ctx`
    pub fn new(ctx: ResourceContext) -> Self {
        Self { ctx }
    }

    /// Create a node deployment and wait for its replicas.
    ///
    /// The create call is retried while the cluster rejects it with a
    /// conflict, which happens while its control plane is still coming up.
    /// Once the node deployment exists, failures carry its id.
    pub async fn create(
        &self,
        cfg: &NodeDeploymentConfig,
    ) -> Result<Observed<NodeDeploymentConfig>, ProviderError> {
        let owner = ClusterRef::resolve(cfg)?;
        info!(
            "Creating node deployment in cluster {} of project {}",
            owner.cluster_id, owner.project_id
        );
        let client = self.ctx.client();

        let cluster = self.validate(cfg, &owner).await?;
        let body = expand_node_deployment(cfg, &cluster.spec.version)?;

        let waiter = self.ctx.waiter(self.ctx.timeouts.create);
        let created = waiter
            .retry_transient(&format!("node deployment in cluster {}", owner.cluster_id), || {
                client.create_machine_deployment(&owner.project_id, &owner.cluster_id, &body)
            })
            .await?;
        let id = encode(&owner.project_id, &owner.cluster_id, &created.id)?;
        info!("Created node deployment {}", id);

        self.complete_create(&id, cfg)
            .await
            .map_err(|e| ProviderError::partially_created(&id, e))
    }

    async fn complete_create(
        &self,
        id: &str,
        cfg: &NodeDeploymentConfig,
    ) -> Result<Observed<NodeDeploymentConfig>, ProviderError> {
        let addr = CompositeId::parse(id, NODE_DEPLOYMENT_LAYOUT)?;
        self.wait_ready(&addr, self.ctx.timeouts.create).await?;
        self.read_existing(id, Some(cfg)).await
    }

    /// Refresh a node deployment; `None` when it no longer exists.
    ///
    /// The cluster reference is kept in the form of `prior`. Without a prior
    /// tree (import) the bare cluster id and the project id are used.
    pub async fn read(
        &self,
        id: &str,
        prior: Option<&NodeDeploymentConfig>,
    ) -> Result<Option<Observed<NodeDeploymentConfig>>, ProviderError> {
        let addr = CompositeId::parse(id, NODE_DEPLOYMENT_LAYOUT)?;
        let client = self.ctx.client();

        let Some(deployment) = found(
            client
                .get_machine_deployment(&addr.container, &addr.location, &addr.resource)
                .await,
        )?
        else {
            info!("Node deployment {} not found, removing it from state", id);
            return Ok(None);
        };

        let (project_id, cluster_id) = match prior {
            Some(prior) => (prior.project_id.clone(), prior.cluster_id.clone()),
            None => (Some(addr.container.clone()), addr.location.clone()),
        };
        let cfg = flatten_node_deployment(&deployment, project_id, &cluster_id);
        Ok(Some(Observed {
            id: id.to_string(),
            config: cfg,
            diagnostics: Diagnostics::new(),
        }))
    }

    /// Patch the spec in place and wait for the rollout
    pub async fn update(
        &self,
        id: &str,
        prior: &NodeDeploymentConfig,
        planned: &NodeDeploymentConfig,
    ) -> Result<Observed<NodeDeploymentConfig>, ProviderError> {
        let addr = CompositeId::parse(id, NODE_DEPLOYMENT_LAYOUT)?;
        let client = self.ctx.client();
        info!("Updating node deployment {}", id);

        if let PlanAction::Replace { attributes } = plan_node_deployment(prior, planned) {
            let diags: Diagnostics = attributes
                .into_iter()
                .map(|attribute| {
                    Diagnostic::error("Attribute cannot be changed in place")
                        .with_detail("the node deployment has to be replaced to apply this change")
                        .at(attribute)
                })
                .collect();
            return Err(ProviderError::Validation(diags));
        }

        let owner = ClusterRef {
            project_id: addr.container.clone(),
            cluster_id: addr.location.clone(),
        };
        let cluster = self.validate(planned, &owner).await?;

        if prior.spec != planned.spec {
            let spec = expand_node_deployment_spec(&planned.spec, &cluster.spec.version)?;
            let spec = serde_json::to_value(spec).map_err(|e| ProviderError::SchemaMapping {
                path: "spec".to_string(),
                message: e.to_string(),
            })?;
            let patch = serde_json::json!({ "spec": spec });
            let waiter = self.ctx.waiter(self.ctx.timeouts.update);
            waiter
                .retry_transient(&format!("node deployment {}", id), || {
                    client.patch_machine_deployment(&addr.container, &addr.location, &addr.resource, &patch)
                })
                .await?;
            debug!("Patched node deployment {}", id);
        }

        self.wait_ready(&addr, self.ctx.timeouts.update).await?;
        self.read_existing(id, Some(planned)).await
    }

    /// Delete a node deployment and wait until it is gone
    pub async fn delete(&self, id: &str) -> Result<(), ProviderError> {
        let addr = CompositeId::parse(id, NODE_DEPLOYMENT_LAYOUT)?;
        let client = self.ctx.client();
        info!("Deleting node deployment {}", id);

        let waiter = self.ctx.waiter(self.ctx.timeouts.delete);
        waiter
            .wait_deleted(
                &format!("node deployment {}", id),
                || client.delete_machine_deployment(&addr.container, &addr.location, &addr.resource),
                || async {
                    let deployment = client
                        .get_machine_deployment(&addr.container, &addr.location, &addr.resource)
                        .await?;
                    Ok::<_, MetaKubeError>(Tick::pending(describe_rollout(&deployment)))
                },
            )
            .await?;
        info!("Deleted node deployment {}", id);
        Ok(())
    }

    /// Adopt an existing node deployment by id
    pub async fn import(&self, id: &str) -> Result<Observed<NodeDeploymentConfig>, ProviderError> {
        info!("Importing node deployment {}", id);
        self.read_existing(id, None).await
    }

    async fn read_existing(
        &self,
        id: &str,
        prior: Option<&NodeDeploymentConfig>,
    ) -> Result<Observed<NodeDeploymentConfig>, ProviderError> {
        self.read(id, prior).await?.ok_or_else(|| {
            ProviderError::Remote(MetaKubeError::NotFound(format!("node deployment {}", id)))
        })
    }

    /// Run the checks against the owning cluster and return it
    async fn validate(&self, cfg: &NodeDeploymentConfig, owner: &ClusterRef) -> Result<Cluster, ProviderError> {
        let client = self.ctx.client();
        let Some(cluster) = found(client.get_project_cluster(&owner.project_id, &owner.cluster_id).await)? else {
            return Err(ProviderError::Validation(
                Diagnostic::error("Unknown cluster")
                    .with_detail(format!(
                        "cluster {} does not exist in project {}",
                        owner.cluster_id, owner.project_id
                    ))
                    .at("cluster_id")
                    .into(),
            ));
        };
        let versions = client
            .list_node_upgrades(&owner.project_id, &owner.cluster_id)
            .await?;
        reject(validate_node_deployment(cfg, &cluster, &versions))?;
        Ok(cluster)
    }

    /// Block until every desired replica is updated, ready and available
    async fn wait_ready(&self, addr: &CompositeId, timeout: Duration) -> Result<(), ProviderError> {
        let client = self.ctx.client();
        let waiter = self.ctx.waiter(timeout);
        waiter
            .wait(&format!("node deployment {}", addr), || async {
                let deployment = client
                    .get_machine_deployment(&addr.container, &addr.location, &addr.resource)
                    .await?;
                let tick = if deployment.is_ready() {
                    Tick::Converged(())
                } else {
                    Tick::pending(describe_rollout(&deployment))
                };
                Ok::<_, MetaKubeError>(tick)
            })
            .await?;
        info!("Node deployment {} is ready", addr);
        Ok(())
    }
}

/// Replica counts, e.g. `1/3 ready, 2/3 updated, 1/3 available`
pub fn describe_rollout(deployment: &NodeDeployment) -> String {
    let desired = deployment.spec.replicas;
    match &deployment.status {
        Some(status) => format!(
            "{}/{d} ready, {}/{d} updated, {}/{d} available",
            status.ready_replicas,
            status.updated_replicas,
            status.available_replicas,
            d = desired
        ),
        None => format!("no status yet, {} replicas desired", desired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metakube_client::{NodeDeploymentSpec, NodeDeploymentStatus};

    fn cfg(project_id: Option<&str>, cluster_id: &str) -> NodeDeploymentConfig {
        NodeDeploymentConfig {
            project_id: project_id.map(str::to_string),
            cluster_id: cluster_id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_composite_cluster_id() {
        let owner = ClusterRef::resolve(&cfg(None, "p1:dbl1:cl1")).unwrap();
        assert_eq!(owner.project_id, "p1");
        assert_eq!(owner.cluster_id, "cl1");
    }

    #[test]
    fn test_resolve_bare_cluster_id_needs_project() {
        let owner = ClusterRef::resolve(&cfg(Some("p1"), "cl1")).unwrap();
        assert_eq!(owner.cluster_id, "cl1");
        match ClusterRef::resolve(&cfg(None, "cl1")) {
            Err(ProviderError::Validation(diags)) => {
                assert_eq!(diags.iter().next().unwrap().attribute.as_deref(), Some("project_id"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_resolve_rejects_foreign_project() {
        assert!(matches!(
            ClusterRef::resolve(&cfg(Some("p2"), "p1:dbl1:cl1")),
            Err(ProviderError::Validation(_))
        ));
        assert!(matches!(
            ClusterRef::resolve(&cfg(None, "p1:cl1")),
            Err(ProviderError::MalformedIdentity { .. })
        ));
    }

    #[test]
    fn test_describe_rollout() {
        let deployment = NodeDeployment {
            spec: NodeDeploymentSpec {
                replicas: 3,
                ..Default::default()
            },
            status: Some(NodeDeploymentStatus {
                replicas: 3,
                updated_replicas: 2,
                ready_replicas: 1,
                available_replicas: 1,
                unavailable_replicas: 2,
            }),
            ..Default::default()
        };
        assert_eq!(describe_rollout(&deployment), "1/3 ready, 2/3 updated, 1/3 available");
    }
}
