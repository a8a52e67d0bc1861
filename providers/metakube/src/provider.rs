//! Resource dispatch
//!
//! The runtime hands over untyped trees and a resource type name. Each tree
//! is decoded once into its typed configuration; everything after that works
//! on the typed value.

use crate::config::{ResolvedConfig, Timeouts};
use crate::diagnostics::Diagnostics;
use crate::error::ProviderError;
use crate::resources::{ClusterResource, NodeDeploymentResource, Observed, ResourceContext};
use crate::validator::{plan_cluster, plan_node_deployment, PlanAction};
use metakube_client::{MetaKubeClient, MetaKubeClientTrait};
use metakube_schema::{ClusterConfig, NodeDeploymentConfig, ResourceConfig};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Resource types served by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    /// `metakube_cluster`
    Cluster,
    /// `metakube_node_deployment`
    NodeDeployment,
}

impl ResourceType {
    /// Every served type
    pub const ALL: [ResourceType; 2] = [ResourceType::Cluster, ResourceType::NodeDeployment];

    /// Type name as used by the runtime
    pub fn name(&self) -> &'static str {
        match self {
            ResourceType::Cluster => ClusterConfig::RESOURCE,
            ResourceType::NodeDeployment => NodeDeploymentConfig::RESOURCE,
        }
    }

    /// Look up a type by name
    pub fn from_name(name: &str) -> Result<Self, ProviderError> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ProviderError::InvalidConfig(format!("unknown resource type {}", name)))
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a lifecycle operation, tree form
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState {
    /// Composite id to record
    pub id: String,
    /// Refreshed tree
    pub state: Value,
    /// Warnings to surface alongside the state
    pub diagnostics: Diagnostics,
}

impl ResourceState {
    fn encode<T: ResourceConfig>(observed: Observed<T>) -> Result<Self, ProviderError> {
        Ok(Self {
            state: observed.config.to_tree()?,
            id: observed.id,
            diagnostics: observed.diagnostics,
        })
    }
}

/// Entry point of the reconciliation core
#[derive(Debug, Clone)]
pub struct Provider {
    clusters: ClusterResource,
    node_deployments: NodeDeploymentResource,
}

impl Provider {
    /// Serve both resource types from one context
    pub fn new(ctx: ResourceContext) -> Self {
        Self {
            clusters: ClusterResource::new(ctx.clone()),
            node_deployments: NodeDeploymentResource::new(ctx),
        }
    }

    /// Build the HTTP client from resolved configuration
    pub fn configure(config: &ResolvedConfig) -> Result<Self, ProviderError> {
        info!("Configuring MetaKube provider for {}", config.host);
        let client = MetaKubeClient::new(config.host.clone(), config.token.clone())?;
        Ok(Self::with_client(Arc::new(client), config.timeouts))
    }

    /// Use an existing client with the default clock
    pub fn with_client(client: Arc<dyn MetaKubeClientTrait>, timeouts: Timeouts) -> Self {
        Self::new(ResourceContext::new(client, timeouts))
    }

    /// Typed cluster operations
    pub fn clusters(&self) -> &ClusterResource {
        &self.clusters
    }

    /// Typed node deployment operations
    pub fn node_deployments(&self) -> &NodeDeploymentResource {
        &self.node_deployments
    }

    /// Create from a planned tree.
    ///
    /// When the remote resource was created before a later step failed, the
    /// error is [`ProviderError::PartiallyCreated`] and
    /// [`ProviderError::created_id`] gives the id to keep in state.
    pub async fn create(&self, type_name: &str, planned: &Value) -> Result<ResourceState, ProviderError> {
        match ResourceType::from_name(type_name)? {
            ResourceType::Cluster => {
                let cfg = ClusterConfig::from_tree(planned)?;
                ResourceState::encode(self.clusters.create(&cfg).await?)
            }
            ResourceType::NodeDeployment => {
                let cfg = NodeDeploymentConfig::from_tree(planned)?;
                ResourceState::encode(self.node_deployments.create(&cfg).await?)
            }
        }
    }

    /// Refresh; `None` tells the runtime to drop the resource from state
    pub async fn read(
        &self,
        type_name: &str,
        id: &str,
        prior: Option<&Value>,
    ) -> Result<Option<ResourceState>, ProviderError> {
        let observed = match ResourceType::from_name(type_name)? {
            ResourceType::Cluster => {
                let prior = prior.map(ClusterConfig::from_tree).transpose()?;
                match self.clusters.read(id, prior.as_ref()).await? {
                    Some(observed) => Some(ResourceState::encode(observed)?),
                    None => None,
                }
            }
            ResourceType::NodeDeployment => {
                let prior = prior.map(NodeDeploymentConfig::from_tree).transpose()?;
                match self.node_deployments.read(id, prior.as_ref()).await? {
                    Some(observed) => Some(ResourceState::encode(observed)?),
                    None => None,
                }
            }
        };
        Ok(observed)
    }

    /// Apply the planned tree over the prior one
    pub async fn update(
        &self,
        type_name: &str,
        id: &str,
        prior: &Value,
        planned: &Value,
    ) -> Result<ResourceState, ProviderError> {
        match ResourceType::from_name(type_name)? {
            ResourceType::Cluster => {
                let prior = ClusterConfig::from_tree(prior)?;
                let planned = ClusterConfig::from_tree(planned)?;
                ResourceState::encode(self.clusters.update(id, &prior, &planned).await?)
            }
            ResourceType::NodeDeployment => {
                let prior = NodeDeploymentConfig::from_tree(prior)?;
                let planned = NodeDeploymentConfig::from_tree(planned)?;
                ResourceState::encode(self.node_deployments.update(id, &prior, &planned).await?)
            }
        }
    }

    /// Delete and wait until gone; a missing resource is not an error
    pub async fn delete(&self, type_name: &str, id: &str) -> Result<(), ProviderError> {
        match ResourceType::from_name(type_name)? {
            ResourceType::Cluster => self.clusters.delete(id).await,
            ResourceType::NodeDeployment => self.node_deployments.delete(id).await,
        }
    }

    /// Adopt an existing resource by id
    pub async fn import(&self, type_name: &str, id: &str) -> Result<ResourceState, ProviderError> {
        match ResourceType::from_name(type_name)? {
            ResourceType::Cluster => ResourceState::encode(self.clusters.import(id).await?),
            ResourceType::NodeDeployment => ResourceState::encode(self.node_deployments.import(id).await?),
        }
    }

    /// How the planned tree can be applied over the prior one. No remote calls.
    pub fn plan(&self, type_name: &str, prior: &Value, planned: &Value) -> Result<PlanAction, ProviderError> {
        match ResourceType::from_name(type_name)? {
            ResourceType::Cluster => Ok(plan_cluster(
                &ClusterConfig::from_tree(prior)?,
                &ClusterConfig::from_tree(planned)?,
            )),
            ResourceType::NodeDeployment => Ok(plan_node_deployment(
                &NodeDeploymentConfig::from_tree(prior)?,
                &NodeDeploymentConfig::from_tree(planned)?,
            )),
        }
    }
}
