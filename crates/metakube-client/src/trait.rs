//! MetaKubeClient trait for mocking
//!
//! This trait abstracts the MetaKubeClient to enable mocking in unit tests.
//! The concrete MetaKubeClient implements this trait, and tests can use mock implementations.

use crate::error::MetaKubeError;
use crate::models::*;

/// Trait for MetaKube API client operations
///
/// Implementations are shared by every in-flight lifecycle operation, so all
/// methods take `&self` and must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait MetaKubeClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Validate the API token
    async fn validate_token(&self) -> Result<(), MetaKubeError>;

    // Datacenters and projects

    /// List every datacenter, seeds and node locations alike
    async fn list_datacenters(&self) -> Result<Vec<Datacenter>, MetaKubeError>;
    /// Get a project with its labels
    async fn get_project(&self, project_id: &str) -> Result<Project, MetaKubeError>;

    // Clusters, addressed through their seed datacenter

    /// Create a cluster in the seed `dc`
    async fn create_cluster(&self, project_id: &str, dc: &str, spec: &CreateClusterSpec) -> Result<Cluster, MetaKubeError>;
    /// Get a cluster; 404 once it is gone
    async fn get_cluster(&self, project_id: &str, dc: &str, cluster_id: &str) -> Result<Cluster, MetaKubeError>;
    /// Apply a JSON merge patch
    async fn patch_cluster(&self, project_id: &str, dc: &str, cluster_id: &str, patch: &serde_json::Value) -> Result<Cluster, MetaKubeError>;
    /// Start the deletion; the cluster stays readable until it is gone
    async fn delete_cluster(&self, project_id: &str, dc: &str, cluster_id: &str) -> Result<(), MetaKubeError>;
    /// Health of the control plane components
    async fn get_cluster_health(&self, project_id: &str, dc: &str, cluster_id: &str) -> Result<ClusterHealth, MetaKubeError>;
    /// Kubelet versions a node deployment of the cluster may run
    async fn list_node_upgrades(&self, project_id: &str, cluster_id: &str) -> Result<Vec<MasterVersion>, MetaKubeError>;

    // Clusters, addressed by project only

    /// Get a cluster without knowing its seed
    async fn get_project_cluster(&self, project_id: &str, cluster_id: &str) -> Result<Cluster, MetaKubeError>;

    // SSH keys

    /// Project SSH keys assigned to the cluster
    async fn list_ssh_keys_assigned_to_cluster(&self, project_id: &str, dc: &str, cluster_id: &str) -> Result<Vec<SshKey>, MetaKubeError>;
    /// Assign a project SSH key to the cluster
    async fn assign_ssh_key_to_cluster(&self, project_id: &str, dc: &str, cluster_id: &str, key_id: &str) -> Result<(), MetaKubeError>;
    /// Detach an SSH key; 404 when it is not assigned
    async fn detach_ssh_key_from_cluster(&self, project_id: &str, dc: &str, cluster_id: &str, key_id: &str) -> Result<(), MetaKubeError>;

    // Node deployments

    /// Create a node deployment; 409 while the cluster is not ready for it
    async fn create_machine_deployment(&self, project_id: &str, cluster_id: &str, deployment: &NodeDeployment) -> Result<NodeDeployment, MetaKubeError>;
    /// Get a node deployment with its replica status
    async fn get_machine_deployment(&self, project_id: &str, cluster_id: &str, deployment_id: &str) -> Result<NodeDeployment, MetaKubeError>;
    /// Apply a JSON merge patch
    async fn patch_machine_deployment(&self, project_id: &str, cluster_id: &str, deployment_id: &str, patch: &serde_json::Value) -> Result<NodeDeployment, MetaKubeError>;
    /// Delete a node deployment
    async fn delete_machine_deployment(&self, project_id: &str, cluster_id: &str, deployment_id: &str) -> Result<(), MetaKubeError>;
}
