//! MetaKube API client
//!
//! Implements the MetaKube REST API client for the endpoints used by the provider.
//! Clusters are addressed through their seed datacenter under `/api/v1`,
//! node deployments through the project scoped `/api/v2` endpoints.

use crate::common::{segment, HttpClient};
use crate::error::MetaKubeError;
use crate::models::*;
use crate::metakube_trait::MetaKubeClientTrait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// MetaKube API client
#[derive(Debug, Clone)]
pub struct MetaKubeClient {
    http: HttpClient,
}

impl MetaKubeClient {
    /// Create a new MetaKube client
    ///
    /// # Arguments
    /// * `base_url` - MetaKube base URL (e.g., "https://metakube.syseleven.de")
    /// * `token` - API token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, MetaKubeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("metakube-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http: HttpClient::new(client, base_url, token),
        })
    }

    fn cluster_path(project_id: &str, dc: &str, cluster_id: &str) -> String {
        format!(
            "/api/v1/projects/{}/dc/{}/clusters/{}",
            segment(project_id),
            segment(dc),
            segment(cluster_id)
        )
    }

    fn machine_deployments_path(project_id: &str, cluster_id: &str) -> String {
        format!(
            "/api/v2/projects/{}/clusters/{}/machinedeployments",
            segment(project_id),
            segment(cluster_id)
        )
    }
}

#[async_trait::async_trait]
impl MetaKubeClientTrait for MetaKubeClient {
    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Validate the API token by listing projects.
    ///
    /// A 401/403 means the token is unusable; anything else is reported as is.
    async fn validate_token(&self) -> Result<(), MetaKubeError> {
        debug!("Validating MetaKube token and connectivity");
        let _: serde_json::Value = self.http.get("/api/v1/projects").await?;
        debug!("Token validated successfully");
        Ok(())
    }

    async fn list_datacenters(&self) -> Result<Vec<Datacenter>, MetaKubeError> {
        self.http.get("/api/v1/dc").await
    }

    async fn get_project(&self, project_id: &str) -> Result<Project, MetaKubeError> {
        self.http
            .get(&format!("/api/v1/projects/{}", segment(project_id)))
            .await
    }

    async fn create_cluster(&self, project_id: &str, dc: &str, spec: &CreateClusterSpec) -> Result<Cluster, MetaKubeError> {
        let path = format!(
            "/api/v1/projects/{}/dc/{}/clusters",
            segment(project_id),
            segment(dc)
        );
        self.http.post(&path, spec).await
    }

    async fn get_cluster(&self, project_id: &str, dc: &str, cluster_id: &str) -> Result<Cluster, MetaKubeError> {
        self.http
            .get(&Self::cluster_path(project_id, dc, cluster_id))
            .await
    }

    async fn patch_cluster(&self, project_id: &str, dc: &str, cluster_id: &str, patch: &serde_json::Value) -> Result<Cluster, MetaKubeError> {
        self.http
            .patch(&Self::cluster_path(project_id, dc, cluster_id), patch)
            .await
    }

    async fn delete_cluster(&self, project_id: &str, dc: &str, cluster_id: &str) -> Result<(), MetaKubeError> {
        self.http
            .delete(&Self::cluster_path(project_id, dc, cluster_id))
            .await
    }

    async fn get_cluster_health(&self, project_id: &str, dc: &str, cluster_id: &str) -> Result<ClusterHealth, MetaKubeError> {
        let path = format!("{}/health", Self::cluster_path(project_id, dc, cluster_id));
        self.http.get(&path).await
    }

    async fn list_node_upgrades(&self, project_id: &str, cluster_id: &str) -> Result<Vec<MasterVersion>, MetaKubeError> {
        let path = format!(
            "/api/v2/projects/{}/clusters/{}/nodeupgrades",
            segment(project_id),
            segment(cluster_id)
        );
        self.http.get(&path).await
    }

    async fn get_project_cluster(&self, project_id: &str, cluster_id: &str) -> Result<Cluster, MetaKubeError> {
        let path = format!(
            "/api/v2/projects/{}/clusters/{}",
            segment(project_id),
            segment(cluster_id)
        );
        self.http.get(&path).await
    }

    async fn list_ssh_keys_assigned_to_cluster(&self, project_id: &str, dc: &str, cluster_id: &str) -> Result<Vec<SshKey>, MetaKubeError> {
        let path = format!("{}/sshkeys", Self::cluster_path(project_id, dc, cluster_id));
        self.http.get(&path).await
    }

    async fn assign_ssh_key_to_cluster(&self, project_id: &str, dc: &str, cluster_id: &str, key_id: &str) -> Result<(), MetaKubeError> {
        let path = format!(
            "{}/sshkeys/{}",
            Self::cluster_path(project_id, dc, cluster_id),
            segment(key_id)
        );
        self.http.put_empty(&path).await
    }

    async fn detach_ssh_key_from_cluster(&self, project_id: &str, dc: &str, cluster_id: &str, key_id: &str) -> Result<(), MetaKubeError> {
        let path = format!(
            "{}/sshkeys/{}",
            Self::cluster_path(project_id, dc, cluster_id),
            segment(key_id)
        );
        self.http.delete(&path).await
    }

    async fn create_machine_deployment(&self, project_id: &str, cluster_id: &str, deployment: &NodeDeployment) -> Result<NodeDeployment, MetaKubeError> {
        self.http
            .post(&Self::machine_deployments_path(project_id, cluster_id), deployment)
            .await
    }

    async fn get_machine_deployment(&self, project_id: &str, cluster_id: &str, deployment_id: &str) -> Result<NodeDeployment, MetaKubeError> {
        let path = format!(
            "{}/{}",
            Self::machine_deployments_path(project_id, cluster_id),
            segment(deployment_id)
        );
        self.http.get(&path).await
    }

    async fn patch_machine_deployment(&self, project_id: &str, cluster_id: &str, deployment_id: &str, patch: &serde_json::Value) -> Result<NodeDeployment, MetaKubeError> {
        let path = format!(
            "{}/{}",
            Self::machine_deployments_path(project_id, cluster_id),
            segment(deployment_id)
        );
        self.http.patch(&path, patch).await
    }

    async fn delete_machine_deployment(&self, project_id: &str, cluster_id: &str, deployment_id: &str) -> Result<(), MetaKubeError> {
        let path = format!(
            "{}/{}",
            Self::machine_deployments_path(project_id, cluster_id),
            segment(deployment_id)
        );
        self.http.delete(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_trimmed() {
        let client = MetaKubeClient::new("https://metakube.example/".to_string(), "t".to_string())
            .unwrap();
        assert_eq!(client.base_url(), "https://metakube.example");
    }

    #[test]
    fn test_cluster_path_encodes_segments() {
        assert_eq!(
            MetaKubeClient::cluster_path("p1", "dbl1", "abc"),
            "/api/v1/projects/p1/dc/dbl1/clusters/abc"
        );
        assert_eq!(
            MetaKubeClient::cluster_path("p 1", "dbl1", "a/b"),
            "/api/v1/projects/p%201/dc/dbl1/clusters/a%2Fb"
        );
    }
}
