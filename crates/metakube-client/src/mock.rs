//! Mock MetaKubeClient for unit testing
//!
//! This module provides a mock implementation of MetaKubeClientTrait that can be used
//! in unit tests without requiring a running MetaKube API.
//!
//! Besides in-memory storage the mock can:
//! - script health snapshots per cluster (`push_health`)
//! - fail the next call of an operation (`fail_next`)
//! - keep a deleted cluster visible for a number of reads (`set_deletion_delay`)
//! - count calls per operation (`calls`)

use crate::error::MetaKubeError;
use crate::models::*;
use crate::metakube_trait::MetaKubeClientTrait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Failure the mock returns instead of performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// 404
    NotFound,
    /// 403
    Forbidden,
    /// 409
    Conflict,
    /// 401
    Unauthorized,
    /// Any other status, e.g. 500
    Status(u16),
}

impl MockFailure {
    fn into_error(self, op: &str) -> MetaKubeError {
        let status = match self {
            MockFailure::NotFound => 404,
            MockFailure::Forbidden => 403,
            MockFailure::Conflict => 409,
            MockFailure::Unauthorized => 401,
            MockFailure::Status(code) => code,
        };
        MetaKubeError::from_status(status, op, "mock failure")
    }
}

/// Mock MetaKubeClient for testing
///
/// This mock stores resources in memory and can be configured to return
/// specific responses for testing different scenarios.
#[derive(Clone, Debug)]
pub struct MockMetaKubeClient {
    base_url: String,
    // In-memory storage for resources
    datacenters: Arc<Mutex<Vec<Datacenter>>>,
    projects: Arc<Mutex<HashMap<String, Project>>>,
    clusters: Arc<Mutex<HashMap<String, Cluster>>>,
    health: Arc<Mutex<HashMap<String, VecDeque<ClusterHealth>>>>,
    ssh_keys: Arc<Mutex<HashMap<String, BTreeSet<String>>>>,
    node_upgrades: Arc<Mutex<Vec<MasterVersion>>>,
    deployments: Arc<Mutex<HashMap<String, NodeDeployment>>>,
    // Clusters being deleted -> remaining reads before they disappear
    deleting: Arc<Mutex<HashMap<String, u32>>>,
    deletion_delay: Arc<Mutex<u32>>,
    failures: Arc<Mutex<HashMap<String, VecDeque<MockFailure>>>>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
    last_patch: Arc<Mutex<Option<serde_json::Value>>>,
    // Counter for generating IDs
    next_id: Arc<Mutex<u64>>,
}

impl MockMetaKubeClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            datacenters: Arc::new(Mutex::new(Vec::new())),
            projects: Arc::new(Mutex::new(HashMap::new())),
            clusters: Arc::new(Mutex::new(HashMap::new())),
            health: Arc::new(Mutex::new(HashMap::new())),
            ssh_keys: Arc::new(Mutex::new(HashMap::new())),
            node_upgrades: Arc::new(Mutex::new(Vec::new())),
            deployments: Arc::new(Mutex::new(HashMap::new())),
            deleting: Arc::new(Mutex::new(HashMap::new())),
            deletion_delay: Arc::new(Mutex::new(0)),
            failures: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(HashMap::new())),
            last_patch: Arc::new(Mutex::new(None)),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Add a datacenter to the mock store (for test setup)
    pub fn add_datacenter(&self, datacenter: Datacenter) {
        lock(&self.datacenters).push(datacenter);
    }

    /// Add a project to the mock store (for test setup)
    pub fn add_project(&self, project: Project) {
        lock(&self.projects).insert(project.id.clone(), project);
    }

    /// Add a cluster to the mock store (for test setup)
    pub fn add_cluster(&self, cluster: Cluster) {
        lock(&self.clusters).insert(cluster.id.clone(), cluster);
    }

    /// Add a node deployment to the mock store (for test setup)
    pub fn add_deployment(&self, deployment: NodeDeployment) {
        lock(&self.deployments)
            .insert(deployment.id.clone(), deployment);
    }

    /// Set the versions returned by `list_node_upgrades`
    pub fn set_node_upgrades(&self, versions: Vec<MasterVersion>) {
        *lock(&self.node_upgrades) = versions;
    }

    /// Queue a health snapshot for a cluster.
    ///
    /// Snapshots are returned in order; the last one sticks. Without any
    /// queued snapshot the cluster reports healthy.
    pub fn push_health(&self, cluster_id: &str, health: ClusterHealth) {
        lock(&self.health)
            .entry(cluster_id.to_string())
            .or_default()
            .push_back(health);
    }

    /// Keep deleted clusters readable for `reads` further `get_cluster` calls
    pub fn set_deletion_delay(&self, reads: u32) {
        *lock(&self.deletion_delay) = reads;
    }

    /// Make the next call of `op` fail (calls are named after the trait methods)
    pub fn fail_next(&self, op: &str, failure: MockFailure) {
        lock(&self.failures)
            .entry(op.to_string())
            .or_default()
            .push_back(failure);
    }

    /// Number of calls made to `op`
    pub fn calls(&self, op: &str) -> usize {
        lock(&self.calls).get(op).copied().unwrap_or(0)
    }

    /// SSH key ids currently assigned to a cluster
    pub fn assigned_keys(&self, cluster_id: &str) -> BTreeSet<String> {
        lock(&self.ssh_keys)
            .get(cluster_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Body of the last PATCH call
    pub fn last_patch(&self) -> Option<serde_json::Value> {
        lock(&self.last_patch).clone()
    }

    /// Stored cluster, if any
    pub fn cluster(&self, cluster_id: &str) -> Option<Cluster> {
        lock(&self.clusters).get(cluster_id).cloned()
    }

    /// Stored node deployment, if any
    pub fn deployment(&self, deployment_id: &str) -> Option<NodeDeployment> {
        lock(&self.deployments).get(deployment_id).cloned()
    }

    /// Generate next ID
    fn next_id(&self, prefix: &str) -> String {
        let mut id = lock(&self.next_id);
        let current = *id;
        *id += 1;
        format!("{}{:04}", prefix, current)
    }

    /// Count the call and return a scripted failure, if any
    fn enter(&self, op: &str) -> Result<(), MetaKubeError> {
        *lock(&self.calls).entry(op.to_string()).or_insert(0) += 1;
        let failure = lock(&self.failures)
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(f) => Err(f.into_error(op)),
            None => Ok(()),
        }
    }

    fn not_found(kind: &str, id: &str) -> MetaKubeError {
        MetaKubeError::NotFound(format!("{} {} not found", kind, id))
    }

    fn lookup_cluster(&self, cluster_id: &str) -> Result<Cluster, MetaKubeError> {
        let mut deleting = lock(&self.deleting);
        if let Some(remaining) = deleting.get_mut(cluster_id) {
            if *remaining == 0 {
                deleting.remove(cluster_id);
                lock(&self.clusters).remove(cluster_id);
                return Err(Self::not_found("cluster", cluster_id));
            }
            *remaining -= 1;
        }
        lock(&self.clusters)
            .get(cluster_id)
            .cloned()
            .ok_or_else(|| Self::not_found("cluster", cluster_id))
    }
}

/// Apply a JSON merge patch (RFC 7386) in place
fn merge_patch(target: &mut serde_json::Value, patch: &serde_json::Value) {
    match patch {
        serde_json::Value::Object(entries) => {
            if !target.is_object() {
                *target = serde_json::Value::Object(serde_json::Map::new());
            }
            if let serde_json::Value::Object(map) = target {
                for (key, value) in entries {
                    if value.is_null() {
                        map.remove(key);
                    } else {
                        merge_patch(map.entry(key.clone()).or_insert(serde_json::Value::Null), value);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

#[async_trait::async_trait]
impl MetaKubeClientTrait for MockMetaKubeClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn validate_token(&self) -> Result<(), MetaKubeError> {
        self.enter("validate_token")
    }

    async fn list_datacenters(&self) -> Result<Vec<Datacenter>, MetaKubeError> {
        self.enter("list_datacenters")?;
        Ok(lock(&self.datacenters).clone())
    }

    async fn get_project(&self, project_id: &str) -> Result<Project, MetaKubeError> {
        self.enter("get_project")?;
        lock(&self.projects)
            .get(project_id)
            .cloned()
            .ok_or_else(|| Self::not_found("project", project_id))
    }

    async fn create_cluster(&self, project_id: &str, dc: &str, spec: &CreateClusterSpec) -> Result<Cluster, MetaKubeError> {
        self.enter("create_cluster")?;
        let mut cluster = spec.cluster.clone();
        cluster.id = self.next_id("cl");
        cluster.creation_timestamp = Some(chrono::Utc::now());
        // The API merges project labels into the cluster and never echoes secrets
        if let Some(project) = lock(&self.projects).get(project_id) {
            for (k, v) in &project.labels {
                cluster.labels.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        if let Some(os) = cluster.spec.cloud.openstack.as_mut() {
            os.username.clear();
            os.password.clear();
            os.tenant.clear();
        }
        if let Some(aws) = cluster.spec.cloud.aws.as_mut() {
            aws.access_key_id.clear();
            aws.secret_access_key.clear();
        }
        if let Some(azure) = cluster.spec.cloud.azure.as_mut() {
            azure.client_secret.clear();
        }
        let network = cluster
            .spec
            .cluster_network
            .get_or_insert_with(ClusterNetworkingConfig::default);
        if network.dns_domain.is_empty() {
            network.dns_domain = if spec.dns_domain.is_empty() {
                "cluster.local".to_string()
            } else {
                spec.dns_domain.clone()
            };
        }
        if network.pods.is_none() {
            let cidr = if spec.pods_cidr.is_empty() { "172.25.0.0/16" } else { spec.pods_cidr.as_str() };
            network.pods = Some(NetworkRanges { cidr_blocks: vec![cidr.to_string()] });
        }
        if network.services.is_none() {
            let cidr = if spec.services_cidr.is_empty() { "10.240.16.0/20" } else { spec.services_cidr.as_str() };
            network.services = Some(NetworkRanges { cidr_blocks: vec![cidr.to_string()] });
        }
        cluster.spec.cloud.datacenter_name = if cluster.spec.cloud.datacenter_name.is_empty() {
            dc.to_string()
        } else {
            cluster.spec.cloud.datacenter_name.clone()
        };
        lock(&self.clusters)
            .insert(cluster.id.clone(), cluster.clone());
        Ok(cluster)
    }

    async fn get_cluster(&self, _project_id: &str, _dc: &str, cluster_id: &str) -> Result<Cluster, MetaKubeError> {
        self.enter("get_cluster")?;
        self.lookup_cluster(cluster_id)
    }

    async fn patch_cluster(&self, _project_id: &str, _dc: &str, cluster_id: &str, patch: &serde_json::Value) -> Result<Cluster, MetaKubeError> {
        self.enter("patch_cluster")?;
        *lock(&self.last_patch) = Some(patch.clone());
        let mut clusters = lock(&self.clusters);
        let cluster = clusters
            .get_mut(cluster_id)
            .ok_or_else(|| Self::not_found("cluster", cluster_id))?;
        let mut value = serde_json::to_value(&*cluster)?;
        merge_patch(&mut value, patch);
        *cluster = serde_json::from_value(value)?;
        Ok(cluster.clone())
    }

    async fn delete_cluster(&self, _project_id: &str, _dc: &str, cluster_id: &str) -> Result<(), MetaKubeError> {
        self.enter("delete_cluster")?;
        {
            let mut clusters = lock(&self.clusters);
            let cluster = clusters
                .get_mut(cluster_id)
                .ok_or_else(|| Self::not_found("cluster", cluster_id))?;
            cluster.deletion_timestamp = Some(chrono::Utc::now());
        }
        let delay = *lock(&self.deletion_delay);
        lock(&self.deleting)
            .insert(cluster_id.to_string(), delay);
        Ok(())
    }

    async fn get_cluster_health(&self, _project_id: &str, _dc: &str, cluster_id: &str) -> Result<ClusterHealth, MetaKubeError> {
        self.enter("get_cluster_health")?;
        let mut health = lock(&self.health);
        let queue = health.entry(cluster_id.to_string()).or_default();
        let snapshot = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(snapshot.unwrap_or_else(ClusterHealth::all_up))
    }

    async fn list_node_upgrades(&self, _project_id: &str, _cluster_id: &str) -> Result<Vec<MasterVersion>, MetaKubeError> {
        self.enter("list_node_upgrades")?;
        Ok(lock(&self.node_upgrades).clone())
    }

    async fn get_project_cluster(&self, _project_id: &str, cluster_id: &str) -> Result<Cluster, MetaKubeError> {
        self.enter("get_project_cluster")?;
        lock(&self.clusters)
            .get(cluster_id)
            .cloned()
            .ok_or_else(|| Self::not_found("cluster", cluster_id))
    }

    async fn list_ssh_keys_assigned_to_cluster(&self, _project_id: &str, _dc: &str, cluster_id: &str) -> Result<Vec<SshKey>, MetaKubeError> {
        self.enter("list_ssh_keys_assigned_to_cluster")?;
        Ok(self
            .assigned_keys(cluster_id)
            .into_iter()
            .map(|id| SshKey {
                name: format!("key-{}", id),
                id,
                ..Default::default()
            })
            .collect())
    }

    async fn assign_ssh_key_to_cluster(&self, _project_id: &str, _dc: &str, cluster_id: &str, key_id: &str) -> Result<(), MetaKubeError> {
        self.enter("assign_ssh_key_to_cluster")?;
        lock(&self.ssh_keys)
            .entry(cluster_id.to_string())
            .or_default()
            .insert(key_id.to_string());
        Ok(())
    }

    async fn detach_ssh_key_from_cluster(&self, _project_id: &str, _dc: &str, cluster_id: &str, key_id: &str) -> Result<(), MetaKubeError> {
        self.enter("detach_ssh_key_from_cluster")?;
        let removed = lock(&self.ssh_keys)
            .get_mut(cluster_id)
            .map(|keys| keys.remove(key_id))
            .unwrap_or(false);
        if removed {
            Ok(())
        } else {
            Err(Self::not_found("ssh key", key_id))
        }
    }

    async fn create_machine_deployment(&self, _project_id: &str, _cluster_id: &str, deployment: &NodeDeployment) -> Result<NodeDeployment, MetaKubeError> {
        self.enter("create_machine_deployment")?;
        let mut created = deployment.clone();
        created.id = self.next_id("nd");
        if created.name.is_empty() {
            created.name = created.id.clone();
        }
        created.creation_timestamp = Some(chrono::Utc::now());
        let replicas = created.spec.replicas;
        created.status = Some(NodeDeploymentStatus {
            replicas,
            updated_replicas: replicas,
            ready_replicas: replicas,
            available_replicas: replicas,
            unavailable_replicas: 0,
        });
        self.add_deployment(created.clone());
        Ok(created)
    }

    async fn get_machine_deployment(&self, _project_id: &str, _cluster_id: &str, deployment_id: &str) -> Result<NodeDeployment, MetaKubeError> {
        self.enter("get_machine_deployment")?;
        self.deployment(deployment_id)
            .ok_or_else(|| Self::not_found("node deployment", deployment_id))
    }

    async fn patch_machine_deployment(&self, _project_id: &str, _cluster_id: &str, deployment_id: &str, patch: &serde_json::Value) -> Result<NodeDeployment, MetaKubeError> {
        self.enter("patch_machine_deployment")?;
        *lock(&self.last_patch) = Some(patch.clone());
        let mut deployments = lock(&self.deployments);
        let deployment = deployments
            .get_mut(deployment_id)
            .ok_or_else(|| Self::not_found("node deployment", deployment_id))?;
        let mut value = serde_json::to_value(&*deployment)?;
        merge_patch(&mut value, patch);
        *deployment = serde_json::from_value(value)?;
        let replicas = deployment.spec.replicas;
        if let Some(status) = deployment.status.as_mut() {
            status.replicas = replicas;
            status.updated_replicas = replicas;
            status.ready_replicas = replicas;
            status.available_replicas = replicas;
        }
        Ok(deployment.clone())
    }

    async fn delete_machine_deployment(&self, _project_id: &str, _cluster_id: &str, deployment_id: &str) -> Result<(), MetaKubeError> {
        self.enter("delete_machine_deployment")?;
        lock(&self.deployments)
            .remove(deployment_id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found("node deployment", deployment_id))
    }
}

/// Lock a store; a panicked test thread does not poison the mock for others
fn lock<T>(store: &Mutex<T>) -> MutexGuard<'_, T> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_failure_is_consumed_once() {
        let mock = MockMetaKubeClient::new("http://test-metakube");
        mock.fail_next("list_datacenters", MockFailure::Conflict);

        let first = mock.list_datacenters().await;
        assert!(matches!(first, Err(MetaKubeError::Conflict(_))));
        assert!(mock.list_datacenters().await.is_ok());
        assert_eq!(mock.calls("list_datacenters"), 2);
    }

    #[tokio::test]
    async fn test_health_snapshots_stick_to_last() {
        let mock = MockMetaKubeClient::new("http://test-metakube");
        mock.push_health("c1", ClusterHealth::default());
        mock.push_health("c1", ClusterHealth::all_up());

        assert!(!mock.get_cluster_health("p", "dc", "c1").await.unwrap().is_ready());
        assert!(mock.get_cluster_health("p", "dc", "c1").await.unwrap().is_ready());
        assert!(mock.get_cluster_health("p", "dc", "c1").await.unwrap().is_ready());
    }

    #[tokio::test]
    async fn test_deleted_cluster_disappears_after_delay() {
        let mock = MockMetaKubeClient::new("http://test-metakube");
        mock.add_cluster(Cluster {
            id: "c1".to_string(),
            name: "one".to_string(),
            ..Default::default()
        });
        mock.set_deletion_delay(1);

        mock.delete_cluster("p", "dc", "c1").await.unwrap();
        let pending = mock.get_cluster("p", "dc", "c1").await.unwrap();
        assert!(pending.deletion_timestamp.is_some());
        assert!(mock.get_cluster("p", "dc", "c1").await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_merge_patch_replaces_and_removes() {
        let mut target = serde_json::json!({"name": "a", "labels": {"x": "1", "y": "2"}});
        merge_patch(
            &mut target,
            &serde_json::json!({"name": "b", "labels": {"y": null, "z": "3"}}),
        );
        assert_eq!(
            target,
            serde_json::json!({"name": "b", "labels": {"x": "1", "z": "3"}})
        );
    }
}
