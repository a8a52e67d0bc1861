//! Write-only values kept across a refresh
//!
//! The API never echoes credentials back. Before a read overwrites the tree,
//! the values the user declared are captured here and put back into the
//! flattened result, so a refresh does not show a diff on them.

use metakube_schema::{AwsCloudConfig, AzureCloudConfig, ClusterCloud, ClusterConfig};

/// Snapshot of write-only cloud fields from the prior tree
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PreservedValues {
    /// No prior tree, or the prior tree had no credentials to keep
    #[default]
    Absent,
    /// OpenStack replies blank the credentials
    Openstack {
        /// OpenStack user
        username: String,
        /// OpenStack password
        password: String,
        /// OpenStack project
        tenant: String,
    },
    /// AWS replies omit the whole provider block
    Aws(AwsCloudConfig),
    /// Azure replies omit the whole provider block
    Azure(AzureCloudConfig),
}

impl PreservedValues {
    /// Capture the write-only fields of the prior tree, if there is one
    pub fn capture(prior: Option<&ClusterConfig>) -> Self {
        match prior.and_then(|cfg| cfg.spec.cloud.as_ref()) {
            Some(ClusterCloud::Openstack(os)) => PreservedValues::Openstack {
                username: os.username.clone(),
                password: os.password.clone(),
                tenant: os.tenant.clone(),
            },
            Some(ClusterCloud::Aws(aws)) => PreservedValues::Aws(aws.clone()),
            Some(ClusterCloud::Azure(azure)) => PreservedValues::Azure(azure.clone()),
            Some(ClusterCloud::BringYourOwn) | None => PreservedValues::Absent,
        }
    }

    /// True when nothing was captured
    pub fn is_absent(&self) -> bool {
        matches!(self, PreservedValues::Absent)
    }
}
