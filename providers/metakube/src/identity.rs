//! Composite resource identities
//!
//! Remote resources are addressed by three ids (for example project, seed
//! datacenter and cluster). They are joined with `:` into the single string
//! the runtime stores as the resource id. Parts must be non-empty and must not
//! contain the delimiter; there is no escaping.

use crate::error::ProviderError;
use std::fmt;
use std::str::FromStr;

/// Delimiter between the parts of a composite id
pub const DELIMITER: char = ':';

/// Layout of a cluster id
pub const CLUSTER_LAYOUT: &str = "project_id:seed_dc:cluster_id";

/// Layout of a node deployment id
pub const NODE_DEPLOYMENT_LAYOUT: &str = "project_id:cluster_id:node_deployment_id";

const GENERIC_LAYOUT: &str = "container:location:resource";

/// Decoded composite id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeId {
    /// Project
    pub container: String,
    /// Seed datacenter or owning cluster
    pub location: String,
    /// Id of the resource itself
    pub resource: String,
}

impl CompositeId {
    /// Build an id, rejecting empty parts and parts containing the delimiter
    pub fn new(
        container: impl Into<String>,
        location: impl Into<String>,
        resource: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let id = Self {
            container: container.into(),
            location: location.into(),
            resource: resource.into(),
        };
        for (name, part) in [
            ("container", &id.container),
            ("location", &id.location),
            ("resource", &id.resource),
        ] {
            if part.is_empty() {
                return Err(ProviderError::MalformedIdentity {
                    id: id.joined(),
                    reason: format!("{} part is empty", name),
                });
            }
            if part.contains(DELIMITER) {
                return Err(ProviderError::MalformedIdentity {
                    id: id.joined(),
                    reason: format!("{} part {:?} contains '{}'", name, part, DELIMITER),
                });
            }
        }
        Ok(id)
    }

    /// Decode an id, naming `layout` in the error
    pub fn parse(id: &str, layout: &str) -> Result<Self, ProviderError> {
        let malformed = || ProviderError::MalformedIdentity {
            id: id.to_string(),
            reason: format!("expected {}", layout),
        };
        let parts: Vec<&str> = id.split(DELIMITER).collect();
        match parts.as_slice() {
            [container, location, resource]
                if !container.is_empty() && !location.is_empty() && !resource.is_empty() =>
            {
                Ok(Self {
                    container: (*container).to_string(),
                    location: (*location).to_string(),
                    resource: (*resource).to_string(),
                })
            }
            _ => Err(malformed()),
        }
    }

    fn joined(&self) -> String {
        format!(
            "{}{d}{}{d}{}",
            self.container,
            self.location,
            self.resource,
            d = DELIMITER
        )
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

impl FromStr for CompositeId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, GENERIC_LAYOUT)
    }
}

/// Join three parts into an id string
pub fn encode(container: &str, location: &str, resource: &str) -> Result<String, ProviderError> {
    CompositeId::new(container, location, resource).map(|id| id.to_string())
}

/// Split an id string into its three parts
pub fn decode(id: &str) -> Result<CompositeId, ProviderError> {
    id.parse()
}
