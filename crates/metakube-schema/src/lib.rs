//! MetaKube resource configuration
//!
//! Typed configuration structs for the `metakube_cluster` and
//! `metakube_node_deployment` resources. A declarative tree is decoded once
//! per lifecycle operation into these types; cloud provider selection is a
//! sum type, so a tree with two provider blocks never decodes.

pub mod cloud;
pub mod cluster;
pub mod error;
pub mod node_deployment;

pub use cloud::*;
pub use cluster::*;
pub use error::ConfigError;
pub use node_deployment::*;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A resource configuration that round-trips through a declarative tree
pub trait ResourceConfig: Serialize + DeserializeOwned {
    /// Resource type name as registered with the runtime
    const RESOURCE: &'static str;

    /// Decode a declarative tree
    fn from_tree(tree: &serde_json::Value) -> Result<Self, ConfigError> {
        Self::deserialize(tree).map_err(|source| ConfigError::Decode {
            resource: Self::RESOURCE,
            source,
        })
    }

    /// Encode back into a declarative tree
    fn to_tree(&self) -> Result<serde_json::Value, ConfigError> {
        serde_json::to_value(self).map_err(|source| ConfigError::Encode {
            resource: Self::RESOURCE,
            source,
        })
    }
}
