//! Configuration decode errors

use thiserror::Error;

/// Errors raised while turning a declarative tree into a typed configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The tree does not match the resource schema
    #[error("invalid {resource} configuration: {source}")]
    Decode {
        /// Resource type name, e.g. `metakube_cluster`
        resource: &'static str,
        /// Underlying serde error (names the offending field)
        #[source]
        source: serde_json::Error,
    },

    /// The typed configuration could not be written back as a tree
    #[error("failed to encode {resource} state: {source}")]
    Encode {
        /// Resource type name
        resource: &'static str,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },
}
