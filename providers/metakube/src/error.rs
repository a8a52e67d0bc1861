//! Provider error types.
//!
//! Every lifecycle operation returns `ProviderError`; the runtime turns it
//! into a diagnostics batch with [`ProviderError::into_diagnostics`].

use crate::diagnostics::{Diagnostic, Diagnostics};
use metakube_client::MetaKubeError;
use metakube_schema::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Resource identity does not decode; no remote call was made
    #[error("malformed identity {id:?}: {reason}")]
    MalformedIdentity {
        /// The id as received
        id: String,
        /// What is wrong, including the expected layout
        reason: String,
    },

    /// One or more validation checks failed
    #[error("validation failed: {0}")]
    Validation(Diagnostics),

    /// MetaKube API error
    #[error("MetaKube error: {0}")]
    Remote(#[from] MetaKubeError),

    /// A remote call failed permanently while waiting for a resource
    #[error("{resource}: {source}")]
    ConvergenceFailed {
        /// Resource being waited for, e.g. `cluster p1:dbl1:abc`
        resource: String,
        /// Error of the last remote call
        #[source]
        source: MetaKubeError,
    },

    /// Deadline exceeded before the resource converged
    #[error("timeout after {timeout:?} waiting for {resource}, last observed: {last_observed}")]
    ConvergenceTimeout {
        /// Resource being waited for
        resource: String,
        /// Deadline that was exceeded
        timeout: Duration,
        /// Last pending observation, e.g. the components still down
        last_observed: String,
    },

    /// The operation was cancelled by the caller
    #[error("waiting for {resource} was cancelled")]
    Cancelled {
        /// Resource being waited for
        resource: String,
    },

    /// The remote create succeeded but a later step failed.
    ///
    /// `id` names the resource that now exists remotely; the runtime has to
    /// record it so the next run does not create a second one.
    #[error("{id} was created but did not complete: {source}")]
    PartiallyCreated {
        /// Composite id of the created resource
        id: String,
        /// Failure of the step after the create
        #[source]
        source: Box<ProviderError>,
    },

    /// Expand or flatten hit a shape it cannot represent
    #[error("cannot map {path}: {message}")]
    SchemaMapping {
        /// Attribute path, dot separated
        path: String,
        /// What could not be mapped
        message: String,
    },

    /// Invalid provider configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ConfigError> for ProviderError {
    fn from(err: ConfigError) -> Self {
        let path = match &err {
            ConfigError::Decode { resource, .. } | ConfigError::Encode { resource, .. } => {
                (*resource).to_string()
            }
        };
        ProviderError::SchemaMapping {
            path,
            message: err.to_string(),
        }
    }
}

impl ProviderError {
    /// HTTP-like status of the underlying remote error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Remote(e) | ProviderError::ConvergenceFailed { source: e, .. } => e.status(),
            ProviderError::PartiallyCreated { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Wrap a failure that happened after the remote create succeeded
    pub fn partially_created(id: impl Into<String>, source: ProviderError) -> Self {
        ProviderError::PartiallyCreated {
            id: id.into(),
            source: Box::new(source),
        }
    }

    /// Id of a resource that exists remotely despite the error
    pub fn created_id(&self) -> Option<&str> {
        match self {
            ProviderError::PartiallyCreated { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }

    /// Convert into the diagnostics batch surfaced to the user
    pub fn into_diagnostics(self) -> Diagnostics {
        match self {
            ProviderError::Validation(diags) => diags,
            ProviderError::SchemaMapping { path, message } => {
                Diagnostic::error("Invalid value").with_detail(message).at(path).into()
            }
            ProviderError::ConvergenceTimeout { resource, timeout, last_observed } => {
                Diagnostic::error(format!("{} did not converge in time", resource))
                    .with_detail(format!("gave up after {:?}, last observed: {}", timeout, last_observed))
                    .into()
            }
            ProviderError::PartiallyCreated { id, source } => {
                let mut diags = source.into_diagnostics();
                diags.push(
                    Diagnostic::warning(format!("{} was created before the failure", id))
                        .with_detail("the resource exists remotely and is kept in state"),
                );
                diags
            }
            other => Diagnostic::error(other.to_string()).into(),
        }
    }
}

impl From<ProviderError> for Diagnostics {
    fn from(err: ProviderError) -> Self {
        err.into_diagnostics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_names_resource_and_observation() {
        let err = ProviderError::ConvergenceTimeout {
            resource: "cluster p1:dbl1:cl1".to_string(),
            timeout: Duration::from_secs(10),
            last_observed: "apiserver down".to_string(),
        };
        let diags = err.into_diagnostics();
        let first = diags.iter().next().unwrap();
        assert_eq!(first.summary, "cluster p1:dbl1:cl1 did not converge in time");
        assert!(first.detail.as_deref().unwrap().contains("apiserver down"));
    }

    #[test]
    fn test_validation_keeps_batch() {
        let batch: Diagnostics = vec![Diagnostic::error("a"), Diagnostic::error("b")]
            .into_iter()
            .collect();
        let diags = ProviderError::Validation(batch.clone()).into_diagnostics();
        assert_eq!(diags, batch);
    }

    #[test]
    fn test_remote_status() {
        let err = ProviderError::from(MetaKubeError::NotFound("x".to_string()));
        assert_eq!(err.status(), Some(404));
        assert_eq!(ProviderError::InvalidConfig("x".to_string()).status(), None);
    }

    #[test]
    fn test_partially_created_keeps_id_and_cause() {
        let err = ProviderError::partially_created(
            "p1:dbl1:cl1",
            ProviderError::from(MetaKubeError::Forbidden("assign".to_string())),
        );
        assert_eq!(err.created_id(), Some("p1:dbl1:cl1"));
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().starts_with("p1:dbl1:cl1 was created"));

        let diags = err.into_diagnostics();
        assert!(diags.has_errors());
        assert_eq!(diags.warnings().count(), 1);
        assert_eq!(ProviderError::InvalidConfig("x".to_string()).created_id(), None);
    }
}
