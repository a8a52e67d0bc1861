//! Lifecycle operations
//!
//! - `cluster`: clusters, their SSH key assignments and control plane health
//! - `node_deployment`: node deployments of a cluster
//!
//! Both share a [`ResourceContext`]: the API client handle, the clock used by
//! the convergence waiter and the operation deadlines.

pub mod cluster;
pub mod node_deployment;

use crate::backoff::FibonacciBackoff;
use crate::config::Timeouts;
use crate::diagnostics::Diagnostics;
use crate::error::ProviderError;
use crate::waiter::{Clock, ConvergenceWaiter, TokioClock};
use metakube_client::{MetaKubeClientTrait, MetaKubeError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use cluster::ClusterResource;
pub use node_deployment::NodeDeploymentResource;

/// State of a resource after a lifecycle operation
#[derive(Debug, Clone, PartialEq)]
pub struct Observed<T> {
    /// Composite id of the resource
    pub id: String,
    /// Refreshed configuration
    pub config: T,
    /// Warnings collected while flattening
    pub diagnostics: Diagnostics,
}

/// Handles shared by every lifecycle operation
#[derive(Clone)]
pub struct ResourceContext {
    pub(crate) client: Arc<dyn MetaKubeClientTrait>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) backoff: FibonacciBackoff,
    pub(crate) timeouts: Timeouts,
    pub(crate) cancel: CancellationToken,
}

impl std::fmt::Debug for ResourceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceContext")
            .field("base_url", &self.client.base_url())
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl ResourceContext {
    /// Context with the Tokio clock and the default backoff
    pub fn new(client: Arc<dyn MetaKubeClientTrait>, timeouts: Timeouts) -> Self {
        Self {
            client,
            clock: Arc::new(TokioClock),
            backoff: FibonacciBackoff::default(),
            timeouts,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the clock used while waiting
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the delay sequence between polls
    pub fn with_backoff(mut self, backoff: FibonacciBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Abort running waits when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// API client shared by all operations
    pub fn client(&self) -> &dyn MetaKubeClientTrait {
        self.client.as_ref()
    }

    /// Operation deadlines
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub(crate) fn waiter(&self, timeout: Duration) -> ConvergenceWaiter {
        ConvergenceWaiter::new(Arc::clone(&self.clock), timeout, self.backoff.clone())
            .with_cancellation(self.cancel.clone())
    }
}

/// `Ok(None)` for a 404, the error otherwise
pub(crate) fn found<T>(result: Result<T, MetaKubeError>) -> Result<Option<T>, MetaKubeError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Fail with the batch when it holds an error
pub(crate) fn reject(diags: Diagnostics) -> Result<Diagnostics, ProviderError> {
    diags.into_result().map_err(ProviderError::Validation)
}
