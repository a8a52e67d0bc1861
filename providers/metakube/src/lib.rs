//! MetaKube provider reconciliation core
//!
//! Maps the declarative `metakube_cluster` and `metakube_node_deployment`
//! resources onto the MetaKube API:
//!
//! - `identity`: composite resource ids (`project:location:resource`)
//! - `mapper`: expand configuration into API payloads and flatten replies back
//! - `preserve`: write-only values kept across a refresh
//! - `labels`: hides labels inherited from the project
//! - `validator`: pre-flight checks and plan decisions
//! - `waiter`: polling state machine for asynchronous convergence
//! - `resources`: create, read, update, delete and import per resource type
//! - `provider`: dispatch of untyped trees by resource type name
//!
//! # Example
//!
//! ```no_run
//! use metakube_provider::{config::ProviderConfig, logging, Provider};
//!
//! # async fn example() -> Result<(), metakube_provider::ProviderError> {
//! logging::init_tracing();
//! let config = ProviderConfig::default().resolve_from_env()?;
//! let provider = Provider::configure(&config)?;
//! let state = provider.read("metakube_cluster", "project:europe-west3-c:abc123", None).await?;
//! println!("{:?}", state.map(|s| s.state));
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod identity;
pub mod labels;
pub mod logging;
pub mod mapper;
pub mod preserve;
pub mod provider;
pub mod resources;
pub mod validator;
pub mod waiter;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::ProviderError;
pub use identity::CompositeId;
pub use provider::{Provider, ResourceState, ResourceType};
pub use resources::{ClusterResource, NodeDeploymentResource, Observed, ResourceContext};
pub use validator::PlanAction;
pub use waiter::{Clock, ConvergenceWaiter, ManualClock, TokioClock};
