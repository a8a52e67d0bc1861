//! MetaKube REST API Client
//!
//! A Rust client library for the MetaKube managed Kubernetes API.
//! Provides typed models and methods for datacenters, projects, clusters,
//! SSH keys and node deployments.
//!
//! # Example
//!
//! ```no_run
//! use metakube_client::{MetaKubeClient, MetaKubeClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MetaKubeClient::new(
//!     "https://metakube.syseleven.de".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! let datacenters = client.list_datacenters().await?;
//! let health = client.get_cluster_health("project", "seed", "cluster").await?;
//! println!("{} datacenters, ready: {}", datacenters.len(), health.is_ready());
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Every call returns [`MetaKubeError`]; `status()` exposes the HTTP status and
//! `is_transient()` tells network failures, conflicts and 5xx replies apart
//! from permanent failures.

pub mod client;
pub mod common;
pub mod error;
// Field names follow the API payloads
#[allow(missing_docs)]
pub mod models;
#[path = "trait.rs"]
pub mod metakube_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::MetaKubeClient;
pub use common::HttpClient;
pub use error::MetaKubeError;
pub use models::*;
pub use metakube_trait::MetaKubeClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{MockFailure, MockMetaKubeClient};
