//! Expand and flatten
//!
//! `expand_*` turns a typed configuration into an API payload, `flatten_*`
//! turns an API reply back into configuration. The pair must be exact inverses
//! on every field the API round-trips, otherwise the runtime reports drift on
//! every refresh.

pub mod cluster;
pub mod node_deployment;
#[cfg(test)]
mod node_deployment_test;

pub use cluster::*;
pub use node_deployment::*;

use crate::diagnostics::{Diagnostic, Diagnostics};
use chrono::{DateTime, Utc};

/// `None` for the empty string
pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Collapse a list of CIDR blocks into the single value the schema holds.
///
/// Only the first block is kept; extra blocks are reported as a warning
/// because the schema cannot represent them.
pub(crate) fn flatten_cidr(
    blocks: &[String],
    attribute: &str,
    diags: &mut Diagnostics,
) -> Option<String> {
    if blocks.len() > 1 {
        diags.push(
            Diagnostic::warning(format!("API returned multiple {} values", attribute))
                .with_detail(format!(
                    "only {} is kept, ignored: {}",
                    blocks[0],
                    blocks[1..].join(", ")
                ))
                .at(attribute),
        );
    }
    blocks.first().filter(|b| !b.is_empty()).cloned()
}

pub(crate) fn timestamp(value: Option<&DateTime<Utc>>) -> Option<String> {
    value.map(DateTime::to_rfc3339)
}
