//! Print the JSON Schema of every MetaKube resource as YAML
//!
//! Usage: `schemagen > schemas.yaml`

use metakube_schema::{ClusterConfig, NodeDeploymentConfig, ResourceConfig};
use schemars::schema_for;
use std::collections::BTreeMap;

fn main() -> anyhow::Result<()> {
    let mut schemas = BTreeMap::new();
    schemas.insert(ClusterConfig::RESOURCE, schema_for!(ClusterConfig));
    schemas.insert(NodeDeploymentConfig::RESOURCE, schema_for!(NodeDeploymentConfig));

    print!("{}", serde_yaml::to_string(&schemas)?);
    Ok(())
}
