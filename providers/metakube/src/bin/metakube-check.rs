//! Connectivity check
//!
//! Resolves the provider configuration the same way the provider does,
//! validates the token and lists the datacenters that can host clusters.

use anyhow::Context;
use metakube_client::{MetaKubeClient, MetaKubeClientTrait};
use metakube_provider::config::ProviderConfig;
use metakube_provider::logging;
use metakube_provider::validator::supports;
use metakube_schema::CloudProvider;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = ProviderConfig::default()
        .resolve_from_env()
        .context("resolving provider configuration")?;
    info!("Checking MetaKube API at {}", config.host);

    let client = MetaKubeClient::new(config.host.clone(), config.token.clone())?;
    client.validate_token().await.context("validating API token")?;
    info!("Token accepted");

    let datacenters = client.list_datacenters().await.context("listing datacenters")?;
    for dc in datacenters.iter().filter(|dc| !dc.spec.seed.is_empty()) {
        let providers: Vec<&str> = [
            CloudProvider::Openstack,
            CloudProvider::Aws,
            CloudProvider::Azure,
            CloudProvider::BringYourOwn,
        ]
        .into_iter()
        .filter(|p| supports(dc, *p))
        .map(|p| p.as_str())
        .collect();
        println!("{}\t{}\t{}", dc.metadata.name, dc.spec.seed, providers.join(","));
    }
    Ok(())
}
