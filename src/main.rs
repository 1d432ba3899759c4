use anyhow::Context;
use swapi_gateway::observability::init_tracing;
use swapi_gateway::{Config, GatewayServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format).context("Failed to initialize tracing")?;

    tracing::info!("Starting SWAPI gateway");

    let server = GatewayServer::new(config).await?;
    server.run().await?;

    Ok(())
}
