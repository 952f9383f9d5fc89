use qoblib::{start_server, LocalArtifactStore, RegistrySettings, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // Address and store directory from the environment
    let settings = RegistrySettings::from_env()?;

    // Archives live on the local filesystem
    let store = Arc::new(LocalArtifactStore::new(settings.store_dir));

    // Configure and start server
    let config = ServerConfig::new(settings.address, store);
    start_server(config).await?;

    Ok(())
}
