// Infrastructure: Server setup and configuration
// Single Responsibility: Manage registry server lifecycle

use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::info;

use crate::application::mappers::registry_proto::artifact_registry_server::ArtifactRegistryServer;
use crate::application::GrpcRegistryService;
use crate::domain::artifact_store::ArtifactStore;

pub struct ServerConfig {
    pub address: SocketAddr,
    pub store: Arc<dyn ArtifactStore>,
}

impl ServerConfig {
    pub fn new(address: SocketAddr, store: Arc<dyn ArtifactStore>) -> Self {
        Self { address, store }
    }
}

pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "QOBLIB artifact registry listening on {} (store: {})",
        config.address,
        config.store.name()
    );

    let service = GrpcRegistryService::new(config.store);

    Server::builder()
        .add_service(ArtifactRegistryServer::new(service))
        .serve(config.address)
        .await?;

    Ok(())
}
