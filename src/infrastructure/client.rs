// Infrastructure: blocking artifact store backed by a remote registry service

use tokio::runtime::{Builder, Runtime};
use tonic::transport::Channel;
use tonic::{Code, Status};
use tracing::debug;

use crate::application::grpc_service::CHUNK_SIZE;
use crate::application::mappers::registry_proto::{
    artifact_registry_client::ArtifactRegistryClient, ListTagsRequest, PullRequest, PushChunk,
};
use crate::domain::artifact_store::{validate_reference, ArtifactStore, StoreError, StoreResult};
use crate::domain::catalog::ImageReference;

/// Client side of the registry service.
///
/// Owns a current-thread runtime and blocks on it, so it must not be used
/// from inside another async runtime.
pub struct GrpcArtifactStore {
    endpoint: String,
    runtime: Runtime,
    client: ArtifactRegistryClient<Channel>,
}

impl GrpcArtifactStore {
    pub fn connect(endpoint: impl Into<String>) -> StoreResult<Self> {
        let endpoint = endpoint.into();
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let client = runtime
            .block_on(ArtifactRegistryClient::connect(endpoint.clone()))
            .map_err(|e| StoreError::Transport(format!("{}: {}", endpoint, e)))?;
        debug!("Connected to registry at {}", endpoint);
        Ok(Self {
            endpoint,
            runtime,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn status_error(status: Status) -> StoreError {
    match status.code() {
        Code::NotFound => StoreError::NotFound(status.message().to_string()),
        Code::InvalidArgument => StoreError::InvalidReference(status.message().to_string()),
        _ => StoreError::Transport(status.to_string()),
    }
}

impl ArtifactStore for GrpcArtifactStore {
    fn pull(&self, reference: &ImageReference) -> StoreResult<Vec<u8>> {
        validate_reference(reference)?;
        let mut client = self.client.clone();
        let request = PullRequest {
            repository: reference.repository.clone(),
            tag: reference.tag.clone(),
        };

        self.runtime
            .block_on(async move {
                let mut stream = client.pull_artifact(request).await?.into_inner();
                let mut data = Vec::new();
                while let Some(chunk) = stream.message().await? {
                    data.extend_from_slice(&chunk.data);
                }
                Ok::<_, Status>(data)
            })
            .map_err(status_error)
    }

    fn push(&self, reference: &ImageReference, archive: &[u8]) -> StoreResult<()> {
        validate_reference(reference)?;
        let mut client = self.client.clone();

        let mut chunks: Vec<PushChunk> = archive
            .chunks(CHUNK_SIZE)
            .map(|data| PushChunk {
                repository: String::new(),
                tag: String::new(),
                data: data.to_vec(),
            })
            .collect();
        if chunks.is_empty() {
            chunks.push(PushChunk::default());
        }
        chunks[0].repository = reference.repository.clone();
        chunks[0].tag = reference.tag.clone();

        let response = self
            .runtime
            .block_on(client.push_artifact(futures::stream::iter(chunks)))
            .map_err(status_error)?
            .into_inner();
        debug!("Registry stored {} ({} bytes)", response.reference, response.size);
        Ok(())
    }

    fn tags(&self, repository: &str) -> StoreResult<Vec<String>> {
        let mut client = self.client.clone();
        let request = ListTagsRequest {
            repository: repository.to_string(),
        };
        let response = self
            .runtime
            .block_on(client.list_tags(request))
            .map_err(status_error)?;
        Ok(response.into_inner().tags)
    }

    fn name(&self) -> &str {
        "grpc"
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::{mpsc, Arc};

    use tokio_stream::wrappers::TcpListenerStream;
    use tonic::transport::Server;

    use super::*;
    use crate::application::mappers::registry_proto::artifact_registry_server::ArtifactRegistryServer;
    use crate::application::GrpcRegistryService;
    use crate::infrastructure::LocalArtifactStore;

    // Serves a local store on an ephemeral port from a thread of its own
    fn spawn_registry(store: Arc<LocalArtifactStore>) -> SocketAddr {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let runtime = Builder::new_multi_thread().enable_all().build().unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap()).unwrap();
                Server::builder()
                    .add_service(ArtifactRegistryServer::new(GrpcRegistryService::new(store)))
                    .serve_with_incoming(TcpListenerStream::new(listener))
                    .await
                    .unwrap();
            });
        });
        rx.recv().unwrap()
    }

    #[test]
    fn push_pull_and_tags_over_the_wire() {
        let dir = tempfile::tempdir().unwrap();
        let local = Arc::new(LocalArtifactStore::new(dir.path()));
        let address = spawn_registry(local.clone());
        let store = GrpcArtifactStore::connect(format!("http://{}", address)).unwrap();
        assert_eq!(store.name(), "grpc");

        let reference = ImageReference::qoblib("02_labs", "integer", "labs002");
        let payload: Vec<u8> = (0..CHUNK_SIZE * 2 + 17).map(|i| (i % 253) as u8).collect();
        store.push(&reference, &payload).unwrap();

        // The reference rides on the first chunk only
        assert_eq!(local.pull(&reference).unwrap(), payload);
        assert_eq!(store.pull(&reference).unwrap(), payload);
        assert_eq!(
            store.tags(&reference.repository).unwrap(),
            vec!["02_labs-integer-labs002"]
        );

        let empty = ImageReference::qoblib("02_labs", "integer", "labs003");
        store.push(&empty, &[]).unwrap();
        assert!(store.pull(&empty).unwrap().is_empty());
        assert_eq!(store.tags(&reference.repository).unwrap().len(), 2);
    }

    #[test]
    fn registry_errors_map_back_to_store_errors() {
        let dir = tempfile::tempdir().unwrap();
        let address = spawn_registry(Arc::new(LocalArtifactStore::new(dir.path())));
        let store = GrpcArtifactStore::connect(format!("http://{}", address)).unwrap();

        let missing = ImageReference::qoblib("02_labs", "integer", "labs099");
        assert!(matches!(store.pull(&missing), Err(StoreError::NotFound(_))));

        let escape = ImageReference::new("local/qoblib", "../escape");
        assert!(matches!(
            store.push(&escape, b"data"),
            Err(StoreError::InvalidReference(_))
        ));

        assert!(matches!(
            status_error(Status::invalid_argument("bad tag")),
            StoreError::InvalidReference(_)
        ));
        assert!(matches!(
            status_error(Status::unavailable("down")),
            StoreError::Transport(_)
        ));
    }
}
