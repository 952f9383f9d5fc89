use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{info, warn};

use super::mappers::registry_proto::{
    artifact_registry_server::ArtifactRegistry, ArtifactChunk, ListTagsRequest,
    ListTagsResponse, PullRequest, PushChunk, PushResponse,
};
use crate::domain::artifact_store::{ArtifactStore, StoreError};
use crate::domain::catalog::ImageReference;

/// Size of the chunks an archive is streamed in
pub const CHUNK_SIZE: usize = 64 * 1024;

/// gRPC registry service backed by an artifact store
pub struct GrpcRegistryService {
    store: Arc<dyn ArtifactStore>,
}

impl GrpcRegistryService {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    // Stores block on I/O, so calls leave the async workers
    async fn with_store<T, F>(&self, f: F) -> Result<T, Status>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ArtifactStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| Status::internal(format!("Store task failed: {}", e)))?
            .map_err(store_status)
    }
}

pub fn store_status(error: StoreError) -> Status {
    match error {
        StoreError::NotFound(m) => Status::not_found(m),
        StoreError::InvalidReference(m) => Status::invalid_argument(m),
        other => Status::internal(other.to_string()),
    }
}

#[tonic::async_trait]
impl ArtifactRegistry for GrpcRegistryService {
    type PullArtifactStream =
        tokio_stream::Iter<std::vec::IntoIter<Result<ArtifactChunk, Status>>>;

    async fn pull_artifact(
        &self,
        request: Request<PullRequest>,
    ) -> Result<Response<Self::PullArtifactStream>, Status> {
        let request = request.into_inner();
        let reference = ImageReference::new(request.repository, request.tag);
        info!("Pull {}", reference);

        let pulled = reference.clone();
        let bytes = self.with_store(move |store| store.pull(&pulled)).await?;

        let chunks: Vec<Result<ArtifactChunk, Status>> = bytes
            .chunks(CHUNK_SIZE)
            .map(|chunk| {
                Ok(ArtifactChunk {
                    data: chunk.to_vec(),
                })
            })
            .collect();
        info!("Serving {} ({} bytes, {} chunks)", reference, bytes.len(), chunks.len());

        Ok(Response::new(tokio_stream::iter(chunks)))
    }

    async fn push_artifact(
        &self,
        request: Request<tonic::Streaming<PushChunk>>,
    ) -> Result<Response<PushResponse>, Status> {
        let mut stream = request.into_inner();

        let mut reference: Option<ImageReference> = None;
        let mut data = Vec::new();

        while let Some(chunk) = stream.message().await? {
            if reference.is_none() {
                reference = Some(ImageReference::new(chunk.repository, chunk.tag));
            } else if !chunk.repository.is_empty() || !chunk.tag.is_empty() {
                warn!("Ignoring reference on a continuation chunk");
            }
            data.extend_from_slice(&chunk.data);
        }

        let reference =
            reference.ok_or_else(|| Status::invalid_argument("Push stream carried no chunks"))?;
        let size = data.len() as u64;

        let pushed = reference.clone();
        self.with_store(move |store| store.push(&pushed, &data)).await?;
        info!("Stored {} ({} bytes)", reference, size);

        Ok(Response::new(PushResponse {
            reference: reference.to_string(),
            size,
        }))
    }

    async fn list_tags(
        &self,
        request: Request<ListTagsRequest>,
    ) -> Result<Response<ListTagsResponse>, Status> {
        let repository = request.into_inner().repository;
        let tags = self.with_store(move |store| store.tags(&repository)).await?;

        Ok(Response::new(ListTagsResponse { tags }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::LocalArtifactStore;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn pull_streams_the_stored_bytes_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalArtifactStore::new(dir.path()));
        let reference = ImageReference::new("local/qoblib", "02_labs-integer-labs002");
        let payload: Vec<u8> = (0..CHUNK_SIZE * 2 + 10).map(|i| (i % 251) as u8).collect();
        store.push(&reference, &payload).unwrap();

        let service = GrpcRegistryService::new(store);
        let mut stream = service
            .pull_artifact(Request::new(PullRequest {
                repository: reference.repository.clone(),
                tag: reference.tag.clone(),
            }))
            .await
            .unwrap()
            .into_inner();

        let mut received = Vec::new();
        let mut chunks = 0;
        while let Some(chunk) = stream.next().await {
            received.extend(chunk.unwrap().data);
            chunks += 1;
        }
        assert_eq!(chunks, 3);
        assert_eq!(received, payload);

        let tags = service
            .list_tags(Request::new(ListTagsRequest {
                repository: "local/qoblib".to_string(),
            }))
            .await
            .unwrap()
            .into_inner()
            .tags;
        assert_eq!(tags, vec!["02_labs-integer-labs002"]);
    }

    #[tokio::test]
    async fn store_errors_become_status_codes() {
        let dir = tempfile::tempdir().unwrap();
        let service = GrpcRegistryService::new(Arc::new(LocalArtifactStore::new(dir.path())));

        let missing = service
            .pull_artifact(Request::new(PullRequest {
                repository: "local/qoblib".to_string(),
                tag: "absent".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(missing.code(), tonic::Code::NotFound);

        let invalid = service
            .pull_artifact(Request::new(PullRequest {
                repository: "local/qoblib".to_string(),
                tag: "../escape".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(invalid.code(), tonic::Code::InvalidArgument);

        let io = store_status(StoreError::Transport("down".to_string()));
        assert_eq!(io.code(), tonic::Code::Internal);
    }
}
