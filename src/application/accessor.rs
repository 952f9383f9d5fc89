// Dataset accessor: (model, instance) -> (Instance, Option<Solution>)

use std::sync::Arc;

use tracing::{debug, info};

use super::archive::{ArchiveError, Artifact};
use crate::domain::{
    artifact_store::{ArtifactStore, StoreError},
    catalog::{CatalogError, Dataset, ImageReference},
    models::{Instance, ModelError, Solution},
};

/// Error types for dataset access
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid archive for {reference}: {source}")]
    InvalidArchive {
        reference: String,
        #[source]
        source: ArchiveError,
    },

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, DatasetError>;

impl From<CatalogError> for DatasetError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::UnknownInstance { .. } | CatalogError::UnknownDataset(_) => {
                DatasetError::NotFound(error.to_string())
            }
            other => DatasetError::InvalidArgument(other.to_string()),
        }
    }
}

/// Loads the packaged instances of one dataset from an artifact store.
///
/// Every call fetches from the store again; nothing is cached.
pub struct DatasetAccessor {
    dataset: Dataset,
    store: Arc<dyn ArtifactStore>,
}

impl DatasetAccessor {
    pub fn new(dataset: Dataset, store: Arc<dyn ArtifactStore>) -> Self {
        Self { dataset, store }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Registry reference of an instance after validating model and instance names
    pub fn reference(&self, model: &str, instance: &str) -> Result<ImageReference> {
        match self.dataset.resolve(model, instance) {
            Ok(reference) => Ok(reference),
            Err(CatalogError::UnknownInstance { .. }) => Err(self.not_found(model, instance)),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch and decode the archive of an instance
    pub fn load_artifact(&self, model: &str, instance: &str) -> Result<Artifact> {
        let reference = self.reference(model, instance)?;
        debug!("Pulling {} from {}", reference, self.store.name());

        let bytes = match self.store.pull(&reference) {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound(_)) => return Err(self.not_found(model, instance)),
            Err(StoreError::InvalidReference(_)) => return Err(self.not_found(model, instance)),
            Err(e) => return Err(DatasetError::Store(e)),
        };

        let artifact = Artifact::from_bytes(&bytes).map_err(|source| {
            DatasetError::InvalidArchive {
                reference: reference.to_string(),
                source,
            }
        })?;

        info!(
            "Loaded {} ({} variables, {} constraints, solution: {})",
            reference,
            artifact.instance.num_variables(),
            artifact.instance.num_constraints(),
            artifact.solution.is_some()
        );
        Ok(artifact)
    }

    /// Instance and, when packaged, its reference solution
    pub fn load(&self, model: &str, instance: &str) -> Result<(Instance, Option<Solution>)> {
        let artifact = self.load_artifact(model, instance)?;
        Ok((artifact.instance, artifact.solution))
    }

    fn not_found(&self, model: &str, instance: &str) -> DatasetError {
        DatasetError::NotFound(format!(
            "instance '{}' of model '{}' in dataset '{}'. Choose from the available instances:\n{}",
            instance,
            model,
            self.dataset.name(),
            self.dataset.availability_summary()
        ))
    }
}
