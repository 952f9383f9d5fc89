// Uploader: push packaged archives under their dataset/model/instance tag

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::archive::{ArchiveError, Artifact};
use crate::domain::{
    artifact_store::{ArtifactStore, StoreError},
    catalog::{Dataset, ImageReference},
    models::ModelError,
    verification::{same_instances, same_solutions, verify_solution},
};

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Verification failed for {reference}: {reason}")]
    Verification { reference: String, reason: String },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, UploadError>;

pub struct Uploader {
    store: Arc<dyn ArtifactStore>,
    verification: bool,
}

impl Uploader {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            verification: false,
        }
    }

    /// Re-decode and re-evaluate every archive before it is pushed
    pub fn with_verification(mut self, verification: bool) -> Self {
        self.verification = verification;
        self
    }

    pub fn push_file(
        &self,
        dataset: &Dataset,
        model: &str,
        instance: &str,
        path: impl AsRef<Path>,
    ) -> Result<ImageReference> {
        let artifact = Artifact::load(path)?;
        self.push_artifact(dataset, model, instance, &artifact)
    }

    pub fn push_artifact(
        &self,
        dataset: &Dataset,
        model: &str,
        instance: &str,
        artifact: &Artifact,
    ) -> Result<ImageReference> {
        let reference = dataset
            .resolve(model, instance)
            .map_err(|e| UploadError::InvalidArgument(e.to_string()))?;

        if artifact.solution.is_none() {
            warn!("{} has no reference solution", reference);
        }

        let bytes = artifact.to_bytes();
        if self.verification {
            self.verify(&reference, artifact, &bytes)?;
        }

        self.store.push(&reference, &bytes)?;
        info!(
            "Pushed {} ({} bytes) to {}",
            reference,
            bytes.len(),
            self.store.name()
        );
        Ok(reference)
    }

    fn verify(&self, reference: &ImageReference, artifact: &Artifact, bytes: &[u8]) -> Result<()> {
        let failure = |reason: &str| UploadError::Verification {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        artifact.instance.validate()?;

        let reloaded = Artifact::from_bytes(bytes)?;
        if !same_instances(&artifact.instance, &reloaded.instance) {
            return Err(failure("the encoded instance differs from the original"));
        }

        match (&artifact.solution, &reloaded.solution) {
            (None, None) => {}
            (Some(_), None) => return Err(failure("the encoded archive lost its solution")),
            (None, Some(_)) => return Err(failure("the encoded archive gained a solution")),
            (Some(original), Some(encoded)) => {
                if !same_solutions(original, encoded) {
                    return Err(failure("the encoded solution differs from the original"));
                }
                let report = verify_solution(&reloaded.instance, encoded)?;
                if !report.is_consistent() {
                    return Err(failure(&format!(
                        "stored objective {} / feasible {} but evaluation gives {} / {}",
                        report.stored_objective,
                        report.stored_feasible,
                        report.recomputed_objective,
                        report.recomputed_feasible
                    )));
                }
            }
        }

        Ok(())
    }
}
