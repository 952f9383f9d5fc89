// Domain service interface for artifact storage
// Any registry backend (local directory, remote registry) implements this contract

use super::catalog::ImageReference;

/// Error types for artifact stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact reference: {0}")]
    InvalidReference(String),

    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry transport failed: {0}")]
    Transport(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage backend for packaged archives.
///
/// Calls are synchronous and blocking; implementations do not cache.
pub trait ArtifactStore: Send + Sync {
    /// Fetch the archive bytes stored under a reference
    fn pull(&self, reference: &ImageReference) -> StoreResult<Vec<u8>>;

    /// Store archive bytes under a reference, replacing any previous content
    fn push(&self, reference: &ImageReference, archive: &[u8]) -> StoreResult<()>;

    /// Tags stored under a repository, sorted
    fn tags(&self, repository: &str) -> StoreResult<Vec<String>>;

    /// Check whether a reference exists without keeping its content
    fn contains(&self, reference: &ImageReference) -> StoreResult<bool> {
        match self.pull(reference) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get the name of this store backend
    fn name(&self) -> &str;
}

/// Reject references that cannot name a registry object
pub fn validate_reference(reference: &ImageReference) -> StoreResult<()> {
    let tag = &reference.tag;
    if tag.is_empty() || tag == "." || tag == ".." || tag.contains(['/', '\\', ':']) {
        return Err(StoreError::InvalidReference(format!(
            "invalid tag '{}'",
            tag
        )));
    }
    validate_repository(&reference.repository)
}

pub fn validate_repository(repository: &str) -> StoreResult<()> {
    if repository.is_empty() || repository.contains('\\') {
        return Err(StoreError::InvalidReference(format!(
            "invalid repository '{}'",
            repository
        )));
    }
    for segment in repository.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(StoreError::InvalidReference(format!(
                "invalid repository '{}'",
                repository
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_with_path_tricks_are_rejected() {
        let ok = ImageReference::qoblib("02_labs", "integer", "labs002");
        assert!(validate_reference(&ok).is_ok());

        for tag in ["", ".", "..", "a/b", "a\\b", "a:b"] {
            let reference = ImageReference::new("ghcr.io/x/y", tag);
            assert!(matches!(
                validate_reference(&reference),
                Err(StoreError::InvalidReference(_))
            ));
        }

        for repository in ["", "ghcr.io//y", "ghcr.io/../y", "ghcr.io\\y"] {
            assert!(validate_repository(repository).is_err());
        }
    }
}
