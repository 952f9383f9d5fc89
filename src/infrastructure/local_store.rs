// Infrastructure: artifact store on the local filesystem
// Layout: <root>/<repository path>/<tag>.ommx

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::application::archive::ARCHIVE_EXTENSION;
use crate::domain::artifact_store::{
    validate_reference, validate_repository, ArtifactStore, StoreError, StoreResult,
};
use crate::domain::catalog::ImageReference;

pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repository_dir(&self, repository: &str) -> PathBuf {
        repository
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// File an archive is kept in
    pub fn path_of(&self, reference: &ImageReference) -> StoreResult<PathBuf> {
        validate_reference(reference)?;
        Ok(self
            .repository_dir(&reference.repository)
            .join(format!("{}.{}", reference.tag, ARCHIVE_EXTENSION)))
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn pull(&self, reference: &ImageReference) -> StoreResult<Vec<u8>> {
        let path = self.path_of(reference)?;
        match fs::read(&path) {
            Ok(bytes) => {
                debug!("Read {} ({} bytes)", path.display(), bytes.len());
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn push(&self, reference: &ImageReference, archive: &[u8]) -> StoreResult<()> {
        let path = self.path_of(reference)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, archive)?;
        debug!("Wrote {} ({} bytes)", path.display(), archive.len());
        Ok(())
    }

    fn tags(&self, repository: &str) -> StoreResult<Vec<String>> {
        validate_repository(repository)?;
        let dir = self.repository_dir(repository);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut tags = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(ARCHIVE_EXTENSION) {
                continue;
            }
            if let Some(tag) = path.file_stem().and_then(|s| s.to_str()) {
                tags.push(tag.to_string());
            }
        }
        tags.sort();
        Ok(tags)
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::QOBLIB_REPOSITORY;

    #[test]
    fn push_pull_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        let labs = ImageReference::qoblib("02_labs", "integer", "labs002");
        let other = ImageReference::qoblib("02_labs", "integer", "labs003");
        store.push(&other, b"second").unwrap();
        store.push(&labs, b"first").unwrap();

        assert_eq!(store.pull(&labs).unwrap(), b"first");
        assert!(store.contains(&other).unwrap());
        assert_eq!(
            store.tags(QOBLIB_REPOSITORY).unwrap(),
            vec!["02_labs-integer-labs002", "02_labs-integer-labs003"]
        );

        let path = store.path_of(&labs).unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.ends_with("qoblib/02_labs-integer-labs002.ommx"));
    }

    #[test]
    fn push_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        let reference = ImageReference::new("local/test", "a");

        store.push(&reference, b"old").unwrap();
        store.push(&reference, b"new").unwrap();
        assert_eq!(store.pull(&reference).unwrap(), b"new");
    }

    #[test]
    fn missing_artifacts_and_repositories() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        let reference = ImageReference::new("local/test", "absent");

        assert!(matches!(store.pull(&reference), Err(StoreError::NotFound(_))));
        assert!(!store.contains(&reference).unwrap());
        assert!(store.tags("local/empty").unwrap().is_empty());
    }

    #[test]
    fn escaping_the_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        let sneaky = ImageReference::new("local/../..", "tag");
        assert!(matches!(
            store.push(&sneaky, b"x"),
            Err(StoreError::InvalidReference(_))
        ));
        let bad_tag = ImageReference::new("local/test", "../tag");
        assert!(matches!(
            store.pull(&bad_tag),
            Err(StoreError::InvalidReference(_))
        ));
    }
}
