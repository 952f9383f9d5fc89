// Single-file archive bundling one instance and zero-or-one solutions

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use prost::Message;
use tracing::debug;

use super::mappers::{self, wire, MappingError};
use crate::domain::models::{Instance, Solution};

/// Leading bytes of every archive; the protobuf body follows
pub const ARCHIVE_MAGIC: &[u8; 8] = b"QOBLIB01";

/// File extension used for archives on disk
pub const ARCHIVE_EXTENSION: &str = "ommx";

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Not an archive: missing {} header", String::from_utf8_lossy(ARCHIVE_MAGIC))]
    BadMagic,

    #[error("Archive body could not be decoded: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Archive must contain exactly one instance, found {0}")]
    InstanceCount(usize),

    #[error("Archive must contain at most one solution, found {0}")]
    SolutionCount(usize),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Decoded archive content
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub instance: Instance,
    pub solution: Option<Solution>,
    pub annotations: BTreeMap<String, String>,
}

impl Artifact {
    pub fn new(instance: Instance) -> Self {
        Self {
            instance,
            solution: None,
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_solution(mut self, solution: Solution) -> Self {
        self.solution = Some(solution);
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Encode as magic header followed by the protobuf body
    pub fn to_bytes(&self) -> Vec<u8> {
        let body = wire::Archive {
            instances: vec![mappers::domain_to_wire_instance(&self.instance)],
            solutions: self
                .solution
                .iter()
                .map(mappers::domain_to_wire_solution)
                .collect(),
            annotations: self.annotations.clone(),
        };

        let mut bytes = Vec::with_capacity(ARCHIVE_MAGIC.len() + body.encoded_len());
        bytes.extend_from_slice(ARCHIVE_MAGIC);
        bytes.extend(body.encode_to_vec());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let body = bytes
            .strip_prefix(ARCHIVE_MAGIC.as_slice())
            .ok_or(ArchiveError::BadMagic)?;
        let archive = wire::Archive::decode(body)?;

        if archive.instances.len() != 1 {
            return Err(ArchiveError::InstanceCount(archive.instances.len()));
        }
        if archive.solutions.len() > 1 {
            return Err(ArchiveError::SolutionCount(archive.solutions.len()));
        }

        let wire_instance = archive
            .instances
            .into_iter()
            .next()
            .ok_or(ArchiveError::InstanceCount(0))?;
        let instance = mappers::wire_to_domain_instance(wire_instance)?;
        let solution = archive
            .solutions
            .into_iter()
            .next()
            .map(mappers::wire_to_domain_solution)
            .transpose()?;

        Ok(Self {
            instance,
            solution,
            annotations: archive.annotations,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        debug!("Loaded archive {} ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(&bytes)
    }

    /// Write the archive, replacing any existing file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_bytes())?;
        debug!("Saved archive {}", path.display());
        Ok(())
    }
}
