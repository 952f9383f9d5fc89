// Application module: dataset access, archives, uploads and wire mapping

pub mod accessor;
pub mod archive;
pub mod mappers;
pub mod uploader;

#[cfg(feature = "grpc")]
pub mod grpc_service;

pub use accessor::{DatasetAccessor, DatasetError};
pub use archive::{ArchiveError, Artifact, ARCHIVE_EXTENSION, ARCHIVE_MAGIC};
pub use uploader::{UploadError, Uploader};

#[cfg(feature = "grpc")]
pub use grpc_service::GrpcRegistryService;
