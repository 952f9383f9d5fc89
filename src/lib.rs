// Domain layer: Interchange model, catalog and service contracts
pub mod domain;

// Application layer: Dataset access, archives, uploads and wire mapping
pub mod application;

// Infrastructure layer: Stores, settings and the registry server
pub mod infrastructure;

// Converter adapters: Concrete implementations of InstanceConverter
pub mod converter;

// Re-export commonly used types
pub use domain::{
    verify_solution, ArtifactStore, Bound, Catalog, CatalogError, Constraint, Dataset,
    DecisionVariable, Equality, Function, ImageReference, Instance, InstanceConverter, ModelEntry,
    ModelError, Sense, Solution, State, StoreError, VariableKind, VerificationReport,
};

pub use application::{Artifact, DatasetAccessor, DatasetError, Uploader};

pub use infrastructure::{LocalArtifactStore, RegistrySettings};

#[cfg(feature = "grpc")]
pub use infrastructure::{start_server, GrpcArtifactStore, ServerConfig};

pub use converter::{convert, ConverterFactory};
