// Infrastructure module: stores, settings and the registry server

pub mod config;
pub mod local_store;

#[cfg(feature = "grpc")]
pub mod client;
#[cfg(feature = "grpc")]
pub mod server;

pub use config::RegistrySettings;
pub use local_store::LocalArtifactStore;

#[cfg(feature = "grpc")]
pub use client::GrpcArtifactStore;
#[cfg(feature = "grpc")]
pub use server::{start_server, ServerConfig};
