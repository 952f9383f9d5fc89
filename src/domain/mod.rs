// Domain module: interchange model, catalog and service contracts

pub mod artifact_store;
pub mod catalog;
pub mod converter_service;
pub mod function;
pub mod models;
pub mod value_objects;
pub mod verification;

pub use artifact_store::*;
pub use catalog::*;
pub use converter_service::*;
pub use function::*;
pub use models::*;
pub use value_objects::*;
pub use verification::*;
