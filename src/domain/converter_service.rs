// Domain service interface for turning raw QOBLIB sources into instances
// Each (dataset, model) formulation provides one implementation

use super::models::{Instance, ModelError, State};

/// Error types for source conversion
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Malformed source: {0}")]
    Malformed(String),

    #[error("Invalid instance name '{0}'")]
    InvalidName(String),

    #[error("No converter for model '{model}' of dataset '{dataset}'")]
    Unsupported { dataset: String, model: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConversionResult<T> = std::result::Result<T, ConversionError>;

/// Variable assignment read from a solution file, together with the
/// objective value the file claims
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSolution {
    pub state: State,
    pub reported_objective: Option<f64>,
}

/// Builds instances of one formulation from QOBLIB source files
pub trait InstanceConverter: Send + Sync {
    /// Build the instance named `name` from the raw instance file content.
    /// Formulations generated from the name alone ignore `data`.
    fn build_instance(&self, name: &str, data: &str) -> ConversionResult<Instance>;

    /// Read a solution file and complete it into a full assignment for `instance`
    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution>;

    /// Dataset this converter belongs to
    fn dataset(&self) -> &str;

    /// Model (formulation) this converter produces
    fn model(&self) -> &str;

    /// Human readable dataset title recorded in instance metadata
    fn title(&self) -> &str;
}
