// Dataset catalog: which models each QOBLIB dataset provides and which
// instances are known for each model

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Registry repository that holds every packaged QOBLIB instance
pub const QOBLIB_REPOSITORY: &str = "ghcr.io/jij-inc/ommxquantumbenchmarks/qoblib";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Dataset name must be a non-empty string")]
    EmptyName,

    #[error("Dataset '{0}' must declare at least one model")]
    NoModels(String),

    #[error("Dataset '{dataset}' declares model '{model}' more than once")]
    DuplicateModel { dataset: String, model: String },

    #[error("Model '{model}' of dataset '{dataset}' lists instance '{instance}' more than once")]
    DuplicateInstance {
        dataset: String,
        model: String,
        instance: String,
    },

    #[error("Model '{model}' is not part of dataset '{dataset}'. Choose from: {}", .available.join(", "))]
    UnknownModel {
        dataset: String,
        model: String,
        available: Vec<String>,
    },

    #[error("Instance '{instance}' is not available for model '{model}' of dataset '{dataset}'")]
    UnknownInstance {
        dataset: String,
        model: String,
        instance: String,
    },

    #[error("Unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("Invalid catalog document: {0}")]
    Document(String),
}

/// Registry address of one packaged artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// Tag convention: `{dataset}-{model}-{instance}`
    pub fn qoblib(dataset: &str, model: &str, instance: &str) -> Self {
        Self::new(QOBLIB_REPOSITORY, instance_tag(dataset, model, instance))
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

pub fn instance_tag(dataset: &str, model: &str, instance: &str) -> String {
    format!("{}-{}-{}", dataset, model, instance)
}

/// One model of a dataset and its availability list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    /// Empty when the instances of this model are not enumerated locally
    #[serde(default)]
    pub instances: Vec<String>,
}

impl ModelEntry {
    pub fn new(name: impl Into<String>, instances: Vec<String>) -> Self {
        Self {
            name: name.into(),
            instances,
        }
    }

    pub fn open(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }
}

/// Serialized shape of a dataset; converted through `Dataset::new` so the
/// same validation applies to configuration files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDocument {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub models: Vec<ModelEntry>,
}

/// A QOBLIB problem family packaged under one name. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DatasetDocument", into = "DatasetDocument")]
pub struct Dataset {
    name: String,
    description: String,
    models: Vec<ModelEntry>,
}

impl TryFrom<DatasetDocument> for Dataset {
    type Error = CatalogError;

    fn try_from(doc: DatasetDocument) -> Result<Self, Self::Error> {
        Dataset::new(doc.name, doc.description, doc.models)
    }
}

impl From<Dataset> for DatasetDocument {
    fn from(dataset: Dataset) -> Self {
        Self {
            name: dataset.name,
            description: dataset.description,
            models: dataset.models,
        }
    }
}

impl Dataset {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        models: Vec<ModelEntry>,
    ) -> Result<Self, CatalogError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        if models.is_empty() {
            return Err(CatalogError::NoModels(name));
        }

        let mut seen_models = BTreeSet::new();
        for model in &models {
            if !seen_models.insert(model.name.as_str()) {
                return Err(CatalogError::DuplicateModel {
                    dataset: name.clone(),
                    model: model.name.clone(),
                });
            }
            let mut seen_instances = BTreeSet::new();
            for instance in &model.instances {
                if !seen_instances.insert(instance.as_str()) {
                    return Err(CatalogError::DuplicateInstance {
                        dataset: name.clone(),
                        model: model.name.clone(),
                        instance: instance.clone(),
                    });
                }
            }
        }

        Ok(Self {
            name,
            description: description.into(),
            models,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn models(&self) -> &[ModelEntry] {
        &self.models
    }

    pub fn has_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m.name == model)
    }

    fn model(&self, model: &str) -> Result<&ModelEntry, CatalogError> {
        self.models
            .iter()
            .find(|m| m.name == model)
            .ok_or_else(|| CatalogError::UnknownModel {
                dataset: self.name.clone(),
                model: model.to_string(),
                available: self.models.iter().map(|m| m.name.clone()).collect(),
            })
    }

    /// Ordered availability list of a model
    pub fn available_instances(&self, model: &str) -> Result<&[String], CatalogError> {
        Ok(&self.model(model)?.instances)
    }

    /// Model URL without the instance suffix: `{repository}:{dataset}-{model}`
    pub fn model_url(&self, model: &str) -> Result<String, CatalogError> {
        let entry = self.model(model)?;
        Ok(format!("{}:{}-{}", QOBLIB_REPOSITORY, self.name, entry.name))
    }

    /// Resolve a (model, instance) pair to its registry reference.
    ///
    /// The model must be declared. When the model enumerates its instances the
    /// name must be one of them; an empty list leaves the check to the store.
    pub fn resolve(&self, model: &str, instance: &str) -> Result<ImageReference, CatalogError> {
        let entry = self.model(model)?;
        if !entry.instances.is_empty() && !entry.instances.iter().any(|i| i == instance) {
            return Err(CatalogError::UnknownInstance {
                dataset: self.name.clone(),
                model: model.to_string(),
                instance: instance.to_string(),
            });
        }
        Ok(ImageReference::qoblib(&self.name, model, instance))
    }

    /// Human readable summary of the availability table
    pub fn availability_summary(&self) -> String {
        self.models
            .iter()
            .map(|m| {
                let instances = if m.instances.is_empty() {
                    "all published instances".to_string()
                } else {
                    m.instances.join(", ")
                };
                format!("- Model: {}, Instances: {}", m.name, instances)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

const ZIB_SOURCE: &str =
    "https://git.zib.de/qopt/qoblib-quantum-optimization-benchmarking-library/-/tree/main";

fn describe(title: &str, directory: &str) -> String {
    format!(
        "{} dataset in ommx format, originally provided by {}/{}?ref_type=heads.",
        title, ZIB_SOURCE, directory
    )
}

fn builtin(name: &str, description: String, models: Vec<ModelEntry>) -> Dataset {
    // Built-in tables always satisfy the constructor checks
    Dataset {
        name: name.to_string(),
        description,
        models,
    }
}

fn labs_instances() -> Vec<String> {
    (2..=100).map(|n| format!("labs{:03}", n)).collect()
}

impl Dataset {
    pub fn marketsplit() -> Self {
        builtin(
            "01_marketsplit",
            describe("Marketsplit", "01-marketsplit"),
            vec![
                ModelEntry::open("binary_linear"),
                ModelEntry::open("binary_unconstrained"),
            ],
        )
    }

    pub fn labs() -> Self {
        builtin(
            "02_labs",
            describe("Labs", "02-labs"),
            vec![
                ModelEntry::new("integer", labs_instances()),
                ModelEntry::new("quadratic_unconstrained", labs_instances()),
            ],
        )
    }

    pub fn birkhoff() -> Self {
        builtin(
            "03_birkhoff",
            describe("Birkhoff", "03-birkhoff"),
            vec![ModelEntry::open("integer_linear")],
        )
    }

    pub fn steiner() -> Self {
        builtin(
            "04_steiner",
            describe("Steiner", "04-steiner"),
            vec![ModelEntry::open("integer_linear")],
        )
    }

    pub fn sports() -> Self {
        builtin(
            "05_sports",
            describe("Sports", "05-sports"),
            vec![ModelEntry::open("mixed_integer_linear")],
        )
    }

    pub fn portfolio() -> Self {
        builtin(
            "06_portfolio",
            describe("Portfolio", "06-portfolio"),
            vec![
                ModelEntry::open("binary_quadratic"),
                ModelEntry::open("quadratic_unconstrained"),
            ],
        )
    }

    pub fn independent_set() -> Self {
        builtin(
            "07_independent_set",
            describe("Independent Set", "07-independentset"),
            vec![
                ModelEntry::open("binary_linear"),
                ModelEntry::open("binary_unconstrained"),
            ],
        )
    }

    pub fn network() -> Self {
        builtin(
            "08_network",
            describe("Network", "08-network"),
            vec![ModelEntry::open("integer_linear")],
        )
    }

    pub fn routing() -> Self {
        builtin(
            "09_routing",
            describe("Routing", "09-routing"),
            vec![ModelEntry::open("integer_linear")],
        )
    }

    pub fn topology() -> Self {
        builtin(
            "10_topology",
            describe("Topology", "10-topology"),
            vec![
                ModelEntry::open("flow_mip"),
                ModelEntry::open("seidel_linear"),
                ModelEntry::open("seidel_quadratic"),
            ],
        )
    }
}

/// Ordered collection of datasets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    datasets: Vec<Dataset>,
}

impl Catalog {
    pub fn new(datasets: Vec<Dataset>) -> Result<Self, CatalogError> {
        let mut names = BTreeSet::new();
        for dataset in &datasets {
            if !names.insert(dataset.name()) {
                return Err(CatalogError::Document(format!(
                    "dataset '{}' appears more than once",
                    dataset.name()
                )));
            }
        }
        Ok(Self { datasets })
    }

    /// The ten QOBLIB problem families
    pub fn qoblib() -> Self {
        Self {
            datasets: vec![
                Dataset::marketsplit(),
                Dataset::labs(),
                Dataset::birkhoff(),
                Dataset::steiner(),
                Dataset::sports(),
                Dataset::portfolio(),
                Dataset::independent_set(),
                Dataset::network(),
                Dataset::routing(),
                Dataset::topology(),
            ],
        }
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name()).collect()
    }

    pub fn get(&self, name: &str) -> Result<&Dataset, CatalogError> {
        self.datasets
            .iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| CatalogError::UnknownDataset(name.to_string()))
    }

    pub fn from_json(document: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog =
            serde_json::from_str(document).map_err(|e| CatalogError::Document(e.to_string()))?;
        Self::new(catalog.datasets)
    }

    pub fn to_json(&self) -> Result<String, CatalogError> {
        serde_json::to_string_pretty(self).map_err(|e| CatalogError::Document(e.to_string()))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::qoblib()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock() -> Dataset {
        Dataset::new(
            "mock",
            "This is a mock dataset.",
            vec![
                ModelEntry::new("model1", vec!["instance1".into(), "instance2".into()]),
                ModelEntry::new("model2", vec!["instanceA".into(), "instanceB".into()]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn model_urls_follow_the_tag_convention() {
        let dataset = mock();
        assert_eq!(
            dataset.model_url("model1").unwrap(),
            format!("{}:mock-model1", QOBLIB_REPOSITORY)
        );

        let reference = dataset.resolve("model2", "instanceB").unwrap();
        assert_eq!(reference.repository, QOBLIB_REPOSITORY);
        assert_eq!(reference.tag, "mock-model2-instanceB");
        assert_eq!(
            reference.to_string(),
            format!("{}:mock-model2-instanceB", QOBLIB_REPOSITORY)
        );
    }

    #[test]
    fn constructor_rejects_bad_definitions() {
        assert_eq!(
            Dataset::new("", "d", vec![ModelEntry::open("m")]),
            Err(CatalogError::EmptyName)
        );
        assert_eq!(
            Dataset::new("mock", "d", vec![]),
            Err(CatalogError::NoModels("mock".into()))
        );
        assert!(matches!(
            Dataset::new("mock", "d", vec![ModelEntry::open("m"), ModelEntry::open("m")]),
            Err(CatalogError::DuplicateModel { .. })
        ));
        assert!(matches!(
            Dataset::new(
                "mock",
                "d",
                vec![ModelEntry::new("m", vec!["a".into(), "a".into()])]
            ),
            Err(CatalogError::DuplicateInstance { .. })
        ));
    }

    #[test]
    fn resolve_distinguishes_unknown_model_and_instance() {
        let dataset = mock();
        assert!(matches!(
            dataset.resolve("model3", "instance1"),
            Err(CatalogError::UnknownModel { .. })
        ));
        assert!(matches!(
            dataset.resolve("model1", "instanceA"),
            Err(CatalogError::UnknownInstance { .. })
        ));
    }

    #[test]
    fn open_models_accept_any_instance_name() {
        let marketsplit = Dataset::marketsplit();
        let reference = marketsplit
            .resolve("binary_linear", "ms_03_050_002")
            .unwrap();
        assert_eq!(reference.tag, "01_marketsplit-binary_linear-ms_03_050_002");
    }

    #[test]
    fn labs_lists_every_size_for_both_models() {
        let labs = Dataset::labs();
        assert_eq!(labs.name(), "02_labs");
        assert_eq!(labs.model_names(), vec!["integer", "quadratic_unconstrained"]);
        for model in labs.model_names() {
            let instances = labs.available_instances(model).unwrap();
            assert_eq!(instances.len(), 99);
            assert_eq!(instances.first().map(String::as_str), Some("labs002"));
            assert_eq!(instances.last().map(String::as_str), Some("labs100"));
        }
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::qoblib();
        assert_eq!(catalog.datasets().len(), 10);
        for dataset in catalog.datasets() {
            let rebuilt = Dataset::new(
                dataset.name(),
                dataset.description(),
                dataset.models().to_vec(),
            );
            assert_eq!(rebuilt.as_ref(), Ok(dataset));
        }
        assert!(catalog.get("10_topology").is_ok());
        assert!(matches!(
            catalog.get("11_unknown"),
            Err(CatalogError::UnknownDataset(_))
        ));
    }

    #[test]
    fn json_documents_are_validated() {
        let json = Catalog::new(vec![mock()]).unwrap().to_json().unwrap();
        let parsed = Catalog::from_json(&json).unwrap();
        assert_eq!(parsed.get("mock").unwrap(), &mock());

        let invalid = r#"{"datasets": [{"name": "", "models": [{"name": "m"}]}]}"#;
        assert!(matches!(
            Catalog::from_json(invalid),
            Err(CatalogError::Document(_))
        ));
    }
}
