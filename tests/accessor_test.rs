use std::sync::Arc;

use qoblib::application::archive::ARCHIVE_MAGIC;
use qoblib::{
    convert, verify_solution, ArtifactStore, ConverterFactory, Dataset, DatasetAccessor,
    DatasetError, ImageReference, LocalArtifactStore, Uploader,
};

fn labs_archive(model: &str, name: &str, sol: &str) -> qoblib::Artifact {
    let converter = ConverterFactory::create("02_labs", model).unwrap();
    convert(converter.as_ref(), name, "", Some(sol)).unwrap()
}

/// Scratch store holding labs002 for both LABS models
fn labs_store(dir: &tempfile::TempDir) -> Arc<LocalArtifactStore> {
    let store = Arc::new(LocalArtifactStore::new(dir.path()));
    let uploader = Uploader::new(store.clone()).with_verification(true);
    let labs = Dataset::labs();
    for model in ["integer", "quadratic_unconstrained"] {
        let artifact = labs_archive(model, "labs002", "# Energy: 1\n1\n1\n");
        uploader
            .push_artifact(&labs, model, "labs002", &artifact)
            .unwrap();
    }
    store
}

#[test]
fn labs002_integer_evaluates_to_one() {
    let dir = tempfile::tempdir().unwrap();
    let accessor = DatasetAccessor::new(Dataset::labs(), labs_store(&dir));

    let (instance, solution) = accessor.load("integer", "labs002").unwrap();
    let solution = solution.expect("labs002 ships a reference solution");

    assert_eq!(instance.metadata.title, "labs002");
    assert_eq!(solution.objective, 1.0);
    assert!(solution.feasible);
    assert!(verify_solution(&instance, &solution).unwrap().is_consistent());
}

#[test]
fn labs002_quadratic_unconstrained_loads() {
    let dir = tempfile::tempdir().unwrap();
    let accessor = DatasetAccessor::new(Dataset::labs(), labs_store(&dir));

    let (instance, solution) = accessor.load("quadratic_unconstrained", "labs002").unwrap();
    assert!(instance.constraints.is_empty());
    assert_eq!(solution.unwrap().objective, 1.0);
}

#[test]
fn unknown_model_is_an_invalid_argument() {
    let dir = tempfile::tempdir().unwrap();
    let accessor = DatasetAccessor::new(Dataset::labs(), labs_store(&dir));

    let err = accessor.load("binary_linear", "labs002").unwrap_err();
    assert!(matches!(err, DatasetError::InvalidArgument(_)));
    assert!(err.to_string().contains("quadratic_unconstrained"));
}

#[test]
fn instance_outside_the_availability_list_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let accessor = DatasetAccessor::new(Dataset::labs(), labs_store(&dir));

    let err = accessor.load("integer", "labs101").unwrap_err();
    assert!(matches!(err, DatasetError::NotFound(_)));
    assert!(err.to_string().contains("- Model: integer, Instances: labs002, labs003"));
}

#[test]
fn declared_but_unpublished_instance_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let accessor = DatasetAccessor::new(Dataset::labs(), labs_store(&dir));

    assert!(matches!(
        accessor.load("integer", "labs003"),
        Err(DatasetError::NotFound(_))
    ));
}

#[test]
fn open_models_defer_to_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalArtifactStore::new(dir.path()));
    let accessor = DatasetAccessor::new(Dataset::marketsplit(), store);

    let reference = accessor.reference("binary_linear", "ms_99_999_999").unwrap();
    assert_eq!(reference.tag, "01_marketsplit-binary_linear-ms_99_999_999");
    assert!(matches!(
        accessor.load("binary_linear", "ms_99_999_999"),
        Err(DatasetError::NotFound(_))
    ));
}

#[test]
fn corrupted_archive_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = labs_store(&dir);
    let reference = ImageReference::qoblib("02_labs", "integer", "labs003");
    let mut bytes = ARCHIVE_MAGIC.to_vec();
    bytes.extend_from_slice(&[0xff, 0xff, 0xff]);
    store.push(&reference, &bytes).unwrap();

    let accessor = DatasetAccessor::new(Dataset::labs(), store);
    assert!(matches!(
        accessor.load("integer", "labs003"),
        Err(DatasetError::InvalidArchive { .. })
    ));
}

#[test]
fn repeated_loads_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let accessor = DatasetAccessor::new(Dataset::labs(), labs_store(&dir));

    let first = accessor.load("integer", "labs002").unwrap();
    let second = accessor.load("integer", "labs002").unwrap();
    assert_eq!(first, second);
}

#[test]
fn every_declared_labs_instance_loads() {
    let dir = tempfile::tempdir().unwrap();
    let empty = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalArtifactStore::new(dir.path()));
    let labs = Dataset::labs();
    let uploader = Uploader::new(store.clone());

    for model in ["integer", "quadratic_unconstrained"] {
        let converter = ConverterFactory::create(labs.name(), model).unwrap();
        for name in labs.available_instances(model).unwrap() {
            let artifact = convert(converter.as_ref(), name, "", None).unwrap();
            uploader.push_artifact(&labs, model, name, &artifact).unwrap();
        }
    }

    let accessor = DatasetAccessor::new(labs.clone(), store);
    let missing = DatasetAccessor::new(
        labs.clone(),
        Arc::new(LocalArtifactStore::new(empty.path())),
    );
    let mut loaded = 0;
    for model in ["integer", "quadratic_unconstrained"] {
        for name in labs.available_instances(model).unwrap() {
            let (instance, solution) = accessor.load(model, name).unwrap();
            assert_eq!(&instance.metadata.title, name);
            assert!(instance.num_variables() > 0);
            assert!(solution.is_none());
            assert!(matches!(
                missing.load(model, name),
                Err(DatasetError::NotFound(_))
            ));
            loaded += 1;
        }
    }
    assert_eq!(loaded, 2 * 99);
}
