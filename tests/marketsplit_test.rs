use std::sync::Arc;

use qoblib::{
    convert, verify_solution, ConverterFactory, Dataset, DatasetAccessor, LocalArtifactStore,
    Uploader,
};

const ROWS: usize = 3;
const COLS: usize = 50;

// Deterministic coefficients in 0..100
fn coefficient(i: usize, j: usize) -> u64 {
    ((i * 37 + j * 11 + i * j * 7) % 100) as u64
}

fn chosen(j: usize) -> bool {
    j % 3 == 0 || j % 7 == 0
}

/// ms_03_050_002-shaped instance whose right-hand sides are hit exactly
fn dat_and_sol() -> (String, String) {
    let mut dat = String::from("# synthetic market split\n");
    dat.push_str(&format!("{} {}\n", ROWS, COLS));
    for i in 0..ROWS {
        let row: Vec<String> = (0..COLS).map(|j| coefficient(i, j).to_string()).collect();
        let b: u64 = (0..COLS).filter(|&j| chosen(j)).map(|j| coefficient(i, j)).sum();
        dat.push_str(&format!("{} {}\n", row.join(" "), b));
    }

    let mut sol = String::from("# Objective value = 0\n");
    for j in (0..COLS).filter(|&j| chosen(j)) {
        sol.push_str(&format!("x#{} 1\n", j + 1));
    }
    (dat, sol)
}

#[test]
fn ms_03_050_002_reproduces_its_stored_objective() {
    let (dat, sol) = dat_and_sol();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalArtifactStore::new(dir.path()));
    let dataset = Dataset::marketsplit();
    let uploader = Uploader::new(store.clone()).with_verification(true);

    for model in ["binary_linear", "binary_unconstrained"] {
        let converter = ConverterFactory::create(dataset.name(), model).unwrap();
        let artifact = convert(converter.as_ref(), "ms_03_050_002", &dat, Some(sol.as_str())).unwrap();
        uploader
            .push_artifact(&dataset, model, "ms_03_050_002", &artifact)
            .unwrap();
    }

    let accessor = DatasetAccessor::new(dataset, store);

    let (instance, solution) = accessor.load("binary_linear", "ms_03_050_002").unwrap();
    let solution = solution.unwrap();
    assert_eq!(instance.num_variables(), ROWS + COLS);
    assert_eq!(instance.num_constraints(), ROWS);
    assert_eq!(solution.objective, 0.0);
    assert!(solution.feasible);
    let report = verify_solution(&instance, &solution).unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.recomputed_objective, solution.objective);

    let (instance, solution) = accessor
        .load("binary_unconstrained", "ms_03_050_002")
        .unwrap();
    let solution = solution.unwrap();
    assert_eq!(instance.num_variables(), COLS);
    assert_eq!(solution.objective, 0.0);
    assert!(verify_solution(&instance, &solution).unwrap().is_consistent());
}

#[test]
fn a_wrong_assignment_is_stored_as_infeasible() {
    let (dat, _) = dat_and_sol();
    let converter = ConverterFactory::create("01_marketsplit", "binary_linear").unwrap();
    let artifact = convert(converter.as_ref(), "ms_03_050_002", &dat, Some("x#2 1\n")).unwrap();

    let solution = artifact.solution.unwrap();
    assert!(!solution.feasible);
    assert_eq!(solution.objective, 0.0);
    assert!(verify_solution(&artifact.instance, &solution)
        .unwrap()
        .is_consistent());
}
