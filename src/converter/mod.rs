// Converter adapters: concrete implementations of InstanceConverter
// plus the packaging step shared by all of them

pub mod birkhoff;
pub mod builder;
pub mod factory;
pub mod independent_set;
pub mod labs;
pub mod marketsplit;
pub mod network;
pub mod portfolio;
pub mod qoblib_format;
pub mod routing;
pub mod sports;
pub mod steiner;
pub mod topology;

pub use birkhoff::BirkhoffIntegerLinear;
pub use factory::ConverterFactory;
pub use independent_set::{IndependentSetBinaryLinear, IndependentSetBinaryUnconstrained};
pub use labs::{LabsInteger, LabsQuadraticUnconstrained};
pub use marketsplit::{MarketsplitBinaryLinear, MarketsplitBinaryUnconstrained};
pub use network::NetworkIntegerLinear;
pub use portfolio::{PortfolioBinaryQuadratic, PortfolioQuadraticUnconstrained};
pub use routing::RoutingIntegerLinear;
pub use sports::SportsMixedIntegerLinear;
pub use steiner::SteinerIntegerLinear;
pub use topology::{TopologyFlowMip, TopologySeidelLinear, TopologySeidelQuadratic};

use tracing::{info, warn};

use crate::application::archive::Artifact;
use crate::domain::converter_service::{ConversionResult, InstanceConverter};
use crate::domain::models::InstanceMetadata;

pub const LICENSE: &str = "CC BY 4.0";
pub const PACKAGER: &str = "Jij-Inc.";

pub const QOBLIB_AUTHORS_ANNOTATION: &str = "org.ommx.qoblib.authors";
pub const SOLUTION_AUTHORS_ANNOTATION: &str = "org.ommx.v1.solution.authors";

/// Relative tolerance between the energy a solution file reports and its evaluation
pub const REPORTED_OBJECTIVE_RTOL: f64 = 1e-6;

pub const QOBLIB_AUTHORS: &[&str] = &[
    "Thorsten Koch",
    "David E. Bernal Neira",
    "Ying Chen",
    "Giorgio Cortiana",
    "Daniel J. Egger",
    "Raoul Heese",
    "Narendra N. Hegade",
    "Alejandro Gomez Cadavid",
    "Rhea Huang",
    "Toshinari Itoko",
    "Thomas Kleinert",
    "Pedro Maciel Xavier",
    "Naeimeh Mohseni",
    "Jhon A. Montanez-Barrera",
    "Koji Nakano",
    "Giacomo Nannicini",
    "Corey O’Meara",
    "Justin Pauckert",
    "Manuel Proissl",
    "Anurag Ramesh",
    "Maximilian Schicker",
    "Noriaki Shimada",
    "Mitsuharu Takeori",
    "Victor Valls",
    "David Van Bulck",
    "Stefan Woerner",
    "Christa Zoufal",
];

fn is_close(a: f64, b: f64, rtol: f64) -> bool {
    (a - b).abs() <= rtol * a.abs().max(b.abs())
}

/// Build a packaged artifact from QOBLIB sources.
///
/// A mismatching reported energy or an infeasible reference solution is
/// logged and kept; the stored solution is always the evaluated one.
pub fn convert(
    converter: &dyn InstanceConverter,
    name: &str,
    instance_data: &str,
    solution_data: Option<&str>,
) -> ConversionResult<Artifact> {
    let authors = QOBLIB_AUTHORS.join(", ");

    let mut instance = converter.build_instance(name, instance_data)?;
    instance.validate()?;

    let mut metadata = InstanceMetadata {
        title: name.to_string(),
        dataset: converter.title().to_string(),
        license: LICENSE.to_string(),
        authors: vec![PACKAGER.to_string()],
        annotations: std::mem::take(&mut instance.metadata.annotations),
    };
    metadata
        .annotations
        .insert(QOBLIB_AUTHORS_ANNOTATION.to_string(), authors.clone());
    instance = instance.with_metadata(metadata);

    info!(
        "Built {} {}/{} ({} variables, {} constraints)",
        name,
        converter.dataset(),
        converter.model(),
        instance.num_variables(),
        instance.num_constraints()
    );

    let mut artifact = Artifact::new(instance);
    if let Some(data) = solution_data {
        let reference = converter.read_solution(&artifact.instance, data)?;
        let solution = artifact.instance.evaluate(&reference.state)?;

        match reference.reported_objective {
            Some(reported) if !is_close(reported, solution.objective, REPORTED_OBJECTIVE_RTOL) => {
                warn!(
                    "{}: solution file reports {} but evaluation gives {}",
                    name, reported, solution.objective
                );
            }
            None => warn!("{}: solution file reports no objective", name),
            _ => {}
        }
        if !solution.feasible {
            warn!(
                "{}: reference solution violates {} constraints",
                name,
                solution.num_violated_constraints()
            );
        }

        artifact = artifact
            .with_solution(solution)
            .with_annotation(SOLUTION_AUTHORS_ANNOTATION, PACKAGER);
    }

    Ok(artifact.with_annotation(QOBLIB_AUTHORS_ANNOTATION, authors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::verification::verify_solution;

    #[test]
    fn convert_stamps_metadata_and_solution() {
        let converter = ConverterFactory::create("02_labs", "integer").unwrap();
        let artifact = convert(converter.as_ref(), "labs002", "", Some("# Energy: 1\n1\n1\n")).unwrap();

        let metadata = &artifact.instance.metadata;
        assert_eq!(metadata.title, "labs002");
        assert_eq!(metadata.license, LICENSE);
        assert_eq!(metadata.dataset, "Low Autocorrelation Binary Sequences (LABS)");
        assert!(metadata.annotations[QOBLIB_AUTHORS_ANNOTATION].starts_with("Thorsten Koch, "));

        let solution = artifact.solution.as_ref().unwrap();
        assert_eq!(solution.objective, 1.0);
        assert!(solution.feasible);
        assert!(verify_solution(&artifact.instance, solution).unwrap().is_consistent());
        assert_eq!(artifact.annotations[SOLUTION_AUTHORS_ANNOTATION], PACKAGER);
    }

    #[test]
    fn convert_without_solution() {
        let converter = ConverterFactory::create("07_independent_set", "binary_linear").unwrap();
        let artifact = convert(converter.as_ref(), "tiny", "p edge 2 1\ne 1 2\n", None).unwrap();
        assert!(artifact.solution.is_none());
        assert_eq!(artifact.instance.num_constraints(), 1);
        assert!(!artifact.annotations.contains_key(SOLUTION_AUTHORS_ANNOTATION));
    }

    #[test]
    fn converter_annotations_survive_packaging() {
        let converter = ConverterFactory::create("06_portfolio", "binary_quadratic").unwrap();
        let data = "1 AAA AAA 0.0001\n1 AAA 10\n";
        let artifact = convert(converter.as_ref(), "a001_t01_q1_b001", data, Some("x$AAA#1#1#0 1\n")).unwrap();

        let annotations = &artifact.instance.metadata.annotations;
        assert_eq!(annotations[portfolio::SYMBOLS_ANNOTATION], "AAA");
        assert!(annotations.contains_key(QOBLIB_AUTHORS_ANNOTATION));
        assert!(artifact.solution.is_some());
    }

    #[test]
    fn mismatching_energy_is_kept() {
        let converter = ConverterFactory::create("02_labs", "integer").unwrap();
        let artifact = convert(converter.as_ref(), "labs002", "", Some("# Energy: 5\n1\n1\n")).unwrap();
        assert_eq!(artifact.solution.unwrap().objective, 1.0);
    }

    #[test]
    fn tolerance_is_relative() {
        assert!(is_close(1_000_000.0, 1_000_000.5, REPORTED_OBJECTIVE_RTOL));
        assert!(!is_close(1.0, 1.01, REPORTED_OBJECTIVE_RTOL));
        assert!(is_close(0.0, 0.0, REPORTED_OBJECTIVE_RTOL));
    }
}
