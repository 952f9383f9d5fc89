// Maximum independent set formulations over DIMACS graphs

use super::qoblib_format::{parse_gph, parse_sol, Graph, SolutionFile};
use crate::domain::{
    converter_service::{ConversionError, ConversionResult, InstanceConverter, ReferenceSolution},
    function::Function,
    models::{Constraint, DecisionVariable, Instance, State},
    value_objects::{Sense, VariableId},
};

pub const DATASET: &str = "07_independent_set";
const TITLE: &str = "Maximum Independent Set";

/// Weight of an edge violation in the unconstrained model
pub const EDGE_PENALTY: f64 = 2.0;

fn vertex_variables(graph: &Graph) -> Vec<DecisionVariable> {
    (0..graph.vertices)
        .map(|v| DecisionVariable::binary(v as VariableId).with_name("x", vec![v as i64]))
        .collect()
}

fn vertex_count(graph: &Graph) -> Function {
    let mut f = Function::zero();
    for v in 0..graph.vertices {
        f.add_linear(v as VariableId, 1.0);
    }
    f
}

/// Read either `x#i value` lines (1-based) or a list of selected vertices.
///
/// Index lists may be 0- or 1-based; 1-based wins when both readings fit.
/// Without an objective header, an index list reports its size.
fn read_selection(sol: &SolutionFile, vertices: usize) -> ConversionResult<ReferenceSolution> {
    let mut values = vec![0.0; vertices];

    let reported_objective = if let Some(entries) = sol.values_of("x") {
        for (&index, &value) in entries {
            if index == 0 || index > vertices {
                return Err(ConversionError::Malformed(format!(
                    "x#{} is outside 1..={}",
                    index, vertices
                )));
            }
            values[index - 1] = value;
        }
        sol.reported_objective()
    } else {
        if sol.sequence.is_empty() {
            return Err(ConversionError::Malformed(
                "expected 'x#i value' lines or one vertex index per line".to_string(),
            ));
        }
        let mut selected = Vec::with_capacity(sol.sequence.len());
        for &v in &sol.sequence {
            if v.fract() != 0.0 || v < 0.0 {
                return Err(ConversionError::Malformed(format!(
                    "'{}' is not a vertex index",
                    v
                )));
            }
            selected.push(v as usize);
        }

        let one_based = selected.iter().all(|&v| (1..=vertices).contains(&v));
        let zero_based = selected.iter().all(|&v| v < vertices);
        let offset = match (one_based, zero_based) {
            (true, _) => 1,
            (false, true) => 0,
            (false, false) => {
                return Err(ConversionError::Malformed(format!(
                    "vertex indices fit neither 0..{} nor 1..={}",
                    vertices, vertices
                )))
            }
        };
        for v in selected {
            values[v - offset] = 1.0;
        }
        sol.reported_objective()
            .or_else(|| Some(values.iter().sum()))
    };

    let state: State = values
        .into_iter()
        .enumerate()
        .map(|(v, value)| (v as VariableId, value))
        .collect();

    Ok(ReferenceSolution {
        state,
        reported_objective,
    })
}

/// Maximize the number of chosen vertices; `x_u + x_v <= 1` per edge
pub struct IndependentSetBinaryLinear;

impl IndependentSetBinaryLinear {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IndependentSetBinaryLinear {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for IndependentSetBinaryLinear {
    fn build_instance(&self, _name: &str, data: &str) -> ConversionResult<Instance> {
        let graph = parse_gph(data)?;

        let constraints = graph
            .edges
            .iter()
            .enumerate()
            .map(|(e, &(u, v))| {
                let f = Function::variable(u as VariableId) + Function::variable(v as VariableId)
                    - Function::constant(1.0);
                Constraint::less_than_or_equal_to_zero(e as u64, f)
                    .with_name("edge", vec![u as i64, v as i64])
            })
            .collect();

        Ok(Instance::new(Sense::Maximize, vertex_count(&graph))
            .with_variables(vertex_variables(&graph))
            .with_constraints(constraints))
    }

    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        read_selection(&parse_sol(data)?, instance.num_variables())
    }

    fn dataset(&self) -> &str {
        DATASET
    }

    fn model(&self) -> &str {
        "binary_linear"
    }

    fn title(&self) -> &str {
        TITLE
    }
}

/// Maximize `Σ x_v - 2 Σ_(u,v) x_u x_v`
pub struct IndependentSetBinaryUnconstrained;

impl IndependentSetBinaryUnconstrained {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IndependentSetBinaryUnconstrained {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for IndependentSetBinaryUnconstrained {
    fn build_instance(&self, _name: &str, data: &str) -> ConversionResult<Instance> {
        let graph = parse_gph(data)?;

        let mut objective = vertex_count(&graph);
        for &(u, v) in &graph.edges {
            objective.add_quadratic(u as VariableId, v as VariableId, -EDGE_PENALTY);
        }

        Ok(Instance::new(Sense::Maximize, objective).with_variables(vertex_variables(&graph)))
    }

    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        read_selection(&parse_sol(data)?, instance.num_variables())
    }

    fn dataset(&self) -> &str {
        DATASET
    }

    fn model(&self) -> &str {
        "binary_unconstrained"
    }

    fn title(&self) -> &str {
        TITLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // path 1 - 2 - 3 - 4 plus a duplicate edge
    const GPH: &str = "c path\np edge 4 4\ne 1 2\ne 2 3\ne 3 4\ne 2 1\n";

    #[test]
    fn linear_model_from_index_list() {
        let converter = IndependentSetBinaryLinear::new();
        let instance = converter.build_instance("path4", GPH).unwrap();
        instance.validate().unwrap();
        assert_eq!(instance.num_variables(), 4);
        assert_eq!(instance.num_constraints(), 3);

        // 1-based list {1, 3}
        let reference = converter.read_solution(&instance, "1\n3\n").unwrap();
        assert_eq!(reference.reported_objective, Some(2.0));
        assert_eq!(reference.state.get(0), Some(1.0));
        assert_eq!(reference.state.get(2), Some(1.0));

        let solution = instance.evaluate(&reference.state).unwrap();
        assert_eq!(solution.objective, 2.0);
        assert!(solution.feasible);
    }

    #[test]
    fn zero_based_lists_and_violations() {
        let converter = IndependentSetBinaryLinear::new();
        let instance = converter.build_instance("path4", GPH).unwrap();

        // contains 0, so it must be 0-based: vertices 0 and 1 are adjacent
        let reference = converter.read_solution(&instance, "0\n1\n").unwrap();
        let solution = instance.evaluate(&reference.state).unwrap();
        assert!(!solution.feasible);
        assert_eq!(solution.num_violated_constraints(), 1);

        assert!(converter.read_solution(&instance, "0\n4\n").is_err());
    }

    #[test]
    fn unconstrained_model_from_key_values() {
        let converter = IndependentSetBinaryUnconstrained::new();
        let instance = converter.build_instance("path4", GPH).unwrap();
        assert!(instance.constraints.is_empty());

        let reference = converter
            .read_solution(&instance, "# Objective value = 2\nx#2 1\nx#4 1\n")
            .unwrap();
        assert_eq!(reference.reported_objective, Some(2.0));
        assert_eq!(instance.evaluate(&reference.state).unwrap().objective, 2.0);

        // adjacent pair: 2 - 2
        let reference = converter.read_solution(&instance, "x#1 1\nx#2 1\n").unwrap();
        assert_eq!(reference.reported_objective, None);
        assert_eq!(instance.evaluate(&reference.state).unwrap().objective, 0.0);
    }
}
