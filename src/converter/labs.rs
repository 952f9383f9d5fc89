// Low Autocorrelation Binary Sequences formulations
// Instances are generated from the sequence length in the name (labsNNN);
// solutions list the binary sequence one value per line.

use super::qoblib_format::{parse_sol, SolutionFile};
use crate::domain::{
    converter_service::{ConversionError, ConversionResult, InstanceConverter, ReferenceSolution},
    function::Function,
    models::{Constraint, DecisionVariable, Instance, State},
    value_objects::{Bound, Sense, VariableId},
};

pub const DATASET: &str = "02_labs";
const TITLE: &str = "Low Autocorrelation Binary Sequences (LABS)";

/// Weight of the product-linearization penalty in the unconstrained model
pub const PENALTY_WEIGHT: f64 = 10_000.0;

/// Sequence length encoded in an instance name such as `labs017`
pub fn sequence_length(name: &str) -> ConversionResult<usize> {
    name.strip_prefix("labs")
        .and_then(|digits| digits.parse::<usize>().ok())
        .filter(|n| *n >= 2)
        .ok_or_else(|| ConversionError::InvalidName(name.to_string()))
}

/// Binary sequence from a solution file; must hold exactly `n` values
fn read_sequence(sol: &SolutionFile, n: usize) -> ConversionResult<Vec<f64>> {
    if sol.sequence.len() != n {
        return Err(ConversionError::Malformed(format!(
            "expected a sequence of {} values, found {}",
            n,
            sol.sequence.len()
        )));
    }
    if let Some(v) = sol.sequence.iter().find(|v| **v != 0.0 && **v != 1.0) {
        return Err(ConversionError::Malformed(format!(
            "sequence value {} is not binary",
            v
        )));
    }
    Ok(sol.sequence.clone())
}

/// Aperiodic autocorrelation at distance `k + 1` of the spin sequence `2x - 1`
fn autocorrelation(x: &[f64], k: usize) -> f64 {
    let n = x.len();
    (0..n - k - 1)
        .map(|t| (2.0 * x[t] - 1.0) * (2.0 * x[t + k + 1] - 1.0))
        .sum()
}

/// Integer formulation: `c_k` (ids `0..n-1`) equal the autocorrelations of
/// the spins built from `x_i` (ids `n-1..2n-1`); minimize `Σ c_k^2`.
pub struct LabsInteger;

impl LabsInteger {
    pub fn new() -> Self {
        Self
    }

    fn x_id(n: usize, i: usize) -> VariableId {
        (n - 1 + i) as VariableId
    }
}

impl Default for LabsInteger {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for LabsInteger {
    fn build_instance(&self, name: &str, _data: &str) -> ConversionResult<Instance> {
        let n = sequence_length(name)?;
        let limit = (n - 1) as f64;

        let mut variables = Vec::with_capacity(2 * n - 1);
        for k in 0..n - 1 {
            variables.push(
                DecisionVariable::integer(k as VariableId, Bound::new(-limit, limit))
                    .with_name("c", vec![k as i64]),
            );
        }
        for i in 0..n {
            variables.push(DecisionVariable::binary(Self::x_id(n, i)).with_name("x", vec![i as i64]));
        }

        let mut objective = Function::zero();
        for k in 0..n - 1 {
            objective.add_quadratic(k as VariableId, k as VariableId, 1.0);
        }

        let mut constraints = Vec::with_capacity(n - 1);
        for k in 0..n - 1 {
            let mut f = Function::variable(k as VariableId);
            for t in 0..n - k - 1 {
                let a = Function::variable(Self::x_id(n, t)) * 2.0 - Function::constant(1.0);
                let b =
                    Function::variable(Self::x_id(n, t + k + 1)) * 2.0 - Function::constant(1.0);
                f = f - a.try_mul(&b)?;
            }
            constraints.push(
                Constraint::equal_to_zero(k as u64, f.prune())
                    .with_name("autocorrelation", vec![k as i64]),
            );
        }

        Ok(Instance::new(Sense::Minimize, objective)
            .with_variables(variables)
            .with_constraints(constraints))
    }

    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        let sol = parse_sol(data)?;
        let n = (instance.num_variables() + 1) / 2;
        let x = read_sequence(&sol, n)?;

        // c_k is fixed by its constraint once x is known
        let mut state = State::new();
        for k in 0..n - 1 {
            state.insert(k as VariableId, autocorrelation(&x, k));
        }
        for (i, value) in x.iter().enumerate() {
            state.insert(Self::x_id(n, i), *value);
        }

        Ok(ReferenceSolution {
            state,
            reported_objective: sol.reported_objective(),
        })
    }

    fn dataset(&self) -> &str {
        DATASET
    }

    fn model(&self) -> &str {
        "integer"
    }

    fn title(&self) -> &str {
        TITLE
    }
}

/// Quadratic unconstrained formulation with `z_{i,k}` standing for
/// `x_i * x_{i+k+1}`, enforced by a penalty.
///
/// Ids: `z_{i,k} = i * (n - 1) + k` for `i < n`, `k < n - 1`; `x_i = n * (n - 1) + i`.
pub struct LabsQuadraticUnconstrained {
    penalty: f64,
}

impl LabsQuadraticUnconstrained {
    pub fn new() -> Self {
        Self {
            penalty: PENALTY_WEIGHT,
        }
    }

    fn z_id(n: usize, i: usize, k: usize) -> VariableId {
        (i * (n - 1) + k) as VariableId
    }

    fn x_id(n: usize, i: usize) -> VariableId {
        (n * (n - 1) + i) as VariableId
    }
}

impl Default for LabsQuadraticUnconstrained {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for LabsQuadraticUnconstrained {
    fn build_instance(&self, name: &str, _data: &str) -> ConversionResult<Instance> {
        let n = sequence_length(name)?;

        let mut variables = Vec::with_capacity(n * n);
        for i in 0..n {
            for k in 0..n - 1 {
                variables.push(
                    DecisionVariable::binary(Self::z_id(n, i, k))
                        .with_name("z", vec![i as i64, k as i64]),
                );
            }
        }
        for i in 0..n {
            variables.push(DecisionVariable::binary(Self::x_id(n, i)).with_name("x", vec![i as i64]));
        }

        let mut objective = Function::zero();
        for k in 0..n - 1 {
            let mut correlation = Function::zero();
            for i in 0..n - k - 1 {
                let (z, xi, xj) = (
                    Self::z_id(n, i, k),
                    Self::x_id(n, i),
                    Self::x_id(n, i + k + 1),
                );
                correlation.add_linear(z, 4.0);
                correlation.add_linear(xi, -2.0);
                correlation.add_linear(xj, -2.0);
                correlation.add_constant(1.0);

                // zero exactly when z = xi * xj
                objective.add_linear(z, 3.0 * self.penalty);
                objective.add_quadratic(z, xi, -2.0 * self.penalty);
                objective.add_quadratic(z, xj, -2.0 * self.penalty);
                objective.add_quadratic(xi, xj, self.penalty);
            }
            objective = objective + correlation.try_mul(&correlation)?;
        }

        Ok(Instance::new(Sense::Minimize, objective.prune()).with_variables(variables))
    }

    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        let sol = parse_sol(data)?;
        // n * (n - 1) + n = n^2 variables
        let n = (instance.num_variables() as f64).sqrt().round() as usize;
        let x = read_sequence(&sol, n)?;

        let mut state = State::new();
        for i in 0..n {
            for k in 0..n - 1 {
                let partner = x.get(i + k + 1).copied().unwrap_or(0.0);
                state.insert(Self::z_id(n, i, k), x[i] * partner);
            }
        }
        for (i, value) in x.iter().enumerate() {
            state.insert(Self::x_id(n, i), *value);
        }

        Ok(ReferenceSolution {
            state,
            reported_objective: sol.reported_objective(),
        })
    }

    fn dataset(&self) -> &str {
        DATASET
    }

    fn model(&self) -> &str {
        "quadratic_unconstrained"
    }

    fn title(&self) -> &str {
        TITLE
    }
}
