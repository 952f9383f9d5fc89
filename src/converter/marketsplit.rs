// Market split formulations
// Source: QOBLIB .dat matrices, .sol files with x#k (and optionally s#i) entries

use super::qoblib_format::{parse_dat, parse_sol, QoblibMatrix, SolutionFile};
use crate::domain::{
    converter_service::{ConversionError, ConversionResult, InstanceConverter, ReferenceSolution},
    function::Function,
    models::{Constraint, DecisionVariable, Instance, State},
    value_objects::{Bound, Sense, VariableId},
};

pub const DATASET: &str = "01_marketsplit";
const TITLE: &str = "Market Split";

/// Upper bound of the slack variables
pub const SLACK_UPPER_BOUND: f64 = 100_000.0;

fn reject_empty(matrix: &QoblibMatrix) -> ConversionResult<()> {
    if matrix.rows == 0 || matrix.cols == 0 {
        return Err(ConversionError::Malformed(format!(
            "market split needs at least one row and column, got {}x{}",
            matrix.rows, matrix.cols
        )));
    }
    Ok(())
}

fn require_values(sol: &SolutionFile) -> ConversionResult<()> {
    if sol.values_of("x").is_none() {
        return Err(ConversionError::Malformed(
            "solution has no x#k entries".to_string(),
        ));
    }
    Ok(())
}

/// Constrained formulation with one bounded slack per row.
///
/// Variables: `s_i` (ids `0..m`) then `x_j` (ids `m..m+n`).
pub struct MarketsplitBinaryLinear;

impl MarketsplitBinaryLinear {
    pub fn new() -> Self {
        Self
    }

    fn x_id(rows: usize, j: usize) -> VariableId {
        (rows + j) as VariableId
    }
}

impl Default for MarketsplitBinaryLinear {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for MarketsplitBinaryLinear {
    fn build_instance(&self, _name: &str, data: &str) -> ConversionResult<Instance> {
        let matrix = parse_dat(data)?;
        reject_empty(&matrix)?;
        let (m, n) = (matrix.rows, matrix.cols);

        let mut variables = Vec::with_capacity(m + n);
        for i in 0..m {
            variables.push(
                DecisionVariable::integer(i as VariableId, Bound::new(0.0, SLACK_UPPER_BOUND))
                    .with_name("s", vec![i as i64]),
            );
        }
        for j in 0..n {
            variables.push(DecisionVariable::binary(Self::x_id(m, j)).with_name("x", vec![j as i64]));
        }

        let mut objective = Function::zero();
        for i in 0..m {
            objective.add_linear(i as VariableId, 1.0);
        }

        let constraints = (0..m)
            .map(|i| {
                let mut f = Function::variable(i as VariableId);
                for (j, &a) in matrix.a[i].iter().enumerate() {
                    if a != 0.0 {
                        f.add_linear(Self::x_id(m, j), a);
                    }
                }
                f.add_constant(-matrix.b[i]);
                Constraint::equal_to_zero(i as u64, f).with_name("market_split", vec![i as i64])
            })
            .collect();

        Ok(Instance::new(Sense::Minimize, objective)
            .with_variables(variables)
            .with_constraints(constraints))
    }

    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        let sol = parse_sol(data)?;
        require_values(&sol)?;

        let m = instance.num_constraints();
        let n = instance.num_variables() - m;
        let slacks = sol.dense("s", m)?;
        let xs = sol.dense("x", n)?;

        let mut state = State::new();
        for (i, value) in slacks.into_iter().enumerate() {
            state.insert(i as VariableId, value);
        }
        for (j, value) in xs.into_iter().enumerate() {
            state.insert(Self::x_id(m, j), value);
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
        "binary_linear"
    }

    fn title(&self) -> &str {
        TITLE
    }
}

/// Squared-residual formulation over `x_j` (ids `0..n`)
pub struct MarketsplitBinaryUnconstrained;

impl MarketsplitBinaryUnconstrained {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarketsplitBinaryUnconstrained {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for MarketsplitBinaryUnconstrained {
    fn build_instance(&self, _name: &str, data: &str) -> ConversionResult<Instance> {
        let matrix = parse_dat(data)?;
        reject_empty(&matrix)?;

        let variables = (0..matrix.cols)
            .map(|j| DecisionVariable::binary(j as VariableId).with_name("x", vec![j as i64]))
            .collect();

        let mut objective = Function::zero();
        for (row, &b) in matrix.a.iter().zip(&matrix.b) {
            let mut residual = Function::constant(b);
            for (j, &a) in row.iter().enumerate() {
                if a != 0.0 {
                    residual.add_linear(j as VariableId, -a);
                }
            }
            objective = objective + residual.try_mul(&residual)?;
        }

        Ok(Instance::new(Sense::Minimize, objective.prune()).with_variables(variables))
    }

    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        let sol = parse_sol(data)?;
        require_values(&sol)?;

        let state = sol.dense("x", instance.num_variables())?
            .into_iter()
            .enumerate()
            .map(|(j, value)| (j as VariableId, value))
            .collect();

        Ok(ReferenceSolution {
            state,
            reported_objective: sol.reported_objective(),
        })
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
