// Birkhoff decomposition: write a scaled doubly stochastic matrix as a sum of
// as few integer-weighted permutation matrices as possible
// Source: JSON entries {n, scale, scaled_doubly_stochastic_matrix}, either one
// entry or a file keyed by instance number ("001", ...)

use itertools::Itertools;
use serde::Deserialize;
use serde_json::Value;

use super::builder::{zero_state, ConstraintList};
use super::qoblib_format::parse_sol;
use crate::domain::{
    converter_service::{ConversionError, ConversionResult, InstanceConverter, ReferenceSolution},
    function::Function,
    models::{DecisionVariable, Instance},
    value_objects::{Bound, Sense, VariableId},
};

pub const DATASET: &str = "03_birkhoff";
const TITLE: &str = "Birkhoff";

/// Largest matrix order accepted; 8! permutations already give 80640 variables
pub const MAX_ORDER: usize = 8;

fn malformed(message: impl Into<String>) -> ConversionError {
    ConversionError::Malformed(message.into())
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    n: usize,
    scale: u64,
    scaled_doubly_stochastic_matrix: Value,
}

/// One decomposition problem
#[derive(Debug, Clone, PartialEq)]
pub struct BirkhoffEntry {
    pub n: usize,
    pub scale: u64,
    /// Row-major `n * n` matrix
    pub matrix: Vec<f64>,
}

fn flatten(value: &Value, out: &mut Vec<f64>) -> ConversionResult<()> {
    match value {
        Value::Number(number) => {
            let v = number
                .as_f64()
                .ok_or_else(|| malformed(format!("'{}' is not a number", number)))?;
            out.push(v);
        }
        Value::Array(items) => {
            for item in items {
                flatten(item, out)?;
            }
        }
        other => return Err(malformed(format!("unexpected matrix element {}", other))),
    }
    Ok(())
}

/// Trailing number of a name such as `bhD-3-001`
fn instance_number(name: &str) -> ConversionResult<u64> {
    name.rsplit(|c: char| c == '-' || c == '_')
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| ConversionError::InvalidName(name.to_string()))
}

/// Pick the entry of `name` from a single-entry or keyed JSON document
pub fn parse_entry(name: &str, data: &str) -> ConversionResult<BirkhoffEntry> {
    let document: Value =
        serde_json::from_str(data).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;
    let object = document
        .as_object()
        .ok_or_else(|| malformed("expected a JSON object"))?;

    let entry = if object.contains_key("n") {
        &document
    } else {
        let number = instance_number(name)?;
        object
            .iter()
            .find(|(key, _)| key.parse::<u64>().ok() == Some(number))
            .map(|(_, entry)| entry)
            .ok_or_else(|| malformed(format!("no entry {} for '{}'", number, name)))?
    };

    let raw = RawEntry::deserialize(entry).map_err(|e| malformed(e.to_string()))?;
    let mut matrix = Vec::new();
    flatten(&raw.scaled_doubly_stochastic_matrix, &mut matrix)?;

    if raw.n == 0 || raw.n > MAX_ORDER {
        return Err(malformed(format!(
            "matrix order {} is outside 1..={}",
            raw.n, MAX_ORDER
        )));
    }
    if matrix.len() != raw.n * raw.n {
        return Err(malformed(format!(
            "expected {} matrix entries for n={}, found {}",
            raw.n * raw.n,
            raw.n,
            matrix.len()
        )));
    }

    Ok(BirkhoffEntry {
        n: raw.n,
        scale: raw.scale,
        matrix,
    })
}

/// Permutations of `0..n` in lexicographic order; `p[row]` is the column of the 1
pub fn permutations(n: usize) -> Vec<Vec<usize>> {
    (0..n).permutations(n).collect()
}

/// Integer formulation over the permutation list.
///
/// Variables: `z_i` (ids `0..N`) selects permutation `i`, `x_i` (ids `N..2N`)
/// is its integer weight in `[0, scale]`, with `N = n!`.
pub struct BirkhoffIntegerLinear;

impl BirkhoffIntegerLinear {
    pub fn new() -> Self {
        Self
    }

    fn z_id(i: usize) -> VariableId {
        i as VariableId
    }

    fn x_id(count: usize, i: usize) -> VariableId {
        (count + i) as VariableId
    }
}

impl Default for BirkhoffIntegerLinear {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for BirkhoffIntegerLinear {
    fn build_instance(&self, name: &str, data: &str) -> ConversionResult<Instance> {
        let entry = parse_entry(name, data)?;
        let perms = permutations(entry.n);
        let count = perms.len();
        let scale = entry.scale as f64;

        let mut variables = Vec::with_capacity(2 * count);
        for i in 0..count {
            variables.push(DecisionVariable::binary(Self::z_id(i)).with_name("z", vec![i as i64]));
        }
        for i in 0..count {
            variables.push(
                DecisionVariable::integer(Self::x_id(count, i), Bound::new(0.0, scale))
                    .with_name("x", vec![i as i64]),
            );
        }

        let mut objective = Function::zero();
        for i in 0..count {
            objective.add_linear(Self::z_id(i), 1.0);
        }

        let mut constraints = ConstraintList::new();

        let mut total = Function::constant(-scale);
        for i in 0..count {
            total.add_linear(Self::x_id(count, i), 1.0);
        }
        constraints.equal(total, "c1", &[]);

        for row in 0..entry.n {
            for col in 0..entry.n {
                let mut f = Function::constant(-entry.matrix[row * entry.n + col]);
                for (i, perm) in perms.iter().enumerate() {
                    if perm[row] == col {
                        f.add_linear(Self::x_id(count, i), 1.0);
                    }
                }
                constraints.equal(f, "c2", &[row, col]);
            }
        }

        for i in 0..count {
            let mut f = Function::variable(Self::x_id(count, i));
            f.add_linear(Self::z_id(i), -scale);
            constraints.less_or_equal(f, "c3", &[i]);
        }

        Ok(Instance::new(Sense::Minimize, objective)
            .with_variables(variables)
            .with_constraints(constraints.into_vec()))
    }

    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        let sol = parse_sol(data)?;
        let count = instance.num_variables() / 2;
        if sol.values_of("z").is_none() && sol.values_of("x").is_none() {
            return Err(malformed("solution has no z#k or x#k entries"));
        }

        let mut state = zero_state(instance);
        for (i, value) in sol.dense("z", count)?.into_iter().enumerate() {
            state.insert(Self::z_id(i), value);
        }
        for (i, value) in sol.dense("x", count)?.into_iter().enumerate() {
            state.insert(Self::x_id(count, i), value);
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
        "integer_linear"
    }

    fn title(&self) -> &str {
        TITLE
    }
}
