// Network design: choose a 2-regular directed topology and route the demand
// of every origin over it, minimizing the largest arc load
// Source: a header `n [M [intscale]]` followed by the n x n demand matrix

use super::builder::{zero_state, ConstraintList};
use super::qoblib_format::parse_sol;
use crate::domain::{
    converter_service::{ConversionError, ConversionResult, InstanceConverter, ReferenceSolution},
    function::Function,
    models::{DecisionVariable, Instance},
    value_objects::{Bound, Sense, VariableId},
};

pub const DATASET: &str = "08_network";
const TITLE: &str = "Network";

/// In- and out-degree of every node
pub const DEGREE: f64 = 2.0;

fn malformed(message: impl Into<String>) -> ConversionError {
    ConversionError::Malformed(message.into())
}

/// Traffic matrix with its flow capacity and integer scaling
#[derive(Debug, Clone, PartialEq)]
pub struct Demand {
    pub nodes: usize,
    /// Row-major demand from origin `k` to node `i`
    pub traffic: Vec<f64>,
    /// Capacity of a single arc before scaling; defaults to the total demand
    pub capacity: f64,
    pub intscale: f64,
}

impl Demand {
    pub fn traffic(&self, k: usize, i: usize) -> f64 {
        self.traffic[k * self.nodes + i]
    }
}

pub fn parse_demand(data: &str) -> ConversionResult<Demand> {
    let mut lines = data
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let header = lines.next().ok_or_else(|| malformed("no data lines found"))?;
    let header = header
        .split_whitespace()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| malformed(format!("'{}' is not a number", t)))
        })
        .collect::<ConversionResult<Vec<f64>>>()?;

    let nodes = match header.first() {
        Some(&n) if n >= 2.0 && n.fract() == 0.0 => n as usize,
        _ => return Err(malformed("header must start with a node count of at least 2")),
    };

    let traffic = lines
        .flat_map(str::split_whitespace)
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| malformed(format!("'{}' is not a number", t)))
        })
        .collect::<ConversionResult<Vec<f64>>>()?;
    if traffic.len() != nodes * nodes {
        return Err(malformed(format!(
            "expected {} demand values for n={}, found {}",
            nodes * nodes,
            nodes,
            traffic.len()
        )));
    }

    let capacity = header
        .get(1)
        .copied()
        .unwrap_or_else(|| traffic.iter().sum());
    let intscale = header.get(2).copied().unwrap_or(1.0);

    Ok(Demand {
        nodes,
        traffic,
        capacity,
        intscale,
    })
}

/// Multi-commodity flow formulation.
///
/// Variables: `z` (id 0), `f[k,i,j]` (ids `1 + (k*n + i)*n + j`), then
/// `x[i,j]` (ids `1 + n^3 + i*n + j`).
pub struct NetworkIntegerLinear;

impl NetworkIntegerLinear {
    pub fn new() -> Self {
        Self
    }

    const Z: VariableId = 0;

    fn f_id(n: usize, k: usize, i: usize, j: usize) -> VariableId {
        (1 + (k * n + i) * n + j) as VariableId
    }

    fn x_id(n: usize, i: usize, j: usize) -> VariableId {
        (1 + n * n * n + i * n + j) as VariableId
    }

    /// Node count from the variable layout `1 + n^3 + n^2`
    fn nodes(instance: &Instance) -> ConversionResult<usize> {
        let total = instance.num_variables();
        (1..=total)
            .take_while(|n| 1 + n * n * n + n * n <= total)
            .find(|n| 1 + n * n * n + n * n == total)
            .ok_or_else(|| malformed("instance is not a network layout"))
    }
}

impl Default for NetworkIntegerLinear {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for NetworkIntegerLinear {
    fn build_instance(&self, _name: &str, data: &str) -> ConversionResult<Instance> {
        let demand = parse_demand(data)?;
        let n = demand.nodes;
        let flow_bound = Bound::new(0.0, demand.intscale * demand.capacity);
        let arc_capacity = demand.capacity * demand.intscale;

        let mut variables = Vec::with_capacity(1 + n * n * n + n * n);
        variables.push(DecisionVariable::integer(Self::Z, flow_bound).with_name("z", vec![]));
        for k in 0..n {
            for i in 0..n {
                for j in 0..n {
                    variables.push(
                        DecisionVariable::integer(Self::f_id(n, k, i, j), flow_bound)
                            .with_name("f", vec![k as i64, i as i64, j as i64]),
                    );
                }
            }
        }
        for i in 0..n {
            for j in 0..n {
                variables.push(
                    DecisionVariable::binary(Self::x_id(n, i, j))
                        .with_name("x", vec![i as i64, j as i64]),
                );
            }
        }

        let mut constraints = ConstraintList::new();

        for i in 0..n {
            let mut out = Function::constant(-DEGREE);
            for j in (0..n).filter(|&j| j != i) {
                out.add_linear(Self::x_id(n, i, j), 1.0);
            }
            constraints.equal(out, "c1", &[i]);
        }
        for j in 0..n {
            let mut into = Function::constant(-DEGREE);
            for i in (0..n).filter(|&i| i != j) {
                into.add_linear(Self::x_id(n, i, j), 1.0);
            }
            constraints.equal(into, "c2", &[j]);
        }

        // demand of origin k is consumed at every other node
        for k in 0..n {
            for i in (0..n).filter(|&i| i != k) {
                let mut f = Function::constant(-demand.traffic(k, i) * demand.intscale);
                for j in (0..n).filter(|&j| j != i) {
                    f.add_linear(Self::f_id(n, k, j, i), 1.0);
                }
                for j in (0..n).filter(|&j| j != i && j != k) {
                    f.add_linear(Self::f_id(n, k, i, j), -1.0);
                }
                constraints.equal(f, "c11", &[k, i]);
            }
        }

        for k in 0..n {
            for i in 0..n {
                for j in (0..n).filter(|&j| j != i && j != k) {
                    let mut f = Function::variable(Self::f_id(n, k, i, j));
                    f.add_linear(Self::x_id(n, i, j), -arc_capacity);
                    constraints.less_or_equal(f, "c14", &[k, i, j]);
                }
            }
        }

        for i in 0..n {
            for j in (0..n).filter(|&j| j != i) {
                let mut load = Function::linear_term(Self::Z, -1.0);
                for k in (0..n).filter(|&k| k != j) {
                    load.add_linear(Self::f_id(n, k, i, j), 1.0);
                }
                constraints.less_or_equal(load, "c100", &[i, j]);
            }
        }

        Ok(Instance::new(Sense::Minimize, Function::variable(Self::Z))
            .with_variables(variables)
            .with_constraints(constraints.into_vec()))
    }

    /// Reads `z v`, `f#k#i#j v` and `x#i#j v` lines with 1-based indices
    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        let n = Self::nodes(instance)?;
        let sol = parse_sol(data)?;
        let mut state = zero_state(instance);

        let z = sol.scalar("z");
        if let Some(z) = z {
            state.insert(Self::Z, z);
        }

        let one_based = |name: &str, indices: &[usize]| -> ConversionResult<Vec<usize>> {
            indices
                .iter()
                .map(|&i| {
                    if i == 0 || i > n {
                        Err(malformed(format!("{} index {} is outside 1..={}", name, i, n)))
                    } else {
                        Ok(i - 1)
                    }
                })
                .collect()
        };

        let mut seen = z.is_some();
        for (indices, &value) in sol.indexed_values_of("f").into_iter().flatten() {
            match one_based("f", indices.as_slice())?.as_slice() {
                [k, i, j] => state.insert(Self::f_id(n, *k, *i, *j), value),
                _ => return Err(malformed("f entries need three indices")),
            }
            seen = true;
        }
        for (indices, &value) in sol.indexed_values_of("x").into_iter().flatten() {
            match one_based("x", indices.as_slice())?.as_slice() {
                [i, j] => state.insert(Self::x_id(n, *i, *j), value),
                _ => return Err(malformed("x entries need two indices")),
            }
            seen = true;
        }
        if !seen {
            return Err(malformed("solution has no z, f or x entries"));
        }

        Ok(ReferenceSolution {
            state,
            reported_objective: sol.reported_objective().or(z),
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
