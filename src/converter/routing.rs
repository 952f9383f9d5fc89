// Capacitated vehicle routing with Miller-Tucker-Zemlin load variables
// Source: TSPLIB CVRP files (EUC_2D), CVRPLIB `Route #k:` solutions

use std::collections::BTreeMap;

use super::builder::{zero_state, ConstraintList};
use crate::domain::{
    converter_service::{ConversionError, ConversionResult, InstanceConverter, ReferenceSolution},
    function::Function,
    models::{DecisionVariable, Instance},
    value_objects::{Bound, Sense, VariableId},
};

pub const DATASET: &str = "09_routing";
const TITLE: &str = "Routing";

/// Vehicles available when the name carries no `-k<count>` part
pub const DEFAULT_VEHICLES: usize = 4;

fn malformed(message: impl Into<String>) -> ConversionError {
    ConversionError::Malformed(message.into())
}

/// CVRP instance with 0-based nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Cvrp {
    pub capacity: f64,
    pub depot: usize,
    pub coordinates: Vec<(f64, f64)>,
    pub demands: Vec<f64>,
}

impl Cvrp {
    pub fn nodes(&self) -> usize {
        self.coordinates.len()
    }

    /// Rounded Euclidean distance
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        let (xi, yi) = self.coordinates[i];
        let (xj, yj) = self.coordinates[j];
        ((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt().round()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Header,
    Coordinates,
    Demands,
    Depots,
}

fn node_index(token: &str, nodes: usize) -> ConversionResult<usize> {
    match token.parse::<usize>() {
        Ok(id) if id >= 1 && id <= nodes => Ok(id - 1),
        _ => Err(malformed(format!("'{}' is not a node in 1..={}", token, nodes))),
    }
}

fn value(token: &str) -> ConversionResult<f64> {
    token
        .parse::<f64>()
        .map_err(|_| malformed(format!("'{}' is not a number", token)))
}

/// Parse a TSPLIB CVRP file
pub fn parse_vrp(data: &str) -> ConversionResult<Cvrp> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    let mut section = Section::Header;
    let mut coordinates: Vec<Option<(f64, f64)>> = Vec::new();
    let mut demands: Vec<f64> = Vec::new();
    let mut depot = None;

    for line in data.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line {
            "NODE_COORD_SECTION" | "DEMAND_SECTION" | "DEPOT_SECTION" => {
                let dimension = headers
                    .get("DIMENSION")
                    .ok_or_else(|| malformed("DIMENSION must precede the sections"))?
                    .parse::<usize>()
                    .map_err(|_| malformed("DIMENSION is not a count"))?;
                coordinates.resize(dimension, None);
                demands.resize(dimension, 0.0);
                section = match line {
                    "NODE_COORD_SECTION" => Section::Coordinates,
                    "DEMAND_SECTION" => Section::Demands,
                    _ => Section::Depots,
                };
                continue;
            }
            "EOF" => break,
            _ => {}
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        match (section, fields.as_slice()) {
            (Section::Header, _) => {
                let (key, value) = line
                    .split_once(':')
                    .ok_or_else(|| malformed(format!("expected 'KEY : value', got '{}'", line)))?;
                headers.insert(key.trim().to_string(), value.trim().to_string());
            }
            (Section::Coordinates, [id, x, y]) => {
                let i = node_index(id, coordinates.len())?;
                coordinates[i] = Some((value(x)?, value(y)?));
            }
            (Section::Demands, [id, d]) => {
                let i = node_index(id, demands.len())?;
                demands[i] = value(d)?;
            }
            (Section::Depots, ["-1"]) => section = Section::Header,
            (Section::Depots, [id]) => {
                if depot.is_none() {
                    depot = Some(node_index(id, coordinates.len())?);
                }
            }
            _ => return Err(malformed(format!("unexpected line '{}'", line))),
        }
    }

    match headers.get("EDGE_WEIGHT_TYPE").map(String::as_str) {
        None | Some("EUC_2D") => {}
        Some(other) => return Err(malformed(format!("unsupported EDGE_WEIGHT_TYPE {}", other))),
    }
    let capacity = value(
        headers
            .get("CAPACITY")
            .ok_or_else(|| malformed("missing CAPACITY"))?,
    )?;
    let coordinates = coordinates
        .into_iter()
        .enumerate()
        .map(|(i, c)| c.ok_or_else(|| malformed(format!("node {} has no coordinates", i + 1))))
        .collect::<ConversionResult<Vec<_>>>()?;
    if coordinates.len() < 2 {
        return Err(malformed("a routing instance needs a depot and a customer"));
    }

    Ok(Cvrp {
        capacity,
        depot: depot.unwrap_or(0),
        coordinates,
        demands,
    })
}

/// Vehicle count from a `-k<count>` part of the name, such as `A-n32-k5`
pub fn vehicle_limit(name: &str) -> usize {
    name.split(|c: char| c == '-' || c == '_')
        .filter_map(|part| part.strip_prefix('k'))
        .find_map(|count| count.parse::<usize>().ok())
        .unwrap_or(DEFAULT_VEHICLES)
}

/// CVRPLIB solution: routes of node indices (depot = 0) and the reported cost
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteSolution {
    pub routes: Vec<Vec<usize>>,
    pub cost: Option<f64>,
}

pub fn parse_routes(data: &str) -> ConversionResult<RouteSolution> {
    let mut solution = RouteSolution::default();
    for line in data.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("Route") {
            let (_, nodes) = line
                .split_once(':')
                .ok_or_else(|| malformed(format!("route without ':' in '{}'", line)))?;
            let route = nodes
                .split_whitespace()
                .map(|t| {
                    t.parse::<usize>()
                        .map_err(|_| malformed(format!("'{}' is not a node", t)))
                })
                .collect::<ConversionResult<Vec<usize>>>()?;
            solution.routes.push(route);
        } else if let Some(rest) = line.strip_prefix("Cost") {
            solution.cost = Some(value(rest.trim_start_matches(':').trim())?);
        }
    }
    Ok(solution)
}

/// Arc formulation with load variables.
///
/// Variables: `x[i,j]` (ids `i*n + j`) then the loads `y[i]` (ids `n^2 + i`).
pub struct RoutingIntegerLinear;

impl RoutingIntegerLinear {
    pub fn new() -> Self {
        Self
    }

    fn x_id(n: usize, i: usize, j: usize) -> VariableId {
        (i * n + j) as VariableId
    }

    fn y_id(n: usize, i: usize) -> VariableId {
        (n * n + i) as VariableId
    }
}

impl Default for RoutingIntegerLinear {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for RoutingIntegerLinear {
    fn build_instance(&self, name: &str, data: &str) -> ConversionResult<Instance> {
        let cvrp = parse_vrp(data)?;
        let n = cvrp.nodes();
        let depot = cvrp.depot;
        let cap = cvrp.capacity;
        let vehicles = vehicle_limit(name);

        let mut variables = Vec::with_capacity(n * n + n);
        for i in 0..n {
            for j in 0..n {
                variables.push(
                    DecisionVariable::binary(Self::x_id(n, i, j))
                        .with_name("x", vec![i as i64, j as i64]),
                );
            }
        }
        for i in 0..n {
            variables.push(
                DecisionVariable::integer(Self::y_id(n, i), Bound::new(0.0, cap))
                    .with_name("y", vec![i as i64]),
            );
        }

        let mut objective = Function::zero();
        for i in 0..n {
            for j in (0..n).filter(|&j| j != i) {
                let d = cvrp.distance(i, j);
                if d != 0.0 {
                    objective.add_linear(Self::x_id(n, i, j), d);
                }
            }
        }

        let mut constraints = ConstraintList::new();
        let customers: Vec<usize> = (0..n).filter(|&i| i != depot).collect();

        for &i in &customers {
            let mut f = Function::constant(-1.0);
            for j in (0..n).filter(|&j| j != i) {
                f.add_linear(Self::x_id(n, i, j), 1.0);
            }
            constraints.equal(f, "customer_visited_once", &[i]);
        }

        for &h in &customers {
            let mut f = Function::zero();
            for i in (0..n).filter(|&i| i != h) {
                f.add_linear(Self::x_id(n, i, h), 1.0);
                f.add_linear(Self::x_id(n, h, i), -1.0);
            }
            constraints.equal(f, "flow_conservation", &[h]);
        }

        let mut departures = Function::constant(-(vehicles as f64));
        for &j in &customers {
            departures.add_linear(Self::x_id(n, depot, j), 1.0);
        }
        constraints.less_or_equal(departures, "vehicle_limit", &[]);

        // y[j] >= y[i] + d_j - cap * (1 - x[i,j])
        for i in 0..n {
            for &j in customers.iter().filter(|&&j| j != i) {
                let mut f = Function::constant(-cap);
                f.add_linear(Self::y_id(n, i), 1.0);
                f.add_linear(Self::y_id(n, j), -1.0);
                f.add_linear(Self::x_id(n, i, j), cvrp.demands[j] + cap);
                constraints.less_or_equal(f, "capacity_limit", &[i, j]);
            }
        }

        for i in 0..n {
            let mut upper = Function::variable(Self::y_id(n, i));
            upper.add_constant(-cap);
            constraints.less_or_equal(upper, "capacity_upper", &[i]);

            let mut lower = Function::linear_term(Self::y_id(n, i), -1.0);
            lower.add_constant(cvrp.demands[i]);
            constraints.less_or_equal(lower, "capacity_lower", &[i]);
        }

        Ok(Instance::new(Sense::Minimize, objective)
            .with_variables(variables)
            .with_constraints(constraints.into_vec()))
    }

    /// Arcs follow each route from and back to the depot; loads accumulate
    /// along the route. Demands come from the instance's lower-bound rows.
    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        let n = (0..=instance.num_variables())
            .find(|n| n * n + n == instance.num_variables())
            .filter(|&n| n >= 2)
            .ok_or_else(|| malformed("instance is not a routing layout"))?;
        let demands = load_demands(instance, n)?;
        let depot = depot_of(instance, n);

        let solution = parse_routes(data)?;
        if solution.routes.is_empty() {
            return Err(malformed("solution has no 'Route #k:' lines"));
        }

        let mut state = zero_state(instance);
        for route in &solution.routes {
            if let Some(&node) = route.iter().find(|&&v| v >= n || v == depot) {
                return Err(malformed(format!("route visits invalid node {}", node)));
            }
            let mut load = 0.0;
            let mut previous = depot;
            for &node in route {
                state.insert(Self::x_id(n, previous, node), 1.0);
                load += demands[node];
                state.insert(Self::y_id(n, node), load);
                previous = node;
            }
            if previous != depot {
                state.insert(Self::x_id(n, previous, depot), 1.0);
            }
        }

        Ok(ReferenceSolution {
            state,
            reported_objective: solution.cost,
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

fn load_demands(instance: &Instance, n: usize) -> ConversionResult<Vec<f64>> {
    let mut demands = vec![0.0; n];
    let mut found = 0;
    for c in &instance.constraints {
        if c.name.as_deref() == Some("capacity_lower") {
            let i = c
                .subscripts
                .first()
                .map(|&i| i as usize)
                .filter(|&i| i < n)
                .ok_or_else(|| malformed("capacity_lower without a node subscript"))?;
            demands[i] = c.function.constant;
            found += 1;
        }
    }
    if found != n {
        return Err(malformed("instance is missing capacity_lower rows"));
    }
    Ok(demands)
}

/// The node without a customer_visited_once row
fn depot_of(instance: &Instance, n: usize) -> usize {
    let visited: Vec<usize> = instance
        .constraints
        .iter()
        .filter(|c| c.name.as_deref() == Some("customer_visited_once"))
        .filter_map(|c| c.subscripts.first().map(|&i| i as usize))
        .collect();
    (0..n).find(|i| !visited.contains(i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // depot at the origin, three customers on a 4x3 rectangle
    const VRP: &str = "NAME : tiny-n4-k1\n\
        TYPE : CVRP\n\
        DIMENSION : 4\n\
        EDGE_WEIGHT_TYPE : EUC_2D\n\
        CAPACITY : 10\n\
        NODE_COORD_SECTION\n\
        1 0 0\n2 0 3\n3 4 3\n4 4 0\n\
        DEMAND_SECTION\n\
        1 0\n2 2\n3 3\n4 4\n\
        DEPOT_SECTION\n\
        1\n-1\n\
        EOF\n";

    #[test]
    fn tsplib_sections() {
        let cvrp = parse_vrp(VRP).unwrap();
        assert_eq!(cvrp.nodes(), 4);
        assert_eq!(cvrp.depot, 0);
        assert_eq!(cvrp.capacity, 10.0);
        assert_eq!(cvrp.demands, vec![0.0, 2.0, 3.0, 4.0]);
        assert_eq!(cvrp.distance(0, 2), 5.0);
        assert_eq!(cvrp.distance(1, 2), 4.0);

        assert!(parse_vrp("NODE_COORD_SECTION\n1 0 0\n").is_err());
        assert!(parse_vrp(&VRP.replace("EUC_2D", "GEO")).is_err());
        assert!(parse_vrp(&VRP.replace("4 4 0\n", "")).is_err());
    }

    #[test]
    fn vehicle_limit_from_name() {
        assert_eq!(vehicle_limit("A-n32-k5"), 5);
        assert_eq!(vehicle_limit("X-n101-k25"), 25);
        assert_eq!(vehicle_limit("tiny"), DEFAULT_VEHICLES);
    }

    #[test]
    fn layout_and_single_route() {
        let converter = RoutingIntegerLinear::new();
        let instance = converter.build_instance("tiny-n4-k1", VRP).unwrap();
        instance.validate().unwrap();

        assert_eq!(instance.num_variables(), 16 + 4);
        // visits, flow, vehicles, MTZ, load bounds
        assert_eq!(instance.num_constraints(), 3 + 3 + 1 + 9 + 8);

        let reference = converter
            .read_solution(&instance, "Route #1: 1 2 3\nCost 14\n")
            .unwrap();
        assert_eq!(reference.reported_objective, Some(14.0));
        assert_eq!(reference.state.get(17), Some(2.0));
        assert_eq!(reference.state.get(19), Some(9.0));

        let solution = instance.evaluate(&reference.state).unwrap();
        assert_eq!(solution.objective, 14.0);
        assert!(solution.feasible);
    }

    #[test]
    fn extra_vehicle_exceeds_the_limit() {
        let converter = RoutingIntegerLinear::new();
        let instance = converter.build_instance("tiny-n4-k1", VRP).unwrap();

        let reference = converter
            .read_solution(&instance, "Route #1: 1 2\nRoute #2: 3\nCost 20\n")
            .unwrap();
        let solution = instance.evaluate(&reference.state).unwrap();
        assert_eq!(solution.objective, 3.0 + 4.0 + 5.0 + 4.0 + 4.0);
        assert!(!solution.feasible);

        assert!(converter.read_solution(&instance, "Route #1: 1 7\n").is_err());
        assert!(converter.read_solution(&instance, "Cost 3\n").is_err());
    }
}
