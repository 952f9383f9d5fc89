// Topology design: an undirected graph on n nodes with bounded degree and
// the smallest diameter
// Source: a `.dat` line `nodes degree [max_diameter]`; solutions are DIMACS
// `.gph` graphs whose `c ... diameter N` comment carries the objective

use std::collections::VecDeque;

use super::builder::{zero_state, ConstraintList};
use super::qoblib_format::parse_gph;
use crate::domain::{
    converter_service::{ConversionError, ConversionResult, InstanceConverter, ReferenceSolution},
    function::Function,
    models::{DecisionVariable, Instance},
    value_objects::{Bound, Sense, VariableId},
};

pub const DATASET: &str = "10_topology";
const TITLE: &str = "Topology";

fn malformed(message: impl Into<String>) -> ConversionError {
    ConversionError::Malformed(message.into())
}

/// Smallest diameter a graph on `nodes` nodes with maximum degree `degree`
/// can reach: the first `D` with `1 + d * sum_{i<D} (d-1)^i >= n`
pub fn moore_bound(nodes: usize, degree: usize) -> Option<usize> {
    if nodes <= 1 {
        return Some(0);
    }
    let (n, d) = (nodes as u64, degree as u64);
    let mut reach: u64 = 1;
    let mut layer = d;
    for diameter in 1..nodes {
        reach = reach.saturating_add(layer);
        if reach >= n {
            return Some(diameter);
        }
        layer = layer.saturating_mul(d.saturating_sub(1));
        if layer == 0 {
            return None;
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyData {
    pub nodes: usize,
    pub degree: usize,
    pub min_diameter: usize,
    /// Defaults to `nodes - 1`
    pub max_diameter: usize,
}

pub fn parse_topology(data: &str) -> ConversionResult<TopologyData> {
    let values = data
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .flat_map(str::split_whitespace)
        .map(|t| {
            t.parse::<usize>()
                .map_err(|_| malformed(format!("'{}' is not a count", t)))
        })
        .collect::<ConversionResult<Vec<usize>>>()?;

    let (nodes, degree, max_diameter) = match values.as_slice() {
        [n, d] => (*n, *d, None),
        [n, d, m] => (*n, *d, Some(*m)),
        _ => return Err(malformed("expected 'nodes degree [max_diameter]'")),
    };
    if nodes < 2 {
        return Err(malformed(format!("{} nodes cannot form a topology", nodes)));
    }
    let min_diameter = moore_bound(nodes, degree).ok_or_else(|| {
        malformed(format!("no connected graph on {} nodes has degree {}", nodes, degree))
    })?;
    let max_diameter = max_diameter.unwrap_or(nodes - 1);
    if max_diameter < min_diameter {
        return Err(malformed(format!(
            "maximum diameter {} is below the lower bound {}",
            max_diameter, min_diameter
        )));
    }

    Ok(TopologyData {
        nodes,
        degree,
        min_diameter,
        max_diameter,
    })
}

/// Position of the unordered pair `s < t` among all pairs
fn pair(n: usize, s: usize, t: usize) -> usize {
    let (s, t) = (s.min(t), s.max(t));
    s * n - s * (s + 1) / 2 + (t - s - 1)
}

fn pairs(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n).flat_map(move |s| (s + 1..n).map(move |t| (s, t)))
}

/// Node count from the number of pairs (`n(n-1)/2 = pairs`)
fn nodes_from_pairs(count: usize) -> Option<usize> {
    (2..).take_while(|n| n * (n - 1) / 2 <= count).find(|n| n * (n - 1) / 2 == count)
}

const DIAMETER: VariableId = 0;

/// Shortest paths of a solution graph
struct SolutionGraph {
    adjacency: Vec<Vec<usize>>,
    /// `distance[s][t]`
    distance: Vec<Vec<usize>>,
    /// `parent[s][t]`: predecessor of `t` on the BFS tree rooted at `s`
    parent: Vec<Vec<usize>>,
    reported: Option<f64>,
}

impl SolutionGraph {
    fn read(nodes: usize, data: &str) -> ConversionResult<Self> {
        let graph = parse_gph(data)?;
        if graph.vertices != nodes {
            return Err(malformed(format!(
                "solution graph has {} vertices, instance has {}",
                graph.vertices, nodes
            )));
        }

        let reported = data
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with('c') && l.to_lowercase().contains("diameter"))
            .filter_map(|l| l.split_whitespace().last())
            .filter_map(|v| v.parse::<f64>().ok())
            .last();

        let mut adjacency = vec![Vec::new(); nodes];
        for &(u, v) in &graph.edges {
            adjacency[u].push(v);
            adjacency[v].push(u);
        }
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
        }

        let mut distance = Vec::with_capacity(nodes);
        let mut parent = Vec::with_capacity(nodes);
        for s in 0..nodes {
            let mut reached: Vec<Option<usize>> = vec![None; nodes];
            let mut from = vec![s; nodes];
            reached[s] = Some(0);
            let mut queue = VecDeque::from([s]);
            while let Some(u) = queue.pop_front() {
                let du = reached[u].unwrap_or(0);
                for &v in &adjacency[u] {
                    if reached[v].is_none() {
                        reached[v] = Some(du + 1);
                        from[v] = u;
                        queue.push_back(v);
                    }
                }
            }
            let row = reached
                .into_iter()
                .enumerate()
                .map(|(t, d)| {
                    d.ok_or_else(|| {
                        malformed(format!("solution graph is disconnected: {} cannot reach {}", s + 1, t + 1))
                    })
                })
                .collect::<ConversionResult<Vec<usize>>>()?;
            distance.push(row);
            parent.push(from);
        }

        Ok(Self {
            adjacency,
            distance,
            parent,
            reported,
        })
    }

    fn diameter(&self) -> f64 {
        self.reported.unwrap_or_else(|| {
            self.distance
                .iter()
                .flat_map(|row| row.iter())
                .copied()
                .max()
                .unwrap_or(0) as f64
        })
    }

    fn adjacent(&self, u: usize, v: usize) -> bool {
        self.adjacency[u].binary_search(&v).is_ok()
    }

    /// Arcs of the BFS shortest path from `s` to `t`
    fn path(&self, s: usize, t: usize) -> Vec<(usize, usize)> {
        let mut arcs = Vec::with_capacity(self.distance[s][t]);
        let mut v = t;
        while v != s {
            let u = self.parent[s][v];
            arcs.push((u, v));
            v = u;
        }
        arcs.reverse();
        arcs
    }
}

/// Shortest-path flow formulation.
///
/// Variables: `diameter` (id 0), `SP[s,t]` (ids `1 + p`), `z[i,j]` (ids
/// `1 + P + p`), then `x[s,t,i,j]` per pair and ordered arc.
pub struct TopologyFlowMip;

impl TopologyFlowMip {
    pub fn new() -> Self {
        Self
    }

    fn pair_count(n: usize) -> usize {
        n * (n - 1) / 2
    }

    fn sp_id(n: usize, s: usize, t: usize) -> VariableId {
        (1 + pair(n, s, t)) as VariableId
    }

    fn z_id(n: usize, i: usize, j: usize) -> VariableId {
        (1 + Self::pair_count(n) + pair(n, i, j)) as VariableId
    }

    fn x_id(n: usize, s: usize, t: usize, i: usize, j: usize) -> VariableId {
        let arc = i * (n - 1) + if j < i { j } else { j - 1 };
        (1 + 2 * Self::pair_count(n) + pair(n, s, t) * n * (n - 1) + arc) as VariableId
    }

    fn nodes(instance: &Instance) -> ConversionResult<usize> {
        let sp = instance
            .decision_variables
            .iter()
            .filter(|v| v.name.as_deref() == Some("SP"))
            .count();
        nodes_from_pairs(sp).ok_or_else(|| malformed("instance is not a flow topology layout"))
    }
}

impl Default for TopologyFlowMip {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for TopologyFlowMip {
    fn build_instance(&self, _name: &str, data: &str) -> ConversionResult<Instance> {
        let topology = parse_topology(data)?;
        let n = topology.nodes;
        let length = Bound::new(0.0, (n - 1) as f64);

        let mut variables = vec![DecisionVariable::integer(DIAMETER, length).with_name("diameter", vec![])];
        for (s, t) in pairs(n) {
            variables.push(
                DecisionVariable::integer(Self::sp_id(n, s, t), length)
                    .with_name("SP", vec![s as i64, t as i64]),
            );
        }
        for (i, j) in pairs(n) {
            variables.push(
                DecisionVariable::binary(Self::z_id(n, i, j)).with_name("z", vec![i as i64, j as i64]),
            );
        }
        for (s, t) in pairs(n) {
            for i in 0..n {
                for j in (0..n).filter(|&j| j != i) {
                    variables.push(
                        DecisionVariable::binary(Self::x_id(n, s, t, i, j))
                            .with_name("x", vec![s as i64, t as i64, i as i64, j as i64]),
                    );
                }
            }
        }

        // net outflow of node v on the path of pair (s, t)
        let outflow = |s: usize, t: usize, v: usize| {
            let mut f = Function::zero();
            for j in (0..n).filter(|&j| j != v) {
                f.add_linear(Self::x_id(n, s, t, v, j), 1.0);
                f.add_linear(Self::x_id(n, s, t, j, v), -1.0);
            }
            f
        };

        let mut constraints = ConstraintList::new();
        for (s, t) in pairs(n) {
            let mut f = Function::variable(Self::sp_id(n, s, t));
            f.add_linear(DIAMETER, -1.0);
            constraints.less_or_equal(f, "diameter", &[s, t]);
        }
        for (s, t) in pairs(n) {
            let mut f = Function::variable(Self::sp_id(n, s, t));
            for i in 0..n {
                for j in (0..n).filter(|&j| j != i) {
                    f.add_linear(Self::x_id(n, s, t, i, j), -1.0);
                }
            }
            constraints.equal(f, "APSP", &[s, t]);
        }
        for (s, t) in pairs(n) {
            for i in (0..n).filter(|&i| i != s && i != t) {
                constraints.equal(outflow(s, t, i), "SPtransit", &[s, t, i]);
            }
        }
        for (s, t) in pairs(n) {
            constraints.equal(outflow(s, t, s) - Function::constant(1.0), "SPsource", &[s, t]);
        }
        for (s, t) in pairs(n) {
            constraints.equal(outflow(s, t, t) + Function::constant(1.0), "SPtarget", &[s, t]);
        }
        for i in 0..n {
            let mut f = Function::constant(-(topology.degree as f64));
            for j in (0..n).filter(|&j| j != i) {
                f.add_linear(Self::z_id(n, i, j), 1.0);
            }
            constraints.less_or_equal(f, "degree_constraint", &[i]);
        }
        for (s, t) in pairs(n) {
            for (i, j) in pairs(n) {
                let mut forward = Function::variable(Self::x_id(n, s, t, i, j));
                forward.add_linear(Self::z_id(n, i, j), -1.0);
                constraints.less_or_equal(forward, "ZXlink_forward", &[s, t, i, j]);

                let mut backward = Function::variable(Self::x_id(n, s, t, j, i));
                backward.add_linear(Self::z_id(n, i, j), -1.0);
                constraints.less_or_equal(backward, "ZXlink_backward", &[s, t, i, j]);
            }
        }

        Ok(Instance::new(Sense::Minimize, Function::variable(DIAMETER))
            .with_variables(variables)
            .with_constraints(constraints.into_vec()))
    }

    /// Routes every pair along a BFS shortest path of the `.gph` graph
    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        let n = Self::nodes(instance)?;
        let graph = SolutionGraph::read(n, data)?;

        let mut state = zero_state(instance);
        state.insert(DIAMETER, graph.diameter());
        for (s, t) in pairs(n) {
            state.insert(Self::sp_id(n, s, t), graph.distance[s][t] as f64);
            if graph.adjacent(s, t) {
                state.insert(Self::z_id(n, s, t), 1.0);
            }
            for (i, j) in graph.path(s, t) {
                state.insert(Self::x_id(n, s, t, i, j), 1.0);
            }
        }

        Ok(ReferenceSolution {
            state,
            reported_objective: graph.reported,
        })
    }

    fn dataset(&self) -> &str {
        DATASET
    }

    fn model(&self) -> &str {
        "flow_mip"
    }

    fn title(&self) -> &str {
        TITLE
    }
}

/// Distance-indicator layout shared by the two Seidel formulations.
///
/// `dist[s,t,k]` is 1 when `s` and `t` are at most `k + 1` hops apart.
#[derive(Debug, Clone, Copy)]
struct Seidel {
    nodes: usize,
    max_diameter: usize,
}

impl Seidel {
    fn dist(&self, s: usize, t: usize, k: usize) -> VariableId {
        (1 + pair(self.nodes, s, t) * self.max_diameter + k) as VariableId
    }

    fn pair_count(&self) -> usize {
        self.nodes * (self.nodes - 1) / 2
    }

    /// `y[s,t,i,k]` for `i` outside `{s, t}` and `k < max_diameter - 1`
    fn y(&self, s: usize, t: usize, i: usize, k: usize) -> VariableId {
        let other = i - usize::from(i > s) - usize::from(i > t);
        let base = 1 + self.pair_count() * self.max_diameter;
        (base + (pair(self.nodes, s, t) * (self.nodes - 2) + other) * (self.max_diameter - 1) + k)
            as VariableId
    }

    fn of(instance: &Instance) -> ConversionResult<Self> {
        let diameter = instance
            .variable(DIAMETER)
            .ok_or_else(|| malformed("instance has no diameter variable"))?;
        let max_diameter = diameter.bound.upper as usize;
        let dist = instance
            .decision_variables
            .iter()
            .filter(|v| v.name.as_deref() == Some("dist"))
            .count();
        let nodes = match max_diameter {
            0 => None,
            m if dist % m == 0 => nodes_from_pairs(dist / m),
            _ => None,
        }
        .ok_or_else(|| malformed("instance is not a Seidel topology layout"))?;
        Ok(Self { nodes, max_diameter })
    }

    fn others(&self, s: usize, t: usize) -> impl Iterator<Item = usize> {
        (0..self.nodes).filter(move |&i| i != s && i != t)
    }

    fn variables(&self, topology: &TopologyData, linear: bool) -> Vec<DecisionVariable> {
        let (n, m) = (self.nodes, self.max_diameter);
        let bound = Bound::new(topology.min_diameter as f64, m as f64);
        let mut variables = vec![DecisionVariable::integer(DIAMETER, bound).with_name("diameter", vec![])];
        for (s, t) in pairs(n) {
            for k in 0..m {
                variables.push(
                    DecisionVariable::binary(self.dist(s, t, k))
                        .with_name("dist", vec![s as i64, t as i64, k as i64]),
                );
            }
        }
        if linear {
            for (s, t) in pairs(n) {
                for i in self.others(s, t) {
                    for k in 0..m - 1 {
                        variables.push(
                            DecisionVariable::binary(self.y(s, t, i, k))
                                .with_name("y", vec![s as i64, t as i64, i as i64, k as i64]),
                        );
                    }
                }
            }
        }
        variables
    }

    fn constraints(&self, topology: &TopologyData, linear: bool) -> ConstraintList {
        let (n, m) = (self.nodes, self.max_diameter);
        let mut constraints = ConstraintList::new();

        for (s, t) in pairs(n) {
            let mut f = Function::constant(1.0 + m as f64);
            for k in 0..m {
                f.add_linear(self.dist(s, t, k), -1.0);
            }
            f.add_linear(DIAMETER, -1.0);
            constraints.less_or_equal(f, "diameter_constraint", &[s, t]);
        }

        for (s, t) in pairs(n) {
            for k in 0..m - 1 {
                let mut f = Function::variable(self.dist(s, t, k + 1));
                f.add_linear(self.dist(s, t, k), -1.0);
                for i in self.others(s, t) {
                    if linear {
                        f.add_linear(self.y(s, t, i, k), -1.0);
                    } else {
                        f.add_quadratic(self.dist(s, i, k), self.dist(i, t, 0), -1.0);
                    }
                }
                constraints.less_or_equal(f, "DistCalc", &[s, t, k]);
            }
        }

        if linear {
            for (s, t) in pairs(n) {
                for i in self.others(s, t) {
                    for k in 0..m - 1 {
                        let mut f = Function::variable(self.y(s, t, i, k));
                        f.add_linear(self.dist(s, i, k), -1.0);
                        constraints.less_or_equal(f, "DistLinearize_si", &[s, t, i, k]);
                    }
                }
            }
            for (s, t) in pairs(n) {
                for i in self.others(s, t) {
                    for k in 0..m - 1 {
                        let mut f = Function::variable(self.y(s, t, i, k));
                        f.add_linear(self.dist(i, t, 0), -1.0);
                        constraints.less_or_equal(f, "DistLinearize_it", &[s, t, i, k]);
                    }
                }
            }
        }

        let d = topology.degree as f64;
        for j in 0..n - 1 {
            let mut f = Function::constant(-d);
            for i in (0..n).filter(|&i| i != j) {
                f.add_linear(self.dist(j, i, 0), 1.0);
            }
            constraints.equal(f, "degreeButLast", &[j]);
        }
        // an odd degree sum leaves one node a stub short
        let last = d - ((n * topology.degree) % 2) as f64;
        let mut f = Function::constant(-last);
        for i in 0..n - 1 {
            f.add_linear(self.dist(i, n - 1, 0), 1.0);
        }
        constraints.equal(f, "degreeLast", &[]);

        constraints
    }

    fn build(topology: &TopologyData, linear: bool) -> Instance {
        let layout = Self {
            nodes: topology.nodes,
            max_diameter: topology.max_diameter,
        };
        Instance::new(Sense::Minimize, Function::variable(DIAMETER))
            .with_variables(layout.variables(topology, linear))
            .with_constraints(layout.constraints(topology, linear).into_vec())
    }

    fn read(instance: &Instance, data: &str, linear: bool) -> ConversionResult<ReferenceSolution> {
        let layout = Self::of(instance)?;
        let (n, m) = (layout.nodes, layout.max_diameter);
        let graph = SolutionGraph::read(n, data)?;

        let within = |s: usize, t: usize, k: usize| graph.distance[s][t] <= k + 1;

        let mut state = zero_state(instance);
        state.insert(DIAMETER, graph.diameter());
        for (s, t) in pairs(n) {
            for k in (0..m).filter(|&k| within(s, t, k)) {
                state.insert(layout.dist(s, t, k), 1.0);
            }
        }
        if linear {
            for (s, t) in pairs(n) {
                for i in layout.others(s, t) {
                    for k in (0..m - 1).filter(|&k| within(s, i, k) && within(i, t, 0)) {
                        state.insert(layout.y(s, t, i, k), 1.0);
                    }
                }
            }
        }

        Ok(ReferenceSolution {
            state,
            reported_objective: graph.reported,
        })
    }
}

/// Seidel formulation with the distance products linearized through `y`
pub struct TopologySeidelLinear;

impl TopologySeidelLinear {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TopologySeidelLinear {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for TopologySeidelLinear {
    fn build_instance(&self, _name: &str, data: &str) -> ConversionResult<Instance> {
        Ok(Seidel::build(&parse_topology(data)?, true))
    }

    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        Seidel::read(instance, data, true)
    }

    fn dataset(&self) -> &str {
        DATASET
    }

    fn model(&self) -> &str {
        "seidel_linear"
    }

    fn title(&self) -> &str {
        TITLE
    }
}

/// Seidel formulation with quadratic distance products
pub struct TopologySeidelQuadratic;

impl TopologySeidelQuadratic {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TopologySeidelQuadratic {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for TopologySeidelQuadratic {
    fn build_instance(&self, _name: &str, data: &str) -> ConversionResult<Instance> {
        Ok(Seidel::build(&parse_topology(data)?, false))
    }

    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        Seidel::read(instance, data, false)
    }

    fn dataset(&self) -> &str {
        DATASET
    }

    fn model(&self) -> &str {
        "seidel_quadratic"
    }

    fn title(&self) -> &str {
        TITLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RING: &str = "c ring on four nodes\nc diameter 2\np edge 4 4\ne 1 2\ne 2 3\ne 3 4\ne 4 1\n";

    fn converters() -> Vec<Box<dyn InstanceConverter>> {
        vec![
            Box::new(TopologyFlowMip::new()),
            Box::new(TopologySeidelLinear::new()),
            Box::new(TopologySeidelQuadratic::new()),
        ]
    }

    #[test]
    fn moore_bounds() {
        assert_eq!(moore_bound(4, 2), Some(2));
        assert_eq!(moore_bound(10, 3), Some(2));
        assert_eq!(moore_bound(11, 3), Some(3));
        assert_eq!(moore_bound(2, 1), Some(1));
        assert_eq!(moore_bound(5, 1), None);
        assert_eq!(moore_bound(3, 0), None);
    }

    #[test]
    fn dat_defaults_and_errors() {
        let topology = parse_topology("# ring\n4 2\n").unwrap();
        assert_eq!(
            topology,
            TopologyData {
                nodes: 4,
                degree: 2,
                min_diameter: 2,
                max_diameter: 3,
            }
        );
        assert_eq!(parse_topology("4 2 2").unwrap().max_diameter, 2);

        assert!(parse_topology("4").is_err());
        assert!(parse_topology("5 1").is_err());
        assert!(parse_topology("4 2 1").is_err());
        assert!(parse_topology("four 2").is_err());
    }

    #[test]
    fn layouts() {
        let flow = TopologyFlowMip::new().build_instance("ring", "4 2").unwrap();
        flow.validate().unwrap();
        assert_eq!(flow.num_variables(), 1 + 6 + 6 + 6 * 12);
        assert_eq!(flow.num_constraints(), 6 + 6 + 12 + 6 + 6 + 4 + 72);
        assert_eq!(TopologyFlowMip::nodes(&flow).unwrap(), 4);

        let linear = TopologySeidelLinear::new().build_instance("ring", "4 2").unwrap();
        linear.validate().unwrap();
        assert_eq!(linear.num_variables(), 1 + 18 + 24);
        assert_eq!(linear.num_constraints(), 6 + 12 + 48 + 4);

        let quadratic = TopologySeidelQuadratic::new().build_instance("ring", "4 2").unwrap();
        quadratic.validate().unwrap();
        assert_eq!(quadratic.num_variables(), 1 + 18);
        assert_eq!(quadratic.num_constraints(), 6 + 12 + 4);
        let seidel = Seidel::of(&quadratic).unwrap();
        assert_eq!((seidel.nodes, seidel.max_diameter), (4, 3));
    }

    #[test]
    fn ring_is_optimal_in_every_model() {
        for converter in converters() {
            let instance = converter.build_instance("ring", "4 2").unwrap();
            let reference = converter.read_solution(&instance, RING).unwrap();
            assert_eq!(reference.reported_objective, Some(2.0));

            let solution = instance.evaluate(&reference.state).unwrap();
            assert_eq!(solution.objective, 2.0, "{}", converter.model());
            assert!(solution.feasible, "{}", converter.model());
        }
    }

    #[test]
    fn seidel_models_require_the_exact_degree() {
        for converter in converters() {
            let instance = converter.build_instance("ring", "4 3").unwrap();
            let reference = converter.read_solution(&instance, RING).unwrap();
            let feasible = instance.evaluate(&reference.state).unwrap().feasible;
            assert_eq!(feasible, converter.model() == "flow_mip", "{}", converter.model());
        }
    }

    #[test]
    fn unusable_graphs_are_rejected() {
        let converter = TopologySeidelLinear::new();
        let instance = converter.build_instance("ring", "4 2").unwrap();

        let split = "p edge 4 2\ne 1 2\ne 3 4\n";
        assert!(matches!(
            converter.read_solution(&instance, split),
            Err(ConversionError::Malformed(_))
        ));
        let small = "p edge 3 3\ne 1 2\ne 2 3\ne 3 1\n";
        assert!(converter.read_solution(&instance, small).is_err());
    }

    #[test]
    fn diameter_falls_back_to_the_graph() {
        let converter = TopologyFlowMip::new();
        let instance = converter.build_instance("ring", "4 2").unwrap();
        let data = "p edge 4 4\ne 1 2\ne 2 3\ne 3 4\ne 4 1\n";
        let reference = converter.read_solution(&instance, data).unwrap();
        assert_eq!(reference.reported_objective, None);
        assert_eq!(reference.state.get(DIAMETER), Some(2.0));
    }
}
