// Steiner tree packing: route every net from its root to its terminals over
// node-disjoint arc sets, minimizing the total arc cost
// Source: a bundle of param.dat, terms.dat, roots.dat and arcs.dat under
// `==> name <==` headers; solutions list used arcs as `tail head net`

use std::collections::{BTreeMap, BTreeSet};

use super::builder::{zero_state, ConstraintList};
use super::qoblib_format::split_sections;
use crate::domain::{
    converter_service::{ConversionError, ConversionResult, InstanceConverter, ReferenceSolution},
    function::Function,
    models::{DecisionVariable, Instance},
    value_objects::{Sense, VariableId},
};

pub const DATASET: &str = "04_steiner";
const TITLE: &str = "Steiner";

fn malformed(message: impl Into<String>) -> ConversionError {
    ConversionError::Malformed(message.into())
}

/// Packing problem with 0-based nodes and nets
#[derive(Debug, Clone, PartialEq)]
pub struct SteinerProblem {
    pub nodes: usize,
    pub nets: usize,
    /// (tail, head, cost)
    pub arcs: Vec<(usize, usize, f64)>,
    /// Net of every special node, roots included
    pub net_of: BTreeMap<usize, usize>,
    pub roots: BTreeSet<usize>,
}

impl SteinerProblem {
    /// Special nodes that are not roots, ascending
    pub fn terminals(&self) -> Vec<usize> {
        self.net_of
            .keys()
            .copied()
            .filter(|v| !self.roots.contains(v))
            .collect()
    }
}

fn rows(text: &str) -> impl Iterator<Item = Vec<&str>> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.split_whitespace().collect())
}

fn one_based(token: &str, limit: usize, what: &str) -> ConversionResult<usize> {
    match token.parse::<usize>() {
        Ok(v) if v >= 1 && v <= limit => Ok(v - 1),
        _ => Err(malformed(format!("{} '{}' is outside 1..={}", what, token, limit))),
    }
}

fn section<'a>(sections: &'a BTreeMap<String, String>, name: &str) -> ConversionResult<&'a str> {
    sections
        .iter()
        .find(|(key, _)| key.as_str() == name || key.starts_with(&format!("{}.", name)))
        .map(|(_, text)| text.as_str())
        .ok_or_else(|| malformed(format!("bundle has no '{}' section", name)))
}

/// Parse a bundled Steiner instance
pub fn parse_problem(data: &str) -> ConversionResult<SteinerProblem> {
    let sections = split_sections(data);

    let mut params = BTreeMap::new();
    for row in rows(section(&sections, "param")?) {
        if let [key, value] = row.as_slice() {
            let value = value
                .parse::<usize>()
                .map_err(|_| malformed(format!("param {} is not a count", key)))?;
            params.insert(key.to_string(), value);
        }
    }
    let nodes = *params.get("nodes").ok_or_else(|| malformed("param has no 'nodes'"))?;
    let nets = *params.get("nets").ok_or_else(|| malformed("param has no 'nets'"))?;

    let mut net_of = BTreeMap::new();
    let mut roots = BTreeSet::new();
    for (name, is_root) in [("terms", false), ("roots", true)] {
        for row in rows(section(&sections, name)?) {
            let [node, net] = row.as_slice() else {
                return Err(malformed(format!("{} rows need 'node net'", name)));
            };
            let node = one_based(node, nodes, "node")?;
            let net = one_based(net, nets, "net")?;
            if net_of.insert(node, net).is_some_and(|previous| previous != net) {
                return Err(malformed(format!("node {} belongs to two nets", node + 1)));
            }
            if is_root {
                roots.insert(node);
            }
        }
    }

    let mut arcs = Vec::new();
    for row in rows(section(&sections, "arcs")?) {
        let [tail, head, cost] = row.as_slice() else {
            return Err(malformed("arc rows need 'tail head cost'"));
        };
        let cost = cost
            .parse::<f64>()
            .map_err(|_| malformed(format!("'{}' is not a cost", cost)))?;
        arcs.push((one_based(tail, nodes, "node")?, one_based(head, nodes, "node")?, cost));
    }

    for net in 0..nets {
        if roots.iter().filter(|r| net_of.get(r) == Some(&net)).count() != 1 {
            return Err(malformed(format!("net {} needs exactly one root", net + 1)));
        }
    }

    Ok(SteinerProblem {
        nodes,
        nets,
        arcs,
        net_of,
        roots,
    })
}

/// Used arcs of a solution, 0-based, and the cost it reports
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsedArcs {
    pub arcs: Vec<(usize, usize, usize)>,
    pub cost: Option<f64>,
}

/// Read `tail head net` lines (1-based) and a `cost: X` or `Cost X` line
pub fn parse_used_arcs(data: &str) -> ConversionResult<UsedArcs> {
    let mut solution = UsedArcs::default();
    for line in data.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let lower = line.to_ascii_lowercase();
        if let Some(pos) = lower.find("cost") {
            let rest = lower[pos + 4..].trim_start_matches(|c: char| c == ':' || c.is_whitespace());
            if let Some(Ok(cost)) = rest.split_whitespace().next().map(str::parse::<f64>) {
                solution.cost = Some(cost);
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let fields: Vec<usize> = match line
            .split_whitespace()
            .map(str::parse::<usize>)
            .collect::<Result<Vec<usize>, _>>()
        {
            Ok(fields) => fields,
            Err(_) => continue,
        };
        match fields.as_slice() {
            &[tail, head, net] if tail >= 1 && head >= 1 && net >= 1 => {
                solution.arcs.push((tail - 1, head - 1, net - 1))
            }
            &[_, _, _] => return Err(malformed(format!("arc '{}' is not 1-based", line))),
            _ => {}
        }
    }
    Ok(solution)
}

/// Multi-commodity flow formulation with one commodity per terminal.
///
/// Variables: `x[a,t]` (ids `a*|T| + t`) routes terminal `t` over arc `a`,
/// `y[a,k]` (ids `|A||T| + a*L + k`) assigns arc `a` to net `k`. Subscripts
/// carry 0-based nodes: `x` is `(tail, head, terminal, net)`, `y` is
/// `(tail, head, net)`.
pub struct SteinerIntegerLinear;

struct Layout {
    arcs: usize,
    terminals: usize,
    nets: usize,
}

impl Layout {
    fn x(&self, a: usize, t: usize) -> VariableId {
        (a * self.terminals + t) as VariableId
    }

    fn y(&self, a: usize, k: usize) -> VariableId {
        (self.arcs * self.terminals + a * self.nets + k) as VariableId
    }
}

impl SteinerIntegerLinear {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SteinerIntegerLinear {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for SteinerIntegerLinear {
    fn build_instance(&self, _name: &str, data: &str) -> ConversionResult<Instance> {
        let problem = parse_problem(data)?;
        let terminals = problem.terminals();
        let layout = Layout {
            arcs: problem.arcs.len(),
            terminals: terminals.len(),
            nets: problem.nets,
        };

        let mut variables = Vec::new();
        for (a, &(tail, head, _)) in problem.arcs.iter().enumerate() {
            for (t, terminal) in terminals.iter().enumerate() {
                let net = problem.net_of[terminal];
                variables.push(DecisionVariable::binary(layout.x(a, t)).with_name(
                    "x",
                    vec![tail as i64, head as i64, *terminal as i64, net as i64],
                ));
            }
        }
        for (a, &(tail, head, _)) in problem.arcs.iter().enumerate() {
            for k in 0..layout.nets {
                variables.push(
                    DecisionVariable::binary(layout.y(a, k))
                        .with_name("y", vec![tail as i64, head as i64, k as i64]),
                );
            }
        }

        let mut objective = Function::zero();
        for (a, &(_, _, cost)) in problem.arcs.iter().enumerate() {
            if cost != 0.0 {
                for k in 0..layout.nets {
                    objective.add_linear(layout.y(a, k), cost);
                }
            }
        }

        let mut out_arcs = vec![Vec::new(); problem.nodes];
        let mut in_arcs = vec![Vec::new(); problem.nodes];
        for (a, &(tail, head, _)) in problem.arcs.iter().enumerate() {
            out_arcs[tail].push(a);
            in_arcs[head].push(a);
        }
        let flow = |arcs: &[usize], t: usize, sign: f64, f: &mut Function| {
            for &a in arcs {
                f.add_linear(layout.x(a, t), sign);
            }
        };

        let mut constraints = ConstraintList::new();
        for (t, &terminal) in terminals.iter().enumerate() {
            let net = problem.net_of[&terminal];

            for &root in &problem.roots {
                // a terminal is supplied by the root of its own net only
                let supply = if problem.net_of[&root] == net { 1.0 } else { 0.0 };
                let mut out = Function::constant(-supply);
                flow(&out_arcs[root], t, 1.0, &mut out);
                constraints.equal(out, "root_flow_out", &[t, root]);

                let mut into = Function::zero();
                flow(&in_arcs[root], t, 1.0, &mut into);
                constraints.equal(into, "root_flow_in", &[t, root]);
            }

            let mut out = Function::zero();
            flow(&out_arcs[terminal], t, 1.0, &mut out);
            constraints.equal(out, "terms_flow_out", &[t]);

            let mut into = Function::constant(-1.0);
            flow(&in_arcs[terminal], t, 1.0, &mut into);
            constraints.equal(into, "terms_flow_in", &[t]);

            for &other in terminals.iter().filter(|&&s| s != terminal) {
                let mut f = Function::zero();
                flow(&in_arcs[other], t, 1.0, &mut f);
                if problem.net_of[&other] == net {
                    flow(&out_arcs[other], t, -1.0, &mut f);
                    constraints.equal(f, "same_net_balance", &[t, other]);
                } else {
                    // commodities never enter terminals of other nets
                    flow(&out_arcs[other], t, 1.0, &mut f);
                    constraints.equal(f, "other_net_balance", &[t, other]);
                }
            }

            for v in (0..problem.nodes).filter(|v| !problem.net_of.contains_key(v)) {
                let mut f = Function::zero();
                flow(&out_arcs[v], t, 1.0, &mut f);
                flow(&in_arcs[v], t, -1.0, &mut f);
                constraints.equal(f, "normal_balance", &[t, v]);
            }
        }

        for a in 0..layout.arcs {
            for k in 0..layout.nets {
                let members: Vec<usize> = terminals
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| problem.net_of[*v] == k)
                    .map(|(t, _)| t)
                    .collect();
                let mut f = Function::linear_term(layout.y(a, k), -(members.len() as f64));
                for t in members {
                    f.add_linear(layout.x(a, t), 1.0);
                }
                constraints.less_or_equal(f, "bind", &[a, k]);
            }
        }

        for v in 0..problem.nodes {
            let is_root = problem.roots.contains(&v);
            let mut f = Function::constant(if is_root { 0.0 } else { -1.0 });
            for &a in &in_arcs[v] {
                for k in 0..layout.nets {
                    f.add_linear(layout.y(a, k), 1.0);
                }
            }
            let name = if is_root { "disjoint_root" } else { "disjoint_nonroot" };
            constraints.less_or_equal(f, name, &[v]);
        }

        Ok(Instance::new(Sense::Minimize, objective)
            .with_variables(variables)
            .with_constraints(constraints.into_vec()))
    }

    /// The solution only names arcs and nets; the routing of each terminal is
    /// recovered by walking the used arcs of its net from the arc's head.
    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        let mut x_ids = BTreeMap::new();
        let mut y_ids = BTreeMap::new();
        let mut terminal_net = BTreeMap::new();
        for v in &instance.decision_variables {
            let subscripts: Vec<usize> = v.subscripts.iter().map(|&s| s as usize).collect();
            match (v.name.as_deref(), subscripts.as_slice()) {
                (Some("x"), &[tail, head, terminal, net]) => {
                    x_ids.insert((tail, head, terminal), v.id);
                    terminal_net.insert(terminal, net);
                }
                (Some("y"), &[tail, head, net]) => {
                    y_ids.insert((tail, head, net), v.id);
                }
                _ => return Err(malformed("instance is not a steiner layout")),
            }
        }

        let solution = parse_used_arcs(data)?;
        if solution.arcs.is_empty() {
            return Err(malformed("solution lists no 'tail head net' arcs"));
        }

        let mut state = zero_state(instance);
        let mut successors: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for &(tail, head, net) in &solution.arcs {
            let id = y_ids.get(&(tail, head, net)).ok_or_else(|| {
                malformed(format!(
                    "arc {} -> {} of net {} is not in the instance",
                    tail + 1,
                    head + 1,
                    net + 1
                ))
            })?;
            state.insert(*id, 1.0);
            successors.entry((net, tail)).or_default().push(head);
        }

        for &(tail, head, net) in &solution.arcs {
            let mut reached = BTreeSet::from([head]);
            let mut pending = vec![head];
            while let Some(v) = pending.pop() {
                for &next in successors.get(&(net, v)).into_iter().flatten() {
                    if reached.insert(next) {
                        pending.push(next);
                    }
                }
            }
            for (&terminal, _) in terminal_net.iter().filter(|(_, &k)| k == net) {
                if reached.contains(&terminal) {
                    if let Some(&id) = x_ids.get(&(tail, head, terminal)) {
                        state.insert(id, 1.0);
                    }
                }
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

#[cfg(test)]
mod tests {
    use super::*;

    // root 1, terminals 3 and 4, a cheap tree through node 2
    const BUNDLE: &str = "==> param.dat <==\n\
        nodes 4\nnets 1\n\n\
        ==> terms.dat <==\n\
        # node net\n1 1\n3 1\n4 1\n\n\
        ==> roots.dat <==\n\
        1 1\n\n\
        ==> arcs.dat <==\n\
        1 2 1\n2 3 1\n2 4 2\n1 3 5\n";

    #[test]
    fn bundle_sections() {
        let problem = parse_problem(BUNDLE).unwrap();
        assert_eq!((problem.nodes, problem.nets), (4, 1));
        assert_eq!(problem.arcs.len(), 4);
        assert_eq!(problem.arcs[3], (0, 2, 5.0));
        assert_eq!(problem.terminals(), vec![2, 3]);
        assert!(problem.roots.contains(&0));

        assert!(parse_problem(&BUNDLE.replace("==> roots.dat <==\n1 1\n", "")).is_err());
        assert!(parse_problem(&BUNDLE.replace("2 4 2", "2 9 2")).is_err());
    }

    #[test]
    fn used_arcs_and_cost() {
        let solution = parse_used_arcs("# Cost: 4\n1 2 1\n2 3 1\n").unwrap();
        assert_eq!(solution.cost, Some(4.0));
        assert_eq!(solution.arcs, vec![(0, 1, 0), (1, 2, 0)]);

        let solution = parse_used_arcs("Cost 7\n").unwrap();
        assert_eq!(solution.cost, Some(7.0));
        assert!(parse_used_arcs("0 1 1\n").is_err());
    }

    #[test]
    fn layout_and_tree() {
        let converter = SteinerIntegerLinear::new();
        let instance = converter.build_instance("tiny", BUNDLE).unwrap();
        instance.validate().unwrap();
        assert_eq!(instance.num_variables(), 4 * 2 + 4);
        assert_eq!(instance.variable(0).unwrap().subscripts, vec![0, 1, 2, 0]);

        let reference = converter
            .read_solution(&instance, "# cost: 4\n1 2 1\n2 3 1\n2 4 1\n")
            .unwrap();
        assert_eq!(reference.reported_objective, Some(4.0));
        // arc 1 -> 2 carries both terminals
        assert_eq!(reference.state.get(0), Some(1.0));
        assert_eq!(reference.state.get(1), Some(1.0));

        let solution = instance.evaluate(&reference.state).unwrap();
        assert_eq!(solution.objective, 4.0);
        assert!(solution.feasible);
    }

    #[test]
    fn missing_branch_is_infeasible() {
        let converter = SteinerIntegerLinear::new();
        let instance = converter.build_instance("tiny", BUNDLE).unwrap();

        let reference = converter.read_solution(&instance, "1 3 1\n").unwrap();
        let solution = instance.evaluate(&reference.state).unwrap();
        assert_eq!(solution.objective, 5.0);
        assert!(!solution.feasible);

        assert!(converter.read_solution(&instance, "3 1 1\n").is_err());
        assert!(converter.read_solution(&instance, "cost: 1\n").is_err());
    }
}
