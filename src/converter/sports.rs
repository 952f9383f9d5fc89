// Sports timetabling: a phased double round robin with break counting
// Source: RobinX XML (Teams, Slots, CA4, GA1, BR1, BR2); solutions list
// x#home#away#slot, bh#team#slot and ba#team#slot with 0-based indices

use super::builder::{zero_state, ConstraintList};
use super::qoblib_format::parse_sol;
use crate::domain::{
    converter_service::{ConversionError, ConversionResult, InstanceConverter, ReferenceSolution},
    function::Function,
    models::{DecisionVariable, Instance},
    value_objects::{Sense, VariableId},
};

pub const DATASET: &str = "05_sports";
const TITLE: &str = "Sports";

fn malformed(message: impl Into<String>) -> ConversionError {
    ConversionError::Malformed(message.into())
}

/// Capacity of the games `teams1` play against `teams2` in `slots`
#[derive(Debug, Clone, PartialEq)]
pub struct GameCapacity {
    pub teams1: Vec<usize>,
    pub teams2: Vec<usize>,
    pub slots: Vec<usize>,
    pub max: f64,
}

/// Bounds on how often the listed (home, away) meetings happen in `slots`
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingBound {
    pub meetings: Vec<(usize, usize)>,
    pub slots: Vec<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Break limit of single teams over `slots`
#[derive(Debug, Clone, PartialEq)]
pub struct BreakLimit {
    pub teams: Vec<usize>,
    pub slots: Vec<usize>,
    pub max: f64,
}

/// Round robin problem read from a RobinX document
#[derive(Debug, Clone, PartialEq)]
pub struct Timetable {
    pub teams: usize,
    pub slots: usize,
    pub capacities: Vec<GameCapacity>,
    pub meetings: Vec<MeetingBound>,
    pub breaks: Vec<BreakLimit>,
    /// Cap on the total number of breaks
    pub total_breaks: Option<f64>,
}

fn list(node: roxmltree::Node, attribute: &str, limit: usize) -> ConversionResult<Vec<usize>> {
    node.attribute(attribute)
        .unwrap_or("")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(v) if v < limit => Ok(v),
            _ => Err(malformed(format!(
                "{} '{}' of {} is outside 0..{}",
                attribute,
                s,
                node.tag_name().name(),
                limit
            ))),
        })
        .collect()
}

fn number(node: roxmltree::Node, attribute: &str) -> ConversionResult<Option<f64>> {
    node.attribute(attribute)
        .map(|v| {
            v.trim().parse::<f64>().map_err(|_| {
                malformed(format!(
                    "{} of {} is not a number",
                    attribute,
                    node.tag_name().name()
                ))
            })
        })
        .transpose()
}

fn required(node: roxmltree::Node, attribute: &str) -> ConversionResult<f64> {
    number(node, attribute)?.ok_or_else(|| {
        malformed(format!(
            "{} has no '{}' attribute",
            node.tag_name().name(),
            attribute
        ))
    })
}

fn elements<'a, 'input>(
    document: &'a roxmltree::Document<'input>,
    tag: &str,
) -> Vec<roxmltree::Node<'a, 'input>> {
    document
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == tag)
        .collect()
}

/// Parse a RobinX instance
pub fn parse_robinx(data: &str) -> ConversionResult<Timetable> {
    let document =
        roxmltree::Document::parse(data).map_err(|e| malformed(format!("invalid XML: {}", e)))?;

    let teams = elements(&document, "team").len();
    let slots = elements(&document, "slot").len();
    if teams < 2 || teams % 2 != 0 {
        return Err(malformed(format!("needs an even number of teams, found {}", teams)));
    }
    if slots == 0 {
        return Err(malformed("no slots declared"));
    }

    let capacities = elements(&document, "CA4")
        .into_iter()
        .map(|node| -> ConversionResult<GameCapacity> {
            Ok(GameCapacity {
                teams1: list(node, "teams1", teams)?,
                teams2: list(node, "teams2", teams)?,
                slots: list(node, "slots", slots)?,
                max: required(node, "max")?,
            })
        })
        .collect::<ConversionResult<Vec<_>>>()?;

    let mut meetings = Vec::new();
    for node in elements(&document, "GA1") {
        let pairs: Vec<(usize, usize)> = match node.attribute("meetings") {
            Some(text) => text
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|pair| {
                    let parsed = pair
                        .split_once(',')
                        .and_then(|(h, a)| {
                            Some((
                                h.trim().parse::<usize>().ok()?,
                                a.trim().parse::<usize>().ok()?,
                            ))
                        });
                    match parsed {
                        Some((h, a)) if h < teams && a < teams => Ok((h, a)),
                        _ => Err(malformed(format!("invalid GA1 meeting '{}'", pair))),
                    }
                })
                .collect::<ConversionResult<_>>()?,
            None => list(node, "teams1", teams)?
                .into_iter()
                .zip(list(node, "teams2", teams)?)
                .collect(),
        };
        let bound = MeetingBound {
            meetings: pairs,
            slots: list(node, "slots", slots)?,
            min: number(node, "min")?,
            max: number(node, "max")?,
        };
        // empty sets would turn a lower bound into an infeasible row
        if !bound.meetings.is_empty() && !bound.slots.is_empty() {
            meetings.push(bound);
        }
    }

    let breaks = elements(&document, "BR1")
        .into_iter()
        .map(|node| -> ConversionResult<BreakLimit> {
            Ok(BreakLimit {
                teams: list(node, "teams", teams)?,
                slots: list(node, "slots", slots)?,
                max: required(node, "intp")?,
            })
        })
        .collect::<ConversionResult<Vec<_>>>()?;

    let total_breaks = match elements(&document, "BR2").first() {
        Some(&node) => Some(required(node, "intp")?),
        None => None,
    };

    Ok(Timetable {
        teams,
        slots,
        capacities,
        meetings,
        breaks,
        total_breaks,
    })
}

/// Mixed integer formulation.
///
/// Variables: home breaks `bh[t,s]` (ids `t*S + s`), away breaks `ba[t,s]`
/// (ids `T*S + t*S + s`) and games `x[h,s,a]` (ids `2*T*S + (h*S + s)*T + a`),
/// home team `h` against away team `a` in slot `s`.
pub struct SportsMixedIntegerLinear;

struct Layout {
    teams: usize,
    slots: usize,
}

impl Layout {
    fn bh(&self, t: usize, s: usize) -> VariableId {
        (t * self.slots + s) as VariableId
    }

    fn ba(&self, t: usize, s: usize) -> VariableId {
        (self.teams * self.slots + t * self.slots + s) as VariableId
    }

    fn x(&self, h: usize, s: usize, a: usize) -> VariableId {
        (2 * self.teams * self.slots + (h * self.slots + s) * self.teams + a) as VariableId
    }

    fn variable_count(&self) -> usize {
        2 * self.teams * self.slots + self.teams * self.slots * self.teams
    }

    /// Recover (teams, slots) from `2*T*S + T*T*S` variables and the `T*(T-1)`
    /// meeting rows at the front of the constraints
    fn of(instance: &Instance) -> ConversionResult<Self> {
        let meetings = instance
            .constraints
            .iter()
            .take_while(|c| c.name.as_deref() == Some("c1"))
            .count();
        let teams = (2..=meetings + 1)
            .find(|t| t * (t - 1) == meetings)
            .ok_or_else(|| malformed("instance is not a sports layout"))?;
        let slots = instance.num_variables() / (2 * teams + teams * teams);
        let layout = Self { teams, slots };
        if slots == 0 || layout.variable_count() != instance.num_variables() {
            return Err(malformed("instance is not a sports layout"));
        }
        Ok(layout)
    }
}

impl SportsMixedIntegerLinear {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SportsMixedIntegerLinear {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for SportsMixedIntegerLinear {
    fn build_instance(&self, _name: &str, data: &str) -> ConversionResult<Instance> {
        let problem = parse_robinx(data)?;
        let (nt, ns) = (problem.teams, problem.slots);
        let layout = Layout {
            teams: nt,
            slots: ns,
        };

        let mut variables = Vec::with_capacity(layout.variable_count());
        for t in 0..nt {
            for s in 0..ns {
                variables.push(
                    DecisionVariable::binary(layout.bh(t, s)).with_name("bh", vec![t as i64, s as i64]),
                );
            }
        }
        for t in 0..nt {
            for s in 0..ns {
                variables.push(
                    DecisionVariable::binary(layout.ba(t, s)).with_name("ba", vec![t as i64, s as i64]),
                );
            }
        }
        for h in 0..nt {
            for s in 0..ns {
                for a in 0..nt {
                    variables.push(
                        DecisionVariable::binary(layout.x(h, s, a))
                            .with_name("x", vec![h as i64, s as i64, a as i64]),
                    );
                }
            }
        }

        let mut constraints = ConstraintList::new();

        for h in 0..nt {
            for a in (0..nt).filter(|&a| a != h) {
                let mut f = Function::constant(-1.0);
                for s in 0..ns {
                    f.add_linear(layout.x(h, s, a), 1.0);
                }
                constraints.equal(f, "c1", &[h, a]);
            }
        }

        for s in 0..ns {
            let mut f = Function::constant(-((nt / 2) as f64));
            for h in 0..nt {
                for a in (0..nt).filter(|&a| a != h) {
                    f.add_linear(layout.x(h, s, a), 1.0);
                }
            }
            constraints.equal(f, "c2", &[s]);
        }

        for t in 0..nt {
            for s in 0..ns {
                let mut f = Function::constant(-1.0);
                for other in (0..nt).filter(|&o| o != t) {
                    f.add_linear(layout.x(t, s, other), 1.0);
                    f.add_linear(layout.x(other, s, t), 1.0);
                }
                constraints.equal(f, "c3", &[t, s]);
            }
        }

        // two consecutive home (away) games count as a break in the later slot
        for t in 0..nt {
            for s in 1..ns {
                let mut home = Function::constant(-1.0);
                let mut away = Function::constant(-1.0);
                for other in (0..nt).filter(|&o| o != t) {
                    for slot in [s - 1, s] {
                        home.add_linear(layout.x(t, slot, other), 1.0);
                        away.add_linear(layout.x(other, slot, t), 1.0);
                    }
                }
                home.add_linear(layout.bh(t, s), -1.0);
                away.add_linear(layout.ba(t, s), -1.0);
                constraints.less_or_equal(home, "br_count_home", &[t, s]);
                constraints.less_or_equal(away, "br_count_away", &[t, s]);
            }
        }

        // phased: every pair meets once in the first half
        for i in 0..nt {
            for j in (i + 1)..nt {
                let mut f = Function::constant(-1.0);
                for s in 0..ns / 2 {
                    f.add_linear(layout.x(i, s, j), 1.0);
                    f.add_linear(layout.x(j, s, i), 1.0);
                }
                constraints.equal(f, "c4", &[i, j]);
            }
        }

        for (k, ca) in problem.capacities.iter().enumerate() {
            let mut f = Function::constant(-ca.max);
            for &m in &ca.teams1 {
                for &n in ca.teams2.iter().filter(|&&n| n != m) {
                    for &s in &ca.slots {
                        f.add_linear(layout.x(m, s, n), 1.0);
                    }
                }
            }
            constraints.less_or_equal(f, "ca4", &[k]);
        }

        for (k, ga) in problem.meetings.iter().enumerate() {
            let mut played = Function::zero();
            for &(h, a) in &ga.meetings {
                for &s in &ga.slots {
                    played.add_linear(layout.x(h, s, a), 1.0);
                }
            }
            if let Some(min) = ga.min {
                let mut f = -played.clone();
                f.add_constant(min);
                constraints.less_or_equal(f, "ga1_min", &[k]);
            }
            if let Some(max) = ga.max {
                let mut f = played;
                f.add_constant(-max);
                constraints.less_or_equal(f, "ga1_max", &[k]);
            }
        }

        for (k, br) in problem.breaks.iter().enumerate() {
            for &t in &br.teams {
                let mut f = Function::constant(-br.max);
                for &s in br.slots.iter().filter(|&&s| s >= 1) {
                    f.add_linear(layout.bh(t, s), 1.0);
                    f.add_linear(layout.ba(t, s), 1.0);
                }
                constraints.less_or_equal(f, "br1", &[k, t]);
            }
        }

        if let Some(cap) = problem.total_breaks {
            let mut f = Function::constant(-cap);
            for t in 0..nt {
                for s in 1..ns {
                    f.add_linear(layout.bh(t, s), 1.0);
                    f.add_linear(layout.ba(t, s), 1.0);
                }
            }
            constraints.less_or_equal(f, "br2", &[]);
        }

        Ok(Instance::new(Sense::Minimize, Function::zero())
            .with_variables(variables)
            .with_constraints(constraints.into_vec()))
    }

    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        let layout = Layout::of(instance)?;
        let sol = parse_sol(data)?;
        let games = sol
            .indexed_values_of("x")
            .ok_or_else(|| malformed("solution has no x#home#away#slot entries"))?;

        let mut state = zero_state(instance);
        let in_range = |t: usize, s: usize| t < layout.teams && s < layout.slots;
        for (indices, &value) in games {
            match indices.as_slice() {
                &[h, a, s] if in_range(h, s) && a < layout.teams => {
                    state.insert(layout.x(h, s, a), value)
                }
                _ => return Err(malformed(format!("invalid game index {:?}", indices))),
            }
        }
        for (name, home) in [("bh", true), ("ba", false)] {
            for (indices, &value) in sol.indexed_values_of(name).into_iter().flatten() {
                match indices.as_slice() {
                    &[t, s] if in_range(t, s) => {
                        let id = if home { layout.bh(t, s) } else { layout.ba(t, s) };
                        state.insert(id, value);
                    }
                    _ => return Err(malformed(format!("invalid {} index {:?}", name, indices))),
                }
            }
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
        "mixed_integer_linear"
    }

    fn title(&self) -> &str {
        TITLE
    }
}
