// Multi-period portfolio optimization with binary position encoding
// Source: covariance lines `t stock_i stock_j value` and price lines
// `t stock price`, in one file or a bundle; q and the position budget come
// from the instance name (`..._q0.0005_b020`)

use std::collections::{BTreeMap, BTreeSet};

use super::builder::{zero_state, ConstraintList};
use super::qoblib_format::parse_sol;
use crate::domain::{
    converter_service::{ConversionError, ConversionResult, InstanceConverter, ReferenceSolution},
    function::Function,
    models::{DecisionVariable, Instance},
    value_objects::{Sense, VariableId},
};

pub const DATASET: &str = "06_portfolio";
const TITLE: &str = "Portfolio";

pub const CASH: f64 = 1_000_000.0;
pub const UNIT: f64 = 100_000.0;
/// Transaction fee rate
pub const DELTA: f64 = 0.001;
/// Interest earned on cash
pub const RHO_CASH: f64 = 0.0001;
/// Borrowing cost of short positions
pub const RHO_SHORT: f64 = 0.000025;
pub const UPSCALE: f64 = 1.0;
/// Position magnitude choices per asset, side and period
pub const MAGNITUDES: usize = 3;
pub const CASH_BITS: usize = 4;
pub const POSITION_BITS: usize = 5;
/// Weight of the squared budget residuals in the unconstrained model
pub const PENALTY: f64 = 1e6;

/// Instance annotation listing the asset symbols in index order
pub const SYMBOLS_ANNOTATION: &str = "org.ommx.qoblib.portfolio.symbols";

pub const DEFAULT_RISK_AVERSION: f64 = 1.0;
pub const DEFAULT_POSITION_BUDGET: usize = 4;

// per side: index 0 is short, index 1 is long
const SIDE_PNL: [f64; 2] = [-1.0, 1.0];
const SIDE_CASH: [f64; 2] = [-1.0, 1.0];
const SIDE_SHORT: [f64; 2] = [1.0, 0.0];

fn malformed(message: impl Into<String>) -> ConversionError {
    ConversionError::Malformed(message.into())
}

/// Prices and covariances indexed by sorted asset and period
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    pub assets: Vec<String>,
    pub periods: Vec<i64>,
    /// `cov[(i * nS + j) * nT + t]`
    pub covariance: Vec<f64>,
    /// `prices[i * nT + t]`
    pub prices: Vec<f64>,
}

impl Market {
    pub fn covariance(&self, i: usize, j: usize, t: usize) -> f64 {
        let (ns, nt) = (self.assets.len(), self.periods.len());
        self.covariance[(i * ns + j) * nt + t]
    }

    pub fn price(&self, i: usize, t: usize) -> f64 {
        self.prices[i * self.periods.len() + t]
    }

    /// Price scaled so that one unit is worth `UNIT` at the first period
    pub fn unit_price(&self, i: usize, t: usize) -> f64 {
        let base = match self.price(i, 0) {
            p if p == 0.0 => 1e-12,
            p => p,
        };
        self.price(i, t) * UNIT / base
    }
}

fn period(token: &str) -> ConversionResult<i64> {
    token
        .parse::<i64>()
        .map_err(|_| malformed(format!("'{}' is not a period", token)))
}

fn value(token: &str) -> ConversionResult<f64> {
    token
        .parse::<f64>()
        .map_err(|_| malformed(format!("'{}' is not a number", token)))
}

/// Read covariance (4 fields) and price (3 fields) lines in any order
pub fn parse_market(data: &str) -> ConversionResult<Market> {
    let mut covariances = Vec::new();
    let mut prices = Vec::new();
    let mut assets = BTreeSet::new();
    let mut periods = BTreeSet::new();

    for line in data
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("==>"))
    {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [t, si, sj, v] => {
                let t = period(t)?;
                covariances.push((t, si.to_string(), sj.to_string(), value(v)?));
                assets.insert(si.to_string());
                assets.insert(sj.to_string());
                periods.insert(t);
            }
            [t, s, p] => {
                let t = period(t)?;
                prices.push((t, s.to_string(), value(p)?));
                assets.insert(s.to_string());
                periods.insert(t);
            }
            _ => return Err(malformed(format!("unrecognized line '{}'", line))),
        }
    }
    if prices.is_empty() {
        return Err(malformed("no price lines found"));
    }

    let assets: Vec<String> = assets.into_iter().collect();
    let periods: Vec<i64> = periods.into_iter().collect();
    let asset_index: BTreeMap<&str, usize> =
        assets.iter().enumerate().map(|(i, a)| (a.as_str(), i)).collect();
    let period_index: BTreeMap<i64, usize> =
        periods.iter().enumerate().map(|(i, &t)| (t, i)).collect();
    let (ns, nt) = (assets.len(), periods.len());

    let mut covariance = vec![0.0; ns * ns * nt];
    for (t, si, sj, v) in &covariances {
        let (i, j, t) = (asset_index[si.as_str()], asset_index[sj.as_str()], period_index[t]);
        covariance[(i * ns + j) * nt + t] = *v;
    }
    let mut price = vec![0.0; ns * nt];
    for (t, s, p) in &prices {
        price[asset_index[s.as_str()] * nt + period_index[t]] = *p;
    }

    Ok(Market {
        assets,
        periods,
        covariance,
        prices: price,
    })
}

/// Risk aversion `q` and position budget `b` from `..._q<float>_b<int>`
pub fn name_parameters(name: &str) -> (f64, usize) {
    let q = name
        .split_once("_q")
        .and_then(|(_, rest)| rest.split_once("_b"))
        .and_then(|(q, _)| q.parse::<f64>().ok())
        .unwrap_or(DEFAULT_RISK_AVERSION);
    let b = name
        .rsplit_once("_b")
        .map(|(_, rest)| {
            rest.chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
        })
        .and_then(|digits| digits.parse::<usize>().ok())
        .unwrap_or(DEFAULT_POSITION_BUDGET);
    (q, b)
}

/// Variable layout shared by both formulations
#[derive(Debug, Clone, Copy)]
struct Layout {
    assets: usize,
    periods: usize,
}

impl Layout {
    fn x(&self, i: usize, m: usize, side: usize, t: usize) -> VariableId {
        ((((i * MAGNITUDES) + m) * 2 + side) * self.periods + t) as VariableId
    }

    fn positions(&self) -> usize {
        self.assets * MAGNITUDES * 2 * self.periods
    }

    fn s1(&self, k: usize, t: usize) -> VariableId {
        (self.positions() + k * self.periods + t) as VariableId
    }

    fn s2(&self, k: usize, t: usize) -> VariableId {
        (self.positions() + CASH_BITS * self.periods + k * self.periods + t) as VariableId
    }

    fn variable_count(&self) -> usize {
        self.positions() + (CASH_BITS + POSITION_BITS) * self.periods
    }

    /// Every (asset, magnitude, side) triple
    fn holdings(&self) -> impl Iterator<Item = (usize, usize, usize)> {
        let assets = self.assets;
        (0..assets).flat_map(|i| (0..MAGNITUDES).flat_map(move |m| (0..2).map(move |sl| (i, m, sl))))
    }
}

/// Objective and the two budget rows per period (`lhs - rhs`)
struct Model {
    assets: Vec<String>,
    layout: Layout,
    objective: Function,
    cash_rows: Vec<Function>,
    position_rows: Vec<Function>,
}

fn build_model(name: &str, data: &str) -> ConversionResult<Model> {
    let market = parse_market(data)?;
    let (q, budget) = name_parameters(name);
    let layout = Layout {
        assets: market.assets.len(),
        periods: market.periods.len(),
    };
    let nt = layout.periods;
    let up = |i: usize, t: usize| market.unit_price(i, t);
    let next = |t: usize| (t + 1).min(nt - 1);

    let mut objective = Function::zero();
    for t in 0..nt {
        for (i, m, sl) in layout.holdings() {
            for (j, n, sl2) in layout.holdings() {
                let c = q * SIDE_PNL[sl] * SIDE_PNL[sl2] * market.covariance(i, j, t) * up(i, t) * up(j, t);
                if c != 0.0 {
                    objective.add_quadratic(layout.x(i, m, sl, t), layout.x(j, n, sl2, t), c);
                }
            }
        }
        for k in 0..CASH_BITS {
            objective.add_linear(layout.s1(k, t), -RHO_CASH * UNIT * (1u64 << k) as f64);
        }
        for (i, m, sl) in layout.holdings() {
            let x = layout.x(i, m, sl, t);
            let short = RHO_SHORT * SIDE_SHORT[sl] * up(i, t);
            let profit = SIDE_PNL[sl] * (up(i, next(t)) - up(i, t));
            let fee = DELTA * up(i, t);
            let first = t == 0;
            let last = t == nt - 1;
            let mut coefficient = short;
            if first {
                coefficient += profit - fee;
            } else if !last {
                // fee on the change against the previous period
                let previous = layout.x(i, m, sl, t - 1);
                coefficient += profit - fee;
                objective.add_linear(previous, -fee);
                objective.add_quadratic(previous, x, 2.0 * fee);
            }
            if last {
                coefficient += fee;
            }
            if coefficient != 0.0 {
                objective.add_linear(x, coefficient);
            }
        }
    }

    let bcash = CASH / UNIT;
    let mut cash_rows = Vec::with_capacity(nt);
    let mut position_rows = Vec::with_capacity(nt);
    for t in 0..nt {
        let mut cash = Function::constant(-bcash);
        let mut positions = Function::constant(-(budget as f64));
        for (i, m, sl) in layout.holdings() {
            cash.add_linear(layout.x(i, m, sl, t), SIDE_CASH[sl]);
            positions.add_linear(layout.x(i, m, sl, t), 1.0);
        }
        for k in 0..CASH_BITS {
            cash.add_linear(layout.s1(k, t), (1u64 << k) as f64);
        }
        for k in 0..POSITION_BITS {
            positions.add_linear(layout.s2(k, t), (1u64 << k) as f64);
        }
        cash_rows.push(cash);
        position_rows.push(positions);
    }

    Ok(Model {
        assets: market.assets.clone(),
        layout,
        objective: objective * UPSCALE,
        cash_rows,
        position_rows,
    })
}

/// Layout from the named bits of the constrained model
fn layout_of(instance: &Instance) -> ConversionResult<Layout> {
    let count = |name: &str| {
        instance
            .decision_variables
            .iter()
            .filter(|v| v.name.as_deref() == Some(name))
            .count()
    };
    let periods = count("s1Var") / CASH_BITS;
    let assets = match periods {
        0 => 0,
        nt => count("xVar") / (2 * MAGNITUDES * nt),
    };
    let layout = Layout { assets, periods };
    if periods == 0 || layout.variable_count() != instance.num_variables() {
        return Err(malformed("instance is not a portfolio layout"));
    }
    Ok(layout)
}

fn snap(value: f64) -> f64 {
    const EPS: f64 = 1e-6;
    if value.abs() <= EPS {
        0.0
    } else if (value - 1.0).abs() <= EPS {
        1.0
    } else {
        value.round()
    }
}

/// Constrained model over named `xVar`, `s1Var` and `s2Var` bits
pub struct PortfolioBinaryQuadratic;

impl PortfolioBinaryQuadratic {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PortfolioBinaryQuadratic {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for PortfolioBinaryQuadratic {
    fn build_instance(&self, name: &str, data: &str) -> ConversionResult<Instance> {
        let model = build_model(name, data)?;
        let layout = model.layout;

        let mut variables = Vec::with_capacity(layout.variable_count());
        for (i, m, sl) in layout.holdings() {
            for t in 0..layout.periods {
                variables.push(
                    DecisionVariable::binary(layout.x(i, m, sl, t))
                        .with_name("xVar", vec![i as i64, m as i64, sl as i64, t as i64]),
                );
            }
        }
        for k in 0..CASH_BITS {
            for t in 0..layout.periods {
                variables.push(
                    DecisionVariable::binary(layout.s1(k, t)).with_name("s1Var", vec![k as i64, t as i64]),
                );
            }
        }
        for k in 0..POSITION_BITS {
            for t in 0..layout.periods {
                variables.push(
                    DecisionVariable::binary(layout.s2(k, t)).with_name("s2Var", vec![k as i64, t as i64]),
                );
            }
        }

        let mut constraints = ConstraintList::new();
        for (t, row) in model.cash_rows.into_iter().enumerate() {
            constraints.equal(row, "c2", &[t]);
        }
        for (t, row) in model.position_rows.into_iter().enumerate() {
            constraints.equal(row, "c3", &[t]);
        }

        let mut instance = Instance::new(Sense::Minimize, model.objective)
            .with_variables(variables)
            .with_constraints(constraints.into_vec());
        instance
            .metadata
            .annotations
            .insert(SYMBOLS_ANNOTATION.to_string(), model.assets.join(","));
        Ok(instance)
    }

    /// Reads `x$SYMBOL#m#side#t`, `s1#k#t` and `s2#k#t` lines. Magnitudes are
    /// 1-based, a side of `1` selects index 1, and a time token `@HEX` takes
    /// the period of the latest `s1` line.
    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        let layout = layout_of(instance)?;
        let symbols = instance
            .metadata
            .annotations
            .get(SYMBOLS_ANNOTATION)
            .map(|s| s.split(',').map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default();
        let symbol_index: BTreeMap<&str, usize> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        let sol = parse_sol(data)?;
        let mut state = zero_state(instance);
        let mut seen = false;
        let mut block: Option<usize> = None;
        let mut counters: BTreeMap<(usize, usize, usize), usize> = BTreeMap::new();

        for line in data.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [key, raw] = fields.as_slice() else {
                continue;
            };
            let v = snap(value(raw)?);

            let in_period = |t: usize| {
                if t < layout.periods {
                    Ok(t)
                } else {
                    Err(malformed(format!("period {} in '{}' is outside 0..{}", t, line, layout.periods)))
                }
            };

            if let Some(rest) = key.strip_prefix("x$") {
                let (rest, hex) = match rest.split_once('@') {
                    Some((head, _)) => (head.trim_end_matches('#'), true),
                    None => (rest, false),
                };
                let parts: Vec<&str> = rest.split('#').collect();
                let (symbol, magnitude, side, explicit) = match parts.as_slice() {
                    [symbol, m, side] => (*symbol, *m, *side, None),
                    [symbol, m, side, t] => (*symbol, *m, *side, Some(*t)),
                    _ => return Err(malformed(format!("unrecognized position '{}'", key))),
                };
                let i = *symbol_index
                    .get(symbol)
                    .ok_or_else(|| malformed(format!("unknown symbol '{}'", symbol)))?;
                let m = match magnitude.parse::<usize>() {
                    Ok(m) if m >= 1 && m <= MAGNITUDES => m - 1,
                    _ => return Err(malformed(format!("magnitude '{}' is outside 1..={}", magnitude, MAGNITUDES))),
                };
                let sl = match side {
                    "1" => 1,
                    "_1" | "_" | "0" => 0,
                    other => return Err(malformed(format!("unknown side '{}'", other))),
                };
                let t = if hex {
                    block.ok_or_else(|| malformed(format!("'{}' has no period to refer to", key)))?
                } else if let Some(t) = explicit {
                    let t = t
                        .parse::<usize>()
                        .map_err(|_| malformed(format!("'{}' is not a period", t)))?;
                    block = Some(t);
                    t
                } else {
                    let counter = counters.entry((i, m, sl)).or_insert(0);
                    *counter += 1;
                    *counter - 1
                };
                state.insert(layout.x(i, m, sl, in_period(t)?), v);
                seen = true;
            } else if let Some(rest) = key.strip_prefix("s1#").or_else(|| key.strip_prefix("s2#")) {
                let (k, t) = rest
                    .split_once('#')
                    .and_then(|(k, t)| Some((k.parse::<usize>().ok()?, t.parse::<usize>().ok()?)))
                    .ok_or_else(|| malformed(format!("unrecognized bit '{}'", key)))?;
                let t = in_period(t)?;
                let id = if key.starts_with("s1#") {
                    if k >= CASH_BITS {
                        return Err(malformed(format!("cash bit {} is outside 0..{}", k, CASH_BITS)));
                    }
                    block = Some(t);
                    layout.s1(k, t)
                } else {
                    if k >= POSITION_BITS {
                        return Err(malformed(format!("position bit {} is outside 0..{}", k, POSITION_BITS)));
                    }
                    layout.s2(k, t)
                };
                state.insert(id, v);
                seen = true;
            }
        }
        if !seen {
            return Err(malformed("solution has no x$, s1 or s2 entries"));
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
        "binary_quadratic"
    }

    fn title(&self) -> &str {
        TITLE
    }
}

/// Penalty model over one flat vector `x` in the constrained model's id order
pub struct PortfolioQuadraticUnconstrained;

impl PortfolioQuadraticUnconstrained {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PortfolioQuadraticUnconstrained {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceConverter for PortfolioQuadraticUnconstrained {
    fn build_instance(&self, name: &str, data: &str) -> ConversionResult<Instance> {
        let model = build_model(name, data)?;

        let mut objective = model.objective;
        for row in model.cash_rows.iter().chain(&model.position_rows) {
            objective = objective + row.try_mul(row)? * PENALTY;
        }

        let variables = (0..model.layout.variable_count())
            .map(|id| DecisionVariable::binary(id as VariableId).with_name("x", vec![id as i64]))
            .collect();

        Ok(Instance::new(Sense::Minimize, objective.prune()).with_variables(variables))
    }

    /// Reads `x#id value` lines with 1-based ids
    fn read_solution(&self, instance: &Instance, data: &str) -> ConversionResult<ReferenceSolution> {
        let sol = parse_sol(data)?;
        if sol.values_of("x").is_none() {
            return Err(malformed("solution has no x#id entries"));
        }

        let state = sol
            .dense("x", instance.num_variables())?
            .into_iter()
            .enumerate()
            .map(|(id, v)| (id as VariableId, snap(v)))
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
        "quadratic_unconstrained"
    }

    fn title(&self) -> &str {
        TITLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = "# t stock_i stock_j value\n\
        1 AAA AAA 1e-10\n1 BBB BBB 1e-10\n2 AAA AAA 1e-10\n2 BBB BBB 1e-10\n\
        # t stock price\n\
        1 AAA 10\n1 BBB 20\n2 AAA 12\n2 BBB 18\n";

    const NAME: &str = "bqp_a002_t02_q0.5_b001";

    // long one AAA unit in the first period: risk 0.5, profit 20000 - fee 100,
    // cash interest -90 and -100
    const EXPECTED: f64 = 19_710.5;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn market_is_indexed_by_sorted_keys() {
        let market = parse_market(DATA).unwrap();
        assert_eq!(market.assets, vec!["AAA", "BBB"]);
        assert_eq!(market.periods, vec![1, 2]);
        assert_eq!(market.price(1, 1), 18.0);
        assert_eq!(market.covariance(0, 0, 1), 1e-10);
        assert_eq!(market.unit_price(0, 1), 120_000.0);

        assert!(parse_market("1 AAA AAA 0.1\n").is_err());
        assert!(parse_market("1 AAA\n").is_err());
    }

    #[test]
    fn parameters_from_name() {
        assert_eq!(name_parameters(NAME), (0.5, 1));
        assert_eq!(name_parameters("bqp_eval_a010_t10_q0.000001_b004"), (0.000001, 4));
        assert_eq!(
            name_parameters("plain"),
            (DEFAULT_RISK_AVERSION, DEFAULT_POSITION_BUDGET)
        );
    }

    #[test]
    fn binary_quadratic_layout_and_evaluation() {
        let converter = PortfolioBinaryQuadratic::new();
        let instance = converter.build_instance(NAME, DATA).unwrap();
        instance.validate().unwrap();

        assert_eq!(instance.num_variables(), 24 + 8 + 10);
        assert_eq!(instance.num_constraints(), 4);
        assert_eq!(instance.objective.degree(), 2);
        assert_eq!(instance.metadata.annotations[SYMBOLS_ANNOTATION], "AAA,BBB");

        let data = "# Objective value = 19710.5\n\
            x$AAA#1#1#0 1\ns1#0#0 1\ns1#3#0 1\ns1#1#1 1\ns1#3#1 1\ns2#0#1 1\n";
        let reference = converter.read_solution(&instance, data).unwrap();
        assert_eq!(reference.reported_objective, Some(EXPECTED));
        assert_eq!(reference.state.get(2), Some(1.0));

        let solution = instance.evaluate(&reference.state).unwrap();
        assert!(close(solution.objective, EXPECTED), "{}", solution.objective);
        assert!(solution.feasible);
    }

    #[test]
    fn binary_quadratic_rejects_unknown_positions() {
        let converter = PortfolioBinaryQuadratic::new();
        let instance = converter.build_instance(NAME, DATA).unwrap();

        assert!(converter.read_solution(&instance, "x$ZZZ#1#1#0 1\n").is_err());
        assert!(converter.read_solution(&instance, "x$AAA#4#1#0 1\n").is_err());
        assert!(converter.read_solution(&instance, "s1#0#2 1\n").is_err());
        assert!(converter.read_solution(&instance, "# Objective value = 1\n").is_err());

        // a missing cash encoding leaves the budget row open
        let reference = converter.read_solution(&instance, "x$AAA#1#1#0 1\n").unwrap();
        assert!(!instance.evaluate(&reference.state).unwrap().feasible);
    }

    #[test]
    fn unconstrained_penalties_vanish_on_balanced_budgets() {
        let converter = PortfolioQuadraticUnconstrained::new();
        let instance = converter.build_instance(NAME, DATA).unwrap();
        assert_eq!(instance.num_variables(), 42);
        assert!(instance.constraints.is_empty());

        let data = "x#3 1\nx#25 1\nx#31 1\nx#28 1\nx#32 1\nx#34 1\n";
        let reference = converter.read_solution(&instance, data).unwrap();
        let objective = instance.evaluate(&reference.state).unwrap().objective;
        assert!(close(objective, EXPECTED), "{}", objective);

        // dropping the position bit costs the penalty weight
        let data = "x#3 1\nx#25 1\nx#31 1\nx#28 1\nx#32 1\n";
        let reference = converter.read_solution(&instance, data).unwrap();
        let objective = instance.evaluate(&reference.state).unwrap().objective;
        assert!(close(objective, EXPECTED + PENALTY), "{}", objective);
    }
}
