// Consistency checks between stored solutions and their instances

use tracing::debug;

use super::models::{Instance, ModelError, Solution};

/// Absolute tolerance for comparing objective functions term by term
const FUNCTION_TOLERANCE: f64 = 1e-9;

/// Stored versus recomputed objective and feasibility of one solution
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub stored_objective: f64,
    pub recomputed_objective: f64,
    pub stored_feasible: bool,
    pub recomputed_feasible: bool,
}

impl VerificationReport {
    pub fn objective_matches(&self) -> bool {
        self.stored_objective == self.recomputed_objective
    }

    pub fn feasibility_matches(&self) -> bool {
        self.stored_feasible == self.recomputed_feasible
    }

    pub fn is_consistent(&self) -> bool {
        self.objective_matches() && self.feasibility_matches()
    }
}

/// Re-evaluate a solution's state against its instance.
///
/// Comparison is exact: a stored objective that differs from the recomputed
/// one in the last bit is reported as inconsistent.
pub fn verify_solution(
    instance: &Instance,
    solution: &Solution,
) -> Result<VerificationReport, ModelError> {
    let recomputed = instance.evaluate(&solution.state)?;
    Ok(VerificationReport {
        stored_objective: solution.objective,
        recomputed_objective: recomputed.objective,
        stored_feasible: solution.feasible,
        recomputed_feasible: recomputed.feasible,
    })
}

/// Same decision variables (id, kind, bound), same constraints (id, equality)
/// and objective functions equal term by term
pub fn same_instances(a: &Instance, b: &Instance) -> bool {
    if a.decision_variables.len() != b.decision_variables.len() {
        debug!("The number of decision variables is different");
        return false;
    }
    for (x, y) in a.decision_variables.iter().zip(&b.decision_variables) {
        if x.id != y.id || x.kind != y.kind || x.bound != y.bound {
            debug!(
                "Decision variables differ: id {} ({}, {}) vs id {} ({}, {})",
                x.id, x.kind, x.bound, y.id, y.kind, y.bound
            );
            return false;
        }
    }

    if a.constraints.len() != b.constraints.len() {
        debug!("The number of constraints is different");
        return false;
    }
    for (x, y) in a.constraints.iter().zip(&b.constraints) {
        if x.id != y.id || x.equality != y.equality {
            debug!(
                "Constraints differ: id {} ({}) vs id {} ({})",
                x.id, x.equality, y.id, y.equality
            );
            return false;
        }
    }

    if a.sense != b.sense || !a.objective.almost_equal(&b.objective, FUNCTION_TOLERANCE) {
        debug!("The objective functions are different");
        return false;
    }

    true
}

/// Same objective value, same state entries and same feasibility
pub fn same_solutions(a: &Solution, b: &Solution) -> bool {
    if a.objective != b.objective {
        debug!(
            "Objective values differ: {} vs {}",
            a.objective, b.objective
        );
        return false;
    }
    if a.state != b.state {
        for id in a.state.entries.keys().chain(b.state.entries.keys()) {
            let (x, y) = (a.state.get(*id), b.state.get(*id));
            if x != y {
                debug!("Variable {}: {:?} vs {:?}", id, x, y);
            }
        }
        return false;
    }
    if a.feasible != b.feasible {
        debug!("Feasibility differs: {} vs {}", a.feasible, b.feasible);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::function::Function;
    use crate::domain::models::{Constraint, DecisionVariable, State};
    use crate::domain::value_objects::Sense;

    fn instance() -> Instance {
        // minimize (x0 - 1)^2 subject to x0 - 1 = 0
        let shifted = Function::variable(0) - Function::constant(1.0);
        Instance::new(Sense::Minimize, shifted.try_mul(&shifted).unwrap())
            .with_variables(vec![DecisionVariable::binary(0)])
            .add_constraint(Constraint::equal_to_zero(0, shifted))
    }

    fn state(value: f64) -> State {
        [(0, value)].into_iter().collect()
    }

    #[test]
    fn evaluated_solution_is_consistent() {
        let instance = instance();
        let solution = instance.evaluate(&state(1.0)).unwrap();
        let report = verify_solution(&instance, &solution).unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.recomputed_objective, 0.0);
        assert!(report.recomputed_feasible);
    }

    #[test]
    fn tampered_objective_and_feasibility_are_reported() {
        let instance = instance();
        let mut solution = instance.evaluate(&state(0.0)).unwrap();
        assert!(!solution.feasible);

        solution.objective = 0.0;
        solution.feasible = true;
        let report = verify_solution(&instance, &solution).unwrap();
        assert!(!report.objective_matches());
        assert!(!report.feasibility_matches());
        assert!(!report.is_consistent());
    }

    #[test]
    fn instance_and_solution_comparison() {
        let a = instance();
        assert!(same_instances(&a, &a.clone()));

        let mut flipped = a.clone();
        flipped.sense = Sense::Maximize;
        assert!(!same_instances(&a, &flipped));

        let mut fewer = a.clone();
        fewer.constraints.clear();
        assert!(!same_instances(&a, &fewer));

        let s1 = a.evaluate(&state(1.0)).unwrap();
        let s0 = a.evaluate(&state(0.0)).unwrap();
        assert!(same_solutions(&s1, &s1.clone()));
        assert!(!same_solutions(&s1, &s0));
    }
}
