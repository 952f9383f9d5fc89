use std::collections::{BTreeMap, BTreeSet};

use super::function::Function;
use super::value_objects::{Bound, ConstraintId, Equality, Sense, VariableId, VariableKind};

/// Absolute tolerance used when deciding whether a constraint holds
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Error types for building and evaluating instances
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Duplicate decision variable id {0}")]
    DuplicateVariable(VariableId),

    #[error("Duplicate constraint id {0}")]
    DuplicateConstraint(ConstraintId),

    #[error("Decision variable {id} has invalid bound {bound}")]
    InvalidBound { id: VariableId, bound: Bound },

    #[error("{context} references undefined decision variable {id}")]
    UndefinedVariable { id: VariableId, context: String },

    #[error("No value given for decision variable {0}")]
    MissingValue(VariableId),

    #[error("State assigns a value to unknown decision variable {0}")]
    UnknownVariable(VariableId),

    #[error("Function degree {0} exceeds the supported degree of 2")]
    DegreeOverflow(usize),
}

/// Decision variable of an instance
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionVariable {
    pub id: VariableId,
    pub kind: VariableKind,
    pub bound: Bound,
    pub name: Option<String>,
    pub subscripts: Vec<i64>,
}

impl DecisionVariable {
    pub fn continuous(id: VariableId, bound: Bound) -> Self {
        Self {
            id,
            kind: VariableKind::Continuous,
            bound,
            name: None,
            subscripts: Vec::new(),
        }
    }

    pub fn integer(id: VariableId, bound: Bound) -> Self {
        Self {
            kind: VariableKind::Integer,
            ..Self::continuous(id, bound)
        }
    }

    pub fn binary(id: VariableId) -> Self {
        Self {
            kind: VariableKind::Binary,
            ..Self::continuous(id, Bound::binary())
        }
    }

    pub fn with_name(mut self, name: impl Into<String>, subscripts: Vec<i64>) -> Self {
        self.name = Some(name.into());
        self.subscripts = subscripts;
        self
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind, VariableKind::Integer | VariableKind::Binary)
    }
}

/// Constraint `function = 0` or `function <= 0`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub id: ConstraintId,
    pub function: Function,
    pub equality: Equality,
    pub name: Option<String>,
    pub subscripts: Vec<i64>,
}

impl Constraint {
    pub fn equal_to_zero(id: ConstraintId, function: Function) -> Self {
        Self {
            id,
            function,
            equality: Equality::EqualToZero,
            name: None,
            subscripts: Vec::new(),
        }
    }

    pub fn less_than_or_equal_to_zero(id: ConstraintId, function: Function) -> Self {
        Self {
            equality: Equality::LessThanOrEqualToZero,
            ..Self::equal_to_zero(id, function)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>, subscripts: Vec<i64>) -> Self {
        self.name = Some(name.into());
        self.subscripts = subscripts;
        self
    }
}

/// Descriptive fields carried along with an instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceMetadata {
    pub title: String,
    pub dataset: String,
    pub license: String,
    pub authors: Vec<String>,
    pub annotations: BTreeMap<String, String>,
}

/// Complete optimization problem
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub sense: Sense,
    pub objective: Function,
    pub decision_variables: Vec<DecisionVariable>,
    pub constraints: Vec<Constraint>,
    pub metadata: InstanceMetadata,
}

impl Instance {
    pub fn new(sense: Sense, objective: Function) -> Self {
        Self {
            sense,
            objective,
            decision_variables: Vec::new(),
            constraints: Vec::new(),
            metadata: InstanceMetadata::default(),
        }
    }

    pub fn with_variables(mut self, variables: Vec<DecisionVariable>) -> Self {
        self.decision_variables = variables;
        self
    }

    pub fn add_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_metadata(mut self, metadata: InstanceMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn num_variables(&self) -> usize {
        self.decision_variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn num_integer_variables(&self) -> usize {
        self.decision_variables
            .iter()
            .filter(|v| v.is_integer())
            .count()
    }

    pub fn variable(&self, id: VariableId) -> Option<&DecisionVariable> {
        self.decision_variables.iter().find(|v| v.id == id)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }

    /// Check structural consistency: unique ids, sane bounds, no dangling references
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut variable_ids = BTreeSet::new();
        for var in &self.decision_variables {
            if !variable_ids.insert(var.id) {
                return Err(ModelError::DuplicateVariable(var.id));
            }
            if !var.bound.is_valid() {
                return Err(ModelError::InvalidBound {
                    id: var.id,
                    bound: var.bound,
                });
            }
        }

        if let Some(id) = self
            .objective
            .variable_ids()
            .into_iter()
            .find(|id| !variable_ids.contains(id))
        {
            return Err(ModelError::UndefinedVariable {
                id,
                context: "Objective".to_string(),
            });
        }

        let mut constraint_ids = BTreeSet::new();
        for constraint in &self.constraints {
            if !constraint_ids.insert(constraint.id) {
                return Err(ModelError::DuplicateConstraint(constraint.id));
            }
            if let Some(id) = constraint
                .function
                .variable_ids()
                .into_iter()
                .find(|id| !variable_ids.contains(id))
            {
                return Err(ModelError::UndefinedVariable {
                    id,
                    context: format!("Constraint {}", constraint.id),
                });
            }
        }

        Ok(())
    }

    /// Evaluate a variable assignment: objective value, constraint values, feasibility
    pub fn evaluate(&self, state: &State) -> Result<Solution, ModelError> {
        let known: BTreeSet<VariableId> = self.decision_variables.iter().map(|v| v.id).collect();
        if let Some(id) = state.entries.keys().copied().find(|id| !known.contains(id)) {
            return Err(ModelError::UnknownVariable(id));
        }

        let objective = self.objective.evaluate(state)?;

        let evaluated_constraints = self
            .constraints
            .iter()
            .map(|c| {
                Ok(EvaluatedConstraint {
                    id: c.id,
                    equality: c.equality,
                    evaluated_value: c.function.evaluate(state)?,
                    name: c.name.clone(),
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        let feasible = evaluated_constraints
            .iter()
            .all(|c| c.is_satisfied(FEASIBILITY_TOLERANCE));

        Ok(Solution {
            state: state.clone(),
            objective,
            evaluated_constraints,
            feasible,
            sense: self.sense,
        })
    }
}

/// Assignment of values to decision variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    pub entries: BTreeMap<VariableId, f64>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: VariableId, value: f64) {
        self.entries.insert(id, value);
    }

    pub fn get(&self, id: VariableId) -> Option<f64> {
        self.entries.get(&id).copied()
    }

    pub fn value(&self, id: VariableId) -> Result<f64, ModelError> {
        self.get(id).ok_or(ModelError::MissingValue(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(VariableId, f64)> for State {
    fn from_iter<T: IntoIterator<Item = (VariableId, f64)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Value of one constraint function under a state
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedConstraint {
    pub id: ConstraintId,
    pub equality: Equality,
    pub evaluated_value: f64,
    pub name: Option<String>,
}

impl EvaluatedConstraint {
    pub fn is_satisfied(&self, tolerance: f64) -> bool {
        match self.equality {
            Equality::EqualToZero => self.evaluated_value.abs() <= tolerance,
            Equality::LessThanOrEqualToZero => self.evaluated_value <= tolerance,
        }
    }
}

/// Evaluated solution of an instance
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub state: State,
    pub objective: f64,
    pub evaluated_constraints: Vec<EvaluatedConstraint>,
    pub feasible: bool,
    pub sense: Sense,
}

impl Solution {
    pub fn num_violated_constraints(&self) -> usize {
        self.evaluated_constraints
            .iter()
            .filter(|c| !c.is_satisfied(FEASIBILITY_TOLERANCE))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // maximize x0 + x1 subject to x0 + x1 - 1 <= 0
    fn edge_instance() -> Instance {
        let objective = Function::variable(0) + Function::variable(1);
        let constraint = Function::variable(0) + Function::variable(1) - Function::constant(1.0);
        Instance::new(Sense::Maximize, objective)
            .with_variables(vec![DecisionVariable::binary(0), DecisionVariable::binary(1)])
            .add_constraint(Constraint::less_than_or_equal_to_zero(0, constraint))
    }

    #[test]
    fn evaluate_feasible_assignment() {
        let instance = edge_instance();
        let solution = instance
            .evaluate(&[(0, 1.0), (1, 0.0)].into_iter().collect())
            .unwrap();

        assert_eq!(solution.objective, 1.0);
        assert!(solution.feasible);
        assert_eq!(solution.evaluated_constraints[0].evaluated_value, 0.0);
        assert_eq!(solution.sense, Sense::Maximize);
    }

    #[test]
    fn evaluate_infeasible_assignment() {
        let instance = edge_instance();
        let solution = instance
            .evaluate(&[(0, 1.0), (1, 1.0)].into_iter().collect())
            .unwrap();

        assert_eq!(solution.objective, 2.0);
        assert!(!solution.feasible);
        assert_eq!(solution.num_violated_constraints(), 1);
    }

    #[test]
    fn evaluate_rejects_incomplete_and_foreign_states() {
        let instance = edge_instance();

        let missing = instance.evaluate(&[(0, 1.0)].into_iter().collect());
        assert!(matches!(missing, Err(ModelError::MissingValue(1))));

        let foreign = instance.evaluate(&[(0, 1.0), (1, 0.0), (9, 1.0)].into_iter().collect());
        assert!(matches!(foreign, Err(ModelError::UnknownVariable(9))));
    }

    #[test]
    fn evaluate_wide_state() {
        let n: VariableId = 20_000;
        let objective = (0..n).fold(Function::zero(), |f, id| f + Function::variable(id));
        let instance = Instance::new(Sense::Minimize, objective)
            .with_variables((0..n).map(DecisionVariable::binary).collect());

        let mut state: State = (0..n).map(|id| (id, (id % 2) as f64)).collect();
        let solution = instance.evaluate(&state).unwrap();
        assert_eq!(solution.objective, (n / 2) as f64);
        assert!(solution.feasible);

        state.insert(n, 1.0);
        assert!(matches!(
            instance.evaluate(&state),
            Err(ModelError::UnknownVariable(id)) if id == n
        ));
    }

    #[test]
    fn validate_detects_structural_errors() {
        assert!(edge_instance().validate().is_ok());

        let duplicate = edge_instance().with_variables(vec![
            DecisionVariable::binary(0),
            DecisionVariable::binary(0),
        ]);
        assert!(matches!(
            duplicate.validate(),
            Err(ModelError::DuplicateVariable(0))
        ));

        let dangling = edge_instance().add_constraint(Constraint::equal_to_zero(
            1,
            Function::variable(5),
        ));
        assert!(matches!(
            dangling.validate(),
            Err(ModelError::UndefinedVariable { id: 5, .. })
        ));

        let inverted = edge_instance().with_variables(vec![
            DecisionVariable::binary(0),
            DecisionVariable::integer(1, Bound::new(3.0, 1.0)),
        ]);
        assert!(matches!(
            inverted.validate(),
            Err(ModelError::InvalidBound { id: 1, .. })
        ));
    }
}
