// Helpers shared by the formulations that generate many constraints

use crate::domain::{
    function::Function,
    models::{Constraint, Instance, State},
    value_objects::ConstraintId,
};

/// Collects constraints and numbers them in insertion order
#[derive(Debug, Default)]
pub struct ConstraintList {
    constraints: Vec<Constraint>,
}

impl ConstraintList {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> ConstraintId {
        self.constraints.len() as ConstraintId
    }

    fn subscripts(subscripts: &[usize]) -> Vec<i64> {
        subscripts.iter().map(|&s| s as i64).collect()
    }

    /// `function = 0`
    pub fn equal(&mut self, function: Function, name: &str, subscripts: &[usize]) {
        let constraint = Constraint::equal_to_zero(self.next_id(), function)
            .with_name(name, Self::subscripts(subscripts));
        self.constraints.push(constraint);
    }

    /// `function <= 0`
    pub fn less_or_equal(&mut self, function: Function, name: &str, subscripts: &[usize]) {
        let constraint = Constraint::less_than_or_equal_to_zero(self.next_id(), function)
            .with_name(name, Self::subscripts(subscripts));
        self.constraints.push(constraint);
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn into_vec(self) -> Vec<Constraint> {
        self.constraints
    }
}

/// Assignment with every decision variable of `instance` set to 0
pub fn zero_state(instance: &Instance) -> State {
    instance
        .decision_variables
        .iter()
        .map(|v| (v.id, 0.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::DecisionVariable;
    use crate::domain::value_objects::{Equality, Sense};

    #[test]
    fn ids_follow_insertion_order() {
        let mut list = ConstraintList::new();
        assert!(list.is_empty());
        list.equal(Function::variable(0), "a", &[1, 2]);
        list.less_or_equal(Function::variable(1), "b", &[]);
        assert_eq!(list.len(), 2);

        let constraints = list.into_vec();
        assert_eq!(constraints[0].id, 0);
        assert_eq!(constraints[0].subscripts, vec![1, 2]);
        assert_eq!(constraints[1].id, 1);
        assert_eq!(constraints[1].equality, Equality::LessThanOrEqualToZero);
        assert_eq!(constraints[1].name.as_deref(), Some("b"));
    }

    #[test]
    fn zero_state_covers_every_variable() {
        let instance = Instance::new(Sense::Minimize, Function::zero())
            .with_variables(vec![DecisionVariable::binary(3), DecisionVariable::binary(7)]);
        let state = zero_state(&instance);
        assert_eq!(state.len(), 2);
        assert_eq!(state.get(7), Some(0.0));
    }
}
