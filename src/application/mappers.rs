// Mappers: Convert between protobuf wire messages and domain models
// This keeps prost types isolated from the interchange model

use crate::domain::{
    function::Function,
    models::{Constraint, DecisionVariable, EvaluatedConstraint, Instance, InstanceMetadata, Solution, State},
    value_objects::{Bound, Equality, Sense, VariableKind},
};

#[cfg(feature = "grpc")]
pub mod registry_proto {
    tonic::include_proto!("qoblib_registry");
}

/// Protobuf messages of the archive format
pub mod wire {
    use std::collections::BTreeMap;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Kind {
        Unspecified = 0,
        Continuous = 1,
        Integer = 2,
        Binary = 3,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Equality {
        Unspecified = 0,
        EqualToZero = 1,
        LessThanOrEqualToZero = 2,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Sense {
        Unspecified = 0,
        Minimize = 1,
        Maximize = 2,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct LinearTerm {
        #[prost(uint64, tag = "1")]
        pub id: u64,
        #[prost(double, tag = "2")]
        pub coefficient: f64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct QuadraticTerm {
        #[prost(uint64, tag = "1")]
        pub row: u64,
        #[prost(uint64, tag = "2")]
        pub column: u64,
        #[prost(double, tag = "3")]
        pub coefficient: f64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Function {
        #[prost(double, tag = "1")]
        pub constant: f64,
        #[prost(message, repeated, tag = "2")]
        pub linear: Vec<LinearTerm>,
        #[prost(message, repeated, tag = "3")]
        pub quadratic: Vec<QuadraticTerm>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Bound {
        #[prost(double, tag = "1")]
        pub lower: f64,
        #[prost(double, tag = "2")]
        pub upper: f64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct DecisionVariable {
        #[prost(uint64, tag = "1")]
        pub id: u64,
        #[prost(enumeration = "Kind", tag = "2")]
        pub kind: i32,
        #[prost(message, optional, tag = "3")]
        pub bound: Option<Bound>,
        #[prost(string, optional, tag = "4")]
        pub name: Option<String>,
        #[prost(int64, repeated, tag = "5")]
        pub subscripts: Vec<i64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Constraint {
        #[prost(uint64, tag = "1")]
        pub id: u64,
        #[prost(enumeration = "Equality", tag = "2")]
        pub equality: i32,
        #[prost(message, optional, tag = "3")]
        pub function: Option<Function>,
        #[prost(string, optional, tag = "4")]
        pub name: Option<String>,
        #[prost(int64, repeated, tag = "5")]
        pub subscripts: Vec<i64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Instance {
        #[prost(enumeration = "Sense", tag = "1")]
        pub sense: i32,
        #[prost(message, optional, tag = "2")]
        pub objective: Option<Function>,
        #[prost(message, repeated, tag = "3")]
        pub decision_variables: Vec<DecisionVariable>,
        #[prost(message, repeated, tag = "4")]
        pub constraints: Vec<Constraint>,
        #[prost(string, tag = "5")]
        pub title: String,
        #[prost(string, tag = "6")]
        pub dataset: String,
        #[prost(string, tag = "7")]
        pub license: String,
        #[prost(string, repeated, tag = "8")]
        pub authors: Vec<String>,
        #[prost(btree_map = "string, string", tag = "9")]
        pub annotations: BTreeMap<String, String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct State {
        #[prost(btree_map = "uint64, double", tag = "1")]
        pub entries: BTreeMap<u64, f64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct EvaluatedConstraint {
        #[prost(uint64, tag = "1")]
        pub id: u64,
        #[prost(enumeration = "Equality", tag = "2")]
        pub equality: i32,
        #[prost(double, tag = "3")]
        pub evaluated_value: f64,
        #[prost(string, optional, tag = "4")]
        pub name: Option<String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Solution {
        #[prost(message, optional, tag = "1")]
        pub state: Option<State>,
        #[prost(double, tag = "2")]
        pub objective: f64,
        #[prost(message, repeated, tag = "3")]
        pub evaluated_constraints: Vec<EvaluatedConstraint>,
        #[prost(bool, tag = "4")]
        pub feasible: bool,
        #[prost(enumeration = "Sense", tag = "5")]
        pub sense: i32,
    }

    /// Archive body: exactly one instance and at most one solution when valid
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Archive {
        #[prost(message, repeated, tag = "1")]
        pub instances: Vec<Instance>,
        #[prost(message, repeated, tag = "2")]
        pub solutions: Vec<Solution>,
        #[prost(btree_map = "string, string", tag = "3")]
        pub annotations: BTreeMap<String, String>,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Invalid {field} value {value}")]
    InvalidEnum { field: &'static str, value: i32 },

    #[error("Missing required field {0}")]
    MissingField(&'static str),
}

pub type Result<T> = std::result::Result<T, MappingError>;

fn kind_to_wire(kind: VariableKind) -> wire::Kind {
    match kind {
        VariableKind::Continuous => wire::Kind::Continuous,
        VariableKind::Integer => wire::Kind::Integer,
        VariableKind::Binary => wire::Kind::Binary,
    }
}

fn kind_from_wire(value: i32) -> Result<VariableKind> {
    match wire::Kind::try_from(value) {
        Ok(wire::Kind::Continuous) => Ok(VariableKind::Continuous),
        Ok(wire::Kind::Integer) => Ok(VariableKind::Integer),
        Ok(wire::Kind::Binary) => Ok(VariableKind::Binary),
        _ => Err(MappingError::InvalidEnum {
            field: "decision variable kind",
            value,
        }),
    }
}

fn equality_to_wire(equality: Equality) -> wire::Equality {
    match equality {
        Equality::EqualToZero => wire::Equality::EqualToZero,
        Equality::LessThanOrEqualToZero => wire::Equality::LessThanOrEqualToZero,
    }
}

fn equality_from_wire(value: i32) -> Result<Equality> {
    match wire::Equality::try_from(value) {
        Ok(wire::Equality::EqualToZero) => Ok(Equality::EqualToZero),
        Ok(wire::Equality::LessThanOrEqualToZero) => Ok(Equality::LessThanOrEqualToZero),
        _ => Err(MappingError::InvalidEnum {
            field: "constraint equality",
            value,
        }),
    }
}

fn sense_to_wire(sense: Sense) -> wire::Sense {
    match sense {
        Sense::Minimize => wire::Sense::Minimize,
        Sense::Maximize => wire::Sense::Maximize,
    }
}

fn sense_from_wire(value: i32) -> Result<Sense> {
    match wire::Sense::try_from(value) {
        Ok(wire::Sense::Minimize) => Ok(Sense::Minimize),
        Ok(wire::Sense::Maximize) => Ok(Sense::Maximize),
        _ => Err(MappingError::InvalidEnum {
            field: "optimization sense",
            value,
        }),
    }
}

/// Convert domain Function to wire Function
pub fn domain_to_wire_function(function: &Function) -> wire::Function {
    wire::Function {
        constant: function.constant,
        linear: function
            .linear
            .iter()
            .map(|(&id, &coefficient)| wire::LinearTerm { id, coefficient })
            .collect(),
        quadratic: function
            .quadratic
            .iter()
            .map(|(&(row, column), &coefficient)| wire::QuadraticTerm {
                row,
                column,
                coefficient,
            })
            .collect(),
    }
}

/// Convert wire Function to domain Function
pub fn wire_to_domain_function(function: &wire::Function) -> Function {
    let mut domain = Function::constant(function.constant);
    for term in &function.linear {
        domain.add_linear(term.id, term.coefficient);
    }
    for term in &function.quadratic {
        domain.add_quadratic(term.row, term.column, term.coefficient);
    }
    domain
}

pub fn domain_to_wire_variable(variable: &DecisionVariable) -> wire::DecisionVariable {
    wire::DecisionVariable {
        id: variable.id,
        kind: kind_to_wire(variable.kind) as i32,
        bound: Some(wire::Bound {
            lower: variable.bound.lower,
            upper: variable.bound.upper,
        }),
        name: variable.name.clone(),
        subscripts: variable.subscripts.clone(),
    }
}

pub fn wire_to_domain_variable(variable: &wire::DecisionVariable) -> Result<DecisionVariable> {
    let bound = variable
        .bound
        .as_ref()
        .map(|b| Bound::new(b.lower, b.upper))
        .unwrap_or_default();

    Ok(DecisionVariable {
        id: variable.id,
        kind: kind_from_wire(variable.kind)?,
        bound,
        name: variable.name.clone(),
        subscripts: variable.subscripts.clone(),
    })
}

pub fn domain_to_wire_constraint(constraint: &Constraint) -> wire::Constraint {
    wire::Constraint {
        id: constraint.id,
        equality: equality_to_wire(constraint.equality) as i32,
        function: Some(domain_to_wire_function(&constraint.function)),
        name: constraint.name.clone(),
        subscripts: constraint.subscripts.clone(),
    }
}

pub fn wire_to_domain_constraint(constraint: &wire::Constraint) -> Result<Constraint> {
    let function = constraint
        .function
        .as_ref()
        .ok_or(MappingError::MissingField("constraint function"))?;

    Ok(Constraint {
        id: constraint.id,
        function: wire_to_domain_function(function),
        equality: equality_from_wire(constraint.equality)?,
        name: constraint.name.clone(),
        subscripts: constraint.subscripts.clone(),
    })
}

/// Convert domain Instance to wire Instance
pub fn domain_to_wire_instance(instance: &Instance) -> wire::Instance {
    wire::Instance {
        sense: sense_to_wire(instance.sense) as i32,
        objective: Some(domain_to_wire_function(&instance.objective)),
        decision_variables: instance
            .decision_variables
            .iter()
            .map(domain_to_wire_variable)
            .collect(),
        constraints: instance
            .constraints
            .iter()
            .map(domain_to_wire_constraint)
            .collect(),
        title: instance.metadata.title.clone(),
        dataset: instance.metadata.dataset.clone(),
        license: instance.metadata.license.clone(),
        authors: instance.metadata.authors.clone(),
        annotations: instance.metadata.annotations.clone(),
    }
}

/// Convert wire Instance to domain Instance
pub fn wire_to_domain_instance(instance: wire::Instance) -> Result<Instance> {
    let objective = instance
        .objective
        .as_ref()
        .ok_or(MappingError::MissingField("objective"))?;

    let decision_variables = instance
        .decision_variables
        .iter()
        .map(wire_to_domain_variable)
        .collect::<Result<Vec<_>>>()?;

    let constraints = instance
        .constraints
        .iter()
        .map(wire_to_domain_constraint)
        .collect::<Result<Vec<_>>>()?;

    Ok(Instance {
        sense: sense_from_wire(instance.sense)?,
        objective: wire_to_domain_function(objective),
        decision_variables,
        constraints,
        metadata: InstanceMetadata {
            title: instance.title,
            dataset: instance.dataset,
            license: instance.license,
            authors: instance.authors,
            annotations: instance.annotations,
        },
    })
}

/// Convert domain Solution to wire Solution
pub fn domain_to_wire_solution(solution: &Solution) -> wire::Solution {
    wire::Solution {
        state: Some(wire::State {
            entries: solution.state.entries.clone(),
        }),
        objective: solution.objective,
        evaluated_constraints: solution
            .evaluated_constraints
            .iter()
            .map(|c| wire::EvaluatedConstraint {
                id: c.id,
                equality: equality_to_wire(c.equality) as i32,
                evaluated_value: c.evaluated_value,
                name: c.name.clone(),
            })
            .collect(),
        feasible: solution.feasible,
        sense: sense_to_wire(solution.sense) as i32,
    }
}

/// Convert wire Solution to domain Solution
pub fn wire_to_domain_solution(solution: wire::Solution) -> Result<Solution> {
    let state = solution
        .state
        .map(|s| State { entries: s.entries })
        .ok_or(MappingError::MissingField("solution state"))?;

    let evaluated_constraints = solution
        .evaluated_constraints
        .into_iter()
        .map(|c| {
            Ok(EvaluatedConstraint {
                id: c.id,
                equality: equality_from_wire(c.equality)?,
                evaluated_value: c.evaluated_value,
                name: c.name,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Solution {
        state,
        objective: solution.objective,
        evaluated_constraints,
        feasible: solution.feasible,
        sense: sense_from_wire(solution.sense)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_enums_are_rejected() {
        let instance = wire::Instance {
            objective: Some(wire::Function::default()),
            ..Default::default()
        };
        assert!(matches!(
            wire_to_domain_instance(instance),
            Err(MappingError::InvalidEnum { field: "optimization sense", value: 0 })
        ));

        let variable = wire::DecisionVariable {
            id: 3,
            kind: 42,
            ..Default::default()
        };
        assert!(matches!(
            wire_to_domain_variable(&variable),
            Err(MappingError::InvalidEnum { value: 42, .. })
        ));
    }

    #[test]
    fn constraint_without_function_is_rejected() {
        let constraint = wire::Constraint {
            id: 0,
            equality: wire::Equality::EqualToZero as i32,
            ..Default::default()
        };
        assert!(matches!(
            wire_to_domain_constraint(&constraint),
            Err(MappingError::MissingField("constraint function"))
        ));
    }

    #[test]
    fn missing_bound_decodes_as_unbounded() {
        let variable = wire::DecisionVariable {
            id: 1,
            kind: wire::Kind::Continuous as i32,
            ..Default::default()
        };
        let domain = wire_to_domain_variable(&variable).unwrap();
        assert_eq!(domain.bound, Bound::unbounded());
    }
}
