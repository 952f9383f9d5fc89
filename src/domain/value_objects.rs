// Domain value objects shared by instances, solutions and the wire format

use std::fmt;

/// Identifier of a decision variable inside one instance
pub type VariableId = u64;

/// Identifier of a constraint inside one instance
pub type ConstraintId = u64;

/// Kind of decision variable in an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Continuous real number (x ∈ ℝ)
    Continuous,
    /// Integer number (x ∈ ℤ)
    Integer,
    /// Binary variable (x ∈ {0, 1})
    Binary,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::Continuous => write!(f, "continuous"),
            VariableKind::Integer => write!(f, "integer"),
            VariableKind::Binary => write!(f, "binary"),
        }
    }
}

/// Comparison of a constraint function against zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equality {
    /// f(x) = 0
    EqualToZero,
    /// f(x) ≤ 0
    LessThanOrEqualToZero,
}

impl fmt::Display for Equality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Equality::EqualToZero => write!(f, "= 0"),
            Equality::LessThanOrEqualToZero => write!(f, "<= 0"),
        }
    }
}

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// Minimize the objective function
    Minimize,
    /// Maximize the objective function
    Maximize,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Minimize => write!(f, "minimize"),
            Sense::Maximize => write!(f, "maximize"),
        }
    }
}

/// Lower and upper bound of a decision variable; infinite ends are allowed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    pub fn binary() -> Self {
        Self::new(0.0, 1.0)
    }

    pub fn is_valid(&self) -> bool {
        !self.lower.is_nan() && !self.upper.is_nan() && self.lower <= self.upper
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

impl Default for Bound {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}
