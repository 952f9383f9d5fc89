// Polynomial functions of degree at most two over decision variables

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Add, Mul, Neg, Sub};

use super::models::{ModelError, State};
use super::value_objects::VariableId;

/// Objective or constraint function: constant + linear + quadratic terms.
///
/// Quadratic keys are normalized so that the first id is never larger than the
/// second; `x1 * x0` and `x0 * x1` accumulate into the same entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Function {
    pub constant: f64,
    pub linear: BTreeMap<VariableId, f64>,
    pub quadratic: BTreeMap<(VariableId, VariableId), f64>,
}

impl Function {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            constant: value,
            ..Self::default()
        }
    }

    /// A single variable with coefficient 1
    pub fn variable(id: VariableId) -> Self {
        Self::linear_term(id, 1.0)
    }

    pub fn linear_term(id: VariableId, coefficient: f64) -> Self {
        let mut function = Self::zero();
        function.add_linear(id, coefficient);
        function
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn add_linear(&mut self, id: VariableId, coefficient: f64) {
        *self.linear.entry(id).or_insert(0.0) += coefficient;
    }

    pub fn add_quadratic(&mut self, a: VariableId, b: VariableId, coefficient: f64) {
        let key = if a <= b { (a, b) } else { (b, a) };
        *self.quadratic.entry(key).or_insert(0.0) += coefficient;
    }

    /// Highest degree among the terms with a non-zero coefficient
    pub fn degree(&self) -> usize {
        if self.quadratic.values().any(|c| *c != 0.0) {
            2
        } else if self.linear.values().any(|c| *c != 0.0) {
            1
        } else {
            0
        }
    }

    pub fn variable_ids(&self) -> BTreeSet<VariableId> {
        let mut ids: BTreeSet<VariableId> = self.linear.keys().copied().collect();
        for (a, b) in self.quadratic.keys() {
            ids.insert(*a);
            ids.insert(*b);
        }
        ids
    }

    /// Drop terms whose coefficient is exactly zero
    pub fn prune(mut self) -> Self {
        self.linear.retain(|_, c| *c != 0.0);
        self.quadratic.retain(|_, c| *c != 0.0);
        self
    }

    /// Multiply two functions; the product must stay within degree two
    pub fn try_mul(&self, rhs: &Function) -> Result<Function, ModelError> {
        let degree = self.degree() + rhs.degree();
        if degree > 2 {
            return Err(ModelError::DegreeOverflow(degree));
        }

        let mut product = Function::constant(self.constant * rhs.constant);

        for (&id, &c) in &self.linear {
            product.add_linear(id, c * rhs.constant);
        }
        for (&id, &c) in &rhs.linear {
            product.add_linear(id, c * self.constant);
        }
        for (&(a, b), &c) in &self.quadratic {
            product.add_quadratic(a, b, c * rhs.constant);
        }
        for (&(a, b), &c) in &rhs.quadratic {
            product.add_quadratic(a, b, c * self.constant);
        }
        for (&i, &ci) in &self.linear {
            for (&j, &cj) in &rhs.linear {
                product.add_quadratic(i, j, ci * cj);
            }
        }

        Ok(product.prune())
    }

    /// Evaluate against a state; every referenced variable needs a value
    pub fn evaluate(&self, state: &State) -> Result<f64, ModelError> {
        let mut value = self.constant;
        for (&id, &c) in &self.linear {
            value += c * state.value(id)?;
        }
        for (&(a, b), &c) in &self.quadratic {
            value += c * state.value(a)? * state.value(b)?;
        }
        Ok(value)
    }

    /// Term-wise comparison with an absolute tolerance; missing terms count as zero
    pub fn almost_equal(&self, other: &Function, atol: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= atol;

        if !close(self.constant, other.constant) {
            return false;
        }

        let linear_ids: BTreeSet<_> = self.linear.keys().chain(other.linear.keys()).collect();
        for id in linear_ids {
            let a = self.linear.get(id).copied().unwrap_or(0.0);
            let b = other.linear.get(id).copied().unwrap_or(0.0);
            if !close(a, b) {
                return false;
            }
        }

        let quadratic_ids: BTreeSet<_> = self
            .quadratic
            .keys()
            .chain(other.quadratic.keys())
            .collect();
        for key in quadratic_ids {
            let a = self.quadratic.get(key).copied().unwrap_or(0.0);
            let b = other.quadratic.get(key).copied().unwrap_or(0.0);
            if !close(a, b) {
                return false;
            }
        }

        true
    }
}

impl Add for Function {
    type Output = Function;

    fn add(mut self, rhs: Function) -> Function {
        self.constant += rhs.constant;
        for (id, c) in rhs.linear {
            self.add_linear(id, c);
        }
        for ((a, b), c) in rhs.quadratic {
            self.add_quadratic(a, b, c);
        }
        self
    }
}

impl Sub for Function {
    type Output = Function;

    fn sub(self, rhs: Function) -> Function {
        self + (-rhs)
    }
}

impl Neg for Function {
    type Output = Function;

    fn neg(self) -> Function {
        self * -1.0
    }
}

impl Mul<f64> for Function {
    type Output = Function;

    fn mul(mut self, rhs: f64) -> Function {
        self.constant *= rhs;
        self.linear.values_mut().for_each(|c| *c *= rhs);
        self.quadratic.values_mut().for_each(|c| *c *= rhs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(values: &[(VariableId, f64)]) -> State {
        values.iter().copied().collect()
    }

    #[test]
    fn quadratic_keys_are_normalized() {
        let mut f = Function::zero();
        f.add_quadratic(3, 1, 2.0);
        f.add_quadratic(1, 3, 0.5);
        assert_eq!(f.quadratic.len(), 1);
        assert_eq!(f.quadratic[&(1, 3)], 2.5);
    }

    #[test]
    fn product_of_two_affine_functions() {
        // (2x0 - 1)(2x1 - 1) = 4 x0 x1 - 2 x0 - 2 x1 + 1
        let a = Function::linear_term(0, 2.0) - Function::constant(1.0);
        let b = Function::linear_term(1, 2.0) - Function::constant(1.0);
        let p = a.try_mul(&b).unwrap();

        assert_eq!(p.constant, 1.0);
        assert_eq!(p.linear[&0], -2.0);
        assert_eq!(p.linear[&1], -2.0);
        assert_eq!(p.quadratic[&(0, 1)], 4.0);
        assert_eq!(p.degree(), 2);
    }

    #[test]
    fn product_above_degree_two_is_rejected() {
        let q = Function::variable(0).try_mul(&Function::variable(1)).unwrap();
        let err = q.try_mul(&Function::variable(2)).unwrap_err();
        assert!(matches!(err, ModelError::DegreeOverflow(3)));
    }

    #[test]
    fn evaluate_uses_every_term() {
        let mut f = Function::constant(1.0);
        f.add_linear(0, 3.0);
        f.add_quadratic(0, 1, -2.0);

        let value = f.evaluate(&state(&[(0, 2.0), (1, 4.0)])).unwrap();
        assert_eq!(value, 1.0 + 6.0 - 16.0);
    }

    #[test]
    fn evaluate_reports_missing_values() {
        let f = Function::variable(7);
        let err = f.evaluate(&State::default()).unwrap_err();
        assert!(matches!(err, ModelError::MissingValue(7)));
    }

    #[test]
    fn almost_equal_ignores_explicit_zero_terms() {
        let mut a = Function::variable(0);
        a.add_linear(1, 0.0);
        let b = Function::variable(0);
        assert!(a.almost_equal(&b, 1e-9));
        assert!(!a.almost_equal(&Function::variable(1), 1e-9));
    }
}
