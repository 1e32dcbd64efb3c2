// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dense operator algebra for the stochastic solvers.
//!
//! An [`Operator`] is a sum of dense matrices with scalar time coefficients:
//!
//!   A(t) = A₀ + Σ_k f_k(t) A_k
//!
//! Constant parts are folded into `A₀` on construction, so evaluating a
//! time-independent operator never allocates. Operators are tagged as either
//! plain Hilbert-space operators or superoperators acting on column-stacked
//! density matrices.

pub mod library;
pub mod state;
pub mod superop;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;

use crate::error::{Error, Result};

pub use state::QuantumState;
pub use superop::{
    liouvillian, liouvillian_with_dissipators, lindblad_dissipator, spost, spre, sprepost,
};

/// Time coefficient of an operator term.
#[derive(Clone)]
pub enum Coefficient {
    /// Constant scalar
    Constant(Complex64),
    /// Arbitrary function of time
    Function(Arc<dyn Fn(f64) -> Complex64 + Send + Sync>),
}

impl Coefficient {
    /// Wrap a closure as a coefficient.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(f64) -> Complex64 + Send + Sync + 'static,
    {
        Coefficient::Function(Arc::new(f))
    }

    /// Evaluate at time `t`.
    pub fn eval(&self, t: f64) -> Complex64 {
        match self {
            Coefficient::Constant(c) => *c,
            Coefficient::Function(f) => f(t),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Coefficient::Constant(_))
    }

    /// Complex conjugate.
    pub fn conj(&self) -> Self {
        match self {
            Coefficient::Constant(c) => Coefficient::Constant(c.conj()),
            Coefficient::Function(f) => {
                let f = Arc::clone(f);
                Coefficient::function(move |t| f(t).conj())
            }
        }
    }

    /// Pointwise product.
    pub fn product(&self, other: &Coefficient) -> Self {
        match (self, other) {
            (Coefficient::Constant(a), Coefficient::Constant(b)) => Coefficient::Constant(a * b),
            (Coefficient::Constant(a), Coefficient::Function(f))
            | (Coefficient::Function(f), Coefficient::Constant(a)) => {
                let (a, f) = (*a, Arc::clone(f));
                Coefficient::function(move |t| a * f(t))
            }
            (Coefficient::Function(f), Coefficient::Function(g)) => {
                let (f, g) = (Arc::clone(f), Arc::clone(g));
                Coefficient::function(move |t| f(t) * g(t))
            }
        }
    }

    /// Scale by a constant.
    pub fn scaled(&self, s: Complex64) -> Self {
        self.product(&Coefficient::Constant(s))
    }
}

impl fmt::Debug for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coefficient::Constant(c) => write!(f, "Constant({})", c),
            Coefficient::Function(_) => write!(f, "Function(..)"),
        }
    }
}

/// Whether an operator acts on states or on vectorized density matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    /// Hilbert-space operator (d × d)
    Oper,
    /// Superoperator (d² × d²), column-stacking convention
    Super,
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorKind::Oper => write!(f, "oper"),
            OperatorKind::Super => write!(f, "super"),
        }
    }
}

#[derive(Debug, Clone)]
struct Term {
    matrix: Array2<Complex64>,
    coeff: Coefficient,
}

/// Possibly time-dependent dense linear operator.
#[derive(Debug, Clone)]
pub struct Operator {
    kind: OperatorKind,
    constant: Array2<Complex64>,
    terms: Vec<Term>,
}

impl Operator {
    /// Constant Hilbert-space operator.
    pub fn new(matrix: Array2<Complex64>) -> Self {
        Self {
            kind: OperatorKind::Oper,
            constant: matrix,
            terms: Vec::new(),
        }
    }

    /// Constant superoperator.
    pub fn new_super(matrix: Array2<Complex64>) -> Self {
        Self {
            kind: OperatorKind::Super,
            constant: matrix,
            terms: Vec::new(),
        }
    }

    /// Operator `f(t) · M`.
    pub fn time_dependent(matrix: Array2<Complex64>, coeff: Coefficient) -> Self {
        let shape = matrix.dim();
        Self::from_terms(OperatorKind::Oper, shape, vec![(matrix, coeff)])
    }

    /// Build from `(matrix, coefficient)` pairs, folding constant terms together.
    ///
    /// Every matrix must have `shape`.
    pub(crate) fn from_terms(
        kind: OperatorKind,
        shape: (usize, usize),
        terms: Vec<(Array2<Complex64>, Coefficient)>,
    ) -> Self {
        let mut constant = Array2::zeros(shape);
        let mut varying = Vec::new();
        for (matrix, coeff) in terms {
            match coeff {
                Coefficient::Constant(c) => constant.scaled_add(c, &matrix),
                coeff => varying.push(Term { matrix, coeff }),
            }
        }
        Self {
            kind,
            constant,
            terms: varying,
        }
    }

    /// All terms, the constant part carrying a unit coefficient.
    pub(crate) fn terms(&self) -> Vec<(&Array2<Complex64>, Coefficient)> {
        let mut out = vec![(&self.constant, Coefficient::Constant(Complex64::new(1.0, 0.0)))];
        out.extend(self.terms.iter().map(|t| (&t.matrix, t.coeff.clone())));
        out
    }

    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    pub fn shape(&self) -> (usize, usize) {
        self.constant.dim()
    }

    pub fn is_square(&self) -> bool {
        let (r, c) = self.shape();
        r == c
    }

    /// Square Hilbert-space operator.
    pub fn is_oper(&self) -> bool {
        self.kind == OperatorKind::Oper && self.is_square()
    }

    /// Square superoperator whose size is a perfect square.
    pub fn is_super(&self) -> bool {
        self.kind == OperatorKind::Super && self.is_square() && self.hilbert_dim().is_some()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Dimension of the underlying Hilbert space.
    pub fn hilbert_dim(&self) -> Option<usize> {
        let n = self.shape().0;
        match self.kind {
            OperatorKind::Oper => Some(n),
            OperatorKind::Super => {
                let d = (n as f64).sqrt().round() as usize;
                (d * d == n).then_some(d)
            }
        }
    }

    /// Evaluate the matrix at time `t`.
    pub fn at(&self, t: f64) -> Cow<'_, Array2<Complex64>> {
        if self.terms.is_empty() {
            return Cow::Borrowed(&self.constant);
        }
        let mut m = self.constant.clone();
        for term in &self.terms {
            m.scaled_add(term.coeff.eval(t), &term.matrix);
        }
        Cow::Owned(m)
    }

    /// Hermitian adjoint.
    pub fn dag(&self) -> Self {
        Self {
            kind: self.kind,
            constant: conjugate_transpose(&self.constant),
            terms: self
                .terms
                .iter()
                .map(|t| Term {
                    matrix: conjugate_transpose(&t.matrix),
                    coeff: t.coeff.conj(),
                })
                .collect(),
        }
    }

    /// Multiply by a scalar.
    pub fn scale(&self, s: Complex64) -> Self {
        Self {
            kind: self.kind,
            constant: self.constant.mapv(|z| z * s),
            terms: self
                .terms
                .iter()
                .map(|t| Term {
                    matrix: t.matrix.clone(),
                    coeff: t.coeff.scaled(s),
                })
                .collect(),
        }
    }

    /// `self + other`.
    pub fn add(&self, other: &Operator) -> Result<Self> {
        self.check_compatible(other, "add")?;
        let mut out = self.clone();
        out.constant += &other.constant;
        out.terms.extend(other.terms.iter().cloned());
        Ok(out)
    }

    /// `self - other`.
    pub fn sub(&self, other: &Operator) -> Result<Self> {
        self.add(&other.scale(Complex64::new(-1.0, 0.0)))
    }

    /// Operator product `self · other`.
    pub fn compose(&self, other: &Operator) -> Result<Self> {
        if self.kind != other.kind || self.shape().1 != other.shape().0 {
            return Err(Error::Type(format!(
                "cannot compose {} {:?} with {} {:?}",
                self.kind,
                self.shape(),
                other.kind,
                other.shape()
            )));
        }
        let shape = (self.shape().0, other.shape().1);
        let mut terms = Vec::new();
        for (a, fa) in self.terms() {
            for (b, fb) in other.terms() {
                terms.push((a.dot(b), fa.product(&fb)));
            }
        }
        Ok(Self::from_terms(self.kind, shape, terms))
    }

    /// Expectation value at time `t`: ⟨ψ|A|ψ⟩ or Tr(Aρ).
    ///
    /// The state dimension must match the operator.
    pub fn expect(&self, t: f64, state: &QuantumState) -> Complex64 {
        state.expect(&self.at(t))
    }

    fn check_compatible(&self, other: &Operator, op: &str) -> Result<()> {
        if self.kind != other.kind || self.shape() != other.shape() {
            return Err(Error::Type(format!(
                "cannot {} {} {:?} and {} {:?}",
                op,
                self.kind,
                self.shape(),
                other.kind,
                other.shape()
            )));
        }
        Ok(())
    }
}

impl From<Array2<Complex64>> for Operator {
    fn from(matrix: Array2<Complex64>) -> Self {
        Operator::new(matrix)
    }
}

/// Conjugate transpose (dagger) of a matrix.
pub fn conjugate_transpose(m: &Array2<Complex64>) -> Array2<Complex64> {
    m.t().mapv(|z| z.conj())
}

#[cfg(test)]
mod tests {
    use super::library::{destroy, sigmax, sigmaz};
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_conjugate_transpose() {
        let mut m = Array2::zeros((2, 2));
        m[[0, 1]] = c(1.0, 2.0);
        m[[1, 0]] = c(3.0, 4.0);
        let dag = conjugate_transpose(&m);
        assert_eq!(dag[[0, 1]], c(3.0, -4.0));
        assert_eq!(dag[[1, 0]], c(1.0, -2.0));
    }

    #[test]
    fn test_constant_terms_are_folded() {
        let op = Operator::from_terms(
            OperatorKind::Oper,
            (2, 2),
            vec![
                (sigmax(), Coefficient::Constant(c(2.0, 0.0))),
                (sigmaz(), Coefficient::Constant(c(1.0, 0.0))),
            ],
        );
        assert!(op.is_constant());
        let m = op.at(3.0);
        assert_eq!(m[[0, 1]], c(2.0, 0.0));
        assert_eq!(m[[0, 0]], c(1.0, 0.0));
    }

    #[test]
    fn test_time_dependent_evaluation() {
        let op = Operator::time_dependent(sigmax(), Coefficient::function(|t| c(t, 0.0)));
        assert!(!op.is_constant());
        assert_eq!(op.at(0.0)[[0, 1]], c(0.0, 0.0));
        assert_eq!(op.at(2.5)[[0, 1]], c(2.5, 0.0));
    }

    #[test]
    fn test_dag_conjugates_coefficients() {
        let op = Operator::time_dependent(destroy(2), Coefficient::function(|t| c(0.0, t)));
        let dag = op.dag();
        // (i t a)† = -i t a†
        assert_eq!(dag.at(1.0)[[1, 0]], c(0.0, -1.0));
    }

    #[test]
    fn test_add_rejects_mismatched_shapes() {
        let a = Operator::new(destroy(2));
        let b = Operator::new(destroy(3));
        assert!(matches!(a.add(&b), Err(Error::Type(_))));
    }

    #[test]
    fn test_add_rejects_mismatched_kinds() {
        let a = Operator::new(Array2::eye(4));
        let b = Operator::new_super(Array2::eye(4));
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn test_compose_number_operator() {
        let a = Operator::new(destroy(3));
        let n = a.dag().compose(&a).unwrap();
        let m = n.at(0.0);
        assert_relative_eq!(m[[1, 1]].re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(m[[2, 2]].re, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_time_dependent_coefficients_multiply() {
        let a = Operator::time_dependent(destroy(2), Coefficient::function(|t| c(t, 0.0)));
        let ada = a.dag().compose(&a).unwrap();
        // (t a)†(t a) = t² a†a
        assert_relative_eq!(ada.at(3.0)[[1, 1]].re, 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kind_predicates() {
        assert!(Operator::new(sigmax()).is_oper());
        assert!(!Operator::new(sigmax()).is_super());
        assert!(Operator::new_super(Array2::eye(4)).is_super());
        assert_eq!(Operator::new_super(Array2::eye(9)).hilbert_dim(), Some(3));
        assert!(!Operator::new_super(Array2::eye(3)).is_super());
        assert!(!Operator::new(Array2::zeros((2, 3))).is_oper());
    }

    #[test]
    fn test_expect_on_ket() {
        let psi = QuantumState::Ket(Array1::from(vec![c(1.0, 0.0), c(0.0, 0.0)]));
        let z = Operator::new(sigmaz());
        assert_relative_eq!(z.expect(0.0, &psi).re, 1.0, epsilon = 1e-12);
    }
}
