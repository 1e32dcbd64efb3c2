// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Superoperator construction.
//!
//! Column-stacking convention, vec(AρB) = (Bᵀ ⊗ A) vec(ρ):
//!
//!   spre(A)  = I ⊗ A
//!   spost(B) = Bᵀ ⊗ I
//!
//! The dissipator of a collapse operator L is
//!
//!   D[L](ρ) = L ρ L† − ½ L†L ρ − ½ ρ L†L
//!
//! Ref: Breuer & Petruccione, "The Theory of Open Quantum Systems" (2002), Ch. 3.

use ndarray::linalg::kron;
use ndarray::Array2;
use num_complex::Complex64;

use super::{conjugate_transpose, Operator, OperatorKind};
use crate::error::{Error, Result};

/// Matrix of ρ ↦ Aρ.
pub fn spre(a: &Array2<Complex64>) -> Array2<Complex64> {
    kron(&Array2::eye(a.nrows()), a)
}

/// Matrix of ρ ↦ ρB.
pub fn spost(b: &Array2<Complex64>) -> Array2<Complex64> {
    kron(&b.t(), &Array2::eye(b.nrows()))
}

/// Matrix of ρ ↦ AρB.
pub fn sprepost(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Array2<Complex64> {
    kron(&b.t(), a)
}

/// Hamiltonian generator −i[H, ·] as a superoperator.
///
/// A superoperator argument is returned unchanged.
pub fn liouvillian(h: &Operator) -> Result<Operator> {
    if h.kind() == OperatorKind::Super {
        return Ok(h.clone());
    }
    require_oper(h, "Hamiltonian")?;
    let d = h.shape().0;
    let minus_i = Complex64::new(0.0, -1.0);
    let terms = h
        .terms()
        .into_iter()
        .map(|(m, f)| ((spre(m) - spost(m)).mapv(|z| z * minus_i), f))
        .collect();
    Ok(Operator::from_terms(OperatorKind::Super, (d * d, d * d), terms))
}

/// Lindblad dissipator D[L] as a superoperator.
///
/// Time-dependent collapse operators L(t) = Σ_j f_j(t) L_j expand into the
/// cross terms f_j f_k* (L_j ρ L_k† − ½{L_k†L_j, ρ}).
pub fn lindblad_dissipator(l: &Operator) -> Result<Operator> {
    require_oper(l, "collapse operator")?;
    let d = l.shape().0;
    let half = Complex64::new(0.5, 0.0);
    let parts = l.terms();
    let mut terms = Vec::with_capacity(parts.len() * parts.len());
    for (lj, fj) in &parts {
        for (lk, fk) in &parts {
            let lk_dag = conjugate_transpose(lk);
            let lkd_lj = lk_dag.dot(*lj);
            let generator =
                sprepost(lj, &lk_dag) - (spre(&lkd_lj) + spost(&lkd_lj)).mapv(|z| z * half);
            terms.push((generator, fj.product(&fk.conj())));
        }
    }
    Ok(Operator::from_terms(OperatorKind::Super, (d * d, d * d), terms))
}

/// Full Liouvillian L = −i[H, ·] + Σ_k D[c_k].
///
/// If `h` is already a superoperator the dissipators are added to it directly.
pub fn liouvillian_with_dissipators(h: &Operator, c_ops: &[Operator]) -> Result<Operator> {
    let mut l = liouvillian(h)?;
    for c in c_ops {
        let d = lindblad_dissipator(c)?;
        if d.shape() != l.shape() {
            return Err(Error::Type(format!(
                "collapse operator of shape {:?} does not match generator of shape {:?}",
                c.shape(),
                l.shape()
            )));
        }
        l = l.add(&d)?;
    }
    Ok(l)
}

fn require_oper(op: &Operator, what: &str) -> Result<()> {
    if !op.is_oper() {
        return Err(Error::Type(format!(
            "{} must be a square operator, got {} of shape {:?}",
            what,
            op.kind(),
            op.shape()
        )));
    }
    Ok(())
}
