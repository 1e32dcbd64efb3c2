// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Quantum states and the column-stacking vectorization used by the integrators.

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::error::{Result, ValidationError};

/// A pure state vector or a density matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum QuantumState {
    /// Pure state |ψ⟩
    Ket(Array1<Complex64>),
    /// Density matrix ρ
    DensityMatrix(Array2<Complex64>),
}

impl QuantumState {
    /// Hilbert-space dimension.
    pub fn dim(&self) -> usize {
        match self {
            QuantumState::Ket(psi) => psi.len(),
            QuantumState::DensityMatrix(rho) => rho.nrows(),
        }
    }

    pub fn is_ket(&self) -> bool {
        matches!(self, QuantumState::Ket(_))
    }

    /// ρ = |ψ⟩⟨ψ| for kets, identity for density matrices.
    pub fn to_density_matrix(&self) -> Array2<Complex64> {
        match self {
            QuantumState::Ket(psi) => ket_to_dm(psi),
            QuantumState::DensityMatrix(rho) => rho.clone(),
        }
    }

    /// Flatten to the integrator's working vector.
    pub fn to_vector(&self) -> Array1<Complex64> {
        match self {
            QuantumState::Ket(psi) => psi.clone(),
            QuantumState::DensityMatrix(rho) => vectorize(rho),
        }
    }

    /// Expectation value of a d × d matrix.
    pub fn expect(&self, op: &Array2<Complex64>) -> Complex64 {
        match self {
            QuantumState::Ket(psi) => expect_ket(op, psi),
            QuantumState::DensityMatrix(rho) => expect_dm(op, rho),
        }
    }

    /// Unit norm for kets, unit trace for density matrices.
    pub fn normalized(self) -> Self {
        match self {
            QuantumState::Ket(psi) => {
                let norm = psi.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
                if norm > 0.0 {
                    QuantumState::Ket(psi.mapv(|z| z / norm))
                } else {
                    QuantumState::Ket(psi)
                }
            }
            QuantumState::DensityMatrix(rho) => {
                let tr = trace(&rho);
                if tr.norm() > 0.0 {
                    QuantumState::DensityMatrix(rho.mapv(|z| z / tr))
                } else {
                    QuantumState::DensityMatrix(rho)
                }
            }
        }
    }
}

/// Column-stacked vectorization: vec(ρ)[i + j·d] = ρ[i, j].
pub fn vectorize(rho: &Array2<Complex64>) -> Array1<Complex64> {
    rho.t().iter().cloned().collect()
}

/// Inverse of [`vectorize`].
pub fn unvectorize(vec: &Array1<Complex64>, dim: usize) -> Result<Array2<Complex64>> {
    if vec.len() != dim * dim {
        return Err(ValidationError::Dimension {
            what: "vectorized density matrix".into(),
            expected: dim * dim,
            actual: vec.len(),
        }
        .into());
    }
    let transposed = Array2::from_shape_vec((dim, dim), vec.to_vec())?;
    Ok(transposed.reversed_axes())
}

/// ⟨ψ|A|ψ⟩.
pub fn expect_ket(op: &Array2<Complex64>, psi: &Array1<Complex64>) -> Complex64 {
    psi.mapv(|z| z.conj()).dot(&op.dot(psi))
}

/// Tr(Aρ) = Σ_ij A_ij ρ_ji.
pub fn expect_dm(op: &Array2<Complex64>, rho: &Array2<Complex64>) -> Complex64 {
    op.iter()
        .zip(rho.t().iter())
        .fold(Complex64::new(0.0, 0.0), |acc, (a, r)| acc + a * r)
}

/// Matrix trace.
pub fn trace(m: &Array2<Complex64>) -> Complex64 {
    m.diag().iter().sum()
}

/// |ψ⟩⟨ψ|.
pub fn ket_to_dm(psi: &Array1<Complex64>) -> Array2<Complex64> {
    let d = psi.len();
    Array2::from_shape_fn((d, d), |(i, j)| psi[i] * psi[j].conj())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn sample_rho() -> Array2<Complex64> {
        let mut m = Array2::zeros((2, 2));
        m[[0, 0]] = c(0.7, 0.0);
        m[[0, 1]] = c(0.1, 0.2);
        m[[1, 0]] = c(0.1, -0.2);
        m[[1, 1]] = c(0.3, 0.0);
        m
    }

    #[test]
    fn test_vectorize_is_column_stacked() {
        let rho = sample_rho();
        let v = vectorize(&rho);
        assert_eq!(v[0], rho[[0, 0]]);
        assert_eq!(v[1], rho[[1, 0]]);
        assert_eq!(v[2], rho[[0, 1]]);
        assert_eq!(v[3], rho[[1, 1]]);
    }

    #[test]
    fn test_unvectorize_inverts_vectorize() {
        let rho = sample_rho();
        let back = unvectorize(&vectorize(&rho), 2).unwrap();
        assert_eq!(back, rho);
    }

    #[test]
    fn test_unvectorize_rejects_wrong_length() {
        let v = Array1::zeros(3);
        assert!(unvectorize(&v, 2).is_err());
    }

    #[test]
    fn test_expect_dm_matches_ket() {
        let psi = Array1::from(vec![c(0.6, 0.0), c(0.0, 0.8)]);
        let mut sx = Array2::zeros((2, 2));
        sx[[0, 1]] = c(1.0, 0.0);
        sx[[1, 0]] = c(1.0, 0.0);
        let from_ket = expect_ket(&sx, &psi);
        let from_dm = expect_dm(&sx, &ket_to_dm(&psi));
        assert_relative_eq!(from_ket.re, from_dm.re, epsilon = 1e-12);
        assert_relative_eq!(from_ket.im, from_dm.im, epsilon = 1e-12);
    }

    #[test]
    fn test_normalized_ket_and_dm() {
        let psi = QuantumState::Ket(Array1::from(vec![c(3.0, 0.0), c(0.0, 4.0)])).normalized();
        if let QuantumState::Ket(v) = &psi {
            assert_relative_eq!(v[0].re, 0.6, epsilon = 1e-12);
        }
        let rho = QuantumState::DensityMatrix(sample_rho().mapv(|z| z * 2.0)).normalized();
        assert_relative_eq!(trace(&rho.to_density_matrix()).re, 1.0, epsilon = 1e-12);
    }
}
