// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Drift and diffusion of the stochastic master / Schrödinger equations.
//!
//! Stochastic master equation (density matrix, one Wiener process per channel):
//!
//!   dρ = L(ρ) dt + Σ_c D[c](ρ) dt + Σ_c (cρ + ρc† − Tr(cρ + ρc†) ρ) dW_c
//!
//! Stochastic Schrödinger equation (diffusive unravelling):
//!
//!   dψ = [−iH − ½ Σ c†c + Σ (½ e_c c − ⅛ e_c²)] ψ dt + Σ (c − ½ e_c) ψ dW_c
//!
//! with e_c = ⟨ψ|c + c†|ψ⟩. Under heterodyne detection each collapse
//! operator c is split into the two channels c/√2 and −i c/√2.
//!
//! Ref: Wiseman & Milburn, "Quantum Measurement and Control" (2010), Ch. 4.

use std::f64::consts::FRAC_1_SQRT_2;

use ndarray::Array1;
use num_complex::Complex64;

use crate::error::{Error, Result, ValidationError};
use crate::operator::state::{ket_to_dm, unvectorize, vectorize};
use crate::operator::{lindblad_dissipator, Operator, QuantumState};

/// Density-matrix system driven by a Liouvillian.
#[derive(Debug, Clone)]
pub struct OpenSystem {
    /// L + Σ D[c] over the stochastic collapse operators
    generator: Operator,
    /// One operator per noise channel
    channels: Vec<Operator>,
    dim: usize,
}

/// State-vector system driven by a Hamiltonian.
#[derive(Debug, Clone)]
pub struct ClosedSystem {
    hamiltonian: Operator,
    channels: Vec<Operator>,
    /// c†c per channel
    channel_norms: Vec<Operator>,
    dim: usize,
}

/// Equation of motion integrated by the trajectory runner.
#[derive(Debug, Clone)]
pub enum StochasticSystem {
    /// Stochastic master equation
    Open(OpenSystem),
    /// Stochastic Schrödinger equation
    Closed(ClosedSystem),
}

impl StochasticSystem {
    /// Build a stochastic master equation from a Liouvillian superoperator.
    pub fn open(liouvillian: Operator, sc_ops: &[Operator], heterodyne: bool) -> Result<Self> {
        if !liouvillian.is_super() {
            return Err(Error::Type(format!(
                "open system generator must be a superoperator, got {} of shape {:?}",
                liouvillian.kind(),
                liouvillian.shape()
            )));
        }
        let dim = liouvillian.hilbert_dim().unwrap_or_default();
        let mut generator = liouvillian;
        for c in sc_ops {
            check_channel(c, dim)?;
            generator = generator.add(&lindblad_dissipator(c)?)?;
        }
        Ok(StochasticSystem::Open(OpenSystem {
            generator,
            channels: split_channels(sc_ops, heterodyne),
            dim,
        }))
    }

    /// Build a stochastic Schrödinger equation from a Hamiltonian.
    pub fn closed(hamiltonian: Operator, sc_ops: &[Operator], heterodyne: bool) -> Result<Self> {
        if !hamiltonian.is_oper() {
            return Err(Error::Type(format!(
                "closed system Hamiltonian must be a square operator, got {} of shape {:?}",
                hamiltonian.kind(),
                hamiltonian.shape()
            )));
        }
        let dim = hamiltonian.shape().0;
        for c in sc_ops {
            check_channel(c, dim)?;
        }
        let channels = split_channels(sc_ops, heterodyne);
        let channel_norms = channels
            .iter()
            .map(|c| c.dag().compose(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(StochasticSystem::Closed(ClosedSystem {
            hamiltonian,
            channels,
            channel_norms,
            dim,
        }))
    }

    /// Hilbert-space dimension.
    pub fn dim(&self) -> usize {
        match self {
            StochasticSystem::Open(s) => s.dim,
            StochasticSystem::Closed(s) => s.dim,
        }
    }

    /// Number of independent Wiener processes.
    pub fn num_channels(&self) -> usize {
        match self {
            StochasticSystem::Open(s) => s.channels.len(),
            StochasticSystem::Closed(s) => s.channels.len(),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, StochasticSystem::Open(_))
    }

    /// Deterministic part a(t, y).
    pub fn drift(&self, t: f64, y: &Array1<Complex64>) -> Result<Array1<Complex64>> {
        match self {
            StochasticSystem::Open(s) => Ok(s.generator.at(t).dot(y)),
            StochasticSystem::Closed(s) => {
                let minus_i = Complex64::new(0.0, -1.0);
                let mut out = s.hamiltonian.at(t).dot(y).mapv(|z| z * minus_i);
                for (c, cdc) in s.channels.iter().zip(&s.channel_norms) {
                    let c_y = c.at(t).dot(y);
                    let e = 2.0 * inner(y, &c_y).re;
                    out.scaled_add(Complex64::new(-0.5, 0.0), &cdc.at(t).dot(y));
                    out.scaled_add(Complex64::new(0.5 * e, 0.0), &c_y);
                    out.scaled_add(Complex64::new(-0.125 * e * e, 0.0), y);
                }
                Ok(out)
            }
        }
    }

    /// Stochastic part b_k(t, y), one vector per noise channel.
    pub fn diffusion(&self, t: f64, y: &Array1<Complex64>) -> Result<Vec<Array1<Complex64>>> {
        match self {
            StochasticSystem::Open(s) => {
                let rho = unvectorize(y, s.dim)?;
                s.channels
                    .iter()
                    .map(|c| {
                        let c_t = c.at(t);
                        let c_rho = c_t.dot(&rho);
                        let m = &c_rho + &c_rho.t().mapv(|z| z.conj());
                        let e: Complex64 = m.diag().iter().sum();
                        Ok(vectorize(&(m - rho.mapv(|z| z * e))))
                    })
                    .collect()
            }
            StochasticSystem::Closed(s) => Ok(s
                .channels
                .iter()
                .map(|c| {
                    let mut c_y = c.at(t).dot(y);
                    let e = 2.0 * inner(y, &c_y).re;
                    c_y.scaled_add(Complex64::new(-0.5 * e, 0.0), y);
                    c_y
                })
                .collect()),
        }
    }

    /// Flatten an initial state into the integrator's working vector.
    ///
    /// Kets are promoted to density matrices for the open system.
    pub fn to_vector(&self, state: &QuantumState) -> Result<Array1<Complex64>> {
        if state.dim() != self.dim() {
            return Err(ValidationError::Dimension {
                what: "initial state".into(),
                expected: self.dim(),
                actual: state.dim(),
            }
            .into());
        }
        match (self, state) {
            (StochasticSystem::Open(_), QuantumState::Ket(psi)) => Ok(vectorize(&ket_to_dm(psi))),
            (StochasticSystem::Open(_), QuantumState::DensityMatrix(rho)) => Ok(vectorize(rho)),
            (StochasticSystem::Closed(_), QuantumState::Ket(psi)) => Ok(psi.clone()),
            (StochasticSystem::Closed(_), QuantumState::DensityMatrix(_)) => Err(Error::Type(
                "stochastic Schrödinger equation requires a ket initial state".into(),
            )),
        }
    }

    /// Rebuild a state from the working vector.
    pub fn restore_state(&self, y: &Array1<Complex64>, normalize: bool) -> Result<QuantumState> {
        let state = match self {
            StochasticSystem::Open(s) => QuantumState::DensityMatrix(unvectorize(y, s.dim)?),
            StochasticSystem::Closed(_) => QuantumState::Ket(y.clone()),
        };
        Ok(if normalize { state.normalized() } else { state })
    }
}

fn check_channel(c: &Operator, dim: usize) -> Result<()> {
    if !c.is_oper() {
        return Err(Error::Type(format!(
            "sc_ops must be operators, got {} of shape {:?}",
            c.kind(),
            c.shape()
        )));
    }
    if c.shape().0 != dim {
        return Err(Error::Type(format!(
            "stochastic collapse operator has dimension {}, system has {}",
            c.shape().0,
            dim
        )));
    }
    Ok(())
}

fn split_channels(sc_ops: &[Operator], heterodyne: bool) -> Vec<Operator> {
    if !heterodyne {
        return sc_ops.to_vec();
    }
    sc_ops
        .iter()
        .flat_map(|c| {
            [
                c.scale(Complex64::new(FRAC_1_SQRT_2, 0.0)),
                c.scale(Complex64::new(0.0, -FRAC_1_SQRT_2)),
            ]
        })
        .collect()
}

/// ⟨x|y⟩.
fn inner(x: &Array1<Complex64>, y: &Array1<Complex64>) -> Complex64 {
    x.iter()
        .zip(y.iter())
        .fold(Complex64::new(0.0, 0.0), |acc, (a, b)| acc + a.conj() * b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::library::{basis, destroy, number, sigmam, sigmaz};
    use crate::operator::liouvillian;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn plus_state() -> Array1<Complex64> {
        let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
        Array1::from(vec![h, h])
    }

    #[test]
    fn test_heterodyne_doubles_channels() {
        let sc = vec![Operator::new(destroy(3)), Operator::new(number(3))];
        let homo = StochasticSystem::closed(Operator::new(Array2::zeros((3, 3))), &sc, false).unwrap();
        let het = StochasticSystem::closed(Operator::new(Array2::zeros((3, 3))), &sc, true).unwrap();
        assert_eq!(homo.num_channels(), 2);
        assert_eq!(het.num_channels(), 4);
    }

    #[test]
    fn test_closed_rejects_superoperator_channel() {
        let sc = vec![Operator::new_super(Array2::eye(4))];
        let err = StochasticSystem::closed(Operator::new(sigmaz()), &sc, false);
        assert!(matches!(err, Err(Error::Type(_))));
    }

    #[test]
    fn test_open_requires_superoperator_generator() {
        let err = StochasticSystem::open(Operator::new(sigmaz()), &[], false);
        assert!(matches!(err, Err(Error::Type(_))));
    }

    #[test]
    fn test_sse_diffusion_vanishes_on_eigenstate() {
        // σz|0⟩ = |0⟩: measurement of σz leaves the eigenstate untouched
        let sys = StochasticSystem::closed(
            Operator::new(Array2::zeros((2, 2))),
            &[Operator::new(sigmaz())],
            false,
        )
        .unwrap();
        let b = sys.diffusion(0.0, &basis(2, 0)).unwrap();
        for z in b[0].iter() {
            assert_relative_eq!(z.norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sse_norm_preserved_with_ito_correction() {
        // d⟨ψ|ψ⟩ = (2 Re⟨ψ|a⟩ + Σ‖b‖²) dt must vanish for a normalized state
        let sys = StochasticSystem::closed(
            Operator::new(sigmaz()),
            &[Operator::new(sigmam())],
            false,
        )
        .unwrap();
        let psi = plus_state();
        let a = sys.drift(0.0, &psi).unwrap();
        let b = sys.diffusion(0.0, &psi).unwrap();
        let ito: f64 = b.iter().map(|v| inner(v, v).re).sum();
        assert_relative_eq!(2.0 * inner(&psi, &a).re + ito, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sme_diffusion_is_traceless() {
        let sys = StochasticSystem::open(
            liouvillian(&Operator::new(sigmaz())).unwrap(),
            &[Operator::new(sigmam())],
            false,
        )
        .unwrap();
        let y = sys.to_vector(&QuantumState::Ket(plus_state())).unwrap();
        let b = sys.diffusion(0.0, &y).unwrap();
        let rho_b = unvectorize(&b[0], 2).unwrap();
        let tr: Complex64 = rho_b.diag().iter().sum();
        assert_relative_eq!(tr.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sme_drift_includes_measurement_dissipator() {
        // Pure decay from |1⟩: dρ₀₀/dt = γ with γ = 1
        let sys = StochasticSystem::open(
            liouvillian(&Operator::new(Array2::zeros((2, 2)))).unwrap(),
            &[Operator::new(sigmam())],
            false,
        )
        .unwrap();
        let y = sys.to_vector(&QuantumState::Ket(basis(2, 1))).unwrap();
        let a = unvectorize(&sys.drift(0.0, &y).unwrap(), 2).unwrap();
        assert_relative_eq!(a[[0, 0]].re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(a[[1, 1]].re, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_to_vector_rejects_dimension_mismatch() {
        let sys = StochasticSystem::closed(Operator::new(sigmaz()), &[], false).unwrap();
        let err = sys.to_vector(&QuantumState::Ket(basis(3, 0)));
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[test]
    fn test_sse_rejects_density_matrix() {
        let sys = StochasticSystem::closed(Operator::new(sigmaz()), &[], false).unwrap();
        let rho = QuantumState::DensityMatrix(ket_to_dm(&basis(2, 0)));
        assert!(matches!(sys.to_vector(&rho), Err(Error::Type(_))));
    }

    #[test]
    fn test_restore_state_round_trips_open_vector() {
        let sys = StochasticSystem::open(
            liouvillian(&Operator::new(sigmaz())).unwrap(),
            &[],
            false,
        )
        .unwrap();
        let rho = ket_to_dm(&plus_state());
        let y = vectorize(&rho);
        let restored = sys.restore_state(&y, false).unwrap();
        assert_eq!(restored, QuantumState::DensityMatrix(rho));
    }
}
