// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Explicit Itô schemes.
//!
//! Ref: Kloeden & Platen, "Numerical Solution of Stochastic Differential
//! Equations" (1992), §10.2 (Euler–Maruyama) and §11.1 (explicit order 1.0).

use ndarray::{Array1, ArrayView1};
use num_complex::Complex64;

use super::integrator::Scheme;
use super::system::StochasticSystem;
use crate::error::Result;

/// Euler–Maruyama, strong order ½.
///
///   y' = y + a h + Σ_k b_k ΔW_k
#[derive(Debug, Clone, Copy, Default)]
pub struct EulerMaruyama;

impl Scheme for EulerMaruyama {
    fn name(&self) -> &'static str {
        "euler"
    }

    fn step(
        &self,
        system: &StochasticSystem,
        t: f64,
        y: &Array1<Complex64>,
        h: f64,
        dw: ArrayView1<'_, f64>,
    ) -> Result<Array1<Complex64>> {
        let a = system.drift(t, y)?;
        let b = system.diffusion(t, y)?;
        let mut next = y.clone();
        next.scaled_add(Complex64::new(h, 0.0), &a);
        for (b_k, dw_k) in b.iter().zip(dw.iter()) {
            next.scaled_add(Complex64::new(*dw_k, 0.0), b_k);
        }
        Ok(next)
    }
}

/// Derivative-free Platen scheme, strong order 1 for diagonal noise.
///
///   ῡ_k = y + a h + b_k √h
///   y'  = y + a h + Σ_k b_k ΔW_k + Σ_k (b_k(ῡ_k) − b_k(y)) (ΔW_k² − h) / (2√h)
///
/// Cross terms between different channels are neglected, which is exact
/// for commuting noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Platen;

impl Scheme for Platen {
    fn name(&self) -> &'static str {
        "platen"
    }

    fn step(
        &self,
        system: &StochasticSystem,
        t: f64,
        y: &Array1<Complex64>,
        h: f64,
        dw: ArrayView1<'_, f64>,
    ) -> Result<Array1<Complex64>> {
        let sqrt_h = h.sqrt();
        let a = system.drift(t, y)?;
        let b = system.diffusion(t, y)?;

        let mut base = y.clone();
        base.scaled_add(Complex64::new(h, 0.0), &a);

        let mut next = base.clone();
        for (k, (b_k, dw_k)) in b.iter().zip(dw.iter()).enumerate() {
            next.scaled_add(Complex64::new(*dw_k, 0.0), b_k);

            let mut support = base.clone();
            support.scaled_add(Complex64::new(sqrt_h, 0.0), b_k);
            let b_support = system.diffusion(t, &support)?;
            let weight = (dw_k * dw_k - h) / (2.0 * sqrt_h);
            next.scaled_add(Complex64::new(weight, 0.0), &(&b_support[k] - b_k));
        }
        Ok(next)
    }
}
