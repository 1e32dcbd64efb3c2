// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Integrator contract and the fixed-step driver shared by all schemes.
//!
//! A call to [`Integrator::integrate`] advances to the requested time using
//! `N = ⌈Δt / dt⌉` equal sub-steps and reports the Wiener increments of every
//! sub-step as an `(N, n_channels)` block. Callers that only need the
//! macro-step increment sum that block over its first axis.

use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::system::StochasticSystem;
use crate::error::{Error, IntegrationError, Result};

/// Relative slack when rounding the number of sub-steps.
const SUBSTEP_ROUNDING: f64 = 1e-10;

/// Largest squared norm of the working vector accepted after a sub-step.
/// Kets and vectorized density matrices start at norm one.
const MAX_NORM_SQR: f64 = 1e12;

/// Output of one `integrate` call: `(t, state, noise)`.
pub type StepOutput = (f64, Array1<Complex64>, Array2<f64>);

/// Stateful SDE integrator driven by the trajectory runner.
///
/// Given the same initial state, generator seed and sequence of requested
/// times, the output must be bit-identical.
pub trait Integrator: Send {
    /// Scheme name as registered.
    fn name(&self) -> &str;

    /// Reset to `(t0, y0)` with a fresh random stream.
    fn set_state(&mut self, t0: f64, y0: Array1<Complex64>, rng: StdRng);

    /// Advance to `t`.
    fn integrate(&mut self, t: f64) -> Result<StepOutput>;

    /// Current `(t, y)`, if initialised.
    fn state(&self) -> Option<(f64, &Array1<Complex64>)>;
}

/// Options common to the fixed-step schemes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegratorOptions {
    /// Maximum internal sub-step size
    #[serde(default = "default_dt")]
    pub dt: f64,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self { dt: default_dt() }
    }
}

fn default_dt() -> f64 {
    1e-3
}

/// A single-step update rule y_{n+1} = Φ(t_n, y_n, h, ΔW).
pub trait Scheme: Send + Sync {
    fn name(&self) -> &'static str;

    fn step(
        &self,
        system: &StochasticSystem,
        t: f64,
        y: &Array1<Complex64>,
        h: f64,
        dw: ArrayView1<'_, f64>,
    ) -> Result<Array1<Complex64>>;
}

/// Fixed-step driver wrapping a [`Scheme`].
pub struct FixedStepIntegrator<S: Scheme> {
    scheme: S,
    system: Arc<StochasticSystem>,
    options: IntegratorOptions,
    t: f64,
    y: Option<Array1<Complex64>>,
    rng: Option<StdRng>,
}

impl<S: Scheme> FixedStepIntegrator<S> {
    pub fn new(scheme: S, system: Arc<StochasticSystem>, options: IntegratorOptions) -> Self {
        Self {
            scheme,
            system,
            options,
            t: 0.0,
            y: None,
            rng: None,
        }
    }
}

/// Number of equal sub-steps of size at most `dt` covering `span`.
fn num_substeps(span: f64, dt: f64) -> usize {
    let n = (span / dt - SUBSTEP_ROUNDING).ceil();
    (n as usize).max(1)
}

impl<S: Scheme> Integrator for FixedStepIntegrator<S> {
    fn name(&self) -> &str {
        self.scheme.name()
    }

    fn set_state(&mut self, t0: f64, y0: Array1<Complex64>, rng: StdRng) {
        self.t = t0;
        self.y = Some(y0);
        self.rng = Some(rng);
    }

    fn integrate(&mut self, t: f64) -> Result<StepOutput> {
        let (Some(y), Some(rng)) = (self.y.as_mut(), self.rng.as_mut()) else {
            return Err(IntegrationError::NotInitialized.into());
        };
        if t <= self.t {
            return Err(IntegrationError::InvalidTarget {
                current: self.t,
                requested: t,
            }
            .into());
        }

        let span = t - self.t;
        let n = num_substeps(span, self.options.dt);
        let h = span / n as f64;
        let sqrt_h = h.sqrt();
        let channels = self.system.num_channels();

        let mut noise = Array2::zeros((n, channels));
        for value in noise.iter_mut() {
            let z: f64 = rng.sample(StandardNormal);
            *value = z * sqrt_h;
        }

        let mut t_k = self.t;
        for k in 0..n {
            let next = self.scheme.step(&self.system, t_k, y, h, noise.row(k))?;
            t_k = self.t + (k + 1) as f64 * h;
            if next.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
                return Err(Error::Integration(IntegrationError::NonFinite { t: t_k }));
            }
            let norm_sqr: f64 = next.iter().map(|z| z.norm_sqr()).sum();
            if norm_sqr > MAX_NORM_SQR {
                return Err(IntegrationError::Diverged {
                    t: t_k,
                    reason: format!(
                        "state norm {:.3e} after a sub-step of {:.3e}, reduce dt",
                        norm_sqr.sqrt(),
                        h
                    ),
                }
                .into());
            }
            *y = next;
        }

        self.t = t;
        Ok((t, y.clone(), noise))
    }

    fn state(&self) -> Option<(f64, &Array1<Complex64>)> {
        self.y.as_ref().map(|y| (self.t, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::library::{basis, sigmaz};
    use crate::operator::Operator;
    use crate::sode::EulerMaruyama;
    use rand::SeedableRng;

    fn system() -> Arc<StochasticSystem> {
        Arc::new(
            StochasticSystem::closed(Operator::new(sigmaz()), &[Operator::new(sigmaz())], true)
                .unwrap(),
        )
    }

    fn integrator(dt: f64) -> FixedStepIntegrator<EulerMaruyama> {
        FixedStepIntegrator::new(EulerMaruyama, system(), IntegratorOptions { dt })
    }

    #[test]
    fn test_integrate_before_set_state_fails() {
        let mut integ = integrator(0.01);
        assert!(matches!(
            integ.integrate(1.0),
            Err(Error::Integration(IntegrationError::NotInitialized))
        ));
    }

    #[test]
    fn test_integrate_backwards_fails() {
        let mut integ = integrator(0.01);
        integ.set_state(1.0, basis(2, 0), StdRng::seed_from_u64(1));
        assert!(matches!(
            integ.integrate(0.5),
            Err(Error::Integration(IntegrationError::InvalidTarget { .. }))
        ));
    }

    #[test]
    fn test_noise_block_shape_counts_substeps() {
        let mut integ = integrator(0.01);
        integ.set_state(0.0, basis(2, 0), StdRng::seed_from_u64(7));
        let (t, _, noise) = integ.integrate(0.05).unwrap();
        assert_eq!(t, 0.05);
        // 5 sub-steps, 2 heterodyne channels
        assert_eq!(noise.dim(), (5, 2));
        assert_eq!(num_substeps(0.05, 0.01), 5);
    }

    #[test]
    fn test_single_substep_when_dt_exceeds_span() {
        let mut integ = integrator(1.0);
        integ.set_state(0.0, basis(2, 0), StdRng::seed_from_u64(7));
        let (_, _, noise) = integ.integrate(0.1).unwrap();
        assert_eq!(noise.nrows(), 1);
    }

    #[test]
    fn test_same_seed_is_bit_reproducible() {
        let run = |seed| {
            let mut integ = integrator(0.01);
            integ.set_state(0.0, basis(2, 0), StdRng::seed_from_u64(seed));
            let a = integ.integrate(0.1).unwrap();
            let b = integ.integrate(0.2).unwrap();
            (a, b)
        };
        let first = run(42);
        let second = run(42);
        assert_eq!(first.0 .1, second.0 .1);
        assert_eq!(first.1 .2, second.1 .2);
        assert_ne!(run(43).0 .2, first.0 .2);
    }

    #[test]
    fn test_unstable_step_reports_divergence() {
        // Explicit Euler on −iHψ grows the norm by √(1 + (hE)²) per step
        let sys = Arc::new(
            StochasticSystem::closed(Operator::new(sigmaz().mapv(|z| z * 1e4)), &[], false)
                .unwrap(),
        );
        let mut integ = FixedStepIntegrator::new(EulerMaruyama, sys, IntegratorOptions { dt: 1.0 });
        integ.set_state(0.0, basis(2, 0), StdRng::seed_from_u64(5));
        assert!(integ.integrate(1.0).is_ok());
        let result = integ.integrate(2.0);
        assert!(matches!(
            result,
            Err(Error::Integration(IntegrationError::Diverged { t, .. })) if t == 2.0
        ));
    }

    #[test]
    fn test_state_reports_current_time() {
        let mut integ = integrator(0.01);
        assert!(integ.state().is_none());
        integ.set_state(0.0, basis(2, 0), StdRng::seed_from_u64(3));
        integ.integrate(0.02).unwrap();
        assert_eq!(integ.state().map(|(t, _)| t), Some(0.02));
    }
}
