// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-trajectory integration and measurement reconstruction.

use std::sync::Arc;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, trace};

use super::measurement::MeasurementConfig;
use crate::error::{Error, Result, ValidationError};
use crate::operator::{Operator, QuantumState};
use crate::sode::{IntegratorFactory, IntegratorOptions, StochasticSystem};

/// Storage switches for a trajectory.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreFlags {
    pub states: bool,
    pub final_state: bool,
    pub normalize: bool,
}

/// Record of one trajectory.
///
/// Buffers are sized from the time grid when the trajectory starts; `add`
/// fills them in order.
#[derive(Debug, Clone)]
pub struct TrajectoryResult {
    /// Times recorded so far
    pub times: Vec<f64>,
    /// Re⟨e_op⟩, shape `(n_e_ops, n_times)`
    pub expect: Array2<f64>,
    /// Measurement current, shape `(n_channels, n_times − 1)`
    pub measurement: Array2<f64>,
    /// Raw Wiener increments per step, each `(n_substeps, n_noise_channels)`
    pub noise: Vec<Array2<f64>>,
    /// States at every time, when requested
    pub states: Option<Vec<QuantumState>>,
    /// Last recorded state, when requested
    pub final_state: Option<QuantumState>,
    e_ops: Vec<Operator>,
    measure: Arc<MeasurementConfig>,
    n_noise_channels: usize,
    store: StoreFlags,
}

impl TrajectoryResult {
    pub fn new(
        n_times: usize,
        e_ops: &[Operator],
        measure: Arc<MeasurementConfig>,
        n_noise_channels: usize,
        store: StoreFlags,
    ) -> Self {
        let n_steps = n_times.saturating_sub(1);
        Self {
            times: Vec::with_capacity(n_times),
            expect: Array2::zeros((e_ops.len(), n_times)),
            measurement: Array2::zeros((measure.n_channels(), n_steps)),
            noise: Vec::with_capacity(n_steps),
            states: store.states.then(|| Vec::with_capacity(n_times)),
            final_state: None,
            e_ops: e_ops.to_vec(),
            measure,
            n_noise_channels,
            store,
        }
    }

    /// Number of points recorded.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Capacity fixed at construction.
    pub fn capacity(&self) -> usize {
        self.expect.ncols()
    }

    /// Append one point.
    ///
    /// The first point carries no noise; every later point carries the noise
    /// block the integrator returned for the interval ending at `t`.
    pub fn add(&mut self, t: f64, state: QuantumState, noise: Option<Array2<f64>>) -> Result<()> {
        let idx = self.times.len();
        if idx >= self.capacity() {
            return Err(ValidationError::Shape(format!(
                "trajectory buffer holds {} points",
                self.capacity()
            ))
            .into());
        }

        for (k, op) in self.e_ops.iter().enumerate() {
            self.expect[[k, idx]] = op.expect(t, &state).re;
        }

        match (idx, noise) {
            (0, None) => {}
            (0, Some(_)) => {
                return Err(Error::Validation(ValidationError::Field {
                    field: "noise".into(),
                    message: "initial point cannot carry noise".into(),
                }))
            }
            (_, None) => {
                return Err(Error::Validation(ValidationError::Field {
                    field: "noise".into(),
                    message: format!("missing noise at t = {}", t),
                }))
            }
            (_, Some(noise)) => {
                if noise.ncols() != self.n_noise_channels {
                    return Err(ValidationError::Dimension {
                        what: "noise channels".into(),
                        expected: self.n_noise_channels,
                        actual: noise.ncols(),
                    }
                    .into());
                }
                if self.measure.is_enabled() {
                    let dt = t - self.times[idx - 1];
                    self.record_measurement(idx - 1, t, &state, &noise, dt);
                }
                self.noise.push(noise);
            }
        }

        self.times.push(t);
        if let Some(states) = self.states.as_mut() {
            states.push(state.clone());
        }
        if self.store.final_state {
            self.final_state = Some(state);
        }
        Ok(())
    }

    /// current_i = Re⟨m_i⟩ + (Σ_substeps dW_i / dt) · w_i
    fn record_measurement(
        &mut self,
        step: usize,
        t: f64,
        state: &QuantumState,
        noise: &Array2<f64>,
        dt: f64,
    ) {
        let dw = noise.sum_axis(Axis(0));
        let measure = Arc::clone(&self.measure);
        for (i, (op, w)) in measure.operators().iter().zip(measure.weights()).enumerate() {
            self.measurement[[i, step]] = op.expect(t, state).re + dw[i] / dt * w;
        }
    }

    /// Measurement current of one channel.
    pub fn channel(&self, i: usize) -> ndarray::ArrayView1<'_, f64> {
        self.measurement.row(i)
    }

    /// Drop the per-step noise; returns the number of blocks released.
    pub(crate) fn release_noise(&mut self) -> usize {
        let n = self.noise.len();
        self.noise = Vec::new();
        n
    }

    pub fn is_complete(&self) -> bool {
        self.len() == self.capacity()
    }
}

/// Runs trajectories of one stochastic system.
///
/// Everything held here is read-only and shared between concurrent runs.
#[derive(Clone)]
pub struct TrajectoryRunner {
    system: Arc<StochasticSystem>,
    measure: Arc<MeasurementConfig>,
    factory: IntegratorFactory,
    integrator_options: IntegratorOptions,
    store: StoreFlags,
}

impl TrajectoryRunner {
    pub fn new(
        system: Arc<StochasticSystem>,
        measure: Arc<MeasurementConfig>,
        factory: IntegratorFactory,
        integrator_options: IntegratorOptions,
        store: StoreFlags,
    ) -> Self {
        Self {
            system,
            measure,
            factory,
            integrator_options,
            store,
        }
    }

    pub fn system(&self) -> &Arc<StochasticSystem> {
        &self.system
    }

    pub fn measurement(&self) -> &Arc<MeasurementConfig> {
        &self.measure
    }

    /// Integrate one trajectory over `time_grid`.
    ///
    /// The seed fully determines the noise: the same seed and inputs give a
    /// bit-identical result. It is echoed back with the result.
    pub fn run(
        &self,
        seed: u64,
        initial_state: &QuantumState,
        time_grid: &[f64],
        e_ops: &[Operator],
    ) -> Result<(u64, TrajectoryResult)> {
        let (&t0, rest) = time_grid.split_first().ok_or_else(|| {
            Error::Validation(ValidationError::TimeGrid("time grid is empty".into()))
        })?;

        let mut result = TrajectoryResult::new(
            time_grid.len(),
            e_ops,
            Arc::clone(&self.measure),
            self.system.num_channels(),
            self.store,
        );

        let mut integrator = (self.factory)(Arc::clone(&self.system), &self.integrator_options);
        let y0 = self.system.to_vector(initial_state)?;
        integrator.set_state(t0, y0.clone(), StdRng::seed_from_u64(seed));

        result.add(t0, self.system.restore_state(&y0, self.store.normalize)?, None)?;
        for &t in rest {
            let (t, y, noise) = integrator.integrate(t)?;
            trace!(seed, t, substeps = noise.nrows(), "Step");
            result.add(t, self.system.restore_state(&y, self.store.normalize)?, Some(noise))?;
        }

        debug!(seed, method = integrator.name(), steps = rest.len(), "Trajectory complete");
        Ok((seed, result))
    }
}
