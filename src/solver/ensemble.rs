// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ensemble reduction of completed trajectories.
//!
//! Expectation values and measurement currents are folded with Welford's
//! running mean, so the result does not depend on the order in which
//! trajectories arrive beyond floating-point summation noise.

use std::time::Duration;

use ndarray::{s, Array2, Array3, ArrayView3, Axis};
use num_complex::Complex64;
use serde::Serialize;
use tracing::debug;

use super::trajectory::TrajectoryResult;
use crate::error::{Result, ValidationError};
use crate::operator::QuantumState;

/// Bookkeeping of a finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Trajectories requested
    pub num_requested: usize,
    /// Trajectories folded into the averages
    pub num_trajectories: usize,
    /// Trajectories that failed and were skipped
    pub num_failed: usize,
    /// Trajectories never started because the run stopped early
    pub num_discarded: usize,
    pub timed_out: bool,
    pub cancelled: bool,
    #[serde(with = "duration_secs")]
    pub run_time: Duration,
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// Running statistics of a `(rows, cols)` series.
#[derive(Debug, Clone)]
struct Welford {
    mean: Array2<f64>,
    m2: Array2<f64>,
}

impl Welford {
    fn new(shape: (usize, usize)) -> Self {
        Self {
            mean: Array2::zeros(shape),
            m2: Array2::zeros(shape),
        }
    }

    /// Fold sample number `n` (1-based).
    fn push(&mut self, x: &Array2<f64>, n: usize) {
        let inv_n = 1.0 / n as f64;
        ndarray::Zip::from(&mut self.mean)
            .and(&mut self.m2)
            .and(x)
            .for_each(|mean, m2, &x| {
                let delta = x - *mean;
                *mean += delta * inv_n;
                *m2 += delta * (x - *mean);
            });
    }

    /// Population standard deviation after `n` samples.
    fn std(&self, n: usize) -> Array2<f64> {
        if n == 0 {
            return Array2::zeros(self.m2.raw_dim());
        }
        self.m2.mapv(|m2| (m2 / n as f64).max(0.0).sqrt())
    }
}

/// Averages over the trajectories of one run.
#[derive(Debug, Clone)]
pub struct EnsembleResult {
    times: Vec<f64>,
    count: usize,
    expect: Welford,
    measurement: Option<Welford>,
    runs_expect: Option<Vec<Array2<f64>>>,
    runs_measurement: Option<Array3<f64>>,
    store_final_state: bool,
    final_state_sum: Option<Array2<Complex64>>,
    n_sc_ops: usize,
    heterodyne: bool,
    seeds: Vec<u64>,
    pub stats: RunStats,
}

/// Shape and storage switches for an [`EnsembleResult`].
#[derive(Debug, Clone, Copy)]
pub struct EnsembleLayout {
    pub n_trajectories: usize,
    pub n_e_ops: usize,
    /// Zero when measurements are not stored
    pub n_channels: usize,
    pub n_sc_ops: usize,
    pub heterodyne: bool,
    pub keep_runs: bool,
    pub final_state: bool,
}

impl EnsembleResult {
    pub fn new(time_grid: &[f64], layout: EnsembleLayout) -> Self {
        let n_times = time_grid.len();
        let n_steps = n_times.saturating_sub(1);
        let store_measurement = layout.n_channels > 0;
        Self {
            times: time_grid.to_vec(),
            count: 0,
            expect: Welford::new((layout.n_e_ops, n_times)),
            measurement: store_measurement.then(|| Welford::new((layout.n_channels, n_steps))),
            runs_expect: layout
                .keep_runs
                .then(|| Vec::with_capacity(layout.n_trajectories)),
            runs_measurement: (layout.keep_runs && store_measurement).then(|| {
                Array3::zeros((layout.n_trajectories, layout.n_channels, n_steps))
            }),
            store_final_state: layout.final_state,
            final_state_sum: None,
            n_sc_ops: layout.n_sc_ops,
            heterodyne: layout.heterodyne,
            seeds: Vec::with_capacity(layout.n_trajectories),
            stats: RunStats {
                num_requested: layout.n_trajectories,
                ..RunStats::default()
            },
        }
    }

    /// Fold one completed trajectory.
    ///
    /// The trajectory is consumed; only its fixed-shape arrays survive.
    pub fn reduce(&mut self, seed: u64, mut trajectory: TrajectoryResult) -> Result<()> {
        if !trajectory.is_complete() || trajectory.expect.dim() != self.expect.mean.dim() {
            return Err(ValidationError::Shape(format!(
                "trajectory {} has {} of {} points and expect shape {:?}, ensemble expects {:?}",
                seed,
                trajectory.len(),
                self.times.len(),
                trajectory.expect.dim(),
                self.expect.mean.dim()
            ))
            .into());
        }
        if let Some(m) = &self.measurement {
            if trajectory.measurement.dim() != m.mean.dim() {
                return Err(ValidationError::Shape(format!(
                    "measurement shape {:?}, ensemble expects {:?}",
                    trajectory.measurement.dim(),
                    m.mean.dim()
                ))
                .into());
            }
        }

        if let Some(runs) = &self.runs_measurement {
            if self.count >= runs.len_of(Axis(0)) {
                return Err(ValidationError::Shape(format!(
                    "trajectory {} exceeds the {} kept runs this ensemble was sized for",
                    seed,
                    runs.len_of(Axis(0))
                ))
                .into());
            }
        }

        let released = trajectory.release_noise();
        let index = self.count;
        self.count += 1;
        let n = self.count;

        self.expect.push(&trajectory.expect, n);
        if let Some(m) = self.measurement.as_mut() {
            m.push(&trajectory.measurement, n);
        }
        if let Some(runs) = self.runs_measurement.as_mut() {
            runs.index_axis_mut(Axis(0), index).assign(&trajectory.measurement);
        }
        if self.store_final_state {
            if let Some(state) = trajectory.final_state.take() {
                let rho = state.to_density_matrix();
                match self.final_state_sum.as_mut() {
                    Some(sum) => *sum += &rho,
                    None => self.final_state_sum = Some(rho),
                }
            }
        }
        if let Some(runs) = self.runs_expect.as_mut() {
            runs.push(std::mem::take(&mut trajectory.expect));
        }
        self.seeds.push(seed);
        self.stats.num_trajectories = n;

        debug!(seed, trajectories = n, released_noise = released, "Reduced trajectory");
        Ok(())
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Trajectories folded so far.
    pub fn num_trajectories(&self) -> usize {
        self.count
    }

    /// Seeds in arrival order.
    pub fn seeds(&self) -> &[u64] {
        &self.seeds
    }

    /// ⟨e_op⟩ averaged over trajectories, shape `(n_e_ops, n_times)`.
    pub fn average_expect(&self) -> &Array2<f64> {
        &self.expect.mean
    }

    /// Standard deviation across trajectories, shape `(n_e_ops, n_times)`.
    pub fn std_expect(&self) -> Array2<f64> {
        self.expect.std(self.count)
    }

    /// Per-trajectory expectation values in arrival order.
    pub fn runs_expect(&self) -> Option<&[Array2<f64>]> {
        self.runs_expect.as_deref()
    }

    /// Averaged measurement current, shape `(n_channels, n_steps)`.
    pub fn average_measurement(&self) -> Option<&Array2<f64>> {
        self.measurement.as_ref().map(|m| &m.mean)
    }

    pub fn std_measurement(&self) -> Option<Array2<f64>> {
        self.measurement.as_ref().map(|m| m.std(self.count))
    }

    /// Per-trajectory measurement currents, `(n_trajectories, n_channels, n_steps)`.
    ///
    /// Only the rows of completed trajectories are returned.
    pub fn runs_measurement(&self) -> Option<ArrayView3<'_, f64>> {
        self.runs_measurement.as_ref().map(|runs| {
            let rows = self.count.min(runs.len_of(Axis(0)));
            runs.slice(s![..rows, .., ..])
        })
    }

    /// Heterodyne view of the averaged current, `(n_sc_ops, 2, n_steps)`.
    ///
    /// The two quadratures of each collapse operator are adjacent on the
    /// channel axis, so this is a reshape of [`Self::average_measurement`].
    pub fn measurement_quadratures(&self) -> Option<Array3<f64>> {
        if !self.heterodyne {
            return None;
        }
        let mean = self.average_measurement()?;
        let n_steps = mean.ncols();
        mean.as_standard_layout()
            .into_owned()
            .into_shape_with_order((self.n_sc_ops, 2, n_steps))
            .ok()
    }

    /// Final state averaged as a density matrix.
    pub fn average_final_state(&self) -> Option<QuantumState> {
        let sum = self.final_state_sum.as_ref()?;
        if self.count == 0 {
            return None;
        }
        Some(QuantumState::DensityMatrix(sum.mapv(|z| z / self.count as f64)))
    }
}
