// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Options of the stochastic solvers.

use serde::{Deserialize, Serialize};

use super::measurement::DwFactor;
use crate::error::{Error, Result};
use crate::sode::DEFAULT_METHOD;

/// How trajectories are distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapKind {
    /// One trajectory after another on the calling thread
    #[default]
    Serial,
    /// Rayon work-stealing pool
    Parallel,
}

/// What to do when a trajectory fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run and return the first error
    #[default]
    Abort,
    /// Log, count and continue
    Skip,
}

/// Stochastic solver options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StochasticOptions {
    /// Two measurement quadratures per stochastic collapse operator
    #[serde(default)]
    pub heterodyne: bool,

    /// Reconstruct and keep the measurement current
    #[serde(default)]
    pub store_measurement: bool,

    /// Noise weight of the measurement current, written as a one-key map
    /// (`scalar: 0.5`, `per_operator: [..]`, `per_channel: [..]`)
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub dw_factor: Option<DwFactor>,

    /// Keep per-trajectory expectation values and measurements
    #[serde(default)]
    pub keep_runs_results: bool,

    /// Keep the state at every time of the grid
    #[serde(default)]
    pub store_states: bool,

    /// Keep the final state and average it over the ensemble
    #[serde(default)]
    pub store_final_state: bool,

    /// Normalize states before computing expectation values
    #[serde(default)]
    pub normalize_output: bool,

    /// Integration scheme name
    #[serde(default = "default_method")]
    pub method: String,

    /// Trajectory map
    #[serde(default)]
    pub map: MapKind,

    /// Worker threads for the parallel map (rayon default if unset)
    #[serde(default)]
    pub num_cpus: Option<usize>,

    /// Stop starting new trajectories after this many seconds
    #[serde(default)]
    pub job_timeout_sec: Option<f64>,

    /// Base seed; entropy when unset
    #[serde(default)]
    pub seed: Option<u64>,

    /// Default number of trajectories
    #[serde(default = "default_ntraj")]
    pub ntraj: usize,

    /// Log progress while running
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Completed trajectories between progress messages
    #[serde(default = "default_progress_chunk")]
    pub progress_chunk: usize,

    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl Default for StochasticOptions {
    fn default() -> Self {
        Self {
            heterodyne: false,
            store_measurement: false,
            dw_factor: None,
            keep_runs_results: false,
            store_states: false,
            store_final_state: false,
            normalize_output: false,
            method: default_method(),
            map: MapKind::default(),
            num_cpus: None,
            job_timeout_sec: None,
            seed: None,
            ntraj: default_ntraj(),
            progress: true,
            progress_chunk: default_progress_chunk(),
            on_failure: FailurePolicy::default(),
        }
    }
}

impl StochasticOptions {
    /// Reject values no run could honour.
    pub fn validate(&self) -> Result<()> {
        if self.ntraj == 0 {
            return Err(Error::Config("ntraj must be at least 1".into()));
        }
        if self.num_cpus == Some(0) {
            return Err(Error::Config("num_cpus cannot be 0".into()));
        }
        if self.progress_chunk == 0 {
            return Err(Error::Config("progress_chunk cannot be 0".into()));
        }
        if let Some(timeout) = self.job_timeout_sec {
            if !(timeout.is_finite() && timeout > 0.0) {
                return Err(Error::Config(format!(
                    "job_timeout_sec must be positive, got {}",
                    timeout
                )));
            }
        }
        if self.method.is_empty() {
            return Err(Error::Config("method cannot be empty".into()));
        }
        Ok(())
    }
}

fn default_method() -> String {
    DEFAULT_METHOD.into()
}

fn default_ntraj() -> usize {
    100
}

fn default_progress_chunk() -> usize {
    10
}

fn default_true() -> bool {
    true
}
