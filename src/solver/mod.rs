// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Multi-trajectory stochastic solvers.
//!
//! # Overview
//!
//! A run proceeds in four stages:
//!
//! 1. [`StochasticSolver`] builds the equation of motion and resolves the
//!    measurement operators and noise weights ([`MeasurementConfig`])
//! 2. the [`scheduler`] derives one seed per trajectory and maps them,
//!    serially or over a rayon pool
//! 3. [`TrajectoryRunner`] integrates each trajectory and records states,
//!    raw noise and the reconstructed measurement current
//!    ([`TrajectoryResult`])
//! 4. every completed trajectory is folded into an [`EnsembleResult`]

pub mod ensemble;
pub mod measurement;
pub mod options;
pub mod scheduler;
pub mod stochastic;
pub mod trajectory;

pub use ensemble::{EnsembleLayout, EnsembleResult, RunStats};
pub use measurement::{default_weight, resolve_dw_factor, DwFactor, MeasurementConfig};
pub use options::{FailurePolicy, MapKind, StochasticOptions};
pub use scheduler::{derive_seeds, run_trajectories, CancelToken, MapOptions};
pub use stochastic::{smesolve, ssesolve, SolverKind, StochasticSolver, StochasticSolverBuilder};
pub use trajectory::{StoreFlags, TrajectoryResult, TrajectoryRunner};
