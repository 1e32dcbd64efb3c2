// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! QubitOS stochastic solvers
//!
//! Multi-trajectory integration of the stochastic master equation (SME) and
//! the stochastic Schrödinger equation (SSE) under continuous homodyne or
//! heterodyne measurement.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       smesolve / ssesolve / CLI          │
//! ├─────────────────────────────────────────┤
//! │          StochasticSolver                │
//! ├──────────────────┬──────────────────────┤
//! │   Scheduler      │   Ensemble reduction │
//! │   (rayon)        │   (mean / std)       │
//! ├──────────────────┴──────────────────────┤
//! │  TrajectoryRunner + MeasurementConfig    │
//! ├─────────────────────────────────────────┤
//! │     Integrator Registry (euler, platen)  │
//! ├─────────────────────────────────────────┤
//! │   Operators / superoperators (ndarray)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`operator`]: Operators, states and superoperator builders
//! - [`sode`]: Stochastic systems and integration schemes
//! - [`solver`]: Trajectories, measurement records and ensemble averaging
//! - [`validation`]: Input validation utilities
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod operator;
pub mod sode;
pub mod solver;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};
pub use operator::{Operator, QuantumState};
pub use solver::{
    smesolve, ssesolve, DwFactor, EnsembleResult, StochasticOptions, StochasticSolver,
};

#[cfg(test)]
pub mod test_utils;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
