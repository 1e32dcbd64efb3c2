// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stochastic master / Schrödinger equation solvers.
//!
//! Both variants share the trajectory, measurement and reduction machinery;
//! they differ only in how the generator is built:
//!
//! - master equation: `L = −i[H, ·] + Σ D[c_op]` (or `H + Σ D[c_op]` when `H`
//!   is already a superoperator), evolving density matrices
//! - pure state: `H` as given, evolving kets
//!
//! # Example
//!
//! ```ignore
//! use qubit_os_stochastic::operator::{library, Operator, QuantumState};
//! use qubit_os_stochastic::solver::{StochasticOptions, StochasticSolver};
//!
//! let a = Operator::new(library::destroy(10));
//! let mut options = StochasticOptions::default();
//! options.store_measurement = true;
//!
//! let solver = StochasticSolver::sme(&h, &[], &[a], &[], options)?;
//! let result = solver.run(&QuantumState::Ket(library::basis(10, 3)), &times, 200, &[n])?;
//! println!("{:?}", result.average_measurement());
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::ensemble::{EnsembleLayout, EnsembleResult};
use super::measurement::MeasurementConfig;
use super::options::StochasticOptions;
use super::scheduler::{derive_seeds, run_trajectories, CancelToken, MapOptions};
use super::trajectory::{StoreFlags, TrajectoryRunner};
use crate::error::{Error, Result};
use crate::operator::{liouvillian_with_dissipators, lindblad_dissipator, Operator, QuantumState};
use crate::sode::{IntegratorOptions, IntegratorRegistry, StochasticSystem};
use crate::validation::{
    validate_e_ops, validate_initial_state, validate_m_ops, validate_time_grid,
};

/// Equation integrated by a [`StochasticSolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    /// Stochastic master equation over density matrices
    MasterEquation,
    /// Stochastic Schrödinger equation over kets
    PureState,
}

impl SolverKind {
    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::MasterEquation => "smesolve",
            SolverKind::PureState => "ssesolve",
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A configured stochastic solver.
///
/// Construction builds the generator, resolves the measurement operators and
/// looks up the integration scheme, so every configuration and type error is
/// raised here rather than during a run.
pub struct StochasticSolver {
    kind: SolverKind,
    runner: TrajectoryRunner,
    options: StochasticOptions,
    registry: Arc<IntegratorRegistry>,
}

impl StochasticSolver {
    /// Stochastic master equation solver with the built-in schemes.
    pub fn sme(
        h: &Operator,
        c_ops: &[Operator],
        sc_ops: &[Operator],
        m_ops: &[Operator],
        options: StochasticOptions,
    ) -> Result<Self> {
        Self::builder(SolverKind::MasterEquation, h, sc_ops)
            .c_ops(c_ops)
            .m_ops(m_ops)
            .options(options)
            .build()
    }

    /// Stochastic Schrödinger equation solver with the built-in schemes.
    pub fn sse(
        h: &Operator,
        sc_ops: &[Operator],
        m_ops: &[Operator],
        options: StochasticOptions,
    ) -> Result<Self> {
        Self::builder(SolverKind::PureState, h, sc_ops)
            .m_ops(m_ops)
            .options(options)
            .build()
    }

    pub fn builder<'a>(
        kind: SolverKind,
        h: &'a Operator,
        sc_ops: &'a [Operator],
    ) -> StochasticSolverBuilder<'a> {
        StochasticSolverBuilder {
            kind,
            h,
            c_ops: &[],
            sc_ops,
            m_ops: &[],
            options: StochasticOptions::default(),
            integrator_options: IntegratorOptions::default(),
            registry: None,
        }
    }

    pub fn kind(&self) -> SolverKind {
        self.kind
    }

    pub fn options(&self) -> &StochasticOptions {
        &self.options
    }

    pub fn system(&self) -> &StochasticSystem {
        self.runner.system()
    }

    pub fn measurement(&self) -> &MeasurementConfig {
        self.runner.measurement()
    }

    /// Runner for single trajectories of this solver.
    pub fn runner(&self) -> &TrajectoryRunner {
        &self.runner
    }

    /// Names of the integration schemes this solver can use.
    pub fn available_integrators(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Run `n_trajectories` trajectories and average them.
    pub fn run(
        &self,
        initial_state: &QuantumState,
        time_grid: &[f64],
        n_trajectories: usize,
        e_ops: &[Operator],
    ) -> Result<EnsembleResult> {
        self.run_with_cancel(initial_state, time_grid, n_trajectories, e_ops, &CancelToken::new())
    }

    /// Like [`Self::run`], stopping early once `cancel` is triggered.
    ///
    /// Trajectories completed before cancellation are kept in the result.
    pub fn run_with_cancel(
        &self,
        initial_state: &QuantumState,
        time_grid: &[f64],
        n_trajectories: usize,
        e_ops: &[Operator],
        cancel: &CancelToken,
    ) -> Result<EnsembleResult> {
        if n_trajectories == 0 {
            return Err(Error::Config("n_trajectories must be at least 1".into()));
        }
        validate_time_grid(time_grid)?;
        validate_initial_state(self.system(), initial_state)?;
        validate_e_ops(e_ops, self.system().dim())?;

        let measure = self.measurement();
        let layout = EnsembleLayout {
            n_trajectories,
            n_e_ops: e_ops.len(),
            n_channels: measure.n_channels(),
            n_sc_ops: measure.n_sc_ops(),
            heterodyne: self.options.heterodyne,
            keep_runs: self.options.keep_runs_results,
            final_state: self.options.store_final_state,
        };
        let seeds = derive_seeds(self.options.seed, n_trajectories);

        info!(
            solver = %self.kind,
            method = %self.options.method,
            trajectories = n_trajectories,
            times = time_grid.len(),
            channels = self.system().num_channels(),
            "Running stochastic solver"
        );

        let ensemble = run_trajectories(
            &seeds,
            |seed| self.runner.run(seed, initial_state, time_grid, e_ops),
            EnsembleResult::new(time_grid, layout),
            &MapOptions::from(&self.options),
            cancel,
        )?;

        info!(
            solver = %self.kind,
            completed = ensemble.stats.num_trajectories,
            failed = ensemble.stats.num_failed,
            run_time_sec = ensemble.stats.run_time.as_secs_f64(),
            "Stochastic solver finished"
        );
        Ok(ensemble)
    }
}

/// Builder for [`StochasticSolver`].
pub struct StochasticSolverBuilder<'a> {
    kind: SolverKind,
    h: &'a Operator,
    c_ops: &'a [Operator],
    sc_ops: &'a [Operator],
    m_ops: &'a [Operator],
    options: StochasticOptions,
    integrator_options: IntegratorOptions,
    registry: Option<Arc<IntegratorRegistry>>,
}

impl<'a> StochasticSolverBuilder<'a> {
    /// Deterministic collapse operators (master equation only).
    pub fn c_ops(mut self, c_ops: &'a [Operator]) -> Self {
        self.c_ops = c_ops;
        self
    }

    /// Measurement operators replacing the derived ones.
    pub fn m_ops(mut self, m_ops: &'a [Operator]) -> Self {
        self.m_ops = m_ops;
        self
    }

    pub fn options(mut self, options: StochasticOptions) -> Self {
        self.options = options;
        self
    }

    pub fn integrator_options(mut self, integrator_options: IntegratorOptions) -> Self {
        self.integrator_options = integrator_options;
        self
    }

    /// Use a custom scheme table instead of the built-in one.
    pub fn registry(mut self, registry: Arc<IntegratorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<StochasticSolver> {
        self.options.validate()?;
        if !(self.integrator_options.dt.is_finite() && self.integrator_options.dt > 0.0) {
            return Err(Error::Config(format!(
                "integrator dt must be positive, got {}",
                self.integrator_options.dt
            )));
        }

        let heterodyne = self.options.heterodyne;
        let system = match self.kind {
            SolverKind::MasterEquation => {
                let generator = master_generator(self.h, self.c_ops)?;
                StochasticSystem::open(generator, self.sc_ops, heterodyne)?
            }
            SolverKind::PureState => {
                if !self.c_ops.is_empty() {
                    return Err(Error::Config(
                        "c_ops are not supported by the stochastic Schrödinger equation".into(),
                    ));
                }
                StochasticSystem::closed(self.h.clone(), self.sc_ops, heterodyne)?
            }
        };

        validate_m_ops(self.m_ops, system.dim())?;

        let measure = if self.options.store_measurement {
            MeasurementConfig::new(
                self.sc_ops,
                heterodyne,
                self.m_ops,
                self.options.dw_factor.as_ref(),
            )?
        } else {
            MeasurementConfig::disabled(self.sc_ops.len(), heterodyne)
        };

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(IntegratorRegistry::with_builtin()));
        let factory = registry
            .get(&self.options.method)
            .map_err(|e| Error::Config(e.to_string()))?;

        let store = StoreFlags {
            states: self.options.store_states,
            final_state: self.options.store_final_state,
            normalize: self.options.normalize_output,
        };

        debug!(
            solver = %self.kind,
            dim = system.dim(),
            channels = system.num_channels(),
            measurement_channels = measure.n_channels(),
            "Built stochastic system"
        );

        Ok(StochasticSolver {
            kind: self.kind,
            runner: TrajectoryRunner::new(
                Arc::new(system),
                Arc::new(measure),
                factory,
                self.integrator_options,
                store,
            ),
            options: self.options,
            registry,
        })
    }
}

/// Liouvillian of the master equation, dissipators included.
fn master_generator(h: &Operator, c_ops: &[Operator]) -> Result<Operator> {
    if !(h.is_oper() || h.is_super()) {
        return Err(Error::Type(format!(
            "Hamiltonian must be an operator or a superoperator, got {} of shape {:?}",
            h.kind(),
            h.shape()
        )));
    }
    if h.is_super() {
        let mut l = h.clone();
        for c in c_ops {
            l = l.add(&lindblad_dissipator(c)?)?;
        }
        return Ok(l);
    }
    liouvillian_with_dissipators(h, c_ops)
}

/// Solve the stochastic master equation.
#[allow(clippy::too_many_arguments)]
pub fn smesolve(
    h: &Operator,
    rho0: &QuantumState,
    tlist: &[f64],
    c_ops: &[Operator],
    sc_ops: &[Operator],
    e_ops: &[Operator],
    m_ops: &[Operator],
    ntraj: usize,
    options: StochasticOptions,
) -> Result<EnsembleResult> {
    StochasticSolver::sme(h, c_ops, sc_ops, m_ops, options)?.run(rho0, tlist, ntraj, e_ops)
}

/// Solve the stochastic Schrödinger equation.
#[allow(clippy::too_many_arguments)]
pub fn ssesolve(
    h: &Operator,
    psi0: &QuantumState,
    tlist: &[f64],
    sc_ops: &[Operator],
    e_ops: &[Operator],
    m_ops: &[Operator],
    ntraj: usize,
    options: StochasticOptions,
) -> Result<EnsembleResult> {
    StochasticSolver::sse(h, sc_ops, m_ops, options)?.run(psi0, tlist, ntraj, e_ops)
}
