// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared test utilities for solver tests.

use std::sync::Arc;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rand::rngs::StdRng;

use crate::error::{IntegrationError, Result};
use crate::operator::library::sigmam;
use crate::operator::Operator;
use crate::solver::measurement::MeasurementConfig;
use crate::solver::trajectory::{StoreFlags, TrajectoryRunner};
use crate::sode::{
    Integrator, IntegratorFactory, IntegratorOptions, IntegratorRegistry, StepOutput,
    StochasticSystem,
};

/// Integrator that leaves the state untouched and replays scripted noise.
///
/// Each `integrate` call returns a single sub-step whose increments are the
/// next `n_channels` values of the script, cycling when it runs out.
pub struct ScriptedIntegrator {
    n_channels: usize,
    script: Vec<f64>,
    cursor: usize,
    t: f64,
    y: Option<Array1<Complex64>>,
}

impl ScriptedIntegrator {
    pub fn new(n_channels: usize, script: Vec<f64>) -> Self {
        Self {
            n_channels,
            script,
            cursor: 0,
            t: 0.0,
            y: None,
        }
    }

    fn next_value(&mut self) -> f64 {
        if self.script.is_empty() {
            return 0.0;
        }
        let v = self.script[self.cursor % self.script.len()];
        self.cursor += 1;
        v
    }
}

impl Integrator for ScriptedIntegrator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn set_state(&mut self, t0: f64, y0: Array1<Complex64>, _rng: StdRng) {
        self.t = t0;
        self.y = Some(y0);
        self.cursor = 0;
    }

    fn integrate(&mut self, t: f64) -> Result<StepOutput> {
        if self.y.is_none() {
            return Err(IntegrationError::NotInitialized.into());
        }
        if t <= self.t {
            return Err(IntegrationError::InvalidTarget {
                current: self.t,
                requested: t,
            }
            .into());
        }
        let mut noise = Array2::zeros((1, self.n_channels));
        for i in 0..self.n_channels {
            noise[[0, i]] = self.next_value();
        }
        self.t = t;
        let y = self.y.clone().unwrap_or_default();
        Ok((t, y, noise))
    }

    fn state(&self) -> Option<(f64, &Array1<Complex64>)> {
        self.y.as_ref().map(|y| (self.t, y))
    }
}

/// Factory building a [`ScriptedIntegrator`] sized to the system.
pub fn scripted_factory(script: Vec<f64>) -> IntegratorFactory {
    Arc::new(move |system: Arc<StochasticSystem>, _: &IntegratorOptions| {
        Box::new(ScriptedIntegrator::new(system.num_channels(), script.clone()))
            as Box<dyn Integrator>
    })
}

/// Qubit with H = 0 monitored through σ₋ (closed, ket evolution).
pub fn qubit_decay_system(heterodyne: bool) -> StochasticSystem {
    StochasticSystem::closed(
        Operator::new(Array2::zeros((2, 2))),
        &[Operator::new(sigmam())],
        heterodyne,
    )
    .expect("qubit decay system")
}

/// Runner for [`qubit_decay_system`] with homodyne measurement recording.
pub fn decay_runner(method: &str) -> TrajectoryRunner {
    let sc = [Operator::new(sigmam())];
    let measure = MeasurementConfig::new(&sc, false, &[], None).expect("measurement config");
    let factory = IntegratorRegistry::with_builtin()
        .get(method)
        .expect("registered method");
    TrajectoryRunner::new(
        Arc::new(qubit_decay_system(false)),
        Arc::new(measure),
        factory,
        IntegratorOptions { dt: 0.01 },
        StoreFlags::default(),
    )
}
