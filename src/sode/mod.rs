// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stochastic differential equation machinery.
//!
//! - [`system`]: drift and diffusion of the stochastic master equation
//!   (density matrices) and the stochastic Schrödinger equation (kets)
//! - [`integrator`]: the `set_state` / `integrate` contract and the
//!   fixed-step driver that draws Wiener increments from a seeded generator
//! - [`schemes`]: Euler–Maruyama and Platen update rules
//! - [`registry`]: name → constructor table consulted by the solvers

pub mod integrator;
pub mod registry;
pub mod schemes;
pub mod system;

pub use integrator::{FixedStepIntegrator, Integrator, IntegratorOptions, Scheme, StepOutput};
pub use registry::{IntegratorFactory, IntegratorRegistry, DEFAULT_METHOD};
pub use schemes::{EulerMaruyama, Platen};
pub use system::StochasticSystem;
