// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management for the stochastic solver CLI.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. stochastic.yaml file
//! 3. Environment variables (QUBITOS_STO_*)
//! 4. CLI arguments

use std::env;
use std::f64::consts::FRAC_1_SQRT_2;
use std::path::Path;

use ndarray::Array1;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::operator::library::{basis, create, destroy, number};
use crate::operator::{Operator, QuantumState};
use crate::solver::{MapKind, StochasticOptions};
use crate::sode::{IntegratorOptions, IntegratorRegistry};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Solver options
    #[serde(default)]
    pub solver: StochasticOptions,

    /// Integrator settings
    #[serde(default)]
    pub integrator: IntegratorOptions,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// System simulated by `run`
    #[serde(default)]
    pub system: SystemConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                config = serde_yaml::from_str(&content)?;
            }
        } else {
            for path in &["stochastic.yaml", "stochastic.yml"] {
                let path = Path::new(path);
                if path.exists() {
                    let content = std::fs::read_to_string(path)?;
                    config = serde_yaml::from_str(&content)?;
                    break;
                }
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("QUBITOS_STO_NTRAJ") {
            if let Ok(n) = val.parse() {
                self.solver.ntraj = n;
            }
        }
        if let Ok(val) = env::var("QUBITOS_STO_SEED") {
            if let Ok(seed) = val.parse() {
                self.solver.seed = Some(seed);
            }
        }
        if let Ok(val) = env::var("QUBITOS_STO_METHOD") {
            self.solver.method = val;
        }
        if let Ok(val) = env::var("QUBITOS_STO_MAP") {
            match val.to_lowercase().as_str() {
                "serial" => self.solver.map = MapKind::Serial,
                "parallel" => self.solver.map = MapKind::Parallel,
                _ => {}
            }
        }
        if let Ok(val) = env::var("QUBITOS_STO_NUM_CPUS") {
            if let Ok(n) = val.parse() {
                self.solver.num_cpus = Some(n);
            }
        }
        if let Ok(val) = env::var("QUBITOS_STO_HETERODYNE") {
            self.solver.heterodyne = parse_flag(&val);
        }
        if let Ok(val) = env::var("QUBITOS_STO_STORE_MEASUREMENT") {
            self.solver.store_measurement = parse_flag(&val);
        }
        if let Ok(val) = env::var("QUBITOS_STO_DT") {
            if let Ok(dt) = val.parse() {
                self.integrator.dt = dt;
            }
        }
        if let Ok(val) = env::var("QUBITOS_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.solver.validate()?;
        if !IntegratorRegistry::with_builtin().contains(&self.solver.method) {
            return Err(Error::Config(format!(
                "unknown integration method '{}'",
                self.solver.method
            )));
        }
        if !(self.integrator.dt.is_finite() && self.integrator.dt > 0.0) {
            return Err(Error::Config(format!(
                "integrator dt must be positive, got {}",
                self.integrator.dt
            )));
        }
        self.system.validate()
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

/// Equation integrated by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Equation {
    /// Stochastic master equation
    #[default]
    Sme,
    /// Stochastic Schrödinger equation
    Sse,
}

/// Driven, damped oscillator under continuous measurement.
///
/// H = ω a†a + ε (a + a†), monitored through √κ a. An additional
/// unmonitored loss √γ a is included for the master equation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub equation: Equation,

    /// Fock-space truncation
    #[serde(default = "default_levels")]
    pub levels: usize,

    /// Oscillator frequency ω
    #[serde(default = "default_omega")]
    pub omega: f64,

    /// Drive amplitude ε
    #[serde(default = "default_drive")]
    pub drive: f64,

    /// Measurement rate κ
    #[serde(default = "default_kappa")]
    pub kappa: f64,

    /// Unmonitored loss rate γ
    #[serde(default)]
    pub gamma: f64,

    /// Initial Fock state
    #[serde(default)]
    pub initial_fock: usize,

    /// Final time of the grid
    #[serde(default = "default_t_end")]
    pub t_end: f64,

    /// Points in the time grid, including t = 0
    #[serde(default = "default_num_times")]
    pub num_times: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            equation: Equation::default(),
            levels: default_levels(),
            omega: default_omega(),
            drive: default_drive(),
            kappa: default_kappa(),
            gamma: 0.0,
            initial_fock: 0,
            t_end: default_t_end(),
            num_times: default_num_times(),
        }
    }
}

fn default_levels() -> usize {
    10
}

fn default_omega() -> f64 {
    1.0
}

fn default_drive() -> f64 {
    0.5
}

fn default_kappa() -> f64 {
    0.5
}

fn default_t_end() -> f64 {
    5.0
}

fn default_num_times() -> usize {
    101
}

impl SystemConfig {
    pub fn validate(&self) -> Result<()> {
        if self.levels < 2 {
            return Err(Error::Config("system.levels must be at least 2".into()));
        }
        if self.initial_fock >= self.levels {
            return Err(Error::Config(format!(
                "system.initial_fock {} outside truncation {}",
                self.initial_fock, self.levels
            )));
        }
        if !(self.kappa >= 0.0 && self.gamma >= 0.0) {
            return Err(Error::Config("system rates must be non-negative".into()));
        }
        if !(self.t_end.is_finite() && self.t_end > 0.0) {
            return Err(Error::Config("system.t_end must be positive".into()));
        }
        if self.num_times < 2 {
            return Err(Error::Config("system.num_times must be at least 2".into()));
        }
        if self.equation == Equation::Sse && self.gamma > 0.0 {
            return Err(Error::Config(
                "system.gamma requires the master equation (equation: sme)".into(),
            ));
        }
        Ok(())
    }

    pub fn hamiltonian(&self) -> Operator {
        let n = self.levels;
        let drive = (destroy(n) + create(n)).mapv(|z| z * self.drive);
        Operator::new(number(n).mapv(|z| z * self.omega) + drive)
    }

    /// Monitored collapse operators.
    pub fn sc_ops(&self) -> Vec<Operator> {
        vec![scaled_destroy(self.levels, self.kappa)]
    }

    /// Unmonitored collapse operators.
    pub fn c_ops(&self) -> Vec<Operator> {
        if self.gamma > 0.0 {
            vec![scaled_destroy(self.levels, self.gamma)]
        } else {
            Vec::new()
        }
    }

    /// Observables: photon number and the x quadrature (a + a†)/√2.
    pub fn e_ops(&self) -> Vec<Operator> {
        let n = self.levels;
        vec![
            Operator::new(number(n)),
            Operator::new((destroy(n) + create(n)).mapv(|z| z * FRAC_1_SQRT_2)),
        ]
    }

    pub fn initial_state(&self) -> QuantumState {
        QuantumState::Ket(basis(self.levels, self.initial_fock))
    }

    pub fn times(&self) -> Vec<f64> {
        Array1::linspace(0.0, self.t_end, self.num_times).to_vec()
    }
}

/// √rate · a
fn scaled_destroy(levels: usize, rate: f64) -> Operator {
    Operator::new(destroy(levels)).scale(Complex64::new(rate.sqrt(), 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::DwFactor;
    use approx::assert_relative_eq;
    use std::io::Write as _;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.solver.method, "platen");
        assert_eq!(config.solver.ntraj, 100);
        assert_relative_eq!(config.integrator.dt, 1e-3);
        assert_eq!(config.system.equation, Equation::Sme);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad = Config::default();
        bad.integrator.dt = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = Config::default();
        bad.solver.method = "milstein".into();
        let msg = format!("{}", bad.validate().unwrap_err());
        assert!(msg.contains("milstein"));

        let mut bad = Config::default();
        bad.system.initial_fock = 10;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_sse_rejects_unmonitored_loss() {
        let mut config = Config::default();
        config.system.equation = Equation::Sse;
        config.system.gamma = 0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
solver:
  heterodyne: true
  store_measurement: true
  dw_factor:
    scalar: 0.5
  ntraj: 20
integrator:
  dt: 0.01
system:
  equation: sse
  levels: 4
"#
        )
        .unwrap();

        let config = Config::load(Some(f.path())).unwrap();
        assert!(config.solver.heterodyne);
        assert_eq!(config.solver.dw_factor, Some(DwFactor::Scalar(0.5)));
        assert_eq!(config.solver.ntraj, 20);
        assert_relative_eq!(config.integrator.dt, 0.01);
        assert_eq!(config.system.equation, Equation::Sse);
        assert_eq!(config.system.levels, 4);
        assert_eq!(config.system.num_times, 101);
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let path = std::path::Path::new("/tmp/does_not_exist_qubitos_sto_test.yaml");
        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.solver.method, "platen");
    }

    #[test]
    fn test_config_load_invalid_yaml() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "{{{{not: valid: yaml::::").unwrap();

        let result = Config::load(Some(f.path()));
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_env_override_solver() {
        let mut config = Config::default();
        std::env::set_var("QUBITOS_STO_NTRAJ", "7");
        std::env::set_var("QUBITOS_STO_SEED", "42");
        std::env::set_var("QUBITOS_STO_MAP", "Parallel");
        config.apply_env_overrides();
        assert_eq!(config.solver.ntraj, 7);
        assert_eq!(config.solver.seed, Some(42));
        assert_eq!(config.solver.map, MapKind::Parallel);
        std::env::remove_var("QUBITOS_STO_NTRAJ");
        std::env::remove_var("QUBITOS_STO_SEED");
        std::env::remove_var("QUBITOS_STO_MAP");
    }

    #[test]
    fn test_env_override_flags() {
        let mut config = Config::default();
        std::env::set_var("QUBITOS_STO_HETERODYNE", "1");
        std::env::set_var("QUBITOS_STO_STORE_MEASUREMENT", "true");
        config.apply_env_overrides();
        assert!(config.solver.heterodyne);
        assert!(config.solver.store_measurement);
        std::env::remove_var("QUBITOS_STO_HETERODYNE");
        std::env::remove_var("QUBITOS_STO_STORE_MEASUREMENT");
    }

    #[test]
    fn test_env_override_dt() {
        let mut config = Config::default();
        std::env::set_var("QUBITOS_STO_DT", "0.002");
        config.apply_env_overrides();
        assert_relative_eq!(config.integrator.dt, 0.002);
        std::env::remove_var("QUBITOS_STO_DT");
    }

    #[test]
    fn test_env_override_log_level() {
        let mut config = Config::default();
        std::env::set_var("QUBITOS_LOG_LEVEL", "debug");
        config.apply_env_overrides();
        assert_eq!(config.logging.level, "debug");
        std::env::remove_var("QUBITOS_LOG_LEVEL");
    }

    #[test]
    fn test_system_operators() {
        let system = SystemConfig {
            levels: 3,
            kappa: 4.0,
            gamma: 1.0,
            ..SystemConfig::default()
        };
        let h = system.hamiltonian();
        assert_eq!(h.shape(), (3, 3));
        // ⟨1|H|1⟩ = ω
        assert_relative_eq!(h.at(0.0)[[1, 1]].re, 1.0);
        assert_relative_eq!(h.at(0.0)[[0, 1]].re, 0.5);
        // √κ a: ⟨0|c|1⟩ = 2
        assert_relative_eq!(system.sc_ops()[0].at(0.0)[[0, 1]].re, 2.0);
        assert_eq!(system.c_ops().len(), 1);
        assert_eq!(system.e_ops().len(), 2);
    }

    #[test]
    fn test_system_times() {
        let system = SystemConfig {
            t_end: 1.0,
            num_times: 5,
            ..SystemConfig::default()
        };
        let times = system.times();
        assert_eq!(times.len(), 5);
        assert_relative_eq!(times[1], 0.25);
        assert_relative_eq!(times[4], 1.0);
    }
}
