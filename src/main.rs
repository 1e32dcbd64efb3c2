// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! QubitOS stochastic solver CLI
//!
//! Runs a continuously monitored, driven and damped oscillator through the
//! multi-trajectory stochastic solvers and prints a YAML summary.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! qubit-os-sto run
//!
//! # Run 500 heterodyne trajectories from a config file
//! qubit-os-sto run --config /path/to/stochastic.yaml --ntraj 500 --heterodyne
//!
//! # List integration schemes
//! qubit-os-sto integrators
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qubit_os_stochastic::config::{Config, Equation};
use qubit_os_stochastic::solver::{
    DwFactor, EnsembleResult, MapKind, RunStats, SolverKind, StochasticSolver,
};
use qubit_os_stochastic::sode::{IntegratorRegistry, DEFAULT_METHOD};
use qubit_os_stochastic::{Result, VERSION};

/// QubitOS stochastic solver
#[derive(Parser)]
#[command(name = "qubit-os-sto")]
#[command(author = "QubitOS Contributors")]
#[command(version = VERSION)]
#[command(about = "Multi-trajectory stochastic master and Schrödinger equation solver")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured system
    Run {
        /// Number of trajectories
        #[arg(short, long)]
        ntraj: Option<usize>,

        /// Base seed
        #[arg(long)]
        seed: Option<u64>,

        /// Integration scheme
        #[arg(short, long)]
        method: Option<String>,

        /// Heterodyne instead of homodyne detection
        #[arg(long)]
        heterodyne: bool,

        /// Record the measurement current
        #[arg(long)]
        store_measurement: bool,

        /// Scalar noise weight of the measurement current
        #[arg(long)]
        dw_factor: Option<f64>,

        /// Run trajectories on a rayon pool
        #[arg(long)]
        parallel: bool,

        /// Summary format (yaml, json)
        #[arg(long, default_value = "yaml")]
        output: String,
    },

    /// List available integration schemes
    Integrators,

    /// Show effective configuration
    Config,

    /// Validate configuration file
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging.level, &config.logging.format);

    match cli.command {
        Commands::Run {
            ntraj,
            seed,
            method,
            heterodyne,
            store_measurement,
            dw_factor,
            parallel,
            output,
        } => {
            if let Some(n) = ntraj {
                config.solver.ntraj = n;
            }
            if seed.is_some() {
                config.solver.seed = seed;
            }
            if let Some(m) = method {
                config.solver.method = m;
            }
            if heterodyne {
                config.solver.heterodyne = true;
            }
            if store_measurement {
                config.solver.store_measurement = true;
            }
            if let Some(w) = dw_factor {
                config.solver.dw_factor = Some(DwFactor::Scalar(w));
            }
            if parallel {
                config.solver.map = MapKind::Parallel;
            }

            config.validate()?;

            info!(
                version = VERSION,
                equation = ?config.system.equation,
                levels = config.system.levels,
                ntraj = config.solver.ntraj,
                "Starting stochastic run"
            );

            let summary = run(&config)?;
            match output.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
                _ => println!("{}", serde_yaml::to_string(&summary)?),
            }
        }

        Commands::Integrators => {
            let registry = IntegratorRegistry::with_builtin();

            println!("Available integrators:");
            for name in registry.list() {
                let default_marker = if name == DEFAULT_METHOD {
                    " (default)"
                } else {
                    ""
                };
                println!("  {}{}", name, default_marker);
            }
        }

        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config)?);
        }

        Commands::Validate => match config.validate() {
            Ok(()) => {
                println!("Configuration is valid");
            }
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

/// Initialize logging with tracing.
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        "json" => registry.with(fmt::layer().json().with_target(true)).init(),
        "compact" => registry.with(fmt::layer().compact().with_target(true)).init(),
        _ => registry.with(fmt::layer().with_target(true)).init(),
    }
}

/// Build the configured solver and run it.
fn run(config: &Config) -> Result<RunSummary> {
    let system = &config.system;
    let h = system.hamiltonian();
    let sc_ops = system.sc_ops();
    let c_ops = system.c_ops();
    let e_ops = system.e_ops();

    let kind = match system.equation {
        Equation::Sme => SolverKind::MasterEquation,
        Equation::Sse => SolverKind::PureState,
    };

    let solver = StochasticSolver::builder(kind, &h, &sc_ops)
        .c_ops(&c_ops)
        .options(config.solver.clone())
        .integrator_options(config.integrator.clone())
        .registry(Arc::new(IntegratorRegistry::with_builtin()))
        .build()?;

    let result = solver.run(
        &system.initial_state(),
        &system.times(),
        config.solver.ntraj,
        &e_ops,
    )?;

    Ok(RunSummary::new(kind, &config.solver.method, &result))
}

/// Printed result of a run.
#[derive(Serialize)]
struct RunSummary {
    solver: &'static str,
    method: String,
    stats: RunStats,
    t_end: f64,
    num_times: usize,
    expect: Vec<ObservableSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    measurement: Option<MeasurementSummary>,
}

#[derive(Serialize)]
struct ObservableSummary {
    name: &'static str,
    final_mean: f64,
    final_std: f64,
}

#[derive(Serialize)]
struct MeasurementSummary {
    channels: usize,
    steps: usize,
    /// Time-averaged ensemble current per channel
    mean_current: Vec<f64>,
}

impl RunSummary {
    fn new(kind: SolverKind, method: &str, result: &EnsembleResult) -> Self {
        const NAMES: [&str; 2] = ["photon_number", "x_quadrature"];

        let average = result.average_expect();
        let std = result.std_expect();
        let last = average.ncols().saturating_sub(1);
        let expect = NAMES
            .iter()
            .enumerate()
            .take(average.nrows())
            .map(|(i, &name)| ObservableSummary {
                name,
                final_mean: average[[i, last]],
                final_std: std[[i, last]],
            })
            .collect();

        let measurement = result.average_measurement().map(|m| MeasurementSummary {
            channels: m.nrows(),
            steps: m.ncols(),
            mean_current: m.rows().into_iter().map(|row| row.mean().unwrap_or(0.0)).collect(),
        });

        Self {
            solver: kind.name(),
            method: method.to_string(),
            stats: result.stats.clone(),
            t_end: result.times().last().copied().unwrap_or(0.0),
            num_times: result.times().len(),
            expect,
            measurement,
        }
    }
}
