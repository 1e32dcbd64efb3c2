// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Multi-trajectory map.
//!
//! Trajectories are independent, so they are mapped serially or over a rayon
//! pool and folded into a shared [`EnsembleResult`] behind a mutex as they
//! complete. Timeout and cancellation are checked before a trajectory starts;
//! a trajectory that has started always runs to completion.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::ensemble::EnsembleResult;
use super::options::{FailurePolicy, MapKind, StochasticOptions};
use super::trajectory::TrajectoryResult;
use crate::error::{Error, Result};

/// Shareable flag that stops a run from starting further trajectories.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Scheduling knobs taken from [`StochasticOptions`].
#[derive(Debug, Clone)]
pub struct MapOptions {
    pub kind: MapKind,
    pub num_cpus: Option<usize>,
    pub timeout: Option<Duration>,
    pub on_failure: FailurePolicy,
    pub progress: bool,
    pub progress_chunk: usize,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self::from(&StochasticOptions::default())
    }
}

impl From<&StochasticOptions> for MapOptions {
    fn from(opts: &StochasticOptions) -> Self {
        Self {
            kind: opts.map,
            num_cpus: opts.num_cpus,
            timeout: opts.job_timeout_sec.map(Duration::from_secs_f64),
            on_failure: opts.on_failure,
            progress: opts.progress,
            progress_chunk: opts.progress_chunk.max(1),
        }
    }
}

/// Expand a base seed into one seed per trajectory.
///
/// Without a base seed the generator is seeded from OS entropy.
pub fn derive_seeds(base: Option<u64>, n: usize) -> Vec<u64> {
    let mut rng = match base {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    (0..n).map(|_| rng.gen()).collect()
}

/// Why a run stopped starting trajectories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Timeout = 1,
    Cancelled = 2,
    Aborted = 3,
}

struct MapState {
    ensemble: Mutex<EnsembleResult>,
    first_error: Mutex<Option<Error>>,
    stop: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    discarded: AtomicUsize,
    deadline: Option<Instant>,
}

impl MapState {
    fn stopped(&self, cancel: &CancelToken) -> Option<Stop> {
        match self.stop.load(Ordering::SeqCst) {
            1 => return Some(Stop::Timeout),
            2 => return Some(Stop::Cancelled),
            3 => return Some(Stop::Aborted),
            _ => {}
        }
        if cancel.is_cancelled() {
            self.set_stop(Stop::Cancelled);
            return Some(Stop::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.set_stop(Stop::Timeout);
            return Some(Stop::Timeout);
        }
        None
    }

    fn set_stop(&self, reason: Stop) {
        let _ = self
            .stop
            .compare_exchange(0, reason as usize, Ordering::SeqCst, Ordering::SeqCst);
    }
}

/// Run `task` once per seed and fold every completed trajectory into
/// `ensemble`.
///
/// Under [`FailurePolicy::Abort`] the first error is returned once in-flight
/// trajectories have finished. Under [`FailurePolicy::Skip`] failures are
/// logged and counted in the run statistics.
pub fn run_trajectories<F>(
    seeds: &[u64],
    task: F,
    ensemble: EnsembleResult,
    opts: &MapOptions,
    cancel: &CancelToken,
) -> Result<EnsembleResult>
where
    F: Fn(u64) -> Result<(u64, TrajectoryResult)> + Sync,
{
    let start = Instant::now();
    let total = seeds.len();
    let state = MapState {
        ensemble: Mutex::new(ensemble),
        first_error: Mutex::new(None),
        stop: AtomicUsize::new(0),
        completed: AtomicUsize::new(0),
        failed: AtomicUsize::new(0),
        discarded: AtomicUsize::new(0),
        deadline: opts.timeout.map(|t| start + t),
    };

    info!(
        trajectories = total,
        map = ?opts.kind,
        num_cpus = ?opts.num_cpus,
        "Starting trajectories"
    );

    let one = |seed: u64| {
        if state.stopped(cancel).is_some() {
            state.discarded.fetch_add(1, Ordering::SeqCst);
            return;
        }
        let outcome = task(seed).and_then(|(seed, traj)| state.ensemble.lock().reduce(seed, traj));
        match outcome {
            Ok(()) => {
                let done = state.completed.fetch_add(1, Ordering::SeqCst) + 1;
                if opts.progress && (done % opts.progress_chunk == 0 || done == total) {
                    info!(
                        completed = done,
                        total,
                        elapsed_sec = start.elapsed().as_secs_f64(),
                        "Trajectory progress"
                    );
                }
            }
            Err(e) => match opts.on_failure {
                FailurePolicy::Skip => {
                    state.failed.fetch_add(1, Ordering::SeqCst);
                    warn!(seed, error = %e, "Trajectory failed, skipping");
                }
                FailurePolicy::Abort => {
                    warn!(seed, error = %e, "Trajectory failed, aborting run");
                    state.failed.fetch_add(1, Ordering::SeqCst);
                    let mut first = state.first_error.lock();
                    if first.is_none() {
                        *first = Some(e);
                    }
                    state.set_stop(Stop::Aborted);
                }
            },
        }
    };

    match opts.kind {
        MapKind::Serial => seeds.iter().for_each(|&seed| one(seed)),
        MapKind::Parallel => match opts.num_cpus {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| Error::Config(format!("Failed to build thread pool: {}", e)))?;
                pool.install(|| seeds.par_iter().for_each(|&seed| one(seed)));
            }
            None => seeds.par_iter().for_each(|&seed| one(seed)),
        },
    }

    if let Some(e) = state.first_error.into_inner() {
        return Err(e);
    }

    let stop = match state.stop.load(Ordering::SeqCst) {
        1 => Some(Stop::Timeout),
        2 => Some(Stop::Cancelled),
        _ => None,
    };
    let mut ensemble = state.ensemble.into_inner();
    let stats = &mut ensemble.stats;
    stats.num_failed = state.failed.load(Ordering::SeqCst);
    stats.num_discarded = state.discarded.load(Ordering::SeqCst);
    stats.timed_out = stop == Some(Stop::Timeout);
    stats.cancelled = stop == Some(Stop::Cancelled);
    stats.run_time = start.elapsed();

    match stop {
        Some(Stop::Timeout) => warn!(
            completed = stats.num_trajectories,
            discarded = stats.num_discarded,
            "Job timeout reached"
        ),
        Some(Stop::Cancelled) => warn!(
            completed = stats.num_trajectories,
            discarded = stats.num_discarded,
            "Run cancelled"
        ),
        _ => {}
    }
    debug!(run_time_sec = stats.run_time.as_secs_f64(), "Trajectories finished");

    Ok(ensemble)
}
