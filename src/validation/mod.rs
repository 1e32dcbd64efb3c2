// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Input validation for solver runs.

use crate::error::{Error, Result, ValidationError};
use crate::operator::{Operator, QuantumState};
use crate::sode::StochasticSystem;

/// Validate a time grid: at least two finite, strictly increasing points.
pub fn validate_time_grid(times: &[f64]) -> Result<()> {
    if times.len() < 2 {
        return Err(ValidationError::TimeGrid(format!(
            "need an initial time and at least one step, got {} points",
            times.len()
        ))
        .into());
    }

    for (i, t) in times.iter().enumerate() {
        if t.is_nan() {
            return Err(ValidationError::TimeGrid(format!("contains NaN at index {}", i)).into());
        }
        if t.is_infinite() {
            return Err(ValidationError::TimeGrid(format!("contains Inf at index {}", i)).into());
        }
    }

    if let Some(i) = times.windows(2).position(|w| w[1] <= w[0]) {
        return Err(ValidationError::TimeGrid(format!(
            "not strictly increasing at index {} ({} -> {})",
            i + 1,
            times[i],
            times[i + 1]
        ))
        .into());
    }

    Ok(())
}

/// Validate that an initial state fits the system.
///
/// The master equation accepts kets and density matrices, the Schrödinger
/// equation kets only.
pub fn validate_initial_state(system: &StochasticSystem, state: &QuantumState) -> Result<()> {
    if state.dim() != system.dim() {
        return Err(ValidationError::Dimension {
            what: "initial state".into(),
            expected: system.dim(),
            actual: state.dim(),
        }
        .into());
    }

    match state {
        QuantumState::DensityMatrix(rho) => {
            if !system.is_open() {
                return Err(Error::Type(
                    "stochastic Schrödinger equation requires a ket initial state".into(),
                ));
            }
            if rho.ncols() != rho.nrows() {
                return Err(ValidationError::Shape(format!(
                    "density matrix must be square, got {:?}",
                    rho.dim()
                ))
                .into());
            }
            if rho.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
                return Err(ValidationError::Field {
                    field: "initial_state".into(),
                    message: "contains non-finite entries".into(),
                }
                .into());
            }
        }
        QuantumState::Ket(psi) => {
            let norm: f64 = psi.iter().map(|z| z.norm_sqr()).sum();
            if !norm.is_finite() || norm == 0.0 {
                return Err(ValidationError::Field {
                    field: "initial_state".into(),
                    message: format!("ket norm must be finite and non-zero, got {}", norm),
                }
                .into());
            }
        }
    }

    Ok(())
}

/// Validate observables: square operators of the system dimension.
pub fn validate_e_ops(e_ops: &[Operator], dim: usize) -> Result<()> {
    for (i, op) in e_ops.iter().enumerate() {
        if !op.is_oper() {
            return Err(Error::Type(format!(
                "e_ops[{}] must be an operator, got {} of shape {:?}",
                i,
                op.kind(),
                op.shape()
            )));
        }
        if op.shape().0 != dim {
            return Err(ValidationError::Dimension {
                what: format!("e_ops[{}]", i),
                expected: dim,
                actual: op.shape().0,
            }
            .into());
        }
    }
    Ok(())
}

/// Validate measurement operators: square operators of the system dimension.
///
/// Any mismatch is a type error, raised before a trajectory is run.
pub fn validate_m_ops(m_ops: &[Operator], dim: usize) -> Result<()> {
    for (i, op) in m_ops.iter().enumerate() {
        if !op.is_oper() || op.shape().0 != dim {
            return Err(Error::Type(format!(
                "m_ops[{}] must be a {}x{} operator, got {} of shape {:?}",
                i,
                dim,
                dim,
                op.kind(),
                op.shape()
            )));
        }
    }
    Ok(())
}
