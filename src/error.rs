// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the stochastic solver.

use std::fmt;

/// Result type alias for solver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Solver error types.
#[derive(Debug)]
pub enum Error {
    /// Configuration error (inconsistent measurement setup, bad options)
    Config(String),
    /// Operator type error (wrong operator kind or shape)
    Type(String),
    /// Validation error
    Validation(ValidationError),
    /// Numerical failure raised by an integrator
    Integration(IntegrationError),
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Type(msg) => write!(f, "Type error: {}", msg),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Integration(e) => write!(f, "Integration error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Validation(e) => Some(e),
            Error::Integration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<IntegrationError> for Error {
    fn from(e: IntegrationError) -> Self {
        Error::Integration(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(e: ndarray::ShapeError) -> Self {
        Error::Validation(ValidationError::Shape(e.to_string()))
    }
}

/// Numerical failures reported by an SDE integrator.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationError {
    /// The state left the representable range
    NonFinite { t: f64 },
    /// The scheme detected a blow-up it cannot recover from
    Diverged { t: f64, reason: String },
    /// Requested time lies before the integrator's current time
    InvalidTarget { current: f64, requested: f64 },
    /// `integrate` called before `set_state`
    NotInitialized,
    /// No integration scheme registered under this name
    UnknownMethod(String),
}

impl fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrationError::NonFinite { t } => {
                write!(f, "State became non-finite at t={}", t)
            }
            IntegrationError::Diverged { t, reason } => {
                write!(f, "Integration diverged at t={}: {}", t, reason)
            }
            IntegrationError::InvalidTarget { current, requested } => {
                write!(
                    f,
                    "Cannot integrate backwards: current t={}, requested t={}",
                    current, requested
                )
            }
            IntegrationError::NotInitialized => {
                write!(f, "Integrator state was never set")
            }
            IntegrationError::UnknownMethod(name) => {
                write!(f, "Unknown integration method: {}", name)
            }
        }
    }
}

impl std::error::Error for IntegrationError {}

/// Validation errors.
#[derive(Debug)]
pub enum ValidationError {
    /// Field validation failed
    Field { field: String, message: String },
    /// Time grid is unusable
    TimeGrid(String),
    /// Array shape mismatch
    Shape(String),
    /// Dimension mismatch between a state/operator and the system
    Dimension {
        what: String,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Field { field, message } => {
                write!(f, "Field '{}': {}", field, message)
            }
            ValidationError::TimeGrid(msg) => write!(f, "Invalid time grid: {}", msg),
            ValidationError::Shape(msg) => write!(f, "Shape mismatch: {}", msg),
            ValidationError::Dimension {
                what,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Dimension mismatch for {}: expected {}, got {}",
                    what, expected, actual
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}
