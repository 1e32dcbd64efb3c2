// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Registry of integration schemes.
//!
//! Maps a method name (the `method` solver option) to a constructor that
//! builds a fresh integrator for one trajectory. The built-in schemes are
//! registered when the registry is created; additional schemes can be
//! registered at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::integrator::{FixedStepIntegrator, Integrator, IntegratorOptions};
use super::schemes::{EulerMaruyama, Platen};
use super::system::StochasticSystem;
use crate::error::{IntegrationError, Result};

/// Builds an integrator bound to a system.
pub type IntegratorFactory =
    Arc<dyn Fn(Arc<StochasticSystem>, &IntegratorOptions) -> Box<dyn Integrator> + Send + Sync>;

/// Scheme used when no `method` is configured.
pub const DEFAULT_METHOD: &str = "platen";

/// Thread-safe table of integration schemes.
///
/// # Example
///
/// ```ignore
/// use qubit_os_stochastic::sode::IntegratorRegistry;
///
/// let registry = IntegratorRegistry::with_builtin();
/// let integrator = registry.build("euler", system, &options)?;
/// ```
pub struct IntegratorRegistry {
    factories: RwLock<HashMap<String, IntegratorFactory>>,
}

impl IntegratorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Registry holding `euler` and `platen`.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register(
            "euler",
            Arc::new(|system, options: &IntegratorOptions| {
                Box::new(FixedStepIntegrator::new(EulerMaruyama, system, options.clone()))
                    as Box<dyn Integrator>
            }),
        );
        registry.register(
            "platen",
            Arc::new(|system, options: &IntegratorOptions| {
                Box::new(FixedStepIntegrator::new(Platen, system, options.clone()))
                    as Box<dyn Integrator>
            }),
        );
        registry
    }

    /// Register a scheme. An existing entry with the same name is replaced.
    pub fn register(&self, name: &str, factory: IntegratorFactory) {
        let mut factories = self.factories.write();
        if factories.insert(name.to_string(), factory).is_some() {
            warn!(method = %name, "Replacing registered integration method");
        } else {
            debug!(method = %name, "Registering integration method");
        }
    }

    /// Remove a scheme.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.factories.write().remove(name).is_some();
        if removed {
            info!(method = %name, "Unregistered integration method");
        }
        removed
    }

    /// Look up a constructor by name.
    pub fn get(&self, name: &str) -> Result<IntegratorFactory> {
        self.factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| IntegrationError::UnknownMethod(name.to_string()).into())
    }

    /// Construct an integrator for `system`.
    pub fn build(
        &self,
        name: &str,
        system: Arc<StochasticSystem>,
        options: &IntegratorOptions,
    ) -> Result<Box<dyn Integrator>> {
        let factory = self.get(name)?;
        Ok(factory(system, options))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IntegratorRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
