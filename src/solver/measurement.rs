// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Measurement operators and noise weights.
//!
//! A homodyne detector monitoring collapse operator `c` reports the current
//!
//!   J(t) = ⟨c + c†⟩ + w ξ(t)
//!
//! where ξ is white noise. Heterodyne detection reports both quadratures,
//! `c + c†` and `−i(c − c†)`. The weight `w` (`dW_factor`) defaults to 1 for
//! homodyne and √2 for heterodyne.

use std::f64::consts::SQRT_2;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::operator::Operator;

/// Caller-supplied noise weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DwFactor {
    /// One weight broadcast to every channel
    Scalar(f64),
    /// One weight per stochastic collapse operator
    PerOperator(Vec<f64>),
    /// One weight per measurement channel
    PerChannel(Vec<f64>),
}

/// Default weight for the detection geometry.
pub fn default_weight(heterodyne: bool) -> f64 {
    if heterodyne {
        SQRT_2
    } else {
        1.0
    }
}

/// Resolve `dw_factor` into one weight per measurement channel.
///
/// Per-operator weights are duplicated adjacently under heterodyne so both
/// quadratures of an operator share its weight.
pub fn resolve_dw_factor(
    dw_factor: Option<&DwFactor>,
    n_sc_ops: usize,
    heterodyne: bool,
) -> Result<Vec<f64>> {
    let n_channels = n_sc_ops * if heterodyne { 2 } else { 1 };
    let weights = match dw_factor {
        None => vec![default_weight(heterodyne); n_channels],
        Some(DwFactor::Scalar(w)) => vec![*w; n_channels],
        Some(DwFactor::PerOperator(ws)) => {
            if ws.len() != n_sc_ops {
                return Err(Error::Config(format!(
                    "Bad dw_factor: {} per-operator weights for {} stochastic collapse operators",
                    ws.len(),
                    n_sc_ops
                )));
            }
            if heterodyne {
                ws.iter().flat_map(|w| [*w, *w]).collect()
            } else {
                ws.clone()
            }
        }
        Some(DwFactor::PerChannel(ws)) => ws.clone(),
    };

    if weights.len() != n_channels {
        return Err(Error::Config(format!(
            "Bad dw_factor: resolved {} weights for {} measurement channels",
            weights.len(),
            n_channels
        )));
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite()) {
        return Err(Error::Config(format!("Bad dw_factor: weight {} is not finite", w)));
    }
    Ok(weights)
}

/// Measurement operators paired with their noise weights.
///
/// `operators.len() == weights.len() == n_channels` always holds.
#[derive(Debug, Clone)]
pub struct MeasurementConfig {
    operators: Vec<Operator>,
    weights: Vec<f64>,
    n_sc_ops: usize,
    heterodyne: bool,
}

impl MeasurementConfig {
    /// Derive the measurement operators for `sc_ops`.
    ///
    /// `m_ops` is used verbatim when it has one entry per channel and ignored
    /// when empty. Any other length is a configuration error.
    pub fn new(
        sc_ops: &[Operator],
        heterodyne: bool,
        m_ops: &[Operator],
        dw_factor: Option<&DwFactor>,
    ) -> Result<Self> {
        let n_sc_ops = sc_ops.len();
        let n_channels = n_sc_ops * if heterodyne { 2 } else { 1 };

        let operators = if m_ops.len() == n_channels && !m_ops.is_empty() {
            m_ops.to_vec()
        } else if m_ops.is_empty() {
            derive_operators(sc_ops, heterodyne)?
        } else {
            return Err(Error::Config(format!(
                "m_ops has {} operators, expected {} ({} stochastic collapse operators{})",
                m_ops.len(),
                n_channels,
                n_sc_ops,
                if heterodyne { ", heterodyne" } else { "" }
            )));
        };

        let weights = resolve_dw_factor(dw_factor, n_sc_ops, heterodyne)?;

        Ok(Self {
            operators,
            weights,
            n_sc_ops,
            heterodyne,
        })
    }

    /// Configuration with no channels, used when measurements are not stored.
    pub fn disabled(n_sc_ops: usize, heterodyne: bool) -> Self {
        Self {
            operators: Vec::new(),
            weights: Vec::new(),
            n_sc_ops,
            heterodyne,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.operators.is_empty()
    }

    pub fn n_channels(&self) -> usize {
        self.operators.len()
    }

    pub fn n_sc_ops(&self) -> usize {
        self.n_sc_ops
    }

    pub fn heterodyne(&self) -> bool {
        self.heterodyne
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

/// `c + c†` per operator, plus `−i(c − c†)` under heterodyne.
fn derive_operators(sc_ops: &[Operator], heterodyne: bool) -> Result<Vec<Operator>> {
    let mut operators = Vec::with_capacity(sc_ops.len() * 2);
    for c in sc_ops {
        let c_dag = c.dag();
        operators.push(c.add(&c_dag)?);
        if heterodyne {
            operators.push(c.sub(&c_dag)?.scale(Complex64::new(0.0, -1.0)));
        }
    }
    Ok(operators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::library::{destroy, sigmam, sigmaz};
    use approx::assert_relative_eq;

    fn sc_ops(k: usize) -> Vec<Operator> {
        (0..k).map(|_| Operator::new(destroy(3))).collect()
    }

    fn assert_matrix_eq(op: &Operator, expected: &ndarray::Array2<Complex64>) {
        let m = op.at(0.0);
        for (a, b) in m.iter().zip(expected.iter()) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-12);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    // ==================== Weight resolution ====================

    #[test]
    fn test_default_weights_homodyne() {
        let w = resolve_dw_factor(None, 3, false).unwrap();
        assert_eq!(w, vec![1.0; 3]);
    }

    #[test]
    fn test_default_weights_heterodyne() {
        let w = resolve_dw_factor(None, 2, true).unwrap();
        assert_eq!(w.len(), 4);
        for x in w {
            assert_relative_eq!(x, SQRT_2);
        }
    }

    #[test]
    fn test_scalar_broadcasts_to_all_channels() {
        let w = DwFactor::Scalar(0.5);
        assert_eq!(resolve_dw_factor(Some(&w), 3, false).unwrap(), vec![0.5; 3]);
        assert_eq!(resolve_dw_factor(Some(&w), 3, true).unwrap(), vec![0.5; 6]);
    }

    #[test]
    fn test_per_operator_duplicates_under_heterodyne() {
        let w = DwFactor::PerOperator(vec![1.0, 2.0, 3.0]);
        let resolved = resolve_dw_factor(Some(&w), 3, true).unwrap();
        assert_eq!(resolved.len(), 6);
        for i in 0..3 {
            assert_eq!(resolved[2 * i], resolved[2 * i + 1]);
            assert_eq!(resolved[2 * i], (i + 1) as f64);
        }
    }

    #[test]
    fn test_per_operator_as_is_under_homodyne() {
        let w = DwFactor::PerOperator(vec![1.0, 2.0]);
        assert_eq!(resolve_dw_factor(Some(&w), 2, false).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_per_channel_used_directly() {
        let w = DwFactor::PerChannel(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            resolve_dw_factor(Some(&w), 2, true).unwrap(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_invalid_lengths_rejected() {
        let cases = [
            (DwFactor::PerOperator(vec![1.0]), 2, true),
            (DwFactor::PerOperator(vec![1.0, 2.0, 3.0]), 2, false),
            (DwFactor::PerChannel(vec![1.0, 2.0]), 2, true),
            (DwFactor::PerChannel(vec![1.0]), 2, false),
        ];
        for (w, k, het) in cases {
            assert!(
                matches!(resolve_dw_factor(Some(&w), k, het), Err(Error::Config(_))),
                "{:?} with k={} heterodyne={} should fail",
                w,
                k,
                het
            );
        }
    }

    #[test]
    fn test_non_finite_weight_rejected() {
        let w = DwFactor::Scalar(f64::NAN);
        assert!(matches!(resolve_dw_factor(Some(&w), 1, false), Err(Error::Config(_))));
    }

    #[test]
    fn test_dw_factor_yaml_tags() {
        let parse = |text: &str| -> DwFactor {
            serde_yaml::with::singleton_map::deserialize(serde_yaml::Deserializer::from_str(text))
                .unwrap()
        };
        assert_eq!(parse("per_operator: [1.0, 2.0]"), DwFactor::PerOperator(vec![1.0, 2.0]));
        assert_eq!(parse("scalar: 0.5"), DwFactor::Scalar(0.5));
        assert_eq!(parse("per_channel: [1.0]"), DwFactor::PerChannel(vec![1.0]));
    }

    // ==================== Measurement operators ====================

    #[test]
    fn test_homodyne_operator_count() {
        for k in 0..4 {
            let cfg = MeasurementConfig::new(&sc_ops(k), false, &[], None).unwrap();
            assert_eq!(cfg.n_channels(), k);
            assert_eq!(cfg.weights().len(), k);
        }
    }

    #[test]
    fn test_heterodyne_operators_alternate_quadratures() {
        let a = destroy(3);
        let a_dag = a.t().mapv(|z| z.conj());
        let cfg = MeasurementConfig::new(&sc_ops(2), true, &[], None).unwrap();
        assert_eq!(cfg.n_channels(), 4);

        let x = &a + &a_dag;
        let p = (&a - &a_dag).mapv(|z| z * Complex64::new(0.0, -1.0));
        for i in 0..2 {
            assert_matrix_eq(&cfg.operators()[2 * i], &x);
            assert_matrix_eq(&cfg.operators()[2 * i + 1], &p);
        }
    }

    #[test]
    fn test_heterodyne_quadratures_follow_input_order() {
        let ops = vec![Operator::new(sigmam()), Operator::new(sigmaz())];
        let cfg = MeasurementConfig::new(&ops, true, &[], None).unwrap();
        // σz is hermitian, so its second quadrature vanishes
        assert_matrix_eq(&cfg.operators()[2], &(sigmaz() * Complex64::new(2.0, 0.0)));
        assert_matrix_eq(&cfg.operators()[3], &ndarray::Array2::zeros((2, 2)));
    }

    #[test]
    fn test_verbatim_m_ops_keep_default_weight() {
        let m_ops = vec![Operator::new(sigmaz()), Operator::new(sigmaz())];
        let cfg = MeasurementConfig::new(&[Operator::new(sigmam())], true, &m_ops, None).unwrap();
        assert_matrix_eq(&cfg.operators()[0], &sigmaz());
        assert_relative_eq!(cfg.weights()[1], SQRT_2);
    }

    #[test]
    fn test_wrong_length_m_ops_rejected() {
        let m_ops = vec![Operator::new(sigmaz())];
        let result = MeasurementConfig::new(&sc_ops(2), false, &m_ops, None);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_dw_factor_fails_construction() {
        let w = DwFactor::PerChannel(vec![1.0; 3]);
        let result = MeasurementConfig::new(&sc_ops(2), false, &[], Some(&w));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_disabled_has_no_channels() {
        let cfg = MeasurementConfig::disabled(2, true);
        assert!(!cfg.is_enabled());
        assert_eq!(cfg.n_channels(), 0);
        assert_eq!(cfg.n_sc_ops(), 2);
    }
}
