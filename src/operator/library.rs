// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Standard operators and basis states.

use ndarray::{Array1, Array2};
use num_complex::Complex64;

const ZERO: Complex64 = Complex64 { re: 0.0, im: 0.0 };
const ONE: Complex64 = Complex64 { re: 1.0, im: 0.0 };

/// Truncated annihilation operator a on `n` Fock levels.
pub fn destroy(n: usize) -> Array2<Complex64> {
    let mut a = Array2::zeros((n, n));
    for k in 1..n {
        a[[k - 1, k]] = Complex64::new((k as f64).sqrt(), 0.0);
    }
    a
}

/// Truncated creation operator a†.
pub fn create(n: usize) -> Array2<Complex64> {
    destroy(n).reversed_axes()
}

/// Number operator a†a.
pub fn number(n: usize) -> Array2<Complex64> {
    let mut m = Array2::zeros((n, n));
    for k in 0..n {
        m[[k, k]] = Complex64::new(k as f64, 0.0);
    }
    m
}

pub fn identity(n: usize) -> Array2<Complex64> {
    Array2::eye(n)
}

pub fn sigmax() -> Array2<Complex64> {
    ndarray::array![[ZERO, ONE], [ONE, ZERO]]
}

pub fn sigmay() -> Array2<Complex64> {
    let i = Complex64::new(0.0, 1.0);
    ndarray::array![[ZERO, -i], [i, ZERO]]
}

pub fn sigmaz() -> Array2<Complex64> {
    ndarray::array![[ONE, ZERO], [ZERO, -ONE]]
}

/// σ⁻ = |0⟩⟨1|, the qubit lowering operator with |0⟩ as ground state.
pub fn sigmam() -> Array2<Complex64> {
    ndarray::array![[ZERO, ONE], [ZERO, ZERO]]
}

/// Basis vector |k⟩ in an `n`-dimensional space.
pub fn basis(n: usize, k: usize) -> Array1<Complex64> {
    let mut v = Array1::zeros(n);
    if k < n {
        v[k] = ONE;
    }
    v
}
