//! Dense Cholesky factors for the squared-hyperplane system.
//!
//! A squared-hyperplane term minimizes
//!
//! ```text
//! w·(cᵀx − k)² + ρ/2·‖x − a‖²
//! ```
//!
//! whose stationarity condition is `(2w·ccᵀ + ρI)·x = ρa + 2w·c·k`. The matrix
//! depends only on `(c, w, ρ)`, never on the consensus state, so every
//! grounding of one template with the same coefficients shares a single
//! factorization. [`FactorCache`] holds those factors for the lifetime of a
//! reasoner.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};

/// Lower-triangular `L` with `LLᵀ = M`, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    size: usize,
    lower: Vec<f64>,
}

impl CholeskyFactor {
    /// Factor a symmetric positive definite matrix given row-major.
    pub fn factor(matrix: &[f64], size: usize) -> Result<Self> {
        debug_assert_eq!(matrix.len(), size * size);

        let mut lower = vec![0.0; size * size];
        for i in 0..size {
            for j in 0..=i {
                let mut sum = matrix[i * size + j];
                for p in 0..j {
                    sum -= lower[i * size + p] * lower[j * size + p];
                }
                if i == j {
                    if sum <= 0.0 || !sum.is_finite() {
                        return Err(Error::NotPositiveDefinite { size });
                    }
                    lower[i * size + i] = sum.sqrt();
                } else {
                    lower[i * size + j] = sum / lower[j * size + j];
                }
            }
        }

        Ok(Self { size, lower })
    }

    /// Factor `2w·ccᵀ + ρI`.
    pub fn squared_hyperplane(coefficients: &[f64], weight: f64, step_size: f64) -> Result<Self> {
        let n = coefficients.len();
        let mut matrix = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                matrix[i * n + j] = 2.0 * weight * coefficients[i] * coefficients[j];
            }
            matrix[i * n + i] += step_size;
        }
        Self::factor(&matrix, n)
    }

    /// Dimension of the factored matrix.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Solve `LLᵀx = rhs` into `out`.
    pub fn solve(&self, rhs: &[f64], out: &mut [f64]) {
        debug_assert_eq!(rhs.len(), self.size);
        debug_assert_eq!(out.len(), self.size);
        let n = self.size;

        // Ly = rhs
        for i in 0..n {
            let mut v = rhs[i];
            for j in 0..i {
                v -= self.lower[i * n + j] * out[j];
            }
            out[i] = v / self.lower[i * n + i];
        }

        // Lᵀx = y
        for i in (0..n).rev() {
            let mut v = out[i];
            for j in i + 1..n {
                v -= self.lower[j * n + i] * out[j];
            }
            out[i] = v / self.lower[i * n + i];
        }
    }
}

/// Exact bit patterns of `(c, w, ρ)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FactorKey {
    coefficients: Vec<u64>,
    weight: u64,
    step_size: u64,
}

impl FactorKey {
    fn new(coefficients: &[f64], weight: f64, step_size: f64) -> Self {
        Self {
            coefficients: coefficients.iter().map(|c| c.to_bits()).collect(),
            weight: weight.to_bits(),
            step_size: step_size.to_bits(),
        }
    }
}

/// Factors keyed by `(coefficients, weight, step size)`.
#[derive(Debug, Default)]
pub struct FactorCache {
    entries: HashMap<FactorKey, Arc<CholeskyFactor>>,
    hits: u64,
    misses: u64,
}

impl FactorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the factor for `(c, w, ρ)`, computing it on first use.
    pub fn get_or_factor(
        &mut self,
        coefficients: &[f64],
        weight: f64,
        step_size: f64,
    ) -> Result<Arc<CholeskyFactor>> {
        let key = FactorKey::new(coefficients, weight, step_size);
        if let Some(factor) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(Arc::clone(factor));
        }

        self.misses += 1;
        let factor = CholeskyFactor::squared_hyperplane(coefficients, weight, step_size)?;
        let factor = Arc::new(factor);
        self.entries.insert(key, Arc::clone(&factor));
        Ok(factor)
    }

    /// Drop every entry whose weight fails `keep`. Returns how many were dropped.
    pub fn retain_weights(&mut self, mut keep: impl FnMut(f64) -> bool) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| keep(f64::from_bits(key.weight)));
        let dropped = before - self.entries.len();
        if dropped > 0 {
            debug!("Dropped {} cached factors with stale weights", dropped);
        }
        dropped
    }

    /// Number of cached factors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that had to factor.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
