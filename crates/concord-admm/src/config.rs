//! Reasoner configuration.

use crate::error::{Error, Result};

/// Configuration for a [`Reasoner`](crate::Reasoner).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReasonerConfig {
    /// Iteration cap of the inner ADMM loop per round.
    /// Default: 1000
    pub max_iterations: usize,

    /// Penalty parameter ρ. Larger values take more aggressive consensus
    /// steps but can overshoot.
    /// Default: 0.1
    pub step_size: f64,

    /// The inner loop stops once both residuals are at or below this.
    /// Default: 0.1
    pub residual_tolerance: f64,

    /// Cap on activation rounds.
    /// Default: 500
    pub max_rounds: usize,

    /// Run the per-term and per-slot phases on the rayon pool.
    /// Default: true
    pub parallel: bool,

    /// Below this many terms the phases run sequentially even when
    /// `parallel` is set.
    /// Default: 256
    pub min_terms_for_parallel: usize,

    /// Size of a dedicated rayon pool for this reasoner. `None` runs on the
    /// global pool.
    /// Default: None
    pub num_threads: Option<usize>,

    /// Residuals are compared against the tolerance every `stop_check`
    /// iterations.
    /// Default: 1
    pub stop_check: usize,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            step_size: 0.1,
            residual_tolerance: 0.1,
            max_rounds: 500,
            parallel: true,
            min_terms_for_parallel: 256,
            num_threads: None,
            stop_check: 1,
        }
    }
}

impl ReasonerConfig {
    /// Set the inner-loop iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the step size ρ.
    #[must_use]
    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    /// Set the residual tolerance.
    #[must_use]
    pub fn with_residual_tolerance(mut self, residual_tolerance: f64) -> Self {
        self.residual_tolerance = residual_tolerance;
        self
    }

    /// Set the activation round cap.
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Enable or disable the rayon phases.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the phase-parallel threshold.
    #[must_use]
    pub fn with_min_terms_for_parallel(mut self, min_terms: usize) -> Self {
        self.min_terms_for_parallel = min_terms;
        self
    }

    /// Run the parallel phases on a dedicated pool of `num_threads` workers.
    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Check for convergence every `stop_check` iterations.
    #[must_use]
    pub fn with_stop_check(mut self, stop_check: usize) -> Self {
        self.stop_check = stop_check;
        self
    }

    /// Run everything on the calling thread.
    #[must_use]
    pub fn sequential() -> Self {
        Self::default().with_parallel(false)
    }

    /// Whether the phases should run in parallel for `terms` terms.
    pub fn use_parallel(&self, terms: usize) -> bool {
        self.parallel && terms >= self.min_terms_for_parallel
    }

    /// Reject values the solver cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig {
                key: "max_iterations",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.step_size > 0.0 && self.step_size.is_finite()) {
            return Err(Error::InvalidConfig {
                key: "step_size",
                reason: format!("must be positive and finite, got {}", self.step_size),
            });
        }
        if !(self.residual_tolerance > 0.0) {
            return Err(Error::InvalidConfig {
                key: "residual_tolerance",
                reason: format!("must be positive, got {}", self.residual_tolerance),
            });
        }
        if self.max_rounds == 0 {
            return Err(Error::InvalidConfig {
                key: "max_rounds",
                reason: "must be at least 1".into(),
            });
        }
        if self.num_threads == Some(0) {
            return Err(Error::InvalidConfig {
                key: "num_threads",
                reason: "must be at least 1".into(),
            });
        }
        if self.stop_check == 0 {
            return Err(Error::InvalidConfig {
                key: "stop_check",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
