//! Projected Barzilai-Borwein solver for bound-constrained QPs.
//!
//! Solves `min 0.5 * gamma^T A gamma + gamma^T q` subject to `gamma >= 0`
//! on the unilateral partition (the leading `n_uni` entries) with the
//! bilateral partition unrestricted. `A` is only ever touched through
//! [`BcqpOperator::apply`], so the same solver runs on the composite
//! constraint operator and on dense test matrices.
//!
//! # Algorithm
//!
//! Projected gradient descent with Barzilai-Borwein step lengths (BBPGD):
//!
//! 1. `g_k = A * gamma_k + q`
//! 2. `gamma_{k+1} = P(gamma_k - alpha_k * g_k)` with the componentwise
//!    projection `P` (`max(., 0)` on unilateral entries, identity on
//!    bilateral ones)
//! 3. `alpha` alternates between the two Barzilai-Borwein rules
//!    `s.s / s.y` and `s.y / y.y` built from the last step `s` and
//!    gradient change `y`, clamped to `[1e-12, 1e12]`; the first step uses
//!    the spectral estimate `|q| / |A q|`
//! 4. convergence when `|gamma - P(gamma - g)| / max(1, |gamma_0|)` drops
//!    below the tolerance
//!
//! A non-finite residual resets the step length to the spectral estimate
//! once; a second non-finite residual is a fatal numeric failure. Running
//! out of iterations is *not* fatal: the best iterate and the achieved
//! residual are reported and the caller decides.

use nalgebra::DVector;
use rod_types::ConstraintError;

use crate::BcqpOperator;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lower clamp for the Barzilai-Borwein step length.
const ALPHA_MIN: f64 = 1e-12;
/// Upper clamp for the Barzilai-Borwein step length.
const ALPHA_MAX: f64 = 1e12;

/// Configuration for the BCQP solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BcqpConfig {
    /// Convergence tolerance on the scaled projected-gradient residual.
    pub residual_tol: f64,

    /// Maximum number of iterations before reporting non-convergence.
    pub max_iterations: usize,

    /// Record the residual and energy at every iterate.
    pub track_history: bool,
}

impl Default for BcqpConfig {
    fn default() -> Self {
        Self {
            residual_tol: 1e-6,
            max_iterations: 500,
            track_history: false,
        }
    }
}

impl BcqpConfig {
    /// High-accuracy configuration for stiff systems.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            residual_tol: 1e-10,
            max_iterations: 5000,
            track_history: false,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error string if any value is out of range.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.residual_tol <= 0.0 || self.residual_tol.is_nan() {
            return Err("residual_tol must be positive");
        }
        if self.max_iterations == 0 {
            return Err("max_iterations must be at least 1");
        }
        Ok(())
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Termination {
    /// The scaled residual dropped below the tolerance.
    Converged,
    /// The iteration budget ran out; the reported residual is still above
    /// the tolerance. Non-fatal: the iterate is usable.
    MaxIterations,
}

/// Outcome of a BCQP solve.
#[derive(Debug, Clone)]
pub struct BcqpResult {
    /// The final multiplier iterate.
    pub gamma: DVector<f64>,
    /// The last scaled projected-gradient residual.
    pub residual: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Why the solver stopped.
    pub termination: Termination,
    /// Residual at each iterate, if tracking was enabled.
    pub residual_history: Option<Vec<f64>>,
    /// Objective value at each iterate, if tracking was enabled.
    pub energy_history: Option<Vec<f64>>,
}

impl BcqpResult {
    /// Whether the solver met the tolerance.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Projected Barzilai-Borwein gradient descent solver.
#[derive(Debug, Clone, Copy)]
pub struct BcqpSolver {
    config: BcqpConfig,
}

impl Default for BcqpSolver {
    fn default() -> Self {
        Self::new(BcqpConfig::default())
    }
}

impl BcqpSolver {
    /// Create a solver with the given configuration.
    #[must_use]
    pub const fn new(config: BcqpConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &BcqpConfig {
        &self.config
    }

    /// Solve the BCQP defined by `op` and `q`, starting from `gamma0`.
    ///
    /// The leading `n_uni` entries are constrained to be non-negative;
    /// `gamma0` is projected onto the feasible set before the first
    /// iteration.
    ///
    /// # Errors
    ///
    /// - [`ConstraintError::InvalidInput`] on dimension mismatches or an
    ///   invalid configuration.
    /// - [`ConstraintError::NumericFailure`] if the residual is non-finite
    ///   after a restart.
    pub fn solve(
        &self,
        op: &mut dyn BcqpOperator,
        q: &DVector<f64>,
        gamma0: DVector<f64>,
        n_uni: usize,
    ) -> Result<BcqpResult, ConstraintError> {
        self.config
            .validate()
            .map_err(ConstraintError::invalid_input)?;

        let n = op.dim();
        if q.len() != n || gamma0.len() != n {
            return Err(ConstraintError::invalid_input(format!(
                "operator dimension {n} does not match q ({}) / gamma0 ({})",
                q.len(),
                gamma0.len()
            )));
        }
        if n_uni > n {
            return Err(ConstraintError::invalid_input(
                "unilateral partition exceeds problem dimension",
            ));
        }

        let track = self.config.track_history;
        if n == 0 {
            return Ok(BcqpResult {
                gamma: gamma0,
                residual: 0.0,
                iterations: 0,
                termination: Termination::Converged,
                residual_history: track.then(Vec::new),
                energy_history: track.then(Vec::new),
            });
        }

        let tol = self.config.residual_tol;
        let mut gamma = gamma0;
        project(&mut gamma, n_uni);
        let gamma_scale = gamma.norm().max(1.0);

        let mut g = DVector::zeros(n);
        op.apply(&gamma, &mut g);
        g += q;

        // Spectral estimate for the first (and any restarted) step length.
        let mut scratch = DVector::zeros(n);
        op.apply(q, &mut scratch);
        let mut alpha0 = q.norm() / (scratch.norm() + f64::EPSILON);
        if !alpha0.is_finite() || alpha0 <= 0.0 {
            alpha0 = 1.0;
        }

        let mut residual = projected_gradient_norm(&gamma, &g, n_uni) / gamma_scale;
        let mut residual_history = track.then(|| vec![residual]);
        let mut energy_history = track.then(|| vec![objective(&gamma, &g, q)]);

        if residual <= tol {
            return Ok(BcqpResult {
                gamma,
                residual,
                iterations: 0,
                termination: Termination::Converged,
                residual_history,
                energy_history,
            });
        }

        let mut alpha = alpha0;
        let mut restarted = false;
        let mut gamma_next = DVector::zeros(n);
        let mut g_next = DVector::zeros(n);
        let mut iterations = 0;
        let mut termination = Termination::MaxIterations;

        for k in 1..=self.config.max_iterations {
            iterations = k;

            // Projected gradient step.
            gamma_next.copy_from(&gamma);
            gamma_next.axpy(-alpha, &g, 1.0);
            project(&mut gamma_next, n_uni);

            op.apply(&gamma_next, &mut g_next);
            g_next += q;

            let candidate = projected_gradient_norm(&gamma_next, &g_next, n_uni) / gamma_scale;
            if !candidate.is_finite() {
                if restarted {
                    return Err(ConstraintError::NumericFailure {
                        residual: candidate,
                        iteration: k,
                    });
                }
                restarted = true;
                alpha = alpha0;
                continue;
            }
            residual = candidate;

            // Barzilai-Borwein products from s = step, y = gradient change.
            let mut s_dot_s = 0.0;
            let mut s_dot_y = 0.0;
            let mut y_dot_y = 0.0;
            for i in 0..n {
                let s = gamma_next[i] - gamma[i];
                let y = g_next[i] - g[i];
                s_dot_s += s * s;
                s_dot_y += s * y;
                y_dot_y += y * y;
            }

            std::mem::swap(&mut gamma, &mut gamma_next);
            std::mem::swap(&mut g, &mut g_next);

            if let Some(history) = residual_history.as_mut() {
                history.push(residual);
            }
            if let Some(history) = energy_history.as_mut() {
                history.push(objective(&gamma, &g, q));
            }

            if residual <= tol {
                termination = Termination::Converged;
                break;
            }

            // Alternate BB1 and BB2, falling back to the spectral estimate
            // when the quotient degenerates.
            alpha = if k % 2 == 1 {
                s_dot_s / s_dot_y
            } else {
                s_dot_y / y_dot_y
            };
            if !alpha.is_finite() || alpha <= 0.0 {
                alpha = alpha0;
            }
            alpha = alpha.clamp(ALPHA_MIN, ALPHA_MAX);
        }

        Ok(BcqpResult {
            gamma,
            residual,
            iterations,
            termination,
            residual_history,
            energy_history,
        })
    }
}

/// Componentwise projection onto the feasible set.
fn project(gamma: &mut DVector<f64>, n_uni: usize) {
    for i in 0..n_uni {
        if gamma[i] < 0.0 {
            gamma[i] = 0.0;
        }
    }
}

/// Norm of `gamma - P(gamma - g)`, the projected-gradient KKT residual.
fn projected_gradient_norm(gamma: &DVector<f64>, g: &DVector<f64>, n_uni: usize) -> f64 {
    let mut sum = 0.0;
    for i in 0..gamma.len() {
        let w = if i < n_uni {
            gamma[i] - (gamma[i] - g[i]).max(0.0)
        } else {
            g[i]
        };
        sum += w * w;
    }
    sum.sqrt()
}

/// Objective `0.5 gamma^T A gamma + gamma^T q`, given `g = A gamma + q`.
fn objective(gamma: &DVector<f64>, g: &DVector<f64>, q: &DVector<f64>) -> f64 {
    0.5 * (gamma.dot(g) + gamma.dot(q))
}
