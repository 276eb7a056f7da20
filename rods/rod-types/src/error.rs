//! Error types for constraint resolution.

use thiserror::Error;

use crate::RodId;

/// Errors raised by the constraint resolution pipeline.
///
/// Non-convergence of the iterative solver is deliberately *not* an error:
/// it is reported through the solve report and the multipliers are still
/// written back.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstraintError {
    /// Malformed input: non-positive timestep or tolerance, mismatched
    /// vector length, or an operation invoked in the wrong lifecycle state.
    /// Reported immediately, no state mutation.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Description of what was rejected.
        reason: String,
    },

    /// A constraint block references a global index that does not resolve
    /// in the distribution map. Fatal; the offending rod pair is surfaced.
    #[error("assembly inconsistency: block {gid_i} / {gid_j} references an unresolvable global index")]
    AssemblyInconsistency {
        /// Stable id of the I-side rod.
        gid_i: RodId,
        /// Stable id of the J-side rod.
        gid_j: RodId,
    },

    /// `NaN` or `Inf` survived a solver restart, or a bilateral block
    /// carries a non-finite or non-positive spring constant. Fatal; the
    /// solver stays in its post-setup state so `q` and the initial
    /// multipliers remain inspectable.
    #[error("numeric failure at iteration {iteration}: residual {residual}")]
    NumericFailure {
        /// Residual at the point of failure (may be `NaN`).
        residual: f64,
        /// Iteration index at the point of failure.
        iteration: usize,
    },

    /// A linkage references a partner that is not resolvable in the same
    /// periodic image. Raised instead of silently producing wrong geometry.
    #[error("linkage {gid_i} -> {gid_j} crosses the periodic boundary or references an unknown rod")]
    PeriodicLinkage {
        /// Stable id of the linking rod.
        gid_i: RodId,
        /// Stable id of the missing partner.
        gid_j: RodId,
    },
}

impl ConstraintError {
    /// Create an invalid-input error.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Check if this is an invalid-input error.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Check if this is a numeric failure.
    #[must_use]
    pub fn is_numeric_failure(&self) -> bool {
        matches!(self, Self::NumericFailure { .. })
    }
}
