//! The composite BCQP operator.
//!
//! [`ConstraintOperator`] implements the action of the quadratic form
//! matrix on a concatenated multiplier vector `gamma = [gamma_u; gamma_b]`:
//!
//! ```text
//! f     = D_u * gamma_u + D_b * gamma_b        (6N generalised force)
//! u     = M * f                                (6N generalised velocity)
//! out_u = D_u^T * u
//! out_b = D_b^T * u + diag(1 / (dt * kappa)) * gamma_b
//! ```
//!
//! The intermediate `D * gamma` only ever exists as the single 6N scratch
//! force vector; the two halves scatter-accumulate into it. The compliance
//! diagonal makes the bilateral block strictly positive-definite, encoding
//! Hookean springs over one timestep, and the whole operator stays
//! symmetric because both halves apply the same mobility.

use nalgebra::DVector;

use crate::{ConstraintMatrix, MobilityOperator};

/// Operator interface consumed by the BCQP solver.
///
/// `apply` takes `&mut self` so implementations can reuse scratch storage
/// across iterations.
pub trait BcqpOperator {
    /// Dimension of the multiplier space.
    fn dim(&self) -> usize;

    /// Compute `out = A * gamma`.
    fn apply(&mut self, gamma: &DVector<f64>, out: &mut DVector<f64>);
}

/// The composite operator coupling both constraint halves through mobility.
///
/// Borrows the assembled matrices and the mobility operator; lives exactly
/// as long as one solve, which confines it to the same per-step lifecycle
/// as its inputs.
pub struct ConstraintOperator<'a> {
    d_uni: &'a ConstraintMatrix,
    d_bi: &'a ConstraintMatrix,
    mobility: &'a dyn MobilityOperator,
    /// Per-bilateral-row compliance `1 / (dt * kappa)`.
    compliance: &'a DVector<f64>,
    force_scratch: DVector<f64>,
    velocity_scratch: DVector<f64>,
    n_uni: usize,
    n_bi: usize,
}

impl<'a> ConstraintOperator<'a> {
    /// Wrap the assembled halves, the mobility and the compliance diagonal.
    ///
    /// Both matrices must share the mobility's DOF count, and `compliance`
    /// must have one entry per bilateral row.
    #[must_use]
    pub fn new(
        d_uni: &'a ConstraintMatrix,
        d_bi: &'a ConstraintMatrix,
        mobility: &'a dyn MobilityOperator,
        compliance: &'a DVector<f64>,
    ) -> Self {
        let dofs = mobility.dofs();
        debug_assert_eq!(d_uni.ncols(), dofs);
        debug_assert_eq!(d_bi.ncols(), dofs);
        debug_assert_eq!(compliance.len(), d_bi.nrows());
        Self {
            d_uni,
            d_bi,
            mobility,
            compliance,
            force_scratch: DVector::zeros(dofs),
            velocity_scratch: DVector::zeros(dofs),
            n_uni: d_uni.nrows(),
            n_bi: d_bi.nrows(),
        }
    }

    /// Number of unilateral rows (the leading partition of the multiplier).
    #[must_use]
    pub const fn n_uni(&self) -> usize {
        self.n_uni
    }

    /// Number of bilateral rows (the trailing partition).
    #[must_use]
    pub const fn n_bi(&self) -> usize {
        self.n_bi
    }
}

impl BcqpOperator for ConstraintOperator<'_> {
    fn dim(&self) -> usize {
        self.n_uni + self.n_bi
    }

    fn apply(&mut self, gamma: &DVector<f64>, out: &mut DVector<f64>) {
        debug_assert_eq!(gamma.len(), self.dim());
        debug_assert_eq!(out.len(), self.dim());
        let gamma = gamma.as_slice();
        let (gamma_u, gamma_b) = gamma.split_at(self.n_uni);

        self.force_scratch.fill(0.0);
        self.d_uni
            .mul_transpose_acc(gamma_u, self.force_scratch.as_mut_slice());
        self.d_bi
            .mul_transpose_acc(gamma_b, self.force_scratch.as_mut_slice());

        self.mobility
            .apply(&self.force_scratch, &mut self.velocity_scratch);

        let out = out.as_mut_slice();
        let (out_u, out_b) = out.split_at_mut(self.n_uni);
        self.d_uni
            .mul_vec_into(self.velocity_scratch.as_slice(), out_u);
        self.d_bi
            .mul_vec_into(self.velocity_scratch.as_slice(), out_b);
        for (k, o) in out_b.iter_mut().enumerate() {
            *o += self.compliance[k] * gamma_b[k];
        }
    }
}
