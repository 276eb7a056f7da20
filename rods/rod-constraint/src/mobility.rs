//! The mobility operator contract.
//!
//! Hydrodynamic mobility maps generalised force (6 per rod) to generalised
//! velocity (6 per rod). The constraint core never inspects its internals:
//! it only applies the operator, so implementations are free to use
//! closed-form block-diagonal drag (see the rod-mobility crate), matrices,
//! or anything else that is linear and positive-definite.

use nalgebra::DVector;

/// Linear operator over the 6-DOF-per-rod vector space.
///
/// Contract: `apply` computes `velocity = M * force` in at most O(N) work
/// for N rods (block-diagonal per body), and `M` is symmetric
/// positive-definite. Consumers hold implementations behind shared handles
/// (`Arc<dyn MobilityOperator>`), mirroring the per-step lifecycle of the
/// matrices they couple to.
pub trait MobilityOperator: Send + Sync {
    /// Dimension of the operator's domain and range (6 per rod).
    fn dofs(&self) -> usize;

    /// Compute `velocity = M * force`. Both vectors have [`Self::dofs`]
    /// entries; `velocity` is overwritten.
    fn apply(&self, force: &DVector<f64>, velocity: &mut DVector<f64>);
}

/// Isotropic mobility: the same scalar inverse drag on every DOF.
///
/// Useful for point-like particles and as a cheap stand-in where the
/// anisotropic slender-body operator is not needed.
#[derive(Debug, Clone, Copy)]
pub struct IsotropicMobility {
    inv_drag: f64,
    dofs: usize,
}

impl IsotropicMobility {
    /// Create an isotropic mobility over `dofs` degrees of freedom.
    #[must_use]
    pub const fn new(inv_drag: f64, dofs: usize) -> Self {
        Self { inv_drag, dofs }
    }

    /// The scalar inverse drag coefficient.
    #[must_use]
    pub const fn inv_drag(&self) -> f64 {
        self.inv_drag
    }
}

impl MobilityOperator for IsotropicMobility {
    fn dofs(&self) -> usize {
        self.dofs
    }

    fn apply(&self, force: &DVector<f64>, velocity: &mut DVector<f64>) {
        debug_assert_eq!(force.len(), self.dofs);
        debug_assert_eq!(velocity.len(), self.dofs);
        for (v, f) in velocity.iter_mut().zip(force.iter()) {
            *v = self.inv_drag * f;
        }
    }
}
