//! Slender-body drag coefficients and the block-diagonal mobility.

use nalgebra::{DVector, Matrix3, Vector3};
use rod_constraint::MobilityOperator;
use rod_types::{Rod, DOF_PER_ROD};

/// Drag coefficients of a slender sphero-cylinder.
///
/// Derived from the standard log-aspect-ratio formulas with
/// `b = -(1 + 2 ln(r / l))`:
///
/// ```text
/// zeta_para = 8 pi mu l / (2 b)
/// zeta_perp = 8 pi mu l / (b + 2)
/// zeta_rot  = 2 pi mu l^3 / (3 (b + 2))
/// ```
///
/// Valid for slender rods (`r / l` well below 1, so that `b > 0`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragCoefficients {
    /// Translational drag along the rod axis.
    pub para: f64,
    /// Translational drag across the rod axis.
    pub perp: f64,
    /// Rotational drag about axes through the centre.
    pub rot: f64,
}

impl DragCoefficients {
    /// Coefficients for a rod of the given length and radius in a fluid of
    /// viscosity `mu`.
    #[must_use]
    pub fn slender_body(mu: f64, length: f64, radius: f64) -> Self {
        let b = -(1.0 + 2.0 * (radius / length).ln());
        let eight_pi_mu_l = 8.0 * std::f64::consts::PI * mu * length;
        Self {
            para: eight_pi_mu_l / (2.0 * b),
            perp: eight_pi_mu_l / (b + 2.0),
            rot: 2.0 * std::f64::consts::PI * mu * length.powi(3) / (3.0 * (b + 2.0)),
        }
    }
}

/// One rod's mobility: a translational and a rotational 3x3 block.
#[derive(Debug, Clone, Copy)]
struct MobilityBlock {
    trans: Matrix3<f64>,
    rot: Matrix3<f64>,
}

/// Block-diagonal slender-body mobility over a set of rods.
///
/// Per rod, with unit axis `q`:
///
/// ```text
/// M_trans = (1/zeta_para) q q^T + (1/zeta_perp) (I - q q^T)
/// M_rot   = (1/zeta_rot) I
/// ```
///
/// The rotational block is regularised to the identity times the inverse
/// rotational drag: the slender-body spin mobility about the axis has no
/// physical meaning for an axisymmetric rod, and the isotropic form keeps
/// the operator positive-definite.
///
/// # Example
///
/// ```
/// use nalgebra::{DVector, Point3, UnitQuaternion};
/// use rod_mobility::{MobilityOperator, RodDragMobility};
/// use rod_types::{Rod, RodId};
///
/// let rods = vec![Rod::new(
///     RodId::new(0), Point3::origin(), UnitQuaternion::identity(), 1.0, 0.1,
/// )];
/// let mobility = RodDragMobility::new(&rods, 1.0);
///
/// let mut force = DVector::zeros(6);
/// force[2] = 1.0; // push along the axis
/// let mut velocity = DVector::zeros(6);
/// mobility.apply(&force, &mut velocity);
/// assert!(velocity[2] > 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct RodDragMobility {
    blocks: Vec<MobilityBlock>,
}

impl RodDragMobility {
    /// Build the mobility for the given rods in a fluid of viscosity `mu`.
    #[must_use]
    pub fn new(rods: &[Rod], mu: f64) -> Self {
        let blocks = rods
            .iter()
            .map(|rod| {
                let drag = DragCoefficients::slender_body(mu, rod.length, rod.radius);
                Self::block_for(rod.axis(), &drag)
            })
            .collect();
        Self { blocks }
    }

    /// Number of rods covered.
    #[must_use]
    pub fn rod_count(&self) -> usize {
        self.blocks.len()
    }

    fn block_for(axis: Vector3<f64>, drag: &DragCoefficients) -> MobilityBlock {
        let qq = axis * axis.transpose();
        let identity = Matrix3::identity();
        MobilityBlock {
            trans: qq / drag.para + (identity - qq) / drag.perp,
            rot: identity / drag.rot,
        }
    }
}

impl MobilityOperator for RodDragMobility {
    fn dofs(&self) -> usize {
        DOF_PER_ROD * self.blocks.len()
    }

    fn apply(&self, force: &DVector<f64>, velocity: &mut DVector<f64>) {
        debug_assert_eq!(force.len(), self.dofs());
        debug_assert_eq!(velocity.len(), self.dofs());
        for (i, block) in self.blocks.iter().enumerate() {
            let offset = DOF_PER_ROD * i;
            let f = Vector3::new(force[offset], force[offset + 1], force[offset + 2]);
            let t = Vector3::new(force[offset + 3], force[offset + 4], force[offset + 5]);
            let v = block.trans * f;
            let w = block.rot * t;
            for k in 0..3 {
                velocity[offset + k] = v[k];
                velocity[offset + 3 + k] = w[k];
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, UnitQuaternion};
    use rod_types::RodId;

    fn rod(length: f64, radius: f64) -> Rod {
        Rod::new(
            RodId::new(0),
            Point3::origin(),
            UnitQuaternion::identity(),
            length,
            radius,
        )
    }

    #[test]
    fn test_drag_coefficients_slender_limit() {
        let drag = DragCoefficients::slender_body(1.0, 1.0, 0.05);
        // b = -(1 + 2 ln 0.05) = 4.99...
        assert!(drag.para > 0.0 && drag.perp > 0.0 && drag.rot > 0.0);
        // Pulling along the axis is easier than across it.
        assert!(drag.para < drag.perp);
        // Asymptotically perp drag approaches twice para drag.
        let ratio = drag.perp / drag.para;
        assert!(ratio > 1.0 && ratio < 2.0);
    }

    #[test]
    fn test_axis_force_uses_parallel_drag() {
        let r = rod(1.0, 0.1);
        let drag = DragCoefficients::slender_body(2.0, 1.0, 0.1);
        let mobility = RodDragMobility::new(&[r], 2.0);
        assert_eq!(mobility.dofs(), 6);
        assert_eq!(mobility.rod_count(), 1);

        // Force along the axis (z).
        let mut force = DVector::zeros(6);
        force[2] = 1.0;
        let mut velocity = DVector::zeros(6);
        mobility.apply(&force, &mut velocity);
        assert_relative_eq!(velocity[2], 1.0 / drag.para, epsilon = 1e-12);
        assert_relative_eq!(velocity[0], 0.0, epsilon = 1e-14);

        // Force across the axis (x).
        let mut force = DVector::zeros(6);
        force[0] = 1.0;
        let mut velocity = DVector::zeros(6);
        mobility.apply(&force, &mut velocity);
        assert_relative_eq!(velocity[0], 1.0 / drag.perp, epsilon = 1e-12);

        // Torque about any axis uses the regularised rotational drag.
        let mut force = DVector::zeros(6);
        force[4] = 1.0;
        let mut velocity = DVector::zeros(6);
        mobility.apply(&force, &mut velocity);
        assert_relative_eq!(velocity[4], 1.0 / drag.rot, epsilon = 1e-12);
    }

    #[test]
    fn test_blocks_are_independent() {
        let rods = vec![rod(1.0, 0.1), rod(2.0, 0.1)];
        let mobility = RodDragMobility::new(&rods, 1.0);
        assert_eq!(mobility.dofs(), 12);

        let mut force = DVector::zeros(12);
        force[2] = 1.0;
        let mut velocity = DVector::zeros(12);
        mobility.apply(&force, &mut velocity);

        // Only the first rod moves.
        for k in 6..12 {
            assert_relative_eq!(velocity[k], 0.0, epsilon = 1e-14);
        }
        assert!(velocity[2] > 0.0);
    }

    #[test]
    fn test_mobility_is_positive_on_diagonal() {
        let r = rod(0.6, 0.1);
        let mobility = RodDragMobility::new(&[r], 1.0);
        for k in 0..6 {
            let mut force = DVector::zeros(6);
            force[k] = 1.0;
            let mut velocity = DVector::zeros(6);
            mobility.apply(&force, &mut velocity);
            assert!(velocity[k] > 0.0, "diagonal entry {k} not positive");
        }
    }
}
