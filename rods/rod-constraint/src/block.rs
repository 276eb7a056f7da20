//! Scalar constraint blocks.
//!
//! A [`ConstraintBlock`] is the value record describing one scalar
//! constraint: a non-penetration contact between two rods, a contact between
//! a rod and a fixed wall, or a Hookean linkage tying two rod endpoints
//! together. Each block is self-describing: it carries everything needed to
//! evaluate its geometric gap, to contribute its (at most) 12 sparse matrix
//! entries, and to accumulate a virial stress.

use nalgebra::{Matrix3, Point3, Vector3};
use rod_types::RodId;

/// What kind of constraint a block encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Unilateral non-penetration contact (rod-rod or rod-wall).
    Contact,
    /// Bilateral Hookean linkage between two rod endpoints.
    Linkage,
}

/// One scalar constraint between rod I and rod J (or a wall).
///
/// Sign convention: `norm_i` is the unit force direction on I and points
/// from the J-side contact point toward the I-side contact point, so a
/// positive multiplier pushes I away from J and a negative multiplier on a
/// stretched linkage pulls I toward J. For two-sided blocks
/// `norm_j = -norm_i`; wall blocks have `norm_j = 0`.
///
/// For `one_side` blocks the J columns are suppressed at assembly, but
/// `gid_j` and `global_index_j` are retained for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintBlock {
    /// Contact or linkage.
    pub kind: ConstraintKind,
    /// J is a fixed environment (wall); assemble only the I columns.
    pub one_side: bool,
    /// Stable id of rod I.
    pub gid_i: RodId,
    /// Stable id of rod J (mirrors I for wall blocks).
    pub gid_j: RodId,
    /// Per-step contiguous index of rod I.
    pub global_index_i: usize,
    /// Per-step contiguous index of rod J (mirrors I for wall blocks).
    pub global_index_j: usize,
    /// Signed scalar gap at the reference configuration.
    pub delta0: f64,
    /// Multiplier: the initial estimate at emission, overwritten with the
    /// converged value by the post-solve writeback.
    pub gamma: f64,
    /// Unit force direction on I.
    pub norm_i: Vector3<f64>,
    /// Unit force direction on J (`-norm_i`, or zero for walls).
    pub norm_j: Vector3<f64>,
    /// Contact point relative to the centre of I (torque arm).
    pub pos_i: Vector3<f64>,
    /// Contact point relative to the centre of J (torque arm).
    pub pos_j: Vector3<f64>,
    /// Lab-frame contact point on I, persisted for output.
    pub loc_i: Point3<f64>,
    /// Lab-frame contact point on J (wall foot point for wall blocks).
    pub loc_j: Point3<f64>,
    /// Linkage spring constant; `Some` if and only if the block is bilateral.
    pub kappa: Option<f64>,
    /// Virial stress contribution per unit multiplier.
    pub stress: Matrix3<f64>,
}

impl ConstraintBlock {
    /// Build a two-sided non-penetration contact block.
    ///
    /// `delta0` is the signed gap; the initial multiplier estimate is
    /// `-delta0` so that penetrating contacts start with a positive push.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn contact(
        gid_i: RodId,
        gid_j: RodId,
        global_index_i: usize,
        global_index_j: usize,
        delta0: f64,
        norm_i: Vector3<f64>,
        loc_i: Point3<f64>,
        loc_j: Point3<f64>,
        centre_i: Point3<f64>,
        centre_j: Point3<f64>,
    ) -> Self {
        debug_assert!((norm_i.norm() - 1.0).abs() < 1e-9, "norm_i must be unit");
        Self {
            kind: ConstraintKind::Contact,
            one_side: false,
            gid_i,
            gid_j,
            global_index_i,
            global_index_j,
            delta0,
            gamma: -delta0,
            norm_i,
            norm_j: -norm_i,
            pos_i: loc_i - centre_i,
            pos_j: loc_j - centre_j,
            loc_i,
            loc_j,
            kappa: None,
            stress: (loc_i - loc_j) * norm_i.transpose(),
        }
    }

    /// Build a one-sided contact block against a fixed wall.
    ///
    /// The J side is the environment: its columns are suppressed at
    /// assembly and its id fields mirror the rod's own for logging.
    #[must_use]
    pub fn wall(
        gid_i: RodId,
        global_index_i: usize,
        delta0: f64,
        norm_i: Vector3<f64>,
        loc_i: Point3<f64>,
        wall_point: Point3<f64>,
        centre_i: Point3<f64>,
    ) -> Self {
        debug_assert!((norm_i.norm() - 1.0).abs() < 1e-9, "norm_i must be unit");
        Self {
            kind: ConstraintKind::Contact,
            one_side: true,
            gid_i,
            gid_j: gid_i,
            global_index_i,
            global_index_j: global_index_i,
            delta0,
            gamma: -delta0,
            norm_i,
            norm_j: Vector3::zeros(),
            pos_i: loc_i - centre_i,
            pos_j: Vector3::zeros(),
            loc_i,
            loc_j: wall_point,
            kappa: None,
            stress: Matrix3::zeros(),
        }
    }

    /// Build a bilateral Hookean linkage block.
    ///
    /// `delta0` is the stretch relative to the rest length; the initial
    /// multiplier estimate is the spring force `-kappa * delta0`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn linkage(
        gid_i: RodId,
        gid_j: RodId,
        global_index_i: usize,
        global_index_j: usize,
        delta0: f64,
        kappa: f64,
        norm_i: Vector3<f64>,
        loc_i: Point3<f64>,
        loc_j: Point3<f64>,
        centre_i: Point3<f64>,
        centre_j: Point3<f64>,
    ) -> Self {
        debug_assert!((norm_i.norm() - 1.0).abs() < 1e-9, "norm_i must be unit");
        debug_assert!(kappa > 0.0, "kappa must be positive");
        Self {
            kind: ConstraintKind::Linkage,
            one_side: false,
            gid_i,
            gid_j,
            global_index_i,
            global_index_j,
            delta0,
            gamma: -kappa * delta0,
            norm_i,
            norm_j: -norm_i,
            pos_i: loc_i - centre_i,
            pos_j: loc_j - centre_j,
            loc_i,
            loc_j,
            kappa: Some(kappa),
            stress: (loc_i - loc_j) * norm_i.transpose(),
        }
    }

    /// Whether this block is bilateral (equality with spring compliance).
    #[must_use]
    pub fn is_bilateral(&self) -> bool {
        self.kappa.is_some()
    }

    /// Replace the virial stress contribution (builder style).
    #[must_use]
    pub fn with_stress(mut self, stress: Matrix3<f64>) -> Self {
        self.stress = stress;
        self
    }

    /// Torque arm entries for the I side: `pos_i x norm_i`.
    #[must_use]
    pub fn torque_i(&self) -> Vector3<f64> {
        self.pos_i.cross(&self.norm_i)
    }

    /// Torque arm entries for the J side: `pos_j x norm_j`.
    #[must_use]
    pub fn torque_j(&self) -> Vector3<f64> {
        self.pos_j.cross(&self.norm_j)
    }
}
