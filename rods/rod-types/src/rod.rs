//! Rigid sphero-cylinder (rod) state types.
//!
//! A rod is a capsule: a cylinder of length `l` and radius `r` capped by
//! hemispheres. The constraint core consumes rods as a read-only view; all
//! mutation (integration, exchange between owners) happens outside.

use nalgebra::{Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable global identifier for a rod.
///
/// Assigned once at creation and never reused; survives redistribution,
/// unlike [`Rod::global_index`] which is reassigned every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RodId(pub u64);

impl RodId {
    /// Create a new rod ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for RodId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rod({})", self.0)
    }
}

/// Read-only view of a rigid sphero-cylinder.
///
/// The constraint core uses exactly these attributes: centre position, unit
/// orientation quaternion, length, collision radius, the per-step contiguous
/// `global_index`, the stable `gid`, and the optional head-to-tail linkage
/// partner.
///
/// # Example
///
/// ```
/// use rod_types::{Rod, RodId};
/// use nalgebra::{Point3, UnitQuaternion};
///
/// let rod = Rod::new(RodId::new(0), Point3::origin(), UnitQuaternion::identity(), 1.0, 0.25);
/// let (tail, head) = rod.endpoints();
/// assert_eq!(head, Point3::new(0.0, 0.0, 0.5));
/// assert_eq!(tail, Point3::new(0.0, 0.0, -0.5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rod {
    /// Stable global identifier.
    pub gid: RodId,
    /// Centre position in the lab frame.
    pub position: Point3<f64>,
    /// Unit orientation quaternion; the axis is this applied to +Z.
    pub orientation: UnitQuaternion<f64>,
    /// Cylinder length (excluding the hemispherical caps).
    pub length: f64,
    /// Collision radius.
    pub radius: f64,
    /// Contiguous per-step index into the DOF distribution map.
    pub global_index: usize,
    /// Linkage partner: the head of this rod is tied to the tail of `next`.
    pub link_next: Option<RodId>,
}

impl Rod {
    /// Create a rod with identity linkage and global index 0.
    ///
    /// The owning container assigns `global_index` before each step; tests
    /// and single-image runs typically set it to the slice index.
    #[must_use]
    pub fn new(
        gid: RodId,
        position: Point3<f64>,
        orientation: UnitQuaternion<f64>,
        length: f64,
        radius: f64,
    ) -> Self {
        Self {
            gid,
            position,
            orientation,
            length,
            radius,
            global_index: 0,
            link_next: None,
        }
    }

    /// Set the per-step global index (builder style).
    #[must_use]
    pub fn with_global_index(mut self, global_index: usize) -> Self {
        self.global_index = global_index;
        self
    }

    /// Declare a head-to-tail linkage to another rod (builder style).
    #[must_use]
    pub fn with_link_next(mut self, next: RodId) -> Self {
        self.link_next = Some(next);
        self
    }

    /// Unit axis direction: the orientation quaternion applied to +Z.
    #[must_use]
    pub fn axis(&self) -> Vector3<f64> {
        self.orientation * Vector3::z()
    }

    /// Half of the cylinder length.
    #[must_use]
    pub fn half_length(&self) -> f64 {
        0.5 * self.length
    }

    /// Axis endpoints `(tail, head)`: centre -/+ axis times half length.
    #[must_use]
    pub fn endpoints(&self) -> (Point3<f64>, Point3<f64>) {
        let offset = self.axis() * self.half_length();
        (self.position - offset, self.position + offset)
    }

    /// Head endpoint: centre + axis times half length.
    #[must_use]
    pub fn head(&self) -> Point3<f64> {
        self.position + self.axis() * self.half_length()
    }

    /// Tail endpoint: centre - axis times half length.
    #[must_use]
    pub fn tail(&self) -> Point3<f64> {
        self.position - self.axis() * self.half_length()
    }

    /// Total capsule volume (cylinder plus both hemispherical caps).
    #[must_use]
    pub fn volume(&self) -> f64 {
        let r = self.radius;
        std::f64::consts::PI * (r * r * self.length + 4.0 / 3.0 * r * r * r)
    }
}
