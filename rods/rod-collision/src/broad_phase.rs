//! Broad-phase candidate pair search using sweep-and-prune.
//!
//! Reduces the number of narrow-phase segment distance tests from O(n^2)
//! to O(n log n + k) for k overlapping bounding-box pairs. Rod boxes are
//! the axis endpoints expanded by the collision radius, so any pair of
//! capsules within contact range is guaranteed to be a candidate.
//!
//! The sweep axis is the coordinate axis with the largest variance of box
//! centres, which keeps the active interval list short for elongated or
//! layered suspensions.

use nalgebra::Point3;
use rod_types::Rod;

/// Axis-aligned bounding box of a capsule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Bounding box of a rod: axis endpoints inflated by radius + margin.
    #[must_use]
    pub fn of_rod(rod: &Rod, radius: f64, margin: f64) -> Self {
        let (tail, head) = rod.endpoints();
        let inflate = radius + margin;
        Self {
            min: Point3::new(
                tail.x.min(head.x) - inflate,
                tail.y.min(head.y) - inflate,
                tail.z.min(head.z) - inflate,
            ),
            max: Point3::new(
                tail.x.max(head.x) + inflate,
                tail.y.max(head.y) + inflate,
                tail.z.max(head.z) + inflate,
            ),
        }
    }

    /// Check overlap with another box (touching counts as overlap).
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Box centre.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    fn min_on(&self, axis: usize) -> f64 {
        self.min[axis]
    }

    fn max_on(&self, axis: usize) -> f64 {
        self.max[axis]
    }
}

/// Sweep-and-prune broad phase over rod bounding boxes.
///
/// Reuses its interval buffers across steps.
///
/// # Example
///
/// ```
/// use rod_collision::SweepAndPrune;
/// use rod_types::{Rod, RodId};
/// use nalgebra::{Point3, UnitQuaternion};
///
/// let rods = vec![
///     Rod::new(RodId::new(0), Point3::origin(), UnitQuaternion::identity(), 1.0, 0.5),
///     Rod::new(RodId::new(1), Point3::new(0.9, 0.0, 0.0), UnitQuaternion::identity(), 1.0, 0.5),
///     Rod::new(RodId::new(2), Point3::new(10.0, 0.0, 0.0), UnitQuaternion::identity(), 1.0, 0.5),
/// ];
///
/// let mut broad = SweepAndPrune::new();
/// let pairs = broad.find_candidate_pairs(&rods, 1.0, 0.0);
/// assert_eq!(pairs, vec![(0, 1)]);
/// ```
#[derive(Debug, Default)]
pub struct SweepAndPrune {
    boxes: Vec<Aabb>,
    order: Vec<usize>,
}

impl SweepAndPrune {
    /// Create an empty broad phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate pairs `(i, j)` with `i < j` whose inflated boxes overlap.
    ///
    /// `radius_ratio` scales each rod's radius (the collision radius used
    /// by narrow phase); `margin` adds a uniform slack on top.
    pub fn find_candidate_pairs(
        &mut self,
        rods: &[Rod],
        radius_ratio: f64,
        margin: f64,
    ) -> Vec<(usize, usize)> {
        self.boxes.clear();
        self.boxes.extend(
            rods.iter()
                .map(|rod| Aabb::of_rod(rod, rod.radius * radius_ratio, margin)),
        );

        let axis = self.widest_axis();

        self.order.clear();
        self.order.extend(0..self.boxes.len());
        let boxes = &self.boxes;
        self.order
            .sort_by(|&a, &b| boxes[a].min_on(axis).total_cmp(&boxes[b].min_on(axis)));

        let mut pairs = Vec::new();
        for (k, &i) in self.order.iter().enumerate() {
            let max_i = self.boxes[i].max_on(axis);
            for &j in &self.order[k + 1..] {
                if self.boxes[j].min_on(axis) > max_i {
                    break;
                }
                if self.boxes[i].overlaps(&self.boxes[j]) {
                    pairs.push((i.min(j), i.max(j)));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }

    /// Coordinate axis with the largest variance of box centres.
    fn widest_axis(&self) -> usize {
        if self.boxes.len() < 2 {
            return 0;
        }
        let n = self.boxes.len() as f64;
        let mut mean = [0.0; 3];
        for b in &self.boxes {
            let c = b.center();
            for (axis, m) in mean.iter_mut().enumerate() {
                *m += c[axis];
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = [0.0; 3];
        for b in &self.boxes {
            let c = b.center();
            for (axis, v) in variance.iter_mut().enumerate() {
                let d = c[axis] - mean[axis];
                *v += d * d;
            }
        }

        let mut best = 0;
        for axis in 1..3 {
            if variance[axis] > variance[best] {
                best = axis;
            }
        }
        best
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;
    use rod_types::RodId;

    fn rod_at(gid: u64, x: f64, y: f64, z: f64) -> Rod {
        Rod::new(
            RodId::new(gid),
            Point3::new(x, y, z),
            UnitQuaternion::identity(),
            1.0,
            0.5,
        )
    }

    #[test]
    fn test_aabb_of_rod() {
        let rod = rod_at(0, 1.0, 2.0, 3.0);
        let aabb = Aabb::of_rod(&rod, 0.5, 0.0);
        assert_eq!(aabb.min, Point3::new(0.5, 1.5, 2.0));
        assert_eq!(aabb.max, Point3::new(1.5, 2.5, 4.0));
    }

    #[test]
    fn test_overlap_includes_touching() {
        let a = Aabb {
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(1.0, 1.0, 1.0),
        };
        let b = Aabb {
            min: Point3::new(1.0, 0.0, 0.0),
            max: Point3::new(2.0, 1.0, 1.0),
        };
        let c = Aabb {
            min: Point3::new(2.5, 0.0, 0.0),
            max: Point3::new(3.0, 1.0, 1.0),
        };
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_pairs_close_and_far() {
        let rods = vec![
            rod_at(0, 0.0, 0.0, 0.0),
            rod_at(1, 0.9, 0.0, 0.0),
            rod_at(2, 10.0, 0.0, 0.0),
            rod_at(3, 10.5, 0.0, 0.0),
        ];
        let mut broad = SweepAndPrune::new();
        let pairs = broad.find_candidate_pairs(&rods, 1.0, 0.0);
        assert_eq!(pairs, vec![(0, 1), (2, 3)]);
    }

    #[test]
    fn test_margin_extends_reach() {
        let rods = vec![rod_at(0, 0.0, 0.0, 0.0), rod_at(1, 2.5, 0.0, 0.0)];
        let mut broad = SweepAndPrune::new();
        assert!(broad.find_candidate_pairs(&rods, 1.0, 0.0).is_empty());
        assert_eq!(
            broad.find_candidate_pairs(&rods, 1.0, 0.8),
            vec![(0, 1)]
        );
    }

    #[test]
    fn test_empty_and_single() {
        let mut broad = SweepAndPrune::new();
        assert!(broad.find_candidate_pairs(&[], 1.0, 0.0).is_empty());
        assert!(broad
            .find_candidate_pairs(&[rod_at(0, 0.0, 0.0, 0.0)], 1.0, 0.0)
            .is_empty());
    }

    #[test]
    fn test_determinism() {
        let rods: Vec<Rod> = (0..20)
            .map(|k| rod_at(k, (k as f64) * 0.7, ((k * 3) % 5) as f64 * 0.4, 0.0))
            .collect();
        let mut broad = SweepAndPrune::new();
        let a = broad.find_candidate_pairs(&rods, 1.0, 0.0);
        let b = broad.find_candidate_pairs(&rods, 1.0, 0.0);
        assert_eq!(a, b);
    }
}
