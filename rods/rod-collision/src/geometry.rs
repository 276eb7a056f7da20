//! Closest-point geometry for rod axes.

use nalgebra::Point3;

/// Threshold below which segment directions are treated as degenerate.
pub const GEOM_EPSILON: f64 = 1e-12;

/// Closest points between two finite segments `[p1, q1]` and `[p2, q2]`.
///
/// Standard two-segment closest-point computation: solve the unconstrained
/// two-parameter system, then clamp each parameter to `[0, 1]` and
/// recompute the other. Parallel and degenerate segments resolve to the
/// smaller parameter, which makes tie-breaking deterministic.
#[must_use]
pub fn closest_points_segments(
    p1: Point3<f64>,
    q1: Point3<f64>,
    p2: Point3<f64>,
    q2: Point3<f64>,
) -> (Point3<f64>, Point3<f64>) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;

    let a = d1.dot(&d1);
    let e = d2.dot(&d2);
    let f = d2.dot(&r);

    // Degenerate segments collapse to their base point.
    if a < GEOM_EPSILON && e < GEOM_EPSILON {
        return (p1, p2);
    }
    if a < GEOM_EPSILON {
        let t = (f / e).clamp(0.0, 1.0);
        return (p1, p2 + d2 * t);
    }
    if e < GEOM_EPSILON {
        let s = (-d1.dot(&r) / a).clamp(0.0, 1.0);
        return (p1 + d1 * s, p2);
    }

    let b = d1.dot(&d2);
    let c = d1.dot(&r);
    // Determinant of the 2x2 system: denom = a*e - b^2 (intentionally b*b)
    #[allow(clippy::suspicious_operation_groupings)]
    let denom = a * e - b * b;

    let (mut s, mut t) = if denom.abs() < GEOM_EPSILON {
        // Parallel segments: pin s to the smaller parameter.
        (0.0, f / e)
    } else {
        let s_val = (b * f - c * e) / denom;
        let t_val = (b * s_val + f) / e;
        (s_val, t_val)
    };

    // Clamp to [0, 1] and recompute the partner parameter.
    if s < 0.0 {
        s = 0.0;
        t = (f / e).clamp(0.0, 1.0);
    } else if s > 1.0 {
        s = 1.0;
        t = ((b + f) / e).clamp(0.0, 1.0);
    }

    if t < 0.0 {
        t = 0.0;
        s = (-c / a).clamp(0.0, 1.0);
    } else if t > 1.0 {
        t = 1.0;
        s = ((b - c) / a).clamp(0.0, 1.0);
    }

    (p1 + d1 * s, p2 + d2 * t)
}
