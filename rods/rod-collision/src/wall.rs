//! Rod-wall contact generation for planar Z walls.
//!
//! Each enabled wall (lower-Z, upper-Z) is a fixed half-space: contacts
//! against it are one-sided blocks whose J columns are never assembled.
//! For every rod the endpoint with the smaller signed distance to the
//! plane is the contact point; exact ties use the rod midpoint. Rods with
//! both endpoints clear of the wall produce nothing, so the routine is
//! idempotent given fixed positions.

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use rod_constraint::{ConstraintBlock, ConstraintCollector};
use rod_types::{ResolveConfig, Rod};

/// Clearance applied when translating rods out of wall penetration.
const PLACEMENT_BUFFER: f64 = 1e-4;

/// Generate one-sided contact blocks against the enabled walls.
pub fn collect_wall_contacts(
    rods: &[Rod],
    collector: &mut ConstraintCollector,
    config: &ResolveConfig,
) {
    if !config.wall_low_z && !config.wall_high_z {
        return;
    }

    let n_pools = collector.n_pools();
    let chunk_len = rods.len().div_ceil(n_pools).max(1);
    let mut chunks: Vec<std::ops::Range<usize>> = Vec::with_capacity(n_pools);
    for k in 0..n_pools {
        let start = (k * chunk_len).min(rods.len());
        let end = ((k + 1) * chunk_len).min(rods.len());
        chunks.push(start..end);
    }

    collector
        .pools_mut()
        .par_iter_mut()
        .zip(chunks.par_iter())
        .for_each(|(pool, range)| {
            for rod in &rods[range.clone()] {
                if config.wall_low_z {
                    if let Some(block) = lower_wall_block(rod, config.box_low_z, config) {
                        pool.push(block);
                    }
                }
                if config.wall_high_z {
                    if let Some(block) = upper_wall_block(rod, config.box_high_z, config) {
                        pool.push(block);
                    }
                }
            }
        });
}

/// Contact of one rod against the lower wall, if any.
fn lower_wall_block(rod: &Rod, wall_z: f64, config: &ResolveConfig) -> Option<ConstraintBlock> {
    let radius = rod.radius * config.collision_radius_ratio;
    let (tail, head) = rod.endpoints();
    let dist_tail = tail.z - wall_z - radius;
    let dist_head = head.z - wall_z - radius;

    let (loc, delta0) = select_endpoint(rod, tail, head, dist_tail, dist_head)?;
    Some(ConstraintBlock::wall(
        rod.gid,
        rod.global_index,
        delta0,
        Vector3::z(),
        loc,
        Point3::new(loc.x, loc.y, wall_z),
        rod.position,
    ))
}

/// Contact of one rod against the upper wall, if any.
fn upper_wall_block(rod: &Rod, wall_z: f64, config: &ResolveConfig) -> Option<ConstraintBlock> {
    let radius = rod.radius * config.collision_radius_ratio;
    let (tail, head) = rod.endpoints();
    let dist_tail = wall_z - tail.z - radius;
    let dist_head = wall_z - head.z - radius;

    let (loc, delta0) = select_endpoint(rod, tail, head, dist_tail, dist_head)?;
    Some(ConstraintBlock::wall(
        rod.gid,
        rod.global_index,
        delta0,
        -Vector3::z(),
        loc,
        Point3::new(loc.x, loc.y, wall_z),
        rod.position,
    ))
}

/// The endpoint with the smaller signed distance, or the midpoint on an
/// exact tie; `None` when both endpoints are clear of the wall.
fn select_endpoint(
    rod: &Rod,
    tail: Point3<f64>,
    head: Point3<f64>,
    dist_tail: f64,
    dist_head: f64,
) -> Option<(Point3<f64>, f64)> {
    if dist_tail > 0.0 && dist_head > 0.0 {
        return None;
    }
    if dist_tail < dist_head {
        Some((tail, dist_tail))
    } else if dist_head < dist_tail {
        Some((head, dist_head))
    } else {
        Some((rod.position, dist_tail))
    }
}

/// Translate rods along Z so that neither endpoint penetrates an enabled
/// wall, with a small clearance. Used to sanitise initial configurations
/// before the first step.
pub fn push_inside_walls(rods: &mut [Rod], config: &ResolveConfig) {
    for rod in rods.iter_mut() {
        if config.wall_low_z {
            let (tail, head) = rod.endpoints();
            let dist = (tail.z.min(head.z)) - config.box_low_z - rod.radius;
            if dist < 0.0 {
                rod.position.z += -dist + PLACEMENT_BUFFER;
            }
        }
        if config.wall_high_z {
            let (tail, head) = rod.endpoints();
            let dist = config.box_high_z - (tail.z.max(head.z)) - rod.radius;
            if dist < 0.0 {
                rod.position.z -= -dist + PLACEMENT_BUFFER;
            }
        }
    }
}
