//! Rod-rod contact generation.
//!
//! Turns broad-phase candidate pairs into unilateral constraint blocks.
//! Work is partitioned over the collector's worker pools: pair chunk `k`
//! appends only to pool `k`, so the emission order is deterministic for a
//! fixed pool count and no locking is needed.

use nalgebra::Vector3;
use rayon::prelude::*;
use rod_constraint::{ConstraintBlock, ConstraintCollector};
use rod_types::{ResolveConfig, Rod};

use crate::geometry::{closest_points_segments, GEOM_EPSILON};

/// Per-rod reporting from a contact generation pass.
#[derive(Debug, Clone)]
pub struct ContactReport {
    /// Minimum axis-to-axis distance seen per rod over all candidate
    /// pairs, `INFINITY` for rods with no candidates.
    pub sepmin: Vec<f64>,
    /// Number of contacts whose normal fell back to the canonical
    /// direction because the closest points coincided.
    pub degenerate_normals: usize,
}

/// Generate unilateral contact blocks for the given candidate pairs.
///
/// For each pair the minimum distance `d` between the two axis segments is
/// computed; if `d <= r_i + r_j` (collision radii) a block is emitted with
/// gap `d - (r_i + r_j) * (1 + buffer)` and the force direction pointing
/// from the J-side closest point toward the I-side one. Closest points
/// closer than [`GEOM_EPSILON`] use the canonical +Z normal and are
/// counted in the report.
pub fn collect_pair_contacts(
    rods: &[Rod],
    pairs: &[(usize, usize)],
    collector: &mut ConstraintCollector,
    config: &ResolveConfig,
) -> ContactReport {
    let n_pools = collector.n_pools();
    let chunk_len = pairs.len().div_ceil(n_pools).max(1);
    let mut chunks: Vec<&[(usize, usize)]> = Vec::with_capacity(n_pools);
    for k in 0..n_pools {
        let start = (k * chunk_len).min(pairs.len());
        let end = ((k + 1) * chunk_len).min(pairs.len());
        chunks.push(&pairs[start..end]);
    }

    let worker_reports: Vec<(Vec<f64>, usize)> = collector
        .pools_mut()
        .par_iter_mut()
        .zip(chunks.par_iter())
        .map(|(pool, chunk)| {
            let mut sepmin = vec![f64::INFINITY; rods.len()];
            let mut degenerate = 0;

            for &(i, j) in chunk.iter() {
                let rod_i = &rods[i];
                let rod_j = &rods[j];
                let r_i = rod_i.radius * config.collision_radius_ratio;
                let r_j = rod_j.radius * config.collision_radius_ratio;

                let (tail_i, head_i) = rod_i.endpoints();
                let (tail_j, head_j) = rod_j.endpoints();
                let (p_i, p_j) = closest_points_segments(tail_i, head_i, tail_j, head_j);
                let dvec = p_i - p_j;
                let d = dvec.norm();

                sepmin[i] = sepmin[i].min(d);
                sepmin[j] = sepmin[j].min(d);

                if d > r_i + r_j {
                    continue;
                }

                let norm_i = if d < GEOM_EPSILON {
                    degenerate += 1;
                    Vector3::z()
                } else {
                    dvec / d
                };
                let delta0 = d - (r_i + r_j) * (1.0 + config.separation_buffer_contacts);
                pool.push(ConstraintBlock::contact(
                    rod_i.gid,
                    rod_j.gid,
                    rod_i.global_index,
                    rod_j.global_index,
                    delta0,
                    norm_i,
                    p_i,
                    p_j,
                    rod_i.position,
                    rod_j.position,
                ));
            }

            (sepmin, degenerate)
        })
        .collect();

    let mut sepmin = vec![f64::INFINITY; rods.len()];
    let mut degenerate_normals = 0;
    for (local, degenerate) in worker_reports {
        for (global, value) in sepmin.iter_mut().zip(local) {
            *global = global.min(value);
        }
        degenerate_normals += degenerate;
    }

    if degenerate_normals > 0 {
        tracing::warn!(
            count = degenerate_normals,
            "contact normals fell back to the canonical direction"
        );
    }

    ContactReport {
        sepmin,
        degenerate_normals,
    }
}
