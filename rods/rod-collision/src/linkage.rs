//! Hookean linkage generation.
//!
//! Rods declare a head-to-tail linkage through [`Rod::link_next`]: the head
//! of rod I is tied to the tail of rod `next` by a spring of rest length
//! `(r_i + r_j) * (1 + buffer)`. Linkages are bilateral blocks: their
//! multiplier is the spring force and is unrestricted in sign.
//!
//! Both endpoints must resolve in the same image: a `link_next` gid that is
//! not present in the directory raises
//! [`ConstraintError::PeriodicLinkage`] instead of silently producing
//! wrong geometry.

use hashbrown::HashMap;
use nalgebra::Vector3;
use rayon::prelude::*;
use rod_constraint::{ConstraintBlock, ConstraintCollector};
use rod_types::{ConstraintError, ResolveConfig, Rod, RodId};

use crate::geometry::GEOM_EPSILON;

/// Build the gid directory for linkage resolution.
#[must_use]
pub fn build_gid_index(rods: &[Rod]) -> HashMap<RodId, usize> {
    rods.iter()
        .enumerate()
        .map(|(index, rod)| (rod.gid, index))
        .collect()
}

/// Generate bilateral linkage blocks for every rod with a declared `next`.
///
/// # Errors
///
/// [`ConstraintError::PeriodicLinkage`] if a `link_next` gid does not
/// resolve in the directory.
pub fn collect_linkages(
    rods: &[Rod],
    gid_index: &HashMap<RodId, usize>,
    collector: &mut ConstraintCollector,
    config: &ResolveConfig,
) -> Result<(), ConstraintError> {
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
        .map(|(pool, range)| {
            for rod_i in &rods[range.clone()] {
                let Some(next) = rod_i.link_next else {
                    continue;
                };
                let Some(&j) = gid_index.get(&next) else {
                    return Err(ConstraintError::PeriodicLinkage {
                        gid_i: rod_i.gid,
                        gid_j: next,
                    });
                };
                let rod_j = &rods[j];

                // Head of I is tied to the tail of J.
                let head_i = rod_i.head();
                let tail_j = rod_j.tail();
                let dvec = head_i - tail_j;
                let dist = dvec.norm();
                let rest =
                    (rod_i.radius + rod_j.radius) * (1.0 + config.separation_buffer_linkages);
                let norm_i = if dist < GEOM_EPSILON {
                    Vector3::z()
                } else {
                    dvec / dist
                };

                pool.push(ConstraintBlock::linkage(
                    rod_i.gid,
                    rod_j.gid,
                    rod_i.global_index,
                    rod_j.global_index,
                    dist - rest,
                    config.link_kappa,
                    norm_i,
                    head_i,
                    tail_j,
                    rod_i.position,
                    rod_j.position,
                ));
            }
            Ok(())
        })
        .collect::<Result<Vec<()>, ConstraintError>>()?;

    Ok(())
}
