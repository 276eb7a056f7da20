//! Thread-partitioned constraint block pools.
//!
//! Producers append blocks to per-worker pools without locking; the
//! collector later exposes all blocks as a single sparse operator. Global
//! ordering is the concatenation of pools in ascending pool index, each in
//! insertion order, which fixes the row indexing of D^T and the layout of
//! the gap and multiplier vectors for a given worker count.

use nalgebra::{DVector, Matrix3};
use rod_types::{ConstraintError, DofMap, DOF_PER_ROD};

use crate::{ConstraintBlock, ConstraintMatrix};

/// Result of assembling a collector against a distribution map.
#[derive(Debug, Clone)]
pub struct AssembledConstraints {
    /// The transposed constraint matrix D^T (rows = blocks, cols = DOFs).
    pub matrix: ConstraintMatrix,
    /// Reference-configuration gaps, one per row.
    pub delta0: DVector<f64>,
    /// Initial multiplier estimates, one per row.
    pub gamma_init: DVector<f64>,
    /// Spring constants per row; `Some` exactly on bilateral rows.
    pub kappa: Vec<Option<f64>>,
}

impl AssembledConstraints {
    /// Number of constraint rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.delta0.len()
    }

    /// Whether the assembly holds no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delta0.len() == 0
    }
}

/// Append-only pools of constraint blocks, one per worker.
///
/// # Example
///
/// ```
/// use rod_constraint::{ConstraintBlock, ConstraintCollector};
/// use rod_types::{DofMap, RodId};
/// use nalgebra::{Point3, Vector3};
///
/// let mut collector = ConstraintCollector::new(2);
/// collector.append(0, ConstraintBlock::wall(
///     RodId::new(0), 0, -0.01, Vector3::z(),
///     Point3::new(0.0, 0.0, 0.09), Point3::origin(), Point3::new(0.0, 0.0, 0.4),
/// ));
/// assert_eq!(collector.count(), 1);
///
/// let assembled = collector.build(&DofMap::new(1, 0)).unwrap();
/// assert_eq!(assembled.matrix.nrows(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ConstraintCollector {
    pools: Vec<Vec<ConstraintBlock>>,
}

impl ConstraintCollector {
    /// Create a collector with `n_pools` worker pools (at least one).
    #[must_use]
    pub fn new(n_pools: usize) -> Self {
        Self {
            pools: vec![Vec::new(); n_pools.max(1)],
        }
    }

    /// Number of worker pools.
    #[must_use]
    pub fn n_pools(&self) -> usize {
        self.pools.len()
    }

    /// Drop all blocks, keeping the pool structure.
    pub fn clear(&mut self) {
        for pool in &mut self.pools {
            pool.clear();
        }
    }

    /// Append a block to the given worker pool. O(1) amortised.
    pub fn append(&mut self, pool: usize, block: ConstraintBlock) {
        debug_assert!(pool < self.pools.len());
        self.pools[pool].push(block);
    }

    /// Total number of blocks across all pools.
    #[must_use]
    pub fn count(&self) -> usize {
        self.pools.iter().map(Vec::len).sum()
    }

    /// Whether the collector holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.iter().all(Vec::is_empty)
    }

    /// Disjoint mutable access to the pools for parallel producers.
    ///
    /// Each worker owns exactly one pool; splitting the returned slice
    /// (e.g. with rayon) keeps appends lock-free.
    pub fn pools_mut(&mut self) -> &mut [Vec<ConstraintBlock>] {
        &mut self.pools
    }

    /// Iterate blocks in deterministic pool order.
    pub fn blocks(&self) -> impl Iterator<Item = &ConstraintBlock> {
        self.pools.iter().flatten()
    }

    /// Iterate blocks mutably in deterministic pool order.
    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut ConstraintBlock> {
        self.pools.iter_mut().flatten()
    }

    /// Assemble D^T and the per-row gap, multiplier and spring vectors.
    ///
    /// Row order is the deterministic pool order. Column indices come from
    /// the distribution map; for `one_side` blocks only the 6 I-side
    /// entries are emitted.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::AssemblyInconsistency`] if a block references a
    /// global index the map cannot resolve.
    pub fn build(&self, map: &DofMap) -> Result<AssembledConstraints, ConstraintError> {
        let num_rows = self.count();
        let num_cols = map.dofs();

        let mut triplets = Vec::with_capacity(num_rows * 2 * DOF_PER_ROD);
        let mut delta0 = DVector::zeros(num_rows);
        let mut gamma_init = DVector::zeros(num_rows);
        let mut kappa = Vec::with_capacity(num_rows);

        for (row, block) in self.blocks().enumerate() {
            let col_i = map.col_of_global(block.global_index_i).ok_or(
                ConstraintError::AssemblyInconsistency {
                    gid_i: block.gid_i,
                    gid_j: block.gid_j,
                },
            )?;
            push_side(&mut triplets, row, col_i, &block.norm_i, &block.torque_i());

            if !block.one_side {
                let col_j = map.col_of_global(block.global_index_j).ok_or(
                    ConstraintError::AssemblyInconsistency {
                        gid_i: block.gid_i,
                        gid_j: block.gid_j,
                    },
                )?;
                push_side(&mut triplets, row, col_j, &block.norm_j, &block.torque_j());
            }

            delta0[row] = block.delta0;
            gamma_init[row] = block.gamma;
            kappa.push(block.kappa);
        }

        Ok(AssembledConstraints {
            matrix: ConstraintMatrix::from_triplets(num_rows, num_cols, &triplets),
            delta0,
            gamma_init,
            kappa,
        })
    }

    /// Store post-solve multipliers back into the block records.
    ///
    /// `gamma` must follow the same deterministic pool order as
    /// [`Self::build`].
    ///
    /// # Errors
    ///
    /// [`ConstraintError::InvalidInput`] on a length mismatch.
    pub fn writeback_gamma(&mut self, gamma: &[f64]) -> Result<(), ConstraintError> {
        if gamma.len() != self.count() {
            return Err(ConstraintError::invalid_input(format!(
                "writeback expected {} multipliers, got {}",
                self.count(),
                gamma.len()
            )));
        }
        for (block, &g) in self.blocks_mut().zip(gamma.iter()) {
            block.gamma = g;
        }
        Ok(())
    }

    /// Sum the virial stress `gamma * stress` over all two-sided blocks.
    ///
    /// Uses the multipliers stored in the blocks, so call after
    /// [`Self::writeback_gamma`] for post-solve stress.
    #[must_use]
    pub fn sum_stress(&self) -> Matrix3<f64> {
        let mut total = Matrix3::zeros();
        for block in self.blocks().filter(|b| !b.one_side) {
            total += block.stress * block.gamma;
        }
        total
    }
}

/// Push the 6 entries of one body side: 3 force, 3 torque.
fn push_side(
    triplets: &mut Vec<(usize, usize, f64)>,
    row: usize,
    col: usize,
    norm: &nalgebra::Vector3<f64>,
    torque: &nalgebra::Vector3<f64>,
) {
    for k in 0..3 {
        triplets.push((row, col + k, norm[k]));
        triplets.push((row, col + 3 + k, torque[k]));
    }
}
