//! Sparse storage for the constraint matrix.
//!
//! The constraint matrix D maps multiplier space to generalised-force space
//! (6 DOF per rod). We store its transpose D^T row-compressed: one row per
//! constraint block, columns over the rod DOFs. Each row has at most 12
//! non-zeros (3 force + 3 torque entries per participating rod; 6 for
//! one-sided wall blocks), so CSR gives both the forward product
//! `D^T * v` (row-wise, used for gap rates) and the transpose-accumulate
//! `D * gamma` (scatter into forces) in O(nnz).

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Threshold below which assembled entries are dropped.
const ENTRY_DROP_TOL: f64 = 1e-15;

/// The transposed constraint matrix D^T in CSR format.
///
/// Rows are constraint blocks in deterministic collector order; columns are
/// the mobility DOFs of the distribution map the matrix was assembled
/// against.
#[derive(Debug, Clone)]
pub struct ConstraintMatrix {
    matrix: CsrMatrix<f64>,
    num_rows: usize,
    num_cols: usize,
}

impl ConstraintMatrix {
    /// Build from `(row, col, value)` triplets.
    ///
    /// Near-zero entries are dropped; duplicate positions are summed.
    #[must_use]
    pub fn from_triplets(
        num_rows: usize,
        num_cols: usize,
        triplets: &[(usize, usize, f64)],
    ) -> Self {
        let mut coo = CooMatrix::new(num_rows, num_cols);
        for &(row, col, val) in triplets {
            if val.abs() > ENTRY_DROP_TOL {
                coo.push(row, col, val);
            }
        }
        Self {
            matrix: CsrMatrix::from(&coo),
            num_rows,
            num_cols,
        }
    }

    /// Number of constraint rows.
    #[must_use]
    pub const fn nrows(&self) -> usize {
        self.num_rows
    }

    /// Number of DOF columns.
    #[must_use]
    pub const fn ncols(&self) -> usize {
        self.num_cols
    }

    /// Number of stored non-zero entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Compute `out = D^T * v`: one gap-rate entry per constraint row.
    ///
    /// `v` must have [`Self::ncols`] entries and `out` [`Self::nrows`].
    pub fn mul_vec_into(&self, v: &[f64], out: &mut [f64]) {
        debug_assert_eq!(v.len(), self.num_cols);
        debug_assert_eq!(out.len(), self.num_rows);
        for (row_idx, row) in self.matrix.row_iter().enumerate() {
            let mut sum = 0.0;
            for (&col_idx, &val) in row.col_indices().iter().zip(row.values().iter()) {
                sum += val * v[col_idx];
            }
            out[row_idx] = sum;
        }
    }

    /// Accumulate `out += D * gamma`: scatter multipliers into DOF forces.
    ///
    /// `gamma` must have [`Self::nrows`] entries and `out` [`Self::ncols`].
    pub fn mul_transpose_acc(&self, gamma: &[f64], out: &mut [f64]) {
        debug_assert_eq!(gamma.len(), self.num_rows);
        debug_assert_eq!(out.len(), self.num_cols);
        for (row_idx, row) in self.matrix.row_iter().enumerate() {
            let g = gamma[row_idx];
            if g == 0.0 {
                continue;
            }
            for (&col_idx, &val) in row.col_indices().iter().zip(row.values().iter()) {
                out[col_idx] += val * g;
            }
        }
    }

    /// Compute `D^T * v` into a fresh vector.
    #[must_use]
    pub fn mul_vec(&self, v: &DVector<f64>) -> DVector<f64> {
        let mut out = DVector::zeros(self.num_rows);
        self.mul_vec_into(v.as_slice(), out.as_mut_slice());
        out
    }

    /// Compute `D * gamma` into a fresh vector.
    #[must_use]
    pub fn mul_transpose_vec(&self, gamma: &DVector<f64>) -> DVector<f64> {
        let mut out = DVector::zeros(self.num_cols);
        self.mul_transpose_acc(gamma.as_slice(), out.as_mut_slice());
        out
    }

    /// Convert to a dense matrix (testing and small systems only).
    #[must_use]
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.num_rows, self.num_cols);
        for (row_idx, row) in self.matrix.row_iter().enumerate() {
            for (&col_idx, &val) in row.col_indices().iter().zip(row.values().iter()) {
                dense[(row_idx, col_idx)] = val;
            }
        }
        dense
    }

    /// Access the underlying CSR storage.
    #[must_use]
    pub const fn csr(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_triplets() {
        let triplets = vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 2, 4.0)];
        let m = ConstraintMatrix::from_triplets(2, 3, &triplets);

        assert_eq!(m.nrows(), 2);
        assert_eq!(m.ncols(), 3);
        assert_eq!(m.nnz(), 4);
    }

    #[test]
    fn test_mul_vec() {
        let triplets = vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 4.0)];
        let m = ConstraintMatrix::from_triplets(2, 2, &triplets);
        let v = DVector::from_vec(vec![1.0, 2.0]);

        let out = m.mul_vec(&v);
        assert_relative_eq!(out[0], 5.0, epsilon = 1e-12);
        assert_relative_eq!(out[1], 11.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mul_transpose_accumulates() {
        let triplets = vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 4.0)];
        let m = ConstraintMatrix::from_triplets(2, 2, &triplets);

        let mut out = vec![1.0, 1.0];
        m.mul_transpose_acc(&[1.0, 2.0], &mut out);
        // [1 3]^T scatter: out += [1*1 + 3*2, 2*1 + 4*2]
        assert_relative_eq!(out[0], 8.0, epsilon = 1e-12);
        assert_relative_eq!(out[1], 11.0, epsilon = 1e-12);
    }

    #[test]
    fn test_near_zero_entries_dropped() {
        let triplets = vec![(0, 0, 1.0), (0, 1, 1e-17)];
        let m = ConstraintMatrix::from_triplets(1, 2, &triplets);
        assert_eq!(m.nnz(), 1);
    }

    #[test]
    fn test_to_dense() {
        let triplets = vec![(0, 0, 1.0), (0, 2, 3.0), (1, 1, 2.0)];
        let m = ConstraintMatrix::from_triplets(2, 3, &triplets);
        let dense = m.to_dense();

        assert_relative_eq!(dense[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(dense[(0, 2)], 3.0, epsilon = 1e-12);
        assert_relative_eq!(dense[(1, 1)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(dense[(1, 0)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_matrix() {
        let m = ConstraintMatrix::from_triplets(0, 12, &[]);
        assert_eq!(m.nrows(), 0);
        assert_eq!(m.nnz(), 0);
        let out = m.mul_vec(&DVector::zeros(12));
        assert_eq!(out.len(), 0);
    }
}
