//! Sparse matrix utilities.
//!
//! Helper functions for working with nalgebra-sparse matrices.

use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Create a CSC matrix from triplets (row, col, value).
///
/// Duplicates are summed together. Entries outside the shape are dropped.
pub fn csc_from_triplets(
    nrows: usize,
    ncols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<f64>,
) -> CscMatrix<f64> {
    if rows.is_empty() {
        return CscMatrix::zeros(nrows, ncols);
    }

    let mut coo = CooMatrix::new(nrows, ncols);
    for ((row, col), val) in rows.into_iter().zip(cols).zip(vals) {
        if row < nrows && col < ncols {
            coo.push(row, col, val);
        }
    }

    CscMatrix::from(&coo)
}

/// Dense copy of one row, for inspection and tests.
pub fn csc_row(m: &CscMatrix<f64>, row: usize) -> Vec<f64> {
    let mut dense = vec![0.0; m.ncols()];
    for (r, c, v) in m.triplet_iter() {
        if r == row {
            dense[c] += *v;
        }
    }
    dense
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csc_from_triplets() {
        let m = csc_from_triplets(3, 3, vec![0, 1, 2], vec![0, 1, 2], vec![1.0, 2.0, 3.0]);
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 3);
        assert_eq!(m.nnz(), 3);
    }

    #[test]
    fn test_duplicates_are_summed() {
        let m = csc_from_triplets(1, 2, vec![0, 0, 0], vec![1, 1, 0], vec![1.0, 2.5, 4.0]);
        assert_eq!(csc_row(&m, 0), vec![4.0, 3.5]);
    }

    #[test]
    fn test_empty_is_zeros() {
        let m = csc_from_triplets(2, 4, vec![], vec![], vec![]);
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.ncols(), 4);
        assert_eq!(m.nnz(), 0);
    }
}
