//! Compressed sparse row storage and Krylov iterations.
//!
//! The matrix type is deliberately small: it only needs to be assembled from
//! triplets, multiplied with a vector and inspected along its diagonal.

use nalgebra::DVector;

use crate::error::{LaplacianError, Result};

/// Breakdown threshold for the scalar denominators of the iterations.
const BREAKDOWN: f64 = 1e-300;

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// `row_ptr[i]..row_ptr[i + 1]` indexes the entries of row `i`.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from triplets (row, col, value).
    ///
    /// Duplicate entries at the same (row, col) are summed.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            debug_assert!(row < rows && col < cols, "triplet ({row}, {col}) out of bounds");
            if last == Some((row, col)) {
                if let Some(acc) = values.last_mut() {
                    *acc += val;
                }
                continue;
            }
            col_idx.push(col);
            values.push(val);
            row_ptr[row + 1] += 1;
            last = Some((row, col));
        }

        // Counts to offsets
        for r in 0..rows {
            row_ptr[r + 1] += row_ptr[r];
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Get the number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Get the number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Get the number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterate over the stored `(col, value)` pairs of one row.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        self.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Iterate over all stored `(row, col, value)` triplets in row order.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.rows).flat_map(move |r| self.row(r).map(move |(c, v)| (r, c, v)))
    }

    /// Value stored at `(row, col)`, zero when absent.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        match self.col_idx[range.clone()].binary_search(&col) {
            Ok(k) => self.values[range.start + k],
            Err(_) => 0.0,
        }
    }

    /// Diagonal of the matrix.
    pub fn diagonal(&self) -> DVector<f64> {
        let n = self.rows.min(self.cols);
        DVector::from_iterator(n, (0..n).map(|i| self.get(i, i)))
    }

    /// Multiply matrix by vector: y = A * x.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.cols, "Vector dimension mismatch");

        let mut y = DVector::zeros(self.rows);
        for i in 0..self.rows {
            y[i] = self.row(i).map(|(c, v)| v * x[c]).sum();
        }
        y
    }

    /// Scale every row `i` by `factors[i]`.
    pub fn scale_rows(&mut self, factors: &DVector<f64>) {
        assert_eq!(factors.len(), self.rows, "Scale dimension mismatch");
        for i in 0..self.rows {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                self.values[k] *= factors[i];
            }
        }
    }
}

/// Inverse of the diagonal, with `1.0` standing in for zero entries.
fn jacobi(a: &CsrMatrix) -> DVector<f64> {
    a.diagonal()
        .map(|d| if d.abs() > BREAKDOWN { 1.0 / d } else { 1.0 })
}

/// Solve A*x = b using the Jacobi-preconditioned Conjugate Gradient method.
///
/// Requires A to be symmetric positive definite.
///
/// # Arguments
///
/// * `a` - The system matrix (must be symmetric positive definite)
/// * `b` - The right-hand side vector
/// * `x0` - Optional initial guess (zeros if None)
/// * `max_iter` - Maximum number of iterations
/// * `tolerance` - Convergence tolerance (relative residual norm)
pub fn conjugate_gradient(
    a: &CsrMatrix,
    b: &DVector<f64>,
    x0: Option<&DVector<f64>>,
    max_iter: usize,
    tolerance: f64,
) -> Result<DVector<f64>> {
    let n = b.len();
    assert_eq!(a.nrows(), n, "Matrix-vector dimension mismatch");
    assert_eq!(a.ncols(), n, "Matrix must be square");

    let mut x = x0.cloned().unwrap_or_else(|| DVector::zeros(n));

    let b_norm = b.norm();
    if b_norm < 1e-15 {
        return Ok(DVector::zeros(n));
    }

    let inv_diag = jacobi(a);
    let mut r = b - a.mul_vec(&x);
    if r.norm() / b_norm < tolerance {
        return Ok(x);
    }

    let mut z = r.component_mul(&inv_diag);
    let mut p = z.clone();
    let mut rz = r.dot(&z);

    for _iter in 0..max_iter {
        let ap = a.mul_vec(&p);

        let p_ap = p.dot(&ap);
        if p_ap.abs() < BREAKDOWN {
            return Err(LaplacianError::solve_failed(
                "conjugate gradient breakdown (matrix singular or indefinite)",
            ));
        }
        let alpha = rz / p_ap;

        x += alpha * &p;
        r -= alpha * &ap;

        if r.norm() / b_norm < tolerance {
            return Ok(x);
        }

        z = r.component_mul(&inv_diag);
        let rz_new = r.dot(&z);
        let beta = rz_new / rz;
        p = &z + beta * &p;
        rz = rz_new;
    }

    Err(LaplacianError::ConvergenceFailed {
        iterations: max_iter,
    })
}

/// Solve A*x = b for a general square matrix using BiCGSTAB.
///
/// The rows are expected to be pre-scaled (see [`CsrMatrix::scale_rows`]);
/// no further preconditioning is applied.
pub fn bicgstab(
    a: &CsrMatrix,
    b: &DVector<f64>,
    x0: Option<&DVector<f64>>,
    max_iter: usize,
    tolerance: f64,
) -> Result<DVector<f64>> {
    let n = b.len();
    assert_eq!(a.nrows(), n, "Matrix-vector dimension mismatch");
    assert_eq!(a.ncols(), n, "Matrix must be square");

    let mut x = x0.cloned().unwrap_or_else(|| DVector::zeros(n));

    let b_norm = b.norm();
    if b_norm < 1e-15 {
        return Ok(DVector::zeros(n));
    }

    let mut r = b - a.mul_vec(&x);
    if r.norm() / b_norm < tolerance {
        return Ok(x);
    }

    let r_hat = r.clone();
    let mut rho = 1.0;
    let mut alpha = 1.0;
    let mut omega = 1.0;
    let mut v = DVector::zeros(n);
    let mut p = DVector::zeros(n);

    for _iter in 0..max_iter {
        let rho_new = r_hat.dot(&r);
        if rho_new.abs() < BREAKDOWN {
            return Err(LaplacianError::solve_failed("BiCGSTAB breakdown (rho vanished)"));
        }

        let beta = (rho_new / rho) * (alpha / omega);
        p = &r + beta * (&p - omega * &v);
        v = a.mul_vec(&p);

        let r_hat_v = r_hat.dot(&v);
        if r_hat_v.abs() < BREAKDOWN {
            return Err(LaplacianError::solve_failed("BiCGSTAB breakdown (singular direction)"));
        }
        alpha = rho_new / r_hat_v;

        let s = &r - alpha * &v;
        if s.norm() / b_norm < tolerance {
            x += alpha * &p;
            return Ok(x);
        }

        let t = a.mul_vec(&s);
        let t_t = t.dot(&t);
        if t_t < BREAKDOWN {
            return Err(LaplacianError::solve_failed("BiCGSTAB breakdown (stagnation)"));
        }
        omega = t.dot(&s) / t_t;

        x += alpha * &p + omega * &s;
        r = s - omega * t;

        if r.norm() / b_norm < tolerance {
            return Ok(x);
        }
        if omega.abs() < BREAKDOWN {
            return Err(LaplacianError::solve_failed("BiCGSTAB breakdown (omega vanished)"));
        }

        rho = rho_new;
    }

    Err(LaplacianError::ConvergenceFailed {
        iterations: max_iter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd_2x2() -> CsrMatrix {
        // [ 4  1 ]
        // [ 1  3 ]
        CsrMatrix::from_triplets(2, 2, vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)])
    }

    #[test]
    fn test_csr_from_triplets() {
        let a = spd_2x2();
        assert_eq!(a.nrows(), 2);
        assert_eq!(a.ncols(), 2);
        assert_eq!(a.nnz(), 4);
        assert_eq!(a.get(0, 1), 1.0);
        assert_eq!(a.diagonal(), DVector::from_vec(vec![4.0, 3.0]));
    }

    #[test]
    fn test_csr_duplicates_summed_and_empty_rows() {
        let triplets = vec![(2, 2, 1.0), (0, 0, 2.0), (0, 0, 2.0), (2, 0, -1.0)];
        let a = CsrMatrix::from_triplets(3, 3, triplets);

        assert_eq!(a.nnz(), 3);
        assert_eq!(a.get(0, 0), 4.0);
        assert_eq!(a.row(1).count(), 0);
        assert_eq!(a.get(2, 0), -1.0);
        assert_eq!(a.get(1, 1), 0.0);

        let collected: Vec<_> = a.triplets().collect();
        assert_eq!(collected, vec![(0, 0, 4.0), (2, 0, -1.0), (2, 2, 1.0)]);
    }

    #[test]
    fn test_csr_mul_vec_and_scale() {
        let mut a = spd_2x2();
        let x = DVector::from_vec(vec![1.0, 1.0]);
        let y = a.mul_vec(&x);
        assert!((y[0] - 5.0).abs() < 1e-12);
        assert!((y[1] - 4.0).abs() < 1e-12);

        a.scale_rows(&DVector::from_vec(vec![0.5, 2.0]));
        assert_eq!(a.get(0, 0), 2.0);
        assert_eq!(a.get(1, 0), 2.0);
    }

    #[test]
    fn test_cg_simple() {
        // Solution: x = 1/11, y = 7/11
        let a = spd_2x2();
        let b = DVector::from_vec(vec![1.0, 2.0]);

        let x = conjugate_gradient(&a, &b, None, 100, 1e-12).unwrap();
        assert!((x[0] - 1.0 / 11.0).abs() < 1e-10);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-10);
    }

    #[test]
    fn test_cg_with_initial_guess() {
        let a = spd_2x2();
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let x0 = DVector::from_vec(vec![0.1, 0.6]);

        let x = conjugate_gradient(&a, &b, Some(&x0), 100, 1e-12).unwrap();
        let residual = a.mul_vec(&x) - b;
        assert!(residual.norm() < 1e-10);
    }

    #[test]
    fn test_cg_zero_rhs() {
        let a = spd_2x2();
        let x = conjugate_gradient(&a, &DVector::zeros(2), None, 10, 1e-12).unwrap();
        assert_eq!(x, DVector::zeros(2));
    }

    #[test]
    fn test_bicgstab_nonsymmetric() {
        // Row-scaled Laplacian-like system, diagonally dominant but not symmetric.
        let triplets = vec![
            (0, 0, 10.0),
            (0, 1, -2.0),
            (1, 0, -5.0),
            (1, 1, 12.0),
            (1, 2, -1.0),
            (2, 1, -4.0),
            (2, 2, 9.0),
            (2, 3, -3.0),
            (3, 2, -0.5),
            (3, 3, 4.0),
        ];
        let a = CsrMatrix::from_triplets(4, 4, triplets);
        let b = DVector::from_vec(vec![1.0, -2.0, 3.0, 0.5]);

        let x = bicgstab(&a, &b, None, 200, 1e-12).unwrap();
        let residual = a.mul_vec(&x) - &b;
        assert!(residual.norm() < 1e-9, "residual {}", residual.norm());
    }

    #[test]
    fn test_bicgstab_iteration_limit() {
        let triplets = vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 1.0), (2, 2, 5.0)];
        let a = CsrMatrix::from_triplets(3, 3, triplets);
        let b = DVector::from_vec(vec![1.0, 1.0, 1.0]);

        assert!(bicgstab(&a, &b, None, 0, 1e-12).is_err());
    }
}
