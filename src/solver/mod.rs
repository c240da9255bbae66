//! Sparse linear solving behind a small trait.
//!
//! The Laplacian code only talks to [`LinearSolver`]: it adds matrix entries
//! once, then repeatedly locks variables, adds right-hand sides and asks for a
//! solution. [`SparseSolver`] is the in-crate implementation, backed by a CSR
//! matrix and a Krylov iteration. Any other backend (a direct factorization,
//! a GPU solver) can be plugged in by implementing the trait.
//!
//! # Example
//!
//! ```
//! use laplace_rig::solver::{LinearSolver, SparseSolver, SolverOptions};
//!
//! // x0 = 2, x0 + 2 x1 = 8  => x1 = 3
//! let mut solver = SparseSolver::new(2, SolverOptions::default());
//! solver.add_matrix_entry(0, 0, 1.0);
//! solver.add_matrix_entry(1, 0, 1.0);
//! solver.add_matrix_entry(1, 1, 2.0);
//! solver.lock_variable(0, 2.0);
//! solver.add_rhs(1, 8.0);
//! solver.solve().unwrap();
//! assert!((solver.variable(1) - 3.0).abs() < 1e-8);
//! ```

pub mod sparse;

use nalgebra::DVector;

use crate::error::{LaplacianError, Result};

use self::sparse::{bicgstab, conjugate_gradient, CsrMatrix};

/// Contract between the Laplacian system and a sparse linear solver.
///
/// Matrix entries are additive and persist for the solver's lifetime. Locked
/// variables and right-hand sides belong to a single solve pass: [`solve`]
/// consumes them whether it succeeds or not.
///
/// [`solve`]: LinearSolver::solve
pub trait LinearSolver {
    /// Number of unknowns.
    fn num_variables(&self) -> usize;

    /// Add `value` to the matrix entry at `(row, col)`.
    fn add_matrix_entry(&mut self, row: usize, col: usize, value: f64);

    /// Fix unknown `index` to `value` for the current pass.
    fn lock_variable(&mut self, index: usize, value: f64);

    /// Add `value` to the right-hand side of equation `row`.
    fn add_rhs(&mut self, row: usize, value: f64);

    /// Solve the current pass.
    fn solve(&mut self) -> Result<()>;

    /// Value of unknown `index` after the last successful solve.
    fn variable(&self, index: usize) -> f64;
}

/// Iteration used by [`SparseSolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverMethod {
    /// Jacobi-preconditioned conjugate gradient. Requires a symmetric matrix.
    ConjugateGradient,
    /// Row-equilibrated BiCGSTAB. Works for non-symmetric matrices.
    BiCgStab,
}

/// Options for the sparse solver.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Iteration scheme.
    pub method: SolverMethod,

    /// Maximum number of Krylov iterations per solve.
    pub max_iterations: usize,

    /// Convergence tolerance (relative residual norm).
    pub tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: SolverMethod::BiCgStab,
            max_iterations: 5000,
            tolerance: 1e-10,
        }
    }
}

impl SolverOptions {
    /// Options for symmetric systems (conjugate gradient).
    pub fn symmetric() -> Self {
        Self {
            method: SolverMethod::ConjugateGradient,
            ..Self::default()
        }
    }

    /// Set the iteration scheme.
    pub fn with_method(mut self, method: SolverMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the maximum iterations per solve.
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }
}

/// Sparse solver that eliminates locked variables and iterates on the rest.
#[derive(Debug, Clone)]
pub struct SparseSolver {
    n: usize,
    options: SolverOptions,
    triplets: Vec<(usize, usize, f64)>,
    /// Assembled matrix, rebuilt when entries are added after a solve.
    matrix: Option<CsrMatrix>,
    locked: Vec<Option<f64>>,
    rhs: DVector<f64>,
    solution: DVector<f64>,
}

impl SparseSolver {
    /// Open a solver for `n` unknowns.
    pub fn new(n: usize, options: SolverOptions) -> Self {
        Self {
            n,
            options,
            triplets: Vec::new(),
            matrix: None,
            locked: vec![None; n],
            rhs: DVector::zeros(n),
            solution: DVector::zeros(n),
        }
    }

    /// The solver options.
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// The assembled matrix (before elimination of locked variables).
    pub fn matrix(&mut self) -> &CsrMatrix {
        let n = self.n;
        let triplets = &self.triplets;
        self.matrix
            .get_or_insert_with(|| CsrMatrix::from_triplets(n, n, triplets.clone()))
    }

    /// Sum of all entries added at `(row, col)`.
    pub fn entry(&self, row: usize, col: usize) -> f64 {
        self.triplets
            .iter()
            .filter(|&&(r, c, _)| r == row && c == col)
            .map(|&(_, _, v)| v)
            .sum()
    }

    /// Build the reduced system: locked rows become identity rows and locked
    /// columns move to the right-hand side.
    fn eliminate(&mut self) -> (CsrMatrix, DVector<f64>) {
        let n = self.n;
        let mut rhs = std::mem::replace(&mut self.rhs, DVector::zeros(n));
        let locked = std::mem::replace(&mut self.locked, vec![None; n]);

        let matrix = self.matrix();
        let mut triplets = Vec::with_capacity(matrix.nnz());
        for (r, c, v) in matrix.triplets() {
            if locked[r].is_some() {
                continue;
            }
            match locked[c] {
                Some(value) => rhs[r] -= v * value,
                None => triplets.push((r, c, v)),
            }
        }
        for (i, lock) in locked.iter().enumerate() {
            if let Some(value) = *lock {
                triplets.push((i, i, 1.0));
                rhs[i] = value;
            }
        }

        (CsrMatrix::from_triplets(n, n, triplets), rhs)
    }
}

impl LinearSolver for SparseSolver {
    fn num_variables(&self) -> usize {
        self.n
    }

    fn add_matrix_entry(&mut self, row: usize, col: usize, value: f64) {
        self.triplets.push((row, col, value));
        self.matrix = None;
    }

    fn lock_variable(&mut self, index: usize, value: f64) {
        self.locked[index] = Some(value);
    }

    fn add_rhs(&mut self, row: usize, value: f64) {
        self.rhs[row] += value;
    }

    fn solve(&mut self) -> Result<()> {
        let locks: Vec<Option<f64>> = self.locked.clone();
        let (mut a, mut b) = self.eliminate();

        let diagonal = a.diagonal();
        if let Some(row) = diagonal.iter().position(|d| *d == 0.0) {
            return Err(LaplacianError::solve_failed(format!(
                "equation {row} has a zero diagonal (vertex without triangles)"
            )));
        }

        let opts = &self.options;
        let x = match opts.method {
            SolverMethod::ConjugateGradient => conjugate_gradient(
                &a,
                &b,
                Some(&self.solution),
                opts.max_iterations,
                opts.tolerance,
            )?,
            SolverMethod::BiCgStab => {
                let scale = diagonal.map(|d| 1.0 / d);
                a.scale_rows(&scale);
                b.component_mul_assign(&scale);
                bicgstab(&a, &b, Some(&self.solution), opts.max_iterations, opts.tolerance)?
            }
        };

        if x.iter().any(|v| !v.is_finite()) {
            return Err(LaplacianError::solve_failed("solution is not finite"));
        }

        self.solution = x;
        // Locked unknowns are exact, not iterates.
        for (i, lock) in locks.iter().enumerate() {
            if let Some(value) = *lock {
                self.solution[i] = value;
            }
        }
        Ok(())
    }

    fn variable(&self, index: usize) -> f64 {
        self.solution[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Path graph Laplacian on `n` nodes plus `shift` on the diagonal.
    fn path_solver(n: usize, shift: f64, options: SolverOptions) -> SparseSolver {
        let mut solver = SparseSolver::new(n, options);
        for i in 0..n - 1 {
            solver.add_matrix_entry(i, i, 1.0);
            solver.add_matrix_entry(i + 1, i + 1, 1.0);
            solver.add_matrix_entry(i, i + 1, -1.0);
            solver.add_matrix_entry(i + 1, i, -1.0);
        }
        for i in 0..n {
            solver.add_matrix_entry(i, i, shift);
        }
        solver
    }

    #[test]
    fn test_locked_ends_interpolate() {
        // Pure Laplacian with both ends locked: linear interpolation.
        for options in [SolverOptions::default(), SolverOptions::symmetric()] {
            let mut solver = path_solver(5, 0.0, options);
            solver.lock_variable(0, 0.0);
            solver.lock_variable(4, 4.0);
            solver.solve().unwrap();

            for i in 0..5 {
                assert!((solver.variable(i) - i as f64).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn test_locked_variable_ignores_rhs() {
        let mut solver = path_solver(3, 0.0, SolverOptions::symmetric());
        solver.lock_variable(0, 1.5);
        solver.lock_variable(2, -1.0);
        solver.add_rhs(0, 100.0);
        solver.add_rhs(2, -7.0);
        solver.solve().unwrap();

        assert_eq!(solver.variable(0), 1.5);
        assert_eq!(solver.variable(2), -1.0);
        assert!((solver.variable(1) - 0.25).abs() < 1e-8);
    }

    #[test]
    fn test_pass_is_consumed() {
        let mut solver = path_solver(3, 1.0, SolverOptions::default());
        solver.add_rhs(1, 3.0);
        solver.solve().unwrap();
        let first = solver.variable(1);
        assert!(first > 0.0);

        // A second pass without right-hand sides solves the homogeneous system.
        solver.solve().unwrap();
        for i in 0..3 {
            assert!(solver.variable(i).abs() < 1e-8);
        }
    }

    #[test]
    fn test_zero_row_fails() {
        let mut solver = SparseSolver::new(3, SolverOptions::default());
        solver.add_matrix_entry(0, 0, 1.0);
        solver.add_matrix_entry(1, 1, 1.0);
        solver.add_rhs(0, 1.0);

        let err = solver.solve().unwrap_err();
        assert!(err.is_solver_failure());
    }

    #[test]
    fn test_entry_accumulates() {
        let mut solver = SparseSolver::new(2, SolverOptions::default());
        solver.add_matrix_entry(0, 1, -0.5);
        solver.add_matrix_entry(0, 1, -0.25);
        assert_eq!(solver.entry(0, 1), -0.75);
        assert_eq!(solver.matrix().get(0, 1), -0.75);
        assert_eq!(solver.entry(1, 0), 0.0);
    }
}
