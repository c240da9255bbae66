//! The finalized Laplacian and its solve passes.

use nalgebra::Point3;

use crate::error::Result;
use crate::solver::{LinearSolver, SparseSolver};

/// A coordinate axis, used to pin vertices along one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// The x axis.
    X,
    /// The y axis.
    Y,
    /// The z axis.
    Z,
}

impl Axis {
    /// All three axes in order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Component index (0, 1 or 2).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// An assembled Laplacian bound to its solver.
///
/// Produced by [`LaplacianBuilder::end`](super::LaplacianBuilder::end). A
/// solve pass is opened with [`begin_solve`](Self::begin_solve), filled with
/// [`add_right_hand_side`](Self::add_right_hand_side) and closed by
/// [`solve`](Self::solve). The matrix survives any number of passes.
#[derive(Debug)]
pub struct LaplacianSystem<S: LinearSolver = SparseSolver> {
    solver: S,
    positions: Vec<Point3<f64>>,
    pinned: Vec<bool>,
    num_triangles: usize,
    face_weights: Option<Vec<[f64; 3]>>,
    solving: bool,
}

impl<S: LinearSolver> LaplacianSystem<S> {
    pub(crate) fn new(
        solver: S,
        positions: Vec<Point3<f64>>,
        pinned: Vec<bool>,
        num_triangles: usize,
        face_weights: Option<Vec<[f64; 3]>>,
    ) -> Self {
        Self {
            solver,
            positions,
            pinned,
            num_triangles,
            face_weights,
            solving: false,
        }
    }

    /// Number of vertices (unknowns).
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles the matrix was assembled from.
    pub fn num_triangles(&self) -> usize {
        self.num_triangles
    }

    /// Whether vertex `v` is pinned.
    pub fn is_pinned(&self, v: usize) -> bool {
        self.pinned[v]
    }

    /// Per-vertex pinned flags.
    pub fn pinned(&self) -> &[bool] {
        &self.pinned
    }

    /// Current vertex positions, used as pin values.
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Update the position of vertex `v`.
    pub fn set_position(&mut self, v: usize, position: Point3<f64>) {
        self.positions[v] = position;
    }

    /// Per-triangle corner weights, when the builder was asked to keep them.
    ///
    /// Entry `k` of a triangle is the weight of the edge opposite corner `k`.
    pub fn face_weights(&self) -> Option<&[[f64; 3]]> {
        self.face_weights.as_deref()
    }

    /// The underlying solver.
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// The underlying solver, mutably.
    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    /// Whether a solve pass is open.
    pub fn is_solving(&self) -> bool {
        self.solving
    }

    /// Open a solve pass.
    ///
    /// With an axis, every pinned vertex is locked to its current coordinate
    /// along that axis. `None` locks nothing. Calling this while a pass is
    /// already open has no effect.
    pub fn begin_solve(&mut self, axis: Option<Axis>) {
        if self.solving {
            return;
        }
        if let Some(axis) = axis {
            let c = axis.index();
            for (v, (p, &pinned)) in self.positions.iter().zip(&self.pinned).enumerate() {
                if pinned {
                    self.solver.lock_variable(v, p[c]);
                }
            }
        }
        self.solving = true;
    }

    /// Add `value` to the right-hand side of vertex `v`'s equation.
    ///
    /// Opens a pass without axis pinning if none is open.
    pub fn add_right_hand_side(&mut self, v: usize, value: f64) {
        self.begin_solve(None);
        self.solver.add_rhs(v, value);
    }

    /// Solve the open pass. The pass is closed whatever the outcome.
    pub fn solve(&mut self) -> Result<()> {
        self.begin_solve(None);
        self.solving = false;
        self.solver.solve()
    }

    /// Solution for vertex `v` after a successful [`solve`](Self::solve).
    pub fn solution(&self, v: usize) -> f64 {
        self.solver.variable(v)
    }
}
