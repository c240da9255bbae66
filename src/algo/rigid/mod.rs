//! As-rigid-as-possible (ARAP) surface deformation.
//!
//! Pinned vertices act as handles. Each call to
//! [`RigidDeformer::iterate`] moves the free vertices so that every vertex
//! neighborhood is as close as possible to a rotated copy of its rest shape.
//!
//! The iteration alternates between:
//! 1. **Local step**: best-fit rotation per vertex from the weighted
//!    covariance of its current and rest edges
//! 2. **Global step**: three Laplacian solves (one per axis) with the pinned
//!    vertices locked in place
//!
//! # References
//!
//! - Sorkine, O., & Alexa, M. (2007). "As-Rigid-As-Possible Surface
//!   Modeling." SGP 2007.

mod polar;

pub use polar::nearest_rotation;

use nalgebra::{Matrix3, Point3, Vector3};

use crate::error::{LaplacianError, Result};
use crate::laplacian::{Axis, LaplacianBuilder, LaplacianSystem};
use crate::mesh::validate_triangles;
use crate::solver::{SolverOptions, SparseSolver};

/// Options for rigid deformation.
#[derive(Debug, Clone)]
pub struct RigidOptions {
    /// Iterations run by [`RigidDeformer::iterate_n`] (default: 1).
    pub iterations: usize,

    /// Linear solver settings. The system is symmetric, so conjugate
    /// gradient is the default.
    pub solver: SolverOptions,
}

impl Default for RigidOptions {
    fn default() -> Self {
        Self {
            iterations: 1,
            solver: SolverOptions::symmetric(),
        }
    }
}

impl RigidOptions {
    /// Set the number of iterations per [`RigidDeformer::iterate_n`] call.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the linear solver options.
    pub fn with_solver(mut self, solver: SolverOptions) -> Self {
        self.solver = solver;
        self
    }
}

/// Result of one deformation iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidIteration {
    /// All three axes were solved and positions were updated.
    Updated,
    /// A solve failed; positions are unchanged.
    SolveFailed,
}

/// Interactive ARAP deformation session over a borrowed position buffer.
///
/// The deformer holds the caller's positions for its whole lifetime and
/// updates them in place. Handles are moved between iterations with
/// [`set_position`](Self::set_position).
///
/// # Example
///
/// ```
/// use laplace_rig::algo::rigid::{RigidDeformer, RigidIteration, RigidOptions};
/// use nalgebra::Point3;
///
/// let mut positions = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let pinned = [true, true, false];
///
/// let mut deformer =
///     RigidDeformer::begin(&mut positions, &[[0, 1, 2]], &pinned, RigidOptions::default()).unwrap();
/// assert_eq!(deformer.iterate(), RigidIteration::Updated);
/// deformer.end(false);
///
/// assert!((positions[2] - Point3::new(0.5, 1.0, 0.0)).norm() < 1e-8);
/// ```
#[derive(Debug)]
pub struct RigidDeformer<'a> {
    positions: &'a mut [Point3<f64>],
    original: Vec<Point3<f64>>,
    triangles: Vec<[usize; 3]>,
    system: LaplacianSystem<SparseSolver>,
    rotations: Vec<Matrix3<f64>>,
    rhs: Vec<Vector3<f64>>,
    options: RigidOptions,
    failed: bool,
}

impl<'a> RigidDeformer<'a> {
    /// Start a session: snapshot the rest shape and assemble the Laplacian.
    ///
    /// The current positions are the rest shape. Vertices flagged in
    /// `pinned` are held at whatever position they have at each iteration.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh is empty, `pinned` has the wrong length,
    /// or a triangle references a missing vertex.
    pub fn begin(
        positions: &'a mut [Point3<f64>],
        triangles: &[[usize; 3]],
        pinned: &[bool],
        options: RigidOptions,
    ) -> Result<Self> {
        let n = positions.len();
        if n == 0 || triangles.is_empty() {
            return Err(LaplacianError::EmptyMesh);
        }
        LaplacianError::check_len("pinned flags", n, pinned.len())?;
        validate_triangles(triangles, n)?;

        let mut builder =
            LaplacianBuilder::begin_with_solver(SparseSolver::new(n, options.solver.clone()), triangles.len())
                .with_area_weights(false)
                .with_stored_weights(true);
        for (p, &pin) in positions.iter().zip(pinned) {
            builder.add_vertex(*p, pin);
        }
        for &[i, j, k] in triangles {
            builder.add_triangle(i, j, k);
        }
        let system = builder.end()?;

        log::debug!(
            "rigid deform: {} vertices ({} pinned), {} triangles",
            n,
            pinned.iter().filter(|&&p| p).count(),
            triangles.len()
        );

        Ok(Self {
            original: positions.to_vec(),
            positions,
            triangles: triangles.to_vec(),
            system,
            rotations: vec![Matrix3::identity(); n],
            rhs: vec![Vector3::zeros(); n],
            options,
            failed: false,
        })
    }

    /// Current positions.
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions[..]
    }

    /// Rest positions captured by [`begin`](Self::begin).
    pub fn original_positions(&self) -> &[Point3<f64>] {
        &self.original
    }

    /// Move vertex `v`. Pinned vertices keep this position during solves.
    pub fn set_position(&mut self, v: usize, position: Point3<f64>) {
        self.positions[v] = position;
        self.system.set_position(v, position);
    }

    /// Whether vertex `v` is pinned.
    pub fn is_pinned(&self, v: usize) -> bool {
        self.system.is_pinned(v)
    }

    /// Rotation estimated for vertex `v` by the last iteration.
    pub fn rotation(&self, v: usize) -> &Matrix3<f64> {
        &self.rotations[v]
    }

    /// Whether any iteration of this session failed to solve.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Run one local/global iteration.
    pub fn iterate(&mut self) -> RigidIteration {
        self.estimate_rotations();
        self.assemble_rhs();

        let n = self.positions.len();
        let mut solved = vec![Vector3::zeros(); n];

        for axis in Axis::ALL {
            let c = axis.index();
            self.system.begin_solve(Some(axis));
            for (v, rhs) in self.rhs.iter().enumerate() {
                if !self.system.is_pinned(v) {
                    self.system.add_right_hand_side(v, rhs[c]);
                }
            }

            if let Err(err) = self.system.solve() {
                if !self.failed {
                    log::warn!("Rigid deformation: failed to find solution ({err})");
                }
                self.failed = true;
                return RigidIteration::SolveFailed;
            }

            for (v, s) in solved.iter_mut().enumerate() {
                s[c] = self.system.solution(v);
            }
        }

        for (v, s) in solved.into_iter().enumerate() {
            let p = Point3::from(s);
            self.positions[v] = p;
            self.system.set_position(v, p);
        }
        RigidIteration::Updated
    }

    /// Run [`RigidOptions::iterations`] iterations, stopping at the first
    /// failure.
    pub fn iterate_n(&mut self) -> RigidIteration {
        for _ in 0..self.options.iterations {
            if self.iterate() == RigidIteration::SolveFailed {
                return RigidIteration::SolveFailed;
            }
        }
        RigidIteration::Updated
    }

    /// Finish the session. With `cancel`, free vertices go back to their rest
    /// positions; pinned vertices keep wherever they were moved.
    pub fn end(mut self, cancel: bool) {
        if cancel {
            for (v, (p, o)) in self.positions.iter_mut().zip(&self.original).enumerate() {
                if !self.system.is_pinned(v) {
                    *p = *o;
                }
            }
        }
    }

    /// Visit every triangle edge as `(i, j, weight)`.
    fn for_each_edge(&self, mut f: impl FnMut(usize, usize, f64)) {
        let Some(weights) = self.system.face_weights() else {
            return;
        };
        for (tri, w) in self.triangles.iter().zip(weights) {
            for k in 0..3 {
                // The weight of corner k belongs to the opposite edge.
                f(tri[(k + 1) % 3], tri[(k + 2) % 3], w[k]);
            }
        }
    }

    fn estimate_rotations(&mut self) {
        let mut covariance = vec![Matrix3::zeros(); self.positions.len()];
        self.for_each_edge(|i, j, w| {
            let current = self.positions[i] - self.positions[j];
            let rest = self.original[i] - self.original[j];
            let outer = w * current * rest.transpose();
            covariance[i] += outer;
            covariance[j] += outer;
        });

        for (r, s) in self.rotations.iter_mut().zip(&covariance) {
            *r = nearest_rotation(s);
        }
    }

    fn assemble_rhs(&mut self) {
        let mut rhs = vec![Vector3::zeros(); self.positions.len()];
        self.for_each_edge(|i, j, w| {
            let rest = self.original[i] - self.original[j];
            let rotated = 0.5 * w * (self.rotations[i] + self.rotations[j]) * rest;
            if !self.system.is_pinned(i) {
                rhs[i] += rotated;
            }
            if !self.system.is_pinned(j) {
                rhs[j] -= rotated;
            }
        });
        self.rhs = rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;

    fn create_single_triangle() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
        ];
        (positions, vec![[0, 1, 2]])
    }

    fn create_grid(n: usize) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let mut positions = Vec::new();
        let mut triangles = Vec::new();

        for j in 0..=n {
            for i in 0..=n {
                positions.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }

        for j in 0..n {
            for i in 0..n {
                let v00 = j * (n + 1) + i;
                let v10 = v00 + 1;
                let v01 = v00 + (n + 1);
                let v11 = v01 + 1;

                triangles.push([v00, v10, v11]);
                triangles.push([v00, v11, v01]);
            }
        }

        (positions, triangles)
    }

    fn create_tetrahedron() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 0.866, 0.0),
            Point3::new(0.5, 0.289, 0.816),
        ];
        let triangles = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        (positions, triangles)
    }

    fn boundary_pins(n: usize) -> Vec<bool> {
        (0..(n + 1) * (n + 1))
            .map(|v| {
                let (i, j) = (v % (n + 1), v / (n + 1));
                i == 0 || j == 0 || i == n || j == n
            })
            .collect()
    }

    #[test]
    fn test_single_triangle_is_noop() {
        let (mut positions, triangles) = create_single_triangle();
        let rest = positions.clone();

        let mut deformer =
            RigidDeformer::begin(&mut positions, &triangles, &[true, true, false], RigidOptions::default())
                .unwrap();
        assert_eq!(deformer.iterate(), RigidIteration::Updated);
        assert!((deformer.rotation(2) - Matrix3::identity()).norm() < 1e-10);
        deformer.end(false);

        for (p, r) in positions.iter().zip(&rest) {
            assert!((p - r).norm() < 1e-8);
        }
        assert_eq!(positions[0], rest[0]);
        assert_eq!(positions[1], rest[1]);
    }

    #[test]
    fn test_identity_grid() {
        let (mut positions, triangles) = create_grid(4);
        let rest = positions.clone();
        let pinned = boundary_pins(4);

        let options = RigidOptions::default().with_iterations(3);
        let mut deformer = RigidDeformer::begin(&mut positions, &triangles, &pinned, options).unwrap();
        assert_eq!(deformer.iterate_n(), RigidIteration::Updated);
        deformer.end(false);

        for (p, r) in positions.iter().zip(&rest) {
            assert!((p - r).norm() < 1e-7);
        }
    }

    #[test]
    fn test_rigid_motion_is_fixed_point() {
        let (mut positions, triangles) = create_tetrahedron();
        let q = Rotation3::from_euler_angles(0.4, -0.3, 0.9);
        let shift = Vector3::new(2.0, -1.0, 0.5);
        let moved: Vec<Point3<f64>> = positions.iter().map(|p| q.transform_point(p) + shift).collect();

        let pinned = [true, false, false, false];
        let mut deformer =
            RigidDeformer::begin(&mut positions, &triangles, &pinned, RigidOptions::default()).unwrap();
        for (v, p) in moved.iter().enumerate() {
            deformer.set_position(v, *p);
        }

        assert_eq!(deformer.iterate(), RigidIteration::Updated);
        for v in 0..4 {
            assert!((deformer.rotation(v) - q.matrix()).norm() < 1e-8);
            assert!((deformer.positions()[v] - moved[v]).norm() < 1e-7);
        }
    }

    #[test]
    fn test_translation_converges() {
        let (mut positions, triangles) = create_grid(2);
        let pinned = boundary_pins(2);
        let shift = Vector3::new(0.3, -0.2, 0.7);
        let target: Vec<Point3<f64>> = positions.iter().map(|p| p + shift).collect();

        let options = RigidOptions::default().with_iterations(100);
        let mut deformer = RigidDeformer::begin(&mut positions, &triangles, &pinned, options).unwrap();
        for v in (0..9).filter(|&v| pinned[v]) {
            deformer.set_position(v, target[v]);
        }

        assert_eq!(deformer.iterate_n(), RigidIteration::Updated);
        assert!((deformer.positions()[4] - target[4]).norm() < 1e-4);
        for v in (0..9).filter(|&v| pinned[v]) {
            assert_eq!(deformer.positions()[v], target[v]);
        }
    }

    #[test]
    fn test_cancel_restores_free_vertices() {
        let (mut positions, triangles) = create_grid(2);
        let rest = positions.clone();
        let pinned = boundary_pins(2);
        // Lift the right column; 4-5 has a nonzero cotangent weight.
        let lifted = [2, 5, 8];
        let handles: Vec<Point3<f64>> = lifted.iter().map(|&v| rest[v] + Vector3::z()).collect();

        let options = RigidOptions::default().with_iterations(5);
        let mut deformer = RigidDeformer::begin(&mut positions, &triangles, &pinned, options).unwrap();
        for (&v, &h) in lifted.iter().zip(&handles) {
            deformer.set_position(v, h);
        }
        assert_eq!(deformer.iterate_n(), RigidIteration::Updated);
        assert!(deformer.positions()[4].z > 1e-3);
        deformer.end(true);

        assert_eq!(positions[4], rest[4]);
        for (&v, &h) in lifted.iter().zip(&handles) {
            assert_eq!(positions[v], h);
        }
        for v in [0, 1, 3, 6, 7] {
            assert_eq!(positions[v], rest[v]);
        }
    }

    #[test]
    fn test_isolated_vertex_fails() {
        let (mut positions, triangles) = create_single_triangle();
        positions.push(Point3::new(5.0, 5.0, 5.0));
        let rest = positions.clone();

        let pinned = [true, true, false, false];
        let mut deformer =
            RigidDeformer::begin(&mut positions, &triangles, &pinned, RigidOptions::default()).unwrap();
        deformer.set_position(1, Point3::new(1.5, 0.0, 0.0));

        assert_eq!(deformer.iterate(), RigidIteration::SolveFailed);
        assert!(deformer.has_failed());
        assert_eq!(deformer.positions()[2], rest[2]);
        assert_eq!(deformer.iterate_n(), RigidIteration::SolveFailed);
        deformer.end(false);
    }

    #[test]
    fn test_begin_validates_input() {
        let (mut positions, triangles) = create_single_triangle();
        let err = RigidDeformer::begin(&mut positions, &triangles, &[true], RigidOptions::default()).unwrap_err();
        assert!(matches!(err, LaplacianError::LengthMismatch { .. }));

        let err = RigidDeformer::begin(&mut positions, &[[0, 1, 7]], &[false; 3], RigidOptions::default())
            .unwrap_err();
        assert_eq!(err, LaplacianError::InvalidVertexIndex { triangle: 0, vertex: 7 });

        let err = RigidDeformer::begin(&mut positions, &[], &[false; 3], RigidOptions::default()).unwrap_err();
        assert_eq!(err, LaplacianError::EmptyMesh);
    }
}
