//! Assembly of the cotangent Laplacian.

use nalgebra::Point3;

use crate::error::{LaplacianError, Result};
use crate::mesh::{canonical_edge, edge_incidence, validate_triangles};
use crate::solver::{LinearSolver, SolverOptions, SparseSolver};

use super::system::LaplacianSystem;
use super::weights::{area_weights, corner_cotangents, mixed_areas};

/// Collects vertices and triangles, then assembles the Laplacian matrix.
///
/// The builder is the construction half of the system lifecycle: `begin`,
/// any number of [`add_vertex`](Self::add_vertex) and
/// [`add_triangle`](Self::add_triangle) calls, then [`end`](Self::end), which
/// consumes the builder and drops all topology scratch data.
///
/// # Example
///
/// ```
/// use laplace_rig::laplacian::LaplacianBuilder;
/// use nalgebra::Point3;
///
/// let mut builder = LaplacianBuilder::begin(3, 1);
/// builder.add_vertex(Point3::new(0.0, 0.0, 0.0), true);
/// builder.add_vertex(Point3::new(1.0, 0.0, 0.0), true);
/// builder.add_vertex(Point3::new(0.5, 1.0, 0.0), false);
/// builder.add_triangle(0, 1, 2);
///
/// let system = builder.end().unwrap();
/// assert_eq!(system.num_vertices(), 3);
/// ```
#[derive(Debug)]
pub struct LaplacianBuilder<S: LinearSolver = SparseSolver> {
    solver: S,
    positions: Vec<Point3<f64>>,
    pinned: Vec<bool>,
    triangles: Vec<[usize; 3]>,
    heat_diagonal: Option<Vec<f64>>,
    area_weights: bool,
    store_weights: bool,
}

impl LaplacianBuilder<SparseSolver> {
    /// Start a system for `vertex_count` vertices and `triangle_count`
    /// triangles, backed by the default [`SparseSolver`].
    pub fn begin(vertex_count: usize, triangle_count: usize) -> Self {
        Self::begin_with_solver(
            SparseSolver::new(vertex_count, SolverOptions::default()),
            triangle_count,
        )
    }
}

impl<S: LinearSolver> LaplacianBuilder<S> {
    /// Start a system on an already opened solver.
    ///
    /// The solver's variable count fixes the number of vertices.
    pub fn begin_with_solver(solver: S, triangle_count: usize) -> Self {
        let vertex_count = solver.num_variables();
        Self {
            solver,
            positions: Vec::with_capacity(vertex_count),
            pinned: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count),
            heat_diagonal: None,
            area_weights: true,
            store_weights: false,
        }
    }

    /// Whether rows are normalized by the inverse mixed vertex area
    /// (default: true). When disabled every row weight is `1.0`.
    pub fn with_area_weights(mut self, enabled: bool) -> Self {
        self.area_weights = enabled;
        self
    }

    /// Whether per-corner edge weights are kept in the finished system
    /// (default: false).
    pub fn with_stored_weights(mut self, enabled: bool) -> Self {
        self.store_weights = enabled;
        self
    }

    /// Append a vertex and return its index.
    pub fn add_vertex(&mut self, position: Point3<f64>, pinned: bool) -> usize {
        self.positions.push(position);
        self.pinned.push(pinned);
        self.positions.len() - 1
    }

    /// Append a triangle and return its index.
    ///
    /// Indices are checked in [`end`](Self::end), not here.
    pub fn add_triangle(&mut self, i: usize, j: usize, k: usize) -> usize {
        self.triangles.push([i, j, k]);
        self.triangles.len() - 1
    }

    /// Install a per-vertex term added to the matrix diagonal before the
    /// triangle contributions (the heat-source coefficients).
    pub fn set_heat_diagonal(&mut self, diagonal: Vec<f64>) {
        self.heat_diagonal = Some(diagonal);
    }

    /// Number of vertices added so far.
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles added so far.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Vertex positions added so far.
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Triangles added so far.
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Assemble the matrix and finish construction.
    ///
    /// Degenerate triangles contribute nothing. A vertex that belongs to no
    /// triangle gets an empty row, which makes later solves fail rather than
    /// this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of added vertices differs from the
    /// solver size, if a triangle references a missing vertex, or if the
    /// heat diagonal has the wrong length.
    pub fn end(mut self) -> Result<LaplacianSystem<S>> {
        let n = self.solver.num_variables();
        LaplacianError::check_len("vertices", n, self.positions.len())?;
        validate_triangles(&self.triangles, n)?;

        let incidence = edge_incidence(&self.triangles);

        let row_weights = if self.area_weights {
            area_weights(&mixed_areas(&self.positions, &self.triangles))
        } else {
            vec![1.0; n]
        };

        if let Some(diagonal) = self.heat_diagonal.take() {
            LaplacianError::check_len("heat diagonal", n, diagonal.len())?;
            for (v, h) in diagonal.into_iter().enumerate() {
                self.solver.add_matrix_entry(v, v, h);
            }
        }

        let mut face_weights = self
            .store_weights
            .then(|| Vec::with_capacity(self.triangles.len()));

        for &tri in &self.triangles {
            let cot = corner_cotangents(&self.positions, tri);

            // Split each edge's weight over the triangles that share it.
            let mut t = [0.0; 3];
            for k in 0..3 {
                let edge = canonical_edge(tri[(k + 1) % 3], tri[(k + 2) % 3]);
                let count = incidence.get(&edge).copied().unwrap_or(1).max(1);
                t[k] = cot[k] / count as f64;
            }

            let a = tri.map(|v| row_weights[v]);
            for k in 0..3 {
                let i = tri[k];
                let j = tri[(k + 1) % 3];
                let l = tri[(k + 2) % 3];
                let kj = (k + 1) % 3;
                let kl = (k + 2) % 3;

                // Row i couples to j through the angle at l, and to l through the angle at j.
                self.solver.add_matrix_entry(i, i, (t[kj] + t[kl]) * a[k]);
                self.solver.add_matrix_entry(i, j, -t[kl] * a[k]);
                self.solver.add_matrix_entry(i, l, -t[kj] * a[k]);
            }

            if let Some(weights) = face_weights.as_mut() {
                weights.push([t[0] * a[0], t[1] * a[1], t[2] * a[2]]);
            }
        }

        log::debug!(
            "assembled Laplacian: {} vertices, {} triangles, {} edges",
            n,
            self.triangles.len(),
            incidence.len()
        );

        Ok(LaplacianSystem::new(
            self.solver,
            self.positions,
            self.pinned,
            self.triangles.len(),
            face_weights,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_fan_disk() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let positions = vec![
            Point3::new(0.1, -0.05, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 0.866, 0.0),
            Point3::new(-0.5, 0.866, 0.1),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(-0.5, -0.866, -0.1),
            Point3::new(0.5, -0.866, 0.0),
        ];
        let triangles = vec![
            [0, 1, 2],
            [0, 2, 3],
            [0, 3, 4],
            [0, 4, 5],
            [0, 5, 6],
            [0, 6, 1],
        ];
        (positions, triangles)
    }

    fn build(
        positions: &[Point3<f64>],
        triangles: &[[usize; 3]],
        area_weights: bool,
    ) -> LaplacianSystem {
        let mut builder =
            LaplacianBuilder::begin(positions.len(), triangles.len()).with_area_weights(area_weights);
        for &p in positions {
            builder.add_vertex(p, false);
        }
        for &[i, j, k] in triangles {
            builder.add_triangle(i, j, k);
        }
        builder.end().unwrap()
    }

    #[test]
    fn test_interior_row_sums_to_zero() {
        let (positions, triangles) = create_fan_disk();
        for area_weights in [true, false] {
            let mut system = build(&positions, &triangles, area_weights);
            let matrix = system.solver_mut().matrix().clone();

            let diagonal = matrix.get(0, 0);
            let off_diagonal: f64 = matrix.row(0).filter(|&(c, _)| c != 0).map(|(_, v)| v).sum();
            assert!(diagonal > 0.0);
            assert!((diagonal + off_diagonal).abs() < 1e-12);
        }
    }

    #[test]
    fn test_every_row_preserves_constants() {
        let (positions, triangles) = create_fan_disk();
        let mut system = build(&positions, &triangles, true);
        let matrix = system.solver_mut().matrix().clone();

        let ones = nalgebra::DVector::from_element(positions.len(), 1.0);
        let y = matrix.mul_vec(&ones);
        assert!(y.norm() < 1e-12);
    }

    #[test]
    fn test_manifold_edge_split_in_half() {
        // Two triangles on either side of edge (0, 1).
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.7, 1.0, 0.0),
            Point3::new(1.2, -1.5, 0.0),
        ];
        let triangles = vec![[0, 1, 2], [1, 0, 3]];
        let system = build(&positions, &triangles, false);

        let cot2 = crate::mesh::cotangent(&positions[2], &positions[0], &positions[1]);
        let cot3 = crate::mesh::cotangent(&positions[3], &positions[1], &positions[0]);
        let expected = -(cot2 + cot3) / 2.0;

        assert!((system.solver().entry(0, 1) - expected).abs() < 1e-12);
        assert!((system.solver().entry(1, 0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_non_manifold_edge_split_in_thirds() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
            Point3::new(0.5, 0.0, 1.0),
        ];
        let triangles = vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]];
        let system = build(&positions, &triangles, false);

        let expected: f64 = [2, 3, 4]
            .iter()
            .map(|&k| crate::mesh::cotangent(&positions[k], &positions[0], &positions[1]))
            .sum::<f64>()
            / 3.0;
        assert!((system.solver().entry(0, 1) + expected).abs() < 1e-12);
    }

    #[test]
    fn test_area_weights_scale_rows() {
        let (positions, triangles) = create_fan_disk();
        let unweighted = build(&positions, &triangles, false);
        let weighted = build(&positions, &triangles, true);

        let areas = mixed_areas(&positions, &triangles);
        let a0 = 0.5 / areas[0];
        let a1 = 0.5 / areas[1];

        let u01 = unweighted.solver().entry(0, 1);
        assert!((weighted.solver().entry(0, 1) - u01 * a0).abs() < 1e-12);
        assert!((weighted.solver().entry(1, 0) - u01 * a1).abs() < 1e-12);
    }

    #[test]
    fn test_heat_diagonal_added() {
        let (positions, triangles) = create_fan_disk();
        let plain = build(&positions, &triangles, true);

        let mut builder = LaplacianBuilder::begin(positions.len(), triangles.len());
        for &p in &positions {
            builder.add_vertex(p, false);
        }
        for &[i, j, k] in &triangles {
            builder.add_triangle(i, j, k);
        }
        let mut heat = vec![0.0; positions.len()];
        heat[3] = 2.5;
        builder.set_heat_diagonal(heat);
        let heated = builder.end().unwrap();

        let diff = heated.solver().entry(3, 3) - plain.solver().entry(3, 3);
        assert!((diff - 2.5).abs() < 1e-12);
        assert_eq!(heated.solver().entry(2, 2), plain.solver().entry(2, 2));
    }

    #[test]
    fn test_stored_face_weights() {
        let (positions, triangles) = create_fan_disk();
        let mut builder = LaplacianBuilder::begin(positions.len(), triangles.len())
            .with_area_weights(false)
            .with_stored_weights(true);
        for &p in &positions {
            builder.add_vertex(p, false);
        }
        for &[i, j, k] in &triangles {
            builder.add_triangle(i, j, k);
        }
        let system = builder.end().unwrap();

        let weights = system.face_weights().unwrap();
        assert_eq!(weights.len(), triangles.len());
        // Corner 0 of triangle 0 is opposite the boundary edge (1, 2).
        let cot = corner_cotangents(&positions, triangles[0]);
        assert!((weights[0][0] - cot[0]).abs() < 1e-12);
        // Corner 1 is opposite the interior edge (0, 2), shared by two triangles.
        assert!((weights[0][1] - cot[1] / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_index_reported() {
        let mut builder = LaplacianBuilder::begin(3, 1);
        builder.add_vertex(Point3::new(0.0, 0.0, 0.0), false);
        builder.add_vertex(Point3::new(1.0, 0.0, 0.0), false);
        builder.add_vertex(Point3::new(0.0, 1.0, 0.0), false);
        builder.add_triangle(0, 1, 7);

        assert_eq!(
            builder.end().unwrap_err(),
            LaplacianError::InvalidVertexIndex {
                triangle: 0,
                vertex: 7
            }
        );
    }

    #[test]
    fn test_missing_vertices_reported() {
        let mut builder = LaplacianBuilder::begin(3, 0);
        builder.add_vertex(Point3::new(0.0, 0.0, 0.0), false);

        assert!(matches!(
            builder.end(),
            Err(LaplacianError::LengthMismatch { what: "vertices", .. })
        ));
    }
}
