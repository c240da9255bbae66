//! # laplace-rig
//!
//! Cotangent mesh Laplacian and its two classic consumers in character
//! rigging: automatic skinning weights by heat diffusion, and
//! as-rigid-as-possible (ARAP) deformation.
//!
//! Meshes are plain position slices plus vertex-index triangles. The crate
//! never takes ownership of the caller's positions: heat weighting reads
//! them, the rigid deformer borrows them mutably for its session.
//!
//! ## Features
//!
//! - **Laplacian assembly**: cotangent weights, mixed Voronoi area
//!   normalization, non-manifold edge handling, pinned vertices
//! - **Bone heat weighting**: visibility-aware heat sources, segmented
//!   bones, mirroring, vertex masks
//! - **ARAP deformation**: per-vertex rotations by polar decomposition,
//!   per-axis global solves, cancel with restore
//! - **Pluggable collaborators**: [`solver::LinearSolver`],
//!   [`ray::OcclusionQuery`] and [`algo::heat::WeightSink`]
//!
//! ## Skinning Weights
//!
//! ```
//! use laplace_rig::prelude::*;
//! use nalgebra::Point3;
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(2.0, 0.0, 0.0),
//!     Point3::new(2.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let triangles = triangulate_faces(&[Face::Quad([0, 1, 2, 3])]);
//! let bones = vec![
//!     Bone::new(Point3::new(0.0, 0.5, -0.5), Point3::new(0.9, 0.5, -0.5), 0),
//!     Bone::new(Point3::new(1.1, 0.5, -0.5), Point3::new(2.0, 0.5, -0.5), 1),
//! ];
//!
//! let mut groups = VertexGroups::new();
//! let report = bone_heat_weighting(
//!     &positions,
//!     &triangles,
//!     &bones,
//!     &mut groups,
//!     &HeatWeightingOptions::default(),
//! )
//! .unwrap();
//! assert!(report.is_complete());
//! ```
//!
//! ## Interactive Deformation
//!
//! ```
//! use laplace_rig::prelude::*;
//! use nalgebra::Point3;
//!
//! let mut positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let triangles = vec![[0, 1, 2], [0, 2, 3]];
//! let pinned = [true, true, false, false];
//!
//! let mut deformer =
//!     RigidDeformer::begin(&mut positions, &triangles, &pinned, RigidOptions::default()).unwrap();
//! deformer.set_position(1, Point3::new(1.0, 0.0, 0.5));
//! deformer.iterate();
//! deformer.end(false);
//!
//! assert_eq!(positions[1], Point3::new(1.0, 0.0, 0.5));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod laplacian;
pub mod mesh;
pub mod ray;
pub mod solver;

/// Prelude module for convenient imports.
///
/// ```
/// use laplace_rig::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::heat::{
        bone_heat_weighting, Bone, HeatWeightingOptions, HeatWeightingReport, VertexGroups,
        WeightSink,
    };
    pub use crate::algo::rigid::{RigidDeformer, RigidIteration, RigidOptions};
    pub use crate::error::{LaplacianError, Result};
    pub use crate::laplacian::{Axis, LaplacianBuilder, LaplacianSystem};
    pub use crate::mesh::{triangulate_faces, Face};
    pub use crate::solver::{LinearSolver, SolverOptions, SparseSolver};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_heat_then_deform_share_mesh() {
        let mut positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let triangles = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];

        // Bone through the inside of the tetrahedron.
        let bones = vec![Bone::new(Point3::new(0.5, 0.4, 0.1), Point3::new(0.5, 0.5, 0.6), 0)];
        let mut groups = VertexGroups::new();
        let report = bone_heat_weighting(
            &positions,
            &triangles,
            &bones,
            &mut groups,
            &HeatWeightingOptions::default(),
        )
        .unwrap();
        assert!(report.is_complete());
        for v in 0..4 {
            assert!((groups.weight(0, v).unwrap() - 1.0).abs() < 1e-6);
        }

        let pinned = [true, false, false, false];
        let mut deformer =
            RigidDeformer::begin(&mut positions, &triangles, &pinned, RigidOptions::default()).unwrap();
        assert_eq!(deformer.iterate(), RigidIteration::Updated);
        deformer.end(false);
        assert_eq!(positions[0], Point3::new(0.0, 0.0, 0.0));
    }
}
