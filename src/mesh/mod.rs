//! Triangle mesh input handling.
//!
//! Meshes enter the crate as a position slice plus a list of vertex-index
//! triples. This module holds the conversions and geometric helpers shared
//! by the Laplacian builder, the heat weighting and the rigid deformer.
//!
//! ```
//! use laplace_rig::mesh::{triangulate_faces, validate_triangles, Face};
//! use nalgebra::Point3;
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let triangles = triangulate_faces(&[Face::Quad([0, 1, 2, 3])]);
//! validate_triangles(&triangles, positions.len()).unwrap();
//! assert_eq!(triangles.len(), 2);
//! ```

mod faces;
mod geometry;

pub use faces::{
    canonical_edge, edge_incidence, representative_faces, triangulate_faces, validate_triangles,
    Face,
};
pub use geometry::{
    closest_on_segment, cotangent, is_obtuse_at, triangle_area, vertex_normals, DEGENERATE_SINE,
};
