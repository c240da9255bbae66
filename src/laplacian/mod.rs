//! Cotangent-weighted discrete Laplace operator.
//!
//! The operator is assembled once from a triangle soup and then reused for
//! any number of linear solves. Construction is split in two types so the
//! lifecycle is checked by the compiler:
//!
//! - [`LaplacianBuilder`] collects vertices, pinned flags and triangles;
//! - [`LaplacianSystem`] owns the assembled matrix (inside its solver) and
//!   runs solve passes.
//!
//! # Weights
//!
//! For a triangle with corner cotangents `cot_k`, the weight of the edge
//! opposite corner `k` is `cot_k / n`, where `n` is the number of triangles
//! sharing that edge (two on a manifold interior edge, more on non-manifold
//! edges). Each row `i` is multiplied by the vertex's area weight `a_i`, the
//! inverse of its mixed Voronoi area, so rows are individually normalized
//! equations rather than a symmetric matrix.
//!
//! # References
//!
//! - Meyer, M., Desbrun, M., Schröder, P., & Barr, A. H. (2003).
//!   "Discrete Differential-Geometry Operators for Triangulated 2-Manifolds."

mod builder;
mod system;
pub mod weights;

pub use builder::LaplacianBuilder;
pub use system::{Axis, LaplacianSystem};
