//! Segment occlusion queries against the mesh surface.
//!
//! Heat weighting only lets a bone warm a vertex when the straight segment
//! between them does not pass through the mesh. [`OcclusionQuery`] is the
//! seam for that test; [`TriangleBvh`] is the default implementation.

mod bvh;

pub use bvh::{Aabb, TriangleBvh};

use nalgebra::Point3;

/// Answers whether a segment passes through any triangle of a surface.
pub trait OcclusionQuery: Sync {
    /// Whether the open segment from `start` to `end` hits a triangle other
    /// than `skip_face`.
    fn segment_occluded(
        &self,
        start: &Point3<f64>,
        end: &Point3<f64>,
        skip_face: Option<usize>,
    ) -> bool;
}

impl<Q: OcclusionQuery + ?Sized> OcclusionQuery for &Q {
    fn segment_occluded(
        &self,
        start: &Point3<f64>,
        end: &Point3<f64>,
        skip_face: Option<usize>,
    ) -> bool {
        (**self).segment_occluded(start, end, skip_face)
    }
}
