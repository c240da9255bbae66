//! Small geometric kernels shared by the Laplacian and its consumers.

use nalgebra::{Point3, Vector3};

/// Triangles whose corner sine is below this are treated as degenerate.
///
/// The test is relative to the edge lengths, so it does not depend on the
/// scale of the mesh.
pub const DEGENERATE_SINE: f64 = 1e-12;

/// Compute cotangent of the angle at vertex `a` in triangle (a, b, c).
///
/// Returns `0.0` for degenerate (zero-area) triangles.
pub fn cotangent(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;

    let cross_len = ab.cross(&ac).norm();
    if cross_len <= DEGENERATE_SINE * ab.norm() * ac.norm() {
        0.0
    } else {
        ab.dot(&ac) / cross_len
    }
}

/// Whether the angle at `a` in triangle (a, b, c) exceeds 90 degrees.
#[inline]
pub fn is_obtuse_at(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> bool {
    (b - a).dot(&(c - a)) < 0.0
}

/// Area of triangle (a, b, c).
#[inline]
pub fn triangle_area(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    0.5 * (b - a).cross(&(c - a)).norm()
}

/// Closest point to `p` on segment `[root, tip]`.
pub fn closest_on_segment(p: &Point3<f64>, root: &Point3<f64>, tip: &Point3<f64>) -> Point3<f64> {
    let axis = tip - root;
    let len_sq = axis.norm_squared();
    if len_sq == 0.0 {
        return *root;
    }
    let t = ((p - root).dot(&axis) / len_sq).clamp(0.0, 1.0);
    root + axis * t
}

/// Area-weighted vertex normals.
///
/// Each triangle adds its unnormalized normal (twice its area) to its three
/// corners; the sums are normalized at the end. Vertices without a
/// non-degenerate triangle get a zero normal.
pub fn vertex_normals(positions: &[Point3<f64>], triangles: &[[usize; 3]]) -> Vec<Vector3<f64>> {
    let mut normals = vec![Vector3::zeros(); positions.len()];

    for &[i, j, k] in triangles {
        let face_normal = (positions[j] - positions[i]).cross(&(positions[k] - positions[i]));
        normals[i] += face_normal;
        normals[j] += face_normal;
        normals[k] += face_normal;
    }

    for n in &mut normals {
        *n = n.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
    }

    normals
}
