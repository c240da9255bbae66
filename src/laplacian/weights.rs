//! Per-triangle cotangent weights and per-vertex area normalization.

use nalgebra::Point3;

use crate::mesh::{cotangent, is_obtuse_at, triangle_area};

/// Area weight used for vertices whose accumulated area is exactly zero.
pub const DEGENERATE_AREA_WEIGHT: f64 = 1.0;

/// Cotangent of the interior angle at each corner of a triangle.
///
/// Entry `k` belongs to the edge opposite corner `k`.
pub fn corner_cotangents(positions: &[Point3<f64>], tri: [usize; 3]) -> [f64; 3] {
    let [p0, p1, p2] = tri.map(|v| &positions[v]);
    [
        cotangent(p0, p1, p2),
        cotangent(p1, p2, p0),
        cotangent(p2, p0, p1),
    ]
}

/// Add one triangle's share of the mixed Voronoi area to its corners.
///
/// An obtuse triangle gives its whole area to the obtuse corner and half of
/// it to each other corner. Otherwise every corner receives a quarter of the
/// cotangent-weighted squared lengths of its two adjacent edges.
pub fn accumulate_mixed_area(areas: &mut [f64], positions: &[Point3<f64>], tri: [usize; 3]) {
    let [p0, p1, p2] = tri.map(|v| &positions[v]);

    let obtuse = if is_obtuse_at(p0, p1, p2) {
        Some(0)
    } else if is_obtuse_at(p1, p2, p0) {
        Some(1)
    } else if is_obtuse_at(p2, p0, p1) {
        Some(2)
    } else {
        None
    };

    match obtuse {
        Some(corner) => {
            let area = triangle_area(p0, p1, p2);
            for (k, &v) in tri.iter().enumerate() {
                areas[v] += if k == corner { area } else { 0.5 * area };
            }
        }
        None => {
            let cot = corner_cotangents(positions, tri);
            // Squared length of the edge opposite each corner
            let len_sq = [
                (p2 - p1).norm_squared(),
                (p0 - p2).norm_squared(),
                (p1 - p0).norm_squared(),
            ];
            let t = [cot[0] * len_sq[0], cot[1] * len_sq[1], cot[2] * len_sq[2]];

            areas[tri[0]] += (t[1] + t[2]) * 0.25;
            areas[tri[1]] += (t[0] + t[2]) * 0.25;
            areas[tri[2]] += (t[0] + t[1]) * 0.25;
        }
    }
}

/// Mixed Voronoi area of every vertex.
pub fn mixed_areas(positions: &[Point3<f64>], triangles: &[[usize; 3]]) -> Vec<f64> {
    let mut areas = vec![0.0; positions.len()];
    for &tri in triangles {
        accumulate_mixed_area(&mut areas, positions, tri);
    }
    areas
}

/// Invert vertex areas into row normalization factors: `0.5 / area`, or
/// [`DEGENERATE_AREA_WEIGHT`] when the area is zero.
pub fn area_weights(areas: &[f64]) -> Vec<f64> {
    areas
        .iter()
        .map(|&a| if a != 0.0 { 0.5 / a } else { DEGENERATE_AREA_WEIGHT })
        .collect()
}
