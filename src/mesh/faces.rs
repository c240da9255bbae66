//! Face-vertex utilities.
//!
//! The Laplacian works on plain triangle index lists. These helpers turn
//! mixed triangle/quad input into triangles, check indices, and answer the
//! few adjacency questions the solvers need.

use std::collections::HashMap;

use crate::error::{LaplacianError, Result};

/// A polygon face as found in face-vertex mesh data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    /// A triangle.
    Triangle([usize; 3]),
    /// A quad, split along its `0-2` diagonal.
    Quad([usize; 4]),
}

impl Face {
    /// Number of triangles this face contributes.
    pub fn num_triangles(&self) -> usize {
        match self {
            Face::Triangle(_) => 1,
            Face::Quad(_) => 2,
        }
    }
}

impl From<[usize; 3]> for Face {
    fn from(tri: [usize; 3]) -> Self {
        Face::Triangle(tri)
    }
}

impl From<[usize; 4]> for Face {
    fn from(quad: [usize; 4]) -> Self {
        Face::Quad(quad)
    }
}

/// Split faces into triangles.
///
/// A quad `[a, b, c, d]` becomes `[a, b, c]` and `[a, c, d]`, in that order,
/// so triangle indices stay predictable for callers that map results back.
///
/// # Example
///
/// ```
/// use laplace_rig::mesh::{triangulate_faces, Face};
///
/// let faces = vec![Face::Quad([0, 1, 2, 3]), Face::Triangle([2, 1, 4])];
/// let tris = triangulate_faces(&faces);
/// assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3], [2, 1, 4]]);
/// ```
pub fn triangulate_faces(faces: &[Face]) -> Vec<[usize; 3]> {
    let mut triangles = Vec::with_capacity(faces.iter().map(Face::num_triangles).sum());
    for face in faces {
        match *face {
            Face::Triangle(tri) => triangles.push(tri),
            Face::Quad([a, b, c, d]) => {
                triangles.push([a, b, c]);
                triangles.push([a, c, d]);
            }
        }
    }
    triangles
}

/// Check that every triangle references an existing vertex.
pub fn validate_triangles(triangles: &[[usize; 3]], num_vertices: usize) -> Result<()> {
    for (ti, tri) in triangles.iter().enumerate() {
        if let Some(&vertex) = tri.iter().find(|&&v| v >= num_vertices) {
            return Err(LaplacianError::InvalidVertexIndex {
                triangle: ti,
                vertex,
            });
        }
    }
    Ok(())
}

/// Get canonical edge representation (smaller index first).
#[inline]
pub fn canonical_edge(v0: usize, v1: usize) -> (usize, usize) {
    if v0 < v1 {
        (v0, v1)
    } else {
        (v1, v0)
    }
}

/// Count how many triangles share each undirected edge.
pub fn edge_incidence(triangles: &[[usize; 3]]) -> HashMap<(usize, usize), usize> {
    let mut counts: HashMap<(usize, usize), usize> = HashMap::with_capacity(triangles.len() * 2);
    for tri in triangles {
        for i in 0..3 {
            *counts
                .entry(canonical_edge(tri[i], tri[(i + 1) % 3]))
                .or_insert(0) += 1;
        }
    }
    counts
}

/// For each vertex, one triangle that contains it (the last one listed).
///
/// Vertices that belong to no triangle map to `None`.
pub fn representative_faces(triangles: &[[usize; 3]], num_vertices: usize) -> Vec<Option<usize>> {
    let mut faces = vec![None; num_vertices];
    for (ti, tri) in triangles.iter().enumerate() {
        for &v in tri {
            faces[v] = Some(ti);
        }
    }
    faces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangulate_mixed() {
        let faces = vec![Face::from([0, 1, 2]), Face::from([1, 3, 4, 2])];
        let tris = triangulate_faces(&faces);
        assert_eq!(tris, vec![[0, 1, 2], [1, 3, 4], [1, 4, 2]]);
    }

    #[test]
    fn test_validate_triangles() {
        let tris = vec![[0, 1, 2], [2, 1, 5]];
        assert!(validate_triangles(&tris, 6).is_ok());
        assert_eq!(
            validate_triangles(&tris, 5),
            Err(LaplacianError::InvalidVertexIndex {
                triangle: 1,
                vertex: 5
            })
        );
    }

    #[test]
    fn test_edge_incidence_non_manifold() {
        // Three triangles hinged on edge (0, 1).
        let tris = vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]];
        let counts = edge_incidence(&tris);

        assert_eq!(counts[&(0, 1)], 3);
        assert_eq!(counts[&(1, 2)], 1);
        assert_eq!(counts[&(0, 3)], 1);
        assert_eq!(counts.len(), 7);
    }

    #[test]
    fn test_representative_faces() {
        let tris = vec![[0, 1, 2], [2, 1, 3]];
        let faces = representative_faces(&tris, 5);
        assert_eq!(faces, vec![Some(0), Some(1), Some(1), Some(1), None]);
    }
}
