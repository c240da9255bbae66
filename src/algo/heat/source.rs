//! Per-vertex heat sources: bone distances, visibility and the resulting
//! diagonal and right-hand side coefficients.

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::mesh::{closest_on_segment, representative_faces, vertex_normals};
use crate::ray::OcclusionQuery;

use super::HeatWeightingOptions;

/// A bone segment that deposits heat into one vertex group.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    /// Segment start.
    pub root: Point3<f64>,
    /// Segment end.
    pub tip: Point3<f64>,
    /// Target vertex group. Consecutive bones sharing a group are treated as
    /// segments of one bone and accumulate into it.
    pub group: usize,
    /// Group receiving the mirrored weights, if any.
    pub mirror_group: Option<usize>,
    /// Only selected bones are solved. Unselected bones still compete for
    /// vertices as heat sources.
    pub selected: bool,
}

impl Bone {
    /// A selected bone without mirror group.
    pub fn new(root: Point3<f64>, tip: Point3<f64>, group: usize) -> Self {
        Self {
            root,
            tip,
            group,
            mirror_group: None,
            selected: true,
        }
    }

    /// Set the mirror group.
    pub fn with_mirror_group(mut self, group: usize) -> Self {
        self.mirror_group = Some(group);
        self
    }

    /// Set whether the bone is solved.
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Closest point of the segment to `p`.
    #[inline]
    pub fn closest_point(&self, p: &Point3<f64>) -> Point3<f64> {
        closest_on_segment(p, &self.root, &self.tip)
    }
}

/// Nearest visible bone distance and how many bones tie for it.
#[derive(Debug, Clone, Copy)]
struct NearestBones {
    min_distance: f64,
    num_closest: usize,
}

/// Heat source field of a mesh for a set of bones.
///
/// Every vertex is heated by the bones that are nearest to it and visible
/// from it. `heat(v)` goes on the diagonal of the Laplacian and
/// `heat(v) * weight(v)` on the right-hand side of every closest bone's
/// solve.
#[derive(Debug)]
pub struct HeatSources<'a, Q> {
    positions: &'a [Point3<f64>],
    bones: &'a [Bone],
    normals: Vec<Vector3<f64>>,
    faces: Vec<Option<usize>>,
    occlusion: Q,
    distance_epsilon: f64,
    ray_offset: f64,
    min_distance: Vec<f64>,
    num_closest: Vec<usize>,
    heat: Vec<f64>,
    weight: Vec<f64>,
}

impl<'a, Q: OcclusionQuery> HeatSources<'a, Q> {
    /// Compute the source field. `occlusion` must cover the same triangles.
    pub fn new(
        positions: &'a [Point3<f64>],
        triangles: &[[usize; 3]],
        bones: &'a [Bone],
        occlusion: Q,
        options: &HeatWeightingOptions,
    ) -> Self {
        let n = positions.len();
        let mut sources = Self {
            positions,
            bones,
            normals: vertex_normals(positions, triangles),
            faces: representative_faces(triangles, n),
            occlusion,
            distance_epsilon: options.distance_epsilon,
            ray_offset: options.ray_offset,
            min_distance: Vec::new(),
            num_closest: Vec::new(),
            heat: Vec::new(),
            weight: Vec::new(),
        };

        let nearest: Vec<NearestBones> = if options.parallel {
            (0..n)
                .into_par_iter()
                .map(|v| sources.nearest_bones(v))
                .collect()
        } else {
            (0..n).map(|v| sources.nearest_bones(v)).collect()
        };

        sources.min_distance = nearest.iter().map(|s| s.min_distance).collect();
        sources.num_closest = nearest.iter().map(|s| s.num_closest).collect();
        sources.heat = nearest
            .iter()
            .map(|s| {
                if s.num_closest == 0 {
                    0.0
                } else if s.min_distance >= options.min_source_distance {
                    s.num_closest as f64 * options.source_weight
                        / (s.min_distance * s.min_distance)
                } else {
                    options.coincident_heat
                }
            })
            .collect();
        sources.weight = nearest
            .iter()
            .map(|s| {
                if s.num_closest == 0 {
                    0.0
                } else {
                    1.0 / s.num_closest as f64
                }
            })
            .collect();

        sources
    }

    fn nearest_bones(&self, v: usize) -> NearestBones {
        let mut by_distance: Vec<(f64, usize)> = (0..self.bones.len())
            .map(|b| (self.distance(v, b), b))
            .collect();
        by_distance.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let nearest_visible = by_distance
            .iter()
            .find(|&&(_, b)| self.is_visible(v, b))
            .map(|&(d, _)| d);

        match nearest_visible {
            Some(min_distance) => {
                let limit = min_distance * (1.0 + self.distance_epsilon);
                let num_closest = by_distance
                    .iter()
                    .take_while(|&&(d, _)| d <= limit)
                    .filter(|&&(_, b)| self.is_visible(v, b))
                    .count();
                NearestBones {
                    min_distance,
                    num_closest,
                }
            }
            // Nothing reaches the vertex; it only receives diffused heat.
            None => NearestBones {
                min_distance: by_distance.first().map_or(f64::INFINITY, |&(d, _)| d),
                num_closest: 0,
            },
        }
    }
}

impl<Q: OcclusionQuery> HeatSources<'_, Q> {
    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// The bones acting as sources.
    pub fn bones(&self) -> &[Bone] {
        self.bones
    }

    /// Normal-biased distance from vertex `v` to `bone`.
    ///
    /// The Euclidean distance to the segment is divided by
    /// `0.5 * (cos + 1.001)`, where `cos` is the cosine between the vertex
    /// normal and the direction from the segment to the vertex. Bones
    /// behind the surface appear farther away.
    pub fn distance(&self, v: usize, bone: usize) -> f64 {
        let p = &self.positions[v];
        let offset = p - self.bones[bone].closest_point(p);
        let dist = offset.norm();
        let cosine = if dist > 0.0 {
            (offset / dist).dot(&self.normals[v])
        } else {
            1.0
        };
        dist / (0.5 * (cosine + 1.001))
    }

    /// Whether the straight segment from vertex `v` to the closest point of
    /// `bone` stays clear of the mesh.
    ///
    /// Both ends are pulled in by the ray offset and the vertex's own face is
    /// ignored. A vertex without faces sees every bone.
    pub fn is_visible(&self, v: usize, bone: usize) -> bool {
        let Some(face) = self.faces[v] else {
            return true;
        };
        let p = &self.positions[v];
        let to_bone = self.bones[bone].closest_point(p) - p;
        let start = p + to_bone * self.ray_offset;
        let end = p + to_bone * (1.0 - self.ray_offset);
        !self.occlusion.segment_occluded(&start, &end, Some(face))
    }

    /// Whether `bone` is among the closest visible bones of vertex `v`.
    pub fn is_closest(&self, v: usize, bone: usize) -> bool {
        self.num_closest[v] > 0
            && self.distance(v, bone) <= self.min_distance[v] * (1.0 + self.distance_epsilon)
            && self.is_visible(v, bone)
    }

    /// Distance to the nearest visible bone, or to the nearest bone when
    /// none is visible.
    pub fn min_distance(&self, v: usize) -> f64 {
        self.min_distance[v]
    }

    /// Number of bones tied for closest.
    pub fn num_closest(&self, v: usize) -> usize {
        self.num_closest[v]
    }

    /// Heat coefficient `H` of vertex `v`.
    pub fn heat(&self, v: usize) -> f64 {
        self.heat[v]
    }

    /// All heat coefficients, for the Laplacian diagonal.
    pub fn heat_diagonal(&self) -> &[f64] {
        &self.heat
    }

    /// Share `p` of the heat each closest bone receives.
    pub fn weight(&self, v: usize) -> f64 {
        self.weight[v]
    }
}
