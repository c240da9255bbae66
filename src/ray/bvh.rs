//! Bounding volume hierarchy over a triangle soup.

use nalgebra::{Point3, Vector3};

use super::OcclusionQuery;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Bounding box of a triangle.
    pub fn from_triangle(tri: &[Point3<f64>; 3]) -> Self {
        let mut bbox = Self {
            min: tri[0],
            max: tri[0],
        };
        bbox.grow(&tri[1]);
        bbox.grow(&tri[2]);
        bbox
    }

    fn grow(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Center of the box.
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Whether the parametric segment `origin + t * dir`, `t` in
    /// `[t_min, t_max]`, touches the box.
    fn intersects_segment(&self, origin: &Point3<f64>, dir: &Vector3<f64>, t_min: f64, t_max: f64) -> bool {
        let mut tmin = t_min;
        let mut tmax = t_max;

        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if d.abs() <= 1e-15 {
                if o < lo || o > hi {
                    return false;
                }
                continue;
            }

            let inv_d = 1.0 / d;
            let mut t0 = (lo - o) * inv_d;
            let mut t1 = (hi - o) * inv_d;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            tmin = tmin.max(t0);
            tmax = tmax.min(t1);
            if tmax < tmin {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bbox: Aabb,
    left: u32,
    right: u32,
    start: u32,
    count: u32,
}

impl BvhNode {
    fn leaf(bbox: Aabb, start: u32, count: u32) -> Self {
        Self {
            bbox,
            left: u32::MAX,
            right: u32::MAX,
            start,
            count,
        }
    }

    fn inner(bbox: Aabb, left: u32, right: u32) -> Self {
        Self {
            bbox,
            left,
            right,
            start: 0,
            count: 0,
        }
    }

    fn is_leaf(&self) -> bool {
        self.count != 0
    }
}

/// Triangle BVH answering segment occlusion queries.
///
/// Triangles keep the index they had in the input list, so callers can skip
/// the face a query originates from.
///
/// # Example
///
/// ```
/// use laplace_rig::ray::{OcclusionQuery, TriangleBvh};
/// use nalgebra::Point3;
///
/// let positions = vec![
///     Point3::new(-1.0, -1.0, 1.0),
///     Point3::new(1.0, -1.0, 1.0),
///     Point3::new(0.0, 1.0, 1.0),
/// ];
/// let bvh = TriangleBvh::build(&positions, &[[0, 1, 2]]);
///
/// let below = Point3::new(0.0, 0.0, 0.0);
/// let above = Point3::new(0.0, 0.0, 2.0);
/// assert!(bvh.segment_occluded(&below, &above, None));
/// assert!(!bvh.segment_occluded(&below, &above, Some(0)));
/// ```
#[derive(Debug, Clone)]
pub struct TriangleBvh {
    triangles: Vec<[Point3<f64>; 3]>,
    nodes: Vec<BvhNode>,
    prim_indices: Vec<u32>,
}

impl TriangleBvh {
    const LEAF_SIZE: usize = 4;

    /// Build the hierarchy over `triangles` (indices into `positions`).
    pub fn build(positions: &[Point3<f64>], triangles: &[[usize; 3]]) -> Self {
        let triangles: Vec<[Point3<f64>; 3]> = triangles
            .iter()
            .map(|tri| tri.map(|v| positions[v]))
            .collect();
        let bboxes: Vec<Aabb> = triangles.iter().map(Aabb::from_triangle).collect();

        let mut bvh = Self {
            prim_indices: (0..triangles.len() as u32).collect(),
            nodes: Vec::with_capacity(triangles.len().saturating_mul(2)),
            triangles,
        };
        if !bboxes.is_empty() {
            bvh.build_node(&bboxes, 0, bboxes.len());
        }
        bvh
    }

    /// Number of triangles.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Whether the hierarchy holds no triangles.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn build_node(&mut self, bboxes: &[Aabb], start: usize, end: usize) -> u32 {
        let node_index = self.nodes.len() as u32;
        let bbox = self.prim_indices[start + 1..end]
            .iter()
            .fold(bboxes[self.prim_indices[start] as usize], |acc, &i| {
                acc.union(&bboxes[i as usize])
            });
        let count = end - start;

        if count <= Self::LEAF_SIZE {
            self.nodes
                .push(BvhNode::leaf(bbox, start as u32, count as u32));
            return node_index;
        }
        self.nodes.push(BvhNode::leaf(bbox, 0, 0));

        // Split at the median centroid along the widest centroid extent.
        let centers = self.prim_indices[start..end]
            .iter()
            .map(|&i| bboxes[i as usize].center());
        let (lo, hi) = centers.fold(
            (Point3::from([f64::MAX; 3]), Point3::from([f64::MIN; 3])),
            |(lo, hi), c| (lo.inf(&c), hi.sup(&c)),
        );
        let axis = (hi - lo).imax();

        let mid = start + count / 2;
        self.prim_indices[start..end].select_nth_unstable_by(mid - start, |a, b| {
            let ca = bboxes[*a as usize].center()[axis];
            let cb = bboxes[*b as usize].center()[axis];
            ca.total_cmp(&cb)
        });

        let left = self.build_node(bboxes, start, mid);
        let right = self.build_node(bboxes, mid, end);
        self.nodes[node_index as usize] = BvhNode::inner(bbox, left, right);
        node_index
    }

    /// Visit triangles whose boxes the segment passes through, until `visit`
    /// returns `false`.
    fn query_segment<F>(&self, origin: &Point3<f64>, dir: &Vector3<f64>, mut visit: F)
    where
        F: FnMut(usize) -> bool,
    {
        if self.nodes.is_empty() {
            return;
        }

        let mut stack = vec![0u32];
        while let Some(node_idx) = stack.pop() {
            let node = self.nodes[node_idx as usize];
            if !node.bbox.intersects_segment(origin, dir, 0.0, 1.0) {
                continue;
            }

            if node.is_leaf() {
                let start = node.start as usize;
                let end = start + node.count as usize;
                for &prim in &self.prim_indices[start..end] {
                    if !visit(prim as usize) {
                        return;
                    }
                }
                continue;
            }

            stack.push(node.left);
            stack.push(node.right);
        }
    }
}

impl OcclusionQuery for TriangleBvh {
    fn segment_occluded(
        &self,
        start: &Point3<f64>,
        end: &Point3<f64>,
        skip_face: Option<usize>,
    ) -> bool {
        let dir = end - start;
        let mut hit = false;
        self.query_segment(start, &dir, |face| {
            if Some(face) != skip_face {
                if let Some(t) = segment_triangle_hit(start, &dir, &self.triangles[face]) {
                    hit = t > 0.0 && t < 1.0;
                }
            }
            !hit
        });
        hit
    }
}

/// Möller–Trumbore intersection of `origin + t * dir` with a triangle.
///
/// Returns the parameter `t` of the hit, if any. Both triangle sides count.
fn segment_triangle_hit(origin: &Point3<f64>, dir: &Vector3<f64>, tri: &[Point3<f64>; 3]) -> Option<f64> {
    let edge1 = tri[1] - tri[0];
    let edge2 = tri[2] - tri[0];
    let h = dir.cross(&edge2);
    let det = edge1.dot(&h);
    if !det.is_finite() || det.abs() <= 1e-14 * edge1.norm() * h.norm() {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = origin - tri[0];
    let u = inv_det * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = inv_det * dir.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = inv_det * edge2.dot(&q);
    t.is_finite().then_some(t)
}
