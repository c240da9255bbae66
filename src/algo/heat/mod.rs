//! Automatic skinning weights by heat diffusion ("bone heat weighting").
//!
//! Each bone is treated as a heat source that warms the vertices it is
//! closest to and can see. The equilibrium temperature of the surface,
//! found by solving `(L + H) w = H p` with the cotangent Laplacian `L`, is
//! the bone's skinning weight. Weights diffuse smoothly across the surface
//! and respect its connectivity rather than straight-line distance.
//!
//! # Algorithm
//!
//! 1. Build a BVH over the mesh for line-of-sight tests
//! 2. For every vertex find the nearest visible bones ([`HeatSources`])
//! 3. Assemble `L + H` once, with area-normalized rows
//! 4. For each selected bone, solve with right-hand side `H p` restricted to
//!    the vertices where that bone is closest, and write the result into
//!    the bone's vertex group
//!
//! # References
//!
//! - Baran, I., & Popović, J. (2007). "Automatic Rigging and Animation of 3D
//!   Characters." ACM SIGGRAPH 2007.

mod groups;
mod source;

pub use groups::{VertexGroups, WeightSink};
pub use source::{Bone, HeatSources};

use nalgebra::Point3;

use crate::algo::progress::Progress;
use crate::error::{LaplacianError, Result};
use crate::laplacian::LaplacianBuilder;
use crate::mesh::validate_triangles;
use crate::ray::TriangleBvh;
use crate::solver::{SolverOptions, SparseSolver};

/// Weights below this are dropped from the group.
pub const WEIGHT_LIMIT: f64 = 0.05;

/// Heat constant `C` in `H = C * numclosest / mindist²`.
pub const SOURCE_WEIGHT: f64 = 1.0;

/// Relative slack within which bones tie for closest.
pub const DISTANCE_EPSILON: f64 = 1e-4;

/// Below this bone distance a vertex is considered to touch the bone.
pub const MIN_SOURCE_DISTANCE: f64 = 1e-4;

/// Heat given to vertices touching a bone.
pub const COINCIDENT_HEAT: f64 = 1e8;

/// Fraction of the vertex-to-bone segment trimmed at both ends before the
/// visibility test.
pub const RAY_OFFSET: f64 = 1e-5;

const WARNING: &str = "Bone Heat Weighting: failed to find solution for one or more bones";

/// Options for bone heat weighting.
#[derive(Debug, Clone)]
pub struct HeatWeightingOptions {
    /// Weights below this limit remove the vertex from the group (default: 0.05).
    pub weight_limit: f64,

    /// Heat constant `C` (default: 1.0).
    pub source_weight: f64,

    /// Relative tolerance for bones tying as closest (default: 1e-4).
    pub distance_epsilon: f64,

    /// Distance under which the coincident heat is used (default: 1e-4).
    pub min_source_distance: f64,

    /// Heat for vertices closer than `min_source_distance` (default: 1e8).
    pub coincident_heat: f64,

    /// Segment trimming for visibility rays (default: 1e-5).
    pub ray_offset: f64,

    /// Only vertices flagged `true` are written. `None` writes all.
    pub vertex_mask: Option<Vec<bool>>,

    /// Mirror counterpart of each vertex. Weights of bones with a mirror
    /// group are also written to the counterpart in that group.
    pub mirror_vertices: Option<Vec<Option<usize>>>,

    /// Compute the heat source field in parallel (default: false).
    pub parallel: bool,

    /// Linear solver settings.
    pub solver: SolverOptions,
}

impl Default for HeatWeightingOptions {
    fn default() -> Self {
        Self {
            weight_limit: WEIGHT_LIMIT,
            source_weight: SOURCE_WEIGHT,
            distance_epsilon: DISTANCE_EPSILON,
            min_source_distance: MIN_SOURCE_DISTANCE,
            coincident_heat: COINCIDENT_HEAT,
            ray_offset: RAY_OFFSET,
            vertex_mask: None,
            mirror_vertices: None,
            parallel: false,
            solver: SolverOptions::default(),
        }
    }
}

impl HeatWeightingOptions {
    /// Set the weight limit.
    pub fn with_weight_limit(mut self, limit: f64) -> Self {
        self.weight_limit = limit;
        self
    }

    /// Set the heat constant.
    pub fn with_source_weight(mut self, weight: f64) -> Self {
        self.source_weight = weight;
        self
    }

    /// Restrict writes to the flagged vertices.
    pub fn with_vertex_mask(mut self, mask: Vec<bool>) -> Self {
        self.vertex_mask = Some(mask);
        self
    }

    /// Set the vertex mirror map.
    pub fn with_mirror_vertices(mut self, mirror: Vec<Option<usize>>) -> Self {
        self.mirror_vertices = Some(mirror);
        self
    }

    /// Set whether the source field is computed in parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the linear solver options.
    pub fn with_solver(mut self, solver: SolverOptions) -> Self {
        self.solver = solver;
        self
    }

    fn validate(&self, num_vertices: usize) -> Result<()> {
        if !(0.0..=1.0).contains(&self.weight_limit) {
            return Err(LaplacianError::invalid_param(
                "weight_limit",
                self.weight_limit,
                "must be in [0, 1]",
            ));
        }
        if !(self.source_weight > 0.0 && self.source_weight.is_finite()) {
            return Err(LaplacianError::invalid_param(
                "source_weight",
                self.source_weight,
                "must be positive and finite",
            ));
        }
        if !(self.distance_epsilon >= 0.0) {
            return Err(LaplacianError::invalid_param(
                "distance_epsilon",
                self.distance_epsilon,
                "must be non-negative",
            ));
        }
        if !(self.min_source_distance >= 0.0) {
            return Err(LaplacianError::invalid_param(
                "min_source_distance",
                self.min_source_distance,
                "must be non-negative",
            ));
        }
        if !(self.coincident_heat > 0.0) {
            return Err(LaplacianError::invalid_param(
                "coincident_heat",
                self.coincident_heat,
                "must be positive",
            ));
        }
        if !(0.0..0.5).contains(&self.ray_offset) {
            return Err(LaplacianError::invalid_param(
                "ray_offset",
                self.ray_offset,
                "must be in [0, 0.5)",
            ));
        }
        if let Some(mask) = &self.vertex_mask {
            LaplacianError::check_len("vertex mask", num_vertices, mask.len())?;
        }
        if let Some(mirror) = &self.mirror_vertices {
            LaplacianError::check_len("mirror vertices", num_vertices, mirror.len())?;
            if let Some(&bad) = mirror.iter().flatten().find(|&&m| m >= num_vertices) {
                return Err(LaplacianError::invalid_param(
                    "mirror_vertices",
                    bad,
                    "mirror vertex out of range",
                ));
            }
        }
        Ok(())
    }

    #[inline]
    fn writes(&self, v: usize) -> bool {
        self.vertex_mask.as_ref().map_or(true, |mask| mask[v])
    }

    fn mirror_of(&self, v: usize) -> Option<usize> {
        self.mirror_vertices.as_ref().and_then(|m| m[v])
    }
}

/// Outcome of a heat weighting run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeatWeightingReport {
    /// Indices of bones whose solve succeeded.
    pub solved_bones: Vec<usize>,
    /// Indices of bones whose solve failed. Their groups were not written.
    pub failed_bones: Vec<usize>,
}

impl HeatWeightingReport {
    /// Whether every selected bone was solved.
    pub fn is_complete(&self) -> bool {
        self.failed_bones.is_empty()
    }

    /// User-facing warning when at least one bone failed.
    pub fn warning(&self) -> Option<&'static str> {
        (!self.is_complete()).then_some(WARNING)
    }
}

/// Compute skinning weights for `bones` and write them into `sink`.
///
/// See [`bone_heat_weighting_with_progress`].
///
/// # Example
///
/// ```
/// use laplace_rig::algo::heat::{bone_heat_weighting, Bone, HeatWeightingOptions, VertexGroups};
/// use nalgebra::Point3;
///
/// let positions = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let triangles = vec![[0, 1, 2], [0, 2, 3]];
/// let bones = vec![Bone::new(Point3::new(0.0, 0.5, -1.0), Point3::new(1.0, 0.5, -1.0), 0)];
///
/// let mut groups = VertexGroups::new();
/// let report = bone_heat_weighting(
///     &positions,
///     &triangles,
///     &bones,
///     &mut groups,
///     &HeatWeightingOptions::default(),
/// )
/// .unwrap();
///
/// assert!(report.is_complete());
/// assert_eq!(groups.group_len(0), 4);
/// ```
pub fn bone_heat_weighting<W: WeightSink + ?Sized>(
    positions: &[Point3<f64>],
    triangles: &[[usize; 3]],
    bones: &[Bone],
    sink: &mut W,
    options: &HeatWeightingOptions,
) -> Result<HeatWeightingReport> {
    bone_heat_weighting_with_progress(positions, triangles, bones, sink, options, &Progress::none())
}

/// Compute skinning weights for `bones`, reporting progress per bone.
///
/// Only selected bones are solved, but every bone acts as a heat source.
/// Runs of consecutive bones that share a group are segments of one bone:
/// the group is cleared before the first selected segment, segment
/// solutions add up, and the limit is applied after the last selected one. Single bones write
/// `clamp(w, 0, 1)`, or remove the vertex when that is below the weight
/// limit.
///
/// A failed solve does not abort the run. The bone is listed in the report,
/// its group is left as it was, and a warning is logged once.
///
/// # Errors
///
/// Returns an error if the mesh is empty, a triangle references a missing
/// vertex, or an option is out of range.
pub fn bone_heat_weighting_with_progress<W: WeightSink + ?Sized>(
    positions: &[Point3<f64>],
    triangles: &[[usize; 3]],
    bones: &[Bone],
    sink: &mut W,
    options: &HeatWeightingOptions,
    progress: &Progress,
) -> Result<HeatWeightingReport> {
    let n = positions.len();
    if n == 0 || triangles.is_empty() {
        return Err(LaplacianError::EmptyMesh);
    }
    validate_triangles(triangles, n)?;
    options.validate(n)?;

    let bvh = TriangleBvh::build(positions, triangles);
    let sources = HeatSources::new(positions, triangles, bones, &bvh, options);

    let mut builder = LaplacianBuilder::begin_with_solver(
        SparseSolver::new(n, options.solver.clone()),
        triangles.len(),
    );
    for p in positions {
        builder.add_vertex(*p, false);
    }
    for &[i, j, k] in triangles {
        builder.add_triangle(i, j, k);
    }
    builder.set_heat_diagonal(sources.heat_diagonal().to_vec());
    let mut system = builder.end()?;

    let total = bones.iter().filter(|b| b.selected).count();
    let mut report = HeatWeightingReport::default();

    for (j, bone) in bones.iter().enumerate() {
        if !bone.selected {
            continue;
        }
        let done = report.solved_bones.len() + report.failed_bones.len();
        progress.report(done, total, "Bone heat weighting");

        let (first_segment, last_segment) = segment_position(bones, j);
        let segmented = !(first_segment && last_segment);

        if segmented && first_segment {
            for v in (0..n).filter(|&v| options.writes(v)) {
                for (group, target) in targets(bone, v, options) {
                    sink.remove_vertex(group, target);
                }
            }
        }

        system.begin_solve(None);
        for v in 0..n {
            if sources.is_closest(v, j) {
                system.add_right_hand_side(v, sources.heat(v) * sources.weight(v));
            }
        }

        match system.solve() {
            Ok(()) => {
                for v in (0..n).filter(|&v| options.writes(v)) {
                    let solution = system.solution(v);
                    for (group, target) in targets(bone, v, options) {
                        if segmented {
                            if solution > 0.0 {
                                sink.add_weight(group, target, solution);
                            }
                        } else {
                            write_limited(sink, group, target, solution, options.weight_limit);
                        }
                    }
                }
                report.solved_bones.push(j);
            }
            Err(err) => {
                if report.failed_bones.is_empty() {
                    log::warn!("{WARNING}");
                }
                log::debug!("heat solve for bone {j} failed: {err}");
                report.failed_bones.push(j);
            }
        }

        if segmented && last_segment {
            for v in (0..n).filter(|&v| options.writes(v)) {
                for (group, target) in targets(bone, v, options) {
                    if let Some(w) = sink.weight(group, target) {
                        write_limited(sink, group, target, w, options.weight_limit);
                    }
                }
            }
        }
    }

    progress.finish(total, "Bone heat weighting");
    log::debug!(
        "bone heat weighting: {} vertices, {} bones, {} solved, {} failed",
        n,
        bones.len(),
        report.solved_bones.len(),
        report.failed_bones.len()
    );

    Ok(report)
}

/// `(group, vertex)` pairs written for vertex `v` of `bone`: its own group
/// and, when both maps exist, the mirrored vertex in the mirror group.
fn targets(
    bone: &Bone,
    v: usize,
    options: &HeatWeightingOptions,
) -> impl Iterator<Item = (usize, usize)> {
    let mirrored = bone.mirror_group.zip(options.mirror_of(v));
    std::iter::once((bone.group, v)).chain(mirrored)
}

/// Whether bone `j` is the first and the last selected bone of its run of
/// consecutive bones sharing a group.
fn segment_position(bones: &[Bone], j: usize) -> (bool, bool) {
    let group = bones[j].group;
    let first = !bones[..j]
        .iter()
        .rev()
        .take_while(|b| b.group == group)
        .any(|b| b.selected);
    let last = !bones[j + 1..]
        .iter()
        .take_while(|b| b.group == group)
        .any(|b| b.selected);
    (first, last)
}

fn write_limited<W: WeightSink + ?Sized>(sink: &mut W, group: usize, vertex: usize, weight: f64, limit: f64) {
    let weight = weight.clamp(0.0, 1.0);
    if weight < limit {
        sink.remove_vertex(group, vertex);
    } else {
        sink.replace_weight(group, vertex, weight);
    }
}
