//! Destination storage for skinning weights.

use std::collections::HashMap;

/// Storage for per-group vertex weights written by heat weighting.
///
/// Groups and vertices are plain indices. A vertex that is absent from a
/// group has no weight in it, which is different from a weight of zero.
pub trait WeightSink {
    /// Set the weight of `vertex` in `group`, adding the vertex if needed.
    fn replace_weight(&mut self, group: usize, vertex: usize, weight: f64);

    /// Add `weight` to the current weight of `vertex` in `group`. Absent
    /// vertices start from zero.
    fn add_weight(&mut self, group: usize, vertex: usize, weight: f64);

    /// Remove `vertex` from `group`.
    fn remove_vertex(&mut self, group: usize, vertex: usize);

    /// Weight of `vertex` in `group`, or `None` if it is not a member.
    fn weight(&self, group: usize, vertex: usize) -> Option<f64>;
}

/// In-memory vertex groups: one sparse vertex-to-weight map per group.
///
/// Groups are created on first write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexGroups {
    groups: Vec<HashMap<usize, f64>>,
}

impl VertexGroups {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage with `count` empty groups.
    pub fn with_groups(count: usize) -> Self {
        Self {
            groups: vec![HashMap::new(); count],
        }
    }

    /// Number of groups (including empty ones).
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Number of vertices in `group`.
    pub fn group_len(&self, group: usize) -> usize {
        self.groups.get(group).map_or(0, HashMap::len)
    }

    /// Members of `group` as `(vertex, weight)`, sorted by vertex.
    pub fn members(&self, group: usize) -> Vec<(usize, f64)> {
        let mut members: Vec<(usize, f64)> = self
            .groups
            .get(group)
            .map(|g| g.iter().map(|(&v, &w)| (v, w)).collect())
            .unwrap_or_default();
        members.sort_unstable_by_key(|&(v, _)| v);
        members
    }

    /// Sum of the weights of `vertex` over all groups.
    pub fn total_weight(&self, vertex: usize) -> f64 {
        self.groups.iter().filter_map(|g| g.get(&vertex)).sum()
    }

    fn group_mut(&mut self, group: usize) -> &mut HashMap<usize, f64> {
        if group >= self.groups.len() {
            self.groups.resize_with(group + 1, HashMap::new);
        }
        &mut self.groups[group]
    }
}

impl WeightSink for VertexGroups {
    fn replace_weight(&mut self, group: usize, vertex: usize, weight: f64) {
        self.group_mut(group).insert(vertex, weight);
    }

    fn add_weight(&mut self, group: usize, vertex: usize, weight: f64) {
        *self.group_mut(group).entry(vertex).or_insert(0.0) += weight;
    }

    fn remove_vertex(&mut self, group: usize, vertex: usize) {
        if let Some(g) = self.groups.get_mut(group) {
            g.remove(&vertex);
        }
    }

    fn weight(&self, group: usize, vertex: usize) -> Option<f64> {
        self.groups.get(group)?.get(&vertex).copied()
    }
}
