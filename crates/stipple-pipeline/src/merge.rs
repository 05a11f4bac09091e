//! Cluster merge: fold stipple points closer than the minimum spacing.
//!
//! Poisson-disk sampling guarantees spacing between candidates, but
//! callers may feed arbitrary point sets (and the acceptance step can be
//! replaced). Points closer than `min_distance` would draw as one blob and
//! produce near-zero path segments, so they are merged into their
//! centroid.
//!
//! Neighbours are found through a uniform grid of cell size
//! `min_distance`, so each point is only compared against its own and
//! the eight adjacent cells. Connected components are tracked with
//! [`petgraph::unionfind::UnionFind`]. Because a merged centroid can land
//! within range of another point, passes repeat until one performs no
//! union.

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;

use crate::geometry::GEOMETRY_EPSILON;
use crate::types::SamplePoint;

/// Result of [`merge_with_stats`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Merged points, ordered by the first member of each cluster.
    pub points: Vec<SamplePoint>,
    /// Number of grid passes run, including the final pass that found
    /// nothing to merge. Zero when merging was skipped.
    pub passes: usize,
}

/// Merge points closer than `min_distance` into weighted centroids.
///
/// See [`merge_with_stats`].
#[must_use = "returns the merged points"]
pub fn merge(points: &[SamplePoint], min_distance: f64) -> Vec<SamplePoint> {
    merge_with_stats(points, min_distance).points
}

/// Merge points closer than `min_distance`, reporting the pass count.
///
/// Each component becomes one point whose position and attributes are
/// the means of its members weighted by `cluster_size`, and whose
/// `cluster_size` is the sum of its members'. The output is never longer
/// than the input, and merging an already-merged set returns it
/// unchanged.
///
/// Non-positive or non-finite distances skip merging entirely.
#[must_use = "returns the merged points and pass count"]
pub fn merge_with_stats(points: &[SamplePoint], min_distance: f64) -> MergeOutcome {
    let mut current = points.to_vec();
    if !(min_distance.is_finite() && min_distance > 0.0) || current.len() < 2 {
        return MergeOutcome {
            points: current,
            passes: 0,
        };
    }

    let mut passes = 0;
    loop {
        passes += 1;
        match merge_pass(&current, min_distance) {
            Some(merged) => current = merged,
            None => {
                return MergeOutcome {
                    points: current,
                    passes,
                };
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn cell_of(point: &SamplePoint, cell_size: f64) -> (i64, i64) {
    (
        (point.x / cell_size).floor() as i64,
        (point.y / cell_size).floor() as i64,
    )
}

/// One grid pass. Returns `None` when no pair was close enough to merge.
fn merge_pass(points: &[SamplePoint], min_distance: f64) -> Option<Vec<SamplePoint>> {
    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, p) in points.iter().enumerate() {
        grid.entry(cell_of(p, min_distance)).or_default().push(i);
    }

    let limit = min_distance - GEOMETRY_EPSILON;
    let mut sets = UnionFind::<usize>::new(points.len());
    let mut unions = 0_usize;
    for (i, p) in points.iter().enumerate() {
        let (cx, cy) = cell_of(p, min_distance);
        for dy in -1..=1 {
            for dx in -1..=1 {
                // Cells past the i64 range do not exist.
                let (Some(nx), Some(ny)) = (cx.checked_add(dx), cy.checked_add(dy)) else {
                    continue;
                };
                let Some(bucket) = grid.get(&(nx, ny)) else {
                    continue;
                };
                for &j in bucket {
                    if j > i && p.distance(&points[j]) < limit && sets.union(i, j) {
                        unions += 1;
                    }
                }
            }
        }
    }

    if unions == 0 {
        return None;
    }

    // Accumulate weighted sums per component in first-member order.
    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    let mut sums: Vec<ClusterSum> = Vec::with_capacity(points.len() - unions);
    for (i, p) in points.iter().enumerate() {
        let root = sets.find_mut(i);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            sums.push(ClusterSum::default());
            sums.len() - 1
        });
        sums[slot].add(p);
    }

    Some(sums.iter().map(ClusterSum::mean).collect())
}

#[derive(Debug, Default)]
struct ClusterSum {
    x: f64,
    y: f64,
    tone: f64,
    edge: f64,
    edge_influence: f64,
    size: usize,
}

impl ClusterSum {
    #[allow(clippy::cast_precision_loss)]
    fn add(&mut self, p: &SamplePoint) {
        let w = p.cluster_size.max(1) as f64;
        self.x = p.x.mul_add(w, self.x);
        self.y = p.y.mul_add(w, self.y);
        self.tone = p.tone.mul_add(w, self.tone);
        self.edge = p.edge.mul_add(w, self.edge);
        self.edge_influence = p.edge_influence.mul_add(w, self.edge_influence);
        self.size += p.cluster_size.max(1);
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean(&self) -> SamplePoint {
        let n = self.size as f64;
        SamplePoint {
            x: self.x / n,
            y: self.y / n,
            tone: self.tone / n,
            edge: self.edge / n,
            edge_influence: self.edge_influence / n,
            cluster_size: self.size,
        }
    }
}
