//! Path solving: order stipple points into one non-crossing polyline.
//!
//! A pen plotter draws the whole stipple set as a single stroke, so the
//! points must be visited in one order that never crosses itself. This
//! module defines the [`PathBuilder`] trait for candidate strategies and
//! the closed [`PathStrategy`] enum that implements it.
//!
//! [`solve`] runs every strategy, drops candidates that self-intersect,
//! and keeps the best by [`compare_metrics`]. Every candidate starts at
//! the same anchor (top-most, then left-most point). If no candidate
//! survives, the y-monotone backbone is returned as-is.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::geometry::{PathMetrics, can_extend, compare_metrics, find_anchor, is_path_valid};
use crate::primitives;
use crate::types::{PipelineError, PipelineParameters, Point, Polyline, SamplePoint};

/// A candidate ordering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathStrategy {
    /// Sweep top to bottom, ties broken left to right.
    #[default]
    MonotoneY,
    /// Sweep left to right (or right to left), ties broken top to bottom.
    ///
    /// Only produces a candidate when the anchor is the left-most or
    /// right-most point, since every path must start at the anchor.
    MonotoneX,
    /// Greedy nearest-neighbour tour from the anchor.
    Nearest,
    /// Approximate closed TSP tour, opened at the anchor.
    Christofides,
    /// Walk the Delaunay adjacency graph from the anchor, avoiding
    /// crossings where a neighbour allows it.
    Delaunay,
}

impl PathStrategy {
    /// Every strategy, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::MonotoneY,
        Self::MonotoneX,
        Self::Nearest,
        Self::Christofides,
        Self::Delaunay,
    ];

    /// The kebab-case name used in parameters and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MonotoneY => "monotone-y",
            Self::MonotoneX => "monotone-x",
            Self::Nearest => "nearest",
            Self::Christofides => "christofides",
            Self::Delaunay => "delaunay",
        }
    }

    /// Strategies in evaluation order: `preferred` first, then the fixed
    /// fallback list, each evaluated once.
    #[must_use]
    pub fn candidate_order(preferred: Self) -> Vec<Self> {
        let mut order = Vec::with_capacity(Self::ALL.len());
        for strategy in [
            preferred,
            Self::MonotoneY,
            Self::Delaunay,
            Self::Nearest,
            Self::Christofides,
            Self::MonotoneX,
        ] {
            if !order.contains(&strategy) {
                order.push(strategy);
            }
        }
        order
    }
}

impl fmt::Display for PathStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| {
                PipelineError::InvalidInput(format!(
                    "unknown path mode {s:?} (expected one of: monotone-y, monotone-x, \
                     nearest, christofides, delaunay)"
                ))
            })
    }
}

/// Shared, precomputed input for every [`PathBuilder`].
#[derive(Debug, Clone)]
pub struct SolveContext {
    positions: Vec<Point>,
    anchor: usize,
    jitter: Vec<f64>,
    christofides_passes: usize,
}

impl SolveContext {
    /// Prepare a context, or `None` for an empty point set.
    ///
    /// Jitter values are drawn in input order from a [`Pcg32`] seeded
    /// with `seed_path`, one per point.
    #[must_use]
    pub fn new(points: &[SamplePoint], params: &PipelineParameters) -> Option<Self> {
        let positions: Vec<Point> = points.iter().map(SamplePoint::position).collect();
        let anchor = find_anchor(&positions)?;
        let mut rng = Pcg32::seed_from_u64(params.seed_path);
        let jitter = positions.iter().map(|_| rng.random::<f64>()).collect();
        Some(Self {
            positions,
            anchor,
            jitter,
            christofides_passes: params.christofides_passes,
        })
    }

    /// Point positions, indexed like the solver input.
    #[must_use]
    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    /// Index every candidate must start at.
    #[must_use]
    pub const fn anchor(&self) -> usize {
        self.anchor
    }

    fn polyline(&self, order: &[usize]) -> Vec<Point> {
        order.iter().map(|&i| self.positions[i]).collect()
    }

    /// Anchor first, then every other index sorted by `key`, ties broken
    /// by jitter.
    fn sweep(&self, key: impl Fn(&Point, &Point) -> std::cmp::Ordering) -> Vec<usize> {
        let mut rest: Vec<usize> = (0..self.positions.len())
            .filter(|&i| i != self.anchor)
            .collect();
        rest.sort_by(|&a, &b| {
            key(&self.positions[a], &self.positions[b])
                .then_with(|| self.jitter[a].total_cmp(&self.jitter[b]))
        });
        let mut order = Vec::with_capacity(self.positions.len());
        order.push(self.anchor);
        order.extend(rest);
        order
    }
}

/// A strategy that proposes an ordering of all points.
pub trait PathBuilder {
    /// Propose a permutation of `0..ctx.positions().len()` starting at
    /// `ctx.anchor()`, or `None` if this strategy cannot produce one.
    fn build(&self, ctx: &SolveContext) -> Option<Vec<usize>>;
}

impl PathBuilder for PathStrategy {
    fn build(&self, ctx: &SolveContext) -> Option<Vec<usize>> {
        match *self {
            Self::MonotoneY => Some(build_monotone_y(ctx)),
            Self::MonotoneX => build_monotone_x(ctx),
            Self::Nearest => Some(primitives::nearest_neighbor(ctx.positions(), ctx.anchor())),
            Self::Christofides => build_christofides(ctx),
            Self::Delaunay => build_delaunay(ctx),
        }
    }
}

/// The guaranteed backbone: sort by y, then x, then jitter.
fn build_monotone_y(ctx: &SolveContext) -> Vec<usize> {
    ctx.sweep(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)))
}

fn build_monotone_x(ctx: &SolveContext) -> Option<Vec<usize>> {
    let anchor_x = ctx.positions[ctx.anchor].x;
    let leftmost = ctx.positions.iter().all(|p| anchor_x <= p.x);
    let rightmost = ctx.positions.iter().all(|p| anchor_x >= p.x);
    if leftmost {
        Some(ctx.sweep(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))))
    } else if rightmost {
        Some(ctx.sweep(|a, b| b.x.total_cmp(&a.x).then(a.y.total_cmp(&b.y))))
    } else {
        None
    }
}

/// Rotate the tour to start at the anchor. Non-finite coordinates leave
/// the spanning tree disconnected, so a tour missing points gives no
/// candidate.
fn build_christofides(ctx: &SolveContext) -> Option<Vec<usize>> {
    let mut tour = primitives::christofides(ctx.positions(), ctx.christofides_passes);
    if tour.len() != ctx.positions.len() {
        return None;
    }
    let start = tour.iter().position(|&i| i == ctx.anchor)?;
    tour.rotate_left(start);
    Some(tour)
}

/// Walk the triangulation from the anchor.
///
/// Each step takes the nearest unvisited neighbour whose new segment
/// does not cross the path so far. When none qualifies, the globally
/// nearest unvisited point is taken unchecked and the validity filter
/// decides the whole candidate's fate.
fn build_delaunay(ctx: &SolveContext) -> Option<Vec<usize>> {
    let n = ctx.positions.len();
    let triangles = primitives::triangulate(ctx.positions())?;

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for [a, b, c] in triangles {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            adjacency[u].push(v);
            adjacency[v].push(u);
        }
    }
    for neighbours in &mut adjacency {
        neighbours.sort_unstable();
        neighbours.dedup();
    }

    let by_distance_from = |from: Point| {
        move |&a: &usize, &b: &usize| {
            from.distance_squared(ctx.positions[a])
                .total_cmp(&from.distance_squared(ctx.positions[b]))
                .then(a.cmp(&b))
        }
    };

    let mut visited = vec![false; n];
    visited[ctx.anchor] = true;
    let mut order = Vec::with_capacity(n);
    order.push(ctx.anchor);
    let mut drawn = vec![ctx.positions[ctx.anchor]];

    while order.len() < n {
        let current = *order.last()?;
        let from = ctx.positions[current];

        let mut neighbours: Vec<usize> = adjacency[current]
            .iter()
            .copied()
            .filter(|&j| !visited[j])
            .collect();
        neighbours.sort_by(by_distance_from(from));

        let next = neighbours
            .into_iter()
            .find(|&j| can_extend(&drawn, ctx.positions[j]))
            .or_else(|| (0..n).filter(|&j| !visited[j]).min_by(by_distance_from(from)))?;

        visited[next] = true;
        order.push(next);
        drawn.push(ctx.positions[next]);
    }
    Some(order)
}

/// How a [`StipplePath`] was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSelection {
    /// Fewer than two points; the input order was kept.
    Trivial,
    /// The best valid candidate came from this strategy.
    Strategy(PathStrategy),
    /// No candidate was valid; the y-monotone backbone was used unfiltered.
    Fallback,
}

impl fmt::Display for PathSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trivial => f.write_str("trivial"),
            Self::Strategy(strategy) => fmt::Display::fmt(strategy, f),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// The solver's output: every input point exactly once, in drawing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StipplePath {
    /// Points in drawing order.
    pub points: Vec<SamplePoint>,
    /// `points[k]` is `input[order[k]]`.
    pub order: Vec<usize>,
    /// How the ordering was chosen.
    pub selection: PathSelection,
}

impl StipplePath {
    /// An empty path.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            points: Vec::new(),
            order: Vec::new(),
            selection: PathSelection::Trivial,
        }
    }

    fn from_order(points: &[SamplePoint], order: Vec<usize>, selection: PathSelection) -> Self {
        Self {
            points: order.iter().map(|&i| points[i]).collect(),
            order,
            selection,
        }
    }

    /// Number of points on the path.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the path has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point positions as a polyline.
    #[must_use]
    pub fn to_polyline(&self) -> Polyline {
        Polyline::new(self.points.iter().map(SamplePoint::position).collect())
    }

    /// Length, longest segment, and smoothness of the path.
    #[must_use]
    pub fn metrics(&self) -> PathMetrics {
        PathMetrics::measure(self.to_polyline().points())
    }
}

/// What happened to one candidate strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CandidateOutcome {
    /// The strategy produced no ordering (e.g. degenerate triangulation).
    Skipped,
    /// The ordering crossed itself and was discarded.
    Rejected,
    /// The ordering was valid and scored.
    Scored(PathMetrics),
}

/// Per-strategy record of a [`solve`] run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    /// Which strategy was evaluated.
    pub strategy: PathStrategy,
    /// What became of its candidate.
    pub outcome: CandidateOutcome,
}

/// The chosen path plus a report on every candidate considered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSolution {
    /// The selected path.
    pub path: StipplePath,
    /// One entry per evaluated strategy, in evaluation order.
    pub candidates: Vec<CandidateReport>,
}

/// Build the best non-crossing path through `points`.
///
/// See [`solve`].
#[must_use = "returns the ordered path"]
pub fn build_path(points: &[SamplePoint], params: &PipelineParameters) -> StipplePath {
    solve(points, params).path
}

/// Evaluate every strategy and select the best valid candidate.
///
/// Candidates are compared with [`compare_metrics`]; on a tie the one
/// evaluated first wins, so `params.path_mode` takes precedence. Fewer
/// than two points are returned in input order.
#[must_use = "returns the ordered path and candidate reports"]
pub fn solve(points: &[SamplePoint], params: &PipelineParameters) -> PathSolution {
    let trivial = || PathSolution {
        path: StipplePath::from_order(points, (0..points.len()).collect(), PathSelection::Trivial),
        candidates: Vec::new(),
    };
    if points.len() < 2 {
        return trivial();
    }
    let Some(ctx) = SolveContext::new(points, params) else {
        return trivial();
    };

    let mut candidates = Vec::new();
    let mut best: Option<(PathStrategy, Vec<usize>, PathMetrics)> = None;

    for strategy in PathStrategy::candidate_order(params.path_mode) {
        let Some(order) = strategy.build(&ctx) else {
            candidates.push(CandidateReport {
                strategy,
                outcome: CandidateOutcome::Skipped,
            });
            continue;
        };

        let polyline = ctx.polyline(&order);
        if !is_path_valid(&polyline) {
            candidates.push(CandidateReport {
                strategy,
                outcome: CandidateOutcome::Rejected,
            });
            continue;
        }

        let metrics = PathMetrics::measure(&polyline);
        candidates.push(CandidateReport {
            strategy,
            outcome: CandidateOutcome::Scored(metrics),
        });
        let improves = best.as_ref().is_none_or(|(_, _, current)| {
            compare_metrics(&metrics, current) == std::cmp::Ordering::Less
        });
        if improves {
            best = Some((strategy, order, metrics));
        }
    }

    let path = match best {
        Some((strategy, order, _)) => {
            StipplePath::from_order(points, order, PathSelection::Strategy(strategy))
        }
        None => StipplePath::from_order(points, build_monotone_y(&ctx), PathSelection::Fallback),
    };
    PathSolution { path, candidates }
}
