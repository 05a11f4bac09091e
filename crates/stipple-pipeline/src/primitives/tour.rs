//! Tour heuristics: greedy nearest neighbour and Christofides.

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::types::Point;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Greedy nearest-neighbour tour starting at `start`.
///
/// From the current point, always moves to the closest unvisited point.
/// Unvisited points live in an R*-tree and are removed as they are
/// visited, so each step is a logarithmic query instead of a scan.
///
/// Returns every index exactly once, beginning with `start`. An
/// out-of-range `start` is treated as `0`.
#[must_use]
pub fn nearest_neighbor(points: &[Point], start: usize) -> Vec<usize> {
    if points.is_empty() {
        return Vec::new();
    }
    let start = if start < points.len() { start } else { 0 };

    let mut tree = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != start)
            .map(|(i, p)| IndexedPoint::new([p.x, p.y], i))
            .collect(),
    );

    let mut order = Vec::with_capacity(points.len());
    order.push(start);
    let mut current = points[start];
    while let Some(next) = tree.nearest_neighbor(&[current.x, current.y]).cloned() {
        tree.remove(&next);
        order.push(next.data);
        current = points[next.data];
    }
    order
}

/// Christofides-style approximate closed tour.
///
/// 1. Minimum spanning tree (dense Prim).
/// 2. Greedy matching of the odd-degree MST vertices, shortest pairs
///    first.
/// 3. Euler circuit of the MST plus matching (Hierholzer).
/// 4. Shortcut repeated vertices.
/// 5. At most `two_opt_passes` passes of 2-opt on the closed tour.
///
/// The greedy matching makes this a heuristic rather than the 1.5-approx
/// of the textbook algorithm. Inputs of three or fewer points fall back
/// to [`nearest_neighbor`] from index 0.
#[must_use]
pub fn christofides(points: &[Point], two_opt_passes: usize) -> Vec<usize> {
    let n = points.len();
    if n <= 3 {
        return nearest_neighbor(points, 0);
    }

    let mst = prim_mst(points);
    let mut degree = vec![0_usize; n];
    for &(u, v) in &mst {
        degree[u] += 1;
        degree[v] += 1;
    }
    let odd: Vec<usize> = (0..n).filter(|&i| degree[i] % 2 == 1).collect();
    let matching = greedy_matching(points, &odd);

    let mut graph = UnGraph::<(), ()>::with_capacity(n, mst.len() + matching.len());
    for _ in 0..n {
        graph.add_node(());
    }
    for &(u, v) in mst.iter().chain(&matching) {
        graph.add_edge(NodeIndex::new(u), NodeIndex::new(v), ());
    }

    let circuit = hierholzer(&graph, NodeIndex::new(0));
    let mut visited = vec![false; n];
    let mut tour = Vec::with_capacity(n);
    for node in circuit {
        let i = node.index();
        if !visited[i] {
            visited[i] = true;
            tour.push(i);
        }
    }

    two_opt(points, &mut tour, two_opt_passes);
    tour
}

/// Dense Prim's algorithm rooted at index 0. Returns `n - 1` edges as
/// `(parent, child)` pairs.
fn prim_mst(points: &[Point]) -> Vec<(usize, usize)> {
    let n = points.len();
    let mut in_tree = vec![false; n];
    let mut key = vec![f64::INFINITY; n];
    let mut parent: Vec<Option<usize>> = vec![None; n];
    key[0] = 0.0;

    for _ in 0..n {
        let Some(u) = (0..n)
            .filter(|&v| !in_tree[v])
            .min_by(|&a, &b| key[a].total_cmp(&key[b]))
        else {
            break;
        };
        in_tree[u] = true;
        for v in 0..n {
            if !in_tree[v] {
                let d = points[u].distance(points[v]);
                if d < key[v] {
                    key[v] = d;
                    parent[v] = Some(u);
                }
            }
        }
    }

    parent
        .iter()
        .enumerate()
        .filter_map(|(child, p)| p.map(|p| (p, child)))
        .collect()
}

/// Pair up `vertices` greedily, shortest pairs first.
fn greedy_matching(points: &[Point], vertices: &[usize]) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for (k, &a) in vertices.iter().enumerate() {
        for &b in &vertices[k + 1..] {
            pairs.push((points[a].distance(points[b]), a, b));
        }
    }
    pairs.sort_by(|x, y| {
        x.0.total_cmp(&y.0)
            .then_with(|| x.1.cmp(&y.1))
            .then_with(|| x.2.cmp(&y.2))
    });

    let mut matched = vec![false; points.len()];
    let mut matching = Vec::with_capacity(vertices.len() / 2);
    for (_, a, b) in pairs {
        if !matched[a] && !matched[b] {
            matched[a] = true;
            matched[b] = true;
            matching.push((a, b));
        }
    }
    matching
}

/// Euler circuit through every edge, starting at `start`.
///
/// Assumes every vertex has even degree.
fn hierholzer(graph: &UnGraph<(), ()>, start: NodeIndex) -> Vec<NodeIndex> {
    let mut stack = vec![start];
    let mut circuit = Vec::with_capacity(graph.edge_count() + 1);
    let mut used_edges = vec![false; graph.edge_count()];

    while let Some(&current) = stack.last() {
        let next_edge = graph
            .edges(current)
            .find(|e| !used_edges[e.id().index()])
            .map(|e| (e.id(), e.target()));

        if let Some((edge_id, target)) = next_edge {
            used_edges[edge_id.index()] = true;
            stack.push(target);
        } else {
            circuit.push(current);
            stack.pop();
        }
    }

    circuit.reverse();
    circuit
}

/// Improve a closed tour in place with 2-opt moves.
///
/// Each pass tries every pair of non-adjacent edges and reverses the
/// span between them whenever that shortens the tour. Stops after a pass
/// with no improvement or after `max_passes`. Returns the passes run.
fn two_opt(points: &[Point], tour: &mut [usize], max_passes: usize) -> usize {
    let n = tour.len();
    if n < 4 {
        return 0;
    }
    let dist = |a: usize, b: usize| points[a].distance(points[b]);

    let mut passes = 0;
    let mut improved = true;
    while improved && passes < max_passes {
        improved = false;
        passes += 1;
        for i in 0..n - 2 {
            for j in i + 2..n {
                if i == 0 && j == n - 1 {
                    continue;
                }
                let (a, b) = (tour[i], tour[i + 1]);
                let (c, d) = (tour[j], tour[(j + 1) % n]);
                if dist(a, c) + dist(b, d) < dist(a, b) + dist(c, d) - 1e-10 {
                    tour[i + 1..=j].reverse();
                    improved = true;
                }
            }
        }
    }
    passes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn is_permutation(order: &[usize], n: usize) -> bool {
        let mut seen = vec![false; n];
        for &i in order {
            if i >= n || seen[i] {
                return false;
            }
            seen[i] = true;
        }
        order.len() == n
    }

    fn closed_length(points: &[Point], order: &[usize]) -> f64 {
        (0..order.len())
            .map(|k| points[order[k]].distance(points[order[(k + 1) % order.len()]]))
            .sum()
    }

    fn scattered(n: usize) -> Vec<Point> {
        // Deterministic pseudo-scatter without an RNG.
        (0..n)
            .map(|i| {
                let t = f64::from(u32::try_from(i).unwrap());
                Point::new((t * 37.0) % 101.0, (t * 53.0) % 97.0)
            })
            .collect()
    }

    #[test]
    fn nearest_neighbor_empty() {
        assert!(nearest_neighbor(&[], 0).is_empty());
    }

    #[test]
    fn nearest_neighbor_starts_at_start() {
        let points = scattered(30);
        let order = nearest_neighbor(&points, 7);
        assert_eq!(order[0], 7);
        assert!(is_permutation(&order, 30));
    }

    #[test]
    fn nearest_neighbor_walks_a_line_in_order() {
        let points: Vec<_> = [0.0, 3.0, 1.0, 10.0, 2.0]
            .iter()
            .map(|&x| Point::new(x, 0.0))
            .collect();
        assert_eq!(nearest_neighbor(&points, 0), vec![0, 2, 4, 1, 3]);
    }

    #[test]
    fn nearest_neighbor_handles_duplicates() {
        let points = vec![Point::new(1.0, 1.0); 4];
        let order = nearest_neighbor(&points, 2);
        assert_eq!(order[0], 2);
        assert!(is_permutation(&order, 4));
    }

    #[test]
    fn christofides_small_inputs() {
        assert!(christofides(&[], 10).is_empty());
        assert_eq!(christofides(&[Point::new(0.0, 0.0)], 10), vec![0]);
        let three = [Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(1.0, 0.0)];
        assert!(is_permutation(&christofides(&three, 10), 3));
    }

    #[test]
    fn christofides_is_a_permutation() {
        let points = scattered(60);
        let tour = christofides(&points, 500);
        assert!(is_permutation(&tour, 60));
    }

    #[test]
    fn christofides_square_is_the_perimeter() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ];
        let tour = christofides(&points, 500);
        assert!((closed_length(&points, &tour) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn two_opt_never_lengthens() {
        let points = scattered(40);
        let mut tour: Vec<usize> = (0..40).collect();
        let before = closed_length(&points, &tour);
        let passes = two_opt(&points, &mut tour, 500);
        assert!(passes >= 1);
        assert!(closed_length(&points, &tour) <= before);
        assert!(is_permutation(&tour, 40));
    }

    #[test]
    fn two_opt_respects_pass_budget() {
        let points = scattered(40);
        let mut tour: Vec<usize> = (0..40).collect();
        assert_eq!(two_opt(&points, &mut tour, 0), 0);
        assert_eq!(tour, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn mst_has_n_minus_one_edges() {
        let points = scattered(12);
        assert_eq!(prim_mst(&points).len(), 11);
    }

    #[test]
    fn hierholzer_triangle_circuit() {
        let g = UnGraph::<(), ()>::from_edges([(0_u32, 1), (1, 2), (2, 0)]);
        let circuit = hierholzer(&g, NodeIndex::new(0));
        assert_eq!(circuit.len(), 4);
        assert_eq!(circuit[0], circuit[3]);
    }

    #[test]
    fn greedy_matching_pairs_closest_first() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(12.0, 0.0),
        ];
        let m = greedy_matching(&points, &[0, 1, 2, 3]);
        assert_eq!(m, vec![(0, 1), (2, 3)]);
    }
}
