//! Planar predicates and path quality metrics used by the path solver.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Tolerance for orientation tests and metric comparisons.
pub const GEOMETRY_EPSILON: f64 = 1e-6;

/// Turn direction of an ordered point triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Signed area within [`GEOMETRY_EPSILON`] of zero.
    Collinear,
    /// Counter-clockwise in a y-up frame.
    CounterClockwise,
    /// Clockwise in a y-up frame.
    Clockwise,
}

/// Orientation of `(a, b, c)` with a fixed epsilon, so near-collinear
/// triples classify the same way on every platform.
#[must_use]
pub fn orientation(a: Point, b: Point, c: Point) -> Orientation {
    let cross = (b.x - a.x).mul_add(c.y - a.y, -((b.y - a.y) * (c.x - a.x)));
    if cross.abs() < GEOMETRY_EPSILON {
        Orientation::Collinear
    } else if cross > 0.0 {
        Orientation::CounterClockwise
    } else {
        Orientation::Clockwise
    }
}

fn same_point(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() < GEOMETRY_EPSILON && (a.y - b.y).abs() < GEOMETRY_EPSILON
}

/// `p` lies on segment `a-b` (bounding-box test, `p` assumed collinear)
/// and is not one of its endpoints.
fn strictly_inside(a: Point, b: Point, p: Point) -> bool {
    let within = p.x <= a.x.max(b.x) + GEOMETRY_EPSILON
        && p.x + GEOMETRY_EPSILON >= a.x.min(b.x)
        && p.y <= a.y.max(b.y) + GEOMETRY_EPSILON
        && p.y + GEOMETRY_EPSILON >= a.y.min(b.y);
    within && !same_point(p, a) && !same_point(p, b)
}

/// Whether segments `p1-p2` and `q1-q2` strictly intersect.
///
/// A proper crossing, or an endpoint of one segment lying inside the
/// other (which covers collinear overlap), counts. Segments that only
/// touch at a shared endpoint do not.
#[must_use]
pub fn segments_intersect_strict(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let o1 = orientation(p1, p2, q1);
    let o2 = orientation(p1, p2, q2);
    let o3 = orientation(q1, q2, p1);
    let o4 = orientation(q1, q2, p2);

    let straddles = |a: Orientation, b: Orientation| {
        a != Orientation::Collinear && b != Orientation::Collinear && a != b
    };
    if straddles(o1, o2) && straddles(o3, o4) {
        return true;
    }

    (o1 == Orientation::Collinear && strictly_inside(p1, p2, q1))
        || (o2 == Orientation::Collinear && strictly_inside(p1, p2, q2))
        || (o3 == Orientation::Collinear && strictly_inside(q1, q2, p1))
        || (o4 == Orientation::Collinear && strictly_inside(q1, q2, p2))
}

/// Whether no two non-adjacent segments of the polyline strictly
/// intersect.
#[must_use]
pub fn is_path_valid(path: &[Point]) -> bool {
    let segments = path.len().saturating_sub(1);
    for i in 0..segments {
        for j in i + 2..segments {
            if segments_intersect_strict(path[i], path[i + 1], path[j], path[j + 1]) {
                return false;
            }
        }
    }
    true
}

/// Whether appending `next` to `path` keeps it free of strict
/// intersections. The segment adjacent to the new one is not checked.
#[must_use]
pub fn can_extend(path: &[Point], next: Point) -> bool {
    let Some(&last) = path.last() else {
        return true;
    };
    path.windows(2)
        .take(path.len().saturating_sub(2))
        .all(|w| !segments_intersect_strict(w[0], w[1], last, next))
}

/// Index of the anchor: minimal y, then minimal x, first index on exact
/// duplicates. `None` for an empty slice.
#[must_use]
pub fn find_anchor(points: &[Point]) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)))
        .map(|(i, _)| i)
}

/// Quality of a candidate path. Lower segment lengths and higher
/// smoothness are better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathMetrics {
    /// Longest single segment.
    pub max_segment_length: f64,
    /// Sum of all segment lengths.
    pub total_length: f64,
    /// Mean cosine between consecutive segment directions, in `[-1, 1]`.
    pub smoothness: f64,
}

impl PathMetrics {
    /// Measure a polyline. Paths with fewer than two points have zero
    /// length and smoothness 1.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn measure(path: &[Point]) -> Self {
        let mut max_segment_length = 0.0_f64;
        let mut total_length = 0.0;
        let mut cos_sum = 0.0;
        let mut turns = 0_usize;

        for (i, w) in path.windows(2).enumerate() {
            let length = w[0].distance(w[1]);
            total_length += length;
            max_segment_length = max_segment_length.max(length);

            if i > 0 {
                let prev = path[i - 1];
                let (px, py) = (w[0].x - prev.x, w[0].y - prev.y);
                let (nx, ny) = (w[1].x - w[0].x, w[1].y - w[0].y);
                let denom = px.hypot(py) * nx.hypot(ny);
                if denom > 0.0 {
                    cos_sum += px.mul_add(nx, py * ny) / denom;
                    turns += 1;
                }
            }
        }

        Self {
            max_segment_length,
            total_length,
            smoothness: if turns > 0 {
                cos_sum / turns as f64
            } else {
                1.0
            },
        }
    }
}

/// Order two metric records: shorter longest segment first, then shorter
/// total, then smoother. Each key within [`GEOMETRY_EPSILON`] counts as
/// equal and falls through to the next.
#[must_use]
pub fn compare_metrics(a: &PathMetrics, b: &PathMetrics) -> Ordering {
    let key = |x: f64, y: f64| {
        if (x - y).abs() <= GEOMETRY_EPSILON {
            Ordering::Equal
        } else {
            x.total_cmp(&y)
        }
    };
    key(a.max_segment_length, b.max_segment_length)
        .then_with(|| key(a.total_length, b.total_length))
        .then_with(|| key(b.smoothness, a.smoothness))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn orientation_classifies_turns() {
        assert_eq!(
            orientation(p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)),
            Orientation::CounterClockwise
        );
        assert_eq!(
            orientation(p(0.0, 0.0), p(1.0, 0.0), p(1.0, -1.0)),
            Orientation::Clockwise
        );
        assert_eq!(
            orientation(p(0.0, 0.0), p(1.0, 0.0), p(2.0, 1e-9)),
            Orientation::Collinear
        );
    }

    #[test]
    fn proper_crossing() {
        assert!(segments_intersect_strict(
            p(0.0, 0.0),
            p(2.0, 2.0),
            p(0.0, 2.0),
            p(2.0, 0.0)
        ));
    }

    #[test]
    fn disjoint_segments() {
        assert!(!segments_intersect_strict(
            p(0.0, 0.0),
            p(1.0, 0.0),
            p(0.0, 1.0),
            p(1.0, 1.0)
        ));
    }

    #[test]
    fn shared_endpoint_is_not_a_crossing() {
        assert!(!segments_intersect_strict(
            p(0.0, 0.0),
            p(1.0, 1.0),
            p(1.0, 1.0),
            p(2.0, 0.0)
        ));
        // Collinear and end-to-end.
        assert!(!segments_intersect_strict(
            p(0.0, 0.0),
            p(1.0, 0.0),
            p(1.0, 0.0),
            p(2.0, 0.0)
        ));
    }

    #[test]
    fn collinear_overlap_is_a_crossing() {
        assert!(segments_intersect_strict(
            p(0.0, 0.0),
            p(2.0, 0.0),
            p(1.0, 0.0),
            p(3.0, 0.0)
        ));
    }

    #[test]
    fn endpoint_touching_interior_is_a_crossing() {
        assert!(segments_intersect_strict(
            p(0.0, 0.0),
            p(2.0, 0.0),
            p(1.0, 0.0),
            p(1.0, 5.0)
        ));
    }

    #[test]
    fn collinear_but_separate_is_not_a_crossing() {
        assert!(!segments_intersect_strict(
            p(0.0, 0.0),
            p(1.0, 0.0),
            p(2.0, 0.0),
            p(3.0, 0.0)
        ));
    }

    #[test]
    fn bowtie_is_invalid() {
        let path = [p(0.0, 0.0), p(10.0, 10.0), p(10.0, 0.0), p(0.0, 10.0)];
        assert!(!is_path_valid(&path));
    }

    #[test]
    fn open_square_is_valid() {
        let path = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)];
        assert!(is_path_valid(&path));
    }

    #[test]
    fn short_paths_are_valid() {
        assert!(is_path_valid(&[]));
        assert!(is_path_valid(&[p(0.0, 0.0)]));
        assert!(is_path_valid(&[p(0.0, 0.0), p(1.0, 1.0), p(0.0, 1.0)]));
    }

    #[test]
    fn can_extend_rejects_crossing_segment() {
        let path = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0)];
        assert!(!can_extend(&path, p(5.0, -5.0)));
        assert!(can_extend(&path, p(0.0, 10.0)));
        assert!(can_extend(&[], p(1.0, 1.0)));
        assert!(can_extend(&[p(0.0, 0.0)], p(1.0, 1.0)));
    }

    #[test]
    fn anchor_is_top_then_left() {
        let points = [p(5.0, 1.0), p(3.0, 0.0), p(1.0, 0.0), p(0.0, 2.0)];
        assert_eq!(find_anchor(&points), Some(2));
        assert_eq!(find_anchor(&[]), None);
    }

    #[test]
    fn anchor_prefers_first_duplicate() {
        let points = [p(1.0, 1.0), p(0.0, 0.0), p(0.0, 0.0)];
        assert_eq!(find_anchor(&points), Some(1));
    }

    #[test]
    fn metrics_of_straight_line() {
        let m = PathMetrics::measure(&[p(0.0, 0.0), p(3.0, 0.0), p(5.0, 0.0)]);
        assert!((m.max_segment_length - 3.0).abs() < f64::EPSILON);
        assert!((m.total_length - 5.0).abs() < f64::EPSILON);
        assert!((m.smoothness - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn metrics_of_right_angle() {
        let m = PathMetrics::measure(&[p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)]);
        assert!(m.smoothness.abs() < 1e-12);
    }

    #[test]
    fn metrics_of_trivial_paths() {
        for path in [&[][..], &[p(1.0, 1.0)][..]] {
            let m = PathMetrics::measure(path);
            assert!(m.total_length.abs() < f64::EPSILON);
            assert!((m.smoothness - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn compare_prefers_short_max_segment_first() {
        let a = PathMetrics {
            max_segment_length: 5.0,
            total_length: 100.0,
            smoothness: 0.0,
        };
        let b = PathMetrics {
            max_segment_length: 6.0,
            total_length: 10.0,
            smoothness: 1.0,
        };
        assert_eq!(compare_metrics(&a, &b), Ordering::Less);
    }

    #[test]
    fn compare_tolerates_tiny_differences() {
        let a = PathMetrics {
            max_segment_length: 5.0,
            total_length: 10.0,
            smoothness: 0.2,
        };
        let b = PathMetrics {
            max_segment_length: 5.0 + 1e-9,
            total_length: 10.0 - 1e-9,
            smoothness: 0.5,
        };
        // Lengths tie within tolerance; smoother wins.
        assert_eq!(compare_metrics(&a, &b), Ordering::Greater);
        assert_eq!(compare_metrics(&a, &a), Ordering::Equal);
    }
}
