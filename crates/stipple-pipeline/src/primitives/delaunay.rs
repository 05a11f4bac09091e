//! Delaunay triangulation via `spade`.

use spade::{DelaunayTriangulation, HasPosition, Point2, Triangulation};

use crate::types::Point;

/// A triangulation vertex that remembers its input index.
#[derive(Debug, Clone, Copy)]
struct Site {
    position: Point2<f64>,
    index: usize,
}

impl HasPosition for Site {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// Triangulate `points`, returning each inner triangle as three input
/// indices.
///
/// Returns `None` when no triangle exists (fewer than three distinct
/// points, or all points collinear) or when `spade` rejects a coordinate.
/// Exact duplicate positions are collapsed to one vertex, so some indices
/// may not appear in any triangle.
#[must_use]
pub fn triangulate(points: &[Point]) -> Option<Vec<[usize; 3]>> {
    if points.len() < 3 {
        return None;
    }

    let sites: Vec<Site> = points
        .iter()
        .enumerate()
        .map(|(index, p)| Site {
            position: Point2::new(p.x, p.y),
            index,
        })
        .collect();
    let triangulation: DelaunayTriangulation<Site> =
        DelaunayTriangulation::bulk_load(sites).ok()?;

    let triangles: Vec<[usize; 3]> = triangulation
        .inner_faces()
        .map(|face| face.vertices().map(|v| v.data().index))
        .collect();

    if triangles.is_empty() {
        None
    } else {
        Some(triangles)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn too_few_points() {
        assert!(triangulate(&[]).is_none());
        assert!(triangulate(&[Point::new(0.0, 0.0), Point::new(1.0, 0.0)]).is_none());
    }

    #[test]
    fn collinear_points_have_no_triangles() {
        let points: Vec<_> = (0..5).map(|i| Point::new(f64::from(i), 0.0)).collect();
        assert!(triangulate(&points).is_none());
    }

    #[test]
    fn single_triangle() {
        let points = [Point::new(0.0, 0.0), Point::new(4.0, 0.0), Point::new(0.0, 3.0)];
        let triangles = triangulate(&points).unwrap();
        assert_eq!(triangles.len(), 1);
        let mut t = triangles[0];
        t.sort_unstable();
        assert_eq!(t, [0, 1, 2]);
    }

    #[test]
    fn square_has_two_triangles() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        let triangles = triangulate(&points).unwrap();
        assert_eq!(triangles.len(), 2);
        for t in &triangles {
            assert!(t.iter().all(|&i| i < 4));
        }
    }

    #[test]
    fn non_finite_coordinate_is_rejected() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(f64::NAN, 0.0),
            Point::new(0.0, 3.0),
        ];
        assert!(triangulate(&points).is_none());
    }
}
