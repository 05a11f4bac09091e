//! Point sampling: Poisson-disk candidates thinned by tone and edges.
//!
//! Candidates are laid out by Bridson-style dart throwing so that no two
//! are closer than `min_distance`. Each candidate is then kept with a
//! probability derived from the darkness of the image at that position
//! plus an attraction term near edges. Surviving points go through the
//! cluster merge with the same spacing.
//!
//! A single [`Pcg32`] seeded from `seed_stipple` drives placement and
//! acceptance, so identical inputs always produce identical points.

use std::f64::consts::{SQRT_2, TAU};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::analysis::Analysis;
use crate::merge::merge_with_stats;
use crate::types::{PipelineParameters, Point, SamplePoint};

/// Smallest spacing the sampler will use, in pixels.
pub const MIN_DISTANCE_FLOOR: f64 = 1.0;

/// Placement attempts around each active point before it is retired.
pub const POISSON_ATTEMPTS: usize = 30;

/// Result of [`sample_with_stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleOutcome {
    /// Final merged stipple points.
    pub points: Vec<SamplePoint>,
    /// Poisson-disk candidates generated.
    pub candidates: usize,
    /// Candidates that passed the acceptance draw.
    pub accepted: usize,
    /// Cluster merge passes run.
    pub merge_passes: usize,
}

/// The effective minimum spacing for a requested value.
#[must_use]
pub fn effective_min_distance(min_distance: f64) -> f64 {
    min_distance.max(MIN_DISTANCE_FLOOR)
}

/// Generate Poisson-disk candidates covering `[0, width) × [0, height)`.
///
/// The first point is drawn uniformly. Then, while the active list is
/// non-empty, a random active point gets `attempts` tries in the annulus
/// `[r, 2r]`; every try that keeps `r` spacing is added, and a point with
/// no successful try is retired. A background grid of cell size `r/√2`
/// holds at most one point per cell, so a 5×5 neighbourhood check is
/// exhaustive.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn poisson_disk<R: Rng>(
    width: f64,
    height: f64,
    min_distance: f64,
    attempts: usize,
    rng: &mut R,
) -> Vec<Point> {
    if !(width > 0.0 && height > 0.0 && min_distance > 0.0) {
        return Vec::new();
    }

    let cell_size = min_distance / SQRT_2;
    let grid_width = (width / cell_size).ceil() as usize;
    let grid_height = (height / cell_size).ceil() as usize;
    let mut grid: Vec<Option<usize>> = vec![None; grid_width * grid_height];
    let cell = |p: Point| -> (usize, usize) {
        (
            ((p.x / cell_size) as usize).min(grid_width - 1),
            ((p.y / cell_size) as usize).min(grid_height - 1),
        )
    };

    let min_sq = min_distance * min_distance;
    let mut points: Vec<Point> = Vec::new();

    let fits = |candidate: Point, points: &[Point], grid: &[Option<usize>]| -> bool {
        if candidate.x < 0.0 || candidate.x >= width || candidate.y < 0.0 || candidate.y >= height
        {
            return false;
        }
        let (gx, gy) = cell(candidate);
        let x_range = gx.saturating_sub(2)..=(gx + 2).min(grid_width - 1);
        for ny in gy.saturating_sub(2)..=(gy + 2).min(grid_height - 1) {
            for nx in x_range.clone() {
                if let Some(idx) = grid[ny * grid_width + nx]
                    && candidate.distance_squared(points[idx]) < min_sq
                {
                    return false;
                }
            }
        }
        true
    };

    let first = Point::new(rng.random::<f64>() * width, rng.random::<f64>() * height);
    let (fx, fy) = cell(first);
    grid[fy * grid_width + fx] = Some(0);
    points.push(first);
    let mut active = vec![0_usize];

    while !active.is_empty() {
        let active_idx = rng.random_range(0..active.len());
        let origin = points[active[active_idx]];

        let mut found = false;
        for _ in 0..attempts {
            let angle = rng.random::<f64>() * TAU;
            let radius = min_distance + rng.random::<f64>() * min_distance;
            let candidate = Point::new(
                radius.mul_add(angle.cos(), origin.x),
                radius.mul_add(angle.sin(), origin.y),
            );
            if fits(candidate, &points, &grid) {
                let (cx, cy) = cell(candidate);
                grid[cy * grid_width + cx] = Some(points.len());
                active.push(points.len());
                points.push(candidate);
                found = true;
            }
        }

        if !found {
            active.remove(active_idx);
        }
    }

    points
}

/// Probability in `[0, 1]` of keeping a candidate with the given field
/// values.
///
/// `min(1, min(1, (1 - tone)^gamma + edge_weight * influence^exponent) * density_scale)`
#[must_use]
pub fn acceptance_threshold(tone: f64, edge_influence: f64, params: &PipelineParameters) -> f64 {
    let tone_density = (1.0 - tone.clamp(0.0, 1.0)).powf(params.gamma);
    let edge_density = edge_influence.max(0.0).powf(params.edge_exponent);
    let combined = params
        .edge_weight
        .mul_add(edge_density, tone_density)
        .min(1.0);
    (combined * params.density_scale).min(1.0)
}

/// Sample the analysis fields at a continuous position.
fn sample_fields(analysis: &Analysis, position: Point) -> SamplePoint {
    SamplePoint {
        tone: f64::from(analysis.tone.sample(position.x, position.y)),
        edge: f64::from(analysis.edge_magnitude.sample(position.x, position.y)),
        edge_influence: f64::from(analysis.edge_influence.sample(position.x, position.y)),
        ..SamplePoint::new(position.x, position.y)
    }
}

/// Generate merged stipple points for an analysed image.
#[must_use = "returns the stipple points"]
pub fn sample(analysis: &Analysis, params: &PipelineParameters) -> Vec<SamplePoint> {
    sample_with_stats(analysis, params).points
}

/// Generate merged stipple points, reporting candidate and merge counts.
#[must_use = "returns the stipple points and sampling statistics"]
pub fn sample_with_stats(analysis: &Analysis, params: &PipelineParameters) -> SampleOutcome {
    let min_distance = effective_min_distance(params.min_distance);
    let mut rng = Pcg32::seed_from_u64(params.seed_stipple);

    let candidates = poisson_disk(
        f64::from(analysis.dimensions.width),
        f64::from(analysis.dimensions.height),
        min_distance,
        POISSON_ATTEMPTS,
        &mut rng,
    );

    let accepted: Vec<SamplePoint> = candidates
        .iter()
        .filter_map(|&position| {
            let point = sample_fields(analysis, position);
            let threshold = acceptance_threshold(point.tone, point.edge_influence, params);
            (rng.random::<f64>() < threshold).then_some(point)
        })
        .collect();

    let merged = merge_with_stats(&accepted, min_distance);
    SampleOutcome {
        candidates: candidates.len(),
        accepted: accepted.len(),
        merge_passes: merged.passes,
        points: merged.points,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::types::RgbaImage;
    use image::Rgba;

    fn gradient_image() -> RgbaImage {
        RgbaImage::from_fn(64, 48, |x, _| {
            let v = u8::try_from(x * 4).unwrap_or(u8::MAX);
            Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn poisson_points_respect_spacing_and_bounds() {
        let mut rng = Pcg32::seed_from_u64(1);
        let points = poisson_disk(80.0, 60.0, 6.0, POISSON_ATTEMPTS, &mut rng);
        assert!(points.len() > 20);
        for (i, a) in points.iter().enumerate() {
            assert!((0.0..80.0).contains(&a.x) && (0.0..60.0).contains(&a.y));
            for b in &points[i + 1..] {
                assert!(a.distance(*b) >= 6.0 - 1e-9);
            }
        }
    }

    #[test]
    fn poisson_is_deterministic_per_seed() {
        let a = poisson_disk(50.0, 50.0, 5.0, 30, &mut Pcg32::seed_from_u64(9));
        let b = poisson_disk(50.0, 50.0, 5.0, 30, &mut Pcg32::seed_from_u64(9));
        let c = poisson_disk(50.0, 50.0, 5.0, 30, &mut Pcg32::seed_from_u64(10));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn poisson_degenerate_area_is_empty() {
        let mut rng = Pcg32::seed_from_u64(1);
        assert!(poisson_disk(0.0, 10.0, 5.0, 30, &mut rng).is_empty());
        assert!(poisson_disk(10.0, 10.0, 0.0, 30, &mut rng).is_empty());
    }

    #[test]
    fn poisson_tiny_area_yields_seed_point() {
        let mut rng = Pcg32::seed_from_u64(3);
        let points = poisson_disk(1.0, 1.0, 8.0, 30, &mut rng);
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn black_pixels_always_accepted() {
        let params = PipelineParameters::default();
        assert!((acceptance_threshold(0.0, 0.0, &params) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn white_pixels_without_edges_never_accepted() {
        let params = PipelineParameters::default();
        assert!(acceptance_threshold(1.0, 0.0, &params).abs() < f64::EPSILON);
    }

    #[test]
    fn edges_attract_points_on_white() {
        let params = PipelineParameters::default();
        let t = acceptance_threshold(1.0, 1.0, &params);
        assert!((t - params.edge_weight).abs() < 1e-12);
    }

    #[test]
    fn density_scale_caps_at_one() {
        let params = PipelineParameters {
            density_scale: 10.0,
            ..PipelineParameters::default()
        };
        let t = acceptance_threshold(0.5, 0.0, &params);
        assert!((t - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn same_seed_gives_identical_points() {
        let params = PipelineParameters {
            seed_stipple: 42,
            min_distance: 4.0,
            ..PipelineParameters::default()
        };
        let analysis = analyze(&gradient_image(), &params).unwrap();
        let first = sample(&analysis, &params);
        let second = sample(&analysis, &params);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn different_seed_changes_points() {
        let params = PipelineParameters {
            min_distance: 4.0,
            ..PipelineParameters::default()
        };
        let analysis = analyze(&gradient_image(), &params).unwrap();
        let a = sample(&analysis, &params);
        let b = sample(
            &analysis,
            &PipelineParameters {
                seed_stipple: 43,
                ..params.clone()
            },
        );
        assert_ne!(a, b);
    }

    #[test]
    fn dark_regions_receive_more_points() {
        let params = PipelineParameters {
            min_distance: 3.0,
            edge_weight: 0.0,
            ..PipelineParameters::default()
        };
        let analysis = analyze(&gradient_image(), &params).unwrap();
        let points = sample(&analysis, &params);
        let dark = points.iter().filter(|p| p.x < 16.0).count();
        let light = points.iter().filter(|p| p.x >= 48.0).count();
        assert!(dark > light, "dark = {dark}, light = {light}");
    }

    #[test]
    fn stats_are_consistent() {
        let params = PipelineParameters {
            min_distance: 4.0,
            ..PipelineParameters::default()
        };
        let analysis = analyze(&gradient_image(), &params).unwrap();
        let outcome = sample_with_stats(&analysis, &params);
        assert!(outcome.accepted <= outcome.candidates);
        assert!(outcome.points.len() <= outcome.accepted);
        // Poisson spacing means nothing needs merging.
        assert_eq!(outcome.points.len(), outcome.accepted);
        assert!(outcome.points.iter().all(|p| p.cluster_size == 1));
    }

    #[test]
    fn tiny_min_distance_is_floored() {
        assert!((effective_min_distance(0.1) - MIN_DISTANCE_FLOOR).abs() < f64::EPSILON);
        assert!((effective_min_distance(-5.0) - MIN_DISTANCE_FLOOR).abs() < f64::EPSILON);
        assert!((effective_min_distance(8.0) - 8.0).abs() < f64::EPSILON);
    }
}
