//! Shared types for the stipple pipeline.

use serde::{Deserialize, Serialize};

use crate::path::{PathStrategy, StipplePath};

/// Re-export `GrayImage` so downstream crates can reference the binary
/// edge mask without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so callers can hand the pipeline a decoded
/// raster without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// A sequence of connected points forming a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// A `width × height` grid of `f32` samples, indexed `y * width + x`.
///
/// Produced once by [`crate::analysis::analyze`] and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarField {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl ScalarField {
    /// Wrap a row-major sample buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if `data.len()` is not
    /// `width * height`.
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, PipelineError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(PipelineError::InvalidInput(format!(
                "scalar field of {width}x{height} needs {expected} samples, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a field by evaluating `f(x, y)` for every cell.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Field width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Field height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row-major samples.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Sample at integer cell `(x, y)`. Coordinates must be in bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Sample at a continuous position: floored, then clamped into the
    /// field bounds. Returns `0.0` for an empty field.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample(&self, x: f64, y: f64) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let max_x = f64::from(self.width - 1);
        let max_y = f64::from(self.height - 1);
        let ix = x.floor().clamp(0.0, max_x) as u32;
        let iy = y.floor().clamp(0.0, max_y) as u32;
        self.get(ix, iy)
    }

    /// Largest sample, or `0.0` for an empty or all-negative field.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }

    /// A copy with every sample multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }
}

/// A stipple point: a position plus the field values sampled there.
///
/// `cluster_size` counts the raw samples folded into this point by
/// [`crate::merge::merge`]; the attribute fields are the mean over those
/// samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    /// Horizontal position in pixels.
    pub x: f64,
    /// Vertical position in pixels.
    pub y: f64,
    /// Luminance in `[0, 1]` (0 = black).
    pub tone: f64,
    /// Raw gradient magnitude.
    pub edge: f64,
    /// Normalised, blurred edge magnitude in `[0, 1]`.
    pub edge_influence: f64,
    /// Number of raw samples merged into this point (at least 1).
    pub cluster_size: usize,
}

impl SamplePoint {
    /// A single raw sample at `(x, y)` with all attributes zero.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            tone: 0.0,
            edge: 0.0,
            edge_influence: 0.0,
            cluster_size: 1,
        }
    }

    /// The point's position.
    #[must_use]
    pub const fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Euclidean distance between two sample positions.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        self.position().distance(other.position())
    }
}

/// Parameters for every pipeline stage.
///
/// All parameters have defaults matching the reference stipple tool.
/// Out-of-range values are clamped where they are used (edge thresholds,
/// minimum spacing); only values that cannot be clamped at all, such as
/// NaN, are rejected by [`validate`](Self::validate).
///
/// Changing a field invalidates a fixed subset of cached stage outputs;
/// see [`crate::pipeline::ParamKey::invalidates`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParameters {
    /// Seed for candidate placement and acceptance draws.
    pub seed_stipple: u64,

    /// Seed for the per-point jitter that breaks exact sweep ties.
    pub seed_path: u64,

    /// Box blur radius applied to the tone field before edge detection.
    pub smooth_radius: u32,

    /// Canny low threshold, as a fraction of the maximum gradient.
    pub edge_low: f32,

    /// Canny high threshold, as a fraction of the maximum gradient.
    pub edge_high: f32,

    /// Box blur radius that diffuses edge attraction around edges.
    pub edge_blur_radius: u32,

    /// Minimum spacing between stipple points in pixels.
    pub min_distance: f64,

    /// Exponent applied to darkness when computing tone density.
    pub gamma: f64,

    /// Global multiplier on acceptance probability.
    pub density_scale: f64,

    /// Weight of the edge term relative to the tone term.
    pub edge_weight: f64,

    /// Exponent applied to edge influence.
    pub edge_exponent: f64,

    /// Path strategy the caller prefers. Every other strategy is still
    /// evaluated; this one is tried first and wins ties.
    pub path_mode: PathStrategy,

    /// Upper bound on 2-opt improvement passes in the Christofides tour.
    pub christofides_passes: usize,
}

impl PipelineParameters {
    /// Default stipple RNG seed.
    pub const DEFAULT_SEED_STIPPLE: u64 = 42;
    /// Default path jitter seed.
    pub const DEFAULT_SEED_PATH: u64 = 7;
    /// Default tone smoothing radius.
    pub const DEFAULT_SMOOTH_RADIUS: u32 = 2;
    /// Default Canny low threshold fraction.
    pub const DEFAULT_EDGE_LOW: f32 = 0.08;
    /// Default Canny high threshold fraction.
    pub const DEFAULT_EDGE_HIGH: f32 = 0.22;
    /// Default edge influence blur radius.
    pub const DEFAULT_EDGE_BLUR_RADIUS: u32 = 3;
    /// Default minimum point spacing.
    pub const DEFAULT_MIN_DISTANCE: f64 = 8.0;
    /// Default tone gamma.
    pub const DEFAULT_GAMMA: f64 = 1.2;
    /// Default density scale.
    pub const DEFAULT_DENSITY_SCALE: f64 = 1.0;
    /// Default edge weight.
    pub const DEFAULT_EDGE_WEIGHT: f64 = 0.3;
    /// Default edge exponent.
    pub const DEFAULT_EDGE_EXPONENT: f64 = 1.4;
    /// Default preferred path strategy.
    pub const DEFAULT_PATH_MODE: PathStrategy = PathStrategy::MonotoneY;
    /// Default 2-opt pass budget.
    pub const DEFAULT_CHRISTOFIDES_PASSES: usize = 500;

    /// Reject values that no clamp can repair.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] naming the first
    /// non-finite field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let checks = [
            ("edge_low", f64::from(self.edge_low)),
            ("edge_high", f64::from(self.edge_high)),
            ("min_distance", self.min_distance),
            ("gamma", self.gamma),
            ("density_scale", self.density_scale),
            ("edge_weight", self.edge_weight),
            ("edge_exponent", self.edge_exponent),
        ];
        for (name, value) in checks {
            if !value.is_finite() {
                return Err(PipelineError::InvalidInput(format!(
                    "{name} must be a finite number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for PipelineParameters {
    fn default() -> Self {
        Self {
            seed_stipple: Self::DEFAULT_SEED_STIPPLE,
            seed_path: Self::DEFAULT_SEED_PATH,
            smooth_radius: Self::DEFAULT_SMOOTH_RADIUS,
            edge_low: Self::DEFAULT_EDGE_LOW,
            edge_high: Self::DEFAULT_EDGE_HIGH,
            edge_blur_radius: Self::DEFAULT_EDGE_BLUR_RADIUS,
            min_distance: Self::DEFAULT_MIN_DISTANCE,
            gamma: Self::DEFAULT_GAMMA,
            density_scale: Self::DEFAULT_DENSITY_SCALE,
            edge_weight: Self::DEFAULT_EDGE_WEIGHT,
            edge_exponent: Self::DEFAULT_EDGE_EXPONENT,
            path_mode: Self::DEFAULT_PATH_MODE,
            christofides_passes: Self::DEFAULT_CHRISTOFIDES_PASSES,
        }
    }
}

/// Result of running the full pipeline once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// The merged stipple points the path was built from.
    pub points: Vec<SamplePoint>,

    /// The single ordered path through every point.
    pub path: StipplePath,

    /// Dimensions of the source image in pixels.
    ///
    /// Export serializers use this to set coordinate spaces
    /// (e.g., SVG `viewBox`).
    pub dimensions: Dimensions,
}

/// Errors that can occur during pipeline processing.
///
/// Only structurally invalid input is surfaced. Degenerate geometry and
/// candidate rejection are recovered inside the path solver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// The image or a parameter cannot be processed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The pipeline was asked to recompute before any image was set.
    #[error("no source image has been set")]
    NoImage,
}
