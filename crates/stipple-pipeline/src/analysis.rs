//! Image analysis: tone, smoothed tone, edges, and edge influence.
//!
//! This is the first pipeline stage. It converts the RGBA raster into the
//! scalar fields the sampler reads from. Every field shares the image's
//! dimensions and is never mutated once built.

use image::{GrayImage, Luma};

use crate::blur::box_blur;
use crate::canny::canny;
use crate::types::{Dimensions, PipelineError, PipelineParameters, RgbaImage, ScalarField};

/// Minimum gap enforced between the low and high Canny thresholds.
pub const THRESHOLD_GAP: f32 = 0.01;

/// Scalar fields derived from one source image.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Size of every field below.
    pub dimensions: Dimensions,
    /// Rec. 709 luma in `[0, 1]`, 0 = black.
    pub tone: ScalarField,
    /// `tone` after a box blur of `smooth_radius`.
    pub smoothed: ScalarField,
    /// Sobel gradient magnitude of the smoothed tone (0–255 scale).
    pub edge_magnitude: ScalarField,
    /// Canny edge mask: 255 on edges, 0 elsewhere.
    pub edge_mask: GrayImage,
    /// Edge magnitude normalised to `[0, 1]` and blurred by
    /// `edge_blur_radius`.
    pub edge_influence: ScalarField,
    /// Canny thresholds actually used, after [`clamp_thresholds`].
    pub thresholds: (f32, f32),
}

/// Resolve the caller's Canny threshold fractions into a usable pair.
///
/// The two values are ordered first, so swapped inputs are accepted.
/// The result always satisfies `low < high`, separated by at least
/// [`THRESHOLD_GAP`].
#[must_use]
pub fn clamp_thresholds(edge_low: f32, edge_high: f32) -> (f32, f32) {
    let (lo, hi) = if edge_low <= edge_high {
        (edge_low, edge_high)
    } else {
        (edge_high, edge_low)
    };
    let low = lo.min(hi - THRESHOLD_GAP);
    let high = hi.max(low + THRESHOLD_GAP);
    (low, high)
}

/// Rec. 709 luma of an RGBA raster, scaled to `[0, 1]`. Alpha is ignored.
#[must_use]
pub fn luminance(image: &RgbaImage) -> ScalarField {
    ScalarField::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        0.0722_f32.mul_add(
            f32::from(b),
            0.2126_f32.mul_add(f32::from(r), 0.7152 * f32::from(g)),
        ) / 255.0
    })
}

/// Quantise a `[0, 1]` field to an 8-bit grayscale image.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_gray(field: &ScalarField) -> GrayImage {
    GrayImage::from_fn(field.width(), field.height(), |x, y| {
        Luma([(field.get(x, y) * 255.0).round().clamp(0.0, 255.0) as u8])
    })
}

/// Compute every analysis field for `image`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if the image has zero width or
/// height.
pub fn analyze(image: &RgbaImage, params: &PipelineParameters) -> Result<Analysis, PipelineError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidInput(format!(
            "image must be non-empty, got {width}x{height}"
        )));
    }

    let tone = luminance(image);
    let smoothed = box_blur(&tone, params.smooth_radius);

    let thresholds = clamp_thresholds(params.edge_low, params.edge_high);
    let edges = canny(&to_gray(&smoothed), thresholds.0, thresholds.1);

    let max = edges.magnitude.max();
    let normalised = if max > 0.0 {
        edges.magnitude.scaled(1.0 / max)
    } else {
        edges.magnitude.scaled(0.0)
    };
    let edge_influence = box_blur(&normalised, params.edge_blur_radius);

    Ok(Analysis {
        dimensions: Dimensions { width, height },
        tone,
        smoothed,
        edge_magnitude: edges.magnitude,
        edge_mask: edges.edges,
        edge_influence,
        thresholds,
    })
}
