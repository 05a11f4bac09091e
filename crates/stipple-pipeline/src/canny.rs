//! Canny edge detection with thresholds relative to the strongest gradient.
//!
//! Follows `imageproc::edges::canny` step for step (Gaussian blur,
//! Sobel gradients, non-maximum suppression, hysteresis) with three
//! differences:
//!
//! 1. The gradient magnitude is returned alongside the edge mask, since
//!    the sampler needs it as a continuous field.
//! 2. Thresholds are fractions of the maximum gradient magnitude, so the
//!    same parameters work on low- and high-contrast images.
//! 3. Hysteresis bounds-checks every neighbour and visits all eight of
//!    them. Upstream `imageproc 0.26.0` underflows at the border and
//!    skips north and northeast
//!    (<https://github.com/image-rs/imageproc/issues/705>).

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::{filter_clamped, gaussian_blur_f32};
use imageproc::kernel;

use crate::types::ScalarField;

/// Gaussian pre-blur applied before the Sobel operator.
pub const CANNY_SIGMA: f32 = 1.4;

/// Output of [`canny`].
#[derive(Debug, Clone, PartialEq)]
pub struct CannyOutput {
    /// Sobel gradient magnitude of the pre-blurred image.
    pub magnitude: ScalarField,
    /// Binary edge mask: 255 for edge pixels, 0 elsewhere.
    pub edges: GrayImage,
}

/// Run Canny edge detection on `image`.
///
/// `low_fraction` and `high_fraction` are multiplied by the maximum
/// gradient magnitude to obtain the hysteresis thresholds. Callers are
/// expected to pass `low_fraction < high_fraction`; see
/// [`crate::analysis::clamp_thresholds`].
///
/// A flat image has zero gradient everywhere and produces an empty mask.
#[must_use = "returns the gradient magnitude and edge mask"]
pub fn canny(image: &GrayImage, low_fraction: f32, high_fraction: f32) -> CannyOutput {
    let (width, height) = image.dimensions();
    let blurred = gaussian_blur_f32(image, CANNY_SIGMA);

    let gx: Image<Luma<i16>> = filter_clamped(&blurred, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(&blurred, kernel::SOBEL_VERTICAL_3X3);
    let magnitude = ScalarField::from_fn(width, height, |x, y| {
        let h = f32::from(gx.get_pixel(x, y)[0]);
        let v = f32::from(gy.get_pixel(x, y)[0]);
        h.hypot(v)
    });

    let max = magnitude.max();
    if max <= 0.0 {
        return CannyOutput {
            magnitude,
            edges: GrayImage::new(width, height),
        };
    }

    let thinned = non_maximum_suppression(&magnitude, &gx, &gy);
    let edges = hysteresis(&thinned, low_fraction * max, high_fraction * max);
    CannyOutput { magnitude, edges }
}

/// Keep only pixels that are a local maximum across the gradient
/// direction, quantised to 0°, 45°, 90° or 135°. The one-pixel border is
/// always suppressed.
fn non_maximum_suppression(
    g: &ScalarField,
    gx: &Image<Luma<i16>>,
    gy: &Image<Luma<i16>>,
) -> ScalarField {
    let (width, height) = (g.width(), g.height());
    ScalarField::from_fn(width, height, |x, y| {
        if x == 0 || y == 0 || x + 1 >= width || y + 1 >= height {
            return 0.0;
        }
        let x_gradient = f32::from(gx.get_pixel(x, y)[0]);
        let y_gradient = f32::from(gy.get_pixel(x, y)[0]);
        let mut angle = y_gradient.atan2(x_gradient).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }

        let (a, b) = if !(22.5..157.5).contains(&angle) {
            ((x - 1, y), (x + 1, y))
        } else if angle < 67.5 {
            ((x + 1, y + 1), (x - 1, y - 1))
        } else if angle < 112.5 {
            ((x, y - 1), (x, y + 1))
        } else {
            ((x - 1, y + 1), (x + 1, y - 1))
        };

        let pixel = g.get(x, y);
        if pixel < g.get(a.0, a.1) || pixel < g.get(b.0, b.1) {
            0.0
        } else {
            pixel
        }
    })
}

/// Stack-based hysteresis: seed from pixels at or above `high`, then grow
/// through 8-connected neighbours at or above `low`.
fn hysteresis(input: &ScalarField, low: f32, high: f32) -> GrayImage {
    let (w, h) = (input.width(), input.height());
    let mut out = GrayImage::new(w, h);
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if input.get(x, y) < high || out.get_pixel(x, y)[0] != 0 {
                continue;
            }
            out.put_pixel(x, y, Luma([255]));
            stack.push((x, y));

            while let Some((nx, ny)) = stack.pop() {
                let neighbours = [
                    (nx.wrapping_add(1), ny),
                    (nx.wrapping_add(1), ny.wrapping_add(1)),
                    (nx, ny.wrapping_add(1)),
                    (nx.wrapping_sub(1), ny.wrapping_sub(1)),
                    (nx.wrapping_sub(1), ny),
                    (nx.wrapping_sub(1), ny.wrapping_add(1)),
                    (nx, ny.wrapping_sub(1)),
                    (nx.wrapping_add(1), ny.wrapping_sub(1)),
                ];
                for (cx, cy) in neighbours {
                    if cx >= w || cy >= h {
                        continue;
                    }
                    if input.get(cx, cy) >= low && out.get_pixel(cx, cy)[0] == 0 {
                        out.put_pixel(cx, cy, Luma([255]));
                        stack.push((cx, cy));
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn edge_count(edges: &GrayImage) -> u32 {
        edges.pixels().map(|p| u32::from(p.0[0] > 0)).sum()
    }

    /// 20x20 image with a sharp vertical boundary at x = 10.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| if x < 10 { Luma([0]) } else { Luma([255]) })
    }

    /// A strong edge one pixel from the left border must not underflow
    /// when hysteresis grows into column 0.
    #[test]
    fn border_edge_does_not_panic() {
        let img = GrayImage::from_fn(10, 10, |x, _| if x == 1 { Luma([255]) } else { Luma([0]) });
        let out = canny(&img, 0.01, 0.02);
        assert_eq!(out.edges.dimensions(), (10, 10));
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = GrayImage::new(17, 31);
        let out = canny(&img, 0.1, 0.3);
        assert_eq!(out.edges.dimensions(), (17, 31));
        assert_eq!(out.magnitude.width(), 17);
        assert_eq!(out.magnitude.height(), 31);
    }

    #[test]
    fn flat_image_has_no_edges_and_zero_magnitude() {
        let img = GrayImage::from_pixel(20, 20, Luma([128]));
        let out = canny(&img, 0.08, 0.22);
        assert_eq!(edge_count(&out.edges), 0);
        assert!(out.magnitude.max().abs() < f32::EPSILON);
    }

    #[test]
    fn sharp_edge_detected_near_boundary() {
        let out = canny(&sharp_edge_image(), 0.08, 0.22);
        assert!(edge_count(&out.edges) > 0, "expected edges at sharp boundary");
        for (x, _y, p) in out.edges.enumerate_pixels() {
            if p.0[0] > 0 {
                assert!((7..=12).contains(&x), "edge pixel far from boundary at x={x}");
            }
        }
    }

    #[test]
    fn magnitude_peaks_at_boundary() {
        let out = canny(&sharp_edge_image(), 0.08, 0.22);
        let at_edge = out.magnitude.get(10, 10).max(out.magnitude.get(9, 10));
        let far = out.magnitude.get(2, 10);
        assert!(at_edge > far);
        assert!(far.abs() < f32::EPSILON);
    }

    #[test]
    fn higher_threshold_never_adds_edges() {
        let img = GrayImage::from_fn(30, 30, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let loose = canny(&img, 0.05, 0.1);
        let strict = canny(&img, 0.5, 0.9);
        assert!(edge_count(&strict.edges) <= edge_count(&loose.edges));
    }

    #[test]
    fn tiny_images_do_not_panic() {
        for (w, h) in [(1, 1), (1, 5), (5, 1), (2, 2)] {
            let img = GrayImage::from_fn(w, h, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
            let out = canny(&img, 0.1, 0.2);
            assert_eq!(out.edges.dimensions(), (w, h));
        }
    }
}
