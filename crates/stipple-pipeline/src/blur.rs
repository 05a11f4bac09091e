//! Box blur for scalar fields.
//!
//! Smooths the tone field before edge detection and diffuses the edge
//! influence field so stipples are attracted to a band around each edge
//! rather than the one-pixel edge itself.
//!
//! The blur is separable (horizontal pass, then vertical pass) and each
//! pass is a sliding-window mean. Samples past the border are clamped to
//! the nearest edge sample, so a constant field stays constant.

use crate::types::ScalarField;

/// Apply a box blur of the given `radius` to a scalar field.
///
/// The window spans `2 * radius + 1` samples on each axis. A radius of
/// zero returns an identical copy.
#[must_use = "returns the blurred field"]
pub fn box_blur(field: &ScalarField, radius: u32) -> ScalarField {
    if radius == 0 || field.data().is_empty() {
        return field.clone();
    }

    let width = field.width() as usize;
    let height = field.height() as usize;
    let radius = radius as usize;

    let mut horizontal = vec![0.0_f32; width * height];
    let mut line = vec![0.0_f32; width.max(height)];
    let mut out = vec![0.0_f32; width];

    for y in 0..height {
        let row = &field.data()[y * width..(y + 1) * width];
        blur_line(row, radius, &mut out);
        horizontal[y * width..(y + 1) * width].copy_from_slice(&out);
    }

    let mut vertical = vec![0.0_f32; width * height];
    let mut column_out = vec![0.0_f32; height];
    for x in 0..width {
        for y in 0..height {
            line[y] = horizontal[y * width + x];
        }
        blur_line(&line[..height], radius, &mut column_out);
        for y in 0..height {
            vertical[y * width + x] = column_out[y];
        }
    }

    ScalarField::from_fn(field.width(), field.height(), |x, y| {
        vertical[y as usize * width + x as usize]
    })
}

/// Sliding-window mean along one line with clamp-to-edge sampling.
///
/// `out` must be at least as long as `input`.
#[allow(clippy::cast_precision_loss)]
fn blur_line(input: &[f32], radius: usize, out: &mut [f32]) {
    let len = input.len();
    if len == 0 {
        return;
    }
    let last = len - 1;
    let window = 2.0 * radius as f64 + 1.0;
    let at = |i: isize| -> f64 {
        let clamped = i.clamp(0, last as isize) as usize;
        f64::from(input[clamped])
    };

    // Accumulate in f64 so long lines don't drift. Taps past either end
    // repeat the edge sample, so the first window is summed in closed form
    // and a radius far larger than the line stays O(len).
    let mut sum = (radius as f64 + 1.0) * at(0)
        + input[1..=radius.min(last)].iter().map(|&v| f64::from(v)).sum::<f64>()
        + radius.saturating_sub(last) as f64 * at(last as isize);
    let r = isize::try_from(radius).unwrap_or(isize::MAX);
    #[allow(clippy::cast_possible_truncation)]
    for (i, slot) in out.iter_mut().take(len).enumerate() {
        *slot = (sum / window) as f32;
        let i = i as isize;
        sum += at(i.saturating_add(r).saturating_add(1)) - at(i.saturating_sub(r));
    }
}
