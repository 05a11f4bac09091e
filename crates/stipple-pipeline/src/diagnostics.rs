//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning. [`process_with_diagnostics`] and
//! [`Pipeline::recompute_with_clock`](crate::pipeline::Pipeline::recompute_with_clock)
//! collect them alongside the stage outputs.
//!
//! The crate never reads the system time itself. Callers pass a
//! [`Clock`]; the bench CLI uses one backed by `std::time::Instant`,
//! and [`ZeroClock`] reports zero for every stage.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::Analysis;
use crate::geometry::PathMetrics;
use crate::path::{CandidateOutcome, CandidateReport, PathSelection, PathSolution};
use crate::pipeline::{Pipeline, Stage};
use crate::sample::SampleOutcome;
use crate::types::{PipelineError, PipelineParameters, ProcessResult, RgbaImage};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A [`Clock`] that always reports zero elapsed time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroClock;

impl Clock for ZeroClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Run `f` and measure it with `clock`.
pub(crate) fn timed<C: Clock, T>(clock: &C, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let value = f();
    (value, clock.elapsed(&start))
}

/// Diagnostics collected from a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: tone, smoothing, edges, edge influence.
    pub analysis: StageDiagnostics,
    /// Stage 2: Poisson-disk sampling, acceptance, cluster merge.
    pub sampling: StageDiagnostics,
    /// Stage 3: candidate paths, validity filter, selection.
    pub path: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Analysis metrics.
    Analysis {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Canny low threshold fraction (after clamping).
        low_threshold: f32,
        /// Canny high threshold fraction (after clamping).
        high_threshold: f32,
        /// Largest gradient magnitude in the image.
        max_gradient: f32,
        /// Number of edge pixels (value == 255) in the mask.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Sampling metrics.
    Sampling {
        /// Spacing actually used (after the floor).
        min_distance: f64,
        /// Poisson-disk candidates generated.
        candidate_count: usize,
        /// Candidates that passed the acceptance draw.
        accepted_count: usize,
        /// Points left after cluster merge.
        point_count: usize,
        /// Cluster merge passes.
        merge_passes: usize,
    },
    /// Path solving metrics.
    Path {
        /// How the final path was chosen.
        selection: PathSelection,
        /// What happened to every candidate strategy.
        candidates: Vec<CandidateReport>,
        /// Points on the final path.
        point_count: usize,
        /// Quality of the final path.
        metrics: PathMetrics,
    },
}

impl StageMetrics {
    pub(crate) fn analysis(analysis: &Analysis) -> Self {
        let (width, height) = (analysis.dimensions.width, analysis.dimensions.height);
        Self::Analysis {
            width,
            height,
            low_threshold: analysis.thresholds.0,
            high_threshold: analysis.thresholds.1,
            max_gradient: analysis.edge_magnitude.max(),
            edge_pixel_count: count_edge_pixels(&analysis.edge_mask),
            total_pixel_count: u64::from(width) * u64::from(height),
        }
    }

    pub(crate) fn sampling(outcome: &SampleOutcome, min_distance: f64) -> Self {
        Self::Sampling {
            min_distance,
            candidate_count: outcome.candidates,
            accepted_count: outcome.accepted,
            point_count: outcome.points.len(),
            merge_passes: outcome.merge_passes,
        }
    }

    pub(crate) fn path(solution: &PathSolution) -> Self {
        Self::Path {
            selection: solution.path.selection,
            candidates: solution.candidates.clone(),
            point_count: solution.path.len(),
            metrics: solution.path.metrics(),
        }
    }
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Points on the final path.
    pub point_count: usize,
    /// Total length of the final path in pixels.
    pub path_length: f64,
    /// How the final path was chosen.
    pub selection: PathSelection,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (stage, diag) in [
            (Stage::Analysis, &self.analysis),
            (Stage::Sampling, &self.sampling),
            (Stage::Path, &self.path),
        ] {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{:<24} {ms:>8.3}ms {pct:>9.1}%  {details}", stage.name()));
        }

        if let StageMetrics::Path { candidates, .. } = &self.path.metrics {
            lines.push(String::new());
            lines.push("Candidates:".to_string());
            for candidate in candidates {
                lines.push(format!(
                    "  {:<14} {}",
                    candidate.strategy.as_str(),
                    format_outcome(&candidate.outcome)
                ));
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "Points: {}  |  Path length: {:.1}px  |  Selected: {}",
            self.summary.point_count, self.summary.path_length, self.summary.selection,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Analysis {
            width,
            height,
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
            ..
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "{width}x{height} low={low_threshold:.2} high={high_threshold:.2} edges={edge_pixel_count} ({density:.1}%)",
            )
        }
        StageMetrics::Sampling {
            min_distance,
            candidate_count,
            accepted_count,
            point_count,
            merge_passes,
        } => {
            format!(
                "r={min_distance:.1} {candidate_count} candidates -> {accepted_count} accepted -> {point_count} pts ({merge_passes} merge passes)",
            )
        }
        StageMetrics::Path {
            selection,
            candidates,
            point_count,
            metrics,
        } => {
            let scored = candidates
                .iter()
                .filter(|c| matches!(c.outcome, CandidateOutcome::Scored(_)))
                .count();
            format!(
                "{selection} {point_count} pts, max={:.1} total={:.1} ({scored}/{} valid)",
                metrics.max_segment_length,
                metrics.total_length,
                candidates.len(),
            )
        }
    }
}

fn format_outcome(outcome: &CandidateOutcome) -> String {
    match outcome {
        CandidateOutcome::Skipped => "skipped".to_string(),
        CandidateOutcome::Rejected => "rejected (self-intersecting)".to_string(),
        CandidateOutcome::Scored(m) => format!(
            "max={:.2} total={:.1} smooth={:.3}",
            m.max_segment_length, m.total_length, m.smoothness
        ),
    }
}

/// Count edge pixels (value == 255) in a grayscale image.
pub(crate) fn count_edge_pixels(image: &image::GrayImage) -> u64 {
    image
        .pixels()
        .map(|p| u64::from(u8::from(p.0[0] == 255)))
        .sum()
}

/// Run the full pipeline once, collecting per-stage diagnostics.
///
/// Produces the same [`ProcessResult`] as [`crate::process`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] for an empty image or a
/// non-finite parameter.
pub fn process_with_diagnostics<C: Clock>(
    image: &RgbaImage,
    params: &PipelineParameters,
    clock: &C,
) -> Result<(ProcessResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let mut pipeline = Pipeline::new(params.clone())?;
    pipeline.set_image(image.clone());
    let recomputed = pipeline.recompute_with_clock(clock)?;
    let total_duration = clock.elapsed(&start);

    let stage = |which: Stage| {
        recomputed
            .stages
            .iter()
            .find(|(s, _)| *s == which)
            .map(|(_, diag)| diag.clone())
            .ok_or_else(|| PipelineError::InvalidInput(format!("{} stage did not run", which.name())))
    };
    let analysis = stage(Stage::Analysis)?;
    let sampling = stage(Stage::Sampling)?;
    let path_diag = stage(Stage::Path)?;

    let result = pipeline.result().ok_or(PipelineError::NoImage)?;
    let summary = PipelineSummary {
        image_width: result.dimensions.width,
        image_height: result.dimensions.height,
        pixel_count: u64::from(result.dimensions.width) * u64::from(result.dimensions.height),
        point_count: result.path.len(),
        path_length: result.path.metrics().total_length,
        selection: result.path.selection,
    };

    Ok((
        result,
        PipelineDiagnostics {
            analysis,
            sampling,
            path: path_diag,
            total_duration,
            summary,
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::path::PathStrategy;

    /// Advances by one millisecond on every `now()` call.
    struct StepClock {
        ticks: Cell<u64>,
    }

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.ticks.get() - since)
        }
    }

    fn split_image() -> RgbaImage {
        RgbaImage::from_fn(40, 30, |x, _| {
            if x < 20 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn count_edge_pixels_works() {
        let mut img = image::GrayImage::new(10, 10);
        for i in 0..5 {
            img.put_pixel(i, 0, image::Luma([255]));
        }
        assert_eq!(count_edge_pixels(&img), 5);
    }

    #[test]
    fn zero_clock_reports_nothing() {
        let ((), elapsed) = timed(&ZeroClock, || ());
        assert_eq!(elapsed, Duration::ZERO);
    }

    #[test]
    fn process_with_diagnostics_matches_process() {
        let params = PipelineParameters {
            min_distance: 4.0,
            ..PipelineParameters::default()
        };
        let (result, diag) = process_with_diagnostics(&split_image(), &params, &ZeroClock).unwrap();
        let plain = crate::process(&split_image(), &params).unwrap();
        assert_eq!(result, plain);
        assert_eq!(diag.summary.point_count, result.path.len());
        assert_eq!(diag.summary.image_width, 40);
        assert!(matches!(diag.analysis.metrics, StageMetrics::Analysis { .. }));
        assert!(matches!(diag.sampling.metrics, StageMetrics::Sampling { .. }));
        assert!(matches!(diag.path.metrics, StageMetrics::Path { .. }));
    }

    #[test]
    fn stage_durations_come_from_the_clock() {
        let clock = StepClock {
            ticks: Cell::new(0),
        };
        let (_, diag) =
            process_with_diagnostics(&split_image(), &PipelineParameters::default(), &clock)
                .unwrap();
        assert!(diag.analysis.duration > Duration::ZERO);
        assert!(diag.total_duration >= diag.analysis.duration + diag.sampling.duration);
    }

    #[test]
    fn report_lists_stages_and_candidates() {
        let (_, diag) = process_with_diagnostics(
            &split_image(),
            &PipelineParameters::default(),
            &ZeroClock,
        )
        .unwrap();
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Analysis"));
        assert!(report.contains("Sampling"));
        assert!(report.contains("Candidates:"));
        assert!(report.contains(PathStrategy::Delaunay.as_str()));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let diag = StageDiagnostics {
            duration: Duration::from_millis(1500),
            metrics: StageMetrics::Sampling {
                min_distance: 8.0,
                candidate_count: 10,
                accepted_count: 5,
                point_count: 5,
                merge_passes: 1,
            },
        };
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"duration\":1.5"));
        let back: StageDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.duration, Duration::from_millis(1500));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = r#"{"duration":-1.0,"metrics":{"Sampling":{"min_distance":8.0,"candidate_count":0,"accepted_count":0,"point_count":0,"merge_passes":0}}}"#;
        assert!(serde_json::from_str::<StageDiagnostics>(json).is_err());
    }
}
