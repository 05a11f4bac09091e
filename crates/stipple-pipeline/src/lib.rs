//! stipple-pipeline: Pure stipple path pipeline (sans-IO).
//!
//! Converts a raster image into a single continuous path through a set of
//! stipple points:
//! analysis (tone, smoothing, Canny edges, edge influence) ->
//! Poisson-disk sampling -> cluster merge -> path solving.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! `RgbaImage` buffers and returns structured data; decoding and file
//! output live in `stipple-bench` and `stipple-export`.
//!
//! For interactive use, [`Pipeline`] caches each stage and reruns only
//! what a parameter change invalidates.

pub mod analysis;
pub mod blur;
pub mod canny;
pub mod diagnostics;
pub mod geometry;
pub mod merge;
pub mod path;
pub mod pipeline;
pub mod primitives;
pub mod sample;
pub mod types;

pub use analysis::{Analysis, analyze};
pub use diagnostics::{Clock, PipelineDiagnostics, ZeroClock, process_with_diagnostics};
pub use geometry::PathMetrics;
pub use merge::merge;
pub use path::{PathBuilder, PathSelection, PathStrategy, StipplePath, build_path};
pub use pipeline::{ParamKey, Pipeline, Stage};
pub use sample::sample;
pub use types::{
    Dimensions, GrayImage, PipelineError, PipelineParameters, Point, Polyline, ProcessResult,
    RgbaImage, SamplePoint, ScalarField,
};

/// Run the full stipple pipeline once.
///
/// Produces a [`ProcessResult`] holding the merged stipple points, the
/// single path through them and the source image dimensions. The
/// dimensions are needed by export serializers to set coordinate spaces
/// (e.g., SVG `viewBox`).
///
/// # Pipeline steps
///
/// 1. Rec.709 tone field and box smoothing
/// 2. Canny edge detection and blurred edge influence
/// 3. Poisson-disk candidates with tone/edge acceptance
/// 4. Cluster merge of points closer than `min_distance`
/// 5. Path candidates, self-intersection filter and selection
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if the image has a zero
/// dimension or a parameter is non-finite.
pub fn process(
    image: &RgbaImage,
    params: &PipelineParameters,
) -> Result<ProcessResult, PipelineError> {
    params.validate()?;
    let analysis = analyze(image, params)?;
    let points = sample(&analysis, params);
    let path = build_path(&points, params);
    Ok(ProcessResult {
        points,
        path,
        dimensions: analysis.dimensions,
    })
}
