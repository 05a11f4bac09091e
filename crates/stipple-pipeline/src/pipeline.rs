//! Incremental pipeline with per-stage dirty flags.
//!
//! A [`Pipeline`] owns the source image, the current parameters and the
//! cached output of each [`Stage`]. Parameter edits mark only the stages
//! they affect (see [`ParamKey::invalidates`]); [`Pipeline::recompute`]
//! then reruns exactly the dirty stages in order, and any stage that
//! reran marks its downstream stages dirty before they are considered.
//!
//! ```rust
//! # use stipple_pipeline::{Pipeline, PipelineParameters, PipelineError, RgbaImage};
//! # use stipple_pipeline::pipeline::{ParamKey, Stage};
//! # fn run(image: RgbaImage) -> Result<(), PipelineError> {
//! let mut pipeline = Pipeline::new(PipelineParameters::default())?;
//! pipeline.set_image(image);
//! pipeline.recompute()?;
//!
//! let mut params = pipeline.params().clone();
//! params.seed_path = 11;
//! pipeline.set_params(params)?;
//! assert!(!pipeline.is_dirty(Stage::Sampling));
//! assert!(pipeline.is_dirty(Stage::Path));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::hash::Hasher;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::analysis::{Analysis, analyze};
use crate::diagnostics::{Clock, StageDiagnostics, StageMetrics, ZeroClock, timed};
use crate::path::{StipplePath, solve};
use crate::sample::{effective_min_distance, sample_with_stats};
use crate::types::{PipelineError, PipelineParameters, ProcessResult, RgbaImage, SamplePoint};

/// Total number of pipeline stages.
pub const STAGE_COUNT: usize = 3;

/// A recomputable pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Tone, smoothing, edge detection and edge influence.
    Analysis,
    /// Poisson-disk sampling, acceptance and cluster merge.
    Sampling,
    /// Candidate paths, validity filter and selection.
    Path,
}

/// Compile-time guard: if a [`Stage`] variant is added, this match becomes
/// non-exhaustive and the build fails. Bump [`STAGE_COUNT`] and
/// [`Stage::ALL`] alongside it.
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: Stage) {
    match s {
        Stage::Analysis | Stage::Sampling | Stage::Path => {}
    }
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Self; STAGE_COUNT] = [Self::Analysis, Self::Sampling, Self::Path];

    /// Human-readable name of the stage.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Analysis => "Analysis",
            Self::Sampling => "Sampling",
            Self::Path => "Path",
        }
    }

    /// Zero-based position in execution order.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Analysis => 0,
            Self::Sampling => 1,
            Self::Path => 2,
        }
    }

    /// Stages that consume this stage's output directly.
    #[must_use]
    pub const fn downstream(self) -> &'static [Self] {
        match self {
            Self::Analysis => &[Self::Sampling],
            Self::Sampling => &[Self::Path],
            Self::Path => &[],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One tunable field of [`PipelineParameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKey {
    /// [`PipelineParameters::seed_stipple`].
    SeedStipple,
    /// [`PipelineParameters::seed_path`].
    SeedPath,
    /// [`PipelineParameters::smooth_radius`].
    SmoothRadius,
    /// [`PipelineParameters::edge_low`].
    EdgeLow,
    /// [`PipelineParameters::edge_high`].
    EdgeHigh,
    /// [`PipelineParameters::edge_blur_radius`].
    EdgeBlurRadius,
    /// [`PipelineParameters::min_distance`].
    MinDistance,
    /// [`PipelineParameters::gamma`].
    Gamma,
    /// [`PipelineParameters::density_scale`].
    DensityScale,
    /// [`PipelineParameters::edge_weight`].
    EdgeWeight,
    /// [`PipelineParameters::edge_exponent`].
    EdgeExponent,
    /// [`PipelineParameters::path_mode`].
    PathMode,
    /// [`PipelineParameters::christofides_passes`].
    ChristofidesPasses,
}

impl ParamKey {
    /// Every key, in field declaration order.
    pub const ALL: [Self; 13] = [
        Self::SeedStipple,
        Self::SeedPath,
        Self::SmoothRadius,
        Self::EdgeLow,
        Self::EdgeHigh,
        Self::EdgeBlurRadius,
        Self::MinDistance,
        Self::Gamma,
        Self::DensityScale,
        Self::EdgeWeight,
        Self::EdgeExponent,
        Self::PathMode,
        Self::ChristofidesPasses,
    ];

    /// The snake_case field name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SeedStipple => "seed_stipple",
            Self::SeedPath => "seed_path",
            Self::SmoothRadius => "smooth_radius",
            Self::EdgeLow => "edge_low",
            Self::EdgeHigh => "edge_high",
            Self::EdgeBlurRadius => "edge_blur_radius",
            Self::MinDistance => "min_distance",
            Self::Gamma => "gamma",
            Self::DensityScale => "density_scale",
            Self::EdgeWeight => "edge_weight",
            Self::EdgeExponent => "edge_exponent",
            Self::PathMode => "path_mode",
            Self::ChristofidesPasses => "christofides_passes",
        }
    }

    const fn camel_case(self) -> &'static str {
        match self {
            Self::SeedStipple => "seedStipple",
            Self::SeedPath => "seedPath",
            Self::SmoothRadius => "smoothRadius",
            Self::EdgeLow => "edgeLow",
            Self::EdgeHigh => "edgeHigh",
            Self::EdgeBlurRadius => "edgeBlurRadius",
            Self::MinDistance => "minDistance",
            Self::Gamma => "gamma",
            Self::DensityScale => "densityScale",
            Self::EdgeWeight => "edgeWeight",
            Self::EdgeExponent => "edgeExponent",
            Self::PathMode => "pathMode",
            Self::ChristofidesPasses => "christofidesPasses",
        }
    }

    /// Stages whose cached output a change to this field invalidates.
    ///
    /// Analysis keys list only [`Stage::Analysis`]; later stages are
    /// reached through [`Stage::downstream`] once analysis reruns.
    #[must_use]
    pub const fn invalidates(self) -> &'static [Stage] {
        match self {
            Self::SmoothRadius | Self::EdgeLow | Self::EdgeHigh | Self::EdgeBlurRadius => {
                &[Stage::Analysis]
            }
            Self::MinDistance
            | Self::Gamma
            | Self::DensityScale
            | Self::EdgeWeight
            | Self::EdgeExponent
            | Self::SeedStipple => &[Stage::Sampling, Stage::Path],
            Self::SeedPath | Self::PathMode | Self::ChristofidesPasses => &[Stage::Path],
        }
    }

    /// Keys whose values differ between `old` and `new`.
    #[must_use]
    pub fn changed(old: &PipelineParameters, new: &PipelineParameters) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|key| key.differs(old, new))
            .collect()
    }

    fn differs(self, a: &PipelineParameters, b: &PipelineParameters) -> bool {
        match self {
            Self::SeedStipple => a.seed_stipple != b.seed_stipple,
            Self::SeedPath => a.seed_path != b.seed_path,
            Self::SmoothRadius => a.smooth_radius != b.smooth_radius,
            Self::EdgeLow => a.edge_low.to_bits() != b.edge_low.to_bits(),
            Self::EdgeHigh => a.edge_high.to_bits() != b.edge_high.to_bits(),
            Self::EdgeBlurRadius => a.edge_blur_radius != b.edge_blur_radius,
            Self::MinDistance => a.min_distance.to_bits() != b.min_distance.to_bits(),
            Self::Gamma => a.gamma.to_bits() != b.gamma.to_bits(),
            Self::DensityScale => a.density_scale.to_bits() != b.density_scale.to_bits(),
            Self::EdgeWeight => a.edge_weight.to_bits() != b.edge_weight.to_bits(),
            Self::EdgeExponent => a.edge_exponent.to_bits() != b.edge_exponent.to_bits(),
            Self::PathMode => a.path_mode != b.path_mode,
            Self::ChristofidesPasses => a.christofides_passes != b.christofides_passes,
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamKey {
    type Err = PipelineError;

    /// Accepts both `snake_case` and `camelCase` field names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s || key.camel_case() == s)
            .ok_or_else(|| PipelineError::InvalidInput(format!("unknown parameter key: {s:?}")))
    }
}

/// Stages that ran during one [`Pipeline::recompute_with_clock`] call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recomputed {
    /// Each stage that ran, in execution order, with its diagnostics.
    pub stages: Vec<(Stage, StageDiagnostics)>,
}

impl Recomputed {
    /// Whether `stage` ran.
    #[must_use]
    pub fn ran(&self, stage: Stage) -> bool {
        self.stages.iter().any(|(s, _)| *s == stage)
    }

    /// Whether nothing needed recomputing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Incremental stipple pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    params: PipelineParameters,
    image: Option<RgbaImage>,
    fingerprint: Option<u64>,
    analysis: Option<Analysis>,
    points: Option<Vec<SamplePoint>>,
    path: Option<StipplePath>,
    dirty: [bool; STAGE_COUNT],
}

impl Pipeline {
    /// Create a pipeline with no image and every stage dirty.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if `params` holds a
    /// non-finite value.
    pub fn new(params: PipelineParameters) -> Result<Self, PipelineError> {
        params.validate()?;
        Ok(Self {
            params,
            image: None,
            fingerprint: None,
            analysis: None,
            points: None,
            path: None,
            dirty: [true; STAGE_COUNT],
        })
    }

    /// Replace the parameters, marking dirty every stage a changed field
    /// invalidates. Returns the changed keys.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if `params` holds a
    /// non-finite value. The stored parameters are left untouched.
    pub fn set_params(&mut self, params: PipelineParameters) -> Result<Vec<ParamKey>, PipelineError> {
        params.validate()?;
        let changed = ParamKey::changed(&self.params, &params);
        self.params = params;
        for &key in &changed {
            self.mark_dirty(key);
        }
        Ok(changed)
    }

    /// Replace the source image.
    ///
    /// Every stage is marked dirty unless the new image has the same
    /// dimensions and pixels as the current one.
    pub fn set_image(&mut self, image: RgbaImage) {
        let fingerprint = fingerprint(&image);
        if self.fingerprint != Some(fingerprint) {
            self.dirty = [true; STAGE_COUNT];
        }
        self.fingerprint = Some(fingerprint);
        self.image = Some(image);
    }

    /// Mark the stages invalidated by `key` as dirty.
    pub fn mark_dirty(&mut self, key: ParamKey) {
        for &stage in key.invalidates() {
            self.dirty[stage.index()] = true;
        }
    }

    /// [`mark_dirty`](Self::mark_dirty) by field name.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] for an unknown key.
    pub fn mark_dirty_str(&mut self, key: &str) -> Result<(), PipelineError> {
        self.mark_dirty(key.parse()?);
        Ok(())
    }

    /// Recompute every dirty stage without timing.
    ///
    /// # Errors
    ///
    /// See [`recompute_with_clock`](Self::recompute_with_clock).
    pub fn recompute(&mut self) -> Result<Recomputed, PipelineError> {
        self.recompute_with_clock(&ZeroClock)
    }

    /// Recompute every dirty stage in order, timing each with `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoImage`] if no image has been set, or
    /// [`PipelineError::InvalidInput`] for invalid parameters or an
    /// empty image. On error, stages that already ran keep their new
    /// output and the failing stage stays dirty.
    pub fn recompute_with_clock<C: Clock>(&mut self, clock: &C) -> Result<Recomputed, PipelineError> {
        self.params.validate()?;
        let Some(image) = self.image.as_ref() else {
            return Err(PipelineError::NoImage);
        };

        let mut recomputed = Recomputed::default();
        for stage in Stage::ALL {
            if !self.dirty[stage.index()] && self.has_output(stage) {
                continue;
            }
            let diagnostics = match stage {
                Stage::Analysis => {
                    let (analysis, duration) = timed(clock, || analyze(image, &self.params));
                    let analysis = analysis?;
                    let metrics = StageMetrics::analysis(&analysis);
                    self.analysis = Some(analysis);
                    StageDiagnostics { duration, metrics }
                }
                Stage::Sampling => {
                    let Some(analysis) = self.analysis.as_ref() else {
                        return Err(missing_input(stage));
                    };
                    let (outcome, duration) =
                        timed(clock, || sample_with_stats(analysis, &self.params));
                    let metrics = StageMetrics::sampling(
                        &outcome,
                        effective_min_distance(self.params.min_distance),
                    );
                    self.points = Some(outcome.points);
                    StageDiagnostics { duration, metrics }
                }
                Stage::Path => {
                    let Some(points) = self.points.as_deref() else {
                        return Err(missing_input(stage));
                    };
                    let (solution, duration) = timed(clock, || solve(points, &self.params));
                    let metrics = StageMetrics::path(&solution);
                    self.path = Some(solution.path);
                    StageDiagnostics { duration, metrics }
                }
            };

            self.dirty[stage.index()] = false;
            for &next in stage.downstream() {
                self.dirty[next.index()] = true;
            }
            recomputed.stages.push((stage, diagnostics));
        }
        Ok(recomputed)
    }

    fn has_output(&self, stage: Stage) -> bool {
        match stage {
            Stage::Analysis => self.analysis.is_some(),
            Stage::Sampling => self.points.is_some(),
            Stage::Path => self.path.is_some(),
        }
    }

    /// Current parameters.
    #[must_use]
    pub const fn params(&self) -> &PipelineParameters {
        &self.params
    }

    /// Current source image, if one has been set.
    #[must_use]
    pub const fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    /// Whether `stage` will rerun on the next recompute.
    #[must_use]
    pub const fn is_dirty(&self, stage: Stage) -> bool {
        self.dirty[stage.index()]
    }

    /// Cached analysis from the last run of [`Stage::Analysis`].
    #[must_use]
    pub const fn analysis(&self) -> Option<&Analysis> {
        self.analysis.as_ref()
    }

    /// Cached stipple points from the last run of [`Stage::Sampling`].
    #[must_use]
    pub fn points(&self) -> Option<&[SamplePoint]> {
        self.points.as_deref()
    }

    /// Cached path from the last run of [`Stage::Path`].
    #[must_use]
    pub const fn path(&self) -> Option<&StipplePath> {
        self.path.as_ref()
    }

    /// Snapshot of the cached outputs, if every stage has produced one.
    ///
    /// The snapshot may be stale if stages are dirty.
    #[must_use]
    pub fn result(&self) -> Option<ProcessResult> {
        Some(ProcessResult {
            points: self.points.clone()?,
            path: self.path.clone()?,
            dimensions: self.analysis.as_ref()?.dimensions,
        })
    }
}

fn missing_input(stage: Stage) -> PipelineError {
    PipelineError::InvalidInput(format!("{stage} stage has no upstream output"))
}

/// SipHash-1-3 over the image dimensions and raw pixel bytes.
fn fingerprint(image: &RgbaImage) -> u64 {
    let mut hasher = SipHasher13::new();
    hasher.write_u32(image.width());
    hasher.write_u32(image.height());
    hasher.write(image.as_raw());
    hasher.finish()
}
