//! stipple-bench: CLI tool for stipple parameter experimentation and diagnostics.
//!
//! Runs the stipple pipeline on a given image file with configurable
//! parameters, printing detailed per-stage diagnostics. Useful for:
//!
//! - Comparing path strategies and seeing which candidates were rejected
//! - Tuning density (`gamma`, `density_scale`) and edge attraction
//! - Measuring per-stage durations to identify bottlenecks
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin stipple-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use stipple_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use stipple_pipeline::{PathStrategy, PipelineParameters, ProcessResult, RgbaImage};

/// Stipple parameter experimentation and diagnostics.
///
/// Runs the stipple pipeline on a given image with configurable
/// parameters and prints detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "stipple-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Seed for point placement and acceptance.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_SEED_STIPPLE)]
    seed_stipple: u64,

    /// Seed for path tie-breaking jitter.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_SEED_PATH)]
    seed_path: u64,

    /// Tone smoothing radius in pixels.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_SMOOTH_RADIUS)]
    smooth_radius: u32,

    /// Canny low threshold (fraction of maximum gradient).
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_EDGE_LOW)]
    edge_low: f32,

    /// Canny high threshold (fraction of maximum gradient).
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_EDGE_HIGH)]
    edge_high: f32,

    /// Edge influence blur radius in pixels.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_EDGE_BLUR_RADIUS)]
    edge_blur_radius: u32,

    /// Minimum spacing between points in pixels.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_MIN_DISTANCE)]
    min_distance: f64,

    /// Tone density exponent.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_GAMMA)]
    gamma: f64,

    /// Global acceptance multiplier.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_DENSITY_SCALE)]
    density_scale: f64,

    /// Weight of edge attraction relative to tone.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_EDGE_WEIGHT)]
    edge_weight: f64,

    /// Edge influence exponent.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_EDGE_EXPONENT)]
    edge_exponent: f64,

    /// Preferred path strategy (tried first, wins ties).
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_MODE)]
    path_mode: Mode,

    /// Maximum 2-opt passes for the Christofides tour.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_CHRISTOFIDES_PASSES)]
    christofides_passes: usize,

    /// Write SVG output to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Draw a dot of this radius at each point in the SVG output.
    #[arg(long)]
    dot_radius: Option<f64>,

    /// Write the ordered path (points, order, selection) as JSON to file.
    #[arg(long)]
    path_json: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full parameter set as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Path strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Sweep by y from the topmost point.
    MonotoneY,
    /// Sweep by x from the leftmost or rightmost point.
    MonotoneX,
    /// Greedy nearest-neighbour tour.
    Nearest,
    /// MST + matching tour with 2-opt.
    Christofides,
    /// Walk along Delaunay neighbours.
    Delaunay,
}

const fn mode_from_pipeline(strategy: PathStrategy) -> Mode {
    match strategy {
        PathStrategy::MonotoneY => Mode::MonotoneY,
        PathStrategy::MonotoneX => Mode::MonotoneX,
        PathStrategy::Nearest => Mode::Nearest,
        PathStrategy::Christofides => Mode::Christofides,
        PathStrategy::Delaunay => Mode::Delaunay,
    }
}

/// The CLI default mode, derived from
/// [`PipelineParameters::DEFAULT_PATH_MODE`] so the two cannot silently
/// diverge.
const CLI_DEFAULT_MODE: Mode = mode_from_pipeline(PipelineParameters::DEFAULT_PATH_MODE);

/// Build [`PipelineParameters`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn params_from_cli(cli: &Cli) -> Result<PipelineParameters, String> {
    let params = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        PipelineParameters {
            seed_stipple: cli.seed_stipple,
            seed_path: cli.seed_path,
            smooth_radius: cli.smooth_radius,
            edge_low: cli.edge_low,
            edge_high: cli.edge_high,
            edge_blur_radius: cli.edge_blur_radius,
            min_distance: cli.min_distance,
            gamma: cli.gamma,
            density_scale: cli.density_scale,
            edge_weight: cli.edge_weight,
            edge_exponent: cli.edge_exponent,
            path_mode: match cli.path_mode {
                Mode::MonotoneY => PathStrategy::MonotoneY,
                Mode::MonotoneX => PathStrategy::MonotoneX,
                Mode::Nearest => PathStrategy::Nearest,
                Mode::Christofides => PathStrategy::Christofides,
                Mode::Delaunay => PathStrategy::Delaunay,
            },
            christofides_passes: cli.christofides_passes,
        }
    };
    params.validate().map_err(|e| e.to_string())?;
    Ok(params)
}

fn load_image(path: &Path) -> Result<RgbaImage, String> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| format!("Error decoding {}: {e}", path.display()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let params = match params_from_cli(&cli) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match load_image(&cli.image_path) {
        Ok(img) => img,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({}x{})",
        cli.image_path.display(),
        image.width(),
        image.height(),
    );
    eprintln!("Parameters: {params:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match stipple_pipeline::process_with_diagnostics(&image, &params, &StdClock) {
            Ok((result, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write outputs on the first run only.
                if run == 0 {
                    if let Some(ref svg_path) = cli.svg {
                        write_svg(&cli, svg_path, &result, &params);
                    }
                    if let Some(ref json_path) = cli.path_json {
                        write_path_json(json_path, &result);
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

fn write_svg(cli: &Cli, svg_path: &Path, result: &ProcessResult, params: &PipelineParameters) {
    let title = cli
        .image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("bench");
    let desc = format!(
        "{} points, path {} (min_distance={}, gamma={}, seeds={}/{})",
        result.path.len(),
        result.path.selection,
        params.min_distance,
        params.gamma,
        params.seed_stipple,
        params.seed_path,
    );
    let parameters_json = serde_json::to_string(params).ok();
    let metadata = stipple_export::SvgMetadata {
        title: Some(title),
        description: Some(&desc),
        parameters_json: parameters_json.as_deref(),
    };
    let style = stipple_export::SvgStyle {
        dot_radius: cli.dot_radius,
        ..stipple_export::SvgStyle::default()
    };
    let svg = stipple_export::to_svg(&result.path, result.dimensions, &metadata, &style);
    match std::fs::write(svg_path, &svg) {
        Ok(()) => {
            eprintln!("SVG written to {} ({} bytes)", svg_path.display(), svg.len());
        }
        Err(e) => {
            eprintln!("Error writing SVG to {}: {e}", svg_path.display());
        }
    }
}

fn write_path_json(json_path: &Path, result: &ProcessResult) {
    let json = match serde_json::to_string_pretty(&result.path) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing path: {e}");
            return;
        }
    };
    match std::fs::write(json_path, &json) {
        Ok(()) => {
            eprintln!(
                "Path JSON written to {} ({} bytes)",
                json_path.display(),
                json.len()
            );
        }
        Err(e) => {
            eprintln!("Error writing path JSON to {}: {e}", json_path.display());
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Analysis", |d| d.analysis.duration),
        ("Sampling", |d| d.sampling.duration),
        ("Path", |d| d.path.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
