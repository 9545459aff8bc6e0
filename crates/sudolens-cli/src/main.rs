//! sudolens: extract Sudoku cells from photographs and solve puzzles.
//!
//! The pipeline ships without a digit recognizer, so the command line
//! covers the two halves that work on their own:
//!
//! - `extract` runs decoding through cell isolation on a photograph,
//!   prints per-stage diagnostics and a 9×9 ink map, and can dump the
//!   rectified grid and every canonical cell image for training or
//!   inspection.
//! - `solve` solves a typed-in board and can render the answer as an SVG
//!   overlay.
//!
//! # Usage
//!
//! ```text
//! sudolens extract photo.jpg --out-dir out/
//! sudolens solve "53..7....6..195....98....6.8...6...34..8.3..17...2...6.6....28....419..5....8..79"
//! ```
//!
//! Set `RUST_LOG=debug` for per-stage tracing output.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use sudolens_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use sudolens_pipeline::pipeline::Isolated;
use sudolens_pipeline::{CellImage, Dimensions, PipelineConfig, SolveStatus, Solver, SudokuBoard};

/// Sudoku photograph extraction and solving.
#[derive(Parser)]
#[command(name = "sudolens", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Locate, rectify and segment the grid in a photograph.
    Extract(ExtractArgs),
    /// Solve a board given as 81 symbols.
    Solve(SolveArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Directory for `rectified.png`, `binary.png` and `cells/rRcC.png`.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Gaussian pre-blur kernel size (odd).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLUR_KERNEL)]
    blur_kernel: u32,

    /// Adaptive threshold neighbourhood (odd).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_THRESHOLD_BLOCK)]
    threshold_block: u32,

    /// Constant subtracted from the local mean.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_THRESHOLD_OFFSET)]
    threshold_offset: f32,

    /// Side of the canonical cell images.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CELL_SIZE)]
    cell_size: u32,

    /// Bounding-box area at or below which a cell counts as blank.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_DIGIT_AREA)]
    min_digit_area: u32,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their default values.
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Args)]
struct SolveArgs {
    /// 81 cell symbols (`1`-`9`, blanks as `.`, `0` or `_`), or a path to
    /// a file containing them.
    puzzle: String,

    /// Give up after this many placements.
    #[arg(long)]
    node_limit: Option<u64>,

    /// Write the solution as an SVG overlay.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Side of the SVG overlay in pixels.
    #[arg(long, default_value_t = 9 * PipelineConfig::DEFAULT_CELL_SIZE)]
    svg_size: u32,

    /// Image referenced as the overlay background.
    #[arg(long)]
    background: Option<String>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

/// Build a [`PipelineConfig`] from `extract` arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_args(args: &ExtractArgs) -> Result<PipelineConfig, String> {
    let config = if let Some(ref json) = args.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        PipelineConfig {
            blur_kernel: args.blur_kernel,
            threshold_block: args.threshold_block,
            threshold_offset: args.threshold_offset,
            cell_size: args.cell_size,
            min_digit_area: args.min_digit_area,
            ..PipelineConfig::default()
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Extract(args) => extract(&args).map(|()| true),
        Command::Solve(args) => solve(&args),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn extract(args: &ExtractArgs) -> Result<(), String> {
    let config = config_from_args(args)?;
    let image_bytes = std::fs::read(&args.image_path)
        .map_err(|e| format!("Error reading {}: {e}", args.image_path.display()))?;

    eprintln!(
        "Image: {} ({} bytes)",
        args.image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(args.runs);
    let mut first = None;

    for run in 0..args.runs {
        if args.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, args.runs);
        }

        let (isolated, diagnostics) = sudolens_pipeline::diagnostics::extract_with_diagnostics(
            &image_bytes,
            &config,
            &StdClock,
        )
        .map_err(|e| format!("Pipeline error: {e}"))?;

        if args.json {
            let json = serde_json::to_string_pretty(&diagnostics)
                .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
            println!("{json}");
        } else {
            println!("{}", diagnostics.report());
        }

        if first.is_none() {
            first = Some(isolated);
        }
        all_diagnostics.push(diagnostics);
    }

    if args.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    let Some(isolated) = first else {
        return Ok(());
    };
    if !args.json {
        println!();
        println!("{}", ink_map(isolated.cells()));
    }
    if let Some(ref dir) = args.out_dir {
        write_intermediates(dir, &isolated)?;
        eprintln!("Intermediates written to {}", dir.display());
    }
    Ok(())
}

/// 9×9 map of the isolated cells: `#` for ink, `.` for blank.
fn ink_map(cells: &[CellImage]) -> String {
    cells
        .chunks(9)
        .map(|row| {
            row.iter()
                .map(|cell| if cell.is_blank() { '.' } else { '#' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_intermediates(dir: &Path, isolated: &Isolated) -> Result<(), String> {
    let cells_dir = dir.join("cells");
    std::fs::create_dir_all(&cells_dir)
        .map_err(|e| format!("Error creating {}: {e}", cells_dir.display()))?;

    let save = |image: &sudolens_pipeline::GrayImage, path: PathBuf| {
        image
            .save(&path)
            .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "wrote image");
        Ok::<_, String>(())
    };

    save(isolated.rectified(), dir.join("rectified.png"))?;
    save(isolated.rectified_binary(), dir.join("binary.png"))?;
    for (index, cell) in isolated.cells().iter().enumerate() {
        let path = cells_dir.join(format!("r{}c{}.png", index / 9, index % 9));
        save(cell.pixels(), path)?;
    }
    Ok(())
}

/// Returns `Ok(true)` when the board was solved.
fn solve(args: &SolveArgs) -> Result<bool, String> {
    let text = if Path::new(&args.puzzle).is_file() {
        std::fs::read_to_string(&args.puzzle)
            .map_err(|e| format!("Error reading {}: {e}", args.puzzle))?
    } else {
        args.puzzle.clone()
    };
    let observed: SudokuBoard = text
        .parse()
        .map_err(|e| format!("Error parsing puzzle: {e}"))?;

    let mut solved = observed;
    let report = Solver::new()
        .with_node_limit(args.node_limit)
        .solve(&mut solved);

    if args.json {
        let json = serde_json::json!({
            "observed": observed.to_line(),
            "solved": solved.to_line(),
            "report": report,
        });
        let json = serde_json::to_string_pretty(&json)
            .map_err(|e| format!("Error serializing result: {e}"))?;
        println!("{json}");
    } else {
        match report.status {
            SolveStatus::Solved => println!("{solved}"),
            SolveStatus::Unsolvable => eprintln!("No solution ({} nodes)", report.nodes),
            SolveStatus::LimitReached => {
                eprintln!("Node limit reached after {} nodes", report.nodes);
            }
        }
    }

    if let Some(ref svg_path) = args.svg {
        let config_json = serde_json::to_string(&report)
            .map_err(|e| format!("Error serializing report: {e}"))?;
        let description = observed.to_line();
        let metadata = sudolens_export::SvgMetadata {
            title: Some("sudolens solution"),
            description: Some(&description),
            config_json: Some(&config_json),
            background_href: args.background.as_deref(),
        };
        let svg = sudolens_export::to_svg(
            &observed,
            &solved,
            Dimensions {
                width: args.svg_size,
                height: args.svg_size,
            },
            &metadata,
        );
        std::fs::write(svg_path, &svg)
            .map_err(|e| format!("Error writing SVG to {}: {e}", svg_path.display()))?;
        eprintln!(
            "SVG written to {} ({} bytes)",
            svg_path.display(),
            svg.len(),
        );
    }

    Ok(report.status.is_solved())
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
type StageExtractor = fn(&PipelineDiagnostics) -> Option<Duration>;

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
    println!("{:<16} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(32));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Decode", |d| Some(d.decode.duration)),
        ("Preprocess", |d| Some(d.preprocess.duration)),
        ("Locate", |d| Some(d.locate.duration)),
        ("Rectify", |d| Some(d.rectify.duration)),
        ("Segment", |d| Some(d.segment.duration)),
        ("Isolate", |d| Some(d.isolate.duration)),
        ("Classify", |d| d.classify.as_ref().map(|s| s.duration)),
        ("Solve", |d| d.solve.as_ref().map(|s| s.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<16} {stage_mean:>10.3}ms");
    }
}
