//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation for tuning thresholds
//! and cell-isolation parameters against real photographs.
//! [`extract_with_diagnostics`] and [`process_with_diagnostics`] drive
//! the staged [`Pipeline`](crate::Pipeline) and time every transition.
//!
//! The pipeline crate has no notion of wall-clock time; callers supply a
//! [`Clock`]. Durations are serialized as fractional seconds (`f64`) for
//! JSON compatibility, since `std::time::Duration` does not implement
//! serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::pipeline::{Isolated, Pipeline};
use crate::solver::SolveStatus;
use crate::types::{PipelineConfig, PipelineError, Quadrilateral, StagedResult};

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

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
///
/// `classify` and `solve` are `None` for extraction-only runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Decoding and grayscale conversion.
    pub decode: StageDiagnostics,
    /// Blur, threshold, inversion, dilation.
    pub preprocess: StageDiagnostics,
    /// Grid border location.
    pub locate: StageDiagnostics,
    /// Perspective rectification.
    pub rectify: StageDiagnostics,
    /// Grid segmentation.
    pub segment: StageDiagnostics,
    /// Cell isolation.
    pub isolate: StageDiagnostics,
    /// Digit classification.
    pub classify: Option<StageDiagnostics>,
    /// Backtracking search.
    pub solve: Option<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Binarization metrics.
    Preprocess {
        /// Blur kernel size.
        blur_kernel: u32,
        /// Adaptive threshold neighbourhood.
        threshold_block: u32,
        /// Foreground pixels in the mask.
        foreground_pixels: u64,
        /// Total pixel count for computing ink density.
        total_pixels: u64,
    },
    /// Grid border metrics.
    Locate {
        /// The four corners found.
        quadrilateral: Quadrilateral,
        /// Longest of the four edges.
        longest_edge: f64,
    },
    /// Rectification metrics.
    Rectify {
        /// Side of the square output.
        side: u32,
    },
    /// Segmentation metrics.
    Segment {
        /// Cell side in rectified pixels.
        cell_side: f64,
    },
    /// Cell isolation metrics.
    Isolate {
        /// Cells holding a digit candidate.
        digit_cells: usize,
        /// Cells judged blank.
        blank_cells: usize,
    },
    /// Classification metrics.
    Classify {
        /// Non-zero labels on the observed board.
        givens: usize,
    },
    /// Search metrics.
    Solve {
        /// Outcome of the search.
        status: SolveStatus,
        /// Placements made.
        nodes: u64,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Side of the rectified grid.
    pub rectified_side: u32,
    /// Cells holding a digit candidate.
    pub digit_cells: usize,
    /// Search outcome, when the solver ran.
    pub status: Option<SolveStatus>,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{}  |  Rectified: {}x{}",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.rectified_side,
            self.summary.rectified_side,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let mut stages = vec![
            ("Decode", &self.decode),
            ("Preprocess", &self.preprocess),
            ("Locate", &self.locate),
            ("Rectify", &self.rectify),
            ("Segment", &self.segment),
            ("Isolate", &self.isolate),
        ];
        if let Some(ref c) = self.classify {
            stages.push(("Classify", c));
        }
        if let Some(ref s) = self.solve {
            stages.push(("Solve", s));
        }

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        let status = self
            .summary
            .status
            .map_or_else(|| "not run".to_owned(), |s| format!("{s:?}"));
        lines.push(format!(
            "Digit cells: {}  |  Solver: {status}",
            self.summary.digit_cells,
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
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Preprocess {
            blur_kernel,
            threshold_block,
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!("blur={blur_kernel} block={threshold_block} ink={foreground_pixels} ({density:.1}%)")
        }
        StageMetrics::Locate {
            quadrilateral: q,
            longest_edge,
        } => format!(
            "tl=({:.0},{:.0}) br=({:.0},{:.0}) edge={longest_edge:.1}",
            q.top_left.x, q.top_left.y, q.bottom_right.x, q.bottom_right.y,
        ),
        StageMetrics::Rectify { side } => format!("{side}x{side}"),
        StageMetrics::Segment { cell_side } => format!("cell={cell_side:.2}px"),
        StageMetrics::Isolate {
            digit_cells,
            blank_cells,
        } => format!("{digit_cells} digits, {blank_cells} blank"),
        StageMetrics::Classify { givens } => format!("{givens} givens"),
        StageMetrics::Solve { status, nodes } => format!("{status:?} after {nodes} nodes"),
    }
}

/// Time one stage transition.
fn timed<K: Clock, T, E>(clock: &K, f: impl FnOnce() -> Result<T, E>) -> Result<(T, Duration), E> {
    let start = clock.now();
    let value = f()?;
    Ok((value, clock.elapsed(&start)))
}

/// Run every classifier-free stage, timing each one.
///
/// Returns the [`Isolated`] stage so the caller can inspect or export
/// the intermediates, or continue with [`Isolated::classify`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid, and
/// otherwise whatever the decode, locate or rectify stages return.
pub fn extract_with_diagnostics<K: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &K,
) -> Result<(Isolated, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    let total_start = clock.now();

    let (decoded, decode_time) = timed(clock, || {
        Pipeline::new(image_bytes.to_vec(), config.clone()).decode()
    })?;
    let (width, height) = decoded.grayscale().dimensions();
    let decode = StageDiagnostics {
        duration: decode_time,
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width,
            height,
            pixel_count: u64::from(width) * u64::from(height),
        },
    };

    let (preprocessed, preprocess_time) =
        timed(clock, || Ok::<_, PipelineError>(decoded.preprocess()))?;
    let preprocess = StageDiagnostics {
        duration: preprocess_time,
        metrics: StageMetrics::Preprocess {
            blur_kernel: config.blur_kernel,
            threshold_block: config.threshold_block,
            foreground_pixels: crate::threshold::foreground_count(preprocessed.binary()),
            total_pixels: u64::from(width) * u64::from(height),
        },
    };

    let (located, locate_time) = timed(clock, || preprocessed.locate())?;
    let quadrilateral = *located.quadrilateral();
    let locate = StageDiagnostics {
        duration: locate_time,
        metrics: StageMetrics::Locate {
            quadrilateral,
            longest_edge: quadrilateral.longest_edge(),
        },
    };

    let (rectified, rectify_time) = timed(clock, || located.rectify())?;
    let side = rectified.rectified().width();
    let rectify = StageDiagnostics {
        duration: rectify_time,
        metrics: StageMetrics::Rectify { side },
    };

    let (segmented, segment_time) = timed(clock, || Ok::<_, PipelineError>(rectified.segment()))?;
    let segment = StageDiagnostics {
        duration: segment_time,
        metrics: StageMetrics::Segment {
            cell_side: segmented.grid().cell_side(),
        },
    };

    let (isolated, isolate_time) = timed(clock, || Ok::<_, PipelineError>(segmented.isolate()))?;
    let digit_cells = isolated.cells().iter().filter(|c| !c.is_blank()).count();
    let isolate = StageDiagnostics {
        duration: isolate_time,
        metrics: StageMetrics::Isolate {
            digit_cells,
            blank_cells: isolated.cells().len() - digit_cells,
        },
    };

    let diagnostics = PipelineDiagnostics {
        decode,
        preprocess,
        locate,
        rectify,
        segment,
        isolate,
        classify: None,
        solve: None,
        total_duration: clock.elapsed(&total_start),
        summary: PipelineSummary {
            image_width: width,
            image_height: height,
            rectified_side: side,
            digit_cells,
            status: None,
        },
    };
    Ok((isolated, diagnostics))
}

/// Run the whole pipeline, timing each stage.
///
/// # Errors
///
/// As [`extract_with_diagnostics`], plus
/// [`PipelineError::AmbiguousClassification`].
pub fn process_with_diagnostics<C: Classifier + ?Sized, K: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    classifier: &C,
    clock: &K,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();
    let (isolated, mut diagnostics) = extract_with_diagnostics(image_bytes, config, clock)?;

    let (classified, classify_time) = timed(clock, || isolated.classify(classifier))?;
    diagnostics.classify = Some(StageDiagnostics {
        duration: classify_time,
        metrics: StageMetrics::Classify {
            givens: 81 - classified.observed().empty_count(),
        },
    });

    let (solved, solve_time) = timed(clock, || Ok::<_, PipelineError>(classified.solve()))?;
    let report = solved.report();
    diagnostics.solve = Some(StageDiagnostics {
        duration: solve_time,
        metrics: StageMetrics::Solve {
            status: report.status,
            nodes: report.nodes,
        },
    });
    diagnostics.summary.status = Some(report.status);
    diagnostics.total_duration = clock.elapsed(&total_start);

    Ok((solved.into_result(), diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::types::Point;

    /// Clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn framed_png() -> Vec<u8> {
        let img = image::GrayImage::from_fn(160, 160, |x, y| {
            let inside = (20..140).contains(&x) && (20..140).contains(&y);
            let edge = x < 23 || x >= 137 || y < 23 || y >= 137;
            image::Luma([if inside && edge { 0 } else { 255 }])
        });
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();
        buf
    }

    fn quad() -> Quadrilateral {
        Quadrilateral {
            top_left: Point::new(1.0, 2.0),
            top_right: Point::new(90.0, 2.0),
            bottom_right: Point::new(90.0, 91.0),
            bottom_left: Point::new(1.0, 91.0),
        }
    }

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn report_lists_every_stage_that_ran() {
        let diag = PipelineDiagnostics {
            decode: stage(
                10,
                StageMetrics::Decode {
                    input_bytes: 1000,
                    width: 100,
                    height: 100,
                    pixel_count: 10000,
                },
            ),
            preprocess: stage(
                20,
                StageMetrics::Preprocess {
                    blur_kernel: 9,
                    threshold_block: 11,
                    foreground_pixels: 500,
                    total_pixels: 10000,
                },
            ),
            locate: stage(
                5,
                StageMetrics::Locate {
                    quadrilateral: quad(),
                    longest_edge: 89.0,
                },
            ),
            rectify: stage(8, StageMetrics::Rectify { side: 89 }),
            segment: stage(0, StageMetrics::Segment { cell_side: 89.0 / 9.0 }),
            isolate: stage(
                12,
                StageMetrics::Isolate {
                    digit_cells: 30,
                    blank_cells: 51,
                },
            ),
            classify: None,
            solve: Some(stage(
                1,
                StageMetrics::Solve {
                    status: SolveStatus::Solved,
                    nodes: 51,
                },
            )),
            total_duration: Duration::from_millis(56),
            summary: PipelineSummary {
                image_width: 100,
                image_height: 100,
                rectified_side: 89,
                digit_cells: 30,
                status: Some(SolveStatus::Solved),
            },
        };

        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("ink=500 (5.0%)"));
        assert!(report.contains("30 digits, 51 blank"));
        assert!(report.contains("Solved after 51 nodes"));
        assert!(!report.contains("Classify"));
    }

    #[test]
    fn extract_times_each_stage() {
        let clock = TickClock(Cell::new(0));
        let (isolated, diag) =
            extract_with_diagnostics(&framed_png(), &PipelineConfig::default(), &clock).unwrap();

        assert_eq!(isolated.cells().len(), 81);
        assert_eq!(diag.decode.duration, Duration::from_millis(1));
        assert!(diag.total_duration >= Duration::from_millis(6));
        assert!(diag.classify.is_none());
        assert!(diag.summary.status.is_none());
        assert_eq!(diag.summary.image_width, 160);
        assert!(matches!(
            diag.decode.metrics,
            StageMetrics::Decode { width: 160, .. }
        ));
    }

    #[test]
    fn process_adds_classify_and_solve() {
        let clock = TickClock(Cell::new(0));
        let classifier = |_: &image::GrayImage| 0_u8;
        let (staged, diag) = process_with_diagnostics(
            &framed_png(),
            &PipelineConfig::default(),
            &classifier,
            &clock,
        )
        .unwrap();

        assert!(staged.solved.is_solved());
        assert!(diag.classify.is_some());
        assert_eq!(diag.summary.status, Some(SolveStatus::Solved));
    }

    #[test]
    fn invalid_config_is_rejected_before_decoding() {
        let config = PipelineConfig {
            cell_size: 0,
            ..PipelineConfig::default()
        };
        let clock = TickClock(Cell::new(0));
        let result = extract_with_diagnostics(&[], &config, &clock);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let d = stage(1500, StageMetrics::Rectify { side: 10 });
        let json = serde_json::to_value(&d).unwrap();
        assert!((json["duration"].as_f64().unwrap() - 1.5).abs() < 1e-9);
    }
}
