//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! ```rust
//! # use sudolens_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # use sudolens_pipeline::GrayImage;
//! # fn run(jpeg: Vec<u8>) -> Result<(), PipelineError> {
//! let classifier = |_: &GrayImage| 0_u8;
//! let staged = Pipeline::new(jpeg, PipelineConfig::default())
//!     .decode()?
//!     .preprocess()
//!     .locate()?
//!     .rectify()?
//!     .segment()
//!     .isolate()
//!     .classify(&classifier)?
//!     .solve()
//!     .into_result();
//! println!("{}", staged.solved);
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying every previously computed
//! intermediate, so it is a compile-time error to skip a stage or run
//! them out of order.
//!
//! [`SudokuPipeline`] wraps the whole chain behind an injected
//! [`Classifier`] for callers that only want the boards.

use image::DynamicImage;
use tracing::{info, instrument};

use crate::board::SudokuBoard;
use crate::cell::CellImage;
use crate::classify::Classifier;
use crate::grid::Grid81;
use crate::solver::{SolveReport, Solver};
use crate::types::{GrayImage, PipelineConfig, PipelineError, ProcessResult, Quadrilateral, StagedResult};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source image and convert it to grayscale.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if the source bytes are
    /// empty. Returns [`PipelineError::ImageDecode`] if the image
    /// format is unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        let image = crate::grayscale::decode(&self.source)?;
        Ok(Decoded::new(&image, self.config))
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding: a single-channel source image.
#[must_use = "pipeline stages are consumed by advancing; call .preprocess() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    grayscale: GrayImage,
}

impl Decoded {
    fn new(image: &DynamicImage, config: PipelineConfig) -> Self {
        Self {
            config,
            grayscale: crate::grayscale::to_grayscale(image),
        }
    }

    /// The grayscale source image.
    #[must_use]
    pub const fn grayscale(&self) -> &GrayImage {
        &self.grayscale
    }

    /// Binarize the source image.
    pub fn preprocess(self) -> Preprocessed {
        let binary = crate::preprocess::preprocess(&self.grayscale, &self.config);
        Preprocessed {
            config: self.config,
            grayscale: self.grayscale,
            binary,
        }
    }
}

// ───────────────────────── Stage 2: Preprocessed ─────────────────────

/// Pipeline state after blur, threshold, inversion and dilation.
#[must_use = "pipeline stages are consumed by advancing; call .locate() to continue"]
pub struct Preprocessed {
    config: PipelineConfig,
    grayscale: GrayImage,
    binary: GrayImage,
}

impl Preprocessed {
    /// The dilated binary mask of the source image (ink = 255).
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.binary
    }

    /// Find the grid border.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoContourFound`] if the mask has no
    /// foreground.
    pub fn locate(self) -> Result<Located, PipelineError> {
        let quadrilateral = crate::contour::locate(&self.binary)?;
        Ok(Located {
            config: self.config,
            grayscale: self.grayscale,
            binary: self.binary,
            quadrilateral,
        })
    }
}

// ───────────────────────── Stage 3: Located ──────────────────────────

/// Pipeline state after the grid border has been found.
#[must_use = "pipeline stages are consumed by advancing; call .rectify() to continue"]
pub struct Located {
    config: PipelineConfig,
    grayscale: GrayImage,
    binary: GrayImage,
    quadrilateral: Quadrilateral,
}

impl Located {
    /// The located grid border in source coordinates.
    #[must_use]
    pub const fn quadrilateral(&self) -> &Quadrilateral {
        &self.quadrilateral
    }

    /// Warp the grayscale source so the grid fills a square, then run
    /// the same preprocessing over the square for cell isolation.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DegenerateQuadrilateral`] if the border
    /// collapses or no projective transform maps it to a square.
    pub fn rectify(self) -> Result<Rectified, PipelineError> {
        let rectified = crate::warp::rectify(&self.grayscale, &self.quadrilateral)?;
        let rectified_binary = crate::preprocess::preprocess(&rectified, &self.config);
        Ok(Rectified {
            config: self.config,
            grayscale: self.grayscale,
            binary: self.binary,
            quadrilateral: self.quadrilateral,
            rectified,
            rectified_binary,
        })
    }
}

// ───────────────────────── Stage 4: Rectified ────────────────────────

/// Pipeline state after perspective rectification.
#[must_use = "pipeline stages are consumed by advancing; call .segment() to continue"]
pub struct Rectified {
    config: PipelineConfig,
    grayscale: GrayImage,
    binary: GrayImage,
    quadrilateral: Quadrilateral,
    rectified: GrayImage,
    rectified_binary: GrayImage,
}

impl Rectified {
    /// The square, perspective-corrected grayscale grid.
    #[must_use]
    pub const fn rectified(&self) -> &GrayImage {
        &self.rectified
    }

    /// Binary mask of the rectified grid.
    #[must_use]
    pub const fn rectified_binary(&self) -> &GrayImage {
        &self.rectified_binary
    }

    /// Split the rectified square into 81 cells.
    pub fn segment(self) -> Segmented {
        let grid = crate::grid::segment(self.rectified.width());
        Segmented {
            config: self.config,
            grayscale: self.grayscale,
            binary: self.binary,
            quadrilateral: self.quadrilateral,
            rectified: self.rectified,
            rectified_binary: self.rectified_binary,
            grid,
        }
    }
}

// ───────────────────────── Stage 5: Segmented ────────────────────────

/// Pipeline state after the grid has been split into cells.
#[must_use = "pipeline stages are consumed by advancing; call .isolate() to continue"]
pub struct Segmented {
    config: PipelineConfig,
    grayscale: GrayImage,
    binary: GrayImage,
    quadrilateral: Quadrilateral,
    rectified: GrayImage,
    rectified_binary: GrayImage,
    grid: Grid81,
}

impl Segmented {
    /// The 81 cell rectangles.
    #[must_use]
    pub const fn grid(&self) -> &Grid81 {
        &self.grid
    }

    /// Extract a canonical image from every cell.
    pub fn isolate(self) -> Isolated {
        let cells = crate::cell::isolate_all(&self.rectified_binary, &self.grid, &self.config);
        Isolated {
            config: self.config,
            grayscale: self.grayscale,
            binary: self.binary,
            quadrilateral: self.quadrilateral,
            rectified: self.rectified,
            rectified_binary: self.rectified_binary,
            grid: self.grid,
            cells,
        }
    }
}

// ───────────────────────── Stage 6: Isolated ─────────────────────────

/// Pipeline state after cell isolation. The last stage that needs no
/// classifier.
#[must_use = "pipeline stages are consumed by advancing; call .classify() to continue"]
pub struct Isolated {
    config: PipelineConfig,
    grayscale: GrayImage,
    binary: GrayImage,
    quadrilateral: Quadrilateral,
    rectified: GrayImage,
    rectified_binary: GrayImage,
    grid: Grid81,
    cells: Vec<CellImage>,
}

impl Isolated {
    /// The dilated binary mask of the source image.
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.binary
    }

    /// The located grid border in source coordinates.
    #[must_use]
    pub const fn quadrilateral(&self) -> &Quadrilateral {
        &self.quadrilateral
    }

    /// The 81 cell rectangles.
    #[must_use]
    pub const fn grid(&self) -> &Grid81 {
        &self.grid
    }

    /// Canonical cell images, row-major.
    #[must_use]
    pub fn cells(&self) -> &[CellImage] {
        &self.cells
    }

    /// The square, perspective-corrected grayscale grid.
    #[must_use]
    pub const fn rectified(&self) -> &GrayImage {
        &self.rectified
    }

    /// Binary mask of the rectified grid.
    #[must_use]
    pub const fn rectified_binary(&self) -> &GrayImage {
        &self.rectified_binary
    }

    /// Label every cell.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AmbiguousClassification`] if the
    /// classifier returns a label above 9.
    pub fn classify<C: Classifier + ?Sized>(self, classifier: &C) -> Result<Classified, PipelineError> {
        let observed = crate::classify::classify_cells(classifier, &self.cells)?;
        Ok(Classified {
            config: self.config,
            grayscale: self.grayscale,
            binary: self.binary,
            quadrilateral: self.quadrilateral,
            rectified: self.rectified,
            rectified_binary: self.rectified_binary,
            grid: self.grid,
            cells: self.cells,
            observed,
        })
    }
}

// ───────────────────────── Stage 7: Classified ───────────────────────

/// Pipeline state holding the observed board.
#[must_use = "pipeline stages are consumed by advancing; call .solve() to continue"]
pub struct Classified {
    config: PipelineConfig,
    grayscale: GrayImage,
    binary: GrayImage,
    quadrilateral: Quadrilateral,
    rectified: GrayImage,
    rectified_binary: GrayImage,
    grid: Grid81,
    cells: Vec<CellImage>,
    observed: SudokuBoard,
}

impl Classified {
    /// The board as read from the photograph.
    #[must_use]
    pub const fn observed(&self) -> &SudokuBoard {
        &self.observed
    }

    /// Solve a copy of the observed board. Never fails; an unsolvable
    /// board is reported through [`SolveReport::status`].
    pub fn solve(self) -> Solved {
        let mut solved = self.observed;
        let report = Solver::new()
            .with_node_limit(self.config.node_limit)
            .solve(&mut solved);
        Solved {
            grayscale: self.grayscale,
            binary: self.binary,
            quadrilateral: self.quadrilateral,
            rectified: self.rectified,
            rectified_binary: self.rectified_binary,
            grid: self.grid,
            cells: self.cells,
            observed: self.observed,
            solved,
            report,
        }
    }
}

// ───────────────────────── Stage 8: Solved ───────────────────────────

/// Final pipeline state.
#[must_use = "call .into_result() to collect the pipeline output"]
pub struct Solved {
    grayscale: GrayImage,
    binary: GrayImage,
    quadrilateral: Quadrilateral,
    rectified: GrayImage,
    rectified_binary: GrayImage,
    grid: Grid81,
    cells: Vec<CellImage>,
    observed: SudokuBoard,
    solved: SudokuBoard,
    report: SolveReport,
}

impl Solved {
    /// The solver's board.
    #[must_use]
    pub const fn solved(&self) -> &SudokuBoard {
        &self.solved
    }

    /// Outcome of the search.
    #[must_use]
    pub const fn report(&self) -> SolveReport {
        self.report
    }

    /// Collect every intermediate into a [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            grayscale: self.grayscale,
            binary: self.binary,
            quadrilateral: self.quadrilateral,
            rectified: self.rectified,
            rectified_binary: self.rectified_binary,
            grid: self.grid,
            cells: self.cells,
            observed: self.observed,
            solved: self.solved,
            report: self.report,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental extraction pipeline.
///
/// Created via [`Pipeline::new`] from encoded bytes, or
/// [`Pipeline::from_image`] from an already decoded image.
pub struct Pipeline;

impl Pipeline {
    /// Store the source bytes and config without processing anything.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }

    /// Enter the pipeline with a decoded image.
    pub fn from_image(image: &DynamicImage, config: PipelineConfig) -> Decoded {
        Decoded::new(image, config)
    }
}

/// Photograph-to-solution pipeline with an injected digit classifier.
#[derive(Debug, Clone)]
pub struct SudokuPipeline<C> {
    classifier: C,
    config: PipelineConfig,
}

impl<C: Classifier> SudokuPipeline<C> {
    /// Bind a classifier to a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails
    /// [`PipelineConfig::validate`].
    pub fn new(classifier: C, config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { classifier, config })
    }

    /// The configuration every run uses.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The injected classifier.
    #[must_use]
    pub const fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Extract and solve the puzzle in `image`.
    ///
    /// # Errors
    ///
    /// Propagates [`PipelineError::NoContourFound`],
    /// [`PipelineError::DegenerateQuadrilateral`] and
    /// [`PipelineError::AmbiguousClassification`]. An unsolvable board
    /// is not an error.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn run(&self, image: &DynamicImage) -> Result<ProcessResult, PipelineError> {
        let staged = Pipeline::from_image(image, self.config.clone())
            .preprocess()
            .locate()?
            .rectify()?
            .segment()
            .isolate()
            .classify(&self.classifier)?
            .solve()
            .into_result();
        info!(
            givens = 81 - staged.observed.empty_count(),
            status = ?staged.report.status,
            nodes = staged.report.nodes,
            "processed photograph"
        );
        Ok(staged.into_process_result())
    }

    /// Decode `bytes` and run the pipeline on the result.
    ///
    /// # Errors
    ///
    /// As [`SudokuPipeline::run`], plus [`PipelineError::EmptyInput`] and
    /// [`PipelineError::ImageDecode`].
    pub fn run_bytes(&self, bytes: &[u8]) -> Result<ProcessResult, PipelineError> {
        let image = crate::grayscale::decode(bytes)?;
        self.run(&image)
    }
}
