//! SVG overlay serializer.
//!
//! Draws the solver's answer on top of the rectified grid: a 9×9 guide
//! grid and, for every cell that was blank in the photograph, the digit
//! the solver placed there. The document uses the rectified image's
//! pixel coordinates so it can be layered directly over it, and may
//! reference that image as a background.
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements for
//! accessibility and to help file managers identify exported files.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Group, Path, Title};
use svg::node::{Node, Text};

use sudolens_pipeline::board::SIZE;
use sudolens_pipeline::{Dimensions, SudokuBoard};

/// Fill colour of solved digits.
pub const DIGIT_COLOR: &str = "red";

/// Font size as a fraction of the cell side.
pub const FONT_SIZE_RATIO: f64 = 30.0 / 35.0;

/// Metadata to embed in the SVG document.
///
/// Every field is optional. Text values are XML-escaped automatically
/// by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source photograph's filename.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized pipeline configuration, emitted inside `<metadata>`
    /// wrapped in a namespaced `<sudolens:pipeline>` element.
    pub config_json: Option<&'a str>,

    /// Reference to the rectified image, emitted as a full-size
    /// `<image>` beneath the overlay.
    pub background_href: Option<&'a str>,
}

/// Baseline anchor of the digit drawn in `(row, col)`: one fifth of a
/// cell in from the left edge and up from the bottom edge.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn digit_anchor(row: usize, col: usize, cell_width: f64, cell_height: f64) -> (f64, f64) {
    (
        (col as f64).mul_add(cell_width, cell_width / 5.0),
        ((row + 1) as f64).mul_add(cell_height, -cell_height / 5.0),
    )
}

/// Path data for the ten horizontal and ten vertical grid lines, split
/// into thin cell lines and thick box lines.
#[allow(clippy::cast_precision_loss)]
fn grid_lines(width: f64, height: f64) -> (Data, Data) {
    let line = |data: Data, k: usize| {
        let x = width * k as f64 / SIZE as f64;
        let y = height * k as f64 / SIZE as f64;
        data.move_to((x, 0.0))
            .line_to((x, height))
            .move_to((0.0, y))
            .line_to((width, y))
    };
    let thin = (0..=SIZE).filter(|k| k % 3 != 0).fold(Data::new(), line);
    let thick = (0..=SIZE).filter(|k| k % 3 == 0).fold(Data::new(), line);
    (thin, thick)
}

/// Serialize the solver's digits into an SVG overlay.
///
/// Only cells that are `0` in `observed` and non-zero in `solved` are
/// drawn, so a partially solved board shows whatever the solver left.
#[must_use]
pub fn to_svg(
    observed: &SudokuBoard,
    solved: &SudokuBoard,
    dimensions: Dimensions,
    metadata: &SvgMetadata<'_>,
) -> String {
    let (w, h) = (dimensions.width, dimensions.height);
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut pipeline_el = Element::new("sudolens:pipeline");
        pipeline_el.assign("xmlns:sudolens", "https://sudolens.dev/ns/1");
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    if let Some(href) = metadata.background_href {
        let mut image_el = Element::new("image");
        image_el.assign("href", href);
        image_el.assign("x", 0);
        image_el.assign("y", 0);
        image_el.assign("width", w);
        image_el.assign("height", h);
        doc = doc.add(image_el);
    }

    let (width, height) = (f64::from(w), f64::from(h));
    let (thin, thick) = grid_lines(width, height);
    let grid = Group::new()
        .set("id", "grid")
        .set("fill", "none")
        .set("stroke", "gray")
        .add(Path::new().set("d", thin).set("stroke-width", 1))
        .add(Path::new().set("d", thick).set("stroke-width", 2));
    doc = doc.add(grid);

    let cell_width = width / SIZE as f64;
    let cell_height = height / SIZE as f64;
    let mut solution = Group::new()
        .set("id", "solution")
        .set("fill", DIGIT_COLOR)
        .set("font-family", "sans-serif")
        .set("font-size", cell_height * FONT_SIZE_RATIO);
    for (row, col, value) in solved.filled_since(observed) {
        let (x, y) = digit_anchor(row, col, cell_width, cell_height);
        let mut text = Element::new("text");
        text.assign("x", x);
        text.assign("y", y);
        text.append(Text::new(value.to_string()));
        solution = solution.add(text);
    }
    doc = doc.add(solution);

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
