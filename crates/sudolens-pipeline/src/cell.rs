//! Isolate the digit in one grid cell and normalize it to a canonical
//! image for the classifier.
//!
//! Grid lines hug every cell border, and photos add specks and smudges.
//! The isolator keeps only the largest 4-connected ink component that
//! reaches into the cell's inner region (the cell minus a margin of
//! roughly 40% of its side on every edge), so border lines are never
//! mistaken for a digit unless they intrude deep into the cell.
//!
//! Components are found with [`imageproc::region_labelling`]; only the
//! winning component's mask is materialized, the input is never
//! modified.

use image::GrayImage;
use image::imageops::{self, FilterType};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grid::Grid81;
use crate::types::{Dimensions, PipelineConfig, Rect};

/// Divisor applied to the mean cell side to get the inner-region margin.
pub const INNER_MARGIN_DIVISOR: f64 = 2.5;

/// Canonical image of one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellImage {
    /// The largest ink blob, scaled and centred.
    Digit(GrayImage),
    /// No usable ink; holds the ring marker.
    Blank(GrayImage),
}

impl CellImage {
    /// The canonical pixels, whichever kind of cell this is.
    #[must_use]
    pub const fn pixels(&self) -> &GrayImage {
        match self {
            Self::Digit(img) | Self::Blank(img) => img,
        }
    }

    /// `true` for [`CellImage::Blank`].
    #[must_use]
    pub const fn is_blank(&self) -> bool {
        matches!(self, Self::Blank(_))
    }
}

/// Pixel bounding box with inclusive `left..=right`, `top..=bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    /// Leftmost foreground column.
    pub left: u32,
    /// Topmost foreground row.
    pub top: u32,
    /// Rightmost foreground column.
    pub right: u32,
    /// Bottommost foreground row.
    pub bottom: u32,
}

impl PixelBox {
    /// `right - left`; a one-column blob has width 0.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.right - self.left
    }

    /// `bottom - top`; a one-row blob has height 0.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// `width * height`.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// Crop a binary image to `rect` using truncated integer bounds.
#[must_use]
pub fn crop(image: &GrayImage, rect: &Rect) -> GrayImage {
    let (x0, y0, x1, y1) = rect.pixel_bounds(Dimensions::of(image));
    imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image()
}

/// Inner-region margin for a cell of the given size:
/// `round(mean(width, height) / 2.5)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn inner_margin(width: u32, height: u32) -> u32 {
    let mean = (f64::from(width) + f64::from(height)) / 2.0;
    (mean / INNER_MARGIN_DIVISOR).round() as u32
}

/// Mask of the largest foreground component that has at least one pixel
/// in the region `[x0, x1) × [y0, y1)`.
///
/// Component sizes count every pixel of the component, including those
/// outside the region. The region is scanned row-major and the first
/// component seen wins ties. Returns `None` when no foreground pixel lies
/// in the region.
#[must_use]
pub fn largest_component_in(
    image: &GrayImage,
    (x0, y0): (u32, u32),
    (x1, y1): (u32, u32),
) -> Option<GrayImage> {
    let labels = connected_components(image, Connectivity::Four, image::Luma([0u8]));

    let label_count = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    let mut areas = vec![0_u64; label_count + 1];
    for p in labels.pixels() {
        areas[p.0[0] as usize] += 1;
    }

    let mut best: Option<(u32, u64)> = None;
    for y in y0..y1.min(image.height()) {
        for x in x0..x1.min(image.width()) {
            let label = labels.get_pixel(x, y).0[0];
            if label == 0 {
                continue;
            }
            let area = areas[label as usize];
            if best.is_none_or(|(_, best_area)| area > best_area) {
                best = Some((label, area));
            }
        }
    }

    let (winner, _) = best?;
    Some(GrayImage::from_fn(image.width(), image.height(), |x, y| {
        image::Luma([if labels.get_pixel(x, y).0[0] == winner {
            255
        } else {
            0
        }])
    }))
}

/// Bounding box of all foreground pixels, or `None` for an empty image.
#[must_use]
pub fn bounding_box(image: &GrayImage) -> Option<PixelBox> {
    let mut bbox: Option<PixelBox> = None;
    for (x, y, p) in image.enumerate_pixels() {
        if p.0[0] == 0 {
            continue;
        }
        bbox = Some(match bbox {
            None => PixelBox {
                left: x,
                top: y,
                right: x,
                bottom: y,
            },
            Some(b) => PixelBox {
                left: b.left.min(x),
                top: b.top.min(y),
                right: b.right.max(x),
                bottom: b.bottom.max(y),
            },
        });
    }
    bbox
}

/// The synthetic marker used for blank cells: an annulus centred in a
/// `size × size` image.
///
/// For the default 28-pixel cell this is the set of pixels whose squared
/// distance from `(14, 14)` lies strictly between 91 and 151. Other sizes
/// scale the radius and band proportionally.
#[must_use]
pub fn blank_marker(size: u32) -> GrayImage {
    let centre = f64::from(size) / 2.0;
    let radius = centre * 11.0 / 14.0;
    let radius_sq = radius * radius;
    let band = radius_sq * 30.0 / 121.0;
    GrayImage::from_fn(size, size, |x, y| {
        let dx = f64::from(x) - centre;
        let dy = f64::from(y) - centre;
        let d = dx.mul_add(dx, dy * dy);
        image::Luma([if d > radius_sq - band && d < radius_sq + band {
            255
        } else {
            0
        }])
    })
}

/// Split `size - length` into leading and trailing padding; the trailing
/// side takes the extra pixel when `length` is odd.
const fn centre_pad(size: u32, length: u32) -> (u32, u32) {
    let lead = size.saturating_sub(length) / 2;
    let trail = if length % 2 == 0 { lead } else { lead + 1 };
    (lead, trail)
}

/// Scale `image` so its longer side fills `size - margin`, centre it on a
/// black canvas, and resize the canvas to exactly `size × size`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::similar_names
)]
pub fn scale_and_centre(image: &GrayImage, size: u32, margin: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return GrayImage::new(size, size);
    }
    let target = f64::from(size.saturating_sub(margin));
    let scale = |ratio: f64, v: u32| ((ratio * f64::from(v)) as u32).max(1);

    let (new_w, new_h, left, right, top, bottom) = if h > w {
        let ratio = target / f64::from(h);
        let (new_w, new_h) = (scale(ratio, w), scale(ratio, h));
        let (left, right) = centre_pad(size, new_w);
        (new_w, new_h, left, right, margin / 2, margin / 2)
    } else {
        let ratio = target / f64::from(w);
        let (new_w, new_h) = (scale(ratio, w), scale(ratio, h));
        let (top, bottom) = centre_pad(size, new_h);
        (new_w, new_h, margin / 2, margin / 2, top, bottom)
    };

    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);
    let mut canvas = GrayImage::new(left + new_w + right, top + new_h + bottom);
    imageops::replace(&mut canvas, &resized, i64::from(left), i64::from(top));

    if canvas.dimensions() == (size, size) {
        canvas
    } else {
        imageops::resize(&canvas, size, size, FilterType::Triangle)
    }
}

/// Isolate the digit inside `rect` of the binary rectified grid.
///
/// Returns [`CellImage::Blank`] when the cell's inner region holds no
/// ink, or when the kept component's bounding box has a zero extent or
/// an area of at most `config.min_digit_area`.
#[must_use]
pub fn isolate(binary: &GrayImage, rect: &Rect, config: &PipelineConfig) -> CellImage {
    let cell = crop(binary, rect);
    let (w, h) = cell.dimensions();
    let margin = inner_margin(w, h);

    let bbox = largest_component_in(
        &cell,
        (margin, margin),
        (w.saturating_sub(margin), h.saturating_sub(margin)),
    )
    .and_then(|mask| bounding_box(&mask).map(|bbox| (mask, bbox)));

    match bbox {
        Some((mask, bbox))
            if bbox.width() > 0
                && bbox.height() > 0
                && bbox.area() > u64::from(config.min_digit_area) =>
        {
            let blob = imageops::crop_imm(&mask, bbox.left, bbox.top, bbox.width(), bbox.height())
                .to_image();
            CellImage::Digit(scale_and_centre(&blob, config.cell_size, config.cell_margin))
        }
        _ => CellImage::Blank(blank_marker(config.cell_size)),
    }
}

/// Isolate all 81 cells of `grid`, row-major.
#[must_use]
pub fn isolate_all(binary: &GrayImage, grid: &Grid81, config: &PipelineConfig) -> Vec<CellImage> {
    let cells: Vec<CellImage> = grid
        .cells()
        .iter()
        .map(|rect| isolate(binary, rect, config))
        .collect();
    debug!(
        digits = cells.iter().filter(|c| !c.is_blank()).count(),
        "isolated cells"
    );
    cells
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn with_rects(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let inside = rects
                .iter()
                .any(|&(x0, y0, x1, y1)| (x0..x1).contains(&x) && (y0..y1).contains(&y));
            image::Luma([if inside { 255 } else { 0 }])
        })
    }

    fn whole(img: &GrayImage) -> Rect {
        Rect::new(
            Point::new(0.0, 0.0),
            Point::new(f64::from(img.width()), f64::from(img.height())),
        )
    }

    #[test]
    fn margin_rounds_mean_side() {
        assert_eq!(inner_margin(28, 28), 11);
        assert_eq!(inner_margin(26, 26), 10);
        assert_eq!(inner_margin(25, 25), 10);
        assert_eq!(inner_margin(0, 0), 0);
    }

    #[test]
    fn blank_cell_returns_ring() {
        let cell = GrayImage::new(30, 30);
        let result = isolate(&cell, &whole(&cell), &PipelineConfig::default());
        assert!(result.is_blank());
        assert_eq!(result, CellImage::Blank(blank_marker(28)));
    }

    #[test]
    fn ring_matches_reference_annulus() {
        let ring = blank_marker(28);
        assert_eq!(ring.dimensions(), (28, 28));
        // (14 + 11, 14) sits on the radius; the centre and corners are off.
        assert_eq!(ring.get_pixel(25, 14).0[0], 255);
        assert_eq!(ring.get_pixel(14, 3).0[0], 255);
        assert_eq!(ring.get_pixel(14, 14).0[0], 0);
        assert_eq!(ring.get_pixel(0, 0).0[0], 0);
        // Squared distance 81 + 0 = 81 is below 91: inside the hole.
        assert_eq!(ring.get_pixel(23, 14).0[0], 0);
        // 100 lies in (91, 151).
        assert_eq!(ring.get_pixel(24, 14).0[0], 255);
    }

    #[test]
    fn border_lines_alone_are_blank() {
        // Grid lines along all four edges never reach the inner region.
        let cell = with_rects(30, 30, &[(0, 0, 30, 3), (0, 27, 30, 30), (0, 0, 3, 30), (27, 0, 30, 30)]);
        let result = isolate(&cell, &whole(&cell), &PipelineConfig::default());
        assert!(result.is_blank());
    }

    #[test]
    fn small_speck_is_blank() {
        // 8 x 8 speck: bbox extent 7 x 7 = 49 <= 100.
        let cell = with_rects(30, 30, &[(11, 11, 19, 19)]);
        let result = isolate(&cell, &whole(&cell), &PipelineConfig::default());
        assert!(result.is_blank());
    }

    #[test]
    fn single_row_blob_is_blank() {
        let cell = with_rects(30, 30, &[(5, 15, 25, 16)]);
        let result = isolate(&cell, &whole(&cell), &PipelineConfig::default());
        assert!(result.is_blank());
    }

    #[test]
    fn centred_stroke_becomes_digit() {
        // Bounding box extent 7 x 17 = 119 > 100.
        let cell = with_rects(30, 30, &[(11, 6, 19, 24)]);
        let result = isolate(&cell, &whole(&cell), &PipelineConfig::default());
        let CellImage::Digit(img) = result else {
            panic!("expected a digit");
        };
        assert_eq!(img.dimensions(), (28, 28));
        // Tall blob: 6 rows of padding above and below.
        assert_eq!(img.get_pixel(14, 2).0[0], 0);
        assert!(img.get_pixel(14, 14).0[0] > 128);
        assert_eq!(img.get_pixel(1, 14).0[0], 0);
    }

    #[test]
    fn digit_touching_border_line_keeps_component() {
        // A stroke connected to the left border line is one component;
        // its bounding box spans from the border.
        let cell = with_rects(30, 30, &[(0, 0, 2, 30), (0, 14, 20, 17)]);
        let mask = largest_component_in(&cell, (12, 12), (18, 18)).unwrap();
        let bbox = bounding_box(&mask).unwrap();
        assert_eq!(bbox.left, 0);
        assert_eq!(bbox.right, 19);
    }

    #[test]
    fn largest_component_wins_and_noise_is_dropped() {
        // Two blobs touch the inner region; the larger one wins. A third
        // blob outside the inner region is erased from the mask.
        let cell = with_rects(
            30,
            30,
            &[(10, 10, 13, 13), (15, 10, 20, 25), (1, 1, 4, 4)],
        );
        let mask = largest_component_in(&cell, (10, 10), (20, 20)).unwrap();
        assert_eq!(mask.get_pixel(16, 20).0[0], 255);
        assert_eq!(mask.get_pixel(11, 11).0[0], 0);
        assert_eq!(mask.get_pixel(2, 2).0[0], 0);
        assert_eq!(
            bounding_box(&mask),
            Some(PixelBox {
                left: 15,
                top: 10,
                right: 19,
                bottom: 24
            })
        );
    }

    #[test]
    fn first_component_wins_ties() {
        let cell = with_rects(30, 30, &[(10, 10, 13, 13), (16, 16, 19, 19)]);
        let mask = largest_component_in(&cell, (0, 0), (30, 30)).unwrap();
        assert_eq!(mask.get_pixel(11, 11).0[0], 255);
        assert_eq!(mask.get_pixel(17, 17).0[0], 0);
    }

    #[test]
    fn diagonal_neighbours_are_separate_components() {
        let mut cell = GrayImage::new(10, 10);
        cell.put_pixel(4, 4, image::Luma([255]));
        cell.put_pixel(5, 5, image::Luma([255]));
        let mask = largest_component_in(&cell, (0, 0), (10, 10)).unwrap();
        assert_eq!(bounding_box(&mask).unwrap().area(), 0);
    }

    #[test]
    fn empty_region_finds_nothing() {
        let cell = with_rects(30, 30, &[(0, 0, 5, 5)]);
        assert!(largest_component_in(&cell, (10, 10), (20, 20)).is_none());
    }

    #[test]
    fn centre_pad_puts_odd_pixel_last() {
        assert_eq!(centre_pad(28, 16), (6, 6));
        assert_eq!(centre_pad(28, 15), (6, 7));
    }

    #[test]
    fn scale_and_centre_wide_blob() {
        let blob = GrayImage::from_fn(32, 8, |_, _| image::Luma([255]));
        let out = scale_and_centre(&blob, 28, 12);
        assert_eq!(out.dimensions(), (28, 28));
        // Width scales to 16 with 6 columns each side; height to 4 with
        // 12 rows each side.
        assert_eq!(out.get_pixel(5, 14).0[0], 0);
        assert_eq!(out.get_pixel(6, 13).0[0], 255);
        assert_eq!(out.get_pixel(21, 14).0[0], 255);
        assert_eq!(out.get_pixel(22, 14).0[0], 0);
        assert_eq!(out.get_pixel(14, 11).0[0], 0);
        assert_eq!(out.get_pixel(14, 16).0[0], 0);
    }

    #[test]
    fn isolate_all_is_row_major() {
        // One block in cell (1, 2) of a 90-pixel grid (10-pixel cells).
        let config = PipelineConfig {
            min_digit_area: 10,
            ..PipelineConfig::default()
        };
        let binary = with_rects(90, 90, &[(22, 11, 28, 19)]);
        let cells = isolate_all(&binary, &crate::grid::segment(90), &config);
        assert_eq!(cells.len(), 81);
        let digits: Vec<usize> = (0..81).filter(|&i| !cells[i].is_blank()).collect();
        assert_eq!(digits, vec![9 + 2]);
    }

    #[test]
    fn cell_crop_uses_truncated_bounds() {
        let img = GrayImage::new(100, 100);
        let rect = Rect::new(Point::new(11.1, 22.9), Point::new(22.2, 33.8));
        assert_eq!(crop(&img, &rect).dimensions(), (11, 11));
    }
}
