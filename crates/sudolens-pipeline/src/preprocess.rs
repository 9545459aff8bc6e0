//! Turn a grayscale frame into a clean binary mask.
//!
//! blur → adaptive threshold → invert → dilate. Grid lines and digit
//! strokes end up as thickened 255-valued foreground on a 0 background.
//! The locator consumes the mask of the whole frame, and the cell
//! isolator the mask of the rectified square.

use image::GrayImage;
use tracing::debug;

use crate::blur::gaussian_blur_kernel;
use crate::threshold::{adaptive_threshold, dilate, foreground_count, invert};
use crate::types::PipelineConfig;

/// Blur, threshold and invert `image` without dilating.
#[must_use = "returns the binary mask"]
pub fn binarize(image: &GrayImage, config: &PipelineConfig) -> GrayImage {
    let blurred = gaussian_blur_kernel(image, config.blur_kernel);
    let thresholded = adaptive_threshold(&blurred, config.threshold_block, config.threshold_offset);
    invert(&thresholded)
}

/// Produce the dilated binary mask of `image`. Never fails; the output
/// has the dimensions of the input.
#[must_use = "returns the binary mask"]
pub fn preprocess(image: &GrayImage, config: &PipelineConfig) -> GrayImage {
    let mask = dilate(&binarize(image, config), config.dilate_radius);
    debug!(
        width = mask.width(),
        height = mask.height(),
        foreground = foreground_count(&mask),
        "preprocessed"
    );
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_preserved() {
        let img = GrayImage::from_fn(33, 21, |_, _| image::Luma([255]));
        let mask = preprocess(&img, &PipelineConfig::default());
        assert_eq!(mask.dimensions(), (33, 21));
    }

    #[test]
    fn blank_paper_has_no_foreground() {
        let img = GrayImage::from_fn(30, 30, |_, _| image::Luma([230]));
        let mask = preprocess(&img, &PipelineConfig::default());
        assert_eq!(foreground_count(&mask), 0);
    }

    #[test]
    fn dark_square_outline_becomes_foreground() {
        let img = GrayImage::from_fn(40, 40, |x, y| {
            let on_border = (x == 10 || x == 29) && (10..30).contains(&y)
                || (y == 10 || y == 29) && (10..30).contains(&x);
            if on_border {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        });
        let mask = preprocess(&img, &PipelineConfig::default());
        assert_eq!(mask.get_pixel(10, 20).0[0], 255);
        assert_eq!(mask.get_pixel(20, 10).0[0], 255);
        assert_eq!(mask.get_pixel(20, 20).0[0], 0);
        assert_eq!(mask.get_pixel(2, 2).0[0], 0);
    }

    #[test]
    fn dilation_widens_strokes() {
        let img = GrayImage::from_fn(40, 40, |x, _| image::Luma([if x == 20 { 0 } else { 255 }]));
        let config = PipelineConfig::default();
        let thin = binarize(&img, &config);
        let thick = preprocess(&img, &config);
        assert!(foreground_count(&thick) > foreground_count(&thin));
        assert_eq!(thin.get_pixel(20, 20).0[0], 255);
    }
}
