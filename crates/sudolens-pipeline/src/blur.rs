//! Gaussian blur for noise reduction before thresholding.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`]. Kernel sizes are the
//! natural way to describe these filters for photographs of printed
//! grids, so [`sigma_for_kernel`] converts an odd kernel size into the
//! sigma that covers it.

use image::GrayImage;

/// Sigma of a Gaussian whose support is a `kernel × kernel` window.
///
/// Uses the conventional `0.3 * ((k - 1) * 0.5 - 1) + 0.8` rule, giving
/// `1.7` for a 9-pixel kernel and `2.0` for an 11-pixel one.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sigma_for_kernel(kernel: u32) -> f32 {
    0.3f32.mul_add((kernel as f32 - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 || !sigma.is_finite() {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Blur with the sigma matching an odd `kernel` size.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur_kernel(image: &GrayImage, kernel: u32) -> GrayImage {
    gaussian_blur(image, sigma_for_kernel(kernel))
}
