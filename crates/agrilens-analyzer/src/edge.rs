//! Edge detection as a tissue-damage proxy.
//!
//! Healthy leaf surfaces are smooth; chewing damage, lesion margins,
//! mines and insect colonies add edges. The extractor blurs the
//! luminance channel, runs [`imageproc::edges::canny`], and reports the
//! fraction of edge pixels as `edge_density`.

use image::GrayImage;

/// Minimum allowed Canny threshold.
///
/// A zero low threshold marks every pixel with any gradient as a
/// potential edge and saturates the density measure.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Apply Gaussian blur before edge detection.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Detect edges using the Canny algorithm.
///
/// Returns a binary image: 255 for edge pixels, 0 for non-edge.
///
/// Both thresholds are clamped to a minimum of [`MIN_THRESHOLD`] and
/// `low_threshold` is clamped to be at most `high_threshold`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);
    imageproc::edges::canny(image, low, high)
}

/// Count edge pixels (value == 255) in a binary edge map.
#[must_use]
pub fn count_edge_pixels(edges: &GrayImage) -> u64 {
    edges
        .pixels()
        .map(|p| u64::from(u8::from(p.0[0] == u8::MAX)))
        .sum()
}

/// Fraction of pixels in the edge map that are edges, `[0, 1]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn edge_density(edges: &GrayImage) -> f64 {
    let total = u64::from(edges.width()) * u64::from(edges.height());
    if total == 0 {
        return 0.0;
    }
    count_edge_pixels(edges) as f64 / total as f64
}
