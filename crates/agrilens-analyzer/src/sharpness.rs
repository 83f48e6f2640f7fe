//! Image sharpness as a quality proxy.
//!
//! Sharpness is the variance of the 4-neighbour Laplacian over the
//! luminance channel. Blurry or out-of-focus photographs have little
//! high-frequency energy and a low variance; the analyzer scales report
//! confidence down accordingly.

use image::GrayImage;

/// Variance of the discrete Laplacian over interior pixels.
///
/// Returns 0.0 for images smaller than 3x3.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }

    let at = |x: u32, y: u32| i32::from(gray.get_pixel(x, y).0[0]);
    let mut sum = 0.0_f64;
    let mut sum_sq = 0.0_f64;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = 4 * at(x, y) - at(x - 1, y) - at(x + 1, y) - at(x, y - 1) - at(x, y + 1);
            let lap = f64::from(lap);
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let n = f64::from(w - 2) * f64::from(h - 2);
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Map a Laplacian variance to a quality score in `[min_quality, 1)`.
///
/// The curve is `s / (s + reference)`, rescaled so a perfectly flat
/// image scores `min_quality` and a variance equal to `reference` lands
/// halfway to 1.0.
#[must_use]
pub fn quality_score(sharpness: f64, reference: f64, min_quality: f64) -> f64 {
    let s = sharpness.max(0.0);
    let ratio = if reference > 0.0 { s / (s + reference) } else { 1.0 };
    (1.0 - min_quality).mul_add(ratio, min_quality).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_image_has_zero_variance() {
        let img = GrayImage::from_pixel(32, 32, image::Luma([90]));
        assert!(laplacian_variance(&img).abs() < f64::EPSILON);
    }

    #[test]
    fn checkerboard_is_sharper_than_gradient() {
        let checker = GrayImage::from_fn(32, 32, |x, y| {
            image::Luma([if (x + y) % 2 == 0 { 0 } else { 255 }])
        });
        let gradient = GrayImage::from_fn(32, 32, |x, _| image::Luma([(x * 8) as u8]));
        assert!(laplacian_variance(&checker) > laplacian_variance(&gradient));
    }

    #[test]
    fn tiny_image_is_zero() {
        assert!(laplacian_variance(&GrayImage::new(2, 10)).abs() < f64::EPSILON);
    }

    #[test]
    fn quality_floor_and_midpoint() {
        assert!((quality_score(0.0, 100.0, 0.3) - 0.3).abs() < 1e-12);
        assert!((quality_score(100.0, 100.0, 0.3) - 0.65).abs() < 1e-12);
        assert!(quality_score(1e12, 100.0, 0.3) < 1.0 + 1e-12);
    }

    #[test]
    fn quality_is_monotonic() {
        let mut previous = 0.0;
        for s in [0.0, 1.0, 10.0, 50.0, 200.0, 5000.0] {
            let q = quality_score(s, 100.0, 0.3);
            assert!(q >= previous);
            previous = q;
        }
    }
}
