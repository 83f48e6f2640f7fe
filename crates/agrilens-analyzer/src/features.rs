//! Image feature extraction.
//!
//! Reduces a validated RGB raster to a compact [`FeatureVector`]: hue
//! bucket coverage and brightness statistics, mean channel levels, a
//! chlorophyll proxy, edge density, spot counts with a size histogram,
//! and a sharpness-derived quality score. Every later stage reads only
//! the feature vector, never the raster.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::blob::{self, SpotHistogram, SpotLimits};
use crate::color::{self, ColorBucket};
use crate::config::ExtractionConfig;
use crate::types::{InvalidImageError, RgbImage};

/// Denominator below which the chlorophyll proxy is reported as zero.
const CHLOROPHYLL_EPSILON: f64 = 1e-6;

/// Pixel share and brightness statistics for one hue bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BucketStats {
    /// Fraction of image pixels in this bucket, `[0, 1]`.
    pub fraction: f64,
    /// Mean HSV value of the bucket's pixels, `[0, 1]`.
    pub mean_value: f64,
    /// Variance of HSV value across the bucket's pixels.
    pub value_variance: f64,
}

/// Numeric descriptors of a plot photograph.
///
/// Immutable once computed. Constructed by [`extract`]; tests and
/// callers with precomputed features may also build one directly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub width: u32,
    pub height: u32,

    pub green: BucketStats,
    pub pale: BucketStats,
    pub yellow_orange: BucketStats,
    pub brown_black: BucketStats,

    /// Mean red channel level, `[0, 255]`.
    pub red_mean: f64,
    /// Mean green channel level, `[0, 255]`.
    pub green_mean: f64,
    /// Mean blue channel level, `[0, 255]`.
    pub blue_mean: f64,
    /// `(green_mean - red_mean) / (green_mean + red_mean)`, `[-1, 1]`.
    pub chlorophyll_index: f64,

    /// Fraction of pixels on a Canny edge, `[0, 1]`.
    pub edge_density: f64,

    pub spot_count: u32,
    pub spot_sizes: SpotHistogram,
    /// Mean spot area in pixels.
    pub mean_spot_area: f64,

    /// Laplacian variance of the luminance channel.
    pub sharpness: f64,
    /// Confidence multiplier derived from sharpness, `[0, 1]`.
    pub quality_score: f64,

    pub vegetation_fraction: f64,
    /// Blossom-hued pixels only. White powder and webbing stay pale.
    pub flower_fraction: f64,
    pub fruit_fraction: f64,
}

/// Running sums for one bucket.
#[derive(Debug, Clone, Copy, Default)]
struct BucketAccumulator {
    count: u64,
    value_sum: f64,
    value_sum_sq: f64,
}

impl BucketAccumulator {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.value_sum += value;
        self.value_sum_sq += value * value;
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self, total: u64) -> BucketStats {
        if self.count == 0 || total == 0 {
            return BucketStats::default();
        }
        let n = self.count as f64;
        let mean = self.value_sum / n;
        BucketStats {
            fraction: n / total as f64,
            mean_value: mean,
            value_variance: (self.value_sum_sq / n - mean * mean).max(0.0),
        }
    }
}

/// Compute `(green - red) / (green + red)`, or 0 when the sum is
/// negligible.
#[must_use]
pub fn chlorophyll_index(green_mean: f64, red_mean: f64) -> f64 {
    let sum = green_mean + red_mean;
    if sum < CHLOROPHYLL_EPSILON {
        return 0.0;
    }
    (green_mean - red_mean) / sum
}

/// Extract a [`FeatureVector`] from an RGB raster.
///
/// # Errors
///
/// Returns [`InvalidImageError`] if the raster is below
/// `config.min_dimension` on either side or is degenerate (all black or
/// all saturated).
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn extract(
    raster: &RgbImage,
    config: &ExtractionConfig,
) -> Result<FeatureVector, InvalidImageError> {
    crate::raster::validate(raster, config.min_dimension)?;

    let (width, height) = raster.dimensions();
    let total = u64::from(width) * u64::from(height);

    let mut buckets = [BucketAccumulator::default(); ColorBucket::COUNT];
    let mut channel_sums = [0u64; 3];
    let mut mask = GrayImage::new(width, height);

    for (x, y, pixel) in raster.enumerate_pixels() {
        for (sum, &c) in channel_sums.iter_mut().zip(pixel.0.iter()) {
            *sum += u64::from(c);
        }
        let hsv = color::rgb_to_hsv(*pixel);
        let bucket = color::bucket(hsv);
        buckets[bucket.index()].add(hsv.v);
        if bucket.is_discolored() {
            mask.put_pixel(x, y, Luma([u8::MAX]));
        }
    }

    let stats = buckets.map(|acc| acc.finish(total));
    let fraction_of = |bucket: ColorBucket| stats[bucket.index()].fraction;

    let [red_mean, green_mean, blue_mean] = channel_sums.map(|s| s as f64 / total as f64);

    // Edges on blurred luminance.
    let gray = image::imageops::grayscale(raster);
    let blurred = crate::edge::gaussian_blur(&gray, config.blur_sigma);
    let edges = crate::edge::canny(&blurred, config.canny_low, config.canny_high);
    let edge_density = crate::edge::edge_density(&edges);

    let max_area = ((total as f64) * config.max_spot_fraction).floor() as u32;
    let spots = blob::detect_spots(
        &mask,
        SpotLimits {
            min_area: config.min_spot_area,
            max_area,
            small_max_area: config.small_spot_max_area,
            medium_max_area: config.medium_spot_max_area,
        },
    );

    // Sharpness on unblurred luminance.
    let sharpness = crate::sharpness::laplacian_variance(&gray);
    let quality_score =
        crate::sharpness::quality_score(sharpness, config.sharpness_reference, config.min_quality);

    let features = FeatureVector {
        width,
        height,
        green: stats[ColorBucket::Green.index()],
        pale: stats[ColorBucket::Pale.index()],
        yellow_orange: stats[ColorBucket::YellowOrange.index()],
        brown_black: stats[ColorBucket::BrownBlack.index()],
        red_mean,
        green_mean,
        blue_mean,
        chlorophyll_index: chlorophyll_index(green_mean, red_mean),
        edge_density,
        spot_count: spots.count(),
        spot_sizes: spots.histogram,
        mean_spot_area: spots.mean_area,
        sharpness,
        quality_score,
        vegetation_fraction: fraction_of(ColorBucket::Green),
        flower_fraction: fraction_of(ColorBucket::Blossom),
        fruit_fraction: fraction_of(ColorBucket::Fruit),
    };

    tracing::debug!(
        width,
        height,
        green = features.green.fraction,
        yellow = features.yellow_orange.fraction,
        brown = features.brown_black.fraction,
        edge_density,
        spots = features.spot_count,
        sharpness,
        "extracted features"
    );

    Ok(features)
}
