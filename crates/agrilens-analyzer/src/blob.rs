//! Spot detection: connected components over a discoloration mask.
//!
//! The mask marks pixels whose hue bucket indicates discolored tissue
//! (see [`crate::color::ColorBucket::is_discolored`]). Each
//! 8-connected component is a candidate spot; components that are too
//! small (sensor noise) or too large (whole-leaf yellowing, soil,
//! shadow) are discarded.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

/// Spot counts by size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpotHistogram {
    pub small: u32,
    pub medium: u32,
    pub large: u32,
}

impl SpotHistogram {
    /// Total number of spots across all size classes.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.small + self.medium + self.large
    }
}

/// Limits applied when turning components into spots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLimits {
    /// Components below this area (pixels) are ignored.
    pub min_area: u32,
    /// Components above this area (pixels) are ignored.
    pub max_area: u32,
    /// Upper bound (exclusive) of the small class.
    pub small_max_area: u32,
    /// Upper bound (exclusive) of the medium class.
    pub medium_max_area: u32,
}

/// Result of spot detection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpotStats {
    pub histogram: SpotHistogram,
    /// Mean spot area in pixels, zero when there are no spots.
    pub mean_area: f64,
}

impl SpotStats {
    /// Number of spots kept after area filtering.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.histogram.total()
    }
}

/// Find spots in a binary mask (non-zero = discolored).
#[must_use]
pub fn detect_spots(mask: &GrayImage, limits: SpotLimits) -> SpotStats {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut areas: Vec<u32> = Vec::new();
    for label in labels.pixels().map(|p| p.0[0]) {
        if label == 0 {
            continue;
        }
        let idx = label as usize;
        if areas.len() <= idx {
            areas.resize(idx + 1, 0);
        }
        areas[idx] += 1;
    }

    let mut histogram = SpotHistogram::default();
    let mut total_area: u64 = 0;
    for &area in areas.iter().filter(|&&a| a > 0) {
        if area < limits.min_area || area > limits.max_area {
            continue;
        }
        if area < limits.small_max_area {
            histogram.small += 1;
        } else if area < limits.medium_max_area {
            histogram.medium += 1;
        } else {
            histogram.large += 1;
        }
        total_area += u64::from(area);
    }

    let count = histogram.total();
    #[allow(clippy::cast_precision_loss)]
    let mean_area = if count == 0 {
        0.0
    } else {
        total_area as f64 / f64::from(count)
    };

    SpotStats {
        histogram,
        mean_area,
    }
}
