//! HSV conversion and hue bucketing.
//!
//! Every pixel is assigned to exactly one [`ColorBucket`]. The buckets
//! are chosen for what they say about plant tissue: healthy green,
//! pale (powder, webbing, mines), yellow-orange (chlorosis),
//! brown-black (necrosis, lesions, shadows), saturated red (ripening
//! fruit) and magenta-violet (blossoms).

use image::Rgb;

/// A pixel in HSV space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    /// Hue in degrees, `[0, 360)`. Zero for achromatic pixels.
    pub h: f64,
    /// Saturation, `[0, 1]`.
    pub s: f64,
    /// Value (brightness), `[0, 1]`.
    pub v: f64,
}

/// Hue band a pixel falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorBucket {
    Green,
    Pale,
    YellowOrange,
    BrownBlack,
    Fruit,
    Blossom,
    Other,
}

impl ColorBucket {
    /// Number of buckets, for fixed-size accumulators.
    pub const COUNT: usize = 7;

    /// Dense index in `0..COUNT`.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Green => 0,
            Self::Pale => 1,
            Self::YellowOrange => 2,
            Self::BrownBlack => 3,
            Self::Fruit => 4,
            Self::Blossom => 5,
            Self::Other => 6,
        }
    }

    /// Whether the bucket indicates discolored tissue, used to seed spot
    /// detection.
    #[must_use]
    pub const fn is_discolored(self) -> bool {
        matches!(self, Self::YellowOrange | Self::BrownBlack)
    }
}

/// Below this value a pixel is dark regardless of hue.
const DARK_VALUE: f64 = 0.2;
/// Below this saturation a pixel is achromatic.
const GREY_SATURATION: f64 = 0.2;
/// Achromatic pixels brighter than this are pale.
const PALE_VALUE: f64 = 0.7;

/// Convert an 8-bit RGB pixel to HSV.
#[must_use]
pub fn rgb_to_hsv(pixel: Rgb<u8>) -> Hsv {
    let [r, g, b] = pixel.0.map(|c| f64::from(c) / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta <= f64::EPSILON {
        0.0
    } else if (max - r).abs() <= f64::EPSILON {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if (max - g).abs() <= f64::EPSILON {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max <= f64::EPSILON { 0.0 } else { delta / max };

    Hsv { h, s, v: max }
}

/// Assign a pixel to its hue bucket.
#[must_use]
pub fn bucket(hsv: Hsv) -> ColorBucket {
    let Hsv { h, s, v } = hsv;

    if v < DARK_VALUE {
        return ColorBucket::BrownBlack;
    }
    if s < GREY_SATURATION {
        return if v > PALE_VALUE {
            ColorBucket::Pale
        } else {
            ColorBucket::Other
        };
    }

    match h {
        h if (70.0..170.0).contains(&h) => ColorBucket::Green,
        h if (40.0..70.0).contains(&h) => ColorBucket::YellowOrange,
        // Orange-brown hues: dull ones are necrotic tissue, bright ones
        // are chlorotic or senescent.
        h if (15.0..40.0).contains(&h) => {
            if v < 0.6 {
                ColorBucket::BrownBlack
            } else {
                ColorBucket::YellowOrange
            }
        }
        h if !(15.0..340.0).contains(&h) => {
            if s > 0.5 && v > 0.35 {
                ColorBucket::Fruit
            } else {
                ColorBucket::BrownBlack
            }
        }
        h if (270.0..340.0).contains(&h) && s > 0.3 => ColorBucket::Blossom,
        _ => ColorBucket::Other,
    }
}
