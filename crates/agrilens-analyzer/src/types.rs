//! Shared types for the agrilens crop health analyzer.

use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so downstream crates can hand rasters to the
/// analyzer without depending on `image` directly.
pub use image::RgbImage;

/// Discrete crop growth stage.
///
/// Stages are totally ordered from earliest to latest, so
/// `GrowthStage::Seedling < GrowthStage::Mature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthStage {
    Seedling,
    Vegetative,
    Flowering,
    Fruiting,
    Mature,
}

impl GrowthStage {
    /// All stages in ascending order.
    pub const ALL: [Self; 5] = [
        Self::Seedling,
        Self::Vegetative,
        Self::Flowering,
        Self::Fruiting,
        Self::Mature,
    ];

    /// Maturity label reported alongside the stage.
    #[must_use]
    pub const fn maturity(self) -> &'static str {
        match self {
            Self::Seedling => "early",
            Self::Vegetative => "developing",
            Self::Flowering => "mid_season",
            Self::Fruiting => "late_season",
            Self::Mature => "harvest_ready",
        }
    }

    /// The `snake_case` name used in reports and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seedling => "seedling",
            Self::Vegetative => "vegetative",
            Self::Flowering => "flowering",
            Self::Fruiting => "fruiting",
            Self::Mature => "mature",
        }
    }
}

impl std::str::FromStr for GrowthStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown growth stage '{s}'"))
    }
}

/// Ordinal damage-extent classification of a finding.
///
/// Also used as the report-level risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    /// Recommendation priority implied by this severity.
    #[must_use]
    pub const fn priority(self) -> Priority {
        match self {
            Self::Low => Priority::Low,
            Self::Moderate => Priority::Moderate,
            Self::High | Self::Critical => Priority::High,
        }
    }

    /// Whether findings at this severity demand immediate action.
    #[must_use]
    pub const fn is_urgent(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Likelihood that a predicted issue will develop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Likelihood {
    Low,
    Moderate,
    High,
}

impl Likelihood {
    /// One rank higher, saturating at [`Likelihood::High`].
    #[must_use]
    pub const fn promote(self) -> Self {
        match self {
            Self::Low => Self::Moderate,
            Self::Moderate | Self::High => Self::High,
        }
    }

    /// One rank lower, saturating at [`Likelihood::Low`].
    #[must_use]
    pub const fn demote(self) -> Self {
        match self {
            Self::Low | Self::Moderate => Self::Low,
            Self::High => Self::Moderate,
        }
    }
}

/// Urgency of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Moderate,
    High,
}

/// Overall plant health classification of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    AtRisk,
    Infected,
}

/// Coarse plant vitality bucket derived from the health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vigor {
    Low,
    Moderate,
    High,
}

/// Current weather at the plot, supplied by an external weather service.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherConditions {
    /// Air temperature in degrees Celsius.
    pub temperature_c: Option<f64>,
    /// Relative humidity in percent (0-100).
    pub relative_humidity: Option<f64>,
    /// Rainfall over the last 24 hours in millimetres.
    pub rainfall_mm: Option<f64>,
}

/// Optional environmental context for a single analysis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// Current weather, if known.
    pub weather: Option<WeatherConditions>,
    /// Growth stage reported by the farmer. When present it replaces the
    /// classified stage for prediction purposes only.
    pub growth_stage_hint: Option<GrowthStage>,
}

/// Errors that make an input image unusable for analysis.
#[derive(Debug, thiserror::Error)]
pub enum InvalidImageError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// Raw raster has a channel layout other than RGB or RGBA.
    #[error("unsupported channel count {0}, expected 3 (RGB) or 4 (RGBA)")]
    UnsupportedChannels(u8),

    /// Raw raster buffer length disagrees with the declared dimensions.
    #[error("raster buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    BufferMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Declared raw dimensions do not fit in addressable memory.
    #[error("raster dimensions {width}x{height} with {channels} channels overflow the address space")]
    TooLarge { width: u32, height: u32, channels: u8 },

    /// Image is below the minimum analyzable resolution.
    #[error("image is {width}x{height}, below the {min}x{min} minimum")]
    TooSmall { width: u32, height: u32, min: u32 },

    /// Every channel of every pixel is zero.
    #[error("image is entirely black")]
    AllZero,

    /// Every channel of every pixel is saturated.
    #[error("image is entirely saturated")]
    AllSaturated,
}

/// Errors surfaced by the analyzer.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The input image cannot be analyzed.
    #[error("invalid image: {0}")]
    InvalidImage(#[from] InvalidImageError),

    /// Threshold or catalog tables are malformed.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_stages_are_totally_ordered() {
        for pair in GrowthStage::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should precede {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn growth_stage_parses_case_insensitively() {
        assert_eq!("Flowering".parse::<GrowthStage>(), Ok(GrowthStage::Flowering));
        assert_eq!(" mature ".parse::<GrowthStage>(), Ok(GrowthStage::Mature));
        assert!("budding".parse::<GrowthStage>().is_err());
    }

    #[test]
    fn severity_maps_to_priority() {
        assert_eq!(Severity::Low.priority(), Priority::Low);
        assert_eq!(Severity::Moderate.priority(), Priority::Moderate);
        assert_eq!(Severity::High.priority(), Priority::High);
        assert_eq!(Severity::Critical.priority(), Priority::High);
    }

    #[test]
    fn likelihood_promote_and_demote_saturate() {
        assert_eq!(Likelihood::High.promote(), Likelihood::High);
        assert_eq!(Likelihood::Low.demote(), Likelihood::Low);
        assert_eq!(Likelihood::Low.promote(), Likelihood::Moderate);
        assert_eq!(Likelihood::High.demote(), Likelihood::Moderate);
    }

    #[test]
    fn enums_serialize_snake_case() {
        let json = serde_json::to_string(&HealthStatus::AtRisk).unwrap_or_default();
        assert_eq!(json, "\"at_risk\"");
        let json = serde_json::to_string(&Severity::Critical).unwrap_or_default();
        assert_eq!(json, "\"critical\"");
    }

    #[test]
    fn error_too_small_display() {
        let err = InvalidImageError::TooSmall {
            width: 32,
            height: 48,
            min: 64,
        };
        assert_eq!(err.to_string(), "image is 32x48, below the 64x64 minimum");
    }

    #[test]
    fn analysis_error_wraps_invalid_image() {
        let err = AnalysisError::from(InvalidImageError::AllZero);
        assert_eq!(err.to_string(), "invalid image: image is entirely black");
    }
}
