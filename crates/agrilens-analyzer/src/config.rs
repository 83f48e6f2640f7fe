//! Tunable thresholds and weights for every analysis stage.
//!
//! All numbers that drive classification live here rather than inline,
//! so crop-specific tuning is a matter of loading a different
//! [`AnalyzerConfig`] (for example from JSON) instead of recompiling.
//!
//! Health score weights are part of the report's meaning: changing them
//! makes scores from different configurations incomparable for the same
//! plot. Treat the defaults as a stable, versioned contract.

use serde::{Deserialize, Serialize};

use crate::types::{AnalysisError, Severity};

/// Top-level analyzer configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub extraction: ExtractionConfig,
    pub growth: GrowthThresholds,
    pub health: HealthWeights,
    pub detection: DetectionConfig,
}

impl AnalyzerConfig {
    /// Check every section for values that would make the pipeline
    /// misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Configuration`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.extraction.validate()?;
        self.growth.validate()?;
        self.health.validate()?;
        self.detection.validate()
    }
}

/// Parameters for [`crate::features::extract`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum width and height in pixels.
    pub min_dimension: u32,
    /// Gaussian blur sigma applied before edge detection.
    pub blur_sigma: f32,
    /// Canny low threshold.
    pub canny_low: f32,
    /// Canny high threshold.
    pub canny_high: f32,
    /// Blobs smaller than this many pixels are noise, not spots.
    pub min_spot_area: u32,
    /// Blobs covering more than this fraction of the image are treated as
    /// regions (e.g. soil, shadow) rather than spots.
    pub max_spot_fraction: f64,
    /// Spots below this area (pixels) fall in the "small" histogram bucket.
    pub small_spot_max_area: u32,
    /// Spots below this area (pixels) fall in the "medium" bucket; larger
    /// ones are "large".
    pub medium_spot_max_area: u32,
    /// Laplacian variance at which the quality score reaches the midpoint
    /// between `min_quality` and 1.0.
    pub sharpness_reference: f64,
    /// Quality score assigned to a perfectly flat (blurry) image.
    pub min_quality: f64,
}

impl ExtractionConfig {
    pub const DEFAULT_MIN_DIMENSION: u32 = 64;
    pub const DEFAULT_BLUR_SIGMA: f32 = 1.4;
    pub const DEFAULT_CANNY_LOW: f32 = 50.0;
    pub const DEFAULT_CANNY_HIGH: f32 = 150.0;

    fn validate(&self) -> Result<(), AnalysisError> {
        if self.min_dimension == 0 {
            return Err(invalid("extraction.min_dimension must be positive"));
        }
        if !self.blur_sigma.is_finite() || self.blur_sigma < 0.0 {
            return Err(invalid("extraction.blur_sigma must be finite and non-negative"));
        }
        if !(self.canny_low.is_finite() && self.canny_high.is_finite())
            || self.canny_low > self.canny_high
        {
            return Err(invalid("extraction.canny_low must not exceed canny_high"));
        }
        if !(0.0..=1.0).contains(&self.max_spot_fraction) {
            return Err(invalid("extraction.max_spot_fraction must be within [0, 1]"));
        }
        if self.small_spot_max_area > self.medium_spot_max_area {
            return Err(invalid(
                "extraction.small_spot_max_area must not exceed medium_spot_max_area",
            ));
        }
        if !self.sharpness_reference.is_finite() || self.sharpness_reference <= 0.0 {
            return Err(invalid("extraction.sharpness_reference must be positive"));
        }
        if !(0.0..=1.0).contains(&self.min_quality) {
            return Err(invalid("extraction.min_quality must be within [0, 1]"));
        }
        Ok(())
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_dimension: Self::DEFAULT_MIN_DIMENSION,
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
            min_spot_area: 4,
            max_spot_fraction: 0.05,
            small_spot_max_area: 16,
            medium_spot_max_area: 144,
            sharpness_reference: 100.0,
            min_quality: 0.3,
        }
    }
}

/// Coverage-fraction thresholds for the growth stage ladder.
///
/// Evaluated from the latest stage down; see [`crate::growth::classify`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthThresholds {
    /// Fruit fraction above which the crop is mature.
    pub mature_fruit: f64,
    /// Fruit fraction above which the crop is fruiting.
    pub fruit: f64,
    /// Flower fraction above which the crop is flowering.
    pub flower: f64,
    /// Vegetation fraction above which the crop is vegetative.
    pub vegetation_high: f64,
    /// Vegetation fraction above which the crop is an established seedling.
    pub vegetation_low: f64,
    /// Flower fraction above which `has_flowers` is reported.
    pub flower_presence: f64,
    /// Fruit fraction above which `has_fruits` is reported.
    pub fruit_presence: f64,
}

impl GrowthThresholds {
    fn validate(&self) -> Result<(), AnalysisError> {
        let all = [
            ("mature_fruit", self.mature_fruit),
            ("fruit", self.fruit),
            ("flower", self.flower),
            ("vegetation_high", self.vegetation_high),
            ("vegetation_low", self.vegetation_low),
            ("flower_presence", self.flower_presence),
            ("fruit_presence", self.fruit_presence),
        ];
        for (name, value) in all {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("growth.{name} must be within [0, 1]")));
            }
        }
        if self.fruit > self.mature_fruit {
            return Err(invalid("growth.fruit must not exceed mature_fruit"));
        }
        if self.vegetation_low > self.vegetation_high {
            return Err(invalid("growth.vegetation_low must not exceed vegetation_high"));
        }
        Ok(())
    }
}

impl Default for GrowthThresholds {
    fn default() -> Self {
        Self {
            mature_fruit: 0.35,
            fruit: 0.08,
            flower: 0.05,
            vegetation_high: 0.40,
            vegetation_low: 0.10,
            flower_presence: 0.01,
            fruit_presence: 0.01,
        }
    }
}

/// Penalty weights and bucket boundaries for the health score.
///
/// `health_score = 100 - yellowing_weight * yellowing%
///                     - browning_weight * browning%
///                     - edge_weight * edge_density * 100`, floored at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthWeights {
    pub yellowing_weight: f64,
    pub browning_weight: f64,
    pub edge_weight: f64,
    /// Lowest score (inclusive) for [`crate::types::Vigor::High`].
    pub vigor_high: f64,
    /// Lowest score (inclusive) for [`crate::types::Vigor::Moderate`].
    pub vigor_moderate: f64,
    /// Scores below this mark a finding-free plant as at risk.
    pub at_risk_score: f64,
}

impl HealthWeights {
    fn validate(&self) -> Result<(), AnalysisError> {
        for (name, value) in [
            ("yellowing_weight", self.yellowing_weight),
            ("browning_weight", self.browning_weight),
            ("edge_weight", self.edge_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("health.{name} must be finite and non-negative")));
            }
        }
        if !(0.0..=100.0).contains(&self.vigor_moderate)
            || !(0.0..=100.0).contains(&self.vigor_high)
            || self.vigor_moderate > self.vigor_high
        {
            return Err(invalid(
                "health vigor cut-offs must satisfy 0 <= vigor_moderate <= vigor_high <= 100",
            ));
        }
        if !(0.0..=100.0).contains(&self.at_risk_score) {
            return Err(invalid("health.at_risk_score must be within [0, 100]"));
        }
        Ok(())
    }
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            yellowing_weight: 1.0,
            browning_weight: 1.5,
            edge_weight: 0.5,
            vigor_high: 75.0,
            vigor_moderate: 45.0,
            at_risk_score: 70.0,
        }
    }
}

/// Confidence shaping and severity banding for the detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Matches below this confidence are discarded.
    pub min_confidence: f64,
    /// Confidence of a match that only barely clears its thresholds.
    pub confidence_base: f64,
    /// Confidence approached (never reached) as every threshold is cleared
    /// by a wide margin.
    pub confidence_ceiling: f64,
    pub severity: SeverityBands,
}

impl DetectionConfig {
    fn validate(&self) -> Result<(), AnalysisError> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.min_confidence)
            || !unit.contains(&self.confidence_base)
            || !unit.contains(&self.confidence_ceiling)
        {
            return Err(invalid("detection confidences must be within [0, 1]"));
        }
        if self.confidence_base > self.confidence_ceiling {
            return Err(invalid("detection.confidence_base must not exceed confidence_ceiling"));
        }
        self.severity.validate()
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            confidence_base: 0.45,
            confidence_ceiling: 0.95,
            severity: SeverityBands::default(),
        }
    }
}

/// Affected-area percentage boundaries between severity levels.
///
/// Each boundary is the inclusive lower bound of the next band, except
/// `critical`, which must be strictly exceeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityBands {
    pub moderate: f64,
    pub high: f64,
    pub critical: f64,
}

impl SeverityBands {
    /// Classify an affected-area percentage.
    ///
    /// Monotonic: a larger percentage never yields a lower severity.
    #[must_use]
    pub fn classify(&self, coverage_percentage: f64) -> Severity {
        if coverage_percentage > self.critical {
            Severity::Critical
        } else if coverage_percentage >= self.high {
            Severity::High
        } else if coverage_percentage >= self.moderate {
            Severity::Moderate
        } else {
            Severity::Low
        }
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        let ordered = self.moderate <= self.high && self.high <= self.critical;
        let finite = self.moderate.is_finite() && self.high.is_finite() && self.critical.is_finite();
        if !(ordered && finite) {
            return Err(invalid(
                "severity bands must satisfy moderate <= high <= critical",
            ));
        }
        Ok(())
    }
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            moderate: 5.0,
            high: 15.0,
            critical: 30.0,
        }
    }
}

fn invalid(msg: impl Into<String>) -> AnalysisError {
    AnalysisError::Configuration(msg.into())
}
