//! Growth stage classification from coverage fractions.

use serde::{Deserialize, Serialize};

use crate::config::GrowthThresholds;
use crate::features::FeatureVector;
use crate::types::GrowthStage;

/// The `growth_stage` section of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthAssessment {
    pub stage: GrowthStage,
    pub maturity: String,
    pub has_flowers: bool,
    pub has_fruits: bool,
    /// Vegetation coverage in percent, `[0, 100]`.
    pub vegetation_coverage: f64,
}

/// Map coverage fractions to exactly one growth stage.
///
/// Threshold ladder, latest stage first: mature, fruiting, flowering,
/// vegetative, seedling. Anything that clears no rung is a seedling.
#[must_use]
pub fn classify(
    vegetation_fraction: f64,
    flower_fraction: f64,
    fruit_fraction: f64,
    thresholds: &GrowthThresholds,
) -> GrowthStage {
    if fruit_fraction > thresholds.mature_fruit {
        GrowthStage::Mature
    } else if fruit_fraction > thresholds.fruit {
        GrowthStage::Fruiting
    } else if flower_fraction > thresholds.flower {
        GrowthStage::Flowering
    } else if vegetation_fraction > thresholds.vegetation_high {
        GrowthStage::Vegetative
    } else {
        // Both the established-seedling rung (above `vegetation_low`) and
        // the sparse floor case land here; `assess` tells them apart.
        GrowthStage::Seedling
    }
}

/// Maturity label for sparse stands below the seedling rung.
pub const EMERGING: &str = "emerging";

/// Classify and describe the growth stage of the photographed crop.
#[must_use]
pub fn assess(features: &FeatureVector, thresholds: &GrowthThresholds) -> GrowthAssessment {
    let stage = classify(
        features.vegetation_fraction,
        features.flower_fraction,
        features.fruit_fraction,
        thresholds,
    );
    let maturity = if stage == GrowthStage::Seedling
        && features.vegetation_fraction <= thresholds.vegetation_low
    {
        EMERGING
    } else {
        stage.maturity()
    };
    GrowthAssessment {
        stage,
        maturity: maturity.to_string(),
        has_flowers: features.flower_fraction > thresholds.flower_presence,
        has_fruits: features.fruit_fraction > thresholds.fruit_presence,
        vegetation_coverage: (features.vegetation_fraction * 100.0).clamp(0.0, 100.0),
    }
}
