//! Health metrics derived from the feature vector.

use serde::{Deserialize, Serialize};

use crate::config::HealthWeights;
use crate::features::FeatureVector;
use crate::types::Vigor;

/// The `health_metrics` section of a report.
///
/// Recomputed from scratch on every analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Composite score, `[0, 100]`.
    pub health_score: f64,
    /// Green-versus-red balance, `[-1, 1]`.
    pub chlorophyll_index: f64,
    /// `[0, 100]`.
    pub yellowing_percentage: f64,
    /// `[0, 100]`.
    pub browning_percentage: f64,
    pub spot_count: u32,
    pub vigor: Vigor,
}

/// Compute health metrics for one feature vector.
#[must_use]
pub fn compute(features: &FeatureVector, weights: &HealthWeights) -> HealthMetrics {
    let yellowing_percentage = (features.yellow_orange.fraction * 100.0).clamp(0.0, 100.0);
    let browning_percentage = (features.brown_black.fraction * 100.0).clamp(0.0, 100.0);
    let damage_percentage = (features.edge_density * 100.0).clamp(0.0, 100.0);

    let penalty = weights.edge_weight.mul_add(
        damage_percentage,
        weights
            .yellowing_weight
            .mul_add(yellowing_percentage, weights.browning_weight * browning_percentage),
    );
    let health_score = (100.0 - penalty).clamp(0.0, 100.0);

    HealthMetrics {
        health_score,
        chlorophyll_index: features.chlorophyll_index,
        yellowing_percentage,
        browning_percentage,
        spot_count: features.spot_count,
        vigor: vigor(health_score, weights),
    }
}

/// Bucket a health score. Lower bounds are inclusive.
#[must_use]
pub fn vigor(health_score: f64, weights: &HealthWeights) -> Vigor {
    if health_score >= weights.vigor_high {
        Vigor::High
    } else if health_score >= weights.vigor_moderate {
        Vigor::Moderate
    } else {
        Vigor::Low
    }
}
