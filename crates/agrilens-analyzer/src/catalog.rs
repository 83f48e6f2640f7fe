//! Data-driven pest and disease catalog.
//!
//! Every known issue is a [`CatalogEntry`]: a list of threshold
//! [`Condition`]s over named features, a weighted coverage formula, and
//! the agronomic metadata (treatment, immediate action, impact) reported
//! on a match. Secondary effects, weather risks and treatment costs live
//! in the same table so the detectors, predictor and recommender stay
//! generic.
//!
//! A built-in catalog ships as a JSON resource; [`Catalog::from_json`]
//! loads a replacement without recompiling.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;
use crate::health::HealthMetrics;
use crate::types::{AnalysisError, GrowthStage, Likelihood, WeatherConditions};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// A measurable quantity a condition or coverage term can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKey {
    GreenFraction,
    PaleFraction,
    YellowFraction,
    BrownFraction,
    FruitFraction,
    EdgeDensity,
    SpotCount,
    SmallSpotCount,
    MediumSpotCount,
    LargeSpotCount,
    MeanSpotArea,
    ChlorophyllIndex,
    YellowingPercentage,
    BrowningPercentage,
    HealthScore,
}

impl FeatureKey {
    /// Read this quantity from the extracted features and metrics.
    #[must_use]
    pub fn value(self, features: &FeatureVector, metrics: &HealthMetrics) -> f64 {
        match self {
            Self::GreenFraction => features.green.fraction,
            Self::PaleFraction => features.pale.fraction,
            Self::YellowFraction => features.yellow_orange.fraction,
            Self::BrownFraction => features.brown_black.fraction,
            Self::FruitFraction => features.fruit_fraction,
            Self::EdgeDensity => features.edge_density,
            Self::SpotCount => f64::from(metrics.spot_count),
            Self::SmallSpotCount => f64::from(features.spot_sizes.small),
            Self::MediumSpotCount => f64::from(features.spot_sizes.medium),
            Self::LargeSpotCount => f64::from(features.spot_sizes.large),
            Self::MeanSpotArea => features.mean_spot_area,
            Self::ChlorophyllIndex => metrics.chlorophyll_index,
            Self::YellowingPercentage => metrics.yellowing_percentage,
            Self::BrowningPercentage => metrics.browning_percentage,
            Self::HealthScore => metrics.health_score,
        }
    }
}

/// Threshold test applied to one feature value.
///
/// `scale` sets how far past the threshold a value must be to count as
/// a strong match: a margin equal to `scale` contributes strength 0.5.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Strictly greater than `threshold`.
    Above { threshold: f64, scale: f64 },
    /// Strictly less than `threshold`.
    Below { threshold: f64, scale: f64 },
    /// Within `[min, max]`; strongest at the midpoint.
    Between { min: f64, max: f64 },
}

impl Predicate {
    /// Match strength in `[0, 1]`, or `None` when the test fails.
    #[must_use]
    pub fn strength(&self, value: f64) -> Option<f64> {
        match *self {
            Self::Above { threshold, scale } => {
                (value > threshold).then(|| saturate(value - threshold, scale))
            }
            Self::Below { threshold, scale } => {
                (value < threshold).then(|| saturate(threshold - value, scale))
            }
            Self::Between { min, max } => {
                if !(min..=max).contains(&value) {
                    return None;
                }
                let half = (max - min) / 2.0;
                if half <= 0.0 {
                    return Some(1.0);
                }
                Some(((value - min).min(max - value) / half).clamp(0.0, 1.0))
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        match *self {
            Self::Above { threshold, scale } | Self::Below { threshold, scale } => {
                if !threshold.is_finite() {
                    return Err("threshold must be finite".to_string());
                }
                if !scale.is_finite() || scale <= 0.0 {
                    return Err("scale must be finite and positive".to_string());
                }
            }
            Self::Between { min, max } => {
                if !(min.is_finite() && max.is_finite()) || min > max {
                    return Err("between requires finite min <= max".to_string());
                }
            }
        }
        Ok(())
    }
}

/// `margin / (margin + scale)`: zero at the threshold, approaching one.
fn saturate(margin: f64, scale: f64) -> f64 {
    margin / (margin + scale)
}

/// One predicate bound to a feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub feature: FeatureKey,
    #[serde(flatten)]
    pub predicate: Predicate,
}

/// One term of an entry's coverage formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageTerm {
    pub feature: FeatureKey,
    pub weight: f64,
}

/// Category of treatment a recommendation calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentKind {
    Insecticide,
    Miticide,
    Fungicide,
    Bactericide,
    Biological,
    Cultural,
}

impl TreatmentKind {
    /// Fixed application timing for this kind of treatment.
    #[must_use]
    pub const fn timing(self) -> &'static str {
        match self {
            Self::Insecticide | Self::Miticide | Self::Fungicide | Self::Bactericide => {
                "early_morning_or_late_evening"
            }
            Self::Biological => "late_afternoon",
            Self::Cultural => "immediately",
        }
    }
}

/// How to act on a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationTemplate {
    #[serde(rename = "type")]
    pub kind: TreatmentKind,
    /// Treatment target; defaults to the entry name.
    #[serde(default)]
    pub target: Option<String>,
    pub action: String,
}

/// A known pest or disease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub scientific_name: String,
    /// All must hold for the entry to match.
    pub conditions: Vec<Condition>,
    /// Affected-area percentage as a weighted sum of features, clamped
    /// to `[0, 100]`.
    pub coverage: Vec<CoverageTerm>,
    pub treatment: String,
    pub immediate_action: String,
    /// Economic impact for pests, spread risk for diseases.
    pub impact: String,
    pub recommendation: RecommendationTemplate,
}

impl CatalogEntry {
    /// Match strengths for every condition, or `None` if any fails.
    #[must_use]
    pub fn match_strengths(
        &self,
        features: &FeatureVector,
        metrics: &HealthMetrics,
    ) -> Option<Vec<f64>> {
        self.conditions
            .iter()
            .map(|c| c.predicate.strength(c.feature.value(features, metrics)))
            .collect()
    }

    /// Affected-area percentage implied by this entry's formula.
    #[must_use]
    pub fn coverage_percentage(&self, features: &FeatureVector, metrics: &HealthMetrics) -> f64 {
        self.coverage
            .iter()
            .map(|t| t.weight * t.feature.value(features, metrics))
            .sum::<f64>()
            .clamp(0.0, 100.0)
    }

    /// Recommendation target, falling back to the entry name.
    #[must_use]
    pub fn target(&self) -> &str {
        self.recommendation.target.as_deref().unwrap_or(&self.name)
    }
}

/// Weather bounds. Absent bounds are unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherRequirement {
    pub min_temperature_c: Option<f64>,
    pub max_temperature_c: Option<f64>,
    pub min_humidity: Option<f64>,
    pub max_humidity: Option<f64>,
    pub min_rainfall_mm: Option<f64>,
}

impl WeatherRequirement {
    /// `Some(true)` if every bound holds, `Some(false)` if any bound
    /// fails, `None` if a bounded reading is missing.
    #[must_use]
    pub fn evaluate(&self, weather: &WeatherConditions) -> Option<bool> {
        let checks = [
            (self.min_temperature_c, weather.temperature_c, true),
            (self.max_temperature_c, weather.temperature_c, false),
            (self.min_humidity, weather.relative_humidity, true),
            (self.max_humidity, weather.relative_humidity, false),
            (self.min_rainfall_mm, weather.rainfall_mm, true),
        ];
        let mut all_hold = true;
        for (bound, reading, is_min) in checks {
            let Some(bound) = bound else { continue };
            let reading = reading?;
            let holds = if is_min { reading >= bound } else { reading <= bound };
            all_hold &= holds;
        }
        Some(all_hold)
    }
}

/// A follow-on issue a detected finding makes likely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryEffect {
    /// Catalog entry name that triggers this effect.
    pub source: String,
    pub issue: String,
    /// Likelihood at moderate source severity.
    pub base_likelihood: Likelihood,
    pub timeframe: String,
    pub reason: String,
    pub prevention: String,
    /// Stages at which the effect applies; empty means all.
    #[serde(default)]
    pub stages: Vec<GrowthStage>,
    #[serde(default)]
    pub weather: Option<WeatherRequirement>,
}

/// An issue current weather alone makes likely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRisk {
    pub issue: String,
    pub requirement: WeatherRequirement,
    pub likelihood: Likelihood,
    pub timeframe: String,
    pub reason: String,
    pub prevention: String,
    #[serde(default)]
    pub stages: Vec<GrowthStage>,
}

/// Estimated treatment cost range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRange {
    pub min: f64,
    pub max: f64,
    pub currency: String,
    /// Area or quantity the range applies to, e.g. `"per_acre"`.
    pub unit: String,
}

/// The complete issue catalog.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub pests: Vec<CatalogEntry>,
    pub diseases: Vec<CatalogEntry>,
    pub secondary_effects: Vec<SecondaryEffect>,
    pub weather_risks: Vec<WeatherRisk>,
    /// Cost ranges keyed by recommendation target.
    pub costs: BTreeMap<String, CostRange>,
}

impl Catalog {
    /// The catalog shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Configuration`] if the embedded resource
    /// fails to parse or validate.
    pub fn builtin() -> Result<Self, AnalysisError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse and validate a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Configuration`] on malformed JSON or a
    /// table that fails [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let catalog: Self = serde_json::from_str(json)
            .map_err(|e| AnalysisError::Configuration(format!("catalog: {e}")))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check the tables for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Configuration`] naming the offending
    /// entry.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let mut names = HashSet::new();
        for entry in self.pests.iter().chain(&self.diseases) {
            let fail = |msg: &str| {
                AnalysisError::Configuration(format!("catalog entry '{}': {msg}", entry.name))
            };
            if entry.name.trim().is_empty() {
                return Err(AnalysisError::Configuration(
                    "catalog entry with empty name".to_string(),
                ));
            }
            if !names.insert(entry.name.to_lowercase()) {
                return Err(fail("duplicate name"));
            }
            if entry.conditions.is_empty() {
                return Err(fail("no conditions"));
            }
            if entry.coverage.is_empty() {
                return Err(fail("no coverage terms"));
            }
            for condition in &entry.conditions {
                condition.predicate.validate().map_err(|m| fail(&m))?;
            }
            if entry.coverage.iter().any(|t| !t.weight.is_finite()) {
                return Err(fail("coverage weight must be finite"));
            }
        }

        for effect in &self.secondary_effects {
            if !names.contains(&effect.source.to_lowercase()) {
                return Err(AnalysisError::Configuration(format!(
                    "secondary effect '{}' references unknown source '{}'",
                    effect.issue, effect.source
                )));
            }
        }

        for (target, cost) in &self.costs {
            if !(cost.min.is_finite() && cost.max.is_finite()) || cost.min < 0.0 || cost.min > cost.max
            {
                return Err(AnalysisError::Configuration(format!(
                    "cost range for '{target}' must satisfy 0 <= min <= max"
                )));
            }
        }
        Ok(())
    }

    /// Look up a pest entry by name (case-insensitive).
    #[must_use]
    pub fn pest(&self, name: &str) -> Option<&CatalogEntry> {
        self.pests.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Look up a disease entry by name (case-insensitive).
    #[must_use]
    pub fn disease(&self, name: &str) -> Option<&CatalogEntry> {
        self.diseases.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Secondary effects triggered by the named entry.
    pub fn effects_of<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a SecondaryEffect> {
        self.secondary_effects
            .iter()
            .filter(move |e| e.source.eq_ignore_ascii_case(source))
    }
}
