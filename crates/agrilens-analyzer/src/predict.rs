//! Predictions of follow-on issues.
//!
//! Two sources feed the prediction list:
//!
//! 1. **Secondary effects** of each finding, looked up by name in the
//!    catalog. The base likelihood is scaled by the finding's severity
//!    and, when the effect has a weather requirement and weather is
//!    known, promoted or demoted by whether the requirement holds.
//! 2. **Weather risks** that current conditions alone make likely.
//!    Issues already detected or already predicted are skipped.
//!
//! Findings without catalog effects contribute nothing.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, SecondaryEffect};
use crate::detect::Finding;
use crate::types::{GrowthStage, Likelihood, Severity, WeatherConditions};

/// A predicted future issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub issue: String,
    pub likelihood: Likelihood,
    pub timeframe: String,
    pub reason: String,
    pub prevention: String,
}

/// Inputs beyond the findings themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionContext {
    /// Classified stage, or the caller's hint when one was given.
    pub growth_stage: GrowthStage,
    pub weather: Option<WeatherConditions>,
}

/// Catalog-driven prediction engine.
#[derive(Debug, Clone, Copy)]
pub struct PredictionEngine<'a> {
    catalog: &'a Catalog,
}

impl<'a> PredictionEngine<'a> {
    #[must_use]
    pub const fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Predict follow-on issues for the given findings.
    ///
    /// The same issue reached from several findings is reported once,
    /// at the highest likelihood any of them implies.
    #[must_use]
    pub fn predict(&self, findings: &[&dyn Finding], context: &PredictionContext) -> Vec<Prediction> {
        let mut predictions: Vec<Prediction> = Vec::new();

        for finding in findings {
            for effect in self.catalog.effects_of(finding.name()) {
                if !applies_at(&effect.stages, context.growth_stage) {
                    continue;
                }
                let likelihood = effect_likelihood(effect, finding.severity(), context.weather.as_ref());
                merge(&mut predictions, Prediction {
                    issue: effect.issue.clone(),
                    likelihood,
                    timeframe: effect.timeframe.clone(),
                    reason: effect.reason.clone(),
                    prevention: effect.prevention.clone(),
                });
            }
        }

        if let Some(weather) = context.weather.as_ref() {
            for risk in &self.catalog.weather_risks {
                if !applies_at(&risk.stages, context.growth_stage)
                    || risk.requirement.evaluate(weather) != Some(true)
                {
                    continue;
                }
                let detected = findings.iter().any(|f| f.name().eq_ignore_ascii_case(&risk.issue));
                let predicted = predictions
                    .iter()
                    .any(|p| p.issue.eq_ignore_ascii_case(&risk.issue));
                if detected || predicted {
                    continue;
                }
                predictions.push(Prediction {
                    issue: risk.issue.clone(),
                    likelihood: risk.likelihood,
                    timeframe: risk.timeframe.clone(),
                    reason: risk.reason.clone(),
                    prevention: risk.prevention.clone(),
                });
            }
        }

        tracing::debug!(count = predictions.len(), stage = context.growth_stage.as_str(), "predictions");
        predictions
    }
}

/// Empty stage lists apply everywhere.
fn applies_at(stages: &[GrowthStage], stage: GrowthStage) -> bool {
    stages.is_empty() || stages.contains(&stage)
}

fn effect_likelihood(
    effect: &SecondaryEffect,
    severity: Severity,
    weather: Option<&WeatherConditions>,
) -> Likelihood {
    let scaled = match severity {
        Severity::Low => effect.base_likelihood.demote(),
        Severity::Moderate => effect.base_likelihood,
        Severity::High | Severity::Critical => effect.base_likelihood.promote(),
    };
    let outcome = effect
        .weather
        .as_ref()
        .zip(weather)
        .and_then(|(requirement, weather)| requirement.evaluate(weather));
    match outcome {
        Some(true) => scaled.promote(),
        Some(false) => scaled.demote(),
        None => scaled,
    }
}

fn merge(predictions: &mut Vec<Prediction>, prediction: Prediction) {
    match predictions
        .iter_mut()
        .find(|p| p.issue.eq_ignore_ascii_case(&prediction.issue))
    {
        Some(existing) if prediction.likelihood > existing.likelihood => *existing = prediction,
        Some(_) => {}
        None => predictions.push(prediction),
    }
}
