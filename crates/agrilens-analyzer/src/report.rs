//! Assembly of the final [`AnalysisReport`].

use serde::{Deserialize, Serialize};

use crate::detect::{DiseaseFinding, Finding, PestFinding};
use crate::growth::GrowthAssessment;
use crate::health::HealthMetrics;
use crate::predict::Prediction;
use crate::recommend::Recommendation;
use crate::types::{HealthStatus, Severity};

/// The complete result of one analysis.
///
/// Field names and nesting are a stable JSON contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub health_status: HealthStatus,
    pub risk_level: Severity,
    /// `[0, 1]`.
    pub confidence: f64,
    pub growth_stage: GrowthAssessment,
    pub health_metrics: HealthMetrics,
    pub detected_pests: Vec<PestFinding>,
    pub detected_diseases: Vec<DiseaseFinding>,
    pub predictions: Vec<Prediction>,
    pub recommendations: Vec<Recommendation>,
    pub immediate_actions: Vec<String>,
}

/// Combines the outputs of every stage into a report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportAssembler {
    /// Health scores strictly below this mark a plant at risk.
    pub at_risk_score: f64,
}

impl ReportAssembler {
    #[must_use]
    pub const fn new(at_risk_score: f64) -> Self {
        Self { at_risk_score }
    }

    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        &self,
        growth_stage: GrowthAssessment,
        health_metrics: HealthMetrics,
        detected_pests: Vec<PestFinding>,
        detected_diseases: Vec<DiseaseFinding>,
        predictions: Vec<Prediction>,
        recommendations: Vec<Recommendation>,
        quality_score: f64,
    ) -> AnalysisReport {
        let findings: Vec<&dyn Finding> = detected_pests
            .iter()
            .map(|f| f as &dyn Finding)
            .chain(detected_diseases.iter().map(|f| f as &dyn Finding))
            .collect();

        let risk_level = findings
            .iter()
            .map(|f| f.severity())
            .max()
            .unwrap_or(Severity::Low);

        let health_status = if findings.iter().any(|f| f.severity() >= Severity::High) {
            HealthStatus::Infected
        } else if !findings.is_empty() || health_metrics.health_score < self.at_risk_score {
            HealthStatus::AtRisk
        } else {
            HealthStatus::Healthy
        };

        let confidence = report_confidence(&findings, quality_score);

        let mut immediate_actions: Vec<String> = Vec::new();
        for finding in findings.iter().filter(|f| f.severity().is_urgent()) {
            let action = finding.immediate_action();
            if !action.is_empty() && !immediate_actions.iter().any(|a| a == action) {
                immediate_actions.push(action.to_string());
            }
        }

        AnalysisReport {
            health_status,
            risk_level,
            confidence,
            growth_stage,
            health_metrics,
            detected_pests,
            detected_diseases,
            predictions,
            recommendations,
            immediate_actions,
        }
    }
}

/// Mean finding confidence (1.0 with no findings) times image quality.
#[allow(clippy::cast_precision_loss)]
fn report_confidence(findings: &[&dyn Finding], quality_score: f64) -> f64 {
    let base = if findings.is_empty() {
        1.0
    } else {
        findings.iter().map(|f| f.confidence()).sum::<f64>() / findings.len() as f64
    };
    (base * quality_score.clamp(0.0, 1.0)).clamp(0.0, 1.0)
}
