//! Pest and disease detection against the catalog.
//!
//! Both detectors share one matcher: an entry matches when every one of
//! its conditions holds. Its confidence grows with how far the features
//! clear the thresholds, and its severity comes from the coverage
//! formula. Matches below the confidence floor are dropped. Several
//! entries may match the same image; co-occurring findings are normal.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;
use crate::config::DetectionConfig;
use crate::features::FeatureVector;
use crate::health::HealthMetrics;
use crate::types::Severity;

/// Which detector produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Pest,
    Disease,
}

/// Common view over pest and disease findings.
pub trait Finding {
    fn kind(&self) -> FindingKind;
    fn name(&self) -> &str;
    fn severity(&self) -> Severity;
    fn confidence(&self) -> f64;
    fn immediate_action(&self) -> &str;
    fn set_confidence(&mut self, confidence: f64);
}

/// A detected pest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PestFinding {
    pub name: String,
    pub scientific_name: String,
    pub severity: Severity,
    /// `(0, 1)`.
    pub confidence: f64,
    /// `[0, 100]`.
    pub coverage_percentage: f64,
    pub treatment: String,
    pub immediate_action: String,
    pub economic_impact: String,
}

/// A detected disease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseFinding {
    pub name: String,
    pub scientific_name: String,
    pub severity: Severity,
    /// `(0, 1)`.
    pub confidence: f64,
    /// `[0, 100]`.
    pub affected_area_percentage: f64,
    pub treatment: String,
    pub immediate_action: String,
    pub spread_risk: String,
}

macro_rules! impl_finding {
    ($ty:ty, $kind:expr) => {
        impl Finding for $ty {
            fn kind(&self) -> FindingKind {
                $kind
            }
            fn name(&self) -> &str {
                &self.name
            }
            fn severity(&self) -> Severity {
                self.severity
            }
            fn confidence(&self) -> f64 {
                self.confidence
            }
            fn immediate_action(&self) -> &str {
                &self.immediate_action
            }
            fn set_confidence(&mut self, confidence: f64) {
                self.confidence = confidence.clamp(0.0, 1.0);
            }
        }
    };
}

impl_finding!(PestFinding, FindingKind::Pest);
impl_finding!(DiseaseFinding, FindingKind::Disease);

/// Trait for catalog-backed detectors.
///
/// Input: the feature vector and health metrics of one image.
/// Output: every match above the confidence floor, most severe first,
/// ties broken by confidence and then catalog order.
pub trait Detector {
    type Finding: Finding;

    fn detect(&self, features: &FeatureVector, metrics: &HealthMetrics) -> Vec<Self::Finding>;
}

/// Detects pests from the catalog's pest table.
#[derive(Debug, Clone, Copy)]
pub struct PestDetector<'a> {
    entries: &'a [CatalogEntry],
    config: &'a DetectionConfig,
}

impl<'a> PestDetector<'a> {
    #[must_use]
    pub const fn new(entries: &'a [CatalogEntry], config: &'a DetectionConfig) -> Self {
        Self { entries, config }
    }
}

impl Detector for PestDetector<'_> {
    type Finding = PestFinding;

    fn detect(&self, features: &FeatureVector, metrics: &HealthMetrics) -> Vec<PestFinding> {
        match_entries(self.entries, features, metrics, self.config)
            .into_iter()
            .map(|m| PestFinding {
                name: m.entry.name.clone(),
                scientific_name: m.entry.scientific_name.clone(),
                severity: m.severity,
                confidence: m.confidence,
                coverage_percentage: m.coverage,
                treatment: m.entry.treatment.clone(),
                immediate_action: m.entry.immediate_action.clone(),
                economic_impact: m.entry.impact.clone(),
            })
            .collect()
    }
}

/// Detects diseases from the catalog's disease table.
#[derive(Debug, Clone, Copy)]
pub struct DiseaseDetector<'a> {
    entries: &'a [CatalogEntry],
    config: &'a DetectionConfig,
}

impl<'a> DiseaseDetector<'a> {
    #[must_use]
    pub const fn new(entries: &'a [CatalogEntry], config: &'a DetectionConfig) -> Self {
        Self { entries, config }
    }
}

impl Detector for DiseaseDetector<'_> {
    type Finding = DiseaseFinding;

    fn detect(&self, features: &FeatureVector, metrics: &HealthMetrics) -> Vec<DiseaseFinding> {
        match_entries(self.entries, features, metrics, self.config)
            .into_iter()
            .map(|m| DiseaseFinding {
                name: m.entry.name.clone(),
                scientific_name: m.entry.scientific_name.clone(),
                severity: m.severity,
                confidence: m.confidence,
                affected_area_percentage: m.coverage,
                treatment: m.entry.treatment.clone(),
                immediate_action: m.entry.immediate_action.clone(),
                spread_risk: m.entry.impact.clone(),
            })
            .collect()
    }
}

/// One catalog entry that matched.
struct Match<'a> {
    entry: &'a CatalogEntry,
    /// Declaration position in the catalog table.
    rank: usize,
    confidence: f64,
    coverage: f64,
    severity: Severity,
}

/// Map the mean condition strength onto `[base, ceiling]`.
#[allow(clippy::cast_precision_loss)]
fn confidence(strengths: &[f64], config: &DetectionConfig) -> f64 {
    let mean = if strengths.is_empty() {
        0.0
    } else {
        strengths.iter().sum::<f64>() / strengths.len() as f64
    };
    (config.confidence_ceiling - config.confidence_base)
        .mul_add(mean, config.confidence_base)
        .clamp(0.0, 1.0)
}

/// Severity descending, then confidence descending, then catalog rank.
fn finding_order(
    (a_severity, a_confidence, a_rank): (Severity, f64, usize),
    (b_severity, b_confidence, b_rank): (Severity, f64, usize),
) -> Ordering {
    b_severity
        .cmp(&a_severity)
        .then_with(|| b_confidence.total_cmp(&a_confidence))
        .then_with(|| a_rank.cmp(&b_rank))
}

fn match_entries<'a>(
    entries: &'a [CatalogEntry],
    features: &FeatureVector,
    metrics: &HealthMetrics,
    config: &DetectionConfig,
) -> Vec<Match<'a>> {
    let mut matches: Vec<Match<'a>> = entries
        .iter()
        .enumerate()
        .filter_map(|(rank, entry)| {
            let strengths = entry.match_strengths(features, metrics)?;
            let confidence = confidence(&strengths, config);
            if confidence < config.min_confidence {
                tracing::debug!(name = %entry.name, confidence, "match below confidence floor");
                return None;
            }
            let coverage = entry.coverage_percentage(features, metrics);
            Some(Match {
                entry,
                rank,
                confidence,
                coverage,
                severity: config.severity.classify(coverage),
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        finding_order(
            (a.severity, a.confidence, a.rank),
            (b.severity, b.confidence, b.rank),
        )
    });
    matches
}

/// Re-order findings after their confidences change (e.g. an
/// identification cross-check).
///
/// Same order as [`Detector::detect`]: severity then confidence, both
/// descending, ties in the declaration order of `entries`. Findings
/// whose name is not in `entries` sort after those that are.
pub fn sort_findings<F: Finding>(findings: &mut [F], entries: &[CatalogEntry]) {
    let rank = |finding: &F| {
        entries
            .iter()
            .position(|entry| entry.name == finding.name())
            .unwrap_or(usize::MAX)
    };
    findings.sort_by(|a, b| {
        finding_order(
            (a.severity(), a.confidence(), rank(a)),
            (b.severity(), b.confidence(), rank(b)),
        )
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::blob::SpotHistogram;
    use crate::catalog::Catalog;
    use crate::config::HealthWeights;
    use crate::features::BucketStats;

    fn stats(fraction: f64) -> BucketStats {
        BucketStats {
            fraction,
            ..BucketStats::default()
        }
    }

    /// Green 0.08, 12 spots, edge density 0.15, yellowing 3%, browning 1%.
    fn aphid_features() -> FeatureVector {
        FeatureVector {
            green: stats(0.08),
            yellow_orange: stats(0.03),
            brown_black: stats(0.01),
            edge_density: 0.15,
            spot_count: 12,
            spot_sizes: SpotHistogram {
                small: 10,
                medium: 2,
                large: 0,
            },
            mean_spot_area: 9.0,
            chlorophyll_index: 0.35,
            vegetation_fraction: 0.08,
            ..FeatureVector::default()
        }
    }

    fn healthy_features() -> FeatureVector {
        FeatureVector {
            green: stats(0.9),
            chlorophyll_index: 0.5,
            edge_density: 0.02,
            vegetation_fraction: 0.9,
            ..FeatureVector::default()
        }
    }

    fn run(features: &FeatureVector) -> (Vec<PestFinding>, Vec<DiseaseFinding>) {
        let catalog = Catalog::builtin().unwrap();
        let config = DetectionConfig::default();
        let metrics = crate::health::compute(features, &HealthWeights::default());
        let pests = PestDetector::new(&catalog.pests, &config).detect(features, &metrics);
        let diseases = DiseaseDetector::new(&catalog.diseases, &config).detect(features, &metrics);
        (pests, diseases)
    }

    #[test]
    fn aphid_scenario_yields_one_moderate_aphid_finding() {
        let (pests, diseases) = run(&aphid_features());
        assert_eq!(pests.len(), 1, "pests: {pests:?}");
        let aphids = &pests[0];
        assert_eq!(aphids.name, "Aphids");
        assert_eq!(aphids.severity, Severity::Moderate);
        assert!((0.5..=1.0).contains(&aphids.confidence), "{}", aphids.confidence);
        assert!(diseases.is_empty(), "diseases: {diseases:?}");
    }

    #[test]
    fn undamaged_features_match_nothing() {
        let (pests, diseases) = run(&healthy_features());
        assert!(pests.is_empty());
        assert!(diseases.is_empty());
    }

    #[test]
    fn confidence_is_graduated() {
        let config = DetectionConfig::default();
        let weak = confidence(&[0.05, 0.1], &config);
        let strong = confidence(&[0.8, 0.9], &config);
        assert!(weak < strong);
        assert!(weak > 0.0 && strong < 1.0);
    }

    #[test]
    fn confidence_floor_drops_weak_matches() {
        let catalog = Catalog::builtin().unwrap();
        let strict = DetectionConfig {
            min_confidence: 0.9,
            ..DetectionConfig::default()
        };
        let features = aphid_features();
        let metrics = crate::health::compute(&features, &HealthWeights::default());
        let pests = PestDetector::new(&catalog.pests, &strict).detect(&features, &metrics);
        assert!(pests.is_empty());
    }

    #[test]
    fn co_occurring_findings_sorted_by_severity() {
        // Heavy browning with large lesions and many spots.
        let features = FeatureVector {
            green: stats(0.5),
            yellow_orange: stats(0.02),
            brown_black: stats(0.25),
            edge_density: 0.12,
            spot_count: 30,
            spot_sizes: SpotHistogram {
                small: 20,
                medium: 6,
                large: 4,
            },
            chlorophyll_index: 0.2,
            ..FeatureVector::default()
        };
        let (_, diseases) = run(&features);
        assert!(diseases.len() >= 2, "diseases: {diseases:?}");
        for pair in diseases.windows(2) {
            assert!(
                finding_order(
                    (pair[0].severity, pair[0].confidence, 0),
                    (pair[1].severity, pair[1].confidence, 0),
                ) != Ordering::Greater
            );
        }
    }

    fn disease(name: &str, severity: Severity, confidence: f64) -> DiseaseFinding {
        DiseaseFinding {
            name: name.to_string(),
            scientific_name: String::new(),
            severity,
            confidence,
            affected_area_percentage: 20.0,
            treatment: String::new(),
            immediate_action: String::new(),
            spread_risk: String::new(),
        }
    }

    fn names(findings: &[DiseaseFinding]) -> Vec<&str> {
        findings.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn equal_findings_follow_catalog_order() {
        let catalog = Catalog::builtin().unwrap();
        let mut findings = vec![
            disease("Late Blight", Severity::High, 0.6),
            disease("Early Blight", Severity::High, 0.6),
        ];
        sort_findings(&mut findings, &catalog.diseases);
        assert_eq!(names(&findings), ["Early Blight", "Late Blight"]);
    }

    #[test]
    fn resort_after_cross_check_uses_catalog_order() {
        let catalog = Catalog::builtin().unwrap();
        let mut findings = vec![
            disease("Late Blight", Severity::High, 0.7),
            disease("Early Blight", Severity::High, 0.6),
        ];
        let remote = [crate::identify::Identification {
            name: "Late Blight".to_string(),
            confidence: 0.5,
        }];
        assert_eq!(crate::identify::cross_check(&mut findings, &remote), 1);
        sort_findings(&mut findings, &catalog.diseases);
        assert_eq!(names(&findings), ["Early Blight", "Late Blight"]);
        assert!((findings[1].confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn severity_and_confidence_outrank_catalog_order() {
        let catalog = Catalog::builtin().unwrap();
        let mut findings = vec![
            disease("Early Blight", Severity::Moderate, 0.9),
            disease("Mosaic Virus", Severity::High, 0.55),
            disease("Late Blight", Severity::High, 0.8),
            disease("Unlisted Wilt", Severity::High, 0.55),
        ];
        sort_findings(&mut findings, &catalog.diseases);
        assert_eq!(
            names(&findings),
            ["Late Blight", "Mosaic Virus", "Unlisted Wilt", "Early Blight"]
        );
    }

    #[test]
    fn set_confidence_clamps() {
        let (mut pests, _) = run(&aphid_features());
        pests[0].set_confidence(1.7);
        assert!((pests[0].confidence() - 1.0).abs() < f64::EPSILON);
        assert_eq!(pests[0].kind(), FindingKind::Pest);
    }
}
