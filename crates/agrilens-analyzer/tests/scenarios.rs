//! End-to-end scenarios through the public `Analyzer` API.

#![allow(clippy::unwrap_used)]

use agrilens_analyzer::catalog::Catalog;
use agrilens_analyzer::config::{DetectionConfig, HealthWeights};
use agrilens_analyzer::detect::{DiseaseDetector, PestDetector};
use agrilens_analyzer::features::{BucketStats, FeatureVector};
use agrilens_analyzer::types::{Likelihood, Severity};
use agrilens_analyzer::{
    AnalysisContext, AnalysisError, Analyzer, Detector, GrowthStage, HealthStatus, Identification,
    IdentificationError, IdentificationService, InvalidImageError, RgbImage, ValidationLedger,
    WeatherConditions,
};
use image::Rgb;

const LEAF: Rgb<u8> = Rgb([40, 140, 50]);
const LESION: Rgb<u8> = Rgb([90, 50, 20]);

fn uniform_leaf() -> RgbImage {
    RgbImage::from_pixel(128, 128, LEAF)
}

/// Leaf with a 3x3 grid of 14x14 brown lesions (about 10.8% browning,
/// nine large spots).
fn blighted_leaf() -> RgbImage {
    RgbImage::from_fn(128, 128, |x, y| {
        let in_lesion = |v: u32| v < 126 && (10..24).contains(&(v % 42));
        if in_lesion(x) && in_lesion(y) { LESION } else { LEAF }
    })
}

/// Leaf with white powder patches (about 11.8% pale) and a chlorotic
/// band along the bottom edge (about 3.1% yellowing).
fn mildewed_leaf() -> RgbImage {
    RgbImage::from_fn(128, 128, |x, y| {
        if y >= 124 {
            Rgb([220, 200, 60])
        } else if x % 32 < 11 && y % 32 < 11 {
            Rgb([238, 238, 232])
        } else {
            LEAF
        }
    })
}

fn analyzer() -> Analyzer {
    Analyzer::with_defaults().unwrap()
}

fn humid_context(hint: Option<GrowthStage>) -> AnalysisContext {
    AnalysisContext {
        weather: Some(WeatherConditions {
            temperature_c: Some(18.0),
            relative_humidity: Some(92.0),
            rainfall_mm: Some(4.0),
        }),
        growth_stage_hint: hint,
    }
}

#[test]
fn undamaged_leaf_is_healthy() {
    let report = analyzer()
        .analyze(&uniform_leaf(), None, &AnalysisContext::default())
        .unwrap();
    assert_eq!(report.health_status, HealthStatus::Healthy);
    assert_eq!(report.risk_level, Severity::Low);
    assert!(report.detected_pests.is_empty());
    assert!(report.detected_diseases.is_empty());
    assert!((report.health_metrics.health_score - 100.0).abs() < 1e-9);
    assert!((0.0..=1.0).contains(&report.confidence));
}

#[test]
fn black_image_is_invalid_not_a_zero_score() {
    let err = analyzer()
        .analyze(&RgbImage::new(128, 128), None, &AnalysisContext::default())
        .unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidImage(InvalidImageError::AllZero)));
}

#[test]
fn saturated_and_tiny_images_are_invalid() {
    let a = analyzer();
    let ctx = AnalysisContext::default();
    let white = RgbImage::from_pixel(128, 128, Rgb([255, 255, 255]));
    assert!(matches!(
        a.analyze(&white, None, &ctx),
        Err(AnalysisError::InvalidImage(InvalidImageError::AllSaturated))
    ));
    let tiny = RgbImage::from_pixel(63, 200, LEAF);
    assert!(matches!(
        a.analyze(&tiny, None, &ctx),
        Err(AnalysisError::InvalidImage(InvalidImageError::TooSmall { .. }))
    ));
}

#[test]
fn oversized_raw_dimensions_are_invalid() {
    let err = analyzer()
        .analyze_raw(u32::MAX, u32::MAX, 4, vec![0; 16], None, &AnalysisContext::default())
        .unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::InvalidImage(InvalidImageError::TooLarge { .. })
    ));
}

#[test]
fn blighted_leaf_reports_early_blight() {
    let report = analyzer()
        .analyze(&blighted_leaf(), None, &AnalysisContext::default())
        .unwrap();

    let blight = report
        .detected_diseases
        .iter()
        .find(|d| d.name == "Early Blight")
        .unwrap();
    assert_eq!(blight.severity, Severity::High);
    assert!((0.5..1.0).contains(&blight.confidence));

    assert_eq!(report.health_status, HealthStatus::Infected);
    assert!(report.risk_level >= Severity::High);
    assert_eq!(report.growth_stage.stage, GrowthStage::Vegetative);
    assert!(report.immediate_actions.contains(&blight.immediate_action));
    assert!(
        report
            .recommendations
            .iter()
            .any(|r| r.target == "Early Blight" && r.timing == "early_morning_or_late_evening")
    );
    assert!(report.predictions.iter().any(|p| p.issue == "Severe Defoliation"));
    assert!((0.0..=1.0).contains(&report.confidence));
}

#[test]
fn mildew_powder_does_not_read_as_flowering() {
    let report = analyzer()
        .analyze(&mildewed_leaf(), None, &AnalysisContext::default())
        .unwrap();

    assert!(report.detected_diseases.iter().any(|d| d.name == "Powdery Mildew"));
    assert_eq!(report.growth_stage.stage, GrowthStage::Vegetative);
    assert!(!report.growth_stage.has_flowers);
    // Fruit infection only follows mildew on flowering or fruiting plants.
    assert!(report.predictions.iter().all(|p| p.issue != "Fruit Infection"));
}

#[test]
fn analysis_is_idempotent() {
    let a = analyzer();
    let ctx = humid_context(None);
    let first = a.analyze(&blighted_leaf(), Some("tomato"), &ctx).unwrap();
    let second = a.analyze(&blighted_leaf(), Some("tomato"), &ctx).unwrap();
    assert_eq!(first, second);
}

#[test]
fn crop_hint_does_not_change_findings() {
    let a = analyzer();
    let ctx = AnalysisContext::default();
    let tomato = a.analyze(&blighted_leaf(), Some("tomato"), &ctx).unwrap();
    let maize = a.analyze(&blighted_leaf(), Some("maize"), &ctx).unwrap();
    let none = a.analyze(&blighted_leaf(), None, &ctx).unwrap();
    assert_eq!(tomato.detected_pests, maize.detected_pests);
    assert_eq!(tomato.detected_diseases, maize.detected_diseases);
    assert_eq!(tomato.detected_diseases, none.detected_diseases);
}

#[test]
fn growth_stage_hint_drives_predictions_only() {
    let a = analyzer();
    let classified = a.analyze(&blighted_leaf(), None, &humid_context(None)).unwrap();
    let hinted = a
        .analyze(&blighted_leaf(), None, &humid_context(Some(GrowthStage::Fruiting)))
        .unwrap();

    assert_eq!(hinted.growth_stage, classified.growth_stage);
    assert!(classified.predictions.iter().all(|p| p.issue != "Fruit Rot"));
    let rot = hinted.predictions.iter().find(|p| p.issue == "Fruit Rot").unwrap();
    // High severity and humid weather both promote.
    assert_eq!(rot.likelihood, Likelihood::High);
}

#[test]
fn weather_risk_reported_for_healthy_leaf() {
    let report = analyzer()
        .analyze(&uniform_leaf(), None, &humid_context(None))
        .unwrap();
    assert_eq!(report.health_status, HealthStatus::Healthy);
    let blight = report
        .predictions
        .iter()
        .find(|p| p.issue == "Late Blight")
        .unwrap();
    assert_eq!(blight.likelihood, Likelihood::High);
}

#[test]
fn aphid_feature_scenario() {
    let catalog = Catalog::builtin().unwrap();
    let config = DetectionConfig::default();
    let features = FeatureVector {
        green: BucketStats {
            fraction: 0.08,
            ..BucketStats::default()
        },
        yellow_orange: BucketStats {
            fraction: 0.03,
            ..BucketStats::default()
        },
        brown_black: BucketStats {
            fraction: 0.01,
            ..BucketStats::default()
        },
        edge_density: 0.15,
        spot_count: 12,
        spot_sizes: agrilens_analyzer::blob::SpotHistogram {
            small: 10,
            medium: 2,
            large: 0,
        },
        ..FeatureVector::default()
    };
    let metrics = agrilens_analyzer::health::compute(&features, &HealthWeights::default());

    let pests = PestDetector::new(&catalog.pests, &config).detect(&features, &metrics);
    assert_eq!(pests.len(), 1);
    assert_eq!(pests[0].name, "Aphids");
    assert_eq!(pests[0].severity, Severity::Moderate);
    assert!((0.5..=1.0).contains(&pests[0].confidence));
    assert!(
        DiseaseDetector::new(&catalog.diseases, &config)
            .detect(&features, &metrics)
            .is_empty()
    );
}

struct ConfirmingService;

impl IdentificationService for ConfirmingService {
    fn identify(
        &self,
        _image: &RgbImage,
        _crop_hint: Option<&str>,
    ) -> Result<Vec<Identification>, IdentificationError> {
        Ok(vec![
            Identification {
                name: "early blight".to_string(),
                confidence: 1.0,
            },
            Identification {
                name: "Desert Locust".to_string(),
                confidence: 0.9,
            },
        ])
    }
}

struct BrokenService;

impl IdentificationService for BrokenService {
    fn identify(
        &self,
        _image: &RgbImage,
        _crop_hint: Option<&str>,
    ) -> Result<Vec<Identification>, IdentificationError> {
        Err(IdentificationError::Unavailable("connection refused".to_string()))
    }
}

#[test]
fn identification_confirms_local_finding() {
    let ctx = AnalysisContext::default();
    let local = analyzer().analyze(&blighted_leaf(), None, &ctx).unwrap();
    let confirmed = analyzer()
        .with_identification(ConfirmingService)
        .analyze(&blighted_leaf(), Some("tomato"), &ctx)
        .unwrap();

    let before = local.detected_diseases.iter().find(|d| d.name == "Early Blight").unwrap();
    let after = confirmed.detected_diseases.iter().find(|d| d.name == "Early Blight").unwrap();
    assert!((after.confidence - f64::midpoint(before.confidence, 1.0)).abs() < 1e-12);
    // Remote-only names never become findings.
    assert_eq!(local.detected_pests.len(), confirmed.detected_pests.len());
    assert_eq!(local.detected_diseases.len(), confirmed.detected_diseases.len());
}

#[test]
fn identification_failure_degrades_to_local_result() {
    let ctx = AnalysisContext::default();
    let local = analyzer().analyze(&blighted_leaf(), None, &ctx).unwrap();
    let degraded = analyzer()
        .with_identification(BrokenService)
        .analyze(&blighted_leaf(), None, &ctx)
        .unwrap();
    assert_eq!(local, degraded);
}

#[test]
fn concurrent_analyses_agree() {
    let a = analyzer();
    let image = blighted_leaf();
    let ctx = AnalysisContext::default();
    let expected = a.analyze(&image, None, &ctx).unwrap();
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| a.analyze(&image, None, &ctx).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn ledger_accuracy_is_exact_under_concurrency() {
    const THREADS: usize = 6;
    const PER_THREAD: usize = 200;
    let ledger = ValidationLedger::new();
    std::thread::scope(|s| {
        for t in 0..THREADS {
            let ledger = &ledger;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    // Every third record is correct.
                    let actual = if (t * PER_THREAD + i) % 3 == 0 { "Late Blight" } else { "Early Blight" };
                    ledger.record("Late Blight", actual, 0.8);
                    ledger.record("Rust", "Rust", 0.6);
                }
            });
        }
    });

    let report = ledger.report();
    let blight = report.labels["late blight"];
    let n = (THREADS * PER_THREAD) as u64;
    assert_eq!(blight.total, n);
    assert_eq!(blight.correct, 400);
    assert!((blight.accuracy - 400.0 / 1200.0).abs() < f64::EPSILON);
    assert_eq!(report.labels["rust"].correct, n);
}
