//! agrilens-analyzer: Explainable crop health analysis (sans-IO).
//!
//! Turns a plot photograph into an [`AnalysisReport`] through:
//! feature extraction -> growth stage -> health metrics -> pest and
//! disease detection -> optional identification cross-check ->
//! predictions -> recommendations -> report assembly.
//!
//! Every stage is deterministic rule and threshold logic driven by an
//! [`AnalyzerConfig`] and a data-driven [`Catalog`]. This crate has
//! **no I/O dependencies**: it operates on in-memory rasters or byte
//! slices and returns structured data. File and network access live in
//! `agrilens-cli` and in caller-supplied [`IdentificationService`]s.

pub mod blob;
pub mod catalog;
pub mod color;
pub mod config;
pub mod detect;
pub mod diagnostics;
pub mod edge;
pub mod features;
pub mod growth;
pub mod health;
pub mod identify;
pub mod ledger;
pub mod predict;
pub mod raster;
pub mod recommend;
pub mod report;
pub mod sharpness;
pub mod types;

use serde::{Deserialize, Serialize};

pub use catalog::Catalog;
pub use config::AnalyzerConfig;
pub use detect::{Detector, DiseaseFinding, Finding, FindingKind, PestFinding};
pub use diagnostics::{AnalysisDiagnostics, Clock, NoopClock};
pub use identify::{Identification, IdentificationError, IdentificationService, NoIdentification};
pub use ledger::{AccuracyReport, ValidationLedger};
pub use report::AnalysisReport;
pub use types::{
    AnalysisContext, AnalysisError, GrowthStage, HealthStatus, InvalidImageError, RgbImage,
    Severity, WeatherConditions,
};

use crate::detect::{DiseaseDetector, PestDetector};
use crate::diagnostics::{AnalysisSummary, StageDiagnostics, StageMetrics, StageTimer};
use crate::predict::{PredictionContext, PredictionEngine};
use crate::recommend::RecommendationEngine;
use crate::report::ReportAssembler;

/// One detector the analyzer can report, for capability queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorInfo {
    pub name: String,
    pub kind: FindingKind,
    pub scientific_name: String,
}

/// A validated configuration and catalog, ready to analyze images.
///
/// Holds no per-analysis state: `&Analyzer` may be shared across threads
/// and used for concurrent analyses.
pub struct Analyzer {
    config: AnalyzerConfig,
    catalog: Catalog,
    identification: Box<dyn IdentificationService>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .field("pests", &self.catalog.pests.len())
            .field("diseases", &self.catalog.diseases.len())
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    /// Validate `config` and `catalog` and build an analyzer.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Configuration`] if either fails
    /// validation.
    pub fn new(config: AnalyzerConfig, catalog: Catalog) -> Result<Self, AnalysisError> {
        config.validate()?;
        catalog.validate()?;
        Ok(Self {
            config,
            catalog,
            identification: Box::new(NoIdentification),
        })
    }

    /// Default configuration with the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Configuration`] if the embedded catalog
    /// is malformed.
    pub fn with_defaults() -> Result<Self, AnalysisError> {
        Self::new(AnalyzerConfig::default(), Catalog::builtin()?)
    }

    /// Replace the identification collaborator.
    #[must_use]
    pub fn with_identification(mut self, service: impl IdentificationService + 'static) -> Self {
        self.identification = Box::new(service);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Every pest and disease this analyzer can detect, pests first, in
    /// catalog order.
    #[must_use]
    pub fn list_supported_detectors(&self) -> Vec<DetectorInfo> {
        let info = |kind: FindingKind| {
            move |e: &catalog::CatalogEntry| DetectorInfo {
                name: e.name.clone(),
                kind,
                scientific_name: e.scientific_name.clone(),
            }
        };
        self.catalog
            .pests
            .iter()
            .map(info(FindingKind::Pest))
            .chain(self.catalog.diseases.iter().map(info(FindingKind::Disease)))
            .collect()
    }

    /// Analyze one decoded raster.
    ///
    /// # Pipeline steps
    ///
    /// 1. Validate the raster and extract features
    /// 2. Classify the growth stage
    /// 3. Compute health metrics
    /// 4. Match pest and disease catalogs
    /// 5. Cross-check with the identification service (failures ignored)
    /// 6. Predict secondary effects and weather risks
    /// 7. Build deduplicated recommendations
    /// 8. Assemble the report
    ///
    /// `crop_hint` is passed to the identification service only; it
    /// never changes local thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidImage`] if the raster is too small
    /// or degenerate. No partial report is returned.
    pub fn analyze(
        &self,
        image: &RgbImage,
        crop_hint: Option<&str>,
        context: &AnalysisContext,
    ) -> Result<AnalysisReport, AnalysisError> {
        let timer = StageTimer::start(&NoopClock);
        self.run(&timer, image, crop_hint, context, None)
            .map(|(report, _)| report)
    }

    /// Decode encoded image bytes (PNG, JPEG, BMP, WebP) and analyze them.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidImage`] if the bytes are empty,
    /// undecodable, or decode to an unusable raster.
    pub fn analyze_bytes(
        &self,
        bytes: &[u8],
        crop_hint: Option<&str>,
        context: &AnalysisContext,
    ) -> Result<AnalysisReport, AnalysisError> {
        let image = raster::decode(bytes)?;
        self.analyze(&image, crop_hint, context)
    }

    /// Analyze a raw 8-bit RGB or RGBA buffer.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidImage`] if the channel count or
    /// buffer length is wrong, or the raster is unusable.
    pub fn analyze_raw(
        &self,
        width: u32,
        height: u32,
        channels: u8,
        data: Vec<u8>,
        crop_hint: Option<&str>,
        context: &AnalysisContext,
    ) -> Result<AnalysisReport, AnalysisError> {
        let image = raster::from_raw(width, height, channels, data)?;
        self.analyze(&image, crop_hint, context)
    }

    /// Like [`analyze`](Self::analyze), also returning per-stage timings
    /// measured with `clock`.
    ///
    /// # Errors
    ///
    /// Same as [`analyze`](Self::analyze).
    pub fn analyze_with_diagnostics<C: Clock>(
        &self,
        image: &RgbImage,
        crop_hint: Option<&str>,
        context: &AnalysisContext,
        clock: &C,
    ) -> Result<(AnalysisReport, AnalysisDiagnostics), AnalysisError> {
        let timer = StageTimer::start(clock);
        self.run(&timer, image, crop_hint, context, None)
    }

    /// Like [`analyze_bytes`](Self::analyze_bytes), also returning
    /// per-stage timings including decode.
    ///
    /// # Errors
    ///
    /// Same as [`analyze_bytes`](Self::analyze_bytes).
    pub fn analyze_bytes_with_diagnostics<C: Clock>(
        &self,
        bytes: &[u8],
        crop_hint: Option<&str>,
        context: &AnalysisContext,
        clock: &C,
    ) -> Result<(AnalysisReport, AnalysisDiagnostics), AnalysisError> {
        let timer = StageTimer::start(clock);
        let (image, duration) = timer.time(|| raster::decode(bytes));
        let image = image?;
        let (width, height) = image.dimensions();
        let decode = StageDiagnostics {
            duration,
            metrics: StageMetrics::Decode {
                input_bytes: bytes.len(),
                width,
                height,
                pixel_count: u64::from(width) * u64::from(height),
            },
        };
        self.run(&timer, &image, crop_hint, context, Some(decode))
    }

    fn run<C: Clock>(
        &self,
        timer: &StageTimer<'_, C>,
        image: &RgbImage,
        crop_hint: Option<&str>,
        context: &AnalysisContext,
        decode: Option<StageDiagnostics>,
    ) -> Result<(AnalysisReport, AnalysisDiagnostics), AnalysisError> {
        let config = &self.config;

        // ─── Stage 1: feature extraction ────────────────────────────
        let (features, duration) = timer.time(|| features::extract(image, &config.extraction));
        let features = features?;
        let extraction = StageDiagnostics {
            duration,
            metrics: StageMetrics::Extraction {
                edge_density: features.edge_density,
                spot_count: features.spot_count,
                sharpness: features.sharpness,
                quality_score: features.quality_score,
            },
        };

        // ─── Stage 2: growth stage ──────────────────────────────────
        let (growth_stage, duration) = timer.time(|| growth::assess(&features, &config.growth));
        let growth = StageDiagnostics {
            duration,
            metrics: StageMetrics::Growth {
                stage: growth_stage.stage,
                vegetation_coverage: growth_stage.vegetation_coverage,
            },
        };

        // ─── Stage 3: health metrics ────────────────────────────────
        let (metrics, duration) = timer.time(|| health::compute(&features, &config.health));
        let health = StageDiagnostics {
            duration,
            metrics: StageMetrics::Health {
                health_score: metrics.health_score,
                vigor: metrics.vigor,
            },
        };

        // ─── Stage 4: detection ─────────────────────────────────────
        let ((mut pests, mut diseases), duration) = timer.time(|| {
            let pests =
                PestDetector::new(&self.catalog.pests, &config.detection).detect(&features, &metrics);
            let diseases = DiseaseDetector::new(&self.catalog.diseases, &config.detection)
                .detect(&features, &metrics);
            (pests, diseases)
        });
        let detection = StageDiagnostics {
            duration,
            metrics: StageMetrics::Detection {
                entries_evaluated: self.catalog.pests.len() + self.catalog.diseases.len(),
                pest_count: pests.len(),
                disease_count: diseases.len(),
            },
        };

        // ─── Stage 5: identification cross-check ────────────────────
        let ((identified, adjusted, failed), duration) = timer.time(|| {
            match self.identification.identify(image, crop_hint) {
                Ok(ids) => {
                    let adjusted =
                        identify::cross_check(&mut pests, &ids) + identify::cross_check(&mut diseases, &ids);
                    if adjusted > 0 {
                        detect::sort_findings(&mut pests, &self.catalog.pests);
                        detect::sort_findings(&mut diseases, &self.catalog.diseases);
                    }
                    (ids.len(), adjusted, false)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "identification failed, keeping local findings");
                    (0, 0, true)
                }
            }
        });
        let identification = StageDiagnostics {
            duration,
            metrics: StageMetrics::Identification {
                identified,
                adjusted,
                failed,
            },
        };

        // ─── Stage 6: predictions ───────────────────────────────────
        let prediction_context = PredictionContext {
            growth_stage: context.growth_stage_hint.unwrap_or(growth_stage.stage),
            weather: context.weather,
        };
        let (predictions, duration) = timer.time(|| {
            let findings: Vec<&dyn Finding> = pests
                .iter()
                .map(|f| f as &dyn Finding)
                .chain(diseases.iter().map(|f| f as &dyn Finding))
                .collect();
            PredictionEngine::new(&self.catalog).predict(&findings, &prediction_context)
        });
        let prediction = StageDiagnostics {
            duration,
            metrics: StageMetrics::Prediction {
                stage: prediction_context.growth_stage,
                prediction_count: predictions.len(),
            },
        };

        // ─── Stage 7: recommendations ───────────────────────────────
        let (recommendations, duration) =
            timer.time(|| RecommendationEngine::new(&self.catalog).recommend(&pests, &diseases));
        let recommendation = StageDiagnostics {
            duration,
            metrics: StageMetrics::Recommendation {
                recommendation_count: recommendations.len(),
            },
        };

        // ─── Stage 8: assembly ──────────────────────────────────────
        let summary = AnalysisSummary {
            image_width: features.width,
            image_height: features.height,
            pixel_count: u64::from(features.width) * u64::from(features.height),
            pest_count: pests.len(),
            disease_count: diseases.len(),
            prediction_count: predictions.len(),
            recommendation_count: recommendations.len(),
        };
        let (report, duration) = timer.time(|| {
            ReportAssembler::new(config.health.at_risk_score).assemble(
                growth_stage,
                metrics,
                pests,
                diseases,
                predictions,
                recommendations,
                features.quality_score,
            )
        });
        let assembly = StageDiagnostics {
            duration,
            metrics: StageMetrics::Assembly {
                health_status: report.health_status,
                confidence: report.confidence,
            },
        };

        tracing::info!(
            status = ?report.health_status,
            risk = ?report.risk_level,
            confidence = report.confidence,
            pests = report.detected_pests.len(),
            diseases = report.detected_diseases.len(),
            stage = report.growth_stage.stage.as_str(),
            "analysis complete"
        );

        let diagnostics = AnalysisDiagnostics {
            decode,
            extraction,
            growth,
            health,
            detection,
            identification,
            prediction,
            recommendation,
            assembly,
            total_duration: timer.total(),
            summary,
        };
        Ok((report, diagnostics))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn leaf() -> RgbImage {
        RgbImage::from_pixel(96, 96, image::Rgb([40, 140, 50]))
    }

    /// Create a PNG of a uniform leaf for byte-level tests.
    fn leaf_png() -> Vec<u8> {
        let img = leaf();
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    struct FailingService;

    impl IdentificationService for FailingService {
        fn identify(
            &self,
            _image: &RgbImage,
            _crop_hint: Option<&str>,
        ) -> Result<Vec<Identification>, IdentificationError> {
            Err(IdentificationError::Timeout)
        }
    }

    #[test]
    fn uniform_leaf_is_healthy() {
        let analyzer = Analyzer::with_defaults().unwrap();
        let report = analyzer.analyze(&leaf(), None, &AnalysisContext::default()).unwrap();
        assert_eq!(report.health_status, HealthStatus::Healthy);
        assert!(report.detected_pests.is_empty());
        assert!(report.detected_diseases.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn analyze_bytes_matches_analyze() {
        let analyzer = Analyzer::with_defaults().unwrap();
        let ctx = AnalysisContext::default();
        let from_bytes = analyzer.analyze_bytes(&leaf_png(), None, &ctx).unwrap();
        let from_raster = analyzer.analyze(&leaf(), None, &ctx).unwrap();
        assert_eq!(from_bytes, from_raster);
    }

    #[test]
    fn empty_bytes_are_invalid_image() {
        let analyzer = Analyzer::with_defaults().unwrap();
        let err = analyzer
            .analyze_bytes(&[], None, &AnalysisContext::default())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidImage(InvalidImageError::EmptyInput)));
    }

    #[test]
    fn raw_rgba_buffer_is_accepted() {
        let analyzer = Analyzer::with_defaults().unwrap();
        let data = [40u8, 140, 50, 255].repeat(96 * 96);
        let report = analyzer
            .analyze_raw(96, 96, 4, data, None, &AnalysisContext::default())
            .unwrap();
        assert_eq!(report.health_status, HealthStatus::Healthy);
    }

    #[test]
    fn invalid_config_fails_fast() {
        let mut config = AnalyzerConfig::default();
        config.detection.min_confidence = 2.0;
        let err = Analyzer::new(config, Catalog::builtin().unwrap()).unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration(_)));
    }

    #[test]
    fn failing_identification_degrades_to_local_result() {
        let local = Analyzer::with_defaults().unwrap();
        let remote = Analyzer::with_defaults().unwrap().with_identification(FailingService);
        let ctx = AnalysisContext::default();
        assert_eq!(
            local.analyze(&leaf(), Some("maize"), &ctx).unwrap(),
            remote.analyze(&leaf(), Some("maize"), &ctx).unwrap(),
        );
    }

    #[test]
    fn detectors_listed_pests_first() {
        let analyzer = Analyzer::with_defaults().unwrap();
        let detectors = analyzer.list_supported_detectors();
        let catalog = analyzer.catalog();
        assert_eq!(detectors.len(), catalog.pests.len() + catalog.diseases.len());
        assert_eq!(detectors[0].kind, FindingKind::Pest);
        assert!(detectors.iter().any(|d| d.name == "Early Blight" && d.kind == FindingKind::Disease));
    }

    #[test]
    fn diagnostics_include_decode_for_bytes() {
        let analyzer = Analyzer::with_defaults().unwrap();
        let ctx = AnalysisContext::default();
        let (_, diag) = analyzer
            .analyze_bytes_with_diagnostics(&leaf_png(), None, &ctx, &NoopClock)
            .unwrap();
        assert!(diag.decode.is_some());
        assert_eq!(diag.summary.image_width, 96);

        let (_, diag) = analyzer
            .analyze_with_diagnostics(&leaf(), None, &ctx, &NoopClock)
            .unwrap();
        assert!(diag.decode.is_none());
        assert!(diag.report().contains("\ndetect "));
    }

    #[test]
    fn analyzer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Analyzer>();
    }
}
