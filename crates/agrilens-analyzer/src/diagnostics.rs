//! Analysis diagnostics: timing and counts for each stage.
//!
//! Collected by [`Analyzer::analyze_with_diagnostics`](crate::Analyzer::analyze_with_diagnostics)
//! alongside the report, for threshold tuning and performance work.
//!
//! Timestamps come from a caller-supplied [`Clock`], so the library
//! never reads wall time itself. Native callers wrap
//! `std::time::Instant`; [`NoopClock`] reports zero for everything.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{GrowthStage, HealthStatus, Vigor};

/// Source of monotonic timestamps.
pub trait Clock {
    type Instant;

    fn now(&self) -> Self::Instant;

    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Clock that never advances.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopClock;

impl Clock for NoopClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// `Duration` as fractional seconds.
mod seconds {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|e| D::Error::custom(format!("{secs}s: {e}")))
    }
}

/// Diagnostics collected from a single analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDiagnostics {
    /// Stage 0: image decoding (only when analyzing encoded bytes).
    pub decode: Option<StageDiagnostics>,
    /// Stage 1: feature extraction.
    pub extraction: StageDiagnostics,
    /// Stage 2: growth stage classification.
    pub growth: StageDiagnostics,
    /// Stage 3: health metrics.
    pub health: StageDiagnostics,
    /// Stage 4: pest and disease detection.
    pub detection: StageDiagnostics,
    /// Stage 5: identification cross-check.
    pub identification: StageDiagnostics,
    /// Stage 6: predictions.
    pub prediction: StageDiagnostics,
    /// Stage 7: recommendations.
    pub recommendation: StageDiagnostics,
    /// Stage 8: report assembly.
    pub assembly: StageDiagnostics,
    /// Total wall-clock duration of the analysis (seconds).
    #[serde(with = "seconds")]
    pub total_duration: Duration,
    pub summary: AnalysisSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "seconds")]
    pub duration: Duration,
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    Decode {
        input_bytes: usize,
        width: u32,
        height: u32,
        pixel_count: u64,
    },
    Extraction {
        edge_density: f64,
        spot_count: u32,
        sharpness: f64,
        quality_score: f64,
    },
    Growth {
        stage: GrowthStage,
        vegetation_coverage: f64,
    },
    Health {
        health_score: f64,
        vigor: Vigor,
    },
    Detection {
        /// Catalog entries evaluated (pests + diseases).
        entries_evaluated: usize,
        pest_count: usize,
        disease_count: usize,
    },
    Identification {
        /// Names returned by the collaborator.
        identified: usize,
        /// Local findings whose confidence changed.
        adjusted: usize,
        /// Whether the collaborator returned an error.
        failed: bool,
    },
    Prediction {
        stage: GrowthStage,
        prediction_count: usize,
    },
    Recommendation {
        recommendation_count: usize,
    },
    Assembly {
        health_status: HealthStatus,
        confidence: f64,
    },
}

/// High-level summary counts for the whole analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub image_width: u32,
    pub image_height: u32,
    pub pixel_count: u64,
    pub pest_count: usize,
    pub disease_count: usize,
    pub prediction_count: usize,
    pub recommendation_count: usize,
}

impl AnalysisDiagnostics {
    /// Stages in execution order, with display names. Decode is listed
    /// only when it ran.
    fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages: Vec<(&'static str, &StageDiagnostics)> =
            self.decode.iter().map(|d| ("decode", d)).collect();
        stages.extend([
            ("extract features", &self.extraction),
            ("growth stage", &self.growth),
            ("health metrics", &self.health),
            ("detect", &self.detection),
            ("identify", &self.identification),
            ("predict", &self.prediction),
            ("recommend", &self.recommendation),
            ("assemble", &self.assembly),
        ]);
        stages
    }

    /// Format diagnostics as a human-readable timing table.
    #[must_use]
    pub fn report(&self) -> String {
        let total_ms = duration_ms(self.total_duration);
        let summary = &self.summary;

        let mut out = format!(
            "agrilens timings: {}x{} image, {} px, {total_ms:.3}ms total\n",
            summary.image_width, summary.image_height, summary.pixel_count,
        );
        out.push_str(&format!(
            "{:<18} {:>10} {:>6} {:>6}  {}\n",
            "stage", "ms", "share", "items", "details"
        ));

        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let share = if total_ms > 0.0 { ms / total_ms * 100.0 } else { 0.0 };
            let items = diag
                .metrics
                .item_count()
                .map_or_else(|| "-".to_string(), |n| n.to_string());
            out.push_str(&format!(
                "{name:<18} {ms:>10.3} {share:>5.1}% {items:>6}  {}\n",
                format_metrics(&diag.metrics),
            ));
        }

        out.push_str(&format!(
            "findings: {} pest(s), {} disease(s) -> {} prediction(s), {} recommendation(s)",
            summary.pest_count,
            summary.disease_count,
            summary.prediction_count,
            summary.recommendation_count,
        ));
        out
    }
}

impl StageMetrics {
    /// Number of items the stage produced, where that is meaningful.
    #[must_use]
    pub const fn item_count(&self) -> Option<usize> {
        match *self {
            Self::Extraction { spot_count, .. } => Some(spot_count as usize),
            Self::Detection {
                pest_count,
                disease_count,
                ..
            } => Some(pest_count + disease_count),
            Self::Identification { adjusted, .. } => Some(adjusted),
            Self::Prediction {
                prediction_count, ..
            } => Some(prediction_count),
            Self::Recommendation {
                recommendation_count,
            } => Some(recommendation_count),
            Self::Decode { .. } | Self::Growth { .. } | Self::Health { .. } | Self::Assembly { .. } => {
                None
            }
        }
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Extraction {
            edge_density,
            spot_count,
            sharpness,
            quality_score,
        } => format!(
            "edges={:.1}% spots={spot_count} sharpness={sharpness:.1} quality={quality_score:.2}",
            edge_density * 100.0,
        ),
        StageMetrics::Growth {
            stage,
            vegetation_coverage,
        } => format!("{} (vegetation {vegetation_coverage:.1}%)", stage.as_str()),
        StageMetrics::Health {
            health_score,
            vigor,
        } => format!("score={health_score:.1} vigor={vigor:?}"),
        StageMetrics::Detection {
            entries_evaluated,
            pest_count,
            disease_count,
        } => format!("{entries_evaluated} entries -> {pest_count} pests, {disease_count} diseases"),
        StageMetrics::Identification {
            identified,
            adjusted,
            failed,
        } => {
            if *failed {
                "service failed, local result kept".to_string()
            } else {
                format!("{identified} identified, {adjusted} adjusted")
            }
        }
        StageMetrics::Prediction {
            stage,
            prediction_count,
        } => format!("{prediction_count} predictions at {}", stage.as_str()),
        StageMetrics::Recommendation {
            recommendation_count,
        } => format!("{recommendation_count} recommendations"),
        StageMetrics::Assembly {
            health_status,
            confidence,
        } => format!("{health_status:?} confidence={confidence:.2}"),
    }
}

/// Runs closures under a clock and records their durations.
pub(crate) struct StageTimer<'c, C: Clock> {
    clock: &'c C,
    start: C::Instant,
}

impl<'c, C: Clock> StageTimer<'c, C> {
    pub(crate) fn start(clock: &'c C) -> Self {
        Self {
            clock,
            start: clock.now(),
        }
    }

    /// Time `f`, returning its output and the elapsed duration.
    pub(crate) fn time<T>(&self, f: impl FnOnce() -> T) -> (T, Duration) {
        let t = self.clock.now();
        let out = f();
        (out, self.clock.elapsed(&t))
    }

    pub(crate) fn total(&self) -> Duration {
        self.clock.elapsed(&self.start)
    }
}
