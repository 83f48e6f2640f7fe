//! Accuracy tracking from farmer feedback.
//!
//! The [`ValidationLedger`] is the only state that outlives an analysis.
//! It is an explicit value the caller owns and shares (e.g. behind an
//! `Arc`), never a global. One mutex guards the whole table, so a
//! `record` is atomic and `report` always reads a consistent snapshot.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Counters for one detected label.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelCounts {
    pub total: u64,
    pub correct: u64,
    /// Sum of reported confidences, for the mean.
    pub confidence_sum: f64,
}

/// Accuracy for one label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelAccuracy {
    pub total: u64,
    pub correct: u64,
    /// `correct / total`, or 0 when `total` is 0.
    pub accuracy: f64,
    pub mean_confidence: f64,
}

/// Snapshot of ledger accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub labels: BTreeMap<String, LabelAccuracy>,
    pub total: u64,
    pub correct: u64,
    /// `sum(correct) / sum(total)`, or 0 for an empty ledger.
    pub overall_accuracy: f64,
}

/// Thread-safe, append-only accuracy counters keyed by detected label.
#[derive(Debug, Default)]
pub struct ValidationLedger {
    counts: Mutex<BTreeMap<String, LabelCounts>>,
}

/// Labels compare case-insensitively after trimming.
fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

impl ValidationLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a ledger from saved counters.
    #[must_use]
    pub fn from_snapshot(counts: BTreeMap<String, LabelCounts>) -> Self {
        let mut merged: BTreeMap<String, LabelCounts> = BTreeMap::new();
        for (label, c) in counts {
            let entry = merged.entry(normalize(&label)).or_default();
            entry.total = entry.total.saturating_add(c.total);
            entry.correct = entry.correct.saturating_add(c.correct.min(c.total));
            if c.confidence_sum.is_finite() {
                entry.confidence_sum += c.confidence_sum.max(0.0);
            }
        }
        Self {
            counts: Mutex::new(merged),
        }
    }

    /// A poisoned lock still holds consistent counters: every update is
    /// applied in full while the guard is held.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, LabelCounts>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one piece of feedback.
    ///
    /// The record counts as correct when the labels match after
    /// normalization. Confidence is clamped to `[0, 1]`; a NaN counts as 0.
    pub fn record(&self, detected_label: &str, actual_label: &str, confidence: f64) {
        let detected = normalize(detected_label);
        let correct = detected == normalize(actual_label);
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        let mut counts = self.lock();
        let entry = counts.entry(detected).or_default();
        entry.total = entry.total.saturating_add(1);
        if correct {
            entry.correct = entry.correct.saturating_add(1);
        }
        entry.confidence_sum += confidence;
        drop(counts);

        tracing::debug!(label = detected_label, correct, "recorded validation");
    }

    /// Per-label and overall accuracy.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn report(&self) -> AccuracyReport {
        let counts = self.snapshot();
        let labels: BTreeMap<String, LabelAccuracy> = counts
            .iter()
            .map(|(label, c)| {
                let accuracy = LabelAccuracy {
                    total: c.total,
                    correct: c.correct,
                    accuracy: ratio(c.correct as f64, c.total),
                    mean_confidence: ratio(c.confidence_sum, c.total),
                };
                (label.clone(), accuracy)
            })
            .collect();
        let total = counts.values().fold(0u64, |n, c| n.saturating_add(c.total));
        let correct = counts.values().fold(0u64, |n, c| n.saturating_add(c.correct));
        AccuracyReport {
            labels,
            total,
            correct,
            overall_accuracy: ratio(correct as f64, total),
        }
    }

    /// Copy of the raw counters, for persistence.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, LabelCounts> {
        self.lock().clone()
    }
}
