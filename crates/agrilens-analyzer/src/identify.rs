//! Optional third-party identification cross-check.
//!
//! An [`IdentificationService`] is a pluggable collaborator (a remote
//! plant-health API, a model server) that names issues it sees in the
//! image. Its answers only adjust the confidence of findings the local
//! detectors already made; its failures never fail an analysis.

use serde::{Deserialize, Serialize};

use crate::detect::Finding;
use crate::types::RgbImage;

/// One issue named by the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub name: String,
    /// `[0, 1]`.
    pub confidence: f64,
}

/// Failure talking to an identification collaborator.
#[derive(Debug, thiserror::Error)]
pub enum IdentificationError {
    #[error("identification service unavailable: {0}")]
    Unavailable(String),

    #[error("identification timed out")]
    Timeout,

    #[error("malformed identification response: {0}")]
    Malformed(String),
}

/// Trait for identification collaborators.
///
/// Implementations must be safe to call from several analyses at once.
pub trait IdentificationService: Send + Sync {
    /// Identify issues in the image. `crop_hint` is passed through as
    /// given.
    ///
    /// # Errors
    ///
    /// Any [`IdentificationError`]; the analyzer logs it and continues
    /// with local findings.
    fn identify(
        &self,
        image: &RgbImage,
        crop_hint: Option<&str>,
    ) -> Result<Vec<Identification>, IdentificationError>;
}

/// The default collaborator: identifies nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentification;

impl IdentificationService for NoIdentification {
    fn identify(
        &self,
        _image: &RgbImage,
        _crop_hint: Option<&str>,
    ) -> Result<Vec<Identification>, IdentificationError> {
        Ok(Vec::new())
    }
}

/// Move the confidence of every finding the collaborator also named to
/// the mean of the local and remote values. Returns how many findings
/// changed.
///
/// Remote names without a local finding are ignored. Non-finite remote
/// confidences are skipped.
pub fn cross_check<F: Finding>(findings: &mut [F], identifications: &[Identification]) -> usize {
    let mut adjusted = 0;
    for finding in findings.iter_mut() {
        let remote = identifications.iter().find(|id| {
            id.confidence.is_finite() && id.name.trim().eq_ignore_ascii_case(finding.name())
        });
        if let Some(remote) = remote {
            let merged = f64::midpoint(finding.confidence(), remote.confidence.clamp(0.0, 1.0));
            finding.set_confidence(merged);
            adjusted += 1;
        }
    }
    adjusted
}
