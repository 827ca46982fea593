//! User-facing confidence statements and recovery prompts.

use serde::Serialize;
use std::fmt;

use super::types::{AccuracyTier, AcquisitionMethod, ResolvedLocation};

/// Confidence statement for a tier, specialised for the default fallback.
pub fn accuracy_message(tier: AccuracyTier, method: AcquisitionMethod) -> &'static str {
    match (tier, method) {
        (AccuracyTier::High, _) => "Your location is highly accurate",
        (AccuracyTier::Medium, _) => "Your location is moderately accurate",
        (AccuracyTier::Low, AcquisitionMethod::DefaultFallback) => {
            "Using approximate location - please update manually for accuracy"
        }
        (AccuracyTier::Low, _) => "Your location may not be precise",
    }
}

/// Whether the user should be asked to correct the location by hand.
pub fn needs_manual_correction(tier: AccuracyTier, method: AcquisitionMethod) -> bool {
    tier == AccuracyTier::Low && method == AcquisitionMethod::DefaultFallback
}

pub const MANUAL_CORRECTION_PROMPT: &str =
    "Using an approximate location. For accurate results, please update your location manually.";

/// What to offer when no location could be established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryOption {
    RetryCascade,
    RetryHighAccuracy,
    EnterAddress,
}

impl RecoveryOption {
    pub const ALL: [RecoveryOption; 3] = [
        RecoveryOption::RetryCascade,
        RecoveryOption::RetryHighAccuracy,
        RecoveryOption::EnterAddress,
    ];

    /// The CLI invocation that performs this recovery.
    pub fn command_hint(&self) -> &'static str {
        match self {
            Self::RetryCascade => "nearcare locate",
            Self::RetryHighAccuracy => "nearcare precise",
            Self::EnterAddress => "nearcare address \"<address, city, or postal code>\"",
        }
    }
}

impl fmt::Display for RecoveryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryCascade => write!(f, "Retry with location services"),
            Self::RetryHighAccuracy => write!(f, "Get high accuracy location"),
            Self::EnterAddress => write!(f, "Enter your location manually"),
        }
    }
}

/// Banner summary for a resolved location.
#[derive(Debug, Clone, Serialize)]
pub struct LocationNotice {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<&'static str>,
}

impl LocationNotice {
    pub fn for_location(loc: &ResolvedLocation) -> Self {
        Self {
            message: accuracy_message(loc.accuracy_tier, loc.method),
            prompt: needs_manual_correction(loc.accuracy_tier, loc.method)
                .then_some(MANUAL_CORRECTION_PROMPT),
        }
    }
}
