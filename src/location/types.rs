//! Core types for the location subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::geo::{format_coords, Coordinate};

/// Coarse confidence attached to every resolved location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyTier {
    High,
    Medium,
    Low,
}

impl fmt::Display for AccuracyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Which branch produced a location. Display and messaging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AcquisitionMethod {
    SensorRefined,
    SensorStandard,
    PreciseSensor,
    IpBased,
    DefaultFallback,
    ManualAddress,
    ManualPick,
}

impl AcquisitionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SensorRefined => "sensor-refined",
            Self::SensorStandard => "sensor-standard",
            Self::PreciseSensor => "precise-sensor",
            Self::IpBased => "ip-based",
            Self::DefaultFallback => "default-fallback",
            Self::ManualAddress => "manual-address",
            Self::ManualPick => "manual-pick",
        }
    }
}

impl fmt::Display for AcquisitionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A location produced by one acquisition. Never mutated after creation;
/// the next acquisition replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub coordinate: Coordinate,
    pub accuracy_tier: AccuracyTier,
    pub method: AcquisitionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Formatted address when a geocoder supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub acquired_at: DateTime<Utc>,
}

impl ResolvedLocation {
    pub fn new(coordinate: Coordinate, accuracy_tier: AccuracyTier, method: AcquisitionMethod) -> Self {
        Self {
            coordinate,
            accuracy_tier,
            method,
            warning: None,
            address: None,
            acquired_at: Utc::now(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.address = address;
        self
    }

    pub fn display_line(&self) -> String {
        let place = match &self.address {
            Some(addr) => format!("{}\n  ", addr),
            None => String::new(),
        };
        format!(
            "\u{1F4CD} {}{} [{} accuracy, {}]",
            place,
            format_coords(self.coordinate),
            self.accuracy_tier,
            self.method,
        )
    }
}

/// A step of the acquisition cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    HighAccuracySensor,
    StandardSensor,
    IpLookup,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighAccuracySensor => write!(f, "high-accuracy sensor"),
            Self::StandardSensor => write!(f, "standard sensor"),
            Self::IpLookup => write!(f, "IP lookup"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AttemptOutcome {
    Resolved { coordinate: Coordinate },
    Failed { reason: String },
}

/// One executed cascade step. Diagnostics only, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionAttempt {
    pub strategy: Strategy,
    /// Wait budget for this step; `None` when the step relies on the
    /// provider's own transport timeout.
    pub budget_ms: Option<u64>,
    pub outcome: AttemptOutcome,
}

impl AcquisitionAttempt {
    pub fn resolved(strategy: Strategy, budget: Option<Duration>, coordinate: Coordinate) -> Self {
        Self {
            strategy,
            budget_ms: budget.map(|d| d.as_millis() as u64),
            outcome: AttemptOutcome::Resolved { coordinate },
        }
    }

    pub fn failed(strategy: Strategy, budget: Option<Duration>, err: &LocationError) -> Self {
        Self {
            strategy,
            budget_ms: budget.map(|d| d.as_millis() as u64),
            outcome: AttemptOutcome::Failed { reason: err.to_string() },
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Resolved { .. })
    }
}

/// Location errors.
///
/// Only `LocationUnavailable` and `GeocodeFailed` reach users; the sensor
/// errors are swallowed by the cascade and `RefinementFailed` only lowers
/// the tier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("No position sensor available: {0}")]
    SensorUnavailable(String),
    #[error("Position sensor timed out after {}ms", .0.as_millis())]
    SensorTimeout(Duration),
    #[error("Position sensor access denied: {0}")]
    SensorDenied(String),
    #[error("Location refinement failed: {0}")]
    RefinementFailed(String),
    #[error("IP location lookup failed: {0}")]
    IpLookupFailed(String),
    #[error("Could not find location '{query}': {reason}")]
    GeocodeFailed { query: String, reason: String },
    #[error("Unable to determine your location")]
    LocationUnavailable,
}

impl LocationError {
    pub fn geocode_failed(query: &str, reason: impl Into<String>) -> Self {
        Self::GeocodeFailed {
            query: query.to_string(),
            reason: reason.into(),
        }
    }
}
