//! Location acquisition: orchestrates the fallback cascade.
//!
//! Cascade:  high-accuracy sensor (raced against a timer) + refinement
//!           → standard sensor (cached fix allowed) → IP lookup → unavailable
//!
//! Side entry points skip the cascade: a precise-only sensor request, a
//! typed address, and a point picked directly by the user.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::providers::{
    GeoProvider, GeocodeRefiner, IpLocator, IpLookup, PositionRequest, PositionSample,
};
use super::types::{
    AccuracyTier, AcquisitionAttempt, AcquisitionMethod, LocationError, ResolvedLocation, Strategy,
};
use crate::geo::Coordinate;

/// Attached to default-fallback results.
pub const DEFAULT_LOCATION_WARNING: &str = "Could not determine your precise location. Using a default location. \
Please allow location access or enter your location manually for accurate results.";

/// Order in which the cascade tries its strategies.
pub const CASCADE: [Strategy; 3] = [
    Strategy::HighAccuracySensor,
    Strategy::StandardSensor,
    Strategy::IpLookup,
];

/// Timing and threshold knobs for acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionSettings {
    pub high_accuracy_timeout: Duration,
    pub standard_timeout: Duration,
    pub standard_max_age: Duration,
    pub precise_timeout: Duration,
    /// Reported radius (meters) below which a precise reading counts as High.
    pub precise_radius_threshold: f64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            high_accuracy_timeout: Duration::from_secs(15),
            standard_timeout: Duration::from_secs(10),
            standard_max_age: Duration::from_secs(60),
            precise_timeout: Duration::from_secs(30),
            precise_radius_threshold: 100.0,
        }
    }
}

/// Result of one cascade run together with the steps it took.
#[derive(Debug, Clone)]
pub struct AcquisitionReport {
    pub outcome: Result<ResolvedLocation, LocationError>,
    pub attempts: Vec<AcquisitionAttempt>,
}

/// What a single strategy produced.
enum Step {
    Resolved(ResolvedLocation),
    FallThrough(LocationError),
    Abort(LocationError),
}

/// The acquisition orchestrator. Holds no location state; callers own what
/// it returns (see [`super::session::LocationSession`]).
pub struct LocationAcquisition {
    sensor: Arc<dyn GeoProvider>,
    geocoder: Arc<dyn GeocodeRefiner>,
    ip: Arc<dyn IpLocator>,
    settings: AcquisitionSettings,
}

impl LocationAcquisition {
    pub fn new(
        sensor: Arc<dyn GeoProvider>,
        geocoder: Arc<dyn GeocodeRefiner>,
        ip: Arc<dyn IpLocator>,
    ) -> Self {
        Self {
            sensor,
            geocoder,
            ip,
            settings: AcquisitionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AcquisitionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    /// Run the full cascade.
    pub async fn acquire(&self) -> Result<ResolvedLocation, LocationError> {
        self.acquire_traced().await.outcome
    }

    /// Run the full cascade and keep a record of every step tried.
    pub async fn acquire_traced(&self) -> AcquisitionReport {
        let mut attempts = Vec::with_capacity(CASCADE.len());

        for strategy in CASCADE {
            let budget = self.budget(strategy);
            match self.run(strategy).await {
                Step::Resolved(loc) => {
                    attempts.push(AcquisitionAttempt::resolved(strategy, budget, loc.coordinate));
                    info!(
                        strategy = %strategy,
                        tier = %loc.accuracy_tier,
                        method = %loc.method,
                        lat = loc.coordinate.lat,
                        lng = loc.coordinate.lng,
                        "Location resolved"
                    );
                    return AcquisitionReport {
                        outcome: Ok(loc),
                        attempts,
                    };
                }
                Step::FallThrough(err) => {
                    warn!(strategy = %strategy, error = %err, "Cascade step failed, falling through");
                    attempts.push(AcquisitionAttempt::failed(strategy, budget, &err));
                }
                Step::Abort(err) => {
                    warn!(strategy = %strategy, error = %err, "Cascade exhausted");
                    attempts.push(AcquisitionAttempt::failed(strategy, budget, &err));
                    break;
                }
            }
        }

        AcquisitionReport {
            outcome: Err(LocationError::LocationUnavailable),
            attempts,
        }
    }

    /// A single high-accuracy sensor reading with the longer precise budget.
    /// Never falls back to IP: an explicit request for precision reports its
    /// failure instead of silently degrading.
    pub async fn request_high_accuracy(&self) -> Result<ResolvedLocation, LocationError> {
        let request = PositionRequest {
            high_accuracy: true,
            timeout: self.settings.precise_timeout,
            max_cached_age: Duration::ZERO,
        };
        let sample = race_sensor(Arc::clone(&self.sensor), request).await?;

        debug!(
            radius_m = sample.accuracy_radius,
            threshold_m = self.settings.precise_radius_threshold,
            "Precise reading obtained"
        );

        let loc = if sample.accuracy_radius < self.settings.precise_radius_threshold {
            ResolvedLocation::new(sample.coordinate, AccuracyTier::High, AcquisitionMethod::PreciseSensor)
        } else {
            ResolvedLocation::new(sample.coordinate, AccuracyTier::Medium, AcquisitionMethod::SensorStandard)
        };
        Ok(loc)
    }

    /// Forward-geocode a typed address.
    pub async fn resolve_address(&self, address: &str) -> Result<ResolvedLocation, LocationError> {
        let query = address.trim();
        if query.is_empty() {
            return Err(LocationError::geocode_failed(address, "empty address"));
        }

        let found = self.geocoder.forward_geocode(query).await.map_err(|e| match e {
            LocationError::GeocodeFailed { .. } => e,
            other => LocationError::geocode_failed(query, other.to_string()),
        })?;

        Ok(
            ResolvedLocation::new(found.coordinate, AccuracyTier::High, AcquisitionMethod::ManualAddress)
                .with_address(found.formatted_address),
        )
    }

    /// Accept a coordinate the user picked directly. No network calls.
    pub fn accept_manual_point(&self, coordinate: Coordinate) -> ResolvedLocation {
        ResolvedLocation::new(coordinate, AccuracyTier::High, AcquisitionMethod::ManualPick)
    }

    fn budget(&self, strategy: Strategy) -> Option<Duration> {
        match strategy {
            Strategy::HighAccuracySensor => Some(self.settings.high_accuracy_timeout),
            Strategy::StandardSensor => Some(self.settings.standard_timeout),
            Strategy::IpLookup => None,
        }
    }

    async fn run(&self, strategy: Strategy) -> Step {
        match strategy {
            Strategy::HighAccuracySensor => self.high_accuracy_step().await,
            Strategy::StandardSensor => self.standard_step().await,
            Strategy::IpLookup => self.ip_step().await,
        }
    }

    async fn high_accuracy_step(&self) -> Step {
        let request = PositionRequest {
            high_accuracy: true,
            timeout: self.settings.high_accuracy_timeout,
            max_cached_age: Duration::ZERO,
        };
        let sample = match race_sensor(Arc::clone(&self.sensor), request).await {
            Ok(s) => s,
            Err(e) => return Step::FallThrough(e),
        };
        debug!(
            lat = sample.coordinate.lat,
            lng = sample.coordinate.lng,
            radius_m = sample.accuracy_radius,
            "High accuracy reading obtained"
        );

        match self.geocoder.reverse_geocode(sample.coordinate).await {
            Ok(refined) => Step::Resolved(
                ResolvedLocation::new(refined.refined, AccuracyTier::High, AcquisitionMethod::SensorRefined)
                    .with_address(Some(refined.formatted_address)),
            ),
            Err(e) => {
                warn!(error = %e, "Refinement failed, keeping raw sensor reading");
                Step::Resolved(ResolvedLocation::new(
                    sample.coordinate,
                    AccuracyTier::Medium,
                    AcquisitionMethod::SensorStandard,
                ))
            }
        }
    }

    async fn standard_step(&self) -> Step {
        let request = PositionRequest {
            high_accuracy: false,
            timeout: self.settings.standard_timeout,
            max_cached_age: self.settings.standard_max_age,
        };
        match self.sensor.position(request).await {
            Ok(sample) => Step::Resolved(ResolvedLocation::new(
                sample.coordinate,
                AccuracyTier::Medium,
                AcquisitionMethod::SensorStandard,
            )),
            Err(e) => Step::FallThrough(e),
        }
    }

    async fn ip_step(&self) -> Step {
        match self.ip.lookup().await {
            Ok(IpLookup { coordinate, used_default: false }) => Step::Resolved(ResolvedLocation::new(
                coordinate,
                AccuracyTier::Low,
                AcquisitionMethod::IpBased,
            )),
            Ok(IpLookup { coordinate, used_default: true }) => Step::Resolved(
                ResolvedLocation::new(coordinate, AccuracyTier::Low, AcquisitionMethod::DefaultFallback)
                    .with_warning(DEFAULT_LOCATION_WARNING),
            ),
            Err(e) => Step::Abort(e),
        }
    }
}

/// Race a sensor reading against an independent timer of the same length.
///
/// The reading runs as its own task. If the timer wins, the task is aborted
/// so a provider that never settles does not outlive the acquisition.
async fn race_sensor(
    sensor: Arc<dyn GeoProvider>,
    request: PositionRequest,
) -> Result<PositionSample, LocationError> {
    let mut reading = tokio::spawn(async move { sensor.position(request).await });

    tokio::select! {
        joined = &mut reading => match joined {
            Ok(result) => result,
            Err(e) => Err(LocationError::SensorUnavailable(format!("sensor task failed: {}", e))),
        },
        _ = tokio::time::sleep(request.timeout) => {
            reading.abort();
            Err(LocationError::SensorTimeout(request.timeout))
        }
    }
}
