//! Capability traits consumed by the acquisition cascade, plus the two
//! trivial sensor providers.
//!
//! Every network or hardware dependency sits behind one of these traits so
//! the cascade can run against test doubles.

use async_trait::async_trait;
use std::time::Duration;

use super::types::LocationError;
use crate::geo::Coordinate;

/// Parameters for a single position reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRequest {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached reading the caller accepts. Zero means a fresh fix.
    pub max_cached_age: Duration,
}

/// A position reading from the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    /// Sensor-reported accuracy radius in meters.
    pub accuracy_radius: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReverseGeocode {
    pub refined: Coordinate,
    pub formatted_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForwardGeocode {
    pub coordinate: Coordinate,
    pub formatted_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IpLookup {
    pub coordinate: Coordinate,
    /// The service could not locate us and answered with its built-in default.
    pub used_default: bool,
}

/// The platform position sensor.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn position(&self, request: PositionRequest) -> Result<PositionSample, LocationError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Forward and reverse geocoding.
#[async_trait]
pub trait GeocodeRefiner: Send + Sync {
    /// Fails with `RefinementFailed` on provider error or an empty result.
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<ReverseGeocode, LocationError>;

    /// Fails with `GeocodeFailed` on provider error or an empty result.
    async fn forward_geocode(&self, address: &str) -> Result<ForwardGeocode, LocationError>;
}

/// IP-based approximate location.
#[async_trait]
pub trait IpLocator: Send + Sync {
    /// Fails with `IpLookupFailed` only when the service is unreachable.
    async fn lookup(&self) -> Result<IpLookup, LocationError>;
}

/// A sensor pinned to one reading. Backs `--position` overrides.
#[derive(Debug, Clone)]
pub struct FixedProvider {
    sample: PositionSample,
}

impl FixedProvider {
    pub fn new(coordinate: Coordinate, accuracy_radius: f64) -> Self {
        Self {
            sample: PositionSample { coordinate, accuracy_radius },
        }
    }
}

#[async_trait]
impl GeoProvider for FixedProvider {
    async fn position(&self, _request: PositionRequest) -> Result<PositionSample, LocationError> {
        Ok(self.sample)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Stands in for a platform with no position sensor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSensor;

#[async_trait]
impl GeoProvider for NoSensor {
    async fn position(&self, _request: PositionRequest) -> Result<PositionSample, LocationError> {
        Err(LocationError::SensorUnavailable(
            "no position sensor configured".into(),
        ))
    }

    fn name(&self) -> &str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PositionRequest {
        PositionRequest {
            high_accuracy: true,
            timeout: Duration::from_secs(1),
            max_cached_age: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_fixed_provider_returns_sample() {
        let p = FixedProvider::new(Coordinate::new(59.3293, 18.0686), 12.0);
        let s = p.position(request()).await.unwrap();
        assert_eq!(s.coordinate, Coordinate::new(59.3293, 18.0686));
        assert_eq!(s.accuracy_radius, 12.0);
    }

    #[tokio::test]
    async fn test_no_sensor_is_unavailable() {
        let err = NoSensor.position(request()).await.unwrap_err();
        assert!(matches!(err, LocationError::SensorUnavailable(_)));
    }
}
