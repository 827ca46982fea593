//! The current location and the single-flight guard around acquisition.
//!
//! `LocationSession` is the only writer of the current location. Entry points
//! queue behind one async mutex, so at most one acquisition is in flight.
//! Readers watch the published value and never block on an acquisition.

use tokio::sync::{watch, Mutex};
use tracing::debug;

use super::acquisition::{AcquisitionReport, LocationAcquisition};
use super::types::{LocationError, ResolvedLocation};
use crate::geo::Coordinate;

pub struct LocationSession {
    acquisition: LocationAcquisition,
    flight: Mutex<()>,
    current: watch::Sender<Option<ResolvedLocation>>,
}

impl LocationSession {
    pub fn new(acquisition: LocationAcquisition) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            acquisition,
            flight: Mutex::new(()),
            current,
        }
    }

    /// Snapshot of the current location.
    pub fn current(&self) -> Option<ResolvedLocation> {
        self.current.borrow().clone()
    }

    /// Follow location changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<ResolvedLocation>> {
        self.current.subscribe()
    }

    /// Run the full cascade (initial load or refresh).
    pub async fn refresh(&self) -> Result<ResolvedLocation, LocationError> {
        self.refresh_traced().await.outcome
    }

    pub async fn refresh_traced(&self) -> AcquisitionReport {
        let _flight = self.flight.lock().await;
        let report = self.acquisition.acquire_traced().await;
        if let Ok(loc) = &report.outcome {
            self.commit(loc);
        }
        report
    }

    pub async fn request_high_accuracy(&self) -> Result<ResolvedLocation, LocationError> {
        let _flight = self.flight.lock().await;
        let loc = self.acquisition.request_high_accuracy().await?;
        self.commit(&loc);
        Ok(loc)
    }

    /// On failure the current location is left as it was.
    pub async fn resolve_address(&self, address: &str) -> Result<ResolvedLocation, LocationError> {
        let _flight = self.flight.lock().await;
        let loc = self.acquisition.resolve_address(address).await?;
        self.commit(&loc);
        Ok(loc)
    }

    pub async fn accept_manual_point(&self, coordinate: Coordinate) -> ResolvedLocation {
        let _flight = self.flight.lock().await;
        let loc = self.acquisition.accept_manual_point(coordinate);
        self.commit(&loc);
        loc
    }

    fn commit(&self, loc: &ResolvedLocation) {
        debug!(method = %loc.method, tier = %loc.accuracy_tier, "Replacing current location");
        self.current.send_replace(Some(loc.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::providers::{GeoProvider, PositionRequest, PositionSample};
    use crate::location::testing::{FakeGeocoder, FakeIp, ScriptedSensor, SensorScript};
    use crate::location::types::{AccuracyTier, AcquisitionMethod};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const HOME: Coordinate = Coordinate::new(51.5074, -0.1278);
    const IP: Coordinate = Coordinate::new(51.5, -0.12);

    fn session(sensor: Arc<dyn GeoProvider>, geocoder: Arc<FakeGeocoder>, ip: Arc<FakeIp>) -> LocationSession {
        LocationSession::new(LocationAcquisition::new(sensor, geocoder, ip))
    }

    #[tokio::test]
    async fn test_starts_empty_and_refresh_publishes() {
        let sensor = Arc::new(ScriptedSensor::new(SensorScript::fix(HOME, 5.0), SensorScript::fix(HOME, 5.0)));
        let s = session(sensor, Arc::new(FakeGeocoder::refining(HOME, "London")), Arc::new(FakeIp::failing()));
        let mut rx = s.subscribe();

        assert!(s.current().is_none());
        let loc = s.refresh().await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&loc));
        assert_eq!(s.current(), Some(loc));
    }

    #[tokio::test]
    async fn test_failed_address_leaves_current_untouched() {
        let sensor = Arc::new(ScriptedSensor::new(SensorScript::fix(HOME, 5.0), SensorScript::fix(HOME, 5.0)));
        let s = session(sensor, Arc::new(FakeGeocoder::refining(HOME, "London")), Arc::new(FakeIp::failing()));

        let before = s.accept_manual_point(HOME).await;
        let err = s.resolve_address("invalid-garbage-address").await.unwrap_err();

        assert!(matches!(err, LocationError::GeocodeFailed { .. }));
        assert_eq!(s.current(), Some(before));
    }

    #[tokio::test]
    async fn test_unavailable_leaves_current_untouched() {
        let sensor = Arc::new(ScriptedSensor::new(
            SensorScript::fail(LocationError::SensorDenied("denied".into())),
            SensorScript::fail(LocationError::SensorDenied("denied".into())),
        ));
        let s = session(sensor, Arc::new(FakeGeocoder::failing()), Arc::new(FakeIp::failing()));

        let before = s.accept_manual_point(HOME).await;
        assert_eq!(s.refresh().await, Err(LocationError::LocationUnavailable));
        assert_eq!(s.current(), Some(before));
    }

    #[tokio::test]
    async fn test_new_location_replaces_previous() {
        let sensor = Arc::new(ScriptedSensor::new(
            SensorScript::fail(LocationError::SensorDenied("denied".into())),
            SensorScript::fail(LocationError::SensorDenied("denied".into())),
        ));
        let s = session(sensor, Arc::new(FakeGeocoder::failing()), Arc::new(FakeIp::ok(IP, false)));

        s.accept_manual_point(HOME).await;
        let loc = s.refresh().await.unwrap();

        let current = s.current().unwrap();
        assert_eq!(current, loc);
        assert_eq!(current.accuracy_tier, AccuracyTier::Low);
        assert_eq!(current.method, AcquisitionMethod::IpBased);
        assert_eq!(current.coordinate, IP);
    }

    /// Records how many readings overlap.
    struct OverlapSensor {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl GeoProvider for OverlapSensor {
        async fn position(&self, _request: PositionRequest) -> Result<PositionSample, LocationError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(PositionSample { coordinate: HOME, accuracy_radius: 10.0 })
        }

        fn name(&self) -> &str {
            "overlap"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_are_serialized() {
        let sensor = Arc::new(OverlapSensor {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let s = Arc::new(session(
            sensor.clone(),
            Arc::new(FakeGeocoder::refining(HOME, "London")),
            Arc::new(FakeIp::failing()),
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let s = Arc::clone(&s);
                tokio::spawn(async move { s.refresh().await })
            })
            .collect();
        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }

        assert_eq!(sensor.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
