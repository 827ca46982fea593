//! Test doubles for the capability traits.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::providers::{
    ForwardGeocode, GeoProvider, GeocodeRefiner, IpLocator, IpLookup, PositionRequest, PositionSample,
    ReverseGeocode,
};
use super::types::LocationError;
use crate::geo::Coordinate;

#[derive(Debug, Clone)]
pub enum SensorScript {
    Fix(PositionSample),
    Fail(LocationError),
    Delayed(PositionSample, Duration),
    /// Never settles, whatever timeout was asked for.
    Hang,
}

impl SensorScript {
    pub fn fix(coordinate: Coordinate, accuracy_radius: f64) -> Self {
        Self::Fix(PositionSample { coordinate, accuracy_radius })
    }

    pub fn fail(err: LocationError) -> Self {
        Self::Fail(err)
    }

    pub fn delayed(coordinate: Coordinate, accuracy_radius: f64, delay: Duration) -> Self {
        Self::Delayed(PositionSample { coordinate, accuracy_radius }, delay)
    }
}

/// Answers high-accuracy and standard requests from separate scripts.
pub struct ScriptedSensor {
    high: SensorScript,
    standard: SensorScript,
    requests: Mutex<Vec<PositionRequest>>,
    pub completed: AtomicUsize,
}

impl ScriptedSensor {
    pub fn new(high: SensorScript, standard: SensorScript) -> Self {
        Self {
            high,
            standard,
            requests: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> Vec<PositionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GeoProvider for ScriptedSensor {
    async fn position(&self, request: PositionRequest) -> Result<PositionSample, LocationError> {
        self.requests.lock().unwrap().push(request);
        let script = if request.high_accuracy { &self.high } else { &self.standard };
        let result = match script.clone() {
            SensorScript::Fix(sample) => Ok(sample),
            SensorScript::Fail(err) => Err(err),
            SensorScript::Delayed(sample, delay) => {
                tokio::time::sleep(delay).await;
                Ok(sample)
            }
            SensorScript::Hang => std::future::pending().await,
        };
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Refines to a fixed point; forward lookups fail for anything containing
/// "garbage".
pub struct FakeGeocoder {
    refined: Option<(Coordinate, String)>,
    pub reverse_calls: AtomicUsize,
    pub forward_calls: AtomicUsize,
}

impl FakeGeocoder {
    pub fn refining(coordinate: Coordinate, address: &str) -> Self {
        Self {
            refined: Some((coordinate, address.to_string())),
            reverse_calls: AtomicUsize::new(0),
            forward_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            refined: None,
            reverse_calls: AtomicUsize::new(0),
            forward_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GeocodeRefiner for FakeGeocoder {
    async fn reverse_geocode(&self, _coordinate: Coordinate) -> Result<ReverseGeocode, LocationError> {
        self.reverse_calls.fetch_add(1, Ordering::SeqCst);
        match &self.refined {
            Some((refined, address)) => Ok(ReverseGeocode {
                refined: *refined,
                formatted_address: address.clone(),
            }),
            None => Err(LocationError::RefinementFailed("ZERO_RESULTS".into())),
        }
    }

    async fn forward_geocode(&self, address: &str) -> Result<ForwardGeocode, LocationError> {
        self.forward_calls.fetch_add(1, Ordering::SeqCst);
        match &self.refined {
            Some((coordinate, _)) if !address.contains("garbage") => Ok(ForwardGeocode {
                coordinate: *coordinate,
                formatted_address: Some(format!("{}, Manhattan", address)),
            }),
            _ => Err(LocationError::geocode_failed(address, "ZERO_RESULTS")),
        }
    }
}

pub struct FakeIp {
    answer: Option<IpLookup>,
    pub calls: AtomicUsize,
}

impl FakeIp {
    pub fn ok(coordinate: Coordinate, used_default: bool) -> Self {
        Self {
            answer: Some(IpLookup { coordinate, used_default }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IpLocator for FakeIp {
    async fn lookup(&self) -> Result<IpLookup, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .ok_or_else(|| LocationError::IpLookupFailed("connection refused".into()))
    }
}
