//! Third-party services the proxy forwards to: Google Places nearby search,
//! Google Geocoding, and the IP geolocation services.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::facility::{cap_results, Facility, FacilityCategory};
use crate::geo::Coordinate;
use crate::http::{self, HttpError};

const PLACES_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpstreamError {
    #[error("Google Maps API key is not configured")]
    MissingApiKey,
    #[error("upstream unreachable: {0}")]
    Network(String),
    #[error("Google API error: {0}")]
    RequestDenied(String),
    #[error("no results")]
    NoResults,
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl From<HttpError> for UpstreamError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Decode(msg) => Self::InvalidResponse(msg),
            other => Self::Network(other.to_string()),
        }
    }
}

/// A single geocoder answer.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub coordinate: Coordinate,
    pub formatted_address: String,
}

/// Everything the proxy needs from the outside world.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn nearby(
        &self,
        center: Coordinate,
        category: FacilityCategory,
        radius_meters: u32,
    ) -> Result<Vec<Facility>, UpstreamError>;

    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<GeocodeHit, UpstreamError>;

    async fn forward_geocode(&self, address: &str) -> Result<GeocodeHit, UpstreamError>;

    /// Locate the caller by IP. Errors once every configured service failed.
    async fn ip_lookup(&self) -> Result<Coordinate, UpstreamError>;

    fn has_api_key(&self) -> bool;
}

// ─── Google response shapes ─────────────────────────────────────

#[derive(Deserialize, Debug)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize, Debug)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize, Debug)]
struct PlaceResult {
    place_id: String,
    name: String,
    #[serde(default)]
    vicinity: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    geometry: Geometry,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct PlacesResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<PlaceResult>,
}

#[derive(Deserialize, Debug)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Deserialize, Debug)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

fn check_status(status: &str, error_message: Option<String>) -> Result<(), UpstreamError> {
    match status {
        "OK" => Ok(()),
        "ZERO_RESULTS" => Err(UpstreamError::NoResults),
        "REQUEST_DENIED" => Err(UpstreamError::RequestDenied(
            error_message.unwrap_or_else(|| "request denied".into()),
        )),
        other => Err(UpstreamError::InvalidResponse(match error_message {
            Some(msg) => format!("{}: {}", other, msg),
            None => other.to_string(),
        })),
    }
}

fn parse_places(response: PlacesResponse) -> Result<Vec<Facility>, UpstreamError> {
    match check_status(&response.status, response.error_message) {
        Ok(()) => {}
        Err(UpstreamError::NoResults) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    }

    let facilities = response
        .results
        .into_iter()
        .map(|p| Facility {
            id: p.place_id,
            name: p.name,
            address: p.vicinity.or(p.formatted_address).unwrap_or_default(),
            coordinate: Coordinate::new(p.geometry.location.lat, p.geometry.location.lng),
            rating: p.rating,
            category_tags: p.types,
        })
        .collect();
    Ok(cap_results(facilities))
}

fn parse_geocode(response: GeocodeResponse) -> Result<GeocodeHit, UpstreamError> {
    check_status(&response.status, response.error_message)?;
    let first = response
        .results
        .into_iter()
        .next()
        .ok_or(UpstreamError::NoResults)?;
    Ok(GeocodeHit {
        coordinate: Coordinate::new(first.geometry.location.lat, first.geometry.location.lng),
        formatted_address: first.formatted_address,
    })
}

// ─── IP services ────────────────────────────────────────────────

/// IP geolocation services, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpService {
    /// https://ipapi.co
    IpApiCo,
    /// http://ip-api.com
    IpApiCom,
}

#[derive(Deserialize)]
struct IpApiCoResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct IpApiComResult {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

impl IpService {
    fn url(&self) -> &'static str {
        match self {
            Self::IpApiCo => "https://ipapi.co/json/",
            Self::IpApiCom => "http://ip-api.com/json/",
        }
    }

    async fn locate(&self, agent: ureq::Agent) -> Result<Coordinate, UpstreamError> {
        let url = self.url().to_string();
        match self {
            Self::IpApiCo => {
                let r: IpApiCoResult = http::get_json(agent, url, Vec::new()).await?;
                if r.error {
                    return Err(UpstreamError::InvalidResponse(
                        r.reason.unwrap_or_else(|| "lookup refused".into()),
                    ));
                }
                match (r.latitude, r.longitude) {
                    (Some(lat), Some(lng)) => Ok(Coordinate::new(lat, lng)),
                    _ => Err(UpstreamError::InvalidResponse("no coordinates".into())),
                }
            }
            Self::IpApiCom => {
                let r: IpApiComResult = http::get_json(agent, url, Vec::new()).await?;
                if r.status != "success" {
                    return Err(UpstreamError::InvalidResponse(
                        r.message.unwrap_or(r.status),
                    ));
                }
                match (r.lat, r.lon) {
                    (Some(lat), Some(lng)) => Ok(Coordinate::new(lat, lng)),
                    _ => Err(UpstreamError::InvalidResponse("no coordinates".into())),
                }
            }
        }
    }
}

// ─── Google-backed upstream ─────────────────────────────────────

pub struct GoogleUpstream {
    api_key: Option<String>,
    agent: ureq::Agent,
    ip_agent: ureq::Agent,
    ip_services: Vec<IpService>,
}

impl GoogleUpstream {
    pub fn new(api_key: Option<String>, timeout: Duration, ip_timeout: Duration) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            agent: http::agent(timeout),
            ip_agent: http::agent(ip_timeout),
            ip_services: vec![IpService::IpApiCo, IpService::IpApiCom],
        }
    }

    fn key(&self) -> Result<String, UpstreamError> {
        self.api_key.clone().ok_or(UpstreamError::MissingApiKey)
    }

    async fn geocode(&self, param: &'static str, value: String) -> Result<GeocodeHit, UpstreamError> {
        let key = self.key()?;
        let response: GeocodeResponse = http::get_json(
            self.agent.clone(),
            GEOCODE_URL.to_string(),
            vec![(param, value), ("key", key)],
        )
        .await?;
        parse_geocode(response)
    }
}

#[async_trait]
impl Upstream for GoogleUpstream {
    async fn nearby(
        &self,
        center: Coordinate,
        category: FacilityCategory,
        radius_meters: u32,
    ) -> Result<Vec<Facility>, UpstreamError> {
        let key = self.key()?;
        let response: PlacesResponse = http::get_json(
            self.agent.clone(),
            PLACES_URL.to_string(),
            vec![
                ("location", center.to_string()),
                ("radius", radius_meters.to_string()),
                ("type", category.place_type().to_string()),
                ("key", key),
            ],
        )
        .await?;
        debug!(status = %response.status, results = response.results.len(), %category, "Places response");
        parse_places(response)
    }

    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<GeocodeHit, UpstreamError> {
        self.geocode("latlng", coordinate.to_string()).await
    }

    async fn forward_geocode(&self, address: &str) -> Result<GeocodeHit, UpstreamError> {
        self.geocode("address", address.to_string()).await
    }

    async fn ip_lookup(&self) -> Result<Coordinate, UpstreamError> {
        let mut last = UpstreamError::Network("no IP services configured".into());
        for service in &self.ip_services {
            match service.locate(self.ip_agent.clone()).await {
                Ok(c) => return Ok(c),
                Err(e) => {
                    warn!(service = service.url(), error = %e, "IP lookup failed");
                    last = e;
                }
            }
        }
        Err(last)
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}
