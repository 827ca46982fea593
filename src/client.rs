//! Client side of the proxy: geocoding, IP lookup and facility search served
//! by a running `nearcare serve`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::api::{FacilitiesResponse, GeocodeResponse, IpLocationResponse};
use crate::facility::{cap_results, Facility, FacilityCategory, FacilityError, FacilitySearch};
use crate::geo::Coordinate;
use crate::http::{self, HttpError};
use crate::location::providers::{ForwardGeocode, GeocodeRefiner, IpLocator, IpLookup, ReverseGeocode};
use crate::location::LocationError;

/// Prefix the proxy puts on messages relayed from a denied Google request.
const DENIED_PREFIX: &str = "Google API error";

#[derive(Clone)]
pub struct ProxyClient {
    base_url: String,
    agent: ureq::Agent,
}

impl ProxyClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: http::agent(timeout),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl GeocodeRefiner for ProxyClient {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<ReverseGeocode, LocationError> {
        let body: GeocodeResponse = http::get_json(
            self.agent.clone(),
            self.url("/api/geocode"),
            vec![("latlng", coordinate.to_string())],
        )
        .await
        .map_err(|e| LocationError::RefinementFailed(e.to_string()))?;

        if body.formatted_address.trim().is_empty() {
            return Err(LocationError::RefinementFailed("empty geocoder result".into()));
        }
        Ok(ReverseGeocode {
            refined: Coordinate::new(body.lat, body.lng),
            formatted_address: body.formatted_address,
        })
    }

    async fn forward_geocode(&self, address: &str) -> Result<ForwardGeocode, LocationError> {
        let body: GeocodeResponse = http::get_json(
            self.agent.clone(),
            self.url("/api/geocode-address"),
            vec![("address", address.to_string())],
        )
        .await
        .map_err(|e| match e {
            HttpError::Status(404, _) => LocationError::geocode_failed(address, "no results"),
            other => LocationError::geocode_failed(address, other.to_string()),
        })?;

        let formatted = Some(body.formatted_address).filter(|a| !a.trim().is_empty());
        Ok(ForwardGeocode {
            coordinate: Coordinate::new(body.lat, body.lng),
            formatted_address: formatted,
        })
    }
}

#[async_trait]
impl IpLocator for ProxyClient {
    async fn lookup(&self) -> Result<IpLookup, LocationError> {
        let body: IpLocationResponse = http::get_json(self.agent.clone(), self.url("/api/ip-location"), Vec::new())
            .await
            .map_err(|e| LocationError::IpLookupFailed(e.to_string()))?;

        debug!(used_default = body.used_default, "IP location answer");
        Ok(IpLookup {
            coordinate: Coordinate::new(body.latitude, body.longitude),
            used_default: body.used_default,
        })
    }
}

#[async_trait]
impl FacilitySearch for ProxyClient {
    async fn search(
        &self,
        coordinate: Coordinate,
        category: FacilityCategory,
        radius_meters: u32,
    ) -> Result<Vec<Facility>, FacilityError> {
        let body: FacilitiesResponse = http::get_json(
            self.agent.clone(),
            self.url("/api/facilities"),
            vec![
                ("lat", coordinate.lat.to_string()),
                ("lng", coordinate.lng.to_string()),
                ("category", category.to_string()),
                ("radius", radius_meters.to_string()),
            ],
        )
        .await
        .map_err(facility_error)?;

        Ok(cap_results(body.results))
    }
}

fn facility_error(e: HttpError) -> FacilityError {
    match e {
        HttpError::Status(_, msg) if msg.starts_with(DENIED_PREFIX) => FacilityError::RequestDenied(msg),
        HttpError::Decode(msg) => FacilityError::InvalidResponse(msg),
        other => FacilityError::Upstream(other.to_string()),
    }
}
