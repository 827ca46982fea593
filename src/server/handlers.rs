use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::api::{ApiErrorBody, FacilitiesResponse, GeocodeResponse, HealthResponse, IpLocationResponse};
use crate::facility::{cap_results, FacilityCategory};
use crate::geo::Coordinate;

use super::state::AppState;
use super::upstream::UpstreamError;

pub const DEFAULT_LOCATION_MESSAGE: &str =
    "Could not determine location from IP; using default location";

// ─── Error response ──────────────────────────────────────────────

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

/// Map an upstream failure, with `action` naming what was attempted.
fn upstream_error(e: UpstreamError, action: &str) -> ApiError {
    warn!(error = %e, "Error {}", action);
    match e {
        UpstreamError::MissingApiKey => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        UpstreamError::NoResults => api_error(StatusCode::NOT_FOUND, format!("No results while {}", action)),
        UpstreamError::RequestDenied(_) => api_error(StatusCode::BAD_GATEWAY, e.to_string()),
        UpstreamError::Network(_) | UpstreamError::InvalidResponse(_) => {
            api_error(StatusCode::BAD_GATEWAY, format!("Failed {}", action))
        }
    }
}

fn require_coords(lat: Option<f64>, lng: Option<f64>) -> Result<Coordinate, ApiError> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Ok(Coordinate::new(lat, lng)),
        _ => Err(api_error(StatusCode::BAD_REQUEST, "Latitude and longitude are required")),
    }
}

// ─── Facilities ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Deserialize)]
pub struct FacilitiesQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub category: Option<String>,
    pub radius: Option<u32>,
}

async fn search(
    state: &AppState,
    center: Coordinate,
    category: FacilityCategory,
    radius: u32,
) -> Result<Json<FacilitiesResponse>, ApiError> {
    let start = Instant::now();
    let results = cap_results(
        state
            .upstream
            .nearby(center, category, radius)
            .await
            .map_err(|e| upstream_error(e, &format!("fetching nearby {}", category)))?,
    );

    info!(
        %category,
        lat = center.lat,
        lng = center.lng,
        radius,
        results = results.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Nearby search"
    );
    Ok(Json(FacilitiesResponse { category, results }))
}

/// GET /api/hospitals
pub async fn hospitals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyQuery>,
) -> Result<Json<FacilitiesResponse>, ApiError> {
    let center = require_coords(params.lat, params.lng)?;
    search(&state, center, FacilityCategory::Hospital, state.search_radius).await
}

/// GET /api/medical-stores
pub async fn medical_stores(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyQuery>,
) -> Result<Json<FacilitiesResponse>, ApiError> {
    let center = require_coords(params.lat, params.lng)?;
    search(&state, center, FacilityCategory::Pharmacy, state.search_radius).await
}

/// GET /api/facilities
pub async fn facilities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FacilitiesQuery>,
) -> Result<Json<FacilitiesResponse>, ApiError> {
    let center = require_coords(params.lat, params.lng)?;
    let category = match params.category.as_deref() {
        Some(c) => c
            .parse::<FacilityCategory>()
            .map_err(|msg| api_error(StatusCode::BAD_REQUEST, msg))?,
        None => FacilityCategory::Hospital,
    };
    let radius = params.radius.unwrap_or(state.search_radius);
    if radius == 0 {
        return Err(api_error(StatusCode::BAD_REQUEST, "Radius must be positive"));
    }
    search(&state, center, category, radius).await
}

// ─── Geocoding ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ReverseQuery {
    pub latlng: Option<String>,
}

#[derive(Deserialize)]
pub struct ForwardQuery {
    pub address: Option<String>,
}

/// GET /api/geocode
pub async fn reverse_geocode(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReverseQuery>,
) -> Result<Json<GeocodeResponse>, ApiError> {
    let coordinate = params
        .latlng
        .as_deref()
        .and_then(Coordinate::parse_pair)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Latitude and longitude are required"))?;

    let hit = state
        .upstream
        .reverse_geocode(coordinate)
        .await
        .map_err(|e| upstream_error(e, "reverse geocoding"))?;

    info!(lat = coordinate.lat, lng = coordinate.lng, address = %hit.formatted_address, "Reverse geocode");
    Ok(Json(GeocodeResponse {
        lat: hit.coordinate.lat,
        lng: hit.coordinate.lng,
        formatted_address: hit.formatted_address,
    }))
}

/// GET /api/geocode-address
pub async fn forward_geocode(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ForwardQuery>,
) -> Result<Json<GeocodeResponse>, ApiError> {
    let address = params.address.as_deref().unwrap_or("").trim();
    if address.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Address is required"));
    }

    let hit = state
        .upstream
        .forward_geocode(address)
        .await
        .map_err(|e| upstream_error(e, "geocoding address"))?;

    info!(query = address, address = %hit.formatted_address, "Forward geocode");
    Ok(Json(GeocodeResponse {
        lat: hit.coordinate.lat,
        lng: hit.coordinate.lng,
        formatted_address: hit.formatted_address,
    }))
}

// ─── IP location ─────────────────────────────────────────────────

/// GET /api/ip-location
///
/// Never fails: when no IP service answers, the configured default is
/// returned with `used_default` set.
pub async fn ip_location(State(state): State<Arc<AppState>>) -> Json<IpLocationResponse> {
    match state.upstream.ip_lookup().await {
        Ok(c) => Json(IpLocationResponse {
            latitude: c.lat,
            longitude: c.lng,
            used_default: false,
            message: None,
        }),
        Err(e) => {
            warn!(error = %e, "Error fetching IP location, answering with default");
            Json(IpLocationResponse {
                latitude: state.default_location.lat,
                longitude: state.default_location.lng,
                used_default: true,
                message: Some(DEFAULT_LOCATION_MESSAGE.to_string()),
            })
        }
    }
}

// ─── Health ──────────────────────────────────────────────────────

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        api_key_configured: state.upstream.has_api_key(),
    })
}
