//! JSON bodies exchanged between the proxy server and its clients.

use serde::{Deserialize, Serialize};

use crate::facility::{Facility, FacilityCategory};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub code: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilitiesResponse {
    pub category: FacilityCategory,
    pub results: Vec<Facility>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResponse {
    pub lat: f64,
    pub lng: f64,
    pub formatted_address: String,
}

/// `used_default` is set when the server could not locate the caller and
/// answered with its configured default coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpLocationResponse {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub used_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub api_key_configured: bool,
}
