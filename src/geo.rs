//! Coordinates and great-circle distance.
//!
//! Distances use the haversine formula with a fixed Earth radius of 6371 km
//! and are rounded to one decimal place. Callers format distances straight
//! from this value, so the rounding is part of the contract.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

const DEG: f64 = PI / 180.0;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 point in decimal degrees. Values are carried as received; nothing
/// here clamps or normalizes them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Parse the `"lat,lng"` form used by geocoding query strings.
    pub fn parse_pair(s: &str) -> Option<Self> {
        let (lat, lng) = s.split_once(',')?;
        let lat = lat.trim().parse().ok()?;
        let lng = lng.trim().parse().ok()?;
        Some(Self { lat, lng })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Haversine distance between two points in kilometers, rounded to 0.1 km.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat) * DEG;
    let d_lng = (b.lng - a.lng) * DEG;

    let h = (d_lat / 2.0).sin().powi(2)
        + (a.lat * DEG).cos() * (b.lat * DEG).cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    round_tenth(EARTH_RADIUS_KM * c)
}

fn round_tenth(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Human-readable coordinate line, e.g. `40.7128°N, 74.0060°W`.
pub fn format_coords(c: Coordinate) -> String {
    let ns = if c.lat >= 0.0 { 'N' } else { 'S' };
    let ew = if c.lng >= 0.0 { 'E' } else { 'W' };
    format!("{:.4}\u{00B0}{}, {:.4}\u{00B0}{}", c.lat.abs(), ns, c.lng.abs(), ew)
}
