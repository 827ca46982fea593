use std::sync::Arc;

use super::upstream::Upstream;
use crate::geo::Coordinate;

pub struct AppState {
    pub upstream: Arc<dyn Upstream>,
    /// Radius for the fixed-category endpoints.
    pub search_radius: u32,
    /// Answer for `/api/ip-location` when every IP service failed.
    pub default_location: Coordinate,
}
