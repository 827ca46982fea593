//! Thin HTTP proxy in front of the places, geocoding and IP services.
//!
//! Keeps the Google API key on the server; clients only ever talk to these
//! endpoints.

mod handlers;
mod state;
pub mod upstream;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::geo::Coordinate;

pub use handlers::DEFAULT_LOCATION_MESSAGE;
pub use state::AppState;
pub use upstream::{GoogleUpstream, Upstream, UpstreamError};

/// Router options taken from configuration.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub search_radius: u32,
    pub default_location: Coordinate,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl ServerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            search_radius: config.search.radius_m,
            default_location: config.ip.default_location(),
            allowed_origins: config.server.allowed_origins.clone(),
        }
    }
}

pub fn build_router(upstream: Arc<dyn Upstream>, options: &ServerOptions) -> Router {
    let state = Arc::new(AppState {
        upstream,
        search_radius: options.search_radius,
        default_location: options.default_location,
    });

    Router::new()
        .route("/api/hospitals", get(handlers::hospitals))
        .route("/api/medical-stores", get(handlers::medical_stores))
        .route("/api/facilities", get(handlers::facilities))
        .route("/api/geocode", get(handlers::reverse_geocode))
        .route("/api/geocode-address", get(handlers::forward_geocode))
        .route("/api/ip-location", get(handlers::ip_location))
        .route("/api/health", get(handlers::health))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors_layer(&options.allowed_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods([Method::GET])
        .allow_credentials(true)
}

pub async fn start(host: &str, port: u16, upstream: Arc<dyn Upstream>, options: &ServerOptions) -> std::io::Result<()> {
    if !upstream.has_api_key() {
        warn!("GOOGLE_MAPS_API_KEY is not set; places and geocoding endpoints will answer 500");
    }

    let app = build_router(upstream, options);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "nearcare proxy listening");
    eprintln!("  nearcare proxy listening on http://{}", addr);
    eprintln!("  Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
