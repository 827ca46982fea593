//! nearcare: find hospitals and pharmacies near the user.
//!
//! The location subsystem resolves a position through a fallback cascade
//! (sensor with refinement, standard sensor, IP lookup) and the server module
//! proxies the places, geocoding and IP services that cascade depends on.

pub mod api;
pub mod client;
pub mod config;
pub mod facility;
pub mod geo;
pub mod http;
pub mod location;
pub mod logging;
pub mod server;
