//! Location acquisition subsystem.
//!
//! Resolves the user's position through a cascade of sensor, refinement and
//! IP strategies, assigns a confidence tier, and keeps the single current
//! location behind a single-flight guard.

pub mod acquisition;
pub mod gpsd;
pub mod messaging;
pub mod providers;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use acquisition::{AcquisitionReport, AcquisitionSettings, LocationAcquisition};
pub use gpsd::GpsdProvider;
pub use messaging::{accuracy_message, LocationNotice, RecoveryOption};
pub use providers::{FixedProvider, GeoProvider, GeocodeRefiner, IpLocator, NoSensor};
pub use session::LocationSession;
pub use types::{AccuracyTier, AcquisitionMethod, LocationError, ResolvedLocation};
