//! Configuration file at ~/.nearcare/config.toml.
//!
//! Every field has a default and a missing file means "all defaults". Secrets
//! (the Google API key) are never read from here, only from the environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::facility::DEFAULT_RADIUS_M;
use crate::geo::Coordinate;
use crate::location::gpsd::DEFAULT_GPSD_ADDR;
use crate::location::AcquisitionSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub acquisition: AcquisitionConfig,
    pub sensor: SensorConfig,
    pub ip: IpConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub high_accuracy_timeout_ms: u64,
    pub standard_timeout_ms: u64,
    pub standard_max_age_ms: u64,
    pub precise_timeout_ms: u64,
    /// Reported radius (meters) under which a precise reading is High.
    pub precise_radius_m: f64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            high_accuracy_timeout_ms: 15_000,
            standard_timeout_ms: 10_000,
            standard_max_age_ms: 60_000,
            precise_timeout_ms: 30_000,
            precise_radius_m: 100.0,
        }
    }
}

impl AcquisitionConfig {
    pub fn settings(&self) -> AcquisitionSettings {
        AcquisitionSettings {
            high_accuracy_timeout: Duration::from_millis(self.high_accuracy_timeout_ms),
            standard_timeout: Duration::from_millis(self.standard_timeout_ms),
            standard_max_age: Duration::from_millis(self.standard_max_age_ms),
            precise_timeout: Duration::from_millis(self.precise_timeout_ms),
            precise_radius_threshold: self.precise_radius_m,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    /// Read positions from gpsd. When off the platform has no sensor.
    pub gpsd: bool,
    pub gpsd_addr: String,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            gpsd: true,
            gpsd_addr: DEFAULT_GPSD_ADDR.to_string(),
        }
    }
}

/// Default coordinate served when no IP service answers (center of the
/// contiguous United States).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct IpConfig {
    pub default_lat: f64,
    pub default_lng: f64,
}

impl Default for IpConfig {
    fn default() -> Self {
        Self {
            default_lat: 37.0902,
            default_lng: -95.7129,
        }
    }
}

impl IpConfig {
    pub fn default_location(&self) -> Coordinate {
        Coordinate::new(self.default_lat, self.default_lng)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub radius_m: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            radius_m: DEFAULT_RADIUS_M,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// CORS origins; empty allows any.
    pub allowed_origins: Vec<String>,
    pub upstream_timeout_ms: u64,
    pub ip_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
            allowed_origins: Vec::new(),
            upstream_timeout_ms: 10_000,
            ip_timeout_ms: 5_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the nearcare proxy.
    pub server_url: String,
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3001".into(),
            timeout_ms: 10_000,
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nearcare")
            .join("config.toml")
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; the default one may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::read(p),
            None => {
                let p = Self::default_path();
                if p.exists() {
                    Self::read(&p)
                } else {
                    debug!(path = %p.display(), "No config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }
}
