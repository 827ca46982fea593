//! Position sensor backed by a gpsd daemon.
//!
//! Speaks the gpsd JSON protocol: enable watching, then read reports until a
//! TPV with a good enough fix arrives. A 3D fix is required for high-accuracy
//! requests, a 2D fix is enough otherwise. The last fix is kept so requests
//! that tolerate a cached sample can skip the daemon.

use async_trait::async_trait;
use serde::Deserialize;
use std::io::ErrorKind;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use super::providers::{GeoProvider, PositionRequest, PositionSample};
use super::types::LocationError;
use crate::geo::Coordinate;

pub const DEFAULT_GPSD_ADDR: &str = "127.0.0.1:2947";

const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

/// Radius reported when gpsd gives no error estimate.
const UNKNOWN_RADIUS_M: f64 = f64::INFINITY;

#[derive(Deserialize)]
struct Report {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    eph: Option<f64>,
    epx: Option<f64>,
    epy: Option<f64>,
}

pub struct GpsdProvider {
    addr: String,
    last_fix: Mutex<Option<(Instant, PositionSample)>>,
}

impl GpsdProvider {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            last_fix: Mutex::new(None),
        }
    }

    fn cached(&self, max_age: Duration) -> Option<PositionSample> {
        let guard = self.last_fix.lock().ok()?;
        match *guard {
            Some((at, sample)) if at.elapsed() <= max_age => Some(sample),
            _ => None,
        }
    }

    fn remember(&self, sample: PositionSample) {
        if let Ok(mut guard) = self.last_fix.lock() {
            *guard = Some((Instant::now(), sample));
        }
    }

    async fn read_fix(&self, min_mode: u8) -> Result<PositionSample, LocationError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| self.connect_error(e))?;
        let (read, mut write) = stream.into_split();

        write
            .write_all(WATCH_COMMAND)
            .await
            .map_err(|e| LocationError::SensorUnavailable(format!("gpsd at {}: {}", self.addr, e)))?;

        let mut lines = BufReader::new(read).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| LocationError::SensorUnavailable(format!("gpsd at {}: {}", self.addr, e)))?
        {
            if let Some(sample) = parse_tpv(&line, min_mode) {
                return Ok(sample);
            }
        }

        Err(LocationError::SensorUnavailable(format!(
            "gpsd at {} closed the connection before reporting a fix",
            self.addr
        )))
    }

    fn connect_error(&self, e: std::io::Error) -> LocationError {
        match e.kind() {
            ErrorKind::PermissionDenied => {
                LocationError::SensorDenied(format!("gpsd at {}: {}", self.addr, e))
            }
            _ => LocationError::SensorUnavailable(format!("gpsd at {}: {}", self.addr, e)),
        }
    }
}

#[async_trait]
impl GeoProvider for GpsdProvider {
    async fn position(&self, request: PositionRequest) -> Result<PositionSample, LocationError> {
        if !request.max_cached_age.is_zero() {
            if let Some(sample) = self.cached(request.max_cached_age) {
                debug!(addr = %self.addr, "Serving cached gpsd fix");
                return Ok(sample);
            }
        }

        let min_mode = if request.high_accuracy { 3 } else { 2 };
        match tokio::time::timeout(request.timeout, self.read_fix(min_mode)).await {
            Ok(Ok(sample)) => {
                self.remember(sample);
                Ok(sample)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LocationError::SensorTimeout(request.timeout)),
        }
    }

    fn name(&self) -> &str {
        "gpsd"
    }
}

/// Parse one gpsd report line; `Some` only for a TPV at or above `min_mode`.
pub(crate) fn parse_tpv(line: &str, min_mode: u8) -> Option<PositionSample> {
    let report: Report = serde_json::from_str(line).ok()?;
    if report.class != "TPV" || report.mode < min_mode {
        return None;
    }
    let coordinate = Coordinate::new(report.lat?, report.lon?);
    let accuracy_radius = report
        .eph
        .or_else(|| match (report.epx, report.epy) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (x, y) => x.or(y),
        })
        .unwrap_or(UNKNOWN_RADIUS_M);

    Some(PositionSample { coordinate, accuracy_radius })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const TPV_3D: &str = r#"{"class":"TPV","device":"/dev/ttyACM0","mode":3,"time":"2026-10-19T10:00:00.000Z","lat":59.3293,"lon":18.0686,"eph":4.5}"#;
    const TPV_2D: &str = r#"{"class":"TPV","device":"/dev/ttyACM0","mode":2,"lat":59.33,"lon":18.07,"epx":12.0,"epy":20.0}"#;
    const TPV_NOFIX: &str = r#"{"class":"TPV","device":"/dev/ttyACM0","mode":1}"#;
    const VERSION: &str = r#"{"class":"VERSION","release":"3.25","rev":"3.25","proto_major":3,"proto_minor":15}"#;

    fn request(high_accuracy: bool, timeout: Duration, max_cached_age: Duration) -> PositionRequest {
        PositionRequest { high_accuracy, timeout, max_cached_age }
    }

    /// Serve `lines` to every client, then keep the socket open.
    async fn fake_gpsd(lines: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(s) => s,
                    Err(_) => return,
                };
                let lines = lines.clone();
                tokio::spawn(async move {
                    for line in lines {
                        let _ = socket.write_all(format!("{}\n", line).as_bytes()).await;
                    }
                    tokio::time::sleep(Duration::from_secs(60)).await;
                });
            }
        });
        addr
    }

    #[test]
    fn test_parse_tpv_3d() {
        let s = parse_tpv(TPV_3D, 3).unwrap();
        assert_eq!(s.coordinate, Coordinate::new(59.3293, 18.0686));
        assert_eq!(s.accuracy_radius, 4.5);
    }

    #[test]
    fn test_parse_tpv_mode_gate() {
        assert!(parse_tpv(TPV_2D, 3).is_none());
        assert!(parse_tpv(TPV_2D, 2).is_some());
        assert!(parse_tpv(TPV_NOFIX, 2).is_none());
        assert!(parse_tpv(VERSION, 0).is_none());
        assert!(parse_tpv("not json", 0).is_none());
    }

    #[test]
    fn test_parse_tpv_radius_from_epx_epy() {
        let s = parse_tpv(TPV_2D, 2).unwrap();
        assert_eq!(s.accuracy_radius, 20.0);

        let bare = r#"{"class":"TPV","mode":3,"lat":1.0,"lon":2.0}"#;
        assert!(parse_tpv(bare, 3).unwrap().accuracy_radius.is_infinite());
    }

    #[tokio::test]
    async fn test_reads_fix_from_daemon() {
        let addr = fake_gpsd(vec![VERSION, TPV_NOFIX, TPV_2D, TPV_3D]).await;
        let gpsd = GpsdProvider::new(addr);

        let s = gpsd
            .position(request(true, Duration::from_secs(5), Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(s.coordinate, Coordinate::new(59.3293, 18.0686));
    }

    #[tokio::test]
    async fn test_standard_request_accepts_2d_fix() {
        let addr = fake_gpsd(vec![VERSION, TPV_2D]).await;
        let gpsd = GpsdProvider::new(addr);

        let s = gpsd
            .position(request(false, Duration::from_secs(5), Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(s.coordinate, Coordinate::new(59.33, 18.07));
    }

    #[tokio::test]
    async fn test_no_fix_times_out() {
        let addr = fake_gpsd(vec![VERSION, TPV_NOFIX]).await;
        let gpsd = GpsdProvider::new(addr);

        let err = gpsd
            .position(request(true, Duration::from_millis(200), Duration::ZERO))
            .await
            .unwrap_err();
        assert_eq!(err, LocationError::SensorTimeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let gpsd = GpsdProvider::new(addr);
        let err = gpsd
            .position(request(true, Duration::from_secs(2), Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, LocationError::SensorUnavailable(_)));
    }

    #[tokio::test]
    async fn test_cached_fix_served_within_max_age() {
        let addr = fake_gpsd(vec![VERSION, TPV_3D]).await;
        let gpsd = GpsdProvider::new(addr);
        let first = gpsd
            .position(request(true, Duration::from_secs(5), Duration::ZERO))
            .await
            .unwrap();

        // Point at a dead address: only the cache can answer now.
        let gpsd = GpsdProvider {
            addr: "127.0.0.1:1".into(),
            last_fix: Mutex::new(*gpsd.last_fix.lock().unwrap()),
        };
        let cached = gpsd
            .position(request(false, Duration::from_secs(2), Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(cached, first);

        let err = gpsd
            .position(request(true, Duration::from_secs(2), Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, LocationError::SensorUnavailable(_)));
    }
}
