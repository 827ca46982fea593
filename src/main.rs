use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use nearcare::client::ProxyClient;
use nearcare::config::Config;
use nearcare::facility::{FacilityCategory, FacilityListing, FacilitySearch};
use nearcare::geo::{distance_km, format_coords, Coordinate};
use nearcare::location::types::AttemptOutcome;
use nearcare::location::{
    FixedProvider, GeoProvider, GpsdProvider, LocationAcquisition, LocationError, LocationNotice,
    LocationSession, NoSensor, RecoveryOption, ResolvedLocation,
};
use nearcare::logging;
use nearcare::server::{self, GoogleUpstream, ServerOptions};

/// nearcare: find hospitals and pharmacies near you.
///
/// Location comes from the position sensor (gpsd) when available, falling
/// back to IP geolocation through the nearcare proxy.
///
/// Examples:
///   nearcare serve
///   nearcare locate
///   nearcare precise
///   nearcare address "10 Downing St, London"
///   nearcare pick --lat 40.7128 --lng -74.0060
///   nearcare search --category pharmacy
///   nearcare distance 40.7128,-74.0060 34.0522,-118.2437
#[derive(Parser)]
#[command(name = "nearcare", version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.nearcare/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the nearcare proxy.
    #[arg(long, global = true, env = "NEARCARE_SERVER")]
    server: Option<String>,

    /// gpsd address, overriding the config file.
    #[arg(long, global = true)]
    gpsd: Option<String>,

    /// Pretend the sensor reports this "lat,lng".
    #[arg(long, global = true, allow_hyphen_values = true, value_parser = parse_coordinate, conflicts_with = "no_sensor")]
    position: Option<Coordinate>,

    /// Accuracy radius (meters) reported with --position.
    #[arg(long, global = true, default_value_t = 10.0)]
    position_accuracy: f64,

    /// Behave as if there is no position sensor.
    #[arg(long, global = true)]
    no_sensor: bool,

    /// More logging (-v info, -vv debug, -vvv trace). RUST_LOG wins.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the current location through the fallback cascade.
    Locate {
        /// Print every cascade step to stderr.
        #[arg(long)]
        trace: bool,
    },
    /// Take one fresh high-accuracy sensor reading.
    Precise,
    /// Set the location from an address, city or postal code.
    Address {
        #[arg(required = true, num_args = 1..)]
        address: Vec<String>,
    },
    /// Set the location to a point picked by hand.
    Pick {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// List nearby facilities.
    Search {
        /// hospital or pharmacy.
        #[arg(long, short = 'c', default_value = "hospital")]
        category: FacilityCategory,
        /// Search around this address instead of the current location.
        #[arg(long, conflicts_with_all = ["lat", "lng"])]
        address: Option<String>,
        #[arg(long, allow_hyphen_values = true, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lng: Option<f64>,
        /// Search radius in meters (default from config).
        #[arg(long)]
        radius: Option<u32>,
    },
    /// Great-circle distance between two "lat,lng" points.
    Distance {
        #[arg(allow_hyphen_values = true, value_parser = parse_coordinate)]
        from: Coordinate,
        #[arg(allow_hyphen_values = true, value_parser = parse_coordinate)]
        to: Coordinate,
    },
    /// Run the places/geocoding proxy.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long, env = "PORT")]
        port: Option<u16>,
        #[arg(long, env = "GOOGLE_MAPS_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
}

fn parse_coordinate(s: &str) -> Result<Coordinate, String> {
    let c = Coordinate::parse_pair(s).ok_or_else(|| format!("Expected 'lat,lng', got '{}'", s))?;
    check_range(c)?;
    Ok(c)
}

fn check_range(c: Coordinate) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&c.lat) || !(-180.0..=180.0).contains(&c.lng) {
        return Err("Invalid coordinates. Lat: -90..90, Lng: -180..180".into());
    }
    Ok(())
}

/// A hand-entered point from `--lat`/`--lng`.
fn manual_point(lat: f64, lng: f64) -> Result<Coordinate, String> {
    let point = Coordinate::new(lat, lng);
    check_range(point)?;
    Ok(point)
}

fn manual_point_or_exit(lat: f64, lng: f64) -> Coordinate {
    manual_point(lat, lng).unwrap_or_else(|msg| {
        eprintln!("Error: {}", msg);
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    match &cli.command {
        Command::Serve { host, port, api_key } => {
            let host = host.clone().unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let upstream = GoogleUpstream::new(
                api_key.clone(),
                Duration::from_millis(config.server.upstream_timeout_ms),
                Duration::from_millis(config.server.ip_timeout_ms),
            );
            let options = ServerOptions::from_config(&config);
            if let Err(e) = server::start(&host, port, Arc::new(upstream), &options).await {
                eprintln!("Error: server failed: {}", e);
                std::process::exit(1);
            }
        }
        Command::Distance { from, to } => {
            let km = distance_km(*from, *to);
            eprintln!("  {} \u{2192} {}: {:.1} km", format_coords(*from), format_coords(*to), km);
            print_json(&DistanceOutput { from: *from, to: *to, distance_km: km });
        }
        command => {
            let client = Arc::new(ProxyClient::new(
                cli.server.as_deref().unwrap_or(&config.client.server_url),
                Duration::from_millis(config.client.timeout_ms),
            ));
            let acquisition = LocationAcquisition::new(sensor(&cli, &config), client.clone(), client.clone())
                .with_settings(config.acquisition.settings());
            let session = LocationSession::new(acquisition);
            run_location_command(command, &session, &*client, &config).await;
        }
    }
}

fn sensor(cli: &Cli, config: &Config) -> Arc<dyn GeoProvider> {
    if let Some(c) = cli.position {
        return Arc::new(FixedProvider::new(c, cli.position_accuracy));
    }
    if cli.no_sensor || (!config.sensor.gpsd && cli.gpsd.is_none()) {
        return Arc::new(NoSensor);
    }
    let addr = cli.gpsd.clone().unwrap_or_else(|| config.sensor.gpsd_addr.clone());
    Arc::new(GpsdProvider::new(addr))
}

async fn run_location_command(command: &Command, session: &LocationSession, search: &dyn FacilitySearch, config: &Config) {
    match command {
        Command::Locate { trace } => {
            let report = session.refresh_traced().await;
            if *trace {
                for attempt in &report.attempts {
                    let outcome = match &attempt.outcome {
                        AttemptOutcome::Resolved { coordinate } => format!("ok {}", format_coords(*coordinate)),
                        AttemptOutcome::Failed { reason } => format!("failed: {}", reason),
                    };
                    eprintln!("  \u{2022} {}: {}", attempt.strategy, outcome);
                }
            }
            let loc = report.outcome.unwrap_or_else(|e| exit_with(&e));
            print_location(&loc);
        }
        Command::Precise => {
            let loc = session.request_high_accuracy().await.unwrap_or_else(|e| exit_with(&e));
            print_location(&loc);
        }
        Command::Address { address } => {
            let loc = session
                .resolve_address(&address.join(" "))
                .await
                .unwrap_or_else(|e| exit_with(&e));
            print_location(&loc);
        }
        Command::Pick { lat, lng } => {
            let loc = session.accept_manual_point(manual_point_or_exit(*lat, *lng)).await;
            print_location(&loc);
        }
        Command::Search { category, address, lat, lng, radius } => {
            let loc = match (address, lat, lng) {
                (Some(a), _, _) => session.resolve_address(a).await,
                (None, Some(lat), Some(lng)) => Ok(session.accept_manual_point(manual_point_or_exit(*lat, *lng)).await),
                _ => session.refresh().await,
            }
            .unwrap_or_else(|e| exit_with(&e));
            print_banner(&loc);

            let radius = radius.unwrap_or(config.search.radius_m);
            let facilities = search
                .search(loc.coordinate, *category, radius)
                .await
                .unwrap_or_else(|e| {
                    eprintln!("Error fetching {}: {}", category.list_title().to_lowercase(), e);
                    std::process::exit(1);
                });

            let listing = FacilityListing::build(*category, facilities, Some(loc.coordinate));
            eprint!("{}", listing.render_text());
            print_json(&SearchOutput { location: &loc, listing: &listing });
        }
        Command::Serve { .. } | Command::Distance { .. } => {}
    }
}

// ─── Output ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct DistanceOutput {
    from: Coordinate,
    to: Coordinate,
    distance_km: f64,
}

#[derive(Serialize)]
struct LocationOutput<'a> {
    #[serde(flatten)]
    location: &'a ResolvedLocation,
    notice: LocationNotice,
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    location: &'a ResolvedLocation,
    listing: &'a FacilityListing,
}

fn print_banner(loc: &ResolvedLocation) {
    let notice = LocationNotice::for_location(loc);
    eprintln!("  {}", loc.display_line());
    eprintln!("  {}", notice.message);
    if let Some(warning) = &loc.warning {
        eprintln!("  \u{26A0}\u{FE0F}  {}", warning);
    }
    if let Some(prompt) = notice.prompt {
        eprintln!("  {}", prompt);
        eprintln!("    {}", RecoveryOption::EnterAddress.command_hint());
    }
}

fn print_location(loc: &ResolvedLocation) {
    print_banner(loc);
    print_json(&LocationOutput {
        location: loc,
        notice: LocationNotice::for_location(loc),
    });
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: could not encode output: {}", e);
            std::process::exit(1);
        }
    }
}

fn exit_with(err: &LocationError) -> ! {
    eprintln!("Error: {}", err);
    if *err == LocationError::LocationUnavailable {
        eprintln!();
        eprintln!("Options:");
        for option in RecoveryOption::ALL {
            eprintln!("  {:<30} {}", option.to_string(), option.command_hint());
        }
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range(Coordinate::new(40.7128, -74.0060)).is_ok());
        assert!(check_range(Coordinate::new(90.0, 180.0)).is_ok());
        assert!(check_range(Coordinate::new(91.0, 0.0)).is_err());
        assert!(check_range(Coordinate::new(0.0, -180.5)).is_err());
    }

    #[test]
    fn test_manual_point_rejects_out_of_range() {
        assert_eq!(manual_point(40.7, -74.0), Ok(Coordinate::new(40.7, -74.0)));
        assert!(manual_point(123.0, -74.0).is_err());
        assert!(manual_point(40.7, 200.0).is_err());
    }

    #[test]
    fn test_search_lat_lng_parsed() {
        let cli = Cli::try_parse_from(["nearcare", "search", "--lat", "40.7", "--lng", "-74.0"]).unwrap();
        match cli.command {
            Command::Search { lat, lng, .. } => {
                assert_eq!(lat, Some(40.7));
                assert_eq!(lng, Some(-74.0));
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_out_of_range_position_rejected() {
        assert!(parse_coordinate("95.0,10.0").is_err());
        assert!(Cli::try_parse_from(["nearcare", "--position", "95.0,10.0", "locate"]).is_err());
    }
}
