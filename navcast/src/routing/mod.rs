//! Routing and geocoding collaborators.
//!
//! The engine only sees two traits: [`RoutePlanner`] turns an origin and a
//! destination into a [`Route`], and [`Geocoder`] turns a free-text address
//! into a coordinate. Both are blocking and are called from blocking tasks,
//! wrapped in a [`RetryPolicy`].
//!
//! Implementations:
//!
//! - [`BaiduClient`]: directions and geocoding over HTTP
//! - [`LocalRouteFile`]: a pre-computed route stored in the directions
//!   response format

mod baidu;
mod http;
mod route_file;

pub use baidu::{
    parse_directions, parse_geocoding, BaiduClient, BaiduConfig, DEFAULT_BASE_URL, DEFAULT_REGION,
};
pub use http::{HttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use route_file::LocalRouteFile;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info};

use crate::geo::{Coordinate, CoordinateTransform};
use crate::retry::RetryPolicy;
use crate::route::{Route, RouteError};

/// Errors from routing, geocoding and route files.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Transport-level failure (connection, timeout, HTTP status).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The service answered with a non-zero status.
    #[error("routing service returned status {status}: {message}")]
    Api { status: i64, message: String },

    /// The response body could not be understood.
    #[error("invalid routing response: {0}")]
    Parse(String),

    /// The response contained no usable route.
    #[error("no route found")]
    NoRoute,

    /// The flattened route violated a route invariant.
    #[error("invalid route: {0}")]
    InvalidRoute(#[from] RouteError),

    /// A local route file could not be read.
    #[error("failed to read route file {path}: {source}")]
    RouteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The destination input was neither a valid coordinate nor an address.
    #[error("invalid destination '{input}': {reason}")]
    InvalidDestination { input: String, reason: String },

    /// The background task running the request failed.
    #[error("routing task failed: {0}")]
    Task(String),
}

/// Produces routes between two coordinates in the route datum.
pub trait RoutePlanner: Send + Sync {
    /// Plan a route. Blocking.
    fn plan(&self, origin: Coordinate, destination: Coordinate) -> Result<Route, RoutingError>;
}

/// Resolves free-text addresses to coordinates in the route datum.
pub trait Geocoder: Send + Sync {
    /// Resolve an address. Blocking.
    fn geocode(&self, address: &str) -> Result<Coordinate, RoutingError>;
}

/// A user-supplied destination.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// A `lat,lon` pair.
    Coordinate(Coordinate),
    /// Anything else; needs geocoding.
    Address(String),
}

impl FromStr for Destination {
    type Err = RoutingError;

    /// Two comma-separated numbers are a coordinate and must be in range;
    /// any other non-blank input is an address.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RoutingError::InvalidDestination {
                input: input.to_string(),
                reason: "destination is empty".to_string(),
            });
        }

        let parts: Vec<&str> = trimmed.split(',').collect();
        if let [lat, lon] = parts.as_slice() {
            if let (Ok(lat), Ok(lon)) = (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
                return Coordinate::try_new(lat, lon)
                    .map(Destination::Coordinate)
                    .map_err(|e| RoutingError::InvalidDestination {
                        input: input.to_string(),
                        reason: e.to_string(),
                    });
            }
        }

        Ok(Destination::Address(trimmed.to_string()))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Coordinate(c) => write!(f, "{}", c),
            Destination::Address(a) => f.write_str(a),
        }
    }
}

/// Turn destination input into a route-datum coordinate, geocoding
/// addresses.
///
/// Typed coordinates are in the fix datum and go through `transform`;
/// geocoded addresses already come back in the route datum.
pub fn resolve_destination(
    input: &str,
    geocoder: &dyn Geocoder,
    policy: &RetryPolicy,
    transform: &dyn CoordinateTransform,
) -> Result<Coordinate, RoutingError> {
    match input.parse::<Destination>()? {
        Destination::Coordinate(c) => {
            let converted = transform.convert(c);
            debug!(input = %c, converted = %converted, "Destination converted to route datum");
            Ok(converted)
        }
        Destination::Address(address) => {
            let coordinate = policy.run("geocode", |_| geocoder.geocode(&address))?;
            info!(address = %address, coordinate = %coordinate, "Destination resolved");
            Ok(coordinate)
        }
    }
}

/// Plan a route under a retry policy.
pub fn plan_with_retry(
    planner: &dyn RoutePlanner,
    policy: &RetryPolicy,
    origin: Coordinate,
    destination: Coordinate,
) -> Result<Route, RoutingError> {
    policy.run("plan route", |_| planner.plan(origin, destination))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Identity, Wgs84ToBd09};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyGeocoder {
        failures: u32,
        calls: AtomicU32,
    }

    impl Geocoder for FlakyGeocoder {
        fn geocode(&self, _address: &str) -> Result<Coordinate, RoutingError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(RoutingError::Http("timeout".into()))
            } else {
                Ok(Coordinate::new(34.2, 108.9))
            }
        }
    }

    #[test]
    fn test_destination_parsing() {
        assert_eq!(
            "34.21, 108.95".parse::<Destination>().unwrap(),
            Destination::Coordinate(Coordinate::new(34.21, 108.95))
        );
        assert_eq!(
            "大雁塔".parse::<Destination>().unwrap(),
            Destination::Address("大雁塔".to_string())
        );
        // Not two numbers: an address
        assert_eq!(
            "长安路,西安".parse::<Destination>().unwrap(),
            Destination::Address("长安路,西安".to_string())
        );
        assert!(matches!(
            "91.0,108.0".parse::<Destination>(),
            Err(RoutingError::InvalidDestination { .. })
        ));
        assert!("   ".parse::<Destination>().is_err());
    }

    #[test]
    fn test_coordinate_destination_skips_geocoder() {
        let geocoder = FlakyGeocoder {
            failures: 0,
            calls: AtomicU32::new(0),
        };
        let c = resolve_destination("34.0,108.0", &geocoder, &RetryPolicy::None, &Identity).unwrap();
        assert_eq!(c, Coordinate::new(34.0, 108.0));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_typed_coordinate_is_converted_to_route_datum() {
        let geocoder = FlakyGeocoder {
            failures: 0,
            calls: AtomicU32::new(0),
        };
        let typed = Coordinate::new(34.2245, 108.9400);
        let c = resolve_destination("34.2245,108.9400", &geocoder, &RetryPolicy::None, &Wgs84ToBd09)
            .unwrap();
        assert_eq!(c, Wgs84ToBd09.convert(typed));
        assert_ne!(c, typed);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_geocoded_address_is_not_converted() {
        let geocoder = FlakyGeocoder {
            failures: 0,
            calls: AtomicU32::new(0),
        };
        let c = resolve_destination("大雁塔", &geocoder, &RetryPolicy::None, &Wgs84ToBd09).unwrap();
        assert_eq!(c, Coordinate::new(34.2, 108.9));
    }

    #[test]
    fn test_address_geocoding_is_retried() {
        let geocoder = FlakyGeocoder {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let c = resolve_destination("大雁塔", &geocoder, &policy, &Wgs84ToBd09).unwrap();
        assert_eq!(c, Coordinate::new(34.2, 108.9));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_geocoding_gives_up_after_budget() {
        let geocoder = FlakyGeocoder {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let err = resolve_destination("大雁塔", &geocoder, &policy, &Wgs84ToBd09).unwrap_err();
        assert!(matches!(err, RoutingError::Http(_)));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 3);
    }
}
