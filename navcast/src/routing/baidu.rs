//! Baidu-style directions and geocoding client.
//!
//! # Directions
//!
//! `GET {base_url}/directionlite/v1/driving?origin=lat,lon&destination=lat,lon&output=json&ak=KEY`
//!
//! ```json
//! {"status": 0, "message": "ok",
//!  "result": {"routes": [{"steps": [
//!     {"instruction": "沿<b>长安路</b>行驶500米", "path": "108.94,34.22;108.94,34.23"}
//!  ]}]}}
//! ```
//!
//! Each `lon,lat` vertex of a step's path becomes one route point tagged with
//! the step index. Malformed vertices are skipped with a warning.
//!
//! # Geocoding
//!
//! `GET {base_url}/geocoding/v3/?address=...&output=json&ak=KEY`
//!
//! ```json
//! {"status": 0, "result": {"location": {"lng": 108.96, "lat": 34.22}}}
//! ```

use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Geocoder, HttpClient, RoutePlanner, RoutingError};
use crate::geo::Coordinate;
use crate::route::{Route, RouteError, RouteStep};

/// Default service root.
pub const DEFAULT_BASE_URL: &str = "https://api.map.baidu.com";

/// Default city hint for geocoding.
pub const DEFAULT_REGION: &str = "西安";

/// Connection settings for [`BaiduClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaiduConfig {
    /// Service root, without trailing slash.
    pub base_url: String,
    /// Access key (`ak`).
    pub api_key: String,
    /// City hint passed to geocoding; empty to omit.
    pub region: String,
}

impl Default for BaiduConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            region: DEFAULT_REGION.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: i64,
    #[serde(default)]
    message: String,
    result: Option<DirectionsResult>,
}

#[derive(Debug, Deserialize)]
struct DirectionsResult {
    #[serde(default)]
    routes: Vec<RouteEntry>,
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    #[serde(default)]
    steps: Vec<StepEntry>,
}

#[derive(Debug, Deserialize)]
struct StepEntry {
    #[serde(default)]
    instruction: String,
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    status: i64,
    #[serde(default)]
    message: String,
    result: Option<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lng: f64,
    lat: f64,
}

/// Parse a directions response into a route.
pub fn parse_directions(body: &[u8]) -> Result<Route, RoutingError> {
    let response: DirectionsResponse =
        serde_json::from_slice(body).map_err(|e| RoutingError::Parse(e.to_string()))?;

    if response.status != 0 {
        return Err(RoutingError::Api {
            status: response.status,
            message: response.message,
        });
    }

    let first = response
        .result
        .and_then(|r| r.routes.into_iter().next())
        .ok_or(RoutingError::NoRoute)?;

    let steps: Vec<RouteStep> = first
        .steps
        .into_iter()
        .enumerate()
        .map(|(step_index, step)| RouteStep {
            path: parse_path(&step.path, step_index),
            instruction: step.instruction,
        })
        .collect();

    let route = Route::from_steps(&steps).map_err(|e| match e {
        RouteError::Empty => RoutingError::NoRoute,
        other => RoutingError::InvalidRoute(other),
    })?;
    debug!(steps = steps.len(), points = route.len(), "Parsed directions");
    Ok(route)
}

/// Parse a `lon,lat;lon,lat;...` path, skipping malformed vertices.
fn parse_path(path: &str, step_index: usize) -> Vec<Coordinate> {
    path.split(';')
        .filter(|vertex| !vertex.trim().is_empty())
        .filter_map(|vertex| {
            let parsed = parse_vertex(vertex);
            if parsed.is_none() {
                warn!(step = step_index, vertex, "Skipping malformed path vertex");
            }
            parsed
        })
        .collect()
}

fn parse_vertex(vertex: &str) -> Option<Coordinate> {
    let mut parts = vertex.split(',');
    let lon: f64 = parts.next()?.trim().parse().ok()?;
    let lat: f64 = parts.next()?.trim().parse().ok()?;
    Coordinate::try_new(lat, lon).ok()
}

/// Parse a geocoding response.
pub fn parse_geocoding(body: &[u8]) -> Result<Coordinate, RoutingError> {
    let response: GeocodingResponse =
        serde_json::from_slice(body).map_err(|e| RoutingError::Parse(e.to_string()))?;

    if response.status != 0 {
        return Err(RoutingError::Api {
            status: response.status,
            message: response.message,
        });
    }

    let location = response
        .result
        .ok_or_else(|| RoutingError::Parse("missing result".to_string()))?
        .location;
    Coordinate::try_new(location.lat, location.lng)
        .map_err(|e| RoutingError::Parse(e.to_string()))
}

/// Directions and geocoding over HTTP.
pub struct BaiduClient<C: HttpClient> {
    http: C,
    config: BaiduConfig,
}

impl<C: HttpClient> BaiduClient<C> {
    pub fn new(http: C, config: BaiduConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &BaiduConfig {
        &self.config
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, RoutingError> {
        let base = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let mut all: Vec<(&str, String)> = params.to_vec();
        all.push(("output", "json".to_string()));
        all.push(("ak", self.config.api_key.clone()));
        Url::parse_with_params(&base, &all)
            .map_err(|e| RoutingError::Http(format!("invalid URL {}: {}", base, e)))
    }

    /// URL of a directions request.
    pub fn directions_url(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Url, RoutingError> {
        self.endpoint(
            "directionlite/v1/driving",
            &[
                ("origin", format_lat_lon(origin)),
                ("destination", format_lat_lon(destination)),
            ],
        )
    }

    /// URL of a geocoding request.
    pub fn geocoding_url(&self, address: &str) -> Result<Url, RoutingError> {
        let mut params = vec![("address", address.to_string())];
        if !self.config.region.is_empty() {
            params.push(("city", self.config.region.clone()));
        }
        self.endpoint("geocoding/v3/", &params)
    }
}

fn format_lat_lon(c: Coordinate) -> String {
    format!("{:.6},{:.6}", c.latitude, c.longitude)
}

impl<C: HttpClient> RoutePlanner for BaiduClient<C> {
    fn plan(&self, origin: Coordinate, destination: Coordinate) -> Result<Route, RoutingError> {
        let url = self.directions_url(origin, destination)?;
        debug!(origin = %origin, destination = %destination, "Requesting directions");
        let body = self.http.get(url.as_str())?;
        parse_directions(&body)
    }
}

impl<C: HttpClient> Geocoder for BaiduClient<C> {
    fn geocode(&self, address: &str) -> Result<Coordinate, RoutingError> {
        let url = self.geocoding_url(address)?;
        debug!(address, "Requesting geocoding");
        let body = self.http.get(url.as_str())?;
        parse_geocoding(&body)
    }
}
