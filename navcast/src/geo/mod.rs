//! Geographic primitives: coordinates, great-circle distance, datum handling.
//!
//! Distances are computed locally with the haversine formula so that the
//! fix-processing path never waits on a remote service.
//!
//! # Example
//!
//! ```
//! use navcast::geo::{haversine_m, Coordinate};
//!
//! let bell_tower = Coordinate::new(34.2610, 108.9423);
//! let big_goose_pagoda = Coordinate::new(34.2180, 108.9590);
//! let d = haversine_m(bell_tower, big_goose_pagoda);
//! assert!(d > 4_000.0 && d < 5_500.0);
//! ```

mod datum;

pub use datum::{transform_between, CoordinateTransform, Datum, DatumError, Identity, Wgs84ToBd09};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90..=90).
    pub latitude: f64,
    /// Longitude in degrees (-180..=180).
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate without range validation.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Create a coordinate, rejecting out-of-range or non-finite values.
    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self, CoordinateParseError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateParseError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateParseError::LongitudeOutOfRange(longitude));
        }
        Ok(Self::new(latitude, longitude))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Errors from parsing a `lat,lon` string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateParseError {
    /// Input did not have exactly two comma-separated parts.
    #[error("expected 'lat,lon', got '{0}'")]
    Format(String),

    /// A component was not a number.
    #[error("invalid number '{0}'")]
    Number(String),

    /// Latitude outside -90..=90.
    #[error("latitude {0} out of range (-90..=90)")]
    LatitudeOutOfRange(f64),

    /// Longitude outside -180..=180.
    #[error("longitude {0} out of range (-180..=180)")]
    LongitudeOutOfRange(f64),
}

impl FromStr for Coordinate {
    type Err = CoordinateParseError;

    /// Parse `lat,lon` (whitespace around either part is allowed).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 2 {
            return Err(CoordinateParseError::Format(s.to_string()));
        }
        let lat = parse_component(parts[0])?;
        let lon = parse_component(parts[1])?;
        Coordinate::try_new(lat, lon)
    }
}

fn parse_component(raw: &str) -> Result<f64, CoordinateParseError> {
    let raw = raw.trim();
    raw.parse::<f64>()
        .map_err(|_| CoordinateParseError::Number(raw.to_string()))
}

/// Great-circle distance between two coordinates in meters (haversine).
///
/// Deterministic, symmetric, non-negative, and exactly zero for identical
/// inputs.
pub fn haversine_m(from: Coordinate, to: Coordinate) -> f64 {
    if from == to {
        return 0.0;
    }

    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Format a distance in meters the way guidance messages carry it ("123米").
pub fn format_meters(distance_m: f64) -> String {
    format!("{}米", distance_m.max(0.0).round() as i64)
}
