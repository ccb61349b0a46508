//! Datum conversion between the fix stream and the route.
//!
//! Fixes usually arrive in WGS-84 while the routing provider returns BD-09
//! coordinates. The conversion goes WGS-84 → GCJ-02 → BD-09 using the
//! published offset polynomials.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use super::Coordinate;

/// Krasovsky 1940 semi-major axis used by the GCJ-02 offset.
const KRASOVSKY_A: f64 = 6_378_245.0;

/// Krasovsky 1940 first eccentricity squared.
const KRASOVSKY_EE: f64 = 0.006_693_421_622_965_943;

const X_PI: f64 = PI * 3000.0 / 180.0;

/// Coordinate datums the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datum {
    /// GPS native datum.
    Wgs84,
    /// Baidu BD-09 (lat/lon variant).
    Bd09,
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Wgs84 => write!(f, "wgs84"),
            Datum::Bd09 => write!(f, "bd09"),
        }
    }
}

impl FromStr for Datum {
    type Err = DatumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wgs84" | "wgs-84" => Ok(Datum::Wgs84),
            "bd09" | "bd-09" | "bd09ll" => Ok(Datum::Bd09),
            other => Err(DatumError::Unknown(other.to_string())),
        }
    }
}

/// Datum errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatumError {
    /// Unrecognized datum name.
    #[error("unknown datum '{0}' (expected wgs84 or bd09)")]
    Unknown(String),

    /// No local conversion exists for this pair.
    #[error("no conversion from {from} to {to}")]
    Unsupported { from: Datum, to: Datum },
}

/// Converts fix coordinates into the route's datum.
pub trait CoordinateTransform: Send + Sync {
    /// Convert a coordinate into the target datum.
    fn convert(&self, coordinate: Coordinate) -> Coordinate;
}

/// No-op transform for fixes already in the route datum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl CoordinateTransform for Identity {
    fn convert(&self, coordinate: Coordinate) -> Coordinate {
        coordinate
    }
}

/// WGS-84 → BD-09 conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wgs84ToBd09;

impl CoordinateTransform for Wgs84ToBd09 {
    fn convert(&self, coordinate: Coordinate) -> Coordinate {
        gcj02_to_bd09(wgs84_to_gcj02(coordinate))
    }
}

/// Pick the transform that maps `from` coordinates onto `to`.
pub fn transform_between(
    from: Datum,
    to: Datum,
) -> Result<Arc<dyn CoordinateTransform>, DatumError> {
    match (from, to) {
        (a, b) if a == b => Ok(Arc::new(Identity)),
        (Datum::Wgs84, Datum::Bd09) => Ok(Arc::new(Wgs84ToBd09)),
        (from, to) => Err(DatumError::Unsupported { from, to }),
    }
}

fn outside_china(c: Coordinate) -> bool {
    c.longitude < 72.004 || c.longitude > 137.8347 || c.latitude < 0.8293 || c.latitude > 55.8271
}

fn wgs84_to_gcj02(c: Coordinate) -> Coordinate {
    if outside_china(c) {
        return c;
    }

    let x = c.longitude - 105.0;
    let y = c.latitude - 35.0;
    let mut d_lat = offset_lat(x, y);
    let mut d_lon = offset_lon(x, y);

    let rad_lat = c.latitude / 180.0 * PI;
    let magic = 1.0 - KRASOVSKY_EE * rad_lat.sin().powi(2);
    let sqrt_magic = magic.sqrt();
    d_lat = (d_lat * 180.0) / ((KRASOVSKY_A * (1.0 - KRASOVSKY_EE)) / (magic * sqrt_magic) * PI);
    d_lon = (d_lon * 180.0) / (KRASOVSKY_A / sqrt_magic * rad_lat.cos() * PI);

    Coordinate::new(c.latitude + d_lat, c.longitude + d_lon)
}

fn gcj02_to_bd09(c: Coordinate) -> Coordinate {
    let x = c.longitude;
    let y = c.latitude;
    let z = (x * x + y * y).sqrt() + 0.00002 * (y * X_PI).sin();
    let theta = y.atan2(x) + 0.000003 * (x * X_PI).cos();
    Coordinate::new(z * theta.sin() + 0.006, z * theta.cos() + 0.0065)
}

fn offset_lat(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn offset_lon(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::haversine_m;

    #[test]
    fn test_identity_is_noop() {
        let c = Coordinate::new(34.26, 108.94);
        assert_eq!(Identity.convert(c), c);
    }

    #[test]
    fn test_wgs84_to_bd09_shift_in_china() {
        // Xi'an: BD-09 lies a few hundred meters north-east of WGS-84
        let wgs = Coordinate::new(34.2610, 108.9423);
        let bd = Wgs84ToBd09.convert(wgs);
        assert!(bd.latitude > wgs.latitude);
        assert!(bd.longitude > wgs.longitude);
        let shift = haversine_m(wgs, bd);
        assert!(shift > 300.0 && shift < 2_000.0, "shift {}m", shift);
    }

    #[test]
    fn test_outside_china_skips_gcj_offset() {
        let london = Coordinate::new(51.5, -0.12);
        assert_eq!(wgs84_to_gcj02(london), london);
    }

    #[test]
    fn test_transform_between() {
        let t = transform_between(Datum::Bd09, Datum::Bd09).unwrap();
        let c = Coordinate::new(34.0, 108.0);
        assert_eq!(t.convert(c), c);

        assert!(transform_between(Datum::Wgs84, Datum::Bd09).is_ok());
        assert_eq!(
            transform_between(Datum::Bd09, Datum::Wgs84).err(),
            Some(DatumError::Unsupported {
                from: Datum::Bd09,
                to: Datum::Wgs84
            })
        );
    }

    #[test]
    fn test_datum_from_str() {
        assert_eq!("WGS84".parse::<Datum>().unwrap(), Datum::Wgs84);
        assert_eq!("bd09ll".parse::<Datum>().unwrap(), Datum::Bd09);
        assert!("utm".parse::<Datum>().is_err());
    }
}
