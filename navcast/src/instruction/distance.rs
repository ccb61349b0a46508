//! Distance extraction from instruction text.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::geo::format_meters;

/// Meters per kilometer.
const METERS_PER_KM: f64 = 1000.0;

/// Markers of "continue along the road" sentences, where a bare number and
/// unit is taken as the distance.
const CONTINUE_MARKERS: [&str; 2] = ["继续行驶", "沿路行驶"];

fn travel_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"行驶\s*([0-9]+\.?[0-9]*)\s*(米|公里)").expect("valid travel regex")
    })
}

fn bare_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9]+\.?[0-9]*)\s*(米|公里)").expect("valid distance regex")
    })
}

/// Extract the distance to the next maneuver as "<meters>米".
///
/// Returns `None` when the text carries no usable distance.
///
/// # Example
///
/// ```
/// use navcast::instruction::extract_distance;
///
/// assert_eq!(extract_distance("直行行驶1.5 公里").as_deref(), Some("1500米"));
/// assert_eq!(extract_distance("继续行驶，约300米").as_deref(), Some("300米"));
/// assert_eq!(extract_distance("约300米后右转"), None);
/// ```
pub fn extract_distance(instruction: &str) -> Option<String> {
    if let Some(meters) = travel_pattern().captures(instruction).and_then(to_meters) {
        return Some(format_meters(meters));
    }

    if CONTINUE_MARKERS.iter().any(|m| instruction.contains(m)) {
        return bare_pattern()
            .captures(instruction)
            .and_then(to_meters)
            .map(format_meters);
    }

    None
}

fn to_meters(caps: Captures<'_>) -> Option<f64> {
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str();
    Some(if unit == "公里" {
        value * METERS_PER_KM
    } else {
        value
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meters_after_travel_keyword() {
        assert_eq!(
            extract_distance("沿<b>长安路</b>行驶500米").as_deref(),
            Some("500米")
        );
        assert_eq!(extract_distance("行驶 80 米后左转").as_deref(), Some("80米"));
    }

    #[test]
    fn test_kilometers_converted() {
        assert_eq!(extract_distance("行驶1.5 公里").as_deref(), Some("1500米"));
        assert_eq!(extract_distance("行驶2公里").as_deref(), Some("2000米"));
        assert_eq!(extract_distance("行驶0.25公里").as_deref(), Some("250米"));
    }

    #[test]
    fn test_fractional_meters_rounded() {
        assert_eq!(extract_distance("行驶12.6米").as_deref(), Some("13米"));
    }

    #[test]
    fn test_bare_distance_requires_continue_marker() {
        assert_eq!(extract_distance("300米后右转"), None);
        assert_eq!(
            extract_distance("沿路行驶，前方1.2公里").as_deref(),
            Some("1200米")
        );
    }

    #[test]
    fn test_no_distance() {
        assert_eq!(extract_distance("进入<b>大雁塔南路</b>"), None);
        assert_eq!(extract_distance(""), None);
        assert_eq!(extract_distance("继续行驶"), None);
    }
}
