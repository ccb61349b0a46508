//! INI parsing: maps key names onto [`NavcastConfig`] fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::file::ConfigFileError;
use super::NavcastConfig;
use crate::geo::Datum;

/// Parse an `Ini` object into a `NavcastConfig`.
///
/// Starts from `NavcastConfig::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<NavcastConfig, ConfigFileError> {
    let mut config = NavcastConfig::default();

    // [navigation] section
    if let Some(section) = ini.section(Some("navigation")) {
        if let Some(v) = section.get("target_change_range") {
            let range: f64 = parse_value(
                "navigation",
                "target_change_range",
                v,
                "must be a positive number (meters)",
            )?;
            if !(range.is_finite() && range > 0.0) {
                return Err(invalid(
                    "navigation",
                    "target_change_range",
                    v,
                    "must be a positive number (meters)",
                ));
            }
            config.navigation.target_change_range_m = range;
        }
        if let Some(v) = section.get("replan_cooldown_secs") {
            let secs: u64 = parse_value(
                "navigation",
                "replan_cooldown_secs",
                v,
                "must be a non-negative integer (seconds)",
            )?;
            config.navigation.replan_cooldown = Duration::from_secs(secs);
        }
        if let Some(v) = section.get("fix_interval_ms") {
            config.navigation.fix_interval =
                parse_positive_millis("navigation", "fix_interval_ms", v)?;
        }
        if let Some(v) = section.get("fix_datum") {
            config.navigation.fix_datum = Datum::from_str(v).map_err(|_| {
                invalid("navigation", "fix_datum", v, "must be one of: wgs84, bd09")
            })?;
        }
    }

    // [routing] section
    if let Some(section) = ini.section(Some("routing")) {
        if let Some(v) = section.get("base_url") {
            let v = v.trim().trim_end_matches('/');
            if !(v.starts_with("http://") || v.starts_with("https://")) {
                return Err(invalid(
                    "routing",
                    "base_url",
                    v,
                    "must start with http:// or https://",
                ));
            }
            config.routing.base_url = v.to_string();
        }
        if let Some(v) = section.get("api_key") {
            config.routing.api_key = non_empty(v).map(str::to_string);
        }
        if let Some(v) = section.get("region") {
            config.routing.region = v.trim().to_string();
        }
        if let Some(v) = section.get("route_file") {
            config.routing.route_file = non_empty(v).map(expand_tilde);
        }
        if let Some(v) = section.get("retry_attempts") {
            let attempts: u32 = parse_value(
                "routing",
                "retry_attempts",
                v,
                "must be a positive integer",
            )?;
            if attempts == 0 {
                return Err(invalid(
                    "routing",
                    "retry_attempts",
                    v,
                    "must be a positive integer",
                ));
            }
            config.routing.retry_attempts = attempts;
        }
        if let Some(v) = section.get("retry_delay_ms") {
            let ms: u64 = parse_value(
                "routing",
                "retry_delay_ms",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
            config.routing.retry_delay = Duration::from_millis(ms);
        }
        if let Some(v) = section.get("timeout_secs") {
            let secs: u64 = parse_value(
                "routing",
                "timeout_secs",
                v,
                "must be a positive integer (seconds)",
            )?;
            if secs == 0 {
                return Err(invalid(
                    "routing",
                    "timeout_secs",
                    v,
                    "must be a positive integer (seconds)",
                ));
            }
            config.routing.timeout = Duration::from_secs(secs);
        }
    }

    // [network] section
    if let Some(section) = ini.section(Some("network")) {
        if let Some(v) = section.get("peer_address") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid(
                    "network",
                    "peer_address",
                    v,
                    "must be a host name or IP address",
                ));
            }
            config.network.peer_address = v.to_string();
        }
        if let Some(v) = section.get("peer_port") {
            config.network.peer_port = parse_port("peer_port", v)?;
        }
        if let Some(v) = section.get("listen_port") {
            config.network.listen_port = parse_port("listen_port", v)?;
        }
        if let Some(v) = section.get("recv_timeout_ms") {
            config.network.recv_timeout =
                parse_positive_millis("network", "recv_timeout_ms", v)?;
        }
        if let Some(v) = section.get("hand_off_capacity") {
            let capacity: usize = parse_value(
                "network",
                "hand_off_capacity",
                v,
                "must be a positive integer",
            )?;
            if capacity == 0 {
                return Err(invalid(
                    "network",
                    "hand_off_capacity",
                    v,
                    "must be a positive integer",
                ));
            }
            config.network.hand_off_capacity = capacity;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty_key(section, "directory") {
            config.logging.directory = expand_tilde(v);
        }
        if let Some(v) = non_empty_key(section, "file") {
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_port(key: &str, value: &str) -> Result<u16, ConfigFileError> {
    let reason = "must be a port number between 1 and 65535";
    let port: u16 = parse_value("network", key, value, reason)?;
    if port == 0 {
        return Err(invalid("network", key, value, reason));
    }
    Ok(port)
}

fn parse_positive_millis(section: &str, key: &str, value: &str) -> Result<Duration, ConfigFileError> {
    let reason = "must be a positive integer (milliseconds)";
    let ms: u64 = parse_value(section, key, value, reason)?;
    if ms == 0 {
        return Err(invalid(section, key, value, reason));
    }
    Ok(Duration::from_millis(ms))
}

fn non_empty(value: &str) -> Option<&str> {
    let v = value.trim();
    (!v.is_empty()).then_some(v)
}

fn non_empty_key<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).and_then(non_empty)
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
