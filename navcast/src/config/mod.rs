//! User configuration loaded from `config.ini`.
//!
//! The file is optional. Every key has a default, and a partial file only
//! overrides the keys it names. Settings are grouped per section:
//!
//! - `[navigation]` tracker thresholds and fix pacing
//! - `[routing]` directions/geocoding service and retry policy
//! - `[network]` UDP peer and local listener
//! - `[logging]` log file location
//!
//! # Example
//!
//! ```
//! use navcast::config::NavcastConfig;
//!
//! let config = NavcastConfig::default();
//! let engine = config.engine_config();
//! assert_eq!(engine.tracker.target_change_range_m, 5.0);
//! ```

mod file;
mod parser;
mod writer;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use file::{config_directory, config_file_path, ConfigFileError};

use crate::engine::EngineConfig;
use crate::geo::{transform_between, CoordinateTransform, Datum, DatumError};
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_MS};
use crate::routing::BaiduConfig;
use crate::tracker::{TrackerConfig, DEFAULT_REPLAN_COOLDOWN, DEFAULT_TARGET_CHANGE_RANGE_M};
use crate::transport::{ReceiverConfig, DEFAULT_HAND_OFF_CAPACITY, DEFAULT_PORT};

/// Datum the routing service returns coordinates in.
pub const ROUTE_DATUM: Datum = Datum::Bd09;

/// Default fix evaluation interval in milliseconds.
pub const DEFAULT_FIX_INTERVAL_MS: u64 = 200;

/// Default peer host for outbound guidance.
pub const DEFAULT_PEER_ADDRESS: &str = "127.0.0.1";

/// Default receive timeout for the datagram listener in milliseconds.
pub const DEFAULT_RECV_TIMEOUT_MS: u64 = 500;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "navcast.log";

/// Complete configuration file contents.
#[derive(Debug, Clone, PartialEq)]
pub struct NavcastConfig {
    pub navigation: NavigationSettings,
    pub routing: RoutingSettings,
    pub network: NetworkSettings,
    pub logging: LoggingSettings,
}

/// `[navigation]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationSettings {
    /// Radius in meters within which the target point counts as reached.
    pub target_change_range_m: f64,
    /// Minimum time between two replan requests.
    pub replan_cooldown: Duration,
    /// Interval between fix evaluations.
    pub fix_interval: Duration,
    /// Datum the fix stream reports in.
    pub fix_datum: Datum,
}

/// `[routing]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    /// City hint for geocoding.
    pub region: String,
    /// Pre-computed route used instead of the live service.
    pub route_file: Option<PathBuf>,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

/// `[network]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    pub peer_address: String,
    pub peer_port: u16,
    pub listen_port: u16,
    pub recv_timeout: Duration,
    pub hand_off_capacity: usize,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            target_change_range_m: DEFAULT_TARGET_CHANGE_RANGE_M,
            replan_cooldown: DEFAULT_REPLAN_COOLDOWN,
            fix_interval: Duration::from_millis(DEFAULT_FIX_INTERVAL_MS),
            fix_datum: Datum::Wgs84,
        }
    }
}

impl Default for RoutingSettings {
    fn default() -> Self {
        let baidu = BaiduConfig::default();
        Self {
            base_url: baidu.base_url,
            api_key: None,
            region: baidu.region,
            route_file: None,
            retry_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            timeout: Duration::from_secs(crate::routing::DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            peer_address: DEFAULT_PEER_ADDRESS.to_string(),
            peer_port: DEFAULT_PORT,
            listen_port: DEFAULT_PORT,
            recv_timeout: Duration::from_millis(DEFAULT_RECV_TIMEOUT_MS),
            hand_off_capacity: DEFAULT_HAND_OFF_CAPACITY,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: config_directory().join("logs"),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Default for NavcastConfig {
    fn default() -> Self {
        Self {
            navigation: NavigationSettings::default(),
            routing: RoutingSettings::default(),
            network: NetworkSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl NavcastConfig {
    /// Tracker thresholds from `[navigation]`.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            target_change_range_m: self.navigation.target_change_range_m,
            replan_cooldown: self.navigation.replan_cooldown,
        }
    }

    /// Retry policy for remote routing calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.routing.retry_attempts, self.routing.retry_delay)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tracker: self.tracker_config(),
            fix_interval: self.navigation.fix_interval,
            retry: self.retry_policy(),
        }
    }

    /// Directions/geocoding client settings. The API key may be overridden
    /// from the command line.
    pub fn baidu_config(&self, api_key_override: Option<&str>) -> BaiduConfig {
        let api_key = api_key_override
            .map(str::to_string)
            .or_else(|| self.routing.api_key.clone())
            .unwrap_or_default();
        BaiduConfig {
            base_url: self.routing.base_url.clone(),
            api_key,
            region: self.routing.region.clone(),
        }
    }

    /// Listener settings from `[network]`.
    pub fn receiver_config(&self) -> ReceiverConfig {
        ReceiverConfig {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], self.network.listen_port)),
            recv_timeout: self.network.recv_timeout,
        }
    }

    /// Transform from the configured fix datum into the route datum.
    pub fn coordinate_transform(&self) -> Result<Arc<dyn CoordinateTransform>, DatumError> {
        transform_between(self.navigation.fix_datum, ROUTE_DATUM)
    }

    /// Full path of the log file.
    pub fn log_path(&self) -> PathBuf {
        self.logging.directory.join(&self.logging.file)
    }

    /// Render as a commented INI document.
    pub fn to_config_string(&self) -> String {
        writer::to_config_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;

    #[test]
    fn test_defaults_match_component_defaults() {
        let config = NavcastConfig::default();
        assert_eq!(config.tracker_config(), TrackerConfig::default());
        assert_eq!(config.engine_config().fix_interval, crate::engine::DEFAULT_FIX_INTERVAL);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.network.peer_port, 12345);
        assert_eq!(config.routing.region, "西安");
    }

    #[test]
    fn test_api_key_override_wins() {
        let mut config = NavcastConfig::default();
        config.routing.api_key = Some("from-file".to_string());

        assert_eq!(config.baidu_config(None).api_key, "from-file");
        assert_eq!(config.baidu_config(Some("cli")).api_key, "cli");
    }

    #[test]
    fn test_receiver_config_uses_listen_port() {
        let mut config = NavcastConfig::default();
        config.network.listen_port = 40000;
        config.network.recv_timeout = Duration::from_millis(250);

        let receiver = config.receiver_config();
        assert_eq!(receiver.listen_addr.port(), 40000);
        assert_eq!(receiver.recv_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_bd09_fixes_use_identity_transform() {
        let mut config = NavcastConfig::default();
        config.navigation.fix_datum = Datum::Bd09;

        let transform = config.coordinate_transform().unwrap();
        let c = Coordinate::new(34.2, 108.9);
        assert_eq!(transform.convert(c), c);
    }

    #[test]
    fn test_log_path_joins_directory_and_file() {
        let mut config = NavcastConfig::default();
        config.logging.directory = PathBuf::from("/tmp/navcast-logs");
        config.logging.file = "run.log".to_string();
        assert_eq!(config.log_path(), PathBuf::from("/tmp/navcast-logs/run.log"));
    }
}
