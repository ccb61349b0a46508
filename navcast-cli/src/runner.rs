//! CLI runner for common setup.
//!
//! Loads the configuration, initializes logging and builds the pieces that
//! several commands share.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::info;

use navcast::config::{config_file_path, NavcastConfig};
use navcast::geo::CoordinateTransform;
use navcast::logging::{init_logging, LoggingGuard};
use navcast::transport::resolve_peer;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: NavcastConfig,
}

impl CliRunner {
    /// Load config and initialize logging.
    ///
    /// Log records always go to the log file; they are also echoed to stdout
    /// in debug mode, where they interleave with the guidance output.
    pub fn new(config_path: Option<&Path>, debug_mode: bool) -> Result<Self, CliError> {
        let config = load_config(config_path)?;

        let logging_guard = init_logging(
            &config.logging.directory,
            &config.logging.file,
            debug_mode,
            debug_mode,
        )
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &NavcastConfig {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("navcast v{}", navcast::VERSION);
        info!("navcast CLI: {} command", command);
        info!(log = %self.config.log_path().display(), "Logging to file");
    }

    /// Create the multi-threaded runtime that drives async work.
    pub fn runtime(&self) -> Result<Runtime, CliError> {
        Runtime::new().map_err(CliError::Runtime)
    }

    /// Resolve the guidance peer, preferring command-line overrides.
    pub fn peer_addr(&self, host: Option<&str>, port: Option<u16>) -> Result<SocketAddr, CliError> {
        let host = host.unwrap_or(&self.config.network.peer_address);
        let port = port.unwrap_or(self.config.network.peer_port);
        Ok(resolve_peer(host, port)?)
    }

    /// Transform from the configured fix datum into the route datum.
    pub fn coordinate_transform(&self) -> Result<Arc<dyn CoordinateTransform>, CliError> {
        self.config.coordinate_transform().map_err(|e| {
            CliError::InvalidArgument(format!("navigation.fix_datum: {}", e))
        })
    }
}

/// Load configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<NavcastConfig, CliError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
    Ok(NavcastConfig::load_from(&path)?)
}
