//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use navcast::config::ConfigFileError;
use navcast::engine::EngineError;
use navcast::guidance::BusError;
use navcast::routing::RoutingError;
use navcast::transport::TransportError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be loaded
    Config(ConfigFileError),
    /// Invalid command-line argument
    InvalidArgument(String),
    /// Route planning, geocoding or route file failure
    Routing(RoutingError),
    /// Socket setup failure
    Transport(TransportError),
    /// Navigation could not start
    Engine(EngineError),
    /// A bus consumer could not be registered
    Bus(BusError),
    /// Failed to create the async runtime
    Runtime(std::io::Error),
    /// Failed to read an input file
    FileRead { path: PathBuf, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Routing(RoutingError::Api { .. }) | CliError::Routing(RoutingError::Http(_)) => {
                eprintln!();
                eprintln!("Live routing failed. Make sure:");
                eprintln!("  1. routing.api_key is set in config.ini or passed with --api-key");
                eprintln!("  2. The service at routing.base_url is reachable");
                eprintln!("  3. Or use a pre-computed route with --route-file");
            }
            CliError::Transport(TransportError::Bind { .. }) => {
                eprintln!();
                eprintln!("The UDP port may already be in use. Pick another with --port");
                eprintln!("or change network.listen_port in config.ini.");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Check the file shown by: navcast config path");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Routing(e) => write!(f, "Routing failed: {}", e),
            CliError::Transport(e) => write!(f, "Network error: {}", e),
            CliError::Engine(e) => write!(f, "Navigation failed: {}", e),
            CliError::Bus(e) => write!(f, "Failed to register consumer: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read '{}': {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Routing(e) => Some(e),
            CliError::Transport(e) => Some(e),
            CliError::Engine(e) => Some(e),
            CliError::Bus(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<RoutingError> for CliError {
    fn from(e: RoutingError) -> Self {
        CliError::Routing(e)
    }
}

impl From<TransportError> for CliError {
    fn from(e: TransportError) -> Self {
        CliError::Transport(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

impl From<BusError> for CliError {
    fn from(e: BusError) -> Self {
        CliError::Bus(e)
    }
}
