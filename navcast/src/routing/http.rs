//! HTTP client abstraction for testability

use std::time::Duration;

use super::RoutingError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Blocking HTTP GET.
///
/// Lets routing clients be tested without a network.
pub trait HttpClient: Send + Sync {
    /// Fetch `url` and return the response body.
    fn get(&self, url: &str) -> Result<Vec<u8>, RoutingError>;
}

/// [`HttpClient`] backed by `reqwest`'s blocking client.
///
/// The blocking client runs its own runtime thread: create and drop it
/// outside of async contexts.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with the default timeout.
    pub fn new() -> Result<Self, RoutingError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, RoutingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RoutingError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, RoutingError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| RoutingError::Http(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RoutingError::Http(format!("HTTP {}", response.status())));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| RoutingError::Http(format!("Failed to read response: {}", e)))
    }
}
