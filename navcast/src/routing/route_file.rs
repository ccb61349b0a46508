//! Pre-computed route stored on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::{parse_directions, RoutePlanner, RoutingError};
use crate::geo::Coordinate;
use crate::route::Route;

/// A route loaded once from a file in the directions response format.
///
/// As a [`RoutePlanner`] it ignores origin and destination and always
/// returns the stored route, so replans restart the same route.
#[derive(Debug, Clone)]
pub struct LocalRouteFile {
    path: PathBuf,
    route: Arc<Route>,
}

impl LocalRouteFile {
    /// Read and parse the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RoutingError> {
        let path = path.as_ref().to_path_buf();
        let body = std::fs::read(&path).map_err(|source| RoutingError::RouteFile {
            path: path.clone(),
            source,
        })?;
        let route = parse_directions(&body)?;
        info!(path = %path.display(), points = route.len(), steps = route.step_count(), "Loaded route file");
        Ok(Self {
            path,
            route: Arc::new(route),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored route.
    pub fn route(&self) -> &Route {
        &self.route
    }
}

impl RoutePlanner for LocalRouteFile {
    fn plan(&self, _origin: Coordinate, _destination: Coordinate) -> Result<Route, RoutingError> {
        Ok(Route::clone(&self.route))
    }
}
