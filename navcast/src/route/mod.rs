//! Route model and the store that holds the active route.
//!
//! A routing "step" (one instruction) expands into one [`RoutePoint`] per
//! path vertex, all tagged with the step's index. The resulting [`Route`] is
//! never empty and its step indices never decrease.
//!
//! [`RouteStore`] owns the active route behind an `Arc`. Consumers read it
//! through shared references; a replan swaps the whole route at once.

use std::sync::Arc;

use thiserror::Error;

use crate::geo::Coordinate;

/// One vertex of the planned path.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePoint {
    /// Vertex position in the route datum.
    pub coordinate: Coordinate,
    /// Raw instruction text of the step this vertex belongs to.
    pub instruction: String,
    /// Index of the originating routing step.
    pub step_index: usize,
}

impl RoutePoint {
    /// Create a new route point.
    pub fn new(coordinate: Coordinate, instruction: impl Into<String>, step_index: usize) -> Self {
        Self {
            coordinate,
            instruction: instruction.into(),
            step_index,
        }
    }
}

/// One routing step before flattening: an instruction and its path vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStep {
    /// Free-text instruction.
    pub instruction: String,
    /// Path vertices in traversal order.
    pub path: Vec<Coordinate>,
}

/// Errors raised when building a route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The route has no points.
    #[error("route has no points")]
    Empty,

    /// A point's step index is lower than its predecessor's.
    #[error("step index decreases at point {position}: {previous} -> {found}")]
    StepOrder {
        position: usize,
        previous: usize,
        found: usize,
    },
}

/// An ordered, non-empty sequence of route points.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    points: Vec<RoutePoint>,
}

impl Route {
    /// Build a route from points, validating non-emptiness and step order.
    pub fn new(points: Vec<RoutePoint>) -> Result<Self, RouteError> {
        if points.is_empty() {
            return Err(RouteError::Empty);
        }
        for (position, pair) in points.windows(2).enumerate() {
            if pair[1].step_index < pair[0].step_index {
                return Err(RouteError::StepOrder {
                    position: position + 1,
                    previous: pair[0].step_index,
                    found: pair[1].step_index,
                });
            }
        }
        Ok(Self { points })
    }

    /// Flatten routing steps into a route, one point per vertex.
    ///
    /// Steps without vertices contribute nothing but still consume a step
    /// index, so indices stay aligned with the provider's step list.
    pub fn from_steps(steps: &[RouteStep]) -> Result<Self, RouteError> {
        let points = steps
            .iter()
            .enumerate()
            .flat_map(|(step_index, step)| {
                step.path
                    .iter()
                    .map(move |c| RoutePoint::new(*c, step.instruction.clone(), step_index))
            })
            .collect();
        Self::new(points)
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&RoutePoint> {
        self.points.get(index)
    }

    /// All points in traversal order.
    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    /// Index of the final point.
    pub fn last_index(&self) -> usize {
        self.points.len() - 1
    }

    /// Number of distinct routing steps.
    pub fn step_count(&self) -> usize {
        self.points
            .last()
            .map(|p| p.step_index + 1)
            .unwrap_or_default()
    }

    /// First point after `index` that belongs to a later step.
    pub fn next_step_point(&self, index: usize) -> Option<&RoutePoint> {
        let step = self.points.get(index)?.step_index;
        self.points[index + 1..].iter().find(|p| p.step_index > step)
    }
}

/// Holder of the active route with replace-on-replan semantics.
#[derive(Debug, Default)]
pub struct RouteStore {
    current: Option<Arc<Route>>,
    revision: u64,
}

impl RouteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active route, returning the new shared handle.
    pub fn replace(&mut self, route: Route) -> Arc<Route> {
        let route = Arc::new(route);
        self.current = Some(Arc::clone(&route));
        self.revision += 1;
        route
    }

    /// The active route, if any.
    pub fn route(&self) -> Option<&Route> {
        self.current.as_deref()
    }

    /// A shared handle to the active route, if any.
    pub fn shared(&self) -> Option<Arc<Route>> {
        self.current.clone()
    }

    /// Incremented on every replacement.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
