//! Route progress tracking.
//!
//! [`GuidanceTracker`] decides, for every fix, whether the traveler reached
//! the current target point, whether guidance must be announced, and whether
//! the traveler left the route.
//!
//! # State Machine
//!
//! ```text
//! Idle --[start]--> Navigating
//! Navigating --[fix within range of point i < last]--> Navigating (i + 1, guidance)
//! Navigating --[fix within range of last point]--> Navigating (arrived)
//! Navigating (arrived) --[next fix]--> Completed (one completion event)
//! Navigating | Completed --[stop]--> Idle
//! ```
//!
//! Deviation is checked on every fix independently of advancing: a fix more
//! than twice the target range away from the target point raises
//! [`TrackerEvent::Deviated`], at most once per replan cooldown. The cooldown
//! restarts whether or not the resulting replan succeeds.
//!
//! The tracker never mutates the route. It is driven from a single context
//! and needs no locking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::geo::{format_meters, haversine_m, Coordinate, CoordinateTransform, Identity};
use crate::guidance::GuidanceMessage;
use crate::instruction::{self, NEXT_ROAD_MARKERS};
use crate::positioning::Fix;
use crate::route::Route;

/// Default distance at which a route point counts as reached (meters).
pub const DEFAULT_TARGET_CHANGE_RANGE_M: f64 = 5.0;

/// Default minimum time between replan requests.
pub const DEFAULT_REPLAN_COOLDOWN: Duration = Duration::from_secs(5);

/// Deviation threshold as a multiple of the target range.
pub const DEVIATION_FACTOR: f64 = 2.0;

/// Tracker tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// A point is reached when the fix is strictly closer than this (meters).
    pub target_change_range_m: f64,
    /// Minimum time between deviation-triggered replans.
    pub replan_cooldown: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            target_change_range_m: DEFAULT_TARGET_CHANGE_RANGE_M,
            replan_cooldown: DEFAULT_REPLAN_COOLDOWN,
        }
    }
}

impl TrackerConfig {
    /// Distance beyond which a fix counts as off-route.
    pub fn deviation_range_m(&self) -> f64 {
        self.target_change_range_m * DEVIATION_FACTOR
    }
}

/// Tracker lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    /// Not navigating; fixes are ignored.
    Idle,
    /// Following a route.
    Navigating,
    /// The final point was reached; fixes are ignored until restarted.
    Completed,
}

/// Identifies one start-to-stop navigation run.
///
/// Replan results carry the session they were requested in, so results that
/// arrive after a stop or restart can be recognized as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionId(u64);

impl SessionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something the tracker wants the outside world to know.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// New guidance for route point `index`.
    Guidance {
        index: usize,
        message: GuidanceMessage,
    },
    /// The traveler is off-route; a replan from `origin` should be requested.
    Deviated {
        session: SessionId,
        origin: Coordinate,
        distance_m: f64,
    },
    /// Navigation finished. Emitted once per session.
    Completed,
}

/// Tracker errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// Navigation cannot start on a route without points.
    #[error("cannot start navigation on an empty route")]
    EmptyRoute,
}

/// The route-progress state machine.
pub struct GuidanceTracker {
    config: TrackerConfig,
    transform: Arc<dyn CoordinateTransform>,
    phase: TrackerPhase,
    current_index: usize,
    first_step: bool,
    last_replan_at: Option<Instant>,
    session: SessionId,
    last_message: GuidanceMessage,
}

impl std::fmt::Debug for GuidanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuidanceTracker")
            .field("phase", &self.phase)
            .field("current_index", &self.current_index)
            .field("first_step", &self.first_step)
            .field("session", &self.session)
            .finish()
    }
}

impl GuidanceTracker {
    /// Create a tracker whose fixes are already in the route datum.
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_transform(config, Arc::new(Identity))
    }

    /// Create a tracker that converts each fix with `transform` before
    /// comparing it against route points.
    pub fn with_transform(config: TrackerConfig, transform: Arc<dyn CoordinateTransform>) -> Self {
        Self {
            config,
            transform,
            phase: TrackerPhase::Idle,
            current_index: 0,
            first_step: false,
            last_replan_at: None,
            session: SessionId::default(),
            last_message: GuidanceMessage::default(),
        }
    }

    /// Begin navigating `route` from its first point.
    ///
    /// Starts a new session; replan results from earlier sessions become
    /// stale. An empty route leaves the tracker untouched.
    pub fn start(&mut self, route: &Route, now: Instant) -> Result<SessionId, TrackerError> {
        if route.is_empty() {
            return Err(TrackerError::EmptyRoute);
        }

        self.session = SessionId(self.session.0 + 1);
        self.phase = TrackerPhase::Navigating;
        self.current_index = 0;
        self.first_step = true;
        self.last_replan_at = Some(now);
        self.last_message = GuidanceMessage::default();

        info!(session = %self.session, points = route.len(), "Navigation started");
        Ok(self.session)
    }

    /// Stop navigating. Later fixes are ignored until [`start`](Self::start).
    pub fn stop(&mut self) {
        if self.phase != TrackerPhase::Idle {
            info!(session = %self.session, index = self.current_index, "Navigation stopped");
        }
        self.phase = TrackerPhase::Idle;
        self.first_step = false;
    }

    /// Re-target the first point of a freshly replanned route.
    ///
    /// Returns false, changing nothing, when `session` is not the active
    /// navigating session.
    pub fn on_route_replaced(&mut self, session: SessionId) -> bool {
        if self.phase != TrackerPhase::Navigating || session != self.session {
            debug!(
                result_session = %session,
                active_session = %self.session,
                phase = ?self.phase,
                "Ignoring stale route replacement"
            );
            return false;
        }
        self.current_index = 0;
        self.first_step = true;
        debug!(session = %session, "Route replaced, restarting from first point");
        true
    }

    /// Process one fix against `route`.
    pub fn on_fix(&mut self, route: &Route, fix: &Fix, now: Instant) -> Vec<TrackerEvent> {
        if self.phase != TrackerPhase::Navigating {
            return Vec::new();
        }

        let Some(target) = route.get(self.current_index) else {
            self.phase = TrackerPhase::Completed;
            self.first_step = false;
            info!(session = %self.session, "Navigation complete");
            return vec![TrackerEvent::Completed];
        };

        let position = self.transform.convert(fix.coordinate);
        let distance_m = haversine_m(position, target.coordinate);
        let range = self.config.target_change_range_m;
        let mut events = Vec::new();

        if self.first_step {
            self.first_step = false;
            events.push(self.guidance_for(route, self.current_index, distance_m));
        } else if distance_m < range {
            if self.current_index < route.last_index() {
                self.current_index += 1;
                let next_distance = route
                    .get(self.current_index)
                    .map(|p| haversine_m(position, p.coordinate))
                    .unwrap_or_default();
                debug!(index = self.current_index, distance_m, "Advanced to next point");
                events.push(self.guidance_for(route, self.current_index, next_distance));
            } else {
                self.current_index = route.len();
                debug!(distance_m, "Reached final point");
            }
        }

        if distance_m > self.config.deviation_range_m() && self.replan_due(now) {
            self.last_replan_at = Some(now);
            info!(
                session = %self.session,
                index = self.current_index,
                distance_m,
                "Off route"
            );
            events.push(TrackerEvent::Deviated {
                session: self.session,
                origin: fix.coordinate,
                distance_m,
            });
        }

        events
    }

    fn replan_due(&self, now: Instant) -> bool {
        match self.last_replan_at {
            Some(last) => now.saturating_duration_since(last) > self.config.replan_cooldown,
            None => true,
        }
    }

    fn guidance_for(&mut self, route: &Route, index: usize, distance_m: f64) -> TrackerEvent {
        let fallback = format_meters(distance_m);
        let message = message_for_point(route, index, Some(&fallback), &self.last_message);
        self.last_message = message.clone();
        TrackerEvent::Guidance { index, message }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    /// True while following a route.
    pub fn is_navigating(&self) -> bool {
        self.phase == TrackerPhase::Navigating
    }

    /// Index of the current target point (equals the route length once the
    /// final point was reached).
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The active (or most recent) session.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Last guidance emitted in this session.
    pub fn last_message(&self) -> &GuidanceMessage {
        &self.last_message
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}

/// Guidance message for the route point at `index`.
///
/// When the point's own instruction names no next road, the first point of a
/// later step is consulted. Road names that still cannot be found are carried
/// over from `previous`.
pub fn message_for_point(
    route: &Route,
    index: usize,
    fallback_distance: Option<&str>,
    previous: &GuidanceMessage,
) -> GuidanceMessage {
    let instruction = route
        .get(index)
        .map(|p| p.instruction.as_str())
        .unwrap_or_default();
    let mut parsed = instruction::parse(instruction, fallback_distance);

    if parsed.next_road.is_none() {
        parsed.next_road = route
            .next_step_point(index)
            .and_then(|p| instruction::extract_road(&p.instruction, NEXT_ROAD_MARKERS));
    }

    parsed.into_message(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::TurnCategory;
    use crate::route::RoutePoint;

    // Points roughly 111 m apart along a meridian.
    fn coord(i: usize) -> Coordinate {
        Coordinate::new(34.0 + i as f64 * 0.001, 108.9)
    }

    fn route(n: usize) -> Route {
        let points = (0..n)
            .map(|i| RoutePoint::new(coord(i), format!("沿<b>路{}</b>行驶100米", i), i))
            .collect();
        Route::new(points).unwrap()
    }

    fn fix_at(c: Coordinate) -> Fix {
        Fix::new(c)
    }

    fn guidance_indices(events: &[TrackerEvent]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|e| match e {
                TrackerEvent::Guidance { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    fn started(route: &Route, now: Instant) -> GuidanceTracker {
        let mut tracker = GuidanceTracker::new(TrackerConfig::default());
        tracker.start(route, now).unwrap();
        tracker
    }

    #[test]
    fn test_idle_tracker_ignores_fixes() {
        let route = route(3);
        let mut tracker = GuidanceTracker::new(TrackerConfig::default());
        let events = tracker.on_fix(&route, &fix_at(coord(0)), Instant::now());
        assert!(events.is_empty());
        assert_eq!(tracker.phase(), TrackerPhase::Idle);
    }

    #[test]
    fn test_first_fix_announces_first_point() {
        let route = route(3);
        let now = Instant::now();
        let mut tracker = started(&route, now);

        let events = tracker.on_fix(&route, &fix_at(coord(0)), now);
        assert_eq!(guidance_indices(&events), vec![0]);
        assert_eq!(tracker.current_index(), 0);

        // Same position again: within range of point 0, advance to 1
        let events = tracker.on_fix(&route, &fix_at(coord(0)), now);
        assert_eq!(guidance_indices(&events), vec![1]);
        assert_eq!(tracker.current_index(), 1);
    }

    #[test]
    fn test_advance_uses_strict_threshold() {
        let route = route(3);
        let now = Instant::now();
        let probe = Coordinate::new(34.0, 108.90005);
        let exact = haversine_m(probe, coord(0));

        let config = TrackerConfig {
            target_change_range_m: exact,
            ..TrackerConfig::default()
        };
        let mut tracker = GuidanceTracker::new(config);
        tracker.start(&route, now).unwrap();
        tracker.on_fix(&route, &fix_at(probe), now);
        let events = tracker.on_fix(&route, &fix_at(probe), now);
        assert!(guidance_indices(&events).is_empty());
        assert_eq!(tracker.current_index(), 0);

        let config = TrackerConfig {
            target_change_range_m: exact + 1e-6,
            ..TrackerConfig::default()
        };
        let mut tracker = GuidanceTracker::new(config);
        tracker.start(&route, now).unwrap();
        tracker.on_fix(&route, &fix_at(probe), now);
        tracker.on_fix(&route, &fix_at(probe), now);
        assert_eq!(tracker.current_index(), 1);
    }

    #[test]
    fn test_completion_is_reported_once() {
        let route = route(2);
        let now = Instant::now();
        let mut tracker = started(&route, now);

        tracker.on_fix(&route, &fix_at(coord(0)), now); // announce 0
        tracker.on_fix(&route, &fix_at(coord(0)), now); // advance to 1
        let arrived = tracker.on_fix(&route, &fix_at(coord(1)), now);
        assert!(arrived.is_empty());
        assert_eq!(tracker.current_index(), 2);

        let far = Coordinate::new(10.0, 10.0);
        let events = tracker.on_fix(&route, &fix_at(far), now);
        assert_eq!(events, vec![TrackerEvent::Completed]);
        assert_eq!(tracker.phase(), TrackerPhase::Completed);

        for _ in 0..3 {
            assert!(tracker.on_fix(&route, &fix_at(far), now).is_empty());
        }
    }

    #[test]
    fn test_deviation_is_throttled_by_cooldown() {
        let route = route(3);
        let t0 = Instant::now();
        let mut tracker = started(&route, t0);
        tracker.on_fix(&route, &fix_at(coord(0)), t0);

        let off = Coordinate::new(34.0, 108.91);
        let deviations = |events: Vec<TrackerEvent>| {
            events
                .iter()
                .filter(|e| matches!(e, TrackerEvent::Deviated { .. }))
                .count()
        };

        // Within the cooldown that started with navigation
        assert_eq!(deviations(tracker.on_fix(&route, &fix_at(off), t0 + Duration::from_secs(3))), 0);
        assert_eq!(deviations(tracker.on_fix(&route, &fix_at(off), t0 + Duration::from_secs(6))), 1);
        assert_eq!(deviations(tracker.on_fix(&route, &fix_at(off), t0 + Duration::from_secs(8))), 0);
        assert_eq!(deviations(tracker.on_fix(&route, &fix_at(off), t0 + Duration::from_secs(12))), 1);
    }

    #[test]
    fn test_deviation_carries_session_and_origin() {
        let route = route(3);
        let t0 = Instant::now();
        let mut tracker = started(&route, t0);
        let off = Coordinate::new(34.0, 108.91);
        let events = tracker.on_fix(&route, &fix_at(off), t0 + Duration::from_secs(10));

        let deviated = events.iter().find_map(|e| match e {
            TrackerEvent::Deviated {
                session, origin, ..
            } => Some((*session, *origin)),
            _ => None,
        });
        assert_eq!(deviated, Some((tracker.session(), off)));
    }

    #[test]
    fn test_stop_ignores_fixes_and_stales_session() {
        let route = route(3);
        let now = Instant::now();
        let mut tracker = started(&route, now);
        let session = tracker.session();

        tracker.stop();
        assert!(tracker.on_fix(&route, &fix_at(coord(0)), now).is_empty());
        assert!(!tracker.on_route_replaced(session));

        let restarted = tracker.start(&route, now).unwrap();
        assert_ne!(restarted, session);
        assert!(!tracker.on_route_replaced(session));
        assert!(tracker.on_route_replaced(restarted));
    }

    #[test]
    fn test_route_replacement_reannounces_first_point() {
        let route = route(3);
        let now = Instant::now();
        let mut tracker = started(&route, now);
        tracker.on_fix(&route, &fix_at(coord(0)), now);
        tracker.on_fix(&route, &fix_at(coord(0)), now);
        assert_eq!(tracker.current_index(), 1);

        let replanned = Route::new(vec![
            RoutePoint::new(coord(5), "沿<b>新路</b>行驶200米", 0),
            RoutePoint::new(coord(6), "左转", 1),
        ])
        .unwrap();
        assert!(tracker.on_route_replaced(tracker.session()));
        let events = tracker.on_fix(&replanned, &fix_at(coord(4)), now);
        assert_eq!(guidance_indices(&events), vec![0]);
    }

    #[test]
    fn test_guidance_merges_roads_and_looks_ahead() {
        let route = Route::new(vec![
            RoutePoint::new(coord(0), "沿<b>长安路</b>行驶500米", 0),
            RoutePoint::new(coord(1), "沿<b>长安路</b>行驶500米", 0),
            RoutePoint::new(coord(2), "右转进入<b>大雁塔南路</b>", 1),
            RoutePoint::new(coord(3), "左转", 2),
        ])
        .unwrap();
        let now = Instant::now();
        let mut tracker = started(&route, now);

        let events = tracker.on_fix(&route, &fix_at(coord(0)), now);
        let TrackerEvent::Guidance { message, .. } = &events[0] else {
            panic!("expected guidance, got {:?}", events);
        };
        assert_eq!(message.current_road, "长安路");
        assert_eq!(message.next_road, "大雁塔南路");
        assert_eq!(message.distance_text, "500米");

        tracker.on_fix(&route, &fix_at(coord(0)), now); // -> 1
        let events = tracker.on_fix(&route, &fix_at(coord(1)), now); // -> 2
        let TrackerEvent::Guidance { message, .. } = &events[0] else {
            panic!("expected guidance, got {:?}", events);
        };
        assert_eq!(message.turn, TurnCategory::Right);
        assert_eq!(message.current_road, "长安路");
        assert_eq!(message.next_road, "大雁塔南路");
        // No distance in the text: falls back to the fix-to-point distance
        assert!(message.distance_text.ends_with('米'));
        assert_ne!(message.distance_text, "未知距离");
    }

    #[test]
    fn test_restart_resets_progress() {
        let route = route(3);
        let now = Instant::now();
        let mut tracker = started(&route, now);
        tracker.on_fix(&route, &fix_at(coord(0)), now);
        tracker.on_fix(&route, &fix_at(coord(0)), now);
        assert_eq!(tracker.current_index(), 1);

        tracker.start(&route, now).unwrap();
        assert_eq!(tracker.current_index(), 0);
        assert_eq!(tracker.last_message(), &GuidanceMessage::default());
        let events = tracker.on_fix(&route, &fix_at(coord(2)), now);
        assert_eq!(guidance_indices(&events), vec![0]);
    }
}
