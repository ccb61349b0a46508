//! The navigation engine: the single context that owns navigation state.
//!
//! # Architecture
//!
//! ```text
//!   fix source ──watch──┐
//!                       ▼
//!                 ┌───────────┐  guidance   ┌─────────────┐
//!   replan  ─────►│  engine   │────────────►│ GuidanceBus │──► consumers
//!   outcomes      │  (tick)   │             └─────────────┘
//!   hand-off ────►│           │──► status broadcast
//!                 └───────────┘
//! ```
//!
//! On every tick the engine applies finished replans, forwards inbound
//! network messages, and feeds the latest fix to the tracker. The route
//! store and tracker are only touched here, so none of it needs locking.
//! Background work (planning, receiving) reports back through channels.

mod status;

pub use status::{NavigationStatus, StatusUpdate};

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::geo::{Coordinate, CoordinateTransform, Identity};
use crate::guidance::GuidanceBus;
use crate::positioning::{Fix, FixReceiver};
use crate::replan::{ReplanCoordinator, ReplanSubmission};
use crate::retry::RetryPolicy;
use crate::route::{Route, RouteStore};
use crate::routing::{plan_with_retry, RoutePlanner, RoutingError};
use crate::tracker::{GuidanceTracker, SessionId, TrackerConfig, TrackerError, TrackerEvent, TrackerPhase};
use crate::transport::HandOffQueue;

/// Default interval between fix evaluations (5 Hz).
pub const DEFAULT_FIX_INTERVAL: Duration = Duration::from_millis(200);

/// Capacity of the status broadcast channel.
const STATUS_CHANNEL_CAPACITY: usize = 64;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tracker thresholds.
    pub tracker: TrackerConfig,
    /// How often the latest fix is evaluated.
    pub fix_interval: Duration,
    /// Retry policy for initial planning and replans.
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            fix_interval: DEFAULT_FIX_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }
}

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Counters returned by [`NavigationEngine::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// Fixes handed to the tracker.
    pub fixes: u64,
    /// Guidance messages published.
    pub guidance: u64,
    /// Inbound network messages forwarded.
    pub inbound: u64,
    /// Replans started.
    pub replans: u64,
    /// Whether navigation reached the final point.
    pub completed: bool,
}

/// Wires route store, tracker, replan coordinator, bus and hand-off queue.
pub struct NavigationEngine {
    config: EngineConfig,
    store: RouteStore,
    tracker: GuidanceTracker,
    transform: Arc<dyn CoordinateTransform>,
    planner: Arc<dyn RoutePlanner>,
    replan: ReplanCoordinator,
    bus: Arc<GuidanceBus>,
    inbound: Option<(HandOffQueue, Arc<GuidanceBus>)>,
    destination: Option<Coordinate>,
    status_tx: broadcast::Sender<StatusUpdate>,
    summary: EngineSummary,
}

impl NavigationEngine {
    /// Create an idle engine publishing guidance on `bus`.
    pub fn new(config: EngineConfig, planner: Arc<dyn RoutePlanner>, bus: Arc<GuidanceBus>) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        let transform: Arc<dyn CoordinateTransform> = Arc::new(Identity);
        Self {
            tracker: GuidanceTracker::with_transform(config.tracker.clone(), Arc::clone(&transform)),
            replan: ReplanCoordinator::new(Arc::clone(&planner), config.retry.clone()),
            config,
            store: RouteStore::new(),
            transform,
            planner,
            bus,
            inbound: None,
            destination: None,
            status_tx,
            summary: EngineSummary::default(),
        }
    }

    /// Convert fixes with `transform` before comparing them with the route.
    ///
    /// Resets the tracker; call before starting navigation.
    pub fn with_transform(mut self, transform: Arc<dyn CoordinateTransform>) -> Self {
        self.tracker = GuidanceTracker::with_transform(self.config.tracker.clone(), Arc::clone(&transform));
        self.transform = transform;
        self
    }

    /// Forward messages arriving on `queue` to `bus` once per tick.
    pub fn attach_inbound(&mut self, queue: HandOffQueue, bus: Arc<GuidanceBus>) {
        self.inbound = Some((queue, bus));
    }

    /// Subscribe to status updates.
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusUpdate> {
        self.status_tx.subscribe()
    }

    /// Convert a fix-datum coordinate to the route datum.
    pub fn to_route_datum(&self, coordinate: Coordinate) -> Coordinate {
        self.transform.convert(coordinate)
    }

    /// Start navigating a route that is already planned.
    ///
    /// `destination` (route datum) is the target for replans.
    pub fn start(
        &mut self,
        route: Route,
        destination: Coordinate,
        now: Instant,
    ) -> Result<SessionId, EngineError> {
        let session = self.tracker.start(&route, now)?;
        let points = route.len();
        let steps = route.step_count();
        self.store.replace(route);
        self.destination = Some(destination);
        self.emit(NavigationStatus::Started { points, steps });
        Ok(session)
    }

    /// Plan a route on the blocking pool, then start navigating it.
    ///
    /// Both coordinates are in the route datum.
    pub async fn plan_and_start(
        &mut self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<SessionId, EngineError> {
        self.emit(NavigationStatus::Planning);

        let planner = Arc::clone(&self.planner);
        let policy = self.config.retry.clone();
        let planned = tokio::task::spawn_blocking(move || {
            plan_with_retry(planner.as_ref(), &policy, origin, destination)
        })
        .await
        .map_err(|e| RoutingError::Task(e.to_string()))
        .and_then(|result| result);

        match planned {
            Ok(route) => self.start(route, destination, Instant::now()),
            Err(e) => {
                self.emit(NavigationStatus::PlanningFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Stop navigating. Replans still in flight are discarded on arrival.
    pub fn stop(&mut self) {
        if self.tracker.is_navigating() {
            self.tracker.stop();
            self.emit(NavigationStatus::Stopped);
        } else {
            self.tracker.stop();
        }
    }

    /// Feed one fix to the tracker and act on its events.
    pub fn handle_fix(&mut self, fix: &Fix, now: Instant) {
        let Some(route) = self.store.shared() else {
            return;
        };
        self.summary.fixes += 1;

        for event in self.tracker.on_fix(&route, fix, now) {
            match event {
                TrackerEvent::Guidance { index, message } => {
                    debug!(index, message = %message, "Publishing guidance");
                    self.bus.publish(message);
                    self.summary.guidance += 1;
                }
                TrackerEvent::Deviated {
                    session,
                    origin,
                    distance_m,
                } => {
                    self.emit(NavigationStatus::Deviated { distance_m });
                    self.request_replan(session, origin);
                }
                TrackerEvent::Completed => {
                    self.summary.completed = true;
                    self.emit(NavigationStatus::Completed);
                }
            }
        }
    }

    fn request_replan(&mut self, session: SessionId, origin: Coordinate) {
        let Some(destination) = self.destination else {
            warn!("Deviation without a destination, not replanning");
            return;
        };
        let origin = self.transform.convert(origin);
        match self.replan.request_replan(session, origin, destination) {
            ReplanSubmission::Submitted => self.summary.replans += 1,
            ReplanSubmission::Dropped => {}
            ReplanSubmission::Unavailable => self.emit(NavigationStatus::ReplanFailed(
                "no async runtime to plan on".to_string(),
            )),
        }
    }

    /// Apply replans that finished since the last call.
    pub fn apply_replans(&mut self) {
        for outcome in self.replan.poll_completed() {
            match outcome.result {
                Ok(route) => {
                    if !self.tracker.on_route_replaced(outcome.session) {
                        debug!(session = %outcome.session, "Discarding stale replan");
                        continue;
                    }
                    let points = route.len();
                    self.store.replace(route);
                    self.emit(NavigationStatus::Replanned { points });
                }
                Err(e) => {
                    if outcome.session == self.tracker.session() && self.tracker.is_navigating() {
                        self.emit(NavigationStatus::ReplanFailed(e.to_string()));
                    } else {
                        debug!(session = %outcome.session, error = %e, "Discarding stale replan failure");
                    }
                }
            }
        }
    }

    /// Forward queued inbound messages to their bus.
    pub fn drain_inbound(&mut self) -> usize {
        let Some((queue, bus)) = self.inbound.as_mut() else {
            return 0;
        };
        let messages = queue.drain();
        let count = messages.len();
        for message in messages {
            bus.publish(message);
        }
        self.summary.inbound += count as u64;
        count
    }

    /// One scheduling tick.
    pub fn tick(&mut self, fix: Option<Fix>, now: Instant) {
        self.summary.ticks += 1;
        self.apply_replans();
        self.drain_inbound();
        if let Some(fix) = fix {
            self.handle_fix(&fix, now);
        }
    }

    /// Tick at the fix interval until cancelled or navigation completes.
    pub async fn run(&mut self, fixes: FixReceiver, cancel: CancellationToken) -> EngineSummary {
        let mut interval = tokio::time::interval(self.config.fix_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = self.config.fix_interval.as_millis() as u64, "Navigation engine running");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Navigation engine cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let fix = *fixes.borrow();
                    self.tick(fix, Instant::now());
                    if self.tracker.phase() == TrackerPhase::Completed {
                        break;
                    }
                }
            }
        }

        info!(
            ticks = self.summary.ticks,
            fixes = self.summary.fixes,
            guidance = self.summary.guidance,
            inbound = self.summary.inbound,
            replans = self.summary.replans,
            completed = self.summary.completed,
            "Navigation engine stopped"
        );
        self.summary
    }

    fn emit(&self, status: NavigationStatus) {
        if status.is_error() {
            warn!(status = %status, "Navigation status");
        } else {
            info!(status = %status, "Navigation status");
        }
        // No subscribers is fine
        let _ = self.status_tx.send(StatusUpdate::now(status));
    }

    /// The active route, if any.
    pub fn route(&self) -> Option<&Route> {
        self.store.route()
    }

    pub fn tracker(&self) -> &GuidanceTracker {
        &self.tracker
    }

    pub fn summary(&self) -> EngineSummary {
        self.summary
    }

    pub fn bus(&self) -> &Arc<GuidanceBus> {
        &self.bus
    }
}
