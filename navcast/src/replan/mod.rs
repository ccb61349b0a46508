//! Replan requests after deviation.
//!
//! [`ReplanCoordinator`] runs at most one replan at a time. A request made
//! while another is outstanding is dropped rather than queued; the tracker's
//! cooldown bounds how often requests arrive, and the next deviation check
//! simply asks again.
//!
//! Planning is blocking work (HTTP plus retries) and runs on tokio's
//! blocking pool. The runtime is the caller's, or the one that was current
//! when the coordinator was built; with neither, the request reports
//! [`ReplanSubmission::Unavailable`]. Outcomes come back over a channel
//! that the owning context drains with [`ReplanCoordinator::poll_completed`], so the route store and
//! tracker are only ever touched from that context.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::geo::Coordinate;
use crate::retry::RetryPolicy;
use crate::route::Route;
use crate::routing::{plan_with_retry, RoutePlanner, RoutingError};
use crate::tracker::SessionId;

/// Result of [`ReplanCoordinator::request_replan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplanSubmission {
    /// Work was started.
    Submitted,
    /// Another replan is in flight; nothing was started.
    Dropped,
    /// No tokio runtime to run the work on; nothing was started.
    Unavailable,
}

/// A finished replan, tagged with the session that requested it.
#[derive(Debug)]
pub struct ReplanOutcome {
    pub session: SessionId,
    pub result: Result<Route, RoutingError>,
}

/// Clears the in-flight flag when the blocking task ends, even by panic.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight replan runner.
pub struct ReplanCoordinator {
    planner: Arc<dyn RoutePlanner>,
    policy: RetryPolicy,
    runtime: Option<Handle>,
    in_flight: Arc<AtomicBool>,
    completed_tx: mpsc::UnboundedSender<ReplanOutcome>,
    completed_rx: mpsc::UnboundedReceiver<ReplanOutcome>,
    submitted: AtomicU64,
    dropped: AtomicU64,
}

impl ReplanCoordinator {
    pub fn new(planner: Arc<dyn RoutePlanner>, policy: RetryPolicy) -> Self {
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Self {
            planner,
            policy,
            runtime: Handle::try_current().ok(),
            in_flight: Arc::new(AtomicBool::new(false)),
            completed_tx,
            completed_rx,
            submitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Start planning from `origin` to `destination` unless a replan is
    /// already running.
    pub fn request_replan(
        &self,
        session: SessionId,
        origin: Coordinate,
        destination: Coordinate,
    ) -> ReplanSubmission {
        let Some(runtime) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            warn!(session = %session, "No async runtime for replanning");
            return ReplanSubmission::Unavailable;
        };
        if self.in_flight.swap(true, Ordering::AcqRel) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(session = %session, "Replan already in flight, dropping request");
            return ReplanSubmission::Dropped;
        }

        self.submitted.fetch_add(1, Ordering::Relaxed);
        info!(session = %session, origin = %origin, destination = %destination, "Replanning");

        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let planner = Arc::clone(&self.planner);
        let policy = self.policy.clone();
        let tx = self.completed_tx.clone();

        runtime.spawn_blocking(move || {
            let _guard = guard;
            let result = plan_with_retry(planner.as_ref(), &policy, origin, destination);
            match &result {
                Ok(route) => debug!(session = %session, points = route.len(), "Replan finished"),
                Err(e) => warn!(session = %session, error = %e, "Replan failed"),
            }
            // Receiver gone means the coordinator was dropped; nothing to do
            let _ = tx.send(ReplanOutcome { session, result });
        });

        ReplanSubmission::Submitted
    }

    /// Take every outcome that has arrived since the last call.
    pub fn poll_completed(&mut self) -> Vec<ReplanOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(outcome) = self.completed_rx.try_recv() {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// True while a replan is running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Number of replans started.
    pub fn submitted_count(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Number of requests dropped because one was in flight.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RoutePoint;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    struct SlowPlanner {
        delay: Duration,
        calls: AtomicU32,
        fail: bool,
    }

    impl SlowPlanner {
        fn new(delay_ms: u64, fail: bool) -> Self {
            Self {
                delay: Duration::from_millis(delay_ms),
                calls: AtomicU32::new(0),
                fail,
            }
        }
    }

    impl RoutePlanner for SlowPlanner {
        fn plan(&self, origin: Coordinate, _destination: Coordinate) -> Result<Route, RoutingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if self.fail {
                return Err(RoutingError::Http("unreachable".into()));
            }
            Ok(Route::new(vec![RoutePoint::new(origin, "直行", 0)])?)
        }
    }

    async fn wait_for_outcome(coordinator: &mut ReplanCoordinator) -> ReplanOutcome {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = coordinator.poll_completed().pop() {
                return outcome;
            }
            assert!(tokio::time::Instant::now() < deadline, "replan did not finish in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_second_request_is_dropped_while_in_flight() {
        let planner = Arc::new(SlowPlanner::new(100, false));
        let mut coordinator = ReplanCoordinator::new(planner.clone(), RetryPolicy::None);
        let session = SessionId::default();
        let here = Coordinate::new(34.0, 108.9);
        let there = Coordinate::new(34.1, 109.0);

        assert_eq!(coordinator.request_replan(session, here, there), ReplanSubmission::Submitted);
        assert!(coordinator.is_in_flight());
        assert_eq!(coordinator.request_replan(session, here, there), ReplanSubmission::Dropped);

        let outcome = wait_for_outcome(&mut coordinator).await;
        assert_eq!(outcome.session, session);
        let route = outcome.result.unwrap();
        assert_eq!(route.points()[0].coordinate, here);

        assert_eq!(planner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.submitted_count(), 1);
        assert_eq!(coordinator.dropped_count(), 1);
    }

    #[test]
    fn test_request_without_runtime_is_unavailable() {
        let planner = Arc::new(SlowPlanner::new(0, false));
        let coordinator = ReplanCoordinator::new(planner.clone(), RetryPolicy::None);
        let c = Coordinate::new(34.0, 108.9);

        assert_eq!(
            coordinator.request_replan(SessionId::default(), c, c),
            ReplanSubmission::Unavailable
        );
        assert!(!coordinator.is_in_flight());
        assert_eq!(coordinator.submitted_count(), 0);
        assert_eq!(planner.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_runtime_captured_at_construction_is_used() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let planner = Arc::new(SlowPlanner::new(0, false));
        let mut coordinator = {
            let _entered = runtime.enter();
            ReplanCoordinator::new(planner.clone(), RetryPolicy::None)
        };
        let c = Coordinate::new(34.0, 108.9);

        assert_eq!(
            coordinator.request_replan(SessionId::default(), c, c),
            ReplanSubmission::Submitted
        );
        let outcome = runtime.block_on(wait_for_outcome(&mut coordinator));
        assert!(outcome.result.is_ok());
    }

    #[tokio::test]
    async fn test_failure_is_retried_then_reported() {
        let planner = Arc::new(SlowPlanner::new(0, true));
        let mut coordinator =
            ReplanCoordinator::new(planner.clone(), RetryPolicy::fixed(3, Duration::ZERO));

        coordinator.request_replan(
            SessionId::default(),
            Coordinate::new(34.0, 108.9),
            Coordinate::new(34.1, 109.0),
        );
        let outcome = wait_for_outcome(&mut coordinator).await;
        assert!(matches!(outcome.result, Err(RoutingError::Http(_))));
        assert_eq!(planner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_new_request_allowed_after_completion() {
        let planner = Arc::new(SlowPlanner::new(0, false));
        let mut coordinator = ReplanCoordinator::new(planner, RetryPolicy::None);
        let c = Coordinate::new(34.0, 108.9);

        coordinator.request_replan(SessionId::default(), c, c);
        wait_for_outcome(&mut coordinator).await;

        // The flag is cleared when the blocking task ends
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while coordinator.is_in_flight() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            coordinator.request_replan(SessionId::default(), c, c),
            ReplanSubmission::Submitted
        );
        wait_for_outcome(&mut coordinator).await;
        assert!(coordinator.poll_completed().is_empty());
    }
}
