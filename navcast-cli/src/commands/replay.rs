//! Replay command - cycle through a route's guidance without positioning.
//!
//! Every interval the next route point's guidance is published to the
//! terminal and the UDP peer, wrapping around at the end. Useful for testing
//! a display peer without driving.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use navcast::guidance::{GuidanceBus, GuidanceMessage};
use navcast::route::Route;
use navcast::tracker::message_for_point;
use navcast::transport::DatagramSender;

use super::common::{load_route_file, shutdown_token, ConsoleConsumer};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the replay command.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Route file in the directions response format (default: from config)
    #[arg(long)]
    pub route_file: Option<PathBuf>,

    /// Milliseconds between two messages
    #[arg(long, default_value = "1000")]
    pub interval_ms: u64,

    /// Passes over the route before stopping (0 = until Ctrl-C)
    #[arg(long, default_value = "0")]
    pub loops: u32,

    /// Guidance peer host (overrides config)
    #[arg(long)]
    pub peer: Option<String>,

    /// Guidance peer port (overrides config)
    #[arg(long)]
    pub port: Option<u16>,
}

/// Run the replay command.
pub fn run(runner: &CliRunner, args: ReplayArgs) -> Result<(), CliError> {
    runner.log_startup("replay");

    let path = args
        .route_file
        .clone()
        .or_else(|| runner.config().routing.route_file.clone())
        .ok_or_else(|| {
            CliError::InvalidArgument(
                "no route: pass --route-file or set routing.route_file".to_string(),
            )
        })?;
    if args.interval_ms == 0 {
        return Err(CliError::InvalidArgument(
            "--interval-ms must be positive".to_string(),
        ));
    }
    let route_file = load_route_file(&path)?;
    let messages = route_messages(route_file.route());

    let peer = runner.peer_addr(args.peer.as_deref(), args.port)?;
    let sender = Arc::new(DatagramSender::bind(peer)?);
    let bus = Arc::new(GuidanceBus::new());
    bus.subscribe(Arc::new(ConsoleConsumer::new("replay")))?;
    bus.subscribe(sender.clone())?;
    println!("Replaying {} messages to {} (Ctrl-C to stop)", messages.len(), peer);

    let runtime = runner.runtime()?;
    let cancel = shutdown_token()?;
    let published = runtime.block_on(replay(
        &messages,
        &bus,
        Duration::from_millis(args.interval_ms),
        args.loops,
        cancel,
    ));
    bus.close();

    println!();
    println!(
        "Replayed {} messages: {} sent, {} failed",
        published,
        sender.sent_count(),
        sender.failed_count()
    );
    Ok(())
}

/// Guidance for every point of the route, in order.
///
/// Road names missing from a point carry over from the point before it.
pub fn route_messages(route: &Route) -> Vec<GuidanceMessage> {
    let mut previous = GuidanceMessage::default();
    (0..route.len())
        .map(|index| {
            let message = message_for_point(route, index, None, &previous);
            previous = message.clone();
            message
        })
        .collect()
}

/// Publish `messages` in a cycle, one per tick. `loops == 0` repeats until
/// cancelled. Returns the number published.
async fn replay(
    messages: &[GuidanceMessage],
    bus: &GuidanceBus,
    interval: Duration,
    loops: u32,
    cancel: CancellationToken,
) -> u64 {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let total = if loops == 0 {
        None
    } else {
        Some(messages.len() as u64 * u64::from(loops))
    };
    let mut published = 0u64;

    for (index, message) in messages.iter().enumerate().cycle() {
        if total.is_some_and(|total| published >= total) {
            break;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        debug!(index, "Replaying route point");
        bus.publish(message.clone());
        published += 1;
    }

    info!(published, "Replay finished");
    published
}

#[cfg(test)]
mod tests {
    use super::*;
    use navcast::geo::Coordinate;
    use navcast::guidance::{CallbackConsumer, TurnCategory};
    use navcast::route::RoutePoint;
    use std::sync::Mutex;

    fn sample_route() -> Route {
        Route::new(vec![
            RoutePoint::new(
                Coordinate::new(34.2200, 108.9500),
                "沿<b>长安路</b>行驶200米，右转进入<b>大雁塔南路</b>",
                0,
            ),
            RoutePoint::new(
                Coordinate::new(34.2210, 108.9500),
                "沿<b>长安路</b>行驶200米，右转进入<b>大雁塔南路</b>",
                0,
            ),
            RoutePoint::new(Coordinate::new(34.2210, 108.9520), "直行100米到达终点", 1),
        ])
        .unwrap()
    }

    #[test]
    fn test_route_messages_carry_roads_forward() {
        let messages = route_messages(&sample_route());

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].turn, TurnCategory::Right);
        assert_eq!(messages[0].next_road, "大雁塔南路");
        assert_eq!(messages[2].turn, TurnCategory::Straight);
        assert_eq!(messages[2].current_road, "长安路");
    }

    #[tokio::test]
    async fn test_replay_stops_after_loops() {
        let messages = route_messages(&sample_route());
        let bus = GuidanceBus::new();
        let recorder = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&recorder);
        bus.subscribe(Arc::new(CallbackConsumer::new("record", move |m: &GuidanceMessage| {
            sink.lock().unwrap().push(m.clone());
        })))
        .unwrap();

        let published = replay(
            &messages,
            &bus,
            Duration::from_millis(1),
            2,
            CancellationToken::new(),
        )
        .await;
        bus.close();

        assert_eq!(published, 6);
        let seen = recorder.lock().unwrap();
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[3], messages[0]);
    }

    #[tokio::test]
    async fn test_replay_stops_on_cancel() {
        let messages = route_messages(&sample_route());
        let bus = GuidanceBus::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let published = replay(&messages, &bus, Duration::from_millis(1), 0, cancel).await;
        assert_eq!(published, 0);
    }
}
