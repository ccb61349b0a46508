//! Navigate command - follow a route with a fix stream.
//!
//! Fixes are read as `lat,lon` lines from a file or stdin. Guidance goes to
//! the terminal, the speech prompt log and, unless disabled, the UDP peer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use navcast::config::NavcastConfig;
use navcast::engine::{EngineSummary, NavigationEngine};
use navcast::geo::{Coordinate, CoordinateTransform};
use navcast::guidance::{GuidanceBus, SpeechConsumer, TracingSpeechSink};
use navcast::positioning::{fix_channel, spawn_line_source, Fix, FixReceiver};
use navcast::routing::{
    resolve_destination, BaiduClient, LocalRouteFile, ReqwestClient, RoutePlanner,
};
use navcast::transport::{hand_off_queue, DatagramReceiver, DatagramSender};

use super::common::{
    load_route_file, open_fix_reader, print_status, shutdown_token, ConsoleConsumer,
};
use crate::error::CliError;
use crate::runner::CliRunner;

/// How long the runtime waits for blocked reads (stdin) at exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Arguments for the navigate command.
#[derive(Debug, Args)]
pub struct NavigateArgs {
    /// Destination: "lat,lon" in the fix datum, or an address to geocode
    #[arg(long, short)]
    pub destination: Option<String>,

    /// Pre-computed route in the directions response format (default: from config)
    #[arg(long)]
    pub route_file: Option<PathBuf>,

    /// File with one "lat,lon" fix per line (default: stdin)
    #[arg(long)]
    pub fixes: Option<PathBuf>,

    /// Pause between fix lines in milliseconds (default: the fix interval)
    #[arg(long)]
    pub pace_ms: Option<u64>,

    /// Keep navigating this long after the fix source ends (milliseconds)
    #[arg(long, default_value = "2000")]
    pub linger_ms: u64,

    /// Routing service access key (overrides config)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Guidance peer host (overrides config)
    #[arg(long)]
    pub peer: Option<String>,

    /// Guidance peer port (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Do not send guidance over UDP
    #[arg(long)]
    pub no_udp: bool,

    /// Also show guidance datagrams received from the peer
    #[arg(long)]
    pub listen: bool,
}

/// Where the first route comes from.
enum PlanSource {
    File(LocalRouteFile),
    Live {
        client: Arc<BaiduClient<ReqwestClient>>,
        destination: Coordinate,
    },
}

impl PlanSource {
    fn planner(&self) -> Arc<dyn RoutePlanner> {
        match self {
            PlanSource::File(file) => Arc::new(file.clone()),
            PlanSource::Live { client, .. } => Arc::clone(client) as Arc<dyn RoutePlanner>,
        }
    }
}

/// Run the navigate command.
pub fn run(runner: &CliRunner, args: NavigateArgs) -> Result<(), CliError> {
    runner.log_startup("navigate");
    let config = runner.config().clone();
    let transform = runner.coordinate_transform()?;

    // The blocking HTTP client must be created and dropped outside the
    // runtime; `plan` outlives `runtime`.
    let plan = plan_source(&config, &args, transform.as_ref())?;

    let bus = Arc::new(GuidanceBus::new());
    bus.subscribe(Arc::new(ConsoleConsumer::new("guidance")))?;
    bus.subscribe(Arc::new(SpeechConsumer::new(Arc::new(TracingSpeechSink))))?;
    let sender = if args.no_udp {
        None
    } else {
        let peer = runner.peer_addr(args.peer.as_deref(), args.port)?;
        let sender = Arc::new(DatagramSender::bind(peer)?);
        bus.subscribe(sender.clone())?;
        println!("Sending guidance to {}", peer);
        Some(sender)
    };

    let runtime = runner.runtime()?;
    let cancel = shutdown_token()?;

    let result = runtime.block_on(drive(
        &config,
        &args,
        &plan,
        transform,
        Arc::clone(&bus),
        cancel,
    ));

    bus.close();
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);

    let (summary, fixes_read) = result?;
    print_summary(&summary, fixes_read, sender.as_deref());
    Ok(())
}

fn plan_source(
    config: &NavcastConfig,
    args: &NavigateArgs,
    transform: &dyn CoordinateTransform,
) -> Result<PlanSource, CliError> {
    let route_path = args
        .route_file
        .clone()
        .or_else(|| config.routing.route_file.clone());
    if let Some(path) = route_path {
        if args.destination.is_some() {
            println!("Using route file; --destination is ignored");
        }
        return Ok(PlanSource::File(load_route_file(&path)?));
    }

    let destination = args.destination.as_deref().ok_or_else(|| {
        CliError::InvalidArgument(
            "--destination is required when no route file is configured".to_string(),
        )
    })?;
    let baidu = config.baidu_config(args.api_key.as_deref());
    if baidu.api_key.is_empty() {
        return Err(CliError::InvalidArgument(
            "live routing needs an access key: set routing.api_key or pass --api-key".to_string(),
        ));
    }

    let http = ReqwestClient::with_timeout(config.routing.timeout)?;
    let client = Arc::new(BaiduClient::new(http, baidu));
    let destination = resolve_destination(
        destination,
        client.as_ref(),
        &config.retry_policy(),
        transform,
    )?;
    println!("Destination: {}", destination);

    Ok(PlanSource::Live {
        client,
        destination,
    })
}

async fn drive(
    config: &NavcastConfig,
    args: &NavigateArgs,
    plan: &PlanSource,
    transform: Arc<dyn CoordinateTransform>,
    bus: Arc<GuidanceBus>,
    cancel: CancellationToken,
) -> Result<(EngineSummary, usize), CliError> {
    let mut engine =
        NavigationEngine::new(config.engine_config(), plan.planner(), bus).with_transform(transform);

    let inbound = if args.listen {
        let (hand_off, queue) = hand_off_queue(config.network.hand_off_capacity);
        let receiver = DatagramReceiver::bind(config.receiver_config(), hand_off).await?;
        println!("Listening for peer guidance on {}", receiver.local_addr()?);
        let inbound_bus = Arc::new(GuidanceBus::new());
        inbound_bus.subscribe(Arc::new(ConsoleConsumer::new("peer")))?;
        engine.attach_inbound(queue, Arc::clone(&inbound_bus));
        Some((receiver.spawn(cancel.clone()), inbound_bus))
    } else {
        None
    };

    let mut status_rx = engine.subscribe_status();
    let status_task = tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(update) => print_status(&update),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Status output lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let (fix_tx, fix_rx) = fix_channel();
    let pace = args
        .pace_ms
        .map(Duration::from_millis)
        .unwrap_or(config.navigation.fix_interval);
    let reader = open_fix_reader(args.fixes.as_deref())?;
    let source = spawn_line_source(reader, pace, fix_tx, cancel.clone());
    let watchdog = spawn_linger(source, Duration::from_millis(args.linger_ms), cancel.clone());

    let outcome = match start_navigation(&mut engine, plan, &fix_rx, &cancel).await {
        Ok(true) => Ok(engine.run(fix_rx, cancel.clone()).await),
        Ok(false) => Ok(engine.summary()),
        Err(e) => Err(e),
    };

    engine.stop();
    cancel.cancel();
    let fixes_read = watchdog.await.unwrap_or_default();
    if let Some((handle, inbound_bus)) = inbound {
        if let Ok(stats) = handle.await {
            info!(
                datagrams = stats.datagrams,
                delivered = stats.delivered,
                malformed = stats.malformed,
                dropped = stats.dropped,
                "Receiver finished"
            );
        }
        inbound_bus.close();
    }
    drop(engine);
    let _ = status_task.await;

    outcome.map(|summary| (summary, fixes_read))
}

/// Start on the route file, or plan from the first fix.
///
/// Returns false when cancelled or out of fixes before a route existed.
async fn start_navigation(
    engine: &mut NavigationEngine,
    plan: &PlanSource,
    fixes: &FixReceiver,
    cancel: &CancellationToken,
) -> Result<bool, CliError> {
    match plan {
        PlanSource::File(file) => {
            let route = file.route().clone();
            let destination = route.points()[route.last_index()].coordinate;
            engine.start(route, destination, Instant::now())?;
            Ok(true)
        }
        PlanSource::Live { destination, .. } => {
            let first = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                fix = first_fix(fixes.clone()) => fix,
            };
            let Some(fix) = first else {
                println!("No fix received, nothing to navigate");
                return Ok(false);
            };
            let origin = engine.to_route_datum(fix.coordinate);
            engine.plan_and_start(origin, *destination).await?;
            Ok(true)
        }
    }
}

/// The first published fix, or `None` if the source ends without one.
async fn first_fix(mut fixes: FixReceiver) -> Option<Fix> {
    let fix = fixes.wait_for(Option::is_some).await.ok()?;
    *fix
}

/// Cancel `cancel` once `source` has finished and `linger` has passed.
///
/// Returns the number of fixes the source published.
fn spawn_linger(
    source: JoinHandle<usize>,
    linger: Duration,
    cancel: CancellationToken,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let published = source.await.unwrap_or_default();
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(linger) => {
                info!(published, "Fix source finished, stopping navigation");
                cancel.cancel();
            }
        }
        published
    })
}

fn print_summary(summary: &EngineSummary, fixes_read: usize, sender: Option<&DatagramSender>) {
    println!();
    println!("Navigation summary");
    println!("  Fixes read:      {}", fixes_read);
    println!("  Fixes evaluated: {}", summary.fixes);
    println!("  Guidance sent:   {}", summary.guidance);
    println!("  Replans:         {}", summary.replans);
    if summary.inbound > 0 {
        println!("  From peer:       {}", summary.inbound);
    }
    if let Some(sender) = sender {
        println!(
            "  UDP datagrams:   {} sent, {} failed ({})",
            sender.sent_count(),
            sender.failed_count(),
            sender.peer()
        );
    }
    println!(
        "  Completed:       {}",
        if summary.completed { "yes" } else { "no" }
    );
}
