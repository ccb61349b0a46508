//! Listen command - show guidance datagrams sent by a peer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio_util::sync::CancellationToken;

use navcast::guidance::{GuidanceBus, SpeechConsumer, TracingSpeechSink};
use navcast::transport::{hand_off_queue, DatagramReceiver, HandOffQueue, ReceiverStats};

use super::common::{shutdown_token, ConsoleConsumer};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the listen command.
#[derive(Debug, Args)]
pub struct ListenArgs {
    /// UDP port to listen on (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Also log a speech prompt for every message
    #[arg(long)]
    pub speak: bool,
}

/// Run the listen command.
pub fn run(runner: &CliRunner, args: ListenArgs) -> Result<(), CliError> {
    runner.log_startup("listen");
    let config = runner.config();

    let mut receiver_config = config.receiver_config();
    if let Some(port) = args.port {
        receiver_config.listen_addr = SocketAddr::from(([0, 0, 0, 0], port));
    }

    let bus = Arc::new(GuidanceBus::new());
    bus.subscribe(Arc::new(ConsoleConsumer::new("peer")))?;
    if args.speak {
        bus.subscribe(Arc::new(SpeechConsumer::new(Arc::new(TracingSpeechSink))))?;
    }

    let runtime = runner.runtime()?;
    let cancel = shutdown_token()?;
    let capacity = config.network.hand_off_capacity;

    let result = runtime.block_on(async {
        let (hand_off, queue) = hand_off_queue(capacity);
        let receiver = DatagramReceiver::bind(receiver_config, hand_off).await?;
        println!(
            "Listening on {} (Ctrl-C to stop)",
            receiver.local_addr()?
        );

        let handle = receiver.spawn(cancel.clone());
        let forwarded = forward(queue, &bus, cancel).await;
        let stats = handle.await.unwrap_or_default();
        Ok::<_, CliError>((stats, forwarded))
    });

    bus.close();
    runtime.shutdown_timeout(Duration::from_millis(500));

    let (stats, forwarded) = result?;
    print_summary(&stats, forwarded);
    Ok(())
}

/// Publish queued messages until cancelled or the receiver is gone.
async fn forward(mut queue: HandOffQueue, bus: &GuidanceBus, cancel: CancellationToken) -> u64 {
    let mut forwarded = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = queue.recv() => match message {
                Some(message) => {
                    bus.publish(message);
                    forwarded += 1;
                }
                None => break,
            },
        }
    }
    forwarded
}

fn print_summary(stats: &ReceiverStats, forwarded: u64) {
    println!();
    println!("Receiver summary");
    println!("  Datagrams: {}", stats.datagrams);
    println!("  Shown:     {}", forwarded);
    println!("  Malformed: {}", stats.malformed);
    println!("  Dropped:   {}", stats.dropped);
}
