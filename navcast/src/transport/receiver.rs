//! Inbound datagram receiver.
//!
//! Runs as a tokio task that owns the inbound socket. Every decoded message
//! is offered to the hand-off queue; the receiver never touches engine state
//! directly. The loop survives malformed payloads, socket errors and a full
//! queue, and ends only on cancellation or when the queue side is dropped.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::codec::{self, MAX_DATAGRAM_SIZE};
use super::{HandOffError, HandOffSender, TransportError, DEFAULT_PORT};

/// Pause after a socket error before receiving again.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Receiver configuration.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Local address to listen on (default: 0.0.0.0:12345).
    pub listen_addr: SocketAddr,

    /// Timeout for a single receive; bounds how long the loop goes without
    /// checking whether the queue side is still alive.
    pub recv_timeout: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            recv_timeout: Duration::from_millis(500),
        }
    }
}

/// Counters reported when the receiver stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Datagrams read from the socket.
    pub datagrams: u64,
    /// Messages queued for the engine.
    pub delivered: u64,
    /// Payloads that failed to decode.
    pub malformed: u64,
    /// Messages dropped because the queue was full.
    pub dropped: u64,
}

/// Bound inbound socket plus its hand-off queue.
#[derive(Debug)]
pub struct DatagramReceiver {
    config: ReceiverConfig,
    socket: UdpSocket,
    hand_off: HandOffSender,
}

impl DatagramReceiver {
    /// Bind the inbound socket.
    pub async fn bind(
        config: ReceiverConfig,
        hand_off: HandOffSender,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(config.listen_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: config.listen_addr.to_string(),
                source,
            })?;
        Ok(Self {
            config,
            socket,
            hand_off,
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket
            .local_addr()
            .map_err(|source| TransportError::Bind {
                addr: self.config.listen_addr.to_string(),
                source,
            })
    }

    /// Spawn the receive loop.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<ReceiverStats> {
        tokio::spawn(self.run(cancel))
    }

    /// Run the receive loop until cancelled or the queue side is gone.
    pub async fn run(self, cancel: CancellationToken) -> ReceiverStats {
        info!(local_addr = ?self.socket.local_addr().ok(), "Datagram receiver started");

        // One spare byte so oversized datagrams are detectable
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE + 1];
        let mut stats = ReceiverStats::default();

        loop {
            if self.hand_off.is_closed() {
                debug!("Hand-off queue closed, stopping receiver");
                break;
            }

            let recv_result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Datagram receiver cancelled");
                    break;
                }
                r = tokio::time::timeout(self.config.recv_timeout, self.socket.recv_from(&mut buffer)) => r,
            };

            match recv_result {
                Ok(Ok((len, from))) => {
                    stats.datagrams += 1;
                    match codec::decode(&buffer[..len]) {
                        Ok(message) => {
                            trace!(from = %from, message = %message, "Received guidance");
                            match self.hand_off.offer(message) {
                                Ok(()) => stats.delivered += 1,
                                Err(HandOffError::Full) => {
                                    stats.dropped += 1;
                                    warn!(from = %from, dropped = stats.dropped, "Hand-off queue full, dropping message");
                                }
                                Err(HandOffError::Closed) => {
                                    debug!("Hand-off queue closed, stopping receiver");
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            stats.malformed += 1;
                            warn!(from = %from, len, error = %e, "Dropping malformed datagram");
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "UDP receive error");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
                Err(_) => {
                    trace!("No datagram received (timeout)");
                }
            }
        }

        info!(
            datagrams = stats.datagrams,
            delivered = stats.delivered,
            malformed = stats.malformed,
            dropped = stats.dropped,
            "Datagram receiver stopped"
        );
        stats
    }
}
