//! Outbound datagram sender.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

use super::{codec, TransportError};
use crate::guidance::{GuidanceConsumer, GuidanceMessage};

/// Sends every message it receives to one fixed peer.
///
/// Registered on the [`GuidanceBus`](crate::guidance::GuidanceBus) like any
/// other consumer, so it runs on its own delivery thread and uses a plain
/// blocking socket.
#[derive(Debug)]
pub struct DatagramSender {
    socket: UdpSocket,
    peer: SocketAddr,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl DatagramSender {
    /// Bind an ephemeral local socket for sending to `peer`.
    pub fn bind(peer: SocketAddr) -> Result<Self, TransportError> {
        let local = if peer.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind {
            addr: local.to_string(),
            source,
        })?;
        debug!(peer = %peer, local = ?socket.local_addr().ok(), "Datagram sender ready");
        Ok(Self {
            socket,
            peer,
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }

    /// Encode and send one message. Returns the payload size.
    pub fn send(&self, message: &GuidanceMessage) -> Result<usize, TransportError> {
        let payload = codec::encode(message)?;
        self.socket
            .send_to(&payload, self.peer)
            .map_err(|source| TransportError::Send {
                peer: self.peer,
                source,
            })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Datagrams sent successfully.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Sends that failed.
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl GuidanceConsumer for DatagramSender {
    fn name(&self) -> &str {
        "udp-sender"
    }

    fn on_guidance(&self, message: &GuidanceMessage) {
        match self.send(message) {
            Ok(len) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                trace!(peer = %self.peer, len, "Sent guidance datagram");
            }
            Err(e) => {
                let failed = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
                if failed <= 3 || failed.is_power_of_two() {
                    warn!(peer = %self.peer, failed, error = %e, "Failed to send guidance");
                }
            }
        }
    }
}
