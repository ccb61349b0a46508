//! Guidance over UDP.
//!
//! # Architecture
//!
//! ```text
//! GuidanceBus ──► DatagramSender ──UDP──► peer
//!
//! peer ──UDP──► DatagramReceiver (task) ──► hand-off queue ──► engine tick ──► local GuidanceBus
//! ```
//!
//! Each datagram carries one JSON-encoded [`GuidanceMessage`](crate::guidance::GuidanceMessage)
//! (see [`codec`]). Delivery is fire-and-forget in both directions: send
//! failures and malformed or surplus inbound datagrams are logged and
//! dropped, never propagated into the tracking path.
//!
//! The outbound socket belongs to the sender and the inbound socket to the
//! receiver task; neither is shared.

pub mod codec;
mod hand_off;
mod receiver;
mod sender;

pub use codec::{decode, encode, CodecError, MAX_DATAGRAM_SIZE};
pub use hand_off::{hand_off_queue, HandOffError, HandOffQueue, HandOffSender, DEFAULT_HAND_OFF_CAPACITY};
pub use receiver::{DatagramReceiver, ReceiverConfig, ReceiverStats};
pub use sender::DatagramSender;

use std::net::{SocketAddr, ToSocketAddrs};

use thiserror::Error;

/// Default UDP port for guidance datagrams (both ends).
pub const DEFAULT_PORT: u16 = 12345;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to bind a UDP socket.
    #[error("Failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A peer address could not be resolved.
    #[error("Failed to resolve peer address {addr}: {reason}")]
    Resolve { addr: String, reason: String },

    /// A datagram could not be sent.
    #[error("Failed to send to {peer}: {source}")]
    Send {
        peer: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The message could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Resolve `host:port` to the first matching socket address.
pub fn resolve_peer(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let addr = format!("{}:{}", host, port);
    (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::Resolve {
            addr: addr.clone(),
            reason: e.to_string(),
        })?
        .next()
        .ok_or_else(|| TransportError::Resolve {
            addr,
            reason: "no addresses found".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_literal_peer() {
        let addr = resolve_peer("127.0.0.1", DEFAULT_PORT).unwrap();
        assert_eq!(addr, "127.0.0.1:12345".parse::<SocketAddr>().unwrap());
    }
}
