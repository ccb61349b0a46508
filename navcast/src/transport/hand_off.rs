//! Bounded FIFO between the receiver task and the engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::guidance::GuidanceMessage;

/// Default number of messages the queue holds before dropping.
pub const DEFAULT_HAND_OFF_CAPACITY: usize = 64;

/// Why a message was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandOffError {
    /// The queue is full; the message was dropped.
    #[error("hand-off queue full")]
    Full,
    /// The draining side is gone.
    #[error("hand-off queue closed")]
    Closed,
}

/// Producer side, owned by the receiver task.
#[derive(Debug, Clone)]
pub struct HandOffSender {
    tx: mpsc::Sender<GuidanceMessage>,
    dropped: Arc<AtomicU64>,
}

/// Consumer side, drained once per engine tick.
#[derive(Debug)]
pub struct HandOffQueue {
    rx: mpsc::Receiver<GuidanceMessage>,
    dropped: Arc<AtomicU64>,
}

/// Create a hand-off queue holding at most `capacity` messages.
pub fn hand_off_queue(capacity: usize) -> (HandOffSender, HandOffQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        HandOffSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        HandOffQueue { rx, dropped },
    )
}

impl HandOffSender {
    /// Queue a message without waiting.
    pub fn offer(&self, message: GuidanceMessage) -> Result<(), HandOffError> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(HandOffError::Full)
            }
            Err(TrySendError::Closed(_)) => Err(HandOffError::Closed),
        }
    }

    /// True once the queue side was dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl HandOffQueue {
    /// Take everything currently queued, oldest first.
    pub fn drain(&mut self) -> Vec<GuidanceMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Wait for the next message; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<GuidanceMessage> {
        self.rx.recv().await
    }

    /// Messages dropped because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
